//! 후보 순위 및 Top-N 선택.
//!
//! 정렬 키는 (PASS 우선, 최종 점수 내림차순, 심볼 오름차순)입니다.
//! 거절된 후보도 전체 증거와 함께 목록에 남으며, 어떤 후보도 버려지지 않습니다.

use std::cmp::Ordering;

use scanner_core::{Candidate, Decision, TopNEntry};

fn decision_order(decision: Decision) -> u8 {
    match decision {
        Decision::Pass => 0,
        Decision::Reject => 1,
    }
}

/// 유한하지 않은 점수는 맨 뒤로 보냅니다.
fn sort_score(candidate: &Candidate) -> f64 {
    let score = candidate.score.final_with_social;
    if score.is_finite() {
        score
    } else {
        f64::NEG_INFINITY
    }
}

/// 두 후보의 순위 비교.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    decision_order(a.decision)
        .cmp(&decision_order(b.decision))
        .then_with(|| sort_score(b).total_cmp(&sort_score(a)))
        .then_with(|| a.symbol.cmp(&b.symbol))
}

/// 후보를 정렬하고 순위와 선택 여부를 부여합니다.
///
/// # 인자
/// * `candidates` - 사이클의 모든 후보
/// * `top_n` - 선택할 최대 PASS 후보 수
///
/// # 반환
/// 순위순 후보 목록과 선택된 후보만의 요약 (PASS가 `top_n`개보다 적으면 요약도 짧아짐)
pub fn rank(mut candidates: Vec<Candidate>, top_n: usize) -> (Vec<Candidate>, Vec<TopNEntry>) {
    candidates.sort_by(compare_candidates);

    let mut selected = 0;
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = index + 1;
        candidate.selected = candidate.decision == Decision::Pass && selected < top_n;
        if candidate.selected {
            selected += 1;
        }
    }

    let summary = candidates
        .iter()
        .filter(|c| c.selected)
        .map(TopNEntry::from)
        .collect();
    (candidates, summary)
}
