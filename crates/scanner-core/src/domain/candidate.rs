//! 스캔 후보 및 Top-N 요약.
//!
//! `Candidate`는 사이클마다 새로 생성되며, 직렬화된 형태가 그대로
//! NDJSON 감사 기록 한 줄이 됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evidence::{Decision, GateEvidence, RejectionKind};
use super::factor::{FactorSet, OrthogonalFactorSet, QualityFlag};
use super::regime::{RegimeLabel, RegimeSnapshot};
use super::score::{CompositeScore, ScoreBreakdown};
use crate::types::Symbol;

/// 심볼별, 사이클별 후보 (감사 기록).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// 사이클 ID
    pub cycle_id: String,
    /// 심볼
    pub symbol: Symbol,
    /// 평가 시각
    pub timestamp: DateTime<Utc>,
    /// 감지기가 보고한 레짐
    pub regime: RegimeSnapshot,
    /// 적용된 레짐 프로필
    pub regime_profile: RegimeLabel,
    /// 원시 팩터
    pub factors: FactorSet,
    /// 직교화된 팩터
    pub orthogonal: OrthogonalFactorSet,
    /// 복합 점수
    pub score: CompositeScore,
    /// 점수 분해
    pub breakdown: ScoreBreakdown,
    /// 게이트/가드 증거 전체
    pub evidence: Vec<GateEvidence>,
    /// 판정
    pub decision: Decision,
    /// 거절 유형 (PASS면 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionKind>,
    /// 순위 (1부터)
    pub rank: usize,
    /// Top-N 선택 여부
    pub selected: bool,
}

impl Candidate {
    /// 후보의 모든 품질 플래그 (추출/모멘텀/점수 단계 합집합).
    pub fn quality_flags(&self) -> Vec<QualityFlag> {
        let mut flags: Vec<QualityFlag> = self
            .factors
            .flags
            .iter()
            .chain(self.factors.momentum.flags.iter())
            .chain(self.breakdown.flags.iter())
            .copied()
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }

    /// 중립값 대체나 점수 불가 등으로 품질이 저하된 후보인지 여부.
    pub fn is_degraded(&self) -> bool {
        self.quality_flags().iter().any(|f| {
            matches!(
                f,
                QualityFlag::Degraded | QualityFlag::InvalidForScoring | QualityFlag::NonFiniteInput
            )
        })
    }

    /// 실패한 차단 증거 이름.
    pub fn failed_gates(&self) -> Vec<&str> {
        self.evidence
            .iter()
            .filter(|e| e.is_blocking_failure())
            .map(|e| e.name.as_str())
            .collect()
    }
}

/// 하위 표시/알림용 Top-N 요약 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNEntry {
    /// 순위
    pub rank: usize,
    /// 심볼
    pub symbol: Symbol,
    /// 최종 점수
    #[serde(with = "crate::types::finite")]
    pub final_score: f64,
    /// 내부 점수
    #[serde(with = "crate::types::finite")]
    pub internal_score: f64,
    /// 판정
    pub decision: Decision,
    /// 선택 여부
    pub selected: bool,
}

impl From<&Candidate> for TopNEntry {
    fn from(candidate: &Candidate) -> Self {
        Self {
            rank: candidate.rank,
            symbol: candidate.symbol.clone(),
            final_score: candidate.score.final_with_social,
            internal_score: candidate.score.internal_0_100,
            decision: candidate.decision,
            selected: candidate.selected,
        }
    }
}
