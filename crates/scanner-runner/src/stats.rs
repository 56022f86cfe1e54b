//! 사이클 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 스캔 사이클 통계.
///
/// 제외/품질 저하 수는 게이트 거절 수와 별도로 집계됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// 유니버스 심볼 수
    pub total: usize,
    /// 점수가 산출된 후보 수
    pub scored: usize,
    /// 업스트림 실패/시간 초과로 제외된 심볼 수
    pub excluded: usize,
    /// 중립값 대체 등으로 품질이 저하된 후보 수
    pub degraded: usize,
    /// PASS 판정 수
    pub passed: usize,
    /// 기준 미달 거절 수
    pub rejected_merits: usize,
    /// 데이터 오류 거절 수
    pub rejected_data_fault: usize,
    /// Top-N 선택 수
    pub selected: usize,
    /// 업스트림 지연 p99 (ms)
    pub upstream_p99_ms: Option<f64>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CycleStats {
    /// 새 통계 객체 생성
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// 게이트 거절 총합
    pub fn rejected(&self) -> usize {
        self.rejected_merits + self.rejected_data_fault
    }

    /// 통과율 계산 (%)
    pub fn pass_rate(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            (self.passed as f64 / self.scored as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            scored = self.scored,
            excluded = self.excluded,
            degraded = self.degraded,
            passed = self.passed,
            rejected_merits = self.rejected_merits,
            rejected_data_fault = self.rejected_data_fault,
            selected = self.selected,
            upstream_p99_ms = self.upstream_p99_ms,
            pass_rate = format!("{:.1}%", self.pass_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "스캔 사이클 완료"
        );
    }
}

/// 최근접 순위 방식 백분위수. 값이 없으면 `None`.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 99.0), Some(99.0));
        assert_eq!(percentile(&values, 50.0), Some(50.0));
        assert_eq!(percentile(&[120.0, 15.0, 40.0], 99.0), Some(120.0));
        assert_eq!(percentile(&[], 99.0), None);
    }

    #[test]
    fn test_pass_rate() {
        let mut stats = CycleStats::new(10);
        assert_eq!(stats.pass_rate(), 0.0);
        stats.scored = 8;
        stats.passed = 2;
        stats.rejected_merits = 5;
        stats.rejected_data_fault = 1;
        assert!((stats.pass_rate() - 25.0).abs() < 1e-9);
        assert_eq!(stats.rejected(), 6);
    }
}
