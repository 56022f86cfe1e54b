//! HALF-UP 반올림 및 포함 비교.
//!
//! 모든 게이트/가드 비교는 측정값과 임계값을 같은 자릿수로 반올림한 뒤
//! 포함 비교(`≥` / `≤`)로 수행합니다. 반올림은 0.5를 0에서 멀어지는 방향으로 처리합니다.
//!
//! `f64`를 `Decimal`로 옮길 때는 최단 왕복 표현(`Display`)을 사용하므로
//! `49.5`는 정확히 `49.5`로 변환되어 `50`으로 반올림됩니다.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use scanner_core::{GateEvidence, GateFault};

/// 측정 종류별 반올림 자릿수.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// 스프레드 (bps)
    SpreadBps,
    /// 호가 깊이 (USD)
    DepthUsd,
    /// VADR 배수
    Vadr,
    /// 복합 점수
    Score,
    /// 펀딩 z-score
    FundingZ,
    /// 수익률 (%)
    ReturnPct,
    /// RSI
    Rsi,
    /// ATR 배수
    AtrMultiple,
    /// 지연 (초)
    DelaySecs,
    /// 지연 (ms)
    LatencyMs,
    /// 캔들 수
    Bars,
    /// 비율 (가격/VWAP 등)
    Ratio,
}

impl Measure {
    /// 소수점 자릿수.
    pub fn decimals(self) -> u32 {
        match self {
            Measure::SpreadBps
            | Measure::DepthUsd
            | Measure::DelaySecs
            | Measure::LatencyMs
            | Measure::Bars => 0,
            Measure::Score | Measure::ReturnPct | Measure::Rsi => 1,
            Measure::Vadr | Measure::FundingZ | Measure::AtrMultiple => 2,
            Measure::Ratio => 4,
        }
    }
}

/// 비교 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 값 ≥ 임계값
    AtLeast,
    /// 값 ≤ 임계값
    AtMost,
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Decimal → f64 (최근접 값).
fn to_f64(value: Decimal) -> Option<f64> {
    f64::from_str(&value.to_string()).ok()
}

/// HALF-UP 반올림된 Decimal. 유한하지 않거나 범위를 넘으면 `None`.
pub fn round_half_up_decimal(value: f64, decimals: u32) -> Option<Decimal> {
    to_decimal(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
}

/// HALF-UP 반올림.
///
/// # 예시
///
/// ```rust
/// use scanner_risk::rounding::round_half_up;
///
/// assert_eq!(round_half_up(49.5, 0), Some(50.0));
/// assert_eq!(round_half_up(-2.345, 2), Some(-2.35));
/// assert_eq!(round_half_up(f64::NAN, 0), None);
/// ```
pub fn round_half_up(value: f64, decimals: u32) -> Option<f64> {
    round_half_up_decimal(value, decimals).and_then(to_f64)
}

/// 반올림 후 포함 비교.
///
/// # 반환
/// (반올림된 값, 반올림된 임계값, 통과 여부). 입력이 유한하지 않으면 `None`.
pub fn compare(
    measure: Measure,
    value: f64,
    threshold: f64,
    comparison: Comparison,
) -> Option<(f64, f64, bool)> {
    let dp = measure.decimals();
    let v = round_half_up_decimal(value, dp)?;
    let t = round_half_up_decimal(threshold, dp)?;
    let ok = match comparison {
        Comparison::AtLeast => v >= t,
        Comparison::AtMost => v <= t,
    };
    Some((to_f64(v)?, to_f64(t)?, ok))
}

/// 반올림 비교 결과로 증거를 만듭니다.
///
/// 값이 유한하지 않으면 `non_finite_input` 센티널 증거가 됩니다.
pub fn check(
    name: &str,
    measure: Measure,
    value: f64,
    threshold: f64,
    comparison: Comparison,
) -> GateEvidence {
    match compare(measure, value, threshold, comparison) {
        Some((v, t, ok)) => GateEvidence::check(name, v, t, ok),
        None => GateEvidence::faulted(
            name,
            round_half_up(threshold, measure.decimals()).unwrap_or(threshold),
            GateFault::NonFiniteInput,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_half_up_midpoints() {
        assert_eq!(round_half_up(49.5, 0), Some(50.0));
        assert_eq!(round_half_up(50.5, 0), Some(51.0));
        assert_eq!(round_half_up(-0.5, 0), Some(-1.0));
        assert_eq!(round_half_up(1.005, 2), Some(1.01));
        assert_eq!(round_half_up(74.95, 1), Some(75.0));
        assert_eq!(round_half_up_decimal(1.795, 2), Some(dec!(1.80)));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(round_half_up(f64::INFINITY, 2), None);
        assert_eq!(compare(Measure::Vadr, f64::NAN, 1.8, Comparison::AtLeast), None);
    }

    #[test]
    fn test_spread_boundary_inclusive() {
        // 49.5bps → 50bps, 임계값 50 이하 통과
        assert_eq!(
            compare(Measure::SpreadBps, 49.5, 50.0, Comparison::AtMost),
            Some((50.0, 50.0, true))
        );
        assert_eq!(
            compare(Measure::SpreadBps, 50.0, 50.0, Comparison::AtMost),
            Some((50.0, 50.0, true))
        );
        assert_eq!(
            compare(Measure::SpreadBps, 50.5, 50.0, Comparison::AtMost),
            Some((51.0, 50.0, false))
        );
    }

    #[test]
    fn test_score_rounding_before_comparison() {
        // 74.95 → 75.0 ≥ 75 통과, 74.94 → 74.9 실패
        assert!(compare(Measure::Score, 74.95, 75.0, Comparison::AtLeast).unwrap().2);
        assert!(!compare(Measure::Score, 74.94, 75.0, Comparison::AtLeast).unwrap().2);
    }

    #[test]
    fn test_check_builds_fault_for_nan() {
        let evidence = check("vadr", Measure::Vadr, f64::NAN, 1.8, Comparison::AtLeast);
        assert!(!evidence.ok);
        assert_eq!(evidence.value, None);
        assert_eq!(evidence.fault, Some(GateFault::NonFiniteInput));
        assert_eq!(evidence.threshold, 1.8);
    }
}
