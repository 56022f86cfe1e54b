//! 진입 하드 게이트.
//!
//! 내부 점수, VADR, 펀딩 다이버전스(가격의 VWAP 유지 포함)를 검사합니다.
//! 모든 게이트는 통과 여부와 무관하게 증거를 남깁니다.

use scanner_core::{CompositeScore, GateEvidence, GateFault, MarketContext};

use crate::config::GateConfig;
use crate::rounding::{check, Comparison, Measure};

/// 진입 게이트 평가기.
#[derive(Debug, Clone, Default)]
pub struct EntryGates {
    config: GateConfig,
}

impl EntryGates {
    /// 새 평가기를 생성합니다.
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// 설정 조회.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// 내부 점수 게이트.
    pub fn score(&self, score: &CompositeScore) -> GateEvidence {
        check(
            "score",
            Measure::Score,
            score.internal_0_100,
            self.config.min_score,
            Comparison::AtLeast,
        )
    }

    /// VADR 게이트. 이력이 부족하면 `insufficient_history` 센티널.
    pub fn vadr(&self, vadr: Option<f64>) -> GateEvidence {
        match vadr {
            Some(value) => check(
                "vadr",
                Measure::Vadr,
                value,
                self.config.min_vadr,
                Comparison::AtLeast,
            ),
            None => GateEvidence::faulted(
                "vadr",
                self.config.min_vadr,
                GateFault::InsufficientHistory,
            ),
        }
    }

    /// 펀딩 다이버전스 게이트.
    ///
    /// `funding_divergence`(|z| ≥ 기준)와 `funding_vwap_hold`(가격/VWAP ≥ 기준) 두 증거를 반환합니다.
    pub fn funding(&self, market: &MarketContext) -> [GateEvidence; 2] {
        let divergence = match market.funding_z {
            Some(z) => check(
                "funding_divergence",
                Measure::FundingZ,
                z.abs(),
                self.config.funding_z_threshold,
                Comparison::AtLeast,
            ),
            None => GateEvidence::faulted(
                "funding_divergence",
                self.config.funding_z_threshold,
                GateFault::NonFiniteInput,
            ),
        };

        let hold = match market.vwap_24h {
            Some(vwap) if vwap > 0.0 => check(
                "funding_vwap_hold",
                Measure::Ratio,
                market.price / vwap,
                self.config.min_price_vwap_ratio,
                Comparison::AtLeast,
            ),
            _ => GateEvidence::faulted(
                "funding_vwap_hold",
                self.config.min_price_vwap_ratio,
                GateFault::InsufficientHistory,
            ),
        };

        [divergence, hold]
    }

    /// 모든 하드 게이트를 평가합니다.
    pub fn evaluate(&self, score: &CompositeScore, market: &MarketContext) -> Vec<GateEvidence> {
        let mut evidence = vec![self.score(score), self.vadr(market.vadr)];
        evidence.extend(self.funding(market));
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn market(vadr: Option<f64>, funding_z: Option<f64>, price: f64) -> MarketContext {
        MarketContext {
            price,
            return_24h_pct: 4.0,
            rsi_4h: 60.0,
            vadr,
            vwap_24h: Some(100.0),
            funding_z,
            signal_bar_close: Utc::now(),
            signal_price: price,
            atr_1h: 1.0,
        }
    }

    fn score(internal: f64) -> CompositeScore {
        CompositeScore {
            internal_0_100: internal,
            final_with_social: internal,
        }
    }

    #[test]
    fn test_all_hard_gates_pass() {
        let gates = EntryGates::default();
        let evidence = gates.evaluate(&score(82.0), &market(Some(2.1), Some(-2.3), 101.0));
        assert_eq!(evidence.len(), 4);
        assert!(evidence.iter().all(|e| e.ok), "{evidence:?}");
        assert_eq!(evidence[2].value, Some(2.3));
    }

    #[test]
    fn test_vadr_boundary_uses_rounding() {
        let gates = EntryGates::default();
        // 1.795 → 1.80
        assert!(gates.vadr(Some(1.795)).ok);
        assert!(!gates.vadr(Some(1.794)).ok);
    }

    #[test]
    fn test_missing_inputs_are_faults() {
        let gates = EntryGates::default();
        let vadr = gates.vadr(None);
        assert_eq!(vadr.fault, Some(GateFault::InsufficientHistory));

        let mut ctx = market(Some(2.0), None, 101.0);
        ctx.vwap_24h = None;
        let [divergence, hold] = gates.funding(&ctx);
        assert_eq!(divergence.fault, Some(GateFault::NonFiniteInput));
        assert_eq!(hold.fault, Some(GateFault::InsufficientHistory));
    }

    #[test]
    fn test_price_below_vwap_fails_on_merits() {
        let gates = EntryGates::default();
        let [divergence, hold] = gates.funding(&market(Some(2.0), Some(2.5), 99.0));
        assert!(divergence.ok);
        assert!(!hold.ok);
        assert_eq!(hold.fault, None);
    }
}
