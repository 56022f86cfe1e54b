//! 마이크로구조 게이트.
//!
//! 거래소 원본 호가창만으로 스프레드와 ±밴드 내 호가 깊이를 계산합니다.
//! 호가창이 없거나 역전되었거나 집계 데이터인 경우 두 증거 모두 데이터 오류 센티널로 실패합니다.

use scanner_core::{BookSnapshot, GateEvidence, GateFault};

use crate::config::MicrostructureConfig;
use crate::rounding::{check, Comparison, Measure};

/// 스프레드 증거 이름.
pub const SPREAD_EVIDENCE: &str = "spread_bps";
/// 호가 깊이 증거 이름.
pub const DEPTH_EVIDENCE: &str = "depth_usd";

/// 마이크로구조 평가 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct MicrostructureReport {
    /// 스프레드/깊이 증거
    pub evidence: Vec<GateEvidence>,
    /// 원시 스프레드 (bps). 데이터 오류 시 `None`.
    pub spread_bps: Option<f64>,
    /// 원시 호가 깊이 (USD). 데이터 오류 시 `None`.
    pub depth_usd: Option<f64>,
}

impl MicrostructureReport {
    fn faulted(config: &MicrostructureConfig, fault: GateFault) -> Self {
        Self {
            evidence: vec![
                GateEvidence::faulted(SPREAD_EVIDENCE, config.max_spread_bps, fault),
                GateEvidence::faulted(DEPTH_EVIDENCE, config.min_depth_usd, fault),
            ],
            spread_bps: None,
            depth_usd: None,
        }
    }

    /// 모든 증거 통과 여부.
    pub fn passed(&self) -> bool {
        self.evidence.iter().all(|e| e.ok)
    }
}

/// 마이크로구조 검사기.
#[derive(Debug, Clone, Default)]
pub struct MicrostructureChecker {
    config: MicrostructureConfig,
}

impl MicrostructureChecker {
    /// 새 검사기를 생성합니다.
    pub fn new(config: MicrostructureConfig) -> Self {
        Self { config }
    }

    /// 설정 조회.
    pub fn config(&self) -> &MicrostructureConfig {
        &self.config
    }

    /// 호가창 데이터 오류 검사.
    fn validate_book(&self, book: &BookSnapshot) -> Result<(f64, f64), GateFault> {
        if self.config.require_venue_native && !book.is_venue_native() {
            return Err(GateFault::AggregatorSource);
        }

        let malformed = book
            .bids
            .iter()
            .chain(book.asks.iter())
            .any(|l| !(l.price.is_finite() && l.price > 0.0 && l.quantity.is_finite() && l.quantity > 0.0));
        if malformed {
            return Err(GateFault::NonFiniteInput);
        }

        let (bid, ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => return Err(GateFault::EmptyBook),
        };
        if bid >= ask {
            return Err(GateFault::CrossedBook);
        }
        Ok((bid, ask))
    }

    /// 호가창을 평가합니다.
    ///
    /// # 인자
    /// * `book` - 거래소 호가창 스냅샷 (조회 실패 시 `None`)
    ///
    /// # 반환
    /// 스프레드/깊이 증거와 원시 측정값
    pub fn evaluate(&self, book: Option<&BookSnapshot>) -> MicrostructureReport {
        let Some(book) = book else {
            return MicrostructureReport::faulted(&self.config, GateFault::EmptyBook);
        };

        let (bid, ask) = match self.validate_book(book) {
            Ok(best) => best,
            Err(fault) => {
                tracing::debug!(venue = %book.venue, fault = %fault, "호가창 데이터 오류");
                return MicrostructureReport::faulted(&self.config, fault);
            }
        };

        let mid = (bid + ask) / 2.0;
        let spread_bps = (ask - bid) / mid * 10_000.0;

        let band = self.config.depth_band_pct / 100.0;
        let lower = mid * (1.0 - band);
        let upper = mid * (1.0 + band);
        let bid_depth: f64 = book
            .bids
            .iter()
            .filter(|l| l.price >= lower)
            .map(|l| l.notional())
            .sum();
        let ask_depth: f64 = book
            .asks
            .iter()
            .filter(|l| l.price <= upper)
            .map(|l| l.notional())
            .sum();
        let depth_usd = bid_depth + ask_depth;

        MicrostructureReport {
            evidence: vec![
                check(
                    SPREAD_EVIDENCE,
                    Measure::SpreadBps,
                    spread_bps,
                    self.config.max_spread_bps,
                    Comparison::AtMost,
                ),
                check(
                    DEPTH_EVIDENCE,
                    Measure::DepthUsd,
                    depth_usd,
                    self.config.min_depth_usd,
                    Comparison::AtLeast,
                ),
            ],
            spread_bps: Some(spread_bps),
            depth_usd: Some(depth_usd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scanner_core::{BookLevel, BookSource};

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookSnapshot {
        BookSnapshot {
            venue: "kraken".to_string(),
            source: BookSource::VenueNative,
            bids: bids.iter().map(|(p, q)| BookLevel::new(*p, *q)).collect(),
            asks: asks.iter().map(|(p, q)| BookLevel::new(*p, *q)).collect(),
            timestamp: Utc::now(),
        }
    }

    fn evidence<'a>(report: &'a MicrostructureReport, name: &str) -> &'a GateEvidence {
        report.evidence.iter().find(|e| e.name == name).unwrap()
    }

    #[test]
    fn test_tight_deep_book_passes() {
        // mid 100, 스프레드 20bps, 깊이 60k + 60k
        let report = MicrostructureChecker::default()
            .evaluate(Some(&book(&[(99.9, 600.0)], &[(100.1, 600.0)])));
        assert!(report.passed());
        assert_eq!(evidence(&report, SPREAD_EVIDENCE).value, Some(20.0));
        assert_eq!(evidence(&report, DEPTH_EVIDENCE).value, Some(120_000.0));
    }

    #[test]
    fn test_levels_outside_band_ignored() {
        // 밴드(±2%) 밖의 큰 주문은 깊이에 포함되지 않음
        let report = MicrostructureChecker::default().evaluate(Some(&book(
            &[(99.9, 100.0), (90.0, 10_000.0)],
            &[(100.1, 100.0), (110.0, 10_000.0)],
        )));
        let depth = evidence(&report, DEPTH_EVIDENCE);
        assert!(!depth.ok);
        assert_eq!(depth.fault, None);
        assert_eq!(depth.value, Some(20_000.0));
    }

    #[test]
    fn test_crossed_book_is_fault() {
        let report = MicrostructureChecker::default()
            .evaluate(Some(&book(&[(100.2, 1000.0)], &[(100.1, 1000.0)])));
        for e in &report.evidence {
            assert!(!e.ok);
            assert_eq!(e.value, None);
            assert_eq!(e.fault, Some(GateFault::CrossedBook));
        }
    }

    #[test]
    fn test_empty_side_and_missing_book() {
        let checker = MicrostructureChecker::default();
        let report = checker.evaluate(Some(&book(&[(99.9, 1000.0)], &[])));
        assert_eq!(report.evidence[0].fault, Some(GateFault::EmptyBook));

        let report = checker.evaluate(None);
        assert_eq!(report.evidence[1].fault, Some(GateFault::EmptyBook));
    }

    #[test]
    fn test_aggregator_source_rejected() {
        let mut snapshot = book(&[(99.9, 1000.0)], &[(100.1, 1000.0)]);
        snapshot.source = BookSource::Aggregator;
        let report = MicrostructureChecker::default().evaluate(Some(&snapshot));
        assert_eq!(report.evidence[0].fault, Some(GateFault::AggregatorSource));
        assert!(!report.passed());
    }

    #[test]
    fn test_non_positive_level_is_fault() {
        let report = MicrostructureChecker::default()
            .evaluate(Some(&book(&[(99.9, 0.0)], &[(100.1, 1000.0)])));
        assert_eq!(report.evidence[0].fault, Some(GateFault::NonFiniteInput));
    }
}
