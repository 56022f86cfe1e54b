//! 게이트 평가 통합 테스트
//!
//! 하드 게이트, 레짐 가드, 마이크로구조, 쿨다운이 함께 동작하는 시나리오를 검증합니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use scanner_core::{
    BookLevel, BookSnapshot, BookSource, CompositeScore, Decision, FactorSet, GateEvidence,
    GateFault, MarketContext, MomentumCore, OrthogonalFactorSet, QualityFactor, RegimeLabel,
    RejectionKind, SocialFactor, Symbol, TechnicalFactor, Timeframe, VolumeFactor,
};
use scanner_risk::{
    CooldownStore, GateEvaluator, GateInputs, GuardKind, InMemoryCooldownStore, RiskThresholds,
};

// ===== 헬퍼 함수

fn signal_close() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn factor_set(symbol: &str, accel_fresh: bool, acceleration: f64) -> FactorSet {
    FactorSet {
        symbol: Symbol::new(symbol),
        timestamp: signal_close(),
        timeframes: Vec::new(),
        momentum: MomentumCore {
            value: 1.4,
            acceleration,
            accel_age_bars: 1,
            accel_fresh,
            boost: 1.0,
            coverage: Timeframe::ALL.to_vec(),
            flags: Vec::new(),
        },
        technical: TechnicalFactor { rsi: 62.0, adx: 28.0, persistence: 0.6 },
        volume: VolumeFactor { surge_ratio: 2.0, oi_delta: 0.1, quote_volume_24h: 8e6 },
        quality: QualityFactor { open_interest: 2e6, reserve_ratio: 0.5, flow: 0.0, venue_health: 0.9 },
        social: SocialFactor { sentiment: 3.0, brand: 1.0 },
        flags: Vec::new(),
    }
}

fn orthogonal(valid: bool) -> OrthogonalFactorSet {
    OrthogonalFactorSet {
        technical_residual: 0.02,
        volume_residual: 0.1,
        quality_residual: -0.05,
        social_residual: 2.0,
        degraded: Vec::new(),
        valid_for_scoring: valid,
    }
}

fn market(return_pct: f64, rsi: f64) -> MarketContext {
    MarketContext {
        price: 100.4,
        return_24h_pct: return_pct,
        rsi_4h: rsi,
        vadr: Some(2.1),
        vwap_24h: Some(99.5),
        funding_z: Some(-2.3),
        signal_bar_close: signal_close(),
        signal_price: 100.0,
        atr_1h: 1.0,
    }
}

fn deep_book() -> BookSnapshot {
    BookSnapshot {
        venue: "binance".to_string(),
        source: BookSource::VenueNative,
        bids: vec![BookLevel::new(100.35, 800.0), BookLevel::new(99.8, 400.0)],
        asks: vec![BookLevel::new(100.45, 800.0), BookLevel::new(101.0, 400.0)],
        timestamp: signal_close(),
    }
}

fn score(internal: f64) -> CompositeScore {
    CompositeScore { internal_0_100: internal, final_with_social: internal + 2.0 }
}

fn evaluator() -> (GateEvaluator, Arc<InMemoryCooldownStore>) {
    let store = Arc::new(InMemoryCooldownStore::new());
    let gates = GateEvaluator::new(RiskThresholds::default(), store.clone()).unwrap();
    (gates, store)
}

fn find<'a>(evidence: &'a [GateEvidence], name: &str) -> &'a GateEvidence {
    evidence
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("증거 없음: {name}"))
}

struct Scenario {
    regime: RegimeLabel,
    factors: FactorSet,
    orthogonal: OrthogonalFactorSet,
    score: CompositeScore,
    market: MarketContext,
    book: Option<BookSnapshot>,
    as_of: DateTime<Utc>,
}

impl Scenario {
    fn passing() -> Self {
        Self {
            regime: RegimeLabel::Choppy,
            factors: factor_set("BTCUSDT", false, 0.0),
            orthogonal: orthogonal(true),
            score: score(82.0),
            market: market(6.0, 64.0),
            book: Some(deep_book()),
            as_of: signal_close() + Duration::seconds(20),
        }
    }

    fn inputs(&self) -> GateInputs<'_> {
        GateInputs {
            regime: self.regime,
            factors: &self.factors,
            orthogonal: &self.orthogonal,
            score: &self.score,
            market: &self.market,
            book: self.book.as_ref(),
            infra_p99_ms: Some(180.0),
            as_of: self.as_of,
        }
    }
}

// ===== 하드 게이트

#[tokio::test]
async fn test_strong_candidate_passes_every_gate() {
    let (gates, _) = evaluator();
    let scenario = Scenario::passing();
    let outcome = gates.evaluate(scenario.inputs()).await;

    assert_eq!(outcome.decision, Decision::Pass, "{:?}", outcome.evidence);
    assert_eq!(outcome.rejection, None);
    for name in ["score", "vadr", "funding_divergence", "funding_vwap_hold"] {
        assert!(find(&outcome.evidence, name).ok, "{name}");
    }
    assert_eq!(find(&outcome.evidence, "score").value, Some(82.0));
    assert_eq!(find(&outcome.evidence, "vadr").value, Some(2.1));
}

#[tokio::test]
async fn test_every_gate_emits_evidence_on_failure() {
    let (gates, _) = evaluator();
    let mut scenario = Scenario::passing();
    scenario.score = score(60.0);
    scenario.market.vadr = Some(1.2);
    scenario.market.funding_z = Some(0.4);

    let outcome = gates.evaluate(scenario.inputs()).await;
    assert_eq!(outcome.decision, Decision::Reject);
    assert_eq!(outcome.rejection, Some(RejectionKind::Merits));
    for name in [
        "scoring_validity",
        "score",
        "vadr",
        "funding_divergence",
        "funding_vwap_hold",
        "liquidity_flag",
        "spread_bps",
        "depth_usd",
        "fatigue",
        "freshness_bars",
        "freshness_atr_move",
        "late_fill_delay",
    ] {
        find(&outcome.evidence, name);
    }
    assert!(!find(&outcome.evidence, "score").ok);
    assert_eq!(find(&outcome.evidence, "score").threshold, 75.0);
}

#[tokio::test]
async fn test_crossed_book_rejects_as_data_fault() {
    let (gates, _) = evaluator();
    let mut scenario = Scenario::passing();
    let mut book = deep_book();
    book.bids[0].price = 100.5;
    scenario.book = Some(book);

    let outcome = gates.evaluate(scenario.inputs()).await;
    assert_eq!(outcome.decision, Decision::Reject);
    assert_eq!(outcome.rejection, Some(RejectionKind::DataFault));
    let spread = find(&outcome.evidence, "spread_bps");
    assert_eq!(spread.fault, Some(GateFault::CrossedBook));
    assert_eq!(spread.value, None);
}

#[tokio::test]
async fn test_invalid_for_scoring_and_illiquid_rows() {
    let (gates, _) = evaluator();
    let mut scenario = Scenario::passing();
    scenario.orthogonal = orthogonal(false);
    scenario.factors.volume.quote_volume_24h = 0.0;

    let outcome = gates.evaluate(scenario.inputs()).await;
    assert_eq!(outcome.rejection, Some(RejectionKind::DataFault));
    assert_eq!(
        find(&outcome.evidence, "scoring_validity").fault,
        Some(GateFault::InvalidForScoring)
    );
    let liquidity = find(&outcome.evidence, "liquidity_flag");
    assert!(!liquidity.ok);
    assert_eq!(liquidity.value, Some(1.0));
}

// ===== 피로 가드

#[tokio::test]
async fn test_fatigue_relaxes_only_in_trending_regime() {
    let (gates, _) = evaluator();
    let mut trending = Scenario::passing();
    trending.regime = RegimeLabel::TrendingBull;
    trending.factors = factor_set("ETHUSDT", true, 0.8);
    trending.market = market(18.0, 75.0);

    let outcome = gates.evaluate(trending.inputs()).await;
    let fatigue = find(&outcome.evidence, "fatigue");
    assert!(fatigue.ok);
    assert_eq!(fatigue.threshold, 18.0);
    assert!(find(&outcome.evidence, "fatigue_relaxation").ok);

    let (gates, _) = evaluator();
    let mut choppy = trending;
    choppy.regime = RegimeLabel::Choppy;
    let outcome = gates.evaluate(choppy.inputs()).await;
    let fatigue = find(&outcome.evidence, "fatigue");
    assert!(!fatigue.ok);
    assert_eq!(fatigue.threshold, 12.0);
    assert_eq!(outcome.decision, Decision::Reject);
}

#[tokio::test]
async fn test_fatigue_safety_ceiling_holds_in_trending_regime() {
    let (gates, store) = evaluator();
    let mut scenario = Scenario::passing();
    scenario.regime = RegimeLabel::TrendingBull;
    scenario.factors = factor_set("DOGEUSDT", true, 1.5);
    scenario.market = market(26.0, 85.0);

    let outcome = gates.evaluate(scenario.inputs()).await;
    assert!(!find(&outcome.evidence, "fatigue").ok);
    // 완화가 결과를 바꾸지 못하면 슬롯을 소비하지 않음
    let symbol = Symbol::new("DOGEUSDT");
    assert_eq!(store.last_relaxation(&symbol, GuardKind::Fatigue).await, None);
}

// ===== 쿨다운

#[tokio::test]
async fn test_relaxation_granted_once_per_cooldown_window() {
    let (gates, store) = evaluator();
    let mut scenario = Scenario::passing();
    scenario.regime = RegimeLabel::TrendingBull;
    scenario.factors = factor_set("SOLUSDT", true, 0.4);
    scenario.market = market(17.0, 74.0);

    let first = gates.evaluate(scenario.inputs()).await;
    assert!(find(&first.evidence, "fatigue").ok);

    // 10분 뒤 같은 조건: 쿨다운 중이므로 기본 상한 적용
    scenario.as_of += Duration::minutes(10);
    scenario.market.signal_bar_close += Duration::minutes(10);
    let second = gates.evaluate(scenario.inputs()).await;
    assert!(!find(&second.evidence, "fatigue").ok);
    let relaxation = find(&second.evidence, "fatigue_relaxation");
    assert!(!relaxation.ok);
    assert!(!relaxation.blocking);

    // 30분 경과 후 다시 허용
    scenario.as_of += Duration::minutes(20);
    scenario.market.signal_bar_close += Duration::minutes(20);
    let third = gates.evaluate(scenario.inputs()).await;
    assert!(find(&third.evidence, "fatigue").ok);

    let symbol = Symbol::new("SOLUSDT");
    assert_eq!(
        store.last_relaxation(&symbol, GuardKind::Fatigue).await,
        Some(scenario.as_of)
    );
}

#[tokio::test]
async fn test_identical_inputs_produce_identical_evidence() {
    let (first_gates, _) = evaluator();
    let (second_gates, _) = evaluator();
    let scenario = Scenario::passing();

    let first = first_gates.evaluate(scenario.inputs()).await;
    let second = second_gates.evaluate(scenario.inputs()).await;
    assert_eq!(first, second);
}

#[test]
fn test_thresholds_above_safety_ceiling_rejected() {
    let mut thresholds = RiskThresholds::default();
    thresholds.guards.fatigue.trending_return_pct = 30.0;
    let store: Arc<dyn CooldownStore> = Arc::new(InMemoryCooldownStore::new());
    assert!(GateEvaluator::new(thresholds, store).is_err());
}
