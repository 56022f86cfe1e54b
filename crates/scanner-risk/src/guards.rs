//! 레짐 인식 가드.
//!
//! 세 가드(피로, 신선도, 늦은 체결)는 서로 독립적으로 판단합니다.
//! 추세 레짐에서는 추가 조건을 만족할 때만 임계값이 완화되며,
//! 완화는 (심볼, 가드) 키당 쿨다운 기간에 한 번만 허용됩니다.
//! 완화 슬롯은 완화가 결과를 바꿀 때만 소비됩니다.
//!
//! 모든 임계값은 평가 시점에 절대 안전 상한으로 잘립니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use scanner_core::{GateEvidence, GateFault, MarketContext, MomentumCore, RegimeLabel, Symbol};

use crate::config::{
    GuardConfig, SAFETY_MAX_ATR_MOVE, SAFETY_MAX_FATIGUE_RETURN_PCT, SAFETY_MAX_FATIGUE_RSI,
    SAFETY_MAX_FRESHNESS_BARS, SAFETY_MAX_LATE_FILL_SECS,
};
use crate::cooldown::{CooldownStore, GuardKind};
use crate::rounding::{check, compare, Comparison, Measure};

/// 가드 평가 입력.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    /// 심볼
    pub symbol: &'a Symbol,
    /// 적용 레짐
    pub regime: RegimeLabel,
    /// 모멘텀 코어 (재가속 조건)
    pub momentum: &'a MomentumCore,
    /// 시장 컨텍스트
    pub market: &'a MarketContext,
    /// 호가창 스프레드 (bps). 호가창 오류 시 `None`.
    pub spread_bps: Option<f64>,
    /// 사이클 업스트림 지연 p99 (ms)
    pub infra_p99_ms: Option<f64>,
    /// 평가 시각
    pub as_of: DateTime<Utc>,
}

/// 가드 평가기.
pub struct GuardEvaluator {
    config: GuardConfig,
    cooldown: Arc<dyn CooldownStore>,
}

impl std::fmt::Debug for GuardEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardEvaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GuardEvaluator {
    /// 새 평가기를 생성합니다.
    pub fn new(config: GuardConfig, cooldown: Arc<dyn CooldownStore>) -> Self {
        Self { config, cooldown }
    }

    /// 설정 조회.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn cooldown_window(&self) -> Duration {
        let secs = self.config.relaxation_cooldown_secs.min(i32::MAX as u64);
        Duration::seconds(secs as i64)
    }

    /// 완화 슬롯을 요청하고 결과를 세부 증거로 남깁니다.
    async fn request_relaxation(
        &self,
        ctx: &GuardContext<'_>,
        guard: GuardKind,
        evidence: &mut Vec<GateEvidence>,
    ) -> bool {
        let granted = self
            .cooldown
            .try_acquire(ctx.symbol, guard, ctx.as_of, self.cooldown_window())
            .await;

        evidence.push(GateEvidence::detail(
            guard.relaxation_evidence(),
            if granted { 1.0 } else { 0.0 },
            1.0,
            granted,
        ));

        if granted {
            tracing::info!(
                symbol = %ctx.symbol,
                guard = %guard,
                regime = %ctx.regime,
                "추세 레짐 가드 완화 적용"
            );
        }
        granted
    }

    /// 피로 가드.
    ///
    /// 24h 수익률이 상한 이하이거나 4h RSI가 과매수 기준 이하이면 통과합니다.
    /// 추세 레짐에서 재가속 조건이 성립하면 수익률 상한이 완화됩니다.
    pub async fn fatigue(&self, ctx: &GuardContext<'_>) -> Vec<GateEvidence> {
        let cfg = &self.config.fatigue;
        let baseline = cfg.baseline_return_pct.min(SAFETY_MAX_FATIGUE_RETURN_PCT);
        let rsi_ceiling = cfg.rsi_overbought.min(SAFETY_MAX_FATIGUE_RSI);
        let ret = ctx.market.return_24h_pct;
        let rsi = ctx.market.rsi_4h;

        let rsi_check = compare(Measure::Rsi, rsi, rsi_ceiling, Comparison::AtMost);
        let ret_check = compare(Measure::ReturnPct, ret, baseline, Comparison::AtMost);
        let (Some((rsi_value, rsi_threshold, rsi_ok)), Some((ret_value, ret_threshold, ret_ok))) =
            (rsi_check, ret_check)
        else {
            return vec![
                GateEvidence::faulted(
                    GuardKind::Fatigue.as_str(),
                    baseline,
                    GateFault::NonFiniteInput,
                ),
                check("fatigue_rsi", Measure::Rsi, rsi, rsi_ceiling, Comparison::AtMost)
                    .into_detail(),
            ];
        };

        let mut evidence = Vec::with_capacity(3);
        let rsi_detail = GateEvidence::detail("fatigue_rsi", rsi_value, rsi_threshold, rsi_ok);

        if ret_ok || rsi_ok {
            evidence.push(GateEvidence::check(
                GuardKind::Fatigue.as_str(),
                ret_value,
                ret_threshold,
                true,
            ));
            evidence.push(rsi_detail);
            return evidence;
        }

        let mut outcome =
            GateEvidence::check(GuardKind::Fatigue.as_str(), ret_value, ret_threshold, false);
        let mut relaxation = Vec::new();
        if ctx.regime.is_trending() && ctx.momentum.is_reaccelerating() {
            let relaxed = cfg.trending_return_pct.min(SAFETY_MAX_FATIGUE_RETURN_PCT);
            if let Some((value, threshold, true)) =
                compare(Measure::ReturnPct, ret, relaxed, Comparison::AtMost)
            {
                if self
                    .request_relaxation(ctx, GuardKind::Fatigue, &mut relaxation)
                    .await
                {
                    outcome =
                        GateEvidence::check(GuardKind::Fatigue.as_str(), value, threshold, true);
                }
            }
        }

        evidence.push(outcome);
        evidence.push(rsi_detail);
        evidence.extend(relaxation);
        evidence
    }

    /// 신선도 가드.
    ///
    /// 시그널 캔들 이후 경과 캔들 수와 ATR 배수 가격 이동을 각각 검사합니다.
    /// 추세 레짐에서는 VADR과 스프레드 조건을 함께 만족할 때만 캔들 수 기준이 완화됩니다.
    /// 가격 이동 검사가 실패하면 완화해도 결과가 바뀌지 않으므로 슬롯을 요청하지 않습니다.
    pub async fn freshness(&self, ctx: &GuardContext<'_>) -> Vec<GateEvidence> {
        let cfg = &self.config.freshness;
        let atr_limit = cfg.max_atr_move.min(SAFETY_MAX_ATR_MOVE);
        let baseline = cfg.baseline_max_bars.min(SAFETY_MAX_FRESHNESS_BARS);
        let bars = ctx.market.bars_since_signal(ctx.as_of);

        let atr_evidence = self.atr_move(ctx.market, atr_limit);
        let mut bars_evidence =
            check("freshness_bars", Measure::Bars, bars, baseline, Comparison::AtMost);
        let mut relaxation = Vec::new();

        let relaxable = bars_evidence.fault.is_none()
            && !bars_evidence.ok
            && atr_evidence.ok
            && ctx.regime.is_trending();
        if relaxable && self.freshness_liquid_enough(ctx) {
            let relaxed = cfg.trending_max_bars.min(SAFETY_MAX_FRESHNESS_BARS);
            if let Some((value, threshold, true)) =
                compare(Measure::Bars, bars, relaxed, Comparison::AtMost)
            {
                if self
                    .request_relaxation(ctx, GuardKind::Freshness, &mut relaxation)
                    .await
                {
                    bars_evidence = GateEvidence::check("freshness_bars", value, threshold, true);
                }
            }
        }

        let mut evidence = Vec::with_capacity(3);
        evidence.push(bars_evidence);
        evidence.push(atr_evidence);
        evidence.extend(relaxation);
        evidence
    }

    /// 신선도 완화 조건: VADR 하한과 스프레드 상한.
    fn freshness_liquid_enough(&self, ctx: &GuardContext<'_>) -> bool {
        let cfg = &self.config.freshness;
        let vadr_ok = ctx
            .market
            .vadr
            .and_then(|v| compare(Measure::Vadr, v, cfg.trending_min_vadr, Comparison::AtLeast))
            .is_some_and(|(_, _, ok)| ok);
        let spread_ok = ctx
            .spread_bps
            .and_then(|s| {
                compare(Measure::SpreadBps, s, cfg.trending_max_spread_bps, Comparison::AtMost)
            })
            .is_some_and(|(_, _, ok)| ok);
        vadr_ok && spread_ok
    }

    fn atr_move(&self, market: &MarketContext, limit: f64) -> GateEvidence {
        check(
            "freshness_atr_move",
            Measure::AtrMultiple,
            market.price_move_atr(),
            limit,
            Comparison::AtMost,
        )
    }

    /// 늦은 체결 가드.
    ///
    /// 시그널 캔들 종료 후 지연이 기준 이하여야 합니다.
    /// 추세 레짐에서는 인프라 지연 p99와 ATR 가격 거리 조건을 함께 만족할 때만 완화됩니다.
    pub async fn late_fill(&self, ctx: &GuardContext<'_>) -> Vec<GateEvidence> {
        let cfg = &self.config.late_fill;
        let baseline = cfg.baseline_max_delay_secs.min(SAFETY_MAX_LATE_FILL_SECS);
        let delay = ctx.market.delay_secs(ctx.as_of);

        let baseline_evidence =
            check("late_fill_delay", Measure::DelaySecs, delay, baseline, Comparison::AtMost);
        if baseline_evidence.ok || baseline_evidence.fault.is_some() || !ctx.regime.is_trending() {
            return vec![baseline_evidence];
        }

        let infra_ok = ctx
            .infra_p99_ms
            .and_then(|p99| {
                compare(Measure::LatencyMs, p99, cfg.trending_max_p99_ms, Comparison::AtMost)
            })
            .is_some_and(|(_, _, ok)| ok);
        let distance_ok = compare(
            Measure::AtrMultiple,
            ctx.market.price_move_atr(),
            cfg.trending_max_atr_distance,
            Comparison::AtMost,
        )
        .is_some_and(|(_, _, ok)| ok);
        if !(infra_ok && distance_ok) {
            return vec![baseline_evidence];
        }

        let relaxed = cfg.trending_max_delay_secs.min(SAFETY_MAX_LATE_FILL_SECS);
        let Some((value, threshold, true)) =
            compare(Measure::DelaySecs, delay, relaxed, Comparison::AtMost)
        else {
            return vec![baseline_evidence];
        };

        let mut relaxation = Vec::new();
        let outcome = if self
            .request_relaxation(ctx, GuardKind::LateFill, &mut relaxation)
            .await
        {
            GateEvidence::check("late_fill_delay", value, threshold, true)
        } else {
            baseline_evidence
        };

        let mut evidence = vec![outcome];
        evidence.extend(relaxation);
        evidence
    }

    /// 세 가드를 순서대로 평가합니다.
    pub async fn evaluate_all(&self, ctx: &GuardContext<'_>) -> Vec<GateEvidence> {
        let mut evidence = self.fatigue(ctx).await;
        evidence.extend(self.freshness(ctx).await);
        evidence.extend(self.late_fill(ctx).await);
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::InMemoryCooldownStore;
    use chrono::TimeZone;
    use scanner_core::Timeframe;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 20).unwrap()
    }

    fn market(return_pct: f64, rsi: f64) -> MarketContext {
        MarketContext {
            price: 100.5,
            return_24h_pct: return_pct,
            rsi_4h: rsi,
            vadr: Some(2.0),
            vwap_24h: Some(100.0),
            funding_z: Some(2.2),
            signal_bar_close: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            signal_price: 100.0,
            atr_1h: 1.0,
        }
    }

    fn momentum(fresh: bool, acceleration: f64) -> MomentumCore {
        MomentumCore {
            value: 1.2,
            acceleration,
            accel_age_bars: 1,
            accel_fresh: fresh,
            boost: 1.0,
            coverage: Timeframe::ALL.to_vec(),
            flags: Vec::new(),
        }
    }

    fn evaluator() -> GuardEvaluator {
        GuardEvaluator::new(GuardConfig::default(), Arc::new(InMemoryCooldownStore::new()))
    }

    fn find<'a>(evidence: &'a [GateEvidence], name: &str) -> &'a GateEvidence {
        evidence.iter().find(|e| e.name == name).unwrap()
    }

    #[tokio::test]
    async fn test_fatigue_passes_when_rsi_not_overbought() {
        let guards = evaluator();
        let symbol = Symbol::new("BTCUSDT");
        let (mkt, core) = (market(20.0, 65.0), momentum(false, 0.0));
        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::Choppy,
            momentum: &core,
            market: &mkt,
            spread_bps: Some(10.0),
            infra_p99_ms: Some(100.0),
            as_of: as_of(),
        };
        let evidence = guards.fatigue(&ctx).await;
        assert!(find(&evidence, "fatigue").ok);
        assert!(!find(&evidence, "fatigue_rsi").blocking);
    }

    #[tokio::test]
    async fn test_fatigue_relaxation_requires_reacceleration() {
        let guards = evaluator();
        let symbol = Symbol::new("ETHUSDT");
        let (mkt, core) = (market(18.0, 75.0), momentum(true, -0.5));
        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::TrendingBull,
            momentum: &core,
            market: &mkt,
            spread_bps: Some(10.0),
            infra_p99_ms: Some(100.0),
            as_of: as_of(),
        };
        let evidence = guards.fatigue(&ctx).await;
        let fatigue = find(&evidence, "fatigue");
        assert!(!fatigue.ok);
        assert_eq!(fatigue.threshold, 12.0);
        assert!(evidence.iter().all(|e| e.name != "fatigue_relaxation"));
    }

    #[tokio::test]
    async fn test_fatigue_non_finite_is_fault() {
        let guards = evaluator();
        let symbol = Symbol::new("ETHUSDT");
        let (mkt, core) = (market(f64::NAN, 75.0), momentum(true, 1.0));
        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::TrendingBull,
            momentum: &core,
            market: &mkt,
            spread_bps: None,
            infra_p99_ms: None,
            as_of: as_of(),
        };
        let evidence = guards.fatigue(&ctx).await;
        assert_eq!(find(&evidence, "fatigue").fault, Some(GateFault::NonFiniteInput));
    }

    #[tokio::test]
    async fn test_freshness_trending_relaxation_needs_liquidity() {
        let guards = evaluator();
        let symbol = Symbol::new("SOLUSDT");
        let core = momentum(false, 0.0);
        let mut mkt = market(5.0, 60.0);
        // 3캔들 경과
        mkt.signal_bar_close = as_of() - Duration::hours(3);
        mkt.price = 100.5;

        let wide = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::TrendingBull,
            momentum: &core,
            market: &mkt,
            spread_bps: Some(40.0),
            infra_p99_ms: Some(100.0),
            as_of: as_of(),
        };
        let evidence = guards.freshness(&wide).await;
        assert!(!find(&evidence, "freshness_bars").ok);

        let tight = GuardContext { spread_bps: Some(25.0), ..wide };
        let evidence = guards.freshness(&tight).await;
        let bars = find(&evidence, "freshness_bars");
        assert!(bars.ok);
        assert_eq!(bars.threshold, 3.0);
        assert!(find(&evidence, "freshness_relaxation").ok);
        assert!(find(&evidence, "freshness_atr_move").ok);
    }

    #[tokio::test]
    async fn test_freshness_atr_failure_keeps_relaxation_slot() {
        let store = Arc::new(InMemoryCooldownStore::new());
        let guards = GuardEvaluator::new(GuardConfig::default(), store.clone());
        let symbol = Symbol::new("SOLUSDT");
        let core = momentum(false, 0.0);

        // 3캔들 경과, 가격이 5 ATR 이동
        let mut moved = market(5.0, 60.0);
        moved.signal_bar_close = as_of() - Duration::hours(3);
        moved.price = 105.0;
        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::TrendingBull,
            momentum: &core,
            market: &moved,
            spread_bps: Some(10.0),
            infra_p99_ms: Some(100.0),
            as_of: as_of(),
        };
        let evidence = guards.freshness(&ctx).await;
        assert!(!find(&evidence, "freshness_atr_move").ok);
        assert!(!find(&evidence, "freshness_bars").ok);
        assert!(evidence.iter().all(|e| e.name != "freshness_relaxation"));
        assert_eq!(store.last_relaxation(&symbol, GuardKind::Freshness).await, None);

        // 10분 뒤 가격이 범위 안으로 돌아오면 완화 가능
        let later = as_of() + Duration::minutes(10);
        let mut settled = moved.clone();
        settled.price = 100.5;
        let ctx = GuardContext { market: &settled, as_of: later, ..ctx };
        let evidence = guards.freshness(&ctx).await;
        assert!(find(&evidence, "freshness_bars").ok);
        assert!(find(&evidence, "freshness_atr_move").ok);
        assert!(find(&evidence, "freshness_relaxation").ok);
        assert_eq!(
            store.last_relaxation(&symbol, GuardKind::Freshness).await,
            Some(later)
        );
    }

    #[tokio::test]
    async fn test_late_fill_trending_relaxation() {
        let guards = evaluator();
        let symbol = Symbol::new("AVAXUSDT");
        let core = momentum(false, 0.0);
        let mut mkt = market(5.0, 60.0);
        mkt.signal_bar_close = as_of() - Duration::seconds(40);

        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::TrendingBull,
            momentum: &core,
            market: &mkt,
            spread_bps: Some(10.0),
            infra_p99_ms: Some(350.0),
            as_of: as_of(),
        };
        let evidence = guards.late_fill(&ctx).await;
        let delay = find(&evidence, "late_fill_delay");
        assert!(delay.ok);
        assert_eq!(delay.threshold, 45.0);

        // 인프라 지연이 크면 기본 기준 유지
        let slow = GuardContext { infra_p99_ms: Some(450.0), ..ctx };
        let evidence = evaluator().late_fill(&slow).await;
        assert!(!find(&evidence, "late_fill_delay").ok);
        assert_eq!(evidence.len(), 1);
    }

    #[tokio::test]
    async fn test_late_fill_choppy_uses_baseline() {
        let guards = evaluator();
        let symbol = Symbol::new("AVAXUSDT");
        let core = momentum(false, 0.0);
        let mut mkt = market(5.0, 60.0);
        mkt.signal_bar_close = as_of() - Duration::seconds(40);
        let ctx = GuardContext {
            symbol: &symbol,
            regime: RegimeLabel::Choppy,
            momentum: &core,
            market: &mkt,
            spread_bps: Some(10.0),
            infra_p99_ms: Some(100.0),
            as_of: as_of(),
        };
        let evidence = guards.late_fill(&ctx).await;
        assert!(!evidence[0].ok);
        assert_eq!(evidence[0].threshold, 30.0);
    }
}
