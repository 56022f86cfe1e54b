//! 게이트 평가기.
//!
//! 점수 유효성, 진입 하드 게이트, 유동성 플래그, 마이크로구조, 가드를 순서대로 평가하고
//! 증거 목록에서 최종 판정을 도출합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scanner_core::{
    BookSnapshot, CompositeScore, Decision, FactorSet, GateEvidence, GateFault, MarketContext,
    OrthogonalFactorSet, QualityFlag, RegimeLabel, RejectionKind,
};

use crate::config::{ConfigValidationError, RiskThresholds};
use crate::cooldown::CooldownStore;
use crate::entry::EntryGates;
use crate::guards::{GuardContext, GuardEvaluator};
use crate::microstructure::{MicrostructureChecker, MicrostructureReport};

/// 심볼 하나의 게이트 평가 입력.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    /// 적용 레짐
    pub regime: RegimeLabel,
    /// 원시 팩터
    pub factors: &'a FactorSet,
    /// 직교화 결과
    pub orthogonal: &'a OrthogonalFactorSet,
    /// 복합 점수
    pub score: &'a CompositeScore,
    /// 시장 컨텍스트
    pub market: &'a MarketContext,
    /// 호가창 스냅샷
    pub book: Option<&'a BookSnapshot>,
    /// 사이클 업스트림 지연 p99 (ms)
    pub infra_p99_ms: Option<f64>,
    /// 평가 시각
    pub as_of: DateTime<Utc>,
}

/// 게이트 평가 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// 전체 증거 (차단 + 세부)
    pub evidence: Vec<GateEvidence>,
    /// 최종 판정
    pub decision: Decision,
    /// 거절 유형
    pub rejection: Option<RejectionKind>,
    /// 마이크로구조 원시 측정값
    pub microstructure: MicrostructureReport,
}

/// 게이트 평가기.
#[derive(Debug)]
pub struct GateEvaluator {
    entry: EntryGates,
    guards: GuardEvaluator,
    microstructure: MicrostructureChecker,
}

impl GateEvaluator {
    /// 임계값을 검증하고 평가기를 생성합니다.
    ///
    /// # 에러
    /// 임계값이 유효하지 않거나 안전 상한을 넘으면 `ConfigValidationError`
    pub fn new(
        thresholds: RiskThresholds,
        cooldown: Arc<dyn CooldownStore>,
    ) -> Result<Self, ConfigValidationError> {
        thresholds.validate()?;
        let RiskThresholds {
            gates,
            guards,
            microstructure,
        } = thresholds;

        Ok(Self {
            entry: EntryGates::new(gates),
            guards: GuardEvaluator::new(guards, cooldown),
            microstructure: MicrostructureChecker::new(microstructure),
        })
    }

    /// 점수 유효성 증거.
    fn scoring_validity(orthogonal: &OrthogonalFactorSet) -> GateEvidence {
        if orthogonal.valid_for_scoring {
            GateEvidence::check("scoring_validity", 1.0, 1.0, true)
        } else {
            GateEvidence::faulted("scoring_validity", 1.0, GateFault::InvalidForScoring)
        }
    }

    /// 유동성 플래그 증거 (비유동이면 1, 0 이하여야 통과).
    fn liquidity_flag(factors: &FactorSet) -> GateEvidence {
        let illiquid =
            factors.volume.is_illiquid() || factors.flags.contains(&QualityFlag::Illiquid);
        let value = if illiquid { 1.0 } else { 0.0 };
        GateEvidence::check("liquidity_flag", value, 0.0, !illiquid)
    }

    /// 심볼 하나를 평가합니다.
    pub async fn evaluate(&self, inputs: GateInputs<'_>) -> GateOutcome {
        let mut evidence = vec![Self::scoring_validity(inputs.orthogonal)];
        evidence.extend(self.entry.evaluate(inputs.score, inputs.market));
        evidence.push(Self::liquidity_flag(inputs.factors));

        let microstructure = self.microstructure.evaluate(inputs.book);
        evidence.extend(microstructure.evidence.iter().cloned());

        let ctx = GuardContext {
            symbol: &inputs.factors.symbol,
            regime: inputs.regime,
            momentum: &inputs.factors.momentum,
            market: inputs.market,
            spread_bps: microstructure.spread_bps,
            infra_p99_ms: inputs.infra_p99_ms,
            as_of: inputs.as_of,
        };
        evidence.extend(self.guards.evaluate_all(&ctx).await);

        let (decision, rejection) = Decision::from_evidence(&evidence);
        tracing::debug!(
            symbol = %inputs.factors.symbol,
            decision = %decision,
            failed = evidence.iter().filter(|e| e.is_blocking_failure()).count(),
            "게이트 평가 완료"
        );

        GateOutcome {
            evidence,
            decision,
            rejection,
            microstructure,
        }
    }
}
