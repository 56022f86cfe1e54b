//! 복합 점수 계산기.
//!
//! 직교화된 팩터, 레짐 가중치, 소셜 잔차, 외부 측정 부스트를 결합해
//! 유계(bounded) 점수를 산출합니다.
//!
//! # 변환
//!
//! | 팩터 | 변환 | 비고 |
//! |------|------|------|
//! | Momentum | 시그모이드 `100 / (1 + e^(-m/s))` | s = 2.0 |
//! | Technical, Quality | 선형 `50 + 100·r` | [0, 100] 클램프 |
//! | Volume | 로그 `50 + 25·sign(r)·ln(1 + 10|r|)` | [0, 100] 클램프 |
//!
//! 비정상 입력이나 중립 처리된 잔차는 50점(중립)으로 대체됩니다.
//!
//! # 최종 점수
//!
//! ```text
//! internal = clamp(Σ w·points, 0, 100)
//! final    = clamp(internal + clamp(social, -10, +10) + boosts, 0, ceiling)
//! ```
//!
//! 계산기는 순수 함수입니다. 레짐과 가중치는 호출마다 명시적으로 전달됩니다.

use scanner_core::{
    push_flag, ComponentScore, CompositeScore, DataQuality, FactorKind, FactorSet,
    MeasurementBoosts, OrthogonalFactorSet, QualityFlag, RegimeLabel, ScoreBreakdown,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::weights::RegimeWeights;

/// 중립 점수.
pub const NEUTRAL_POINTS: f64 = 50.0;

/// 점수 설정 오류.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringConfigError {
    /// 양수여야 하는 값이 잘못됨
    #[error("{name} 값은 양수여야 합니다: {value}")]
    NonPositive { name: &'static str, value: f64 },

    /// 점수 상한이 100 미만
    #[error("점수 상한 {0}은(는) 100 이상이어야 합니다")]
    CeilingTooLow(f64),

    /// 부스트 단계 순서 오류
    #[error("{name} 부스트 임계값 순서가 잘못되었습니다 (강: {strong}, 약: {weak})")]
    TierOrder {
        name: &'static str,
        strong: f64,
        weak: f64,
    },
}

/// 측정 부스트 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    /// 펀딩 z-score 강한 단계
    #[serde(default = "default_funding_strong_z")]
    pub funding_strong_z: f64,
    /// 펀딩 강한 단계 점수
    #[serde(default = "default_funding_strong_points")]
    pub funding_strong_points: f64,
    /// 펀딩 z-score 기본 단계
    #[serde(default = "default_funding_z")]
    pub funding_z: f64,
    /// 펀딩 기본 단계 점수
    #[serde(default = "default_funding_points")]
    pub funding_points: f64,
    /// OI 잔차 강한 단계 (USD)
    #[serde(default = "default_oi_strong")]
    pub oi_strong: f64,
    /// OI 강한 단계 점수
    #[serde(default = "default_oi_strong_points")]
    pub oi_strong_points: f64,
    /// OI 잔차 기본 단계 (USD)
    #[serde(default = "default_oi")]
    pub oi: f64,
    /// OI 기본 단계 점수
    #[serde(default = "default_oi_points")]
    pub oi_points: f64,
    /// 자금 흐름 강한 단계
    #[serde(default = "default_flow_strong")]
    pub flow_strong: f64,
    /// 자금 흐름 강한 단계 점수
    #[serde(default = "default_flow_strong_points")]
    pub flow_strong_points: f64,
    /// 자금 흐름 기본 단계
    #[serde(default = "default_flow")]
    pub flow: f64,
    /// 자금 흐름 기본 단계 점수
    #[serde(default = "default_flow_points")]
    pub flow_points: f64,
    /// 개별 부스트 상한
    #[serde(default = "default_per_boost_cap")]
    pub per_boost_cap: f64,
    /// 부스트 합계 상한
    #[serde(default = "default_total_cap")]
    pub total_cap: f64,
}

fn default_funding_strong_z() -> f64 {
    2.5
}
fn default_funding_strong_points() -> f64 {
    2.0
}
fn default_funding_z() -> f64 {
    2.0
}
fn default_funding_points() -> f64 {
    1.0
}
fn default_oi_strong() -> f64 {
    2_000_000.0
}
fn default_oi_strong_points() -> f64 {
    1.5
}
fn default_oi() -> f64 {
    1_000_000.0
}
fn default_oi_points() -> f64 {
    0.5
}
fn default_flow_strong() -> f64 {
    0.015
}
fn default_flow_strong_points() -> f64 {
    1.0
}
fn default_flow() -> f64 {
    0.01
}
fn default_flow_points() -> f64 {
    0.5
}
fn default_per_boost_cap() -> f64 {
    2.0
}
fn default_total_cap() -> f64 {
    4.0
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            funding_strong_z: default_funding_strong_z(),
            funding_strong_points: default_funding_strong_points(),
            funding_z: default_funding_z(),
            funding_points: default_funding_points(),
            oi_strong: default_oi_strong(),
            oi_strong_points: default_oi_strong_points(),
            oi: default_oi(),
            oi_points: default_oi_points(),
            flow_strong: default_flow_strong(),
            flow_strong_points: default_flow_strong_points(),
            flow: default_flow(),
            flow_points: default_flow_points(),
            per_boost_cap: default_per_boost_cap(),
            total_cap: default_total_cap(),
        }
    }
}

impl BoostConfig {
    fn validate(&self) -> Result<(), ScoringConfigError> {
        for (name, strong, weak) in [
            ("funding", self.funding_strong_z, self.funding_z),
            ("open_interest", self.oi_strong, self.oi),
            ("flow", self.flow_strong, self.flow),
        ] {
            if !(weak.is_finite() && strong.is_finite() && strong >= weak && weak > 0.0) {
                return Err(ScoringConfigError::TierOrder { name, strong, weak });
            }
        }
        for (name, value) in [
            ("per_boost_cap", self.per_boost_cap),
            ("total_cap", self.total_cap),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScoringConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}

/// 점수 설정 (설정 `[scoring]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// 모멘텀 시그모이드 스케일
    #[serde(default = "default_sigmoid_scale")]
    pub momentum_sigmoid_scale: f64,
    /// 거래량 로그 변환 진폭
    #[serde(default = "default_volume_log_scale")]
    pub volume_log_scale: f64,
    /// 거래량 로그 변환 이득
    #[serde(default = "default_volume_log_gain")]
    pub volume_log_gain: f64,
    /// 선형 변환 이득 (기술/품질)
    #[serde(default = "default_linear_gain")]
    pub linear_gain: f64,
    /// 소셜 항 상한 (절대값, 점수 단위)
    #[serde(default = "default_social_cap")]
    pub social_cap: f64,
    /// 최종 점수 상한
    #[serde(default = "default_score_ceiling")]
    pub score_ceiling: f64,
    /// 측정 부스트
    #[serde(default)]
    pub boosts: BoostConfig,
}

fn default_sigmoid_scale() -> f64 {
    2.0
}
fn default_volume_log_scale() -> f64 {
    25.0
}
fn default_volume_log_gain() -> f64 {
    10.0
}
fn default_linear_gain() -> f64 {
    100.0
}
fn default_social_cap() -> f64 {
    10.0
}
fn default_score_ceiling() -> f64 {
    110.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            momentum_sigmoid_scale: default_sigmoid_scale(),
            volume_log_scale: default_volume_log_scale(),
            volume_log_gain: default_volume_log_gain(),
            linear_gain: default_linear_gain(),
            social_cap: default_social_cap(),
            score_ceiling: default_score_ceiling(),
            boosts: BoostConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        for (name, value) in [
            ("momentum_sigmoid_scale", self.momentum_sigmoid_scale),
            ("volume_log_scale", self.volume_log_scale),
            ("volume_log_gain", self.volume_log_gain),
            ("linear_gain", self.linear_gain),
            ("social_cap", self.social_cap),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScoringConfigError::NonPositive { name, value });
            }
        }
        if !(self.score_ceiling.is_finite() && self.score_ceiling >= 100.0) {
            return Err(ScoringConfigError::CeilingTooLow(self.score_ceiling));
        }
        self.boosts.validate()
    }
}

/// 외부 측정 입력 (부스트 계산용).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementInputs {
    /// 거래소 간 펀딩 z-score
    pub funding_z: Option<f64>,
    /// 펀딩 다이버전스 존재 여부
    pub funding_divergence: bool,
    /// OI 잔차 (USD)
    pub oi_residual: Option<f64>,
    /// 자금 흐름(ETF) 틴트
    pub flow_tint: Option<f64>,
}

/// 복합 점수 계산기.
#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    config: ScoringConfig,
}

impl CompositeScorer {
    /// 새 계산기를 생성합니다.
    ///
    /// # 에러
    /// 설정이 잘못되면 `ScoringConfigError`.
    pub fn new(config: ScoringConfig) -> Result<Self, ScoringConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 설정.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 모멘텀 시그모이드 점수.
    pub fn momentum_points(&self, momentum: f64) -> Option<f64> {
        momentum
            .is_finite()
            .then(|| 100.0 / (1.0 + (-momentum / self.config.momentum_sigmoid_scale).exp()))
    }

    /// 선형 점수 (기술/품질).
    pub fn linear_points(&self, residual: f64) -> Option<f64> {
        residual
            .is_finite()
            .then(|| (NEUTRAL_POINTS + self.config.linear_gain * residual).clamp(0.0, 100.0))
    }

    /// 로그 점수 (거래량).
    pub fn volume_points(&self, residual: f64) -> Option<f64> {
        residual.is_finite().then(|| {
            let magnitude = (1.0 + residual.abs() * self.config.volume_log_gain).ln();
            (NEUTRAL_POINTS + self.config.volume_log_scale * residual.signum() * magnitude)
                .clamp(0.0, 100.0)
        })
    }

    /// 소셜 항 상한 적용.
    pub fn cap_social(&self, social: f64) -> f64 {
        if social.is_finite() {
            social.clamp(-self.config.social_cap, self.config.social_cap)
        } else {
            0.0
        }
    }

    /// 측정 부스트를 계산합니다.
    ///
    /// 각 부스트는 개별 상한, 합계는 총 상한이 적용됩니다.
    /// 누락되거나 유한하지 않은 측정값은 0점입니다.
    pub fn boosts(&self, inputs: &MeasurementInputs) -> MeasurementBoosts {
        let cfg = &self.config.boosts;
        let tier = |value: Option<f64>, strong: f64, strong_pts: f64, weak: f64, weak_pts: f64| -> f64 {
            let points = match value.filter(|v| v.is_finite()) {
                Some(v) if v >= strong => strong_pts,
                Some(v) if v >= weak => weak_pts,
                _ => 0.0,
            };
            points.min(cfg.per_boost_cap)
        };

        let funding = if inputs.funding_divergence {
            tier(
                inputs.funding_z.map(f64::abs),
                cfg.funding_strong_z,
                cfg.funding_strong_points,
                cfg.funding_z,
                cfg.funding_points,
            )
        } else {
            0.0
        };
        let open_interest = tier(
            inputs.oi_residual,
            cfg.oi_strong,
            cfg.oi_strong_points,
            cfg.oi,
            cfg.oi_points,
        );
        let flow = tier(
            inputs.flow_tint,
            cfg.flow_strong,
            cfg.flow_strong_points,
            cfg.flow,
            cfg.flow_points,
        );

        MeasurementBoosts {
            funding,
            open_interest,
            flow,
            total: (funding + open_interest + flow).min(cfg.total_cap),
        }
    }

    /// 복합 점수를 계산합니다.
    ///
    /// # 인자
    /// * `regime` - 적용된 레짐 프로필 (로그/감사용)
    /// * `weights` - 검증된 레짐 가중치
    /// * `factors` - 원시 팩터 집합 (모멘텀 값과 유동성 판정에 사용)
    /// * `orthogonal` - 직교화된 잔차
    /// * `measurements` - 외부 측정 부스트 입력
    ///
    /// # 반환
    /// (점수, 점수 분해)
    pub fn score(
        &self,
        regime: RegimeLabel,
        weights: &RegimeWeights,
        factors: &FactorSet,
        orthogonal: &OrthogonalFactorSet,
        measurements: &MeasurementInputs,
    ) -> (CompositeScore, ScoreBreakdown) {
        let mut flags: Vec<QualityFlag> = Vec::new();
        let mut components = Vec::with_capacity(4);
        let illiquid = factors.volume.is_illiquid();
        if illiquid {
            push_flag(&mut flags, QualityFlag::Illiquid);
        }
        if !orthogonal.valid_for_scoring {
            push_flag(&mut flags, QualityFlag::InvalidForScoring);
        }

        for kind in [
            FactorKind::Momentum,
            FactorKind::Technical,
            FactorKind::Volume,
            FactorKind::Quality,
        ] {
            let input = match kind {
                FactorKind::Momentum => factors.momentum.value,
                other => orthogonal.residual(other).unwrap_or(f64::NAN),
            };
            let points = if orthogonal.is_degraded(kind) {
                None
            } else {
                match kind {
                    FactorKind::Momentum => self.momentum_points(input),
                    FactorKind::Volume if illiquid => None,
                    FactorKind::Volume => self.volume_points(input),
                    _ => self.linear_points(input),
                }
            };
            let neutralized = points.is_none();
            if neutralized {
                if !input.is_finite() {
                    push_flag(&mut flags, QualityFlag::NonFiniteInput);
                }
                if !(kind == FactorKind::Volume && illiquid) {
                    push_flag(&mut flags, QualityFlag::Degraded);
                }
            }
            let points = points.unwrap_or(NEUTRAL_POINTS);
            let weight = weights.weight(kind).unwrap_or(0.0);
            components.push(ComponentScore {
                kind,
                input,
                points,
                weight,
                contribution: weight * points,
                neutralized,
            });
        }

        let weighted: f64 = components.iter().map(|c| c.contribution).sum();
        let internal = if weighted.is_finite() {
            weighted.clamp(0.0, 100.0)
        } else {
            NEUTRAL_POINTS
        };

        let social_raw = orthogonal.social_residual;
        if !social_raw.is_finite() {
            push_flag(&mut flags, QualityFlag::NonFiniteInput);
        }
        let social_capped = self.cap_social(social_raw);
        let boosts = self.boosts(measurements);
        let final_score =
            (internal + social_capped + boosts.total).clamp(0.0, self.config.score_ceiling);

        for flag in &factors.flags {
            push_flag(&mut flags, *flag);
        }
        for flag in &factors.momentum.flags {
            push_flag(&mut flags, *flag);
        }
        flags.sort();

        let data_quality = if flags.iter().any(|f| {
            matches!(
                f,
                QualityFlag::Degraded | QualityFlag::NonFiniteInput | QualityFlag::InvalidForScoring
            )
        }) {
            DataQuality::Degraded
        } else if flags.contains(&QualityFlag::PartialCoverage)
            || !orthogonal.degraded.is_empty()
            || measurements.funding_z.is_none()
            || measurements.oi_residual.is_none()
            || measurements.flow_tint.is_none()
        {
            DataQuality::Partial
        } else {
            DataQuality::Complete
        };

        tracing::debug!(
            symbol = %factors.symbol,
            regime = %regime,
            internal = internal,
            final_score = final_score,
            social = social_capped,
            boost = boosts.total,
            "복합 점수 계산"
        );

        (
            CompositeScore {
                internal_0_100: internal,
                final_with_social: final_score,
            },
            ScoreBreakdown {
                components,
                social_raw,
                social_capped,
                boosts,
                flags,
                data_quality,
            },
        )
    }
}
