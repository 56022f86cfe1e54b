//! 게이트/가드 임계값 설정.
//!
//! 진입 게이트, 레짐별 가드, 호가창 미시구조 검사를 위한
//! 설정 구조체를 정의합니다.
//!
//! 각 가드에는 설정으로 바꿀 수 없는 절대 안전 상한이 있습니다.
//! 안전 상한을 넘는 설정은 로드 시점에 거부되고,
//! 평가 시점에도 레짐 완화 값은 안전 상한으로 잘립니다.

use serde::{Deserialize, Serialize};

/// 피로 가드 24h 수익률 절대 상한 (%).
pub const SAFETY_MAX_FATIGUE_RETURN_PCT: f64 = 25.0;

/// 피로 가드 RSI 과매수 절대 상한.
pub const SAFETY_MAX_FATIGUE_RSI: f64 = 80.0;

/// 신선도 가드 최대 캔들 수 절대 상한.
pub const SAFETY_MAX_FRESHNESS_BARS: f64 = 5.0;

/// 신선도 가드 ATR 이동 절대 상한.
pub const SAFETY_MAX_ATR_MOVE: f64 = 2.0;

/// 늦은 체결 가드 지연 절대 상한 (초).
pub const SAFETY_MAX_LATE_FILL_SECS: f64 = 60.0;

/// 진입 게이트 설정 (설정 `[gates]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// 최소 내부 점수 (기본값: 75)
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// 최소 VADR (기본값: 1.8)
    #[serde(default = "default_min_vadr")]
    pub min_vadr: f64,

    /// 펀딩 다이버전스 z-score 절대값 기준 (기본값: 2.0)
    #[serde(default = "default_funding_z")]
    pub funding_z_threshold: f64,

    /// 가격/VWAP 최소 비율 (기본값: 1.0)
    #[serde(default = "default_min_vwap_ratio")]
    pub min_price_vwap_ratio: f64,
}

/// 피로 가드 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueConfig {
    /// 기본 24h 수익률 상한 (%)
    #[serde(default = "default_fatigue_baseline")]
    pub baseline_return_pct: f64,

    /// 추세 레짐 완화 상한 (%)
    #[serde(default = "default_fatigue_trending")]
    pub trending_return_pct: f64,

    /// 4h RSI 과매수 기준
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
}

/// 신선도 가드 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// 기본 최대 경과 캔들 수
    #[serde(default = "default_freshness_bars")]
    pub baseline_max_bars: f64,

    /// 추세 레짐 완화 최대 경과 캔들 수
    #[serde(default = "default_freshness_trending_bars")]
    pub trending_max_bars: f64,

    /// 시그널 이후 최대 가격 이동 (ATR 배수)
    #[serde(default = "default_max_atr_move")]
    pub max_atr_move: f64,

    /// 완화 조건: 최소 VADR
    #[serde(default = "default_trending_min_vadr")]
    pub trending_min_vadr: f64,

    /// 완화 조건: 최대 스프레드 (bps)
    #[serde(default = "default_trending_max_spread")]
    pub trending_max_spread_bps: f64,
}

/// 늦은 체결 가드 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFillConfig {
    /// 기본 최대 지연 (초)
    #[serde(default = "default_late_fill_secs")]
    pub baseline_max_delay_secs: f64,

    /// 추세 레짐 완화 최대 지연 (초)
    #[serde(default = "default_late_fill_trending_secs")]
    pub trending_max_delay_secs: f64,

    /// 완화 조건: 인프라 p99 지연 상한 (ms)
    #[serde(default = "default_max_p99_ms")]
    pub trending_max_p99_ms: f64,

    /// 완화 조건: 시그널 대비 가격 거리 상한 (ATR 배수)
    #[serde(default = "default_max_atr_distance")]
    pub trending_max_atr_distance: f64,
}

/// 가드 설정 (설정 `[guards]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// 피로 가드
    #[serde(default)]
    pub fatigue: FatigueConfig,

    /// 신선도 가드
    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// 늦은 체결 가드
    #[serde(default)]
    pub late_fill: LateFillConfig,

    /// 완화 쿨다운 (초, 기본값: 1800)
    #[serde(default = "default_cooldown_secs")]
    pub relaxation_cooldown_secs: u64,
}

/// 미시구조 검사 설정 (설정 `[microstructure]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrostructureConfig {
    /// 최대 스프레드 (bps, 기본값: 50)
    #[serde(default = "default_max_spread_bps")]
    pub max_spread_bps: f64,

    /// 최소 호가 깊이 (USD, 기본값: 100,000)
    #[serde(default = "default_min_depth_usd")]
    pub min_depth_usd: f64,

    /// 깊이 계산 범위 (중간가 대비 %, 기본값: 2)
    #[serde(default = "default_depth_band_pct")]
    pub depth_band_pct: f64,

    /// 거래소 원본 호가창만 허용 (기본값: true)
    #[serde(default = "default_true")]
    pub require_venue_native: bool,
}

/// 게이트/가드/미시구조 임계값 전체.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// 진입 게이트
    #[serde(default)]
    pub gates: GateConfig,
    /// 가드
    #[serde(default)]
    pub guards: GuardConfig,
    /// 미시구조
    #[serde(default)]
    pub microstructure: MicrostructureConfig,
}

// 기본값 함수들
fn default_min_score() -> f64 {
    75.0
}

fn default_min_vadr() -> f64 {
    1.8
}

fn default_funding_z() -> f64 {
    2.0
}

fn default_min_vwap_ratio() -> f64 {
    1.0
}

fn default_fatigue_baseline() -> f64 {
    12.0
}

fn default_fatigue_trending() -> f64 {
    18.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_freshness_bars() -> f64 {
    2.0
}

fn default_freshness_trending_bars() -> f64 {
    3.0
}

fn default_max_atr_move() -> f64 {
    1.2
}

fn default_trending_min_vadr() -> f64 {
    1.75
}

fn default_trending_max_spread() -> f64 {
    30.0
}

fn default_late_fill_secs() -> f64 {
    30.0
}

fn default_late_fill_trending_secs() -> f64 {
    45.0
}

fn default_max_p99_ms() -> f64 {
    400.0
}

fn default_max_atr_distance() -> f64 {
    1.2
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_max_spread_bps() -> f64 {
    50.0
}

fn default_min_depth_usd() -> f64 {
    100_000.0
}

fn default_depth_band_pct() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            min_vadr: default_min_vadr(),
            funding_z_threshold: default_funding_z(),
            min_price_vwap_ratio: default_min_vwap_ratio(),
        }
    }
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            baseline_return_pct: default_fatigue_baseline(),
            trending_return_pct: default_fatigue_trending(),
            rsi_overbought: default_rsi_overbought(),
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            baseline_max_bars: default_freshness_bars(),
            trending_max_bars: default_freshness_trending_bars(),
            max_atr_move: default_max_atr_move(),
            trending_min_vadr: default_trending_min_vadr(),
            trending_max_spread_bps: default_trending_max_spread(),
        }
    }
}

impl Default for LateFillConfig {
    fn default() -> Self {
        Self {
            baseline_max_delay_secs: default_late_fill_secs(),
            trending_max_delay_secs: default_late_fill_trending_secs(),
            trending_max_p99_ms: default_max_p99_ms(),
            trending_max_atr_distance: default_max_atr_distance(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            fatigue: FatigueConfig::default(),
            freshness: FreshnessConfig::default(),
            late_fill: LateFillConfig::default(),
            relaxation_cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for MicrostructureConfig {
    fn default() -> Self {
        Self {
            max_spread_bps: default_max_spread_bps(),
            min_depth_usd: default_min_depth_usd(),
            depth_band_pct: default_depth_band_pct(),
            require_venue_native: true,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigValidationError::InvalidValue(format!(
            "{name}은(는) 0보다 커야 합니다: {value}"
        )))
    }
}

fn within_ceiling(name: &str, value: f64, ceiling: f64) -> Result<(), ConfigValidationError> {
    positive(name, value)?;
    if value > ceiling {
        return Err(ConfigValidationError::AboveSafetyCeiling {
            name: name.to_string(),
            value,
            ceiling,
        });
    }
    Ok(())
}

impl GateConfig {
    /// 설정 검증.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.min_score.is_finite() && (0.0..=100.0).contains(&self.min_score)) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "min_score는 0~100 사이여야 합니다: {}",
                self.min_score
            )));
        }
        positive("min_vadr", self.min_vadr)?;
        positive("funding_z_threshold", self.funding_z_threshold)?;
        positive("min_price_vwap_ratio", self.min_price_vwap_ratio)
    }
}

impl GuardConfig {
    /// 설정 검증. 안전 상한을 넘는 값은 거부됩니다.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let fatigue = &self.fatigue;
        within_ceiling(
            "fatigue.baseline_return_pct",
            fatigue.baseline_return_pct,
            SAFETY_MAX_FATIGUE_RETURN_PCT,
        )?;
        within_ceiling(
            "fatigue.trending_return_pct",
            fatigue.trending_return_pct,
            SAFETY_MAX_FATIGUE_RETURN_PCT,
        )?;
        within_ceiling("fatigue.rsi_overbought", fatigue.rsi_overbought, SAFETY_MAX_FATIGUE_RSI)?;

        let freshness = &self.freshness;
        within_ceiling(
            "freshness.baseline_max_bars",
            freshness.baseline_max_bars,
            SAFETY_MAX_FRESHNESS_BARS,
        )?;
        within_ceiling(
            "freshness.trending_max_bars",
            freshness.trending_max_bars,
            SAFETY_MAX_FRESHNESS_BARS,
        )?;
        within_ceiling("freshness.max_atr_move", freshness.max_atr_move, SAFETY_MAX_ATR_MOVE)?;
        positive("freshness.trending_min_vadr", freshness.trending_min_vadr)?;
        positive("freshness.trending_max_spread_bps", freshness.trending_max_spread_bps)?;

        let late_fill = &self.late_fill;
        within_ceiling(
            "late_fill.baseline_max_delay_secs",
            late_fill.baseline_max_delay_secs,
            SAFETY_MAX_LATE_FILL_SECS,
        )?;
        within_ceiling(
            "late_fill.trending_max_delay_secs",
            late_fill.trending_max_delay_secs,
            SAFETY_MAX_LATE_FILL_SECS,
        )?;
        positive("late_fill.trending_max_p99_ms", late_fill.trending_max_p99_ms)?;
        positive("late_fill.trending_max_atr_distance", late_fill.trending_max_atr_distance)?;

        if self.relaxation_cooldown_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "relaxation_cooldown_secs는 0보다 커야 합니다".into(),
            ));
        }
        Ok(())
    }
}

impl MicrostructureConfig {
    /// 설정 검증.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        positive("max_spread_bps", self.max_spread_bps)?;
        positive("min_depth_usd", self.min_depth_usd)?;
        positive("depth_band_pct", self.depth_band_pct)?;
        if self.depth_band_pct >= 100.0 {
            return Err(ConfigValidationError::InvalidValue(
                "depth_band_pct는 100 미만이어야 합니다".into(),
            ));
        }
        Ok(())
    }
}

impl RiskThresholds {
    /// 전체 임계값 검증.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.gates.validate()?;
        self.guards.validate()?;
        self.microstructure.validate()
    }
}

/// 설정 검증 오류.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("잘못된 설정 값: {0}")]
    InvalidValue(String),

    #[error("{name} = {value}: 안전 상한 {ceiling} 초과")]
    AboveSafetyCeiling {
        name: String,
        value: f64,
        ceiling: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = RiskThresholds::default();

        assert_eq!(thresholds.gates.min_score, 75.0);
        assert_eq!(thresholds.gates.min_vadr, 1.8);
        assert_eq!(thresholds.guards.fatigue.baseline_return_pct, 12.0);
        assert_eq!(thresholds.guards.freshness.baseline_max_bars, 2.0);
        assert_eq!(thresholds.guards.late_fill.baseline_max_delay_secs, 30.0);
        assert_eq!(thresholds.guards.relaxation_cooldown_secs, 1800);
        assert_eq!(thresholds.microstructure.max_spread_bps, 50.0);
        assert!(thresholds.microstructure.require_venue_native);
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_fatigue_above_safety_rejected() {
        let mut guards = GuardConfig::default();
        guards.fatigue.trending_return_pct = 30.0;
        assert_eq!(
            guards.validate(),
            Err(ConfigValidationError::AboveSafetyCeiling {
                name: "fatigue.trending_return_pct".to_string(),
                value: 30.0,
                ceiling: SAFETY_MAX_FATIGUE_RETURN_PCT,
            })
        );
    }

    #[test]
    fn test_late_fill_above_safety_rejected() {
        let mut guards = GuardConfig::default();
        guards.late_fill.trending_max_delay_secs = 90.0;
        assert!(matches!(
            guards.validate(),
            Err(ConfigValidationError::AboveSafetyCeiling { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let gates = GateConfig { min_score: 120.0, ..Default::default() };
        assert!(gates.validate().is_err());

        let micro = MicrostructureConfig { min_depth_usd: 0.0, ..Default::default() };
        assert!(micro.validate().is_err());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let json = r#"{"gates": {"min_score": 80.0}, "guards": {"fatigue": {"baseline_return_pct": 10.0}}}"#;
        let thresholds: RiskThresholds = serde_json::from_str(json).unwrap();
        assert_eq!(thresholds.gates.min_score, 80.0);
        assert_eq!(thresholds.gates.min_vadr, 1.8);
        assert_eq!(thresholds.guards.fatigue.baseline_return_pct, 10.0);
        assert_eq!(thresholds.guards.fatigue.trending_return_pct, 18.0);
    }
}
