//! 레짐 가중치 해석기.
//!
//! 레짐 라벨을 검증된 가중치 벡터로 변환합니다.
//!
//! # 기본 가중치 (momentum / technical / volume / quality)
//!
//! | 레짐 | M | T | V | Q |
//! |------|---|---|---|---|
//! | trending_bull | 0.50 | 0.20 | 0.15 | 0.15 |
//! | choppy | 0.35 | 0.30 | 0.15 | 0.20 |
//! | high_vol | 0.30 | 0.25 | 0.20 | 0.25 |
//! | neutral | 0.40 | 0.25 | 0.15 | 0.20 |
//!
//! 소셜은 가중치 합계에서 제외되며 점수 계산 단계에서 상한이 있는 가산 항으로 처리됩니다.
//! 모멘텀 하한과 소셜 상한은 레짐 비율이 아닌 고정 절대값입니다.

use scanner_core::{FactorKind, RegimeLabel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 가중치 합계 허용 오차.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.001;

/// 가중치 검증 오류.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WeightError {
    /// 가중치 합계가 1.0이 아님
    #[error("{regime} 가중치 합계 {sum:.4} (허용: 1.0 ± {tolerance})")]
    SumMismatch {
        regime: RegimeLabel,
        sum: f64,
        tolerance: f64,
    },

    /// 모멘텀 가중치가 하한 미만
    #[error("{regime} 모멘텀 가중치 {momentum:.3} < 하한 {floor:.3}")]
    MomentumBelowFloor {
        regime: RegimeLabel,
        momentum: f64,
        floor: f64,
    },

    /// 음수 또는 유한하지 않은 가중치
    #[error("{regime} {kind} 가중치가 잘못되었습니다: {value}")]
    InvalidComponent {
        regime: RegimeLabel,
        kind: FactorKind,
        value: f64,
    },

    /// 잘못된 모멘텀 하한
    #[error("모멘텀 하한이 잘못되었습니다: {0}")]
    InvalidFloor(f64),
}

/// 레짐별 가중치 벡터.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeights {
    /// 모멘텀 가중치
    pub momentum: f64,
    /// 기술적 가중치
    pub technical: f64,
    /// 거래량 가중치
    pub volume: f64,
    /// 품질 가중치
    pub quality: f64,
}

impl RegimeWeights {
    /// 새 가중치 벡터를 생성합니다.
    pub const fn new(momentum: f64, technical: f64, volume: f64, quality: f64) -> Self {
        Self {
            momentum,
            technical,
            volume,
            quality,
        }
    }

    /// 팩터별 가중치. 소셜은 가중치 합계에 포함되지 않으므로 `None`.
    pub fn weight(&self, kind: FactorKind) -> Option<f64> {
        match kind {
            FactorKind::Momentum => Some(self.momentum),
            FactorKind::Technical => Some(self.technical),
            FactorKind::Volume => Some(self.volume),
            FactorKind::Quality => Some(self.quality),
            FactorKind::Social => None,
        }
    }

    /// 모멘텀/기술/거래량/품질 가중치 합계.
    pub fn sum(&self) -> f64 {
        self.momentum + self.technical + self.volume + self.quality
    }

    /// 불변식을 검증합니다.
    ///
    /// # 에러
    /// - 음수/NaN 가중치
    /// - 합계가 1.0 ± 0.001을 벗어남
    /// - 모멘텀 가중치가 하한 미만
    pub fn validate(&self, regime: RegimeLabel, floor: f64) -> Result<(), WeightError> {
        for kind in [
            FactorKind::Momentum,
            FactorKind::Technical,
            FactorKind::Volume,
            FactorKind::Quality,
        ] {
            let value = self.weight(kind).unwrap_or(0.0);
            if !value.is_finite() || value < 0.0 {
                return Err(WeightError::InvalidComponent { regime, kind, value });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::SumMismatch {
                regime,
                sum,
                tolerance: WEIGHT_SUM_TOLERANCE,
            });
        }

        if self.momentum < floor {
            return Err(WeightError::MomentumBelowFloor {
                regime,
                momentum: self.momentum,
                floor,
            });
        }

        Ok(())
    }
}

/// 레짐 가중치 테이블 (설정 `[weights]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeWeightTable {
    /// 추세 상승 레짐
    #[serde(default = "default_trending_bull")]
    pub trending_bull: RegimeWeights,
    /// 박스권 레짐
    #[serde(default = "default_choppy")]
    pub choppy: RegimeWeights,
    /// 고변동성 레짐
    #[serde(default = "default_high_vol")]
    pub high_vol: RegimeWeights,
    /// 인식할 수 없는 라벨의 기본 프로필
    #[serde(default = "default_neutral")]
    pub neutral: RegimeWeights,
    /// 모멘텀 가중치 하한 (절대값)
    #[serde(default = "default_momentum_floor")]
    pub momentum_floor: f64,
}

fn default_trending_bull() -> RegimeWeights {
    RegimeWeights::new(0.50, 0.20, 0.15, 0.15)
}

fn default_choppy() -> RegimeWeights {
    RegimeWeights::new(0.35, 0.30, 0.15, 0.20)
}

fn default_high_vol() -> RegimeWeights {
    RegimeWeights::new(0.30, 0.25, 0.20, 0.25)
}

fn default_neutral() -> RegimeWeights {
    RegimeWeights::new(0.40, 0.25, 0.15, 0.20)
}

fn default_momentum_floor() -> f64 {
    0.25
}

impl Default for RegimeWeightTable {
    fn default() -> Self {
        Self {
            trending_bull: default_trending_bull(),
            choppy: default_choppy(),
            high_vol: default_high_vol(),
            neutral: default_neutral(),
            momentum_floor: default_momentum_floor(),
        }
    }
}

impl RegimeWeightTable {
    /// 레짐별 가중치.
    pub fn profile(&self, label: RegimeLabel) -> &RegimeWeights {
        match label {
            RegimeLabel::TrendingBull => &self.trending_bull,
            RegimeLabel::Choppy => &self.choppy,
            RegimeLabel::HighVol => &self.high_vol,
            RegimeLabel::Neutral => &self.neutral,
        }
    }

    /// 모든 레짐의 가중치를 검증합니다.
    pub fn validate(&self) -> Result<(), WeightError> {
        if !(self.momentum_floor.is_finite() && (0.0..=1.0).contains(&self.momentum_floor)) {
            return Err(WeightError::InvalidFloor(self.momentum_floor));
        }
        for label in RegimeLabel::ALL {
            self.profile(label).validate(label, self.momentum_floor)?;
        }
        Ok(())
    }
}

/// 해석된 가중치.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeights {
    /// 적용된 레짐 프로필
    pub profile: RegimeLabel,
    /// 가중치 벡터
    pub weights: RegimeWeights,
    /// 인식할 수 없는 라벨로 기본 프로필을 사용했는지 여부
    pub fallback: bool,
}

/// 레짐 가중치 해석기.
///
/// 생성 시점에 테이블을 검증하므로, 해석은 실패하지 않습니다.
#[derive(Debug, Clone)]
pub struct WeightResolver {
    table: RegimeWeightTable,
}

impl WeightResolver {
    /// 검증된 해석기를 생성합니다.
    ///
    /// # 에러
    /// 테이블이 불변식을 위반하면 `WeightError`.
    pub fn new(table: RegimeWeightTable) -> Result<Self, WeightError> {
        table.validate()?;
        Ok(Self { table })
    }

    /// 가중치 테이블.
    pub fn table(&self) -> &RegimeWeightTable {
        &self.table
    }

    /// 레짐 라벨을 가중치로 해석합니다.
    ///
    /// 인식할 수 없는 라벨은 `neutral` 프로필로 대체됩니다.
    pub fn resolve(&self, label: &str) -> ResolvedWeights {
        match RegimeLabel::parse(label) {
            Some(profile) => ResolvedWeights {
                profile,
                weights: *self.table.profile(profile),
                fallback: false,
            },
            None => {
                tracing::warn!(label = label, "알 수 없는 레짐 라벨, neutral 프로필 사용");
                ResolvedWeights {
                    profile: RegimeLabel::Neutral,
                    weights: self.table.neutral,
                    fallback: true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_invariants() {
        let table = RegimeWeightTable::default();
        for label in RegimeLabel::ALL {
            let weights = table.profile(label);
            assert!((weights.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE, "{label}");
            assert!(weights.momentum >= table.momentum_floor, "{label}");
        }
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_sum_mismatch_rejected() {
        let table = RegimeWeightTable {
            choppy: RegimeWeights::new(0.35, 0.30, 0.15, 0.10),
            ..Default::default()
        };
        let err = WeightResolver::new(table).unwrap_err();
        assert!(matches!(err, WeightError::SumMismatch { regime: RegimeLabel::Choppy, .. }));
    }

    #[test]
    fn test_momentum_floor_rejected() {
        let table = RegimeWeightTable {
            high_vol: RegimeWeights::new(0.20, 0.30, 0.25, 0.25),
            ..Default::default()
        };
        let err = table.validate().unwrap_err();
        assert!(matches!(err, WeightError::MomentumBelowFloor { regime: RegimeLabel::HighVol, .. }));
    }

    #[test]
    fn test_negative_component_rejected() {
        let table = RegimeWeightTable {
            neutral: RegimeWeights::new(0.60, 0.45, 0.15, -0.20),
            ..Default::default()
        };
        assert!(matches!(
            table.validate(),
            Err(WeightError::InvalidComponent { kind: FactorKind::Quality, .. })
        ));
    }

    #[test]
    fn test_tolerance_boundary_accepted() {
        let table = RegimeWeightTable {
            trending_bull: RegimeWeights::new(0.5005, 0.20, 0.15, 0.15),
            ..Default::default()
        };
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let resolver = WeightResolver::new(RegimeWeightTable::default()).unwrap();

        let trending = resolver.resolve("trending_bull");
        assert_eq!(trending.profile, RegimeLabel::TrendingBull);
        assert_eq!(trending.weights.momentum, 0.50);
        assert!(!trending.fallback);

        let unknown = resolver.resolve("melt_up");
        assert_eq!(unknown.profile, RegimeLabel::Neutral);
        assert_eq!(unknown.weights, resolver.table().neutral);
        assert!(unknown.fallback);
    }

    #[test]
    fn test_social_has_no_weight() {
        let weights = RegimeWeightTable::default().trending_bull;
        assert_eq!(weights.weight(FactorKind::Social), None);
    }
}
