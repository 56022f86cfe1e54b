//! 모멘텀 코어 계산기.
//!
//! 다중 타임프레임 수익률을 ATR로 정규화한 뒤 레짐별 가중치로 합산하여
//! 보호되는 기준 팩터(MomentumCore)를 산출합니다.
//!
//! # 계산 절차
//!
//! 1. 타임프레임별 마지막 캔들 수익률(%) / ATR(%) 로 정규화
//! 2. 최소 캔들 수 미달 타임프레임은 제외하고 가중치를 비례 재분배
//! 3. 4h 가속도가 신선(2캔들 이내)하고 4h 수익률과 부호가 같으면 4h 성분에 5~15% 부스트
//! 4. 유효 타임프레임의 가중치 합이 0이면 모멘텀 0 + `InvalidForScoring`
//!
//! # 레짐별 타임프레임 가중치
//!
//! | 레짐 | 1h | 4h | 12h | 24h | 7d |
//! |------|----|----|-----|-----|----|
//! | trending_bull | 0.20 | 0.35 | 0.30 | 0.15 | 0.00 |
//! | choppy / neutral | 0.15 | 0.25 | 0.35 | 0.20 | 0.05 |
//! | high_vol | 0.10 | 0.20 | 0.30 | 0.30 | 0.10 |

use std::collections::BTreeMap;

use scanner_core::{push_flag, Bar, MomentumCore, QualityFlag, RegimeLabel, Timeframe, TimeframeReading};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators;
use crate::weights::WEIGHT_SUM_TOLERANCE;

/// 모멘텀 설정 검증 오류.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MomentumConfigError {
    /// 타임프레임 가중치 합계가 1.0이 아님
    #[error("{regime} 타임프레임 가중치 합계 {sum:.4}")]
    SumMismatch { regime: RegimeLabel, sum: f64 },

    /// 음수 또는 유한하지 않은 가중치
    #[error("{regime} {timeframe} 가중치가 잘못되었습니다: {value}")]
    InvalidWeight {
        regime: RegimeLabel,
        timeframe: Timeframe,
        value: f64,
    },

    /// 잘못된 파라미터
    #[error("잘못된 모멘텀 파라미터: {0}")]
    InvalidParameter(String),
}

/// 레짐 하나의 타임프레임 가중치.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeframeWeights {
    #[serde(rename = "1h")]
    pub h1: f64,
    #[serde(rename = "4h")]
    pub h4: f64,
    #[serde(rename = "12h")]
    pub h12: f64,
    #[serde(rename = "24h")]
    pub d1: f64,
    #[serde(rename = "7d")]
    pub w1: f64,
}

impl TimeframeWeights {
    /// 새 가중치를 생성합니다.
    pub const fn new(h1: f64, h4: f64, h12: f64, d1: f64, w1: f64) -> Self {
        Self { h1, h4, h12, d1, w1 }
    }

    /// 타임프레임별 가중치.
    pub fn weight(&self, timeframe: Timeframe) -> f64 {
        match timeframe {
            Timeframe::H1 => self.h1,
            Timeframe::H4 => self.h4,
            Timeframe::H12 => self.h12,
            Timeframe::D1 => self.d1,
            Timeframe::W1 => self.w1,
        }
    }

    /// 가중치 합계.
    pub fn sum(&self) -> f64 {
        Timeframe::ALL.iter().map(|tf| self.weight(*tf)).sum()
    }

    fn validate(&self, regime: RegimeLabel) -> Result<(), MomentumConfigError> {
        for timeframe in Timeframe::ALL {
            let value = self.weight(timeframe);
            if !value.is_finite() || value < 0.0 {
                return Err(MomentumConfigError::InvalidWeight { regime, timeframe, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MomentumConfigError::SumMismatch { regime, sum });
        }
        Ok(())
    }
}

/// 모멘텀 설정 (설정 `[momentum]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// 추세 상승 레짐 가중치
    #[serde(default = "default_trending_bull")]
    pub trending_bull: TimeframeWeights,
    /// 박스권 레짐 가중치
    #[serde(default = "default_choppy")]
    pub choppy: TimeframeWeights,
    /// 고변동성 레짐 가중치
    #[serde(default = "default_high_vol")]
    pub high_vol: TimeframeWeights,
    /// 기본 프로필 가중치
    #[serde(default = "default_choppy")]
    pub neutral: TimeframeWeights,
    /// ATR 기간
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// 가속도가 신선하다고 보는 최대 캔들 수
    #[serde(default = "default_accel_fresh_bars")]
    pub accel_fresh_bars: usize,
    /// 4h 부스트 최소값 (비율)
    #[serde(default = "default_boost_min")]
    pub boost_min: f64,
    /// 4h 부스트 최대값 (비율)
    #[serde(default = "default_boost_max")]
    pub boost_max: f64,
}

fn default_trending_bull() -> TimeframeWeights {
    TimeframeWeights::new(0.20, 0.35, 0.30, 0.15, 0.0)
}

fn default_choppy() -> TimeframeWeights {
    TimeframeWeights::new(0.15, 0.25, 0.35, 0.20, 0.05)
}

fn default_high_vol() -> TimeframeWeights {
    TimeframeWeights::new(0.10, 0.20, 0.30, 0.30, 0.10)
}

fn default_atr_period() -> usize {
    14
}

fn default_accel_fresh_bars() -> usize {
    2
}

fn default_boost_min() -> f64 {
    0.05
}

fn default_boost_max() -> f64 {
    0.15
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            trending_bull: default_trending_bull(),
            choppy: default_choppy(),
            high_vol: default_high_vol(),
            neutral: default_choppy(),
            atr_period: default_atr_period(),
            accel_fresh_bars: default_accel_fresh_bars(),
            boost_min: default_boost_min(),
            boost_max: default_boost_max(),
        }
    }
}

impl MomentumConfig {
    /// 레짐별 타임프레임 가중치.
    pub fn profile(&self, regime: RegimeLabel) -> &TimeframeWeights {
        match regime {
            RegimeLabel::TrendingBull => &self.trending_bull,
            RegimeLabel::Choppy => &self.choppy,
            RegimeLabel::HighVol => &self.high_vol,
            RegimeLabel::Neutral => &self.neutral,
        }
    }

    /// 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), MomentumConfigError> {
        for regime in RegimeLabel::ALL {
            self.profile(regime).validate(regime)?;
        }
        if self.atr_period == 0 {
            return Err(MomentumConfigError::InvalidParameter("atr_period는 0보다 커야 합니다".into()));
        }
        if !(0.0 <= self.boost_min && self.boost_min <= self.boost_max && self.boost_max <= 1.0) {
            return Err(MomentumConfigError::InvalidParameter(format!(
                "부스트 범위가 잘못되었습니다: {} ~ {}",
                self.boost_min, self.boost_max
            )));
        }
        Ok(())
    }
}

/// 4h 가속도 분석 결과.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Acceleration {
    value: f64,
    age_bars: usize,
    fresh: bool,
}

impl Acceleration {
    fn none() -> Self {
        Self {
            value: 0.0,
            age_bars: 0,
            fresh: false,
        }
    }
}

/// 모멘텀 코어 계산기.
#[derive(Debug, Clone, Default)]
pub struct MomentumCalculator {
    config: MomentumConfig,
}

impl MomentumCalculator {
    /// 새 계산기를 생성합니다.
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    /// 설정.
    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// 타임프레임별 원시 입력을 계산합니다.
    ///
    /// 캔들이 최소 개수 미만이거나, 비정상 캔들이 있거나, ATR이 0 이하이면 `valid = false`.
    pub fn readings(&self, bars: &BTreeMap<Timeframe, Vec<Bar>>) -> Vec<TimeframeReading> {
        Timeframe::ALL
            .iter()
            .map(|tf| {
                let series = bars.get(tf).map(Vec::as_slice).unwrap_or(&[]);
                self.reading(*tf, series)
            })
            .collect()
    }

    fn reading(&self, timeframe: Timeframe, series: &[Bar]) -> TimeframeReading {
        let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
        let well_formed = series.iter().all(Bar::is_well_formed);

        let return_pct = indicators::last_return_pct(&closes).unwrap_or(f64::NAN);
        let rsi = indicators::rsi(&closes, 14.min(closes.len().saturating_sub(1)).max(1))
            .unwrap_or(f64::NAN);
        let atr_pct = match (indicators::atr(series, self.config.atr_period), closes.last()) {
            (Ok(atr), Some(last)) if *last > 0.0 => atr / last * 100.0,
            _ => f64::NAN,
        };

        let valid = series.len() >= timeframe.min_bars()
            && well_formed
            && return_pct.is_finite()
            && atr_pct.is_finite()
            && atr_pct > 0.0;

        TimeframeReading {
            timeframe,
            bars: series.len(),
            return_pct,
            atr_pct,
            rsi,
            valid,
        }
    }

    /// 4h 가속도: 최근 4h 수익률 - 직전 4h 수익률.
    ///
    /// 가속도의 나이는 현재 부호가 유지된 연속 캔들 수 - 1 입니다.
    fn acceleration(&self, series: &[Bar]) -> Acceleration {
        if series.len() < 3 || !series.iter().all(Bar::is_well_formed) {
            return Acceleration::none();
        }

        let returns: Vec<f64> = series
            .windows(2)
            .map(|w| (w[1].close / w[0].close - 1.0) * 100.0)
            .collect();
        let deltas: Vec<f64> = returns.windows(2).map(|w| w[1] - w[0]).collect();

        let last = match deltas.last() {
            Some(v) if v.is_finite() && *v != 0.0 => *v,
            _ => return Acceleration::none(),
        };

        let same_sign = deltas
            .iter()
            .rev()
            .take_while(|d| d.signum() == last.signum() && **d != 0.0)
            .count();
        let age_bars = same_sign.saturating_sub(1);

        Acceleration {
            value: last,
            age_bars,
            fresh: age_bars <= self.config.accel_fresh_bars,
        }
    }

    /// 모멘텀 코어를 계산합니다.
    ///
    /// # 인자
    /// * `bars` - 타임프레임별 캔들 (시간순)
    /// * `regime` - 적용할 레짐 프로필
    ///
    /// # 반환
    /// 모멘텀 코어와 타임프레임별 원시 입력
    pub fn compute(
        &self,
        bars: &BTreeMap<Timeframe, Vec<Bar>>,
        regime: RegimeLabel,
    ) -> (MomentumCore, Vec<TimeframeReading>) {
        let readings = self.readings(bars);
        let profile = self.profile_for(regime);

        let h4_series = bars.get(&Timeframe::H4).map(Vec::as_slice).unwrap_or(&[]);
        let h4_reading = readings.iter().find(|r| r.timeframe == Timeframe::H4);
        let accel = match h4_reading {
            Some(r) if r.valid => self.acceleration(h4_series),
            _ => Acceleration::none(),
        };

        let boost = match h4_reading {
            Some(r) if accel.fresh && r.return_pct != 0.0 && accel.value.signum() == r.return_pct.signum() => {
                let strength = (accel.value.abs() / r.atr_pct).min(1.0);
                1.0 + self.config.boost_min + (self.config.boost_max - self.config.boost_min) * strength
            }
            _ => 1.0,
        };

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut coverage = Vec::new();
        let mut flags = Vec::new();

        for reading in &readings {
            if !reading.valid {
                push_flag(&mut flags, QualityFlag::PartialCoverage);
                if reading.bars > 0 && !reading.return_pct.is_finite() {
                    push_flag(&mut flags, QualityFlag::NonFiniteInput);
                }
                continue;
            }
            let weight = profile.weight(reading.timeframe);
            let mut normalized = reading.return_pct / reading.atr_pct;
            if reading.timeframe == Timeframe::H4 {
                normalized *= boost;
            }
            weighted += weight * normalized;
            total_weight += weight;
            coverage.push(reading.timeframe);
        }

        if total_weight <= 0.0 || !weighted.is_finite() {
            tracing::debug!(regime = %regime, valid = coverage.len(), "유효 타임프레임 없음, 모멘텀 0 처리");
            let mut invalid = MomentumCore::invalid();
            invalid.coverage = coverage;
            return (invalid, readings);
        }

        let core = MomentumCore {
            value: weighted / total_weight,
            acceleration: accel.value,
            accel_age_bars: accel.age_bars,
            accel_fresh: accel.fresh,
            boost,
            coverage,
            flags,
        };
        (core, readings)
    }

    fn profile_for(&self, regime: RegimeLabel) -> &TimeframeWeights {
        self.config.profile(regime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// 종가 시퀀스로 캔들을 생성합니다 (고가/저가 = 종가 ± spread).
    fn series(timeframe: Timeframe, closes: &[f64], spread: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let step = Duration::seconds(timeframe.as_secs() as i64);
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar {
                timeframe,
                open_time: start + step * i as i32,
                close_time: start + step * (i as i32 + 1),
                open: *c,
                high: c + spread,
                low: c - spread,
                close: *c,
                volume: 10.0,
            })
            .collect()
    }

    fn flat_then_last(n: usize, last: f64) -> Vec<f64> {
        let mut closes = vec![100.0; n - 1];
        closes.push(last);
        closes
    }

    fn full_bars(last_move: f64) -> BTreeMap<Timeframe, Vec<Bar>> {
        Timeframe::ALL
            .iter()
            .map(|tf| (*tf, series(*tf, &flat_then_last(tf.min_bars() + 2, 100.0 + last_move), 1.0)))
            .collect()
    }

    #[test]
    fn test_default_config_valid() {
        assert!(MomentumConfig::default().validate().is_ok());
        assert_eq!(MomentumConfig::default().trending_bull.w1, 0.0);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let config = MomentumConfig {
            high_vol: TimeframeWeights::new(0.5, 0.5, 0.5, 0.0, 0.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MomentumConfigError::SumMismatch { regime: RegimeLabel::HighVol, .. })
        ));
    }

    #[test]
    fn test_full_coverage_momentum_positive() {
        let calc = MomentumCalculator::default();
        let (core, readings) = calc.compute(&full_bars(2.0), RegimeLabel::Choppy);

        assert_eq!(readings.len(), 5);
        assert!(readings.iter().all(|r| r.valid));
        assert_eq!(core.coverage.len(), 5);
        assert!(core.value > 0.0);
        assert!(core.flags.is_empty());
    }

    #[test]
    fn test_partial_coverage_redistributes_weights() {
        let calc = MomentumCalculator::default();
        let mut bars = full_bars(2.0);
        // 1h, 24h, 7d 데이터 부족 → 4h, 12h만 유효
        bars.insert(Timeframe::H1, series(Timeframe::H1, &flat_then_last(5, 102.0), 1.0));
        bars.remove(&Timeframe::D1);
        bars.insert(Timeframe::W1, series(Timeframe::W1, &flat_then_last(3, 102.0), 1.0));

        let (core, readings) = calc.compute(&bars, RegimeLabel::TrendingBull);
        assert_eq!(core.coverage, vec![Timeframe::H4, Timeframe::H12]);
        assert!(core.flags.contains(&QualityFlag::PartialCoverage));
        assert!(!core.flags.contains(&QualityFlag::InvalidForScoring));

        let h4 = readings.iter().find(|r| r.timeframe == Timeframe::H4).unwrap();
        let h12 = readings.iter().find(|r| r.timeframe == Timeframe::H12).unwrap();
        let expected = (0.35 * (h4.return_pct / h4.atr_pct) * core.boost
            + 0.30 * (h12.return_pct / h12.atr_pct))
            / 0.65;
        assert!((core.value - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_valid_timeframe_is_invalid() {
        let calc = MomentumCalculator::default();
        let (core, _) = calc.compute(&BTreeMap::new(), RegimeLabel::Choppy);
        assert_eq!(core.value, 0.0);
        assert!(core.flags.contains(&QualityFlag::InvalidForScoring));
    }

    #[test]
    fn test_only_zero_weight_timeframe_is_invalid() {
        let calc = MomentumCalculator::default();
        let mut bars = BTreeMap::new();
        bars.insert(Timeframe::W1, series(Timeframe::W1, &flat_then_last(14, 104.0), 1.0));

        let (core, _) = calc.compute(&bars, RegimeLabel::TrendingBull);
        assert_eq!(core.value, 0.0);
        assert!(core.flags.contains(&QualityFlag::InvalidForScoring));
        assert_eq!(core.coverage, vec![Timeframe::W1]);
    }

    #[test]
    fn test_fresh_aligned_acceleration_boosts_4h() {
        let calc = MomentumCalculator::default();
        let mut bars = full_bars(0.0);
        // 4h: 평탄 → 마지막 캔들 +2% (가속도 양수, 나이 0)
        bars.insert(Timeframe::H4, series(Timeframe::H4, &flat_then_last(20, 102.0), 1.0));

        let (core, _) = calc.compute(&bars, RegimeLabel::TrendingBull);
        assert!(core.accel_fresh);
        assert!(core.acceleration > 0.0);
        assert!(core.boost >= 1.05 && core.boost <= 1.15);
        assert!(core.is_reaccelerating());
    }

    #[test]
    fn test_stale_acceleration_no_boost() {
        let calc = MomentumCalculator::default();
        let mut bars = full_bars(0.0);
        // 수익률이 매 캔들 증가 → 가속도 부호가 오래 유지됨
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + 0.001 * (i * i) as f64)).collect();
        bars.insert(Timeframe::H4, series(Timeframe::H4, &closes, 1.0));

        let (core, _) = calc.compute(&bars, RegimeLabel::TrendingBull);
        assert!(core.acceleration > 0.0);
        assert!(!core.accel_fresh);
        assert_eq!(core.boost, 1.0);
    }

    #[test]
    fn test_malformed_bars_drop_timeframe() {
        let calc = MomentumCalculator::default();
        let mut bars = full_bars(1.0);
        let mut broken = series(Timeframe::H12, &flat_then_last(16, 101.0), 1.0);
        broken[3].close = f64::NAN;
        bars.insert(Timeframe::H12, broken);

        let (core, readings) = calc.compute(&bars, RegimeLabel::Choppy);
        assert!(!readings.iter().find(|r| r.timeframe == Timeframe::H12).unwrap().valid);
        assert!(!core.coverage.contains(&Timeframe::H12));
        assert!(core.flags.contains(&QualityFlag::PartialCoverage));
        assert!(core.value.is_finite());
    }
}
