//! 팩터 추출기.
//!
//! 심볼별 원시 데이터(캔들, 호가창, 시그널)를 팩터 집합과 게이트용 시장 컨텍스트로 변환합니다.
//!
//! # 소스
//!
//! | 팩터 | 입력 |
//! |------|------|
//! | Technical | 4h 캔들 RSI(14), ADX(14), 지속성 |
//! | Volume | 24h 캔들 거래량 급증 비율, 시그널 OI 변화율, 최근 24개 1h 캔들 거래대금 |
//! | Quality | 시그널 OI 수준, 준비금 비율, 거래소 건전성, 자금 흐름 틴트 × 거래대금 |
//! | Social | 시그널 감성 점수, 브랜드 점수 |
//!
//! 누락되거나 유한하지 않은 입력은 중립값으로 대체되고 `Degraded` 플래그가 기록됩니다.
//! 1h 캔들이 전혀 없으면 시그널 캔들을 정할 수 없으므로 추출 오류를 반환하고,
//! 호출자는 해당 심볼을 패널에서 제외합니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use scanner_core::{
    push_flag, Bar, BookSnapshot, FactorSet, MarketContext, QualityFactor, QualityFlag,
    RegimeLabel, SignalQuality, SignalSnapshot, SignalValue, SocialFactor, Symbol,
    TechnicalFactor, Timeframe, VolumeFactor,
};
use thiserror::Error;

use crate::composite::MeasurementInputs;
use crate::indicators;
use crate::momentum::MomentumCalculator;

/// 중립 대체값.
mod neutral {
    pub const RSI: f64 = 50.0;
    pub const ADX: f64 = 20.0;
    pub const PERSISTENCE: f64 = 0.5;
    pub const SURGE: f64 = 1.0;
    pub const OI_DELTA: f64 = 0.0;
    pub const OPEN_INTEREST: f64 = 0.0;
    pub const RESERVE_RATIO: f64 = 0.5;
    pub const VENUE_HEALTH: f64 = 0.5;
    pub const FLOW: f64 = 0.0;
    pub const SOCIAL: f64 = 0.0;
}

/// 지표 기간.
const INDICATOR_PERIOD: usize = 14;

/// 24시간에 해당하는 1h 캔들 수.
const HOURS_PER_DAY: usize = 24;

/// 추출 오류.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    /// 필수 타임프레임 캔들 없음
    #[error("{symbol}: {timeframe} 캔들이 없습니다")]
    MissingSeries { symbol: Symbol, timeframe: Timeframe },

    /// 시그널 캔들이 비정상
    #[error("{symbol}: 시그널 캔들이 비정상입니다")]
    MalformedSignalBar { symbol: Symbol },
}

/// 심볼별 원시 입력.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolData {
    /// 심볼
    pub symbol: Symbol,
    /// 타임프레임별 캔들 (시간순)
    pub bars: BTreeMap<Timeframe, Vec<Bar>>,
    /// 호가창 스냅샷 (조회 실패 시 `None`)
    pub book: Option<BookSnapshot>,
    /// 시그널 스냅샷
    pub signals: SignalSnapshot,
}

impl SymbolData {
    /// 타임프레임 캔들 슬라이스.
    pub fn series(&self, timeframe: Timeframe) -> &[Bar] {
        self.bars.get(&timeframe).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 추출 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// 팩터 집합
    pub factors: FactorSet,
    /// 게이트 평가용 시장 컨텍스트
    pub market: MarketContext,
    /// 측정 부스트 입력
    pub measurements: MeasurementInputs,
}

/// 팩터 추출기.
#[derive(Debug, Clone)]
pub struct FactorExtractor {
    momentum: MomentumCalculator,
    divergence_z: f64,
}

impl FactorExtractor {
    /// 새 추출기를 생성합니다.
    ///
    /// # 인자
    /// * `momentum` - 모멘텀 코어 계산기
    /// * `divergence_z` - 펀딩 다이버전스 판정 z-score (부스트 자격 판정용)
    pub fn new(momentum: MomentumCalculator, divergence_z: f64) -> Self {
        Self {
            momentum,
            divergence_z,
        }
    }

    /// 모멘텀 계산기.
    pub fn momentum(&self) -> &MomentumCalculator {
        &self.momentum
    }

    /// 심볼 하나의 팩터를 추출합니다.
    ///
    /// # 에러
    /// 1h 캔들이 없거나 마지막 1h 캔들이 비정상이면 `ExtractionError`.
    pub fn extract(
        &self,
        data: &SymbolData,
        regime: RegimeLabel,
        as_of: DateTime<Utc>,
    ) -> Result<Extraction, ExtractionError> {
        let h1 = data.series(Timeframe::H1);
        let signal_bar = h1.last().ok_or_else(|| ExtractionError::MissingSeries {
            symbol: data.symbol.clone(),
            timeframe: Timeframe::H1,
        })?;
        if !signal_bar.is_well_formed() {
            return Err(ExtractionError::MalformedSignalBar {
                symbol: data.symbol.clone(),
            });
        }

        let mut flags = Vec::new();
        let (momentum, readings) = self.momentum.compute(&data.bars, regime);

        let technical = self.technical(data.series(Timeframe::H4), &mut flags);
        let day_volume: f64 = tail(h1, HOURS_PER_DAY).iter().map(Bar::quote_volume).sum();
        let volume = self.volume(data, day_volume, &mut flags);
        let quality = self.quality(&data.signals, day_volume, &mut flags);
        let social = SocialFactor {
            sentiment: signal_or_neutral(&data.signals.social_score, neutral::SOCIAL, &mut flags),
            brand: signal_or_neutral(&data.signals.brand_score, neutral::SOCIAL, &mut flags),
        };
        if volume.is_illiquid() {
            push_flag(&mut flags, QualityFlag::Illiquid);
        }

        let price = data
            .book
            .as_ref()
            .and_then(BookSnapshot::mid)
            .unwrap_or(signal_bar.close);
        let vwap_24h = indicators::vwap(tail(h1, HOURS_PER_DAY));
        let funding_z = data.signals.funding_z.usable();
        let market = MarketContext {
            price,
            return_24h_pct: return_24h(h1, data.series(Timeframe::D1)),
            rsi_4h: raw_rsi(data.series(Timeframe::H4)),
            vadr: indicators::vadr(data.series(Timeframe::D1), Timeframe::D1.min_bars()).ok(),
            vwap_24h,
            funding_z,
            signal_bar_close: signal_bar.close_time,
            signal_price: signal_bar.close,
            atr_1h: indicators::atr(h1, INDICATOR_PERIOD).unwrap_or(f64::NAN),
        };

        let holds_vwap = vwap_24h.is_some_and(|v| v > 0.0 && price >= v);
        let measurements = MeasurementInputs {
            funding_z,
            funding_divergence: funding_z.is_some_and(|z| z.abs() >= self.divergence_z) && holds_vwap,
            oi_residual: data.signals.oi_residual.usable(),
            flow_tint: data.signals.flow_tint.usable(),
        };

        flags.sort();
        tracing::trace!(
            symbol = %data.symbol,
            momentum = momentum.value,
            coverage = momentum.coverage.len(),
            flags = flags.len(),
            "팩터 추출 완료"
        );

        Ok(Extraction {
            factors: FactorSet {
                symbol: data.symbol.clone(),
                timestamp: as_of,
                timeframes: readings,
                momentum,
                technical,
                volume,
                quality,
                social,
                flags,
            },
            market,
            measurements,
        })
    }

    fn technical(&self, h4: &[Bar], flags: &mut Vec<QualityFlag>) -> TechnicalFactor {
        let closes: Vec<f64> = h4.iter().map(|b| b.close).collect();
        let rsi = indicators::rsi(&closes, INDICATOR_PERIOD).ok();
        let adx = indicators::adx(h4, INDICATOR_PERIOD).ok();
        let persistence = indicators::persistence(&closes).ok();
        TechnicalFactor {
            rsi: finite_or_neutral(rsi, neutral::RSI, flags),
            adx: finite_or_neutral(adx, neutral::ADX, flags),
            persistence: finite_or_neutral(persistence, neutral::PERSISTENCE, flags),
        }
    }

    fn volume(&self, data: &SymbolData, day_volume: f64, flags: &mut Vec<QualityFlag>) -> VolumeFactor {
        let daily = data.series(Timeframe::D1);
        let surge = daily.split_last().and_then(|(last, prior)| {
            let volumes: Vec<f64> = prior.iter().map(|b| b.volume).collect();
            indicators::mean(&volumes)
                .filter(|m| *m > 0.0)
                .map(|m| last.volume / m)
        });
        VolumeFactor {
            surge_ratio: finite_or_neutral(surge, neutral::SURGE, flags),
            oi_delta: signal_or_neutral(&data.signals.oi_delta, neutral::OI_DELTA, flags),
            quote_volume_24h: if day_volume.is_finite() { day_volume } else { 0.0 },
        }
    }

    fn quality(&self, signals: &SignalSnapshot, day_volume: f64, flags: &mut Vec<QualityFlag>) -> QualityFactor {
        let flow = signals
            .flow_tint
            .usable()
            .map(|tint| tint * day_volume)
            .filter(|v| v.is_finite());
        QualityFactor {
            open_interest: signal_or_neutral(&signals.open_interest, neutral::OPEN_INTEREST, flags),
            reserve_ratio: signal_or_neutral(&signals.reserve_ratio, neutral::RESERVE_RATIO, flags),
            flow: finite_or_neutral(flow, neutral::FLOW, flags),
            venue_health: signal_or_neutral(&signals.venue_health, neutral::VENUE_HEALTH, flags),
        }
    }
}

/// 슬라이스의 마지막 `n`개.
fn tail(bars: &[Bar], n: usize) -> &[Bar] {
    &bars[bars.len().saturating_sub(n)..]
}

fn finite_or_neutral(value: Option<f64>, neutral: f64, flags: &mut Vec<QualityFlag>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => {
            push_flag(flags, QualityFlag::Degraded);
            neutral
        }
    }
}

fn signal_or_neutral(signal: &SignalValue, neutral: f64, flags: &mut Vec<QualityFlag>) -> f64 {
    if signal.quality != SignalQuality::Missing && !signal.value.is_finite() {
        push_flag(flags, QualityFlag::NonFiniteInput);
    }
    finite_or_neutral(signal.usable(), neutral, flags)
}

/// 24시간 수익률 (%). 1h 캔들 25개가 있으면 1h 기준, 아니면 마지막 24h 캔들 기준.
fn return_24h(h1: &[Bar], d1: &[Bar]) -> f64 {
    if h1.len() > HOURS_PER_DAY {
        let last = h1[h1.len() - 1].close;
        let base = h1[h1.len() - 1 - HOURS_PER_DAY].close;
        if base > 0.0 && last.is_finite() {
            return (last / base - 1.0) * 100.0;
        }
    }
    let closes: Vec<f64> = d1.iter().map(|b| b.close).collect();
    indicators::last_return_pct(&closes).unwrap_or(f64::NAN)
}

/// 게이트용 4h RSI. 계산 불가 시 NaN (게이트에서 데이터 오류로 처리).
fn raw_rsi(h4: &[Bar]) -> f64 {
    let closes: Vec<f64> = h4.iter().map(|b| b.close).collect();
    indicators::rsi(&closes, INDICATOR_PERIOD).unwrap_or(f64::NAN)
}
