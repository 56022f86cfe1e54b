//! 기술적 지표 모듈.
//!
//! 팩터 추출에 필요한 지표를 `f64`로 계산합니다.
//!
//! # 지원 지표
//!
//! - **RSI**: 상대강도지수 (단순 평균 방식)
//! - **ATR**: 평균 실제 범위 (단순 평균 방식)
//! - **ADX**: 평균 방향성 지수
//! - **지속성**: 분산비(variance ratio) 기반 추세 지속성 (0~1)
//! - **VWAP**: 거래량 가중 평균 가격
//! - **VADR**: 거래량 조정 일중 범위 비율
//!
//! 모든 함수는 데이터가 부족하면 `IndicatorError::InsufficientData`를 반환합니다.

use scanner_core::Bar;
use thiserror::Error;

/// 지표 계산 오류.
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    /// 데이터 부족 오류
    #[error("데이터가 부족합니다: 필요 {required}개, 제공 {provided}개")]
    InsufficientData { required: usize, provided: usize },

    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),

    /// 계산 오류 (0으로 나누기, 비정상 입력 등)
    #[error("계산 오류: {0}")]
    CalculationError(String),
}

/// 지표 계산 결과 타입.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

fn require(provided: usize, required: usize) -> IndicatorResult<()> {
    if provided < required {
        return Err(IndicatorError::InsufficientData { required, provided });
    }
    Ok(())
}

fn require_period(period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter(
            "기간은 0보다 커야 합니다".to_string(),
        ));
    }
    Ok(())
}

/// 산술 평균. 빈 슬라이스면 `None`.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// 표본 분산 (n-1). 값이 2개 미만이면 `None`.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// 단순 평균 방식 RSI.
///
/// 마지막 `period`개의 종가 변화로 평균 상승폭/하락폭을 구합니다.
///
/// # 인자
/// * `closes` - 종가 (시간순)
/// * `period` - 기간 (기본 14)
///
/// # 반환
/// 0~100 사이의 RSI. 하락이 전혀 없으면 100, 변화가 전혀 없으면 50.
pub fn rsi(closes: &[f64], period: usize) -> IndicatorResult<f64> {
    require_period(period)?;
    require(closes.len(), period + 1)?;

    let window = &closes[closes.len() - period - 1..];
    let (mut gains, mut losses) = (0.0, 0.0);
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }

    if !(gains.is_finite() && losses.is_finite()) {
        return Err(IndicatorError::CalculationError("비정상 종가".to_string()));
    }
    if gains == 0.0 && losses == 0.0 {
        return Ok(50.0);
    }
    if losses == 0.0 {
        return Ok(100.0);
    }

    let rs = gains / losses;
    Ok(100.0 - 100.0 / (1.0 + rs))
}

/// 단순 평균 방식 ATR (가격 단위).
///
/// 최대 `period`개의 최근 True Range 평균입니다. 최소 2개의 캔들이 필요합니다.
pub fn atr(bars: &[Bar], period: usize) -> IndicatorResult<f64> {
    require_period(period)?;
    require(bars.len(), 2)?;

    let ranges: Vec<f64> = bars
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect();
    let take = period.min(ranges.len());
    let recent = &ranges[ranges.len() - take..];

    mean(recent)
        .filter(|v| v.is_finite())
        .ok_or_else(|| IndicatorError::CalculationError("ATR 계산 실패".to_string()))
}

/// ADX (평균 방향성 지수, 0~100).
///
/// 각 시점의 DX는 직전 `period`개 구간의 +DM/-DM/TR 합으로 계산하고,
/// 최근 `period`개 DX의 평균을 ADX로 사용합니다. `2 * period + 1`개의 캔들이 필요합니다.
pub fn adx(bars: &[Bar], period: usize) -> IndicatorResult<f64> {
    require_period(period)?;
    require(bars.len(), 2 * period + 1)?;

    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    let mut tr = Vec::with_capacity(bars.len() - 1);

    for pair in bars.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        tr.push(cur.true_range(prev.close));
    }

    let mut dx_values = Vec::new();
    for end in period..=tr.len() {
        let start = end - period;
        let tr_sum: f64 = tr[start..end].iter().sum();
        if tr_sum <= 0.0 {
            dx_values.push(0.0);
            continue;
        }
        let plus_di = 100.0 * plus_dm[start..end].iter().sum::<f64>() / tr_sum;
        let minus_di = 100.0 * minus_dm[start..end].iter().sum::<f64>() / tr_sum;
        let di_sum = plus_di + minus_di;
        dx_values.push(if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        });
    }

    let take = period.min(dx_values.len());
    mean(&dx_values[dx_values.len() - take..])
        .filter(|v| v.is_finite())
        .ok_or_else(|| IndicatorError::CalculationError("ADX 계산 실패".to_string()))
}

/// 분산비 기반 추세 지속성 (0~1).
///
/// VR(2) = Var(2기간 로그수익률) / (2 × Var(1기간 로그수익률)).
/// 랜덤워크는 VR ≈ 1 → 0.5, 추세 지속은 1에 가깝고 평균회귀는 0에 가깝습니다.
pub fn persistence(closes: &[f64]) -> IndicatorResult<f64> {
    require(closes.len(), 9)?;

    if closes.iter().any(|c| !(c.is_finite() && *c > 0.0)) {
        return Err(IndicatorError::CalculationError("비정상 종가".to_string()));
    }

    let returns: Vec<f64> = closes.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let paired: Vec<f64> = returns.windows(2).map(|w| w[0] + w[1]).collect();

    let var_1 = sample_variance(&returns).unwrap_or(0.0);
    let var_2 = sample_variance(&paired).unwrap_or(0.0);

    if var_1 <= f64::EPSILON {
        return Ok(0.5);
    }
    let ratio = var_2 / (2.0 * var_1);
    Ok((ratio / 2.0).clamp(0.0, 1.0))
}

/// 거래량 가중 평균 가격 (대표가격 = (H+L+C)/3).
///
/// 거래량 합이 0이면 `None`.
pub fn vwap(bars: &[Bar]) -> Option<f64> {
    let (mut pv, mut vol) = (0.0, 0.0);
    for bar in bars {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        pv += typical * bar.volume;
        vol += bar.volume;
    }
    if vol > 0.0 && pv.is_finite() {
        Some(pv / vol)
    } else {
        None
    }
}

/// VADR (Volume-Adjusted Daily Range).
///
/// (마지막 24h 범위 / 이전 24h 범위 평균) × (마지막 24h 거래량 / 이전 24h 거래량 평균).
/// 이전 거래량 평균이 0이면 0을 반환합니다.
///
/// # 인자
/// * `daily_bars` - 24h 캔들 (시간순)
/// * `min_bars` - 최소 캔들 수
pub fn vadr(daily_bars: &[Bar], min_bars: usize) -> IndicatorResult<f64> {
    require(daily_bars.len(), min_bars.max(2))?;

    let (last, prior) = match daily_bars.split_last() {
        Some(split) => split,
        None => return Err(IndicatorError::InsufficientData { required: 2, provided: 0 }),
    };

    let ranges: Vec<f64> = prior.iter().map(Bar::range).collect();
    let volumes: Vec<f64> = prior.iter().map(|b| b.volume).collect();
    let mean_range = mean(&ranges).unwrap_or(0.0);
    let mean_volume = mean(&volumes).unwrap_or(0.0);

    if mean_volume <= 0.0 {
        return Ok(0.0);
    }
    if mean_range <= 0.0 {
        return Err(IndicatorError::CalculationError(
            "이전 범위 평균이 0입니다".to_string(),
        ));
    }

    let value = (last.range() / mean_range) * (last.volume / mean_volume);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IndicatorError::CalculationError("VADR 비정상 값".to_string()))
    }
}

/// 한 캔들 수익률 (%): 마지막 종가 / 직전 종가 - 1.
pub fn last_return_pct(closes: &[f64]) -> IndicatorResult<f64> {
    require(closes.len(), 2)?;
    let prev = closes[closes.len() - 2];
    let last = closes[closes.len() - 1];
    if !(prev.is_finite() && prev > 0.0 && last.is_finite()) {
        return Err(IndicatorError::CalculationError("비정상 종가".to_string()));
    }
    Ok((last / prev - 1.0) * 100.0)
}
