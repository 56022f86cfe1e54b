//! 게이트/가드 평가를 위한 시장 컨텍스트.
//!
//! 팩터 추출 단계에서 심볼별로 한 번 계산되며, 이후 게이트 평가에서 읽기 전용으로 사용됩니다.
//! 누락된 값은 `None` 또는 NaN으로 남겨 두고, 게이트가 데이터 오류 센티널로 변환합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 심볼별 시장 컨텍스트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    /// 현재 가격 (호가 중간값, 없으면 마지막 종가)
    pub price: f64,
    /// 24시간 수익률 (%)
    pub return_24h_pct: f64,
    /// 4h RSI
    pub rsi_4h: f64,
    /// VADR (이력 부족 시 `None`)
    pub vadr: Option<f64>,
    /// 24시간 VWAP (거래량 0이면 `None`)
    pub vwap_24h: Option<f64>,
    /// 펀딩 z-score (누락 시 `None`)
    pub funding_z: Option<f64>,
    /// 시그널 캔들(마지막 1h 캔들) 종료 시각
    pub signal_bar_close: DateTime<Utc>,
    /// 시그널 캔들 종가
    pub signal_price: f64,
    /// 1h ATR (가격 단위)
    pub atr_1h: f64,
}

impl MarketContext {
    /// 시그널 이후 가격 이동 (ATR 배수).
    ///
    /// ATR이 0 이하이거나 유한하지 않으면 NaN을 반환합니다.
    pub fn price_move_atr(&self) -> f64 {
        if !(self.atr_1h.is_finite() && self.atr_1h > 0.0) {
            return f64::NAN;
        }
        (self.price - self.signal_price).abs() / self.atr_1h
    }

    /// 평가 시각 기준 시그널 캔들 종료 후 경과 시간 (초).
    pub fn delay_secs(&self, as_of: DateTime<Utc>) -> f64 {
        (as_of - self.signal_bar_close).num_milliseconds() as f64 / 1000.0
    }

    /// 시그널 캔들 이후 경과한 1h 캔들 수.
    pub fn bars_since_signal(&self, as_of: DateTime<Utc>) -> f64 {
        let secs = self.delay_secs(as_of);
        if secs <= 0.0 {
            0.0
        } else {
            (secs / 3600.0).floor()
        }
    }
}
