//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Bar` - OHLCV 캔들스틱 데이터
//! - `BookLevel` / `BookSnapshot` - 호가창 스냅샷
//! - `BookSource` - 호가창 출처 (거래소 원본 / 제3자 집계)
//!
//! 팩터 계산은 `f64`로 수행되며, 게이트 비교 시점에만 Decimal 반올림을 적용합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Timeframe;

/// OHLCV 캔들스틱 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 캔들 시작 시간
    pub open_time: DateTime<Utc>,
    /// 캔들 종료 시간
    pub close_time: DateTime<Utc>,
    /// 시가
    pub open: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
    /// 종가
    pub close: f64,
    /// 거래량 (기준 자산 단위)
    pub volume: f64,
}

impl Bar {
    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// 거래대금 (종가 기준 근사값).
    pub fn quote_volume(&self) -> f64 {
        self.close * self.volume
    }

    /// 직전 종가를 고려한 True Range.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// 모든 가격/거래량 필드가 유한하고 가격이 양수인지 확인합니다.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.high >= self.low
    }
}

/// 호가창 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSource {
    /// 거래소에서 직접 받은 원본 호가창
    VenueNative,
    /// 제3자 집계 데이터 (마이크로구조 게이트에 사용 불가)
    Aggregator,
}

/// 호가 레벨 (가격, 수량).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    /// 가격
    pub price: f64,
    /// 수량 (기준 자산 단위)
    pub quantity: f64,
}

impl BookLevel {
    /// 새 호가 레벨을 생성합니다.
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// 명목 금액 (가격 × 수량).
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// 호가창 스냅샷.
///
/// 매수 호가는 가격 내림차순, 매도 호가는 가격 오름차순을 가정하지 않습니다.
/// 최우선 호가는 항상 최대/최소값으로 계산합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// 거래소 이름
    pub venue: String,
    /// 호가창 출처
    pub source: BookSource,
    /// 매수 호가
    pub bids: Vec<BookLevel>,
    /// 매도 호가
    pub asks: Vec<BookLevel>,
    /// 스냅샷 시간
    pub timestamp: DateTime<Utc>,
}

impl BookSnapshot {
    /// 최우선 매수 호가.
    pub fn best_bid(&self) -> Option<f64> {
        self.bids
            .iter()
            .map(|l| l.price)
            .filter(|p| p.is_finite())
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
    }

    /// 최우선 매도 호가.
    pub fn best_ask(&self) -> Option<f64> {
        self.asks
            .iter()
            .map(|l| l.price)
            .filter(|p| p.is_finite())
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.min(p))))
    }

    /// 중간 가격. 한쪽 호가가 비어 있으면 `None`.
    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// 거래소 원본 데이터 여부.
    pub fn is_venue_native(&self) -> bool {
        self.source == BookSource::VenueNative
    }
}
