//! 시그널 제공자 입력.
//!
//! 소셜/브랜드 점수, 펀딩 z-score, OI 잔차, 자금 흐름 등 범위가 제한된 스칼라 입력입니다.
//! 각 값은 품질 표시와 함께 전달되며, 누락되거나 유한하지 않은 값은
//! 추출 단계에서 중립값으로 대체되고 품질 플래그가 기록됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 시그널 값의 품질 표시.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    /// 정상
    Good,
    /// 사용 가능하지만 신뢰도가 낮음 (지연, 부분 소스 등)
    Degraded,
    /// 값 없음
    #[default]
    Missing,
}

/// 품질 표시가 있는 스칼라 시그널.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalValue {
    /// 값
    #[serde(default)]
    pub value: f64,
    /// 품질
    #[serde(default)]
    pub quality: SignalQuality,
}

impl SignalValue {
    /// 정상 품질 값.
    pub fn good(value: f64) -> Self {
        Self {
            value,
            quality: SignalQuality::Good,
        }
    }

    /// 품질이 낮은 값.
    pub fn degraded(value: f64) -> Self {
        Self {
            value,
            quality: SignalQuality::Degraded,
        }
    }

    /// 누락된 값.
    pub fn missing() -> Self {
        Self::default()
    }

    /// 사용 가능한 값. 누락이거나 유한하지 않으면 `None`.
    pub fn usable(&self) -> Option<f64> {
        match self.quality {
            SignalQuality::Missing => None,
            _ if self.value.is_finite() => Some(self.value),
            _ => None,
        }
    }

    /// 정상 품질로 사용 가능한지 여부.
    pub fn is_clean(&self) -> bool {
        self.quality == SignalQuality::Good && self.value.is_finite()
    }
}

/// 심볼별 시그널 스냅샷.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// 소셜 감성 점수
    #[serde(default)]
    pub social_score: SignalValue,
    /// 브랜드 점수
    #[serde(default)]
    pub brand_score: SignalValue,
    /// 거래소 간 펀딩비 z-score
    #[serde(default)]
    pub funding_z: SignalValue,
    /// 미결제약정 잔차 (USD)
    #[serde(default)]
    pub oi_residual: SignalValue,
    /// 자금 흐름 틴트 (ETF 유입 비율)
    #[serde(default)]
    pub flow_tint: SignalValue,
    /// 미결제약정 수준 (USD)
    #[serde(default)]
    pub open_interest: SignalValue,
    /// 미결제약정 변화율
    #[serde(default)]
    pub oi_delta: SignalValue,
    /// 준비금 비율 (0~1)
    #[serde(default)]
    pub reserve_ratio: SignalValue,
    /// 거래소 건전성 (0~1)
    #[serde(default)]
    pub venue_health: SignalValue,
    /// 스냅샷 시각
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}
