//! 모멘텀 계산용 타임프레임 정의.
//!
//! 모멘텀 코어는 1h/4h/12h/24h/7d 다섯 개의 타임프레임을 사용하며,
//! 각 타임프레임은 유효한 계산을 위한 최소 캔들 수를 가집니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1시간봉
    #[serde(rename = "1h")]
    H1,
    /// 4시간봉
    #[serde(rename = "4h")]
    H4,
    /// 12시간봉
    #[serde(rename = "12h")]
    H12,
    /// 일봉 (24h)
    #[serde(rename = "24h")]
    D1,
    /// 주봉 (7d)
    #[serde(rename = "7d")]
    W1,
}

impl Timeframe {
    /// 모멘텀 계산에 사용되는 전체 타임프레임 (짧은 순서).
    pub const ALL: [Timeframe; 5] = [
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::H1 => Duration::from_secs(60 * 60),
            Timeframe::H4 => Duration::from_secs(4 * 60 * 60),
            Timeframe::H12 => Duration::from_secs(12 * 60 * 60),
            Timeframe::D1 => Duration::from_secs(24 * 60 * 60),
            Timeframe::W1 => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// 이 타임프레임의 초 단위 값을 반환합니다.
    pub fn as_secs(&self) -> u64 {
        self.duration().as_secs()
    }

    /// 모멘텀 계산에 필요한 최소 캔들 수.
    pub fn min_bars(&self) -> usize {
        match self {
            Timeframe::H1 => 24,
            Timeframe::H4 => 18,
            Timeframe::H12 => 14,
            Timeframe::D1 => 14,
            Timeframe::W1 => 12,
        }
    }

    /// 설정/로그에서 사용하는 짧은 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "24h",
            Timeframe::W1 => "7d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "12h" => Ok(Timeframe::H12),
            "24h" | "1d" => Ok(Timeframe::D1),
            "7d" | "1w" => Ok(Timeframe::W1),
            _ => Err(format!("알 수 없는 타임프레임: {}", s)),
        }
    }
}
