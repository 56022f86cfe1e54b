//! 시장 레짐 라벨 및 스냅샷.
//!
//! 외부 레짐 감지기가 제공하는 라벨은 자유 문자열입니다.
//! 파이프라인은 이를 `RegimeLabel`로 해석하며, 인식할 수 없는 라벨은
//! 실패 대신 `Neutral` 프로필로 처리됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 가중치/가드 프로필을 결정하는 레짐 라벨.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    /// 강한 상승 추세 (저변동성, 넓은 시장 참여)
    TrendingBull,
    /// 박스권 / 혼조
    Choppy,
    /// 고변동성
    HighVol,
    /// 인식할 수 없는 라벨의 기본 프로필
    #[default]
    Neutral,
}

impl RegimeLabel {
    /// 전체 레짐 라벨.
    pub const ALL: [RegimeLabel; 4] = [
        RegimeLabel::TrendingBull,
        RegimeLabel::Choppy,
        RegimeLabel::HighVol,
        RegimeLabel::Neutral,
    ];

    /// 외부 라벨 문자열을 해석합니다. 인식할 수 없으면 `None`.
    ///
    /// 감지기 계열에서 쓰이는 별칭(calm/normal/volatile)도 허용합니다.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace('-', "_").as_str() {
            "trending_bull" | "trending" | "bull" | "calm" => Some(Self::TrendingBull),
            "choppy" | "normal" | "sideways" => Some(Self::Choppy),
            "high_vol" | "volatile" | "high_volatility" => Some(Self::HighVol),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// 추세 레짐 여부 (가드 완화 조건).
    pub fn is_trending(self) -> bool {
        matches!(self, Self::TrendingBull)
    }

    /// 설정 키로 사용하는 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrendingBull => "trending_bull",
            Self::Choppy => "choppy",
            Self::HighVol => "high_vol",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레짐 감지기의 출력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSnapshot {
    /// 감지기가 보고한 원본 라벨
    pub label: String,
    /// 신뢰도 (0~100)
    pub confidence: f64,
    /// 감지 시각
    pub detected_at: DateTime<Utc>,
}

impl RegimeSnapshot {
    /// 새 스냅샷을 생성합니다.
    pub fn new(label: impl Into<String>, confidence: f64, detected_at: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            confidence,
            detected_at,
        }
    }

    /// 라벨을 해석합니다. 인식할 수 없으면 `None`.
    pub fn parsed_label(&self) -> Option<RegimeLabel> {
        RegimeLabel::parse(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(RegimeLabel::parse("trending_bull"), Some(RegimeLabel::TrendingBull));
        assert_eq!(RegimeLabel::parse("Calm"), Some(RegimeLabel::TrendingBull));
        assert_eq!(RegimeLabel::parse("high-vol"), Some(RegimeLabel::HighVol));
        assert_eq!(RegimeLabel::parse("normal"), Some(RegimeLabel::Choppy));
        assert_eq!(RegimeLabel::parse("euphoria"), None);
    }

    #[test]
    fn test_trending_only_for_bull() {
        assert!(RegimeLabel::TrendingBull.is_trending());
        assert!(!RegimeLabel::Choppy.is_trending());
        assert!(!RegimeLabel::Neutral.is_trending());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&RegimeLabel::HighVol).unwrap();
        assert_eq!(json, "\"high_vol\"");
    }
}
