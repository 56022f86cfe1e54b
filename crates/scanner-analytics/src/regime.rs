//! 다수결 레짐 분류기.
//!
//! 세 가지 지표의 가중 투표로 시장 레짐을 판정합니다.
//!
//! | 지표 | calm | normal | volatile | 가중치 |
//! |------|------|--------|----------|--------|
//! | 실현 변동성 | < 0.15 | < 0.35 | 그 외 | 0.4 |
//! | MA20 대비 가격 | \|pct\| > 5 | 그 외 | \|pct\| < 2 | 0.3 |
//! | 시장 폭(breadth) | > 0.7 | > 0.3 | 그 외 | 0.3 |
//!
//! 득표가 같으면 normal → calm → volatile 순으로 우선합니다.
//! 출력 라벨은 가중치 프로필 이름(`trending_bull` / `choppy` / `high_vol`)을 사용합니다.

use chrono::{DateTime, Utc};
use scanner_core::{RegimeLabel, RegimeSnapshot};
use serde::{Deserialize, Serialize};

/// 분류기 투표 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeVote {
    /// 저변동성 추세
    Calm,
    /// 보통
    Normal,
    /// 고변동성
    Volatile,
}

impl RegimeVote {
    /// 동점 처리 우선순위 순서.
    const PRIORITY: [RegimeVote; 3] = [RegimeVote::Normal, RegimeVote::Calm, RegimeVote::Volatile];

    /// 가중치 프로필 라벨로 변환합니다.
    pub fn label(self) -> RegimeLabel {
        match self {
            RegimeVote::Calm => RegimeLabel::TrendingBull,
            RegimeVote::Normal => RegimeLabel::Choppy,
            RegimeVote::Volatile => RegimeLabel::HighVol,
        }
    }

    fn index(self) -> usize {
        match self {
            RegimeVote::Calm => 0,
            RegimeVote::Normal => 1,
            RegimeVote::Volatile => 2,
        }
    }
}

/// 분류기 입력 지표.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeInputs {
    /// 연율화 실현 변동성 (예: 0.25 = 25%)
    pub realized_vol: f64,
    /// MA20 대비 가격 위치 (%)
    pub price_vs_ma20_pct: f64,
    /// 시장 폭 비율 3종 (상승 종목 비율, 신고가 비율, 거래량 확산 비율)
    pub breadth: [f64; 3],
}

/// 분류기 임계값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassifierConfig {
    #[serde(default = "default_vol_calm")]
    pub vol_calm_below: f64,
    #[serde(default = "default_vol_normal")]
    pub vol_normal_below: f64,
    #[serde(default = "default_ma_volatile")]
    pub ma_volatile_within_pct: f64,
    #[serde(default = "default_ma_calm")]
    pub ma_calm_beyond_pct: f64,
    #[serde(default = "default_breadth_calm")]
    pub breadth_calm_above: f64,
    #[serde(default = "default_breadth_normal")]
    pub breadth_normal_above: f64,
    #[serde(default = "default_vol_weight")]
    pub vol_weight: f64,
    #[serde(default = "default_ma_weight")]
    pub ma_weight: f64,
    #[serde(default = "default_breadth_weight")]
    pub breadth_weight: f64,
}

fn default_vol_calm() -> f64 {
    0.15
}
fn default_vol_normal() -> f64 {
    0.35
}
fn default_ma_volatile() -> f64 {
    2.0
}
fn default_ma_calm() -> f64 {
    5.0
}
fn default_breadth_calm() -> f64 {
    0.7
}
fn default_breadth_normal() -> f64 {
    0.3
}
fn default_vol_weight() -> f64 {
    0.4
}
fn default_ma_weight() -> f64 {
    0.3
}
fn default_breadth_weight() -> f64 {
    0.3
}

impl Default for RegimeClassifierConfig {
    fn default() -> Self {
        Self {
            vol_calm_below: default_vol_calm(),
            vol_normal_below: default_vol_normal(),
            ma_volatile_within_pct: default_ma_volatile(),
            ma_calm_beyond_pct: default_ma_calm(),
            breadth_calm_above: default_breadth_calm(),
            breadth_normal_above: default_breadth_normal(),
            vol_weight: default_vol_weight(),
            ma_weight: default_ma_weight(),
            breadth_weight: default_breadth_weight(),
        }
    }
}

/// 분류 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    /// 승리한 투표
    pub vote: RegimeVote,
    /// 정규화 득표율 (calm, normal, volatile)
    pub shares: [f64; 3],
    /// 신뢰도 (0~100)
    pub confidence: f64,
}

impl RegimeClassification {
    /// 레짐 스냅샷으로 변환합니다.
    pub fn into_snapshot(self, detected_at: DateTime<Utc>) -> RegimeSnapshot {
        RegimeSnapshot::new(self.vote.label().as_str(), self.confidence, detected_at)
    }
}

/// 다수결 레짐 분류기.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeClassifierConfig,
}

impl RegimeClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new(config: RegimeClassifierConfig) -> Self {
        Self { config }
    }

    fn vol_vote(&self, vol: f64) -> RegimeVote {
        if vol < self.config.vol_calm_below {
            RegimeVote::Calm
        } else if vol < self.config.vol_normal_below {
            RegimeVote::Normal
        } else {
            RegimeVote::Volatile
        }
    }

    fn ma_vote(&self, pct: f64) -> RegimeVote {
        let distance = pct.abs();
        if distance < self.config.ma_volatile_within_pct {
            RegimeVote::Volatile
        } else if distance > self.config.ma_calm_beyond_pct {
            RegimeVote::Calm
        } else {
            RegimeVote::Normal
        }
    }

    fn breadth_vote(&self, breadth: &[f64; 3]) -> RegimeVote {
        let thrust = (breadth.iter().sum::<f64>() / 3.0).clamp(0.0, 1.0);
        if thrust > self.config.breadth_calm_above {
            RegimeVote::Calm
        } else if thrust > self.config.breadth_normal_above {
            RegimeVote::Normal
        } else {
            RegimeVote::Volatile
        }
    }

    /// 레짐을 분류합니다.
    ///
    /// 유한하지 않은 지표는 투표에서 제외됩니다. 모든 지표가 제외되면 normal(신뢰도 0).
    pub fn classify(&self, inputs: &RegimeInputs) -> RegimeClassification {
        let mut votes = [0.0_f64; 3];

        if inputs.realized_vol.is_finite() {
            votes[self.vol_vote(inputs.realized_vol).index()] += self.config.vol_weight;
        }
        if inputs.price_vs_ma20_pct.is_finite() {
            votes[self.ma_vote(inputs.price_vs_ma20_pct).index()] += self.config.ma_weight;
        }
        if inputs.breadth.iter().all(|b| b.is_finite()) {
            votes[self.breadth_vote(&inputs.breadth).index()] += self.config.breadth_weight;
        }

        let total: f64 = votes.iter().sum();
        if total <= 0.0 {
            return RegimeClassification {
                vote: RegimeVote::Normal,
                shares: [0.0; 3],
                confidence: 0.0,
            };
        }
        let shares = votes.map(|v| v / total);

        let mut winner = RegimeVote::PRIORITY[0];
        for candidate in RegimeVote::PRIORITY {
            if shares[candidate.index()] > shares[winner.index()] + 1e-12 {
                winner = candidate;
            }
        }

        let confidence = shares[winner.index()] * 100.0;
        tracing::debug!(
            vote = ?winner,
            confidence = confidence,
            calm = shares[0],
            normal = shares[1],
            volatile = shares[2],
            "레짐 분류"
        );

        RegimeClassification {
            vote: winner,
            shares,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanimous_calm() {
        let result = RegimeClassifier::default().classify(&RegimeInputs {
            realized_vol: 0.10,
            price_vs_ma20_pct: 8.0,
            breadth: [0.8, 0.9, 0.75],
        });
        assert_eq!(result.vote, RegimeVote::Calm);
        assert!((result.confidence - 100.0).abs() < 1e-9);
        assert_eq!(result.vote.label(), RegimeLabel::TrendingBull);
    }

    #[test]
    fn test_weighted_majority() {
        // vol=volatile(0.4), ma=calm(0.3), breadth=calm(0.3) → calm 0.6
        let result = RegimeClassifier::default().classify(&RegimeInputs {
            realized_vol: 0.50,
            price_vs_ma20_pct: -6.0,
            breadth: [0.9, 0.8, 0.7],
        });
        assert_eq!(result.vote, RegimeVote::Calm);
        assert!((result.confidence - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_prefers_normal() {
        // vol 제외, ma=normal(0.3), breadth=volatile(0.3)
        let result = RegimeClassifier::default().classify(&RegimeInputs {
            realized_vol: f64::NAN,
            price_vs_ma20_pct: 3.0,
            breadth: [0.1, 0.2, 0.1],
        });
        assert_eq!(result.vote, RegimeVote::Normal);
        assert!((result.confidence - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_breadth_clamped() {
        let result = RegimeClassifier::default().classify(&RegimeInputs {
            realized_vol: f64::NAN,
            price_vs_ma20_pct: f64::NAN,
            breadth: [5.0, 5.0, 5.0],
        });
        assert_eq!(result.vote, RegimeVote::Calm);
    }

    #[test]
    fn test_no_inputs_defaults_to_normal() {
        let result = RegimeClassifier::default().classify(&RegimeInputs {
            realized_vol: f64::NAN,
            price_vs_ma20_pct: f64::INFINITY,
            breadth: [f64::NAN, 0.5, 0.5],
        });
        assert_eq!(result.vote, RegimeVote::Normal);
        assert_eq!(result.confidence, 0.0);
        let snapshot = result.into_snapshot(chrono::Utc::now());
        assert_eq!(snapshot.parsed_label(), Some(RegimeLabel::Choppy));
    }
}
