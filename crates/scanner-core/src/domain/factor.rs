//! 팩터 페이로드 및 팩터 집합.
//!
//! 팩터는 문자열 키 맵 대신 `Factor` 태그 열거형으로 표현합니다.
//! 직교화 순서와 가중치 조회는 `FactorKind`에 대한 완전 매칭으로 검증됩니다.
//!
//! # 팩터 구성
//!
//! | 팩터 | 원시 입력 | 스칼라 변환 |
//! |------|-----------|-------------|
//! | Momentum | 1h/4h/12h/24h/7d 수익률 (ATR 정규화) | 모멘텀 코어 값 |
//! | Technical | RSI, ADX, 지속성 | mean(rsi/100, adx/100, persistence) |
//! | Volume | 거래량 급증 비율, OI 변화 | 0.7·(surge/5) + 0.3·oi_delta |
//! | Quality | OI 수준, 준비금 비율, 자금 흐름, 거래소 건전성 | mean(oi/1e6, reserve, flow/1e5, venue) |
//! | Social | 감성 점수, 브랜드 점수 | (sentiment + brand) / 2 |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Symbol, Timeframe};

/// 팩터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// 보호되는 기준 팩터
    Momentum,
    /// 기술적 팩터
    Technical,
    /// 거래량 팩터
    Volume,
    /// 품질 팩터
    Quality,
    /// 소셜 팩터 (가중치 합계에서 제외, 상한이 있는 가산 항)
    Social,
}

impl FactorKind {
    /// 잔차화 순서. 모멘텀은 포함되지 않습니다.
    pub const RESIDUAL_ORDER: [FactorKind; 4] = [
        FactorKind::Technical,
        FactorKind::Volume,
        FactorKind::Quality,
        FactorKind::Social,
    ];

    /// 로그/감사 기록용 문자열.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::Technical => "technical",
            Self::Volume => "volume",
            Self::Quality => "quality",
            Self::Social => "social",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 데이터 품질 플래그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// 일부 입력이 비정상이어서 중립값으로 대체됨
    Degraded,
    /// 거래량/유동성이 0
    Illiquid,
    /// 일부 모멘텀 타임프레임이 데이터 부족으로 제외됨
    PartialCoverage,
    /// 점수 산출에 필요한 최소 팩터 조건 미충족
    InvalidForScoring,
    /// NaN/Inf 입력 감지
    NonFiniteInput,
}

/// 플래그 목록에 중복 없이 추가합니다.
pub fn push_flag(flags: &mut Vec<QualityFlag>, flag: QualityFlag) {
    if !flags.contains(&flag) {
        flags.push(flag);
    }
}

/// 타임프레임별 모멘텀 원시 입력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeReading {
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 사용 가능한 캔들 수
    pub bars: usize,
    /// 마지막 캔들 수익률 (%)
    #[serde(with = "crate::types::finite")]
    pub return_pct: f64,
    /// ATR (종가 대비 %)
    #[serde(with = "crate::types::finite")]
    pub atr_pct: f64,
    /// RSI (0~100)
    #[serde(with = "crate::types::finite")]
    pub rsi: f64,
    /// 모멘텀 계산에 사용되었는지 여부
    pub valid: bool,
}

/// 보호되는 모멘텀 코어.
///
/// 이 값은 직교화의 잔차화 대상이 되지 않으며, 다른 팩터의 투영 기준으로만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumCore {
    /// 모멘텀 값 (ATR 정규화 수익률의 가중 합, 무한대 범위)
    pub value: f64,
    /// 4h 가속도 (최근 4h 수익률 - 직전 4h 수익률, %p)
    pub acceleration: f64,
    /// 가속도 부호가 유지된 캔들 수
    pub accel_age_bars: usize,
    /// 가속도가 신선한지 여부 (2캔들 이내)
    pub accel_fresh: bool,
    /// 4h 부스트 배수 (1.0 = 부스트 없음)
    pub boost: f64,
    /// 계산에 사용된 타임프레임
    pub coverage: Vec<Timeframe>,
    /// 품질 플래그
    pub flags: Vec<QualityFlag>,
}

impl MomentumCore {
    /// 유효한 타임프레임이 없을 때의 모멘텀.
    pub fn invalid() -> Self {
        Self {
            value: 0.0,
            acceleration: 0.0,
            accel_age_bars: 0,
            accel_fresh: false,
            boost: 1.0,
            coverage: Vec::new(),
            flags: vec![QualityFlag::InvalidForScoring],
        }
    }

    /// 재가속 안전 조건 (신선하고 양수인 가속도).
    pub fn is_reaccelerating(&self) -> bool {
        self.accel_fresh && self.acceleration > 0.0
    }
}

/// 기술적 팩터 입력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFactor {
    /// 4h RSI (0~100)
    pub rsi: f64,
    /// 4h ADX (0~100)
    pub adx: f64,
    /// 추세 지속성 (0~1, 0.5 = 랜덤워크)
    pub persistence: f64,
}

impl TechnicalFactor {
    /// 단일 스칼라 값.
    pub fn scalar(&self) -> f64 {
        (self.rsi / 100.0 + self.adx / 100.0 + self.persistence) / 3.0
    }
}

/// 거래량 팩터 입력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeFactor {
    /// 최근 24h 거래량 / 이전 평균 거래량
    pub surge_ratio: f64,
    /// 미결제약정 변화율
    pub oi_delta: f64,
    /// 최근 24h 거래대금
    pub quote_volume_24h: f64,
}

impl VolumeFactor {
    /// 단일 스칼라 값.
    pub fn scalar(&self) -> f64 {
        0.7 * (self.surge_ratio / 5.0) + 0.3 * self.oi_delta
    }

    /// 거래량이 0이거나 유효하지 않은 경우.
    pub fn is_illiquid(&self) -> bool {
        !(self.quote_volume_24h.is_finite() && self.quote_volume_24h > 0.0)
    }
}

/// 품질 팩터 입력.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFactor {
    /// 미결제약정 수준 (USD)
    pub open_interest: f64,
    /// 준비금 비율 (0~1)
    pub reserve_ratio: f64,
    /// 자금 흐름 신호 (USD)
    pub flow: f64,
    /// 거래소 건전성 (0~1)
    pub venue_health: f64,
}

impl QualityFactor {
    /// 단일 스칼라 값.
    pub fn scalar(&self) -> f64 {
        (self.open_interest / 1e6 + self.reserve_ratio + self.flow / 1e5 + self.venue_health) / 4.0
    }
}

/// 소셜 팩터 입력 (점수 단위).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialFactor {
    /// 감성 점수
    pub sentiment: f64,
    /// 브랜드 점수
    pub brand: f64,
}

impl SocialFactor {
    /// 단일 스칼라 값.
    pub fn scalar(&self) -> f64 {
        (self.sentiment + self.brand) / 2.0
    }
}

/// 타입이 지정된 팩터 값.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    /// 모멘텀 코어
    Momentum(MomentumCore),
    /// 기술적 팩터
    Technical(TechnicalFactor),
    /// 거래량 팩터
    Volume(VolumeFactor),
    /// 품질 팩터
    Quality(QualityFactor),
    /// 소셜 팩터
    Social(SocialFactor),
}

impl Factor {
    /// 팩터 종류.
    pub fn kind(&self) -> FactorKind {
        match self {
            Factor::Momentum(_) => FactorKind::Momentum,
            Factor::Technical(_) => FactorKind::Technical,
            Factor::Volume(_) => FactorKind::Volume,
            Factor::Quality(_) => FactorKind::Quality,
            Factor::Social(_) => FactorKind::Social,
        }
    }

    /// 단일 스칼라 값.
    pub fn scalar(&self) -> f64 {
        match self {
            Factor::Momentum(m) => m.value,
            Factor::Technical(t) => t.scalar(),
            Factor::Volume(v) => v.scalar(),
            Factor::Quality(q) => q.scalar(),
            Factor::Social(s) => s.scalar(),
        }
    }
}

/// 심볼별, 사이클별 원시 팩터 집합 (생성 후 불변).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSet {
    /// 심볼
    pub symbol: Symbol,
    /// 데이터 기준 시각
    pub timestamp: DateTime<Utc>,
    /// 타임프레임별 모멘텀 입력
    pub timeframes: Vec<TimeframeReading>,
    /// 모멘텀 코어
    pub momentum: MomentumCore,
    /// 기술적 팩터
    pub technical: TechnicalFactor,
    /// 거래량 팩터
    pub volume: VolumeFactor,
    /// 품질 팩터
    pub quality: QualityFactor,
    /// 소셜 팩터
    pub social: SocialFactor,
    /// 추출 단계 품질 플래그
    pub flags: Vec<QualityFlag>,
}

impl FactorSet {
    /// 종류별 팩터 값을 반환합니다.
    pub fn factor(&self, kind: FactorKind) -> Factor {
        match kind {
            FactorKind::Momentum => Factor::Momentum(self.momentum.clone()),
            FactorKind::Technical => Factor::Technical(self.technical.clone()),
            FactorKind::Volume => Factor::Volume(self.volume.clone()),
            FactorKind::Quality => Factor::Quality(self.quality.clone()),
            FactorKind::Social => Factor::Social(self.social.clone()),
        }
    }

    /// 잔차화 대상 팩터의 스칼라 값. 모멘텀은 `None`.
    pub fn secondary_scalar(&self, kind: FactorKind) -> Option<f64> {
        match kind {
            FactorKind::Momentum => None,
            other => Some(self.factor(other).scalar()),
        }
    }
}

/// 직교화된 팩터 집합.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalFactorSet {
    /// 기술적 잔차
    #[serde(with = "crate::types::finite")]
    pub technical_residual: f64,
    /// 거래량 잔차
    #[serde(with = "crate::types::finite")]
    pub volume_residual: f64,
    /// 품질 잔차
    #[serde(with = "crate::types::finite")]
    pub quality_residual: f64,
    /// 소셜 잔차 (점수 단위, 상한은 점수 계산 단계에서 적용)
    #[serde(with = "crate::types::finite")]
    pub social_residual: f64,
    /// 비정상 입력으로 0이 된 팩터
    pub degraded: Vec<FactorKind>,
    /// 점수 산출 가능 여부
    pub valid_for_scoring: bool,
}

impl OrthogonalFactorSet {
    /// 종류별 잔차. 모멘텀은 `None`.
    pub fn residual(&self, kind: FactorKind) -> Option<f64> {
        match kind {
            FactorKind::Momentum => None,
            FactorKind::Technical => Some(self.technical_residual),
            FactorKind::Volume => Some(self.volume_residual),
            FactorKind::Quality => Some(self.quality_residual),
            FactorKind::Social => Some(self.social_residual),
        }
    }

    /// 종류별 잔차를 설정합니다. 모멘텀은 무시됩니다.
    pub fn set_residual(&mut self, kind: FactorKind, value: f64) {
        match kind {
            FactorKind::Momentum => {}
            FactorKind::Technical => self.technical_residual = value,
            FactorKind::Volume => self.volume_residual = value,
            FactorKind::Quality => self.quality_residual = value,
            FactorKind::Social => self.social_residual = value,
        }
    }

    /// 해당 팩터가 비정상 입력으로 중립 처리되었는지 여부.
    pub fn is_degraded(&self, kind: FactorKind) -> bool {
        self.degraded.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residual_order_excludes_momentum() {
        assert!(!FactorKind::RESIDUAL_ORDER.contains(&FactorKind::Momentum));
        assert_eq!(FactorKind::RESIDUAL_ORDER[0], FactorKind::Technical);
        assert_eq!(FactorKind::RESIDUAL_ORDER[3], FactorKind::Social);
    }

    #[test]
    fn test_scalar_reductions() {
        let technical = TechnicalFactor { rsi: 60.0, adx: 30.0, persistence: 0.6 };
        assert!((technical.scalar() - 0.5).abs() < 1e-12);

        let volume = VolumeFactor { surge_ratio: 2.5, oi_delta: 0.1, quote_volume_24h: 1.0 };
        assert!((volume.scalar() - 0.38).abs() < 1e-12);

        let social = SocialFactor { sentiment: 40.0, brand: 20.0 };
        assert_eq!(Factor::Social(social).scalar(), 30.0);
    }

    #[test]
    fn test_volume_illiquid() {
        let zero = VolumeFactor { surge_ratio: 0.0, oi_delta: 0.0, quote_volume_24h: 0.0 };
        assert!(zero.is_illiquid());
        let nan = VolumeFactor { surge_ratio: 1.0, oi_delta: 0.0, quote_volume_24h: f64::NAN };
        assert!(nan.is_illiquid());
    }

    #[test]
    fn test_push_flag_dedup() {
        let mut flags = Vec::new();
        push_flag(&mut flags, QualityFlag::Degraded);
        push_flag(&mut flags, QualityFlag::Degraded);
        assert_eq!(flags, vec![QualityFlag::Degraded]);
    }

    #[test]
    fn test_orthogonal_set_residual_access() {
        let mut set = OrthogonalFactorSet::default();
        set.set_residual(FactorKind::Quality, 0.25);
        set.set_residual(FactorKind::Momentum, 9.0);
        assert_eq!(set.residual(FactorKind::Quality), Some(0.25));
        assert_eq!(set.residual(FactorKind::Momentum), None);
    }

    #[test]
    fn test_unavailable_reading_survives_json() {
        let reading = TimeframeReading {
            timeframe: Timeframe::D1,
            bars: 0,
            return_pct: f64::NAN,
            atr_pct: f64::NAN,
            rsi: f64::NAN,
            valid: false,
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains(r#""return_pct":null"#));

        let back: TimeframeReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeframe, Timeframe::D1);
        assert!(back.return_pct.is_nan());
        assert!(back.atr_pct.is_nan());
        assert!(back.rsi.is_nan());
        assert!(!back.valid);
    }
}
