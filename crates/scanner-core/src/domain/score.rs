//! 복합 점수 및 점수 분해.

use serde::{Deserialize, Serialize};

use super::factor::{FactorKind, QualityFlag};

/// 복합 점수.
///
/// - `internal_0_100`: 레짐 가중치로 합산한 내부 점수, 항상 [0, 100]
/// - `final_with_social`: 내부 점수 + 소셜 항(±10) + 측정 부스트, 상한 적용
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// 내부 점수 (0~100)
    pub internal_0_100: f64,
    /// 최종 점수 (0~상한)
    pub final_with_social: f64,
}

/// 팩터별 점수 기여.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    /// 팩터 종류
    pub kind: FactorKind,
    /// 입력 값 (모멘텀 값 또는 잔차)
    #[serde(with = "crate::types::finite")]
    pub input: f64,
    /// 0~100 변환 점수
    pub points: f64,
    /// 레짐 가중치
    pub weight: f64,
    /// 가중 기여도 (points × weight)
    pub contribution: f64,
    /// 중립값(50)으로 대체되었는지 여부
    pub neutralized: bool,
}

/// 외부 측정 부스트 내역.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBoosts {
    /// 펀딩 다이버전스 부스트
    pub funding: f64,
    /// OI 잔차 부스트
    pub open_interest: f64,
    /// 자금 흐름(ETF) 부스트
    pub flow: f64,
    /// 합계 (총 상한 적용 후)
    pub total: f64,
}

/// 데이터 완전성 라벨.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// 모든 입력이 유효
    Complete,
    /// 일부 타임프레임 또는 측정값 누락
    Partial,
    /// 중립값 대체 발생
    Degraded,
}

/// 점수 분해 (감사 기록용).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 팩터별 기여
    pub components: Vec<ComponentScore>,
    /// 소셜 잔차 원본
    #[serde(with = "crate::types::finite")]
    pub social_raw: f64,
    /// 상한 적용된 소셜 항
    pub social_capped: f64,
    /// 측정 부스트
    pub boosts: MeasurementBoosts,
    /// 점수 단계 품질 플래그
    pub flags: Vec<QualityFlag>,
    /// 데이터 완전성
    pub data_quality: DataQuality,
}

impl ScoreBreakdown {
    /// 종류별 기여를 찾습니다.
    pub fn component(&self, kind: FactorKind) -> Option<&ComponentScore> {
        self.components.iter().find(|c| c.kind == kind)
    }
}
