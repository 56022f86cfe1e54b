//! 에러 타입 정의.

use scanner_analytics::{MomentumConfigError, ScoringConfigError, WeightError};
use scanner_core::ScannerError;
use scanner_risk::ConfigValidationError;
use thiserror::Error;

/// 외부 협력자(시장 데이터, 레짐 감지기, 시그널 제공자) 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// 업스트림 사용 불가
    #[error("업스트림 사용 불가: {0}")]
    Unavailable(String),

    /// 응답 시간 초과
    #[error("업스트림 시간 초과: {0}")]
    Timeout(String),

    /// 잘못된 응답
    #[error("잘못된 응답: {0}")]
    Malformed(String),

    /// 데이터 없음
    #[error("데이터 없음: {0}")]
    NotFound(String),
}

impl From<ProviderError> for ScannerError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(msg) => ScannerError::Timeout(msg),
            other => ScannerError::Upstream(other.to_string()),
        }
    }
}

/// 설정 로드/검증 에러.
///
/// 모두 치명적이며, 첫 사이클 시작 전에 프로세스를 중단시킵니다.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 설정 파일/환경 변수 로드 실패
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),

    /// 지원하지 않는 설정 버전
    #[error("지원하지 않는 설정 버전: {0} (지원: {1})")]
    UnsupportedVersion(u32, u32),

    /// 레짐 가중치 테이블 불변식 위반
    #[error("가중치 테이블 오류: {0}")]
    Weights(#[from] WeightError),

    /// 모멘텀 타임프레임 가중치 오류
    #[error("모멘텀 설정 오류: {0}")]
    Momentum(#[from] MomentumConfigError),

    /// 점수 설정 오류
    #[error("점수 설정 오류: {0}")]
    Scoring(#[from] ScoringConfigError),

    /// 게이트/가드 임계값 오류
    #[error("임계값 설정 오류: {0}")]
    Thresholds(#[from] ConfigValidationError),

    /// 파이프라인 설정 오류
    #[error("파이프라인 설정 오류: {0}")]
    Pipeline(String),
}

impl From<ConfigError> for ScannerError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Weights(_)
            | ConfigError::Momentum(_)
            | ConfigError::Scoring(_)
            | ConfigError::Thresholds(_) => ScannerError::InvariantViolation(err.to_string()),
            other => ScannerError::Config(other.to_string()),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, ScannerError>;
