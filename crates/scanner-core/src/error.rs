//! 스캐너 시스템의 에러 타입.
//!
//! 이 모듈은 스캔 파이프라인 전반에서 사용되는 에러 타입을 정의합니다.
//! 입력 값 오류(NaN/Inf 등)는 에러가 아니라 중립값 + 품질 플래그로 처리되므로
//! 여기에는 사이클 단위로 전파되어야 하는 실패만 정의합니다.

use thiserror::Error;

/// 핵심 스캐너 에러.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 설정 불변식 위반 (가중치 합계, 모멘텀 하한 등)
    #[error("불변식 위반: {0}")]
    InvariantViolation(String),

    /// 업스트림 데이터 제공자 에러
    #[error("업스트림 에러: {0}")]
    Upstream(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 시간 초과
    #[error("시간 초과: {0}")]
    Timeout(String),

    /// 사이클 취소
    #[error("사이클 취소됨: {0}")]
    Cancelled(String),

    /// 파일 I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 스캐너 작업을 위한 Result 타입.
pub type ScannerResult<T> = Result<T, ScannerError>;

impl ScannerError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScannerError::Upstream(_) | ScannerError::Timeout(_))
    }

    /// 사이클 시작 전에 프로세스를 중단해야 하는 치명적 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScannerError::Config(_) | ScannerError::InvariantViolation(_)
        )
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        ScannerError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let upstream = ScannerError::Upstream("timeout".to_string());
        assert!(upstream.is_retryable());

        let config = ScannerError::Config("bad".to_string());
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        let invariant = ScannerError::InvariantViolation("weights sum 0.9".to_string());
        assert!(invariant.is_fatal());

        let cancelled = ScannerError::Cancelled("ctrl-c".to_string());
        assert!(!cancelled.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ScannerError::Timeout("BTC-USD".to_string());
        assert_eq!(err.to_string(), "시간 초과: BTC-USD");
    }

    #[test]
    fn test_from_serde_json() {
        let parse: Result<u32, _> = serde_json::from_str("not-json");
        let err: ScannerError = parse.unwrap_err().into();
        assert!(matches!(err, ScannerError::Serialization(_)));
    }
}
