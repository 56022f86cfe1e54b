//! # Scanner Core
//!
//! 시그널 스캐너의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 스캔 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼 및 타임프레임 정의
//! - 캔들/호가창 시장 데이터 구조체
//! - 레짐 라벨 및 스냅샷
//! - 팩터 페이로드와 직교화 결과
//! - 복합 점수, 게이트 증거, 후보(Candidate)
//! - 에러 타입
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
