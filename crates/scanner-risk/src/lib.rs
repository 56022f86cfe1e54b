//! 진입 게이트 및 리스크 가드.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - HALF-UP 반올림 후 포함 비교
//! - 진입 하드 게이트 (점수, VADR, 펀딩 다이버전스)
//! - 레짐 인식 가드 (피로, 신선도, 늦은 체결)와 절대 안전 상한
//! - 거래소 원본 호가창 마이크로구조 검사
//! - (심볼, 가드) 단위 완화 쿨다운 저장소
//!
//! 모든 게이트와 가드는 통과 여부와 무관하게 증거를 남기며,
//! 잘못된 데이터는 센티널(`GateFault`)로 구분됩니다.

pub mod config;
pub mod cooldown;
pub mod entry;
pub mod gate;
pub mod guards;
pub mod microstructure;
pub mod rounding;

pub use config::{
    ConfigValidationError, FatigueConfig, FreshnessConfig, GateConfig, GuardConfig,
    LateFillConfig, MicrostructureConfig, RiskThresholds,
};
pub use cooldown::{CooldownStore, GuardKind, InMemoryCooldownStore};
pub use entry::EntryGates;
pub use gate::{GateEvaluator, GateInputs, GateOutcome};
pub use guards::{GuardContext, GuardEvaluator};
pub use microstructure::{MicrostructureChecker, MicrostructureReport};
pub use rounding::{round_half_up, Comparison, Measure};
