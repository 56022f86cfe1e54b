//! 스캔 파이프라인 전반에서 사용되는 공통 타입.

pub mod finite;
mod symbol;
mod timeframe;

pub use symbol::*;
pub use timeframe::*;
