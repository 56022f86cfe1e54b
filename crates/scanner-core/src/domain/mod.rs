//! 스캔 파이프라인을 위한 도메인 모델.

mod candidate;
mod evidence;
mod factor;
mod market_context;
mod market_data;
mod regime;
mod score;
mod signal;

pub use candidate::*;
pub use evidence::*;
pub use factor::*;
pub use market_context::*;
pub use market_data::*;
pub use regime::*;
pub use score::*;
pub use signal::*;
