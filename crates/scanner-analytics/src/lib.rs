//! 팩터 분석 및 점수 계산 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 기술적 지표 (RSI, ATR, ADX, 지속성, VWAP, VADR)
//! - 팩터 추출기
//! - 보호되는 모멘텀 코어 계산
//! - Gram-Schmidt 직교화
//! - 레짐 가중치 해석
//! - 복합 점수 계산
//! - 다수결 레짐 분류기
//!
//! # Re-exports
//!
//! - [`orthogonalizer`]: 횡단면 직교화 (Orthogonalizer, FactorPanel 등)
//! - [`composite`]: 복합 점수 (CompositeScorer, ScoringConfig 등)

pub mod composite;
pub mod correlation;
pub mod extractors;
pub mod indicators;
pub mod momentum;
pub mod orthogonalizer;
pub mod regime;
pub mod weights;

// Composite 모듈 re-exports
pub use composite::{
    BoostConfig, CompositeScorer, MeasurementInputs, ScoringConfig, ScoringConfigError,
    NEUTRAL_POINTS,
};

// Extractor 모듈 re-exports
pub use extractors::{Extraction, ExtractionError, FactorExtractor, SymbolData};

// Momentum 모듈 re-exports
pub use momentum::{MomentumCalculator, MomentumConfig, MomentumConfigError, TimeframeWeights};

// Orthogonalizer 모듈 re-exports
pub use orthogonalizer::{
    FactorDiagnostics, FactorPanel, OrthogonalityDiagnostics, OrthogonalizationResult,
    Orthogonalizer,
};

// Regime 모듈 re-exports
pub use regime::{
    RegimeClassification, RegimeClassifier, RegimeClassifierConfig, RegimeInputs, RegimeVote,
};

// Weights 모듈 re-exports
pub use weights::{
    RegimeWeightTable, RegimeWeights, ResolvedWeights, WeightError, WeightResolver,
    WEIGHT_SUM_TOLERANCE,
};
