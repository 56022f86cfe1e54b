//! # Scanner Runner
//!
//! 스캔 사이클 오케스트레이션과 운영자 CLI.
//!
//! - [`pipeline`]: 추출 → 직교화 배리어 → 점수/게이트 → 순위
//! - [`providers`]: 시장 데이터, 레짐 감지기, 시그널 제공자 인터페이스
//! - [`replay`]: JSON 스냅샷 기반 제공자 구현
//! - [`audit`]: NDJSON 감사 기록 및 Top-N 요약의 원자적 기록
//! - [`config`]: 계층형 설정 로드 및 검증

pub mod audit;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod ranker;
pub mod replay;
pub mod stats;

pub use audit::{AuditPaths, AuditWriter, TopNSummary};
pub use config::{PipelineConfig, ScannerConfig, DEFAULT_CONFIG_PATH, SUPPORTED_CONFIG_VERSION};
pub use error::{ConfigError, ProviderError, Result};
pub use pipeline::{CycleReport, ExcludedSymbol, ScanPipeline};
pub use providers::{
    CadencedRegimeDetector, MarketDataProvider, Providers, RegimeDetector, SignalProvider,
};
pub use replay::{ReloadableFeed, ReplayFeed, ReplaySnapshot, ReplaySymbol};
pub use stats::{percentile, CycleStats};
