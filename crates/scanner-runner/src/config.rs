//! 스캐너 설정.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤가 우선):
//! 1. `config/default.toml` (없으면 건너뜀)
//! 2. `--config`로 지정한 사용자 파일
//! 3. `SCANNER__` 접두사 환경 변수 (예: `SCANNER__PIPELINE__TOP_N=5`)
//!
//! 로드 직후 모든 섹션을 검증하며, 불변식 위반은 첫 사이클 전에 치명적 에러가 됩니다.

use std::path::{Path, PathBuf};
use std::time::Duration;

use scanner_analytics::{MomentumConfig, RegimeClassifierConfig, RegimeWeightTable, ScoringConfig};
use scanner_core::LogConfig;
use scanner_risk::{GateConfig, GuardConfig, MicrostructureConfig, RiskThresholds};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 지원하는 설정 버전.
pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// 기본 설정 파일 경로 (확장자 제외).
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// 모멘텀/지표 계산에 필요한 최소 캔들 조회 수.
const MIN_LOOKBACK_BARS: usize = 30;

/// 파이프라인 설정 (`[pipeline]` 섹션).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 동시 처리 심볼 수 (업스트림 한도 보호)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// 심볼당 단계 시간 제한 (밀리초)
    #[serde(default = "default_per_symbol_timeout_ms")]
    pub per_symbol_timeout_ms: u64,

    /// 선택할 상위 후보 수
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// 타임프레임당 조회 캔들 수
    #[serde(default = "default_lookback_bars")]
    pub lookback_bars: usize,

    /// 감사 기록 디렉토리
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    /// 감사 파일 접두사
    #[serde(default = "default_audit_prefix")]
    pub audit_prefix: String,

    /// 데몬 모드 사이클 주기 (초)
    #[serde(default = "default_daemon_interval_secs")]
    pub daemon_interval_secs: u64,

    /// 레짐 재조회 주기 (초, 기본 4시간)
    #[serde(default = "default_regime_refresh_secs")]
    pub regime_refresh_secs: u64,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_worker_count() -> usize {
    8
}

fn default_per_symbol_timeout_ms() -> u64 {
    5_000
}

fn default_top_n() -> usize {
    10
}

fn default_lookback_bars() -> usize {
    200
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("audit")
}

fn default_audit_prefix() -> String {
    "scan".to_string()
}

fn default_daemon_interval_secs() -> u64 {
    300
}

fn default_regime_refresh_secs() -> u64 {
    4 * 60 * 60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            per_symbol_timeout_ms: default_per_symbol_timeout_ms(),
            top_n: default_top_n(),
            lookback_bars: default_lookback_bars(),
            audit_dir: default_audit_dir(),
            audit_prefix: default_audit_prefix(),
            daemon_interval_secs: default_daemon_interval_secs(),
            regime_refresh_secs: default_regime_refresh_secs(),
        }
    }
}

impl PipelineConfig {
    /// 심볼당 시간 제한.
    pub fn per_symbol_timeout(&self) -> Duration {
        Duration::from_millis(self.per_symbol_timeout_ms)
    }

    /// 데몬 주기.
    pub fn daemon_interval(&self) -> Duration {
        Duration::from_secs(self.daemon_interval_secs)
    }

    /// 레짐 재조회 주기.
    pub fn regime_refresh(&self) -> Duration {
        Duration::from_secs(self.regime_refresh_secs)
    }

    /// 설정 검증.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Pipeline("worker_count는 1 이상이어야 합니다".into()));
        }
        if self.per_symbol_timeout_ms == 0 {
            return Err(ConfigError::Pipeline(
                "per_symbol_timeout_ms는 0보다 커야 합니다".into(),
            ));
        }
        if self.top_n == 0 {
            return Err(ConfigError::Pipeline("top_n은 1 이상이어야 합니다".into()));
        }
        if self.lookback_bars < MIN_LOOKBACK_BARS {
            return Err(ConfigError::Pipeline(format!(
                "lookback_bars는 {MIN_LOOKBACK_BARS} 이상이어야 합니다: {}",
                self.lookback_bars
            )));
        }
        if self.audit_prefix.trim().is_empty() {
            return Err(ConfigError::Pipeline("audit_prefix가 비어 있습니다".into()));
        }
        if self.daemon_interval_secs == 0 || self.regime_refresh_secs == 0 {
            return Err(ConfigError::Pipeline("주기 설정은 0보다 커야 합니다".into()));
        }
        Ok(())
    }
}

/// 스캐너 전체 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// 설정 스키마 버전
    #[serde(default = "default_version")]
    pub version: u32,

    /// 로깅
    #[serde(default)]
    pub logging: LogConfig,

    /// 파이프라인
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// 레짐 가중치 테이블
    #[serde(default)]
    pub weights: RegimeWeightTable,

    /// 모멘텀 타임프레임 가중치
    #[serde(default)]
    pub momentum: MomentumConfig,

    /// 점수 계산
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// 레짐 분류기 (리플레이 피드에 명시적 레짐이 없을 때)
    #[serde(default)]
    pub regime: RegimeClassifierConfig,

    /// 진입 게이트
    #[serde(default)]
    pub gates: GateConfig,

    /// 가드
    #[serde(default)]
    pub guards: GuardConfig,

    /// 마이크로구조
    #[serde(default)]
    pub microstructure: MicrostructureConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            logging: LogConfig::default(),
            pipeline: PipelineConfig::default(),
            weights: RegimeWeightTable::default(),
            momentum: MomentumConfig::default(),
            scoring: ScoringConfig::default(),
            regime: RegimeClassifierConfig::default(),
            gates: GateConfig::default(),
            guards: GuardConfig::default(),
            microstructure: MicrostructureConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// 기본 파일, 사용자 파일, 환경 변수에서 설정을 로드하고 검증합니다.
    ///
    /// # 인자
    /// * `path` - 사용자 설정 파일 (선택)
    ///
    /// # 에러
    /// 로드 실패 또는 불변식 위반 시 `ConfigError`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_PATH).required(false));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SCANNER")
                .separator("__")
                .try_parsing(true),
        );

        let config: ScannerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            version = config.version,
            workers = config.pipeline.worker_count,
            top_n = config.pipeline.top_n,
            "설정 로드 완료"
        );
        Ok(config)
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 병합 없음).
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScannerConfig = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 모든 섹션을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(
                self.version,
                SUPPORTED_CONFIG_VERSION,
            ));
        }
        self.pipeline.validate()?;
        self.weights.validate()?;
        self.momentum.validate()?;
        self.scoring.validate()?;
        self.thresholds().validate()?;
        Ok(())
    }

    /// 게이트/가드 임계값 묶음.
    pub fn thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            gates: self.gates.clone(),
            guards: self.guards.clone(),
            microstructure: self.microstructure.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.top_n, 10);
        assert_eq!(config.pipeline.regime_refresh(), Duration::from_secs(14_400));
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = ScannerConfig::from_toml_str(
            r#"
            version = 1

            [pipeline]
            top_n = 3
            worker_count = 2

            [gates]
            min_score = 80.0
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.top_n, 3);
        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.pipeline.lookback_bars, 200);
        assert_eq!(config.gates.min_score, 80.0);
        assert_eq!(config.gates.min_vadr, 1.8);
    }

    #[test]
    fn test_weights_not_summing_to_one_rejected() {
        let result = ScannerConfig::from_toml_str(
            r#"
            [weights.choppy]
            momentum = 0.5
            technical = 0.3
            volume = 0.3
            quality = 0.2
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Weights(_))));
    }

    #[test]
    fn test_safety_ceiling_rejected_at_load() {
        let result = ScannerConfig::from_toml_str(
            r#"
            [guards.fatigue]
            trending_return_pct = 30.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Thresholds(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let result = ScannerConfig::from_toml_str("version = 2");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(2, 1))));
    }
}
