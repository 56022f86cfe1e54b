//! tracing을 사용한 로깅 인프라.
//!
//! 이 모듈은 다양한 출력 형식을 지원하는 구조화된 로깅을 제공합니다:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 감사 로그 수집기와 함께 쓰는 JSON 형식
//! - **compact**: 데몬 모드용 간결한 형식
//!
//! `LogConfig`는 설정 파일의 `[logging]` 섹션에서 바로 역직렬화됩니다.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 색상이 포함된 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// 로그 집계용 JSON 형식 (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("알 수 없는 로그 형식: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "scanner_runner=debug")
    #[serde(default = "default_level")]
    pub level: String,
    /// 출력 형식
    #[serde(default)]
    pub format: LogFormat,
    /// span 진입/종료 이벤트 포함 여부
    #[serde(default)]
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    #[serde(default)]
    pub with_file: bool,
    /// 대상(모듈 경로) 포함 여부
    #[serde(default = "default_true")]
    pub with_target: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// span 이벤트를 활성화합니다.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// `LOG_FORMAT` 환경 변수가 있으면 형식을 덮어씁니다.
    pub fn apply_env(mut self) -> Self {
        if let Some(format) = std::env::var("LOG_FORMAT").ok().and_then(|s| s.parse().ok()) {
            self.format = format;
        }
        self
    }

    /// 환경 변수에서 설정을 생성합니다.
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level());
        Self::new(level).apply_env()
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.format {
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_file)
                .with_target(self.with_target)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_file(self.with_file)
                .with_line_number(self.with_file)
                .with_target(self.with_target)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.with_file)
                .with_line_number(self.with_file)
                .with_target(self.with_target)
                .with_span_events(span_events)
                .boxed(),
        }
    }
}

/// 주어진 설정으로 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG`가 설정되어 있으면 설정 파일의 레벨보다 우선합니다.
///
/// # 예제
///
/// ```no_run
/// use scanner_core::logging::{init_logging, LogConfig, LogFormat};
///
/// let config = LogConfig::new("debug").with_format(LogFormat::Json);
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(config.layer())
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        "로깅 초기화 완료"
    );

    Ok(())
}

/// 환경 변수에서 로깅을 초기화합니다.
///
/// 레벨에는 `RUST_LOG`를, 형식에는 `LOG_FORMAT`을 사용합니다.
pub fn init_logging_from_env() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::from_env())
}

/// 스캔 사이클 컨텍스트 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! scan_span {
    ($name:expr, $cycle_id:expr) => {
        tracing::info_span!($name, cycle_id = %$cycle_id)
    };
    ($name:expr, $cycle_id:expr, $symbol:expr) => {
        tracing::info_span!($name, cycle_id = %$cycle_id, symbol = %$symbol)
    };
}
