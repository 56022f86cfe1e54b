//! 시그널 스캐너 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scanner_analytics::RegimeClassifier;
use scanner_core::{init_logging, ScannerError, Symbol};
use scanner_risk::{CooldownStore, InMemoryCooldownStore};
use scanner_runner::{
    AuditWriter, CadencedRegimeDetector, CycleReport, Providers, ReloadableFeed, ScanPipeline,
    ScannerConfig,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "scanner-runner")]
#[command(about = "Regime-aware Signal Scanner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본 설정과 환경 변수 위에 병합)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error). 설정 파일 값보다 우선
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 설정 검증 후 종료
    ValidateConfig,

    /// 리플레이 피드로 스캔 사이클 1회 실행
    RunOnce {
        /// 리플레이 스냅샷 파일 (JSON)
        #[arg(long)]
        feed: PathBuf,

        /// 특정 심볼만 스캔 (쉼표로 구분, 예: "BTCUSDT,ETHUSDT")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 데몬 모드: 주기적으로 피드를 다시 읽고 스캔 사이클 실행
    Daemon {
        /// 리플레이 스냅샷 파일 (JSON)
        #[arg(long)]
        feed: PathBuf,

        /// 특정 심볼만 스캔 (쉼표로 구분)
        #[arg(long)]
        symbols: Option<String>,
    },
}

fn parse_symbols(symbols: Option<&str>) -> Option<Vec<Symbol>> {
    symbols.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect()
    })
}

fn build_pipeline(
    config: &ScannerConfig,
    feed: Arc<ReloadableFeed>,
    cooldown: Arc<dyn CooldownStore>,
) -> anyhow::Result<ScanPipeline> {
    let mut providers = Providers::from_source(feed);
    providers.regime = Arc::new(CadencedRegimeDetector::new(
        providers.regime.clone(),
        config.pipeline.regime_refresh(),
    ));
    Ok(ScanPipeline::new(config, providers, cooldown)?)
}

/// 종료 신호를 받으면 토큰을 취소하는 감시 태스크.
fn spawn_shutdown_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 진행 중인 사이클 취소 중...");
            cancel.cancel();
        }
    })
}

async fn execute_cycle(
    pipeline: &ScanPipeline,
    writer: &AuditWriter,
    feed: &ReloadableFeed,
    symbols: Option<&[Symbol]>,
    cancel: &CancellationToken,
) -> Result<CycleReport, ScannerError> {
    let snapshot = feed.current().await;
    let universe = match symbols {
        Some(symbols) => symbols.to_vec(),
        None => snapshot.universe(),
    };

    let report = pipeline.run_cycle(&universe, snapshot.as_of(), cancel).await?;
    report.stats.log_summary("스캔");
    writer.write_cycle(&report, cancel).await?;

    for entry in &report.top_n {
        tracing::info!(
            rank = entry.rank,
            symbol = %entry.symbol,
            final_score = entry.final_score,
            decision = %entry.decision,
            selected = entry.selected,
            "Top-N"
        );
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드
    let config =
        ScannerConfig::load(cli.config.as_deref()).context("설정을 로드할 수 없습니다")?;

    // 로깅 초기화
    let mut log_config = config.logging.clone().apply_env();
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(&log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    tracing::info!("Signal Scanner 시작");

    let cooldown: Arc<dyn CooldownStore> = Arc::new(InMemoryCooldownStore::new());
    let writer = AuditWriter::new(&config.pipeline.audit_dir, &config.pipeline.audit_prefix);

    match cli.command {
        Commands::ValidateConfig => {
            tracing::info!(
                version = config.version,
                workers = config.pipeline.worker_count,
                top_n = config.pipeline.top_n,
                "설정 검증 통과"
            );
        }
        Commands::RunOnce { feed, symbols } => {
            let symbols = parse_symbols(symbols.as_deref());
            let feed = Arc::new(ReloadableFeed::open(
                &feed,
                RegimeClassifier::new(config.regime.clone()),
            )?);
            let pipeline = build_pipeline(&config, feed.clone(), cooldown)?;

            let cancel = CancellationToken::new();
            let watcher = spawn_shutdown_watcher(cancel.clone());
            let result =
                execute_cycle(&pipeline, &writer, &feed, symbols.as_deref(), &cancel).await;
            watcher.abort();

            let report = result?;
            tracing::info!(
                cycle_id = %report.cycle_id,
                selected = report.stats.selected,
                "스캔 1회 실행 완료"
            );
        }
        Commands::Daemon { feed, symbols } => {
            let symbols = parse_symbols(symbols.as_deref());
            let feed = Arc::new(ReloadableFeed::open(
                &feed,
                RegimeClassifier::new(config.regime.clone()),
            )?);
            let pipeline = build_pipeline(&config, feed.clone(), cooldown)?;

            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}초) ===",
                config.pipeline.daemon_interval_secs
            );

            let cancel = CancellationToken::new();
            let watcher = spawn_shutdown_watcher(cancel.clone());
            let mut interval = tokio::time::interval(config.pipeline.daemon_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = feed.reload().await {
                            tracing::warn!("피드 재로드 실패, 이전 스냅샷 사용: {}", e);
                        }

                        match execute_cycle(&pipeline, &writer, &feed, symbols.as_deref(), &cancel)
                            .await
                        {
                            Ok(_) => {}
                            Err(ScannerError::Cancelled(reason)) => {
                                tracing::info!("사이클 취소됨: {}", reason);
                            }
                            Err(e) => {
                                tracing::error!("스캔 사이클 실패: {}", e);
                            }
                        }

                        tracing::info!(
                            "=== 사이클 종료, 다음 실행: {}초 후 ===",
                            config.pipeline.daemon_interval_secs
                        );
                    }
                }
            }
            watcher.abort();
        }
    }

    tracing::info!("Signal Scanner 종료");
    Ok(())
}
