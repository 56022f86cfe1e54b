//! 스캔 사이클 파이프라인.
//!
//! 한 사이클은 다음 단계로 진행됩니다:
//! 1. 레짐 조회 및 가중치 해석
//! 2. 심볼별 데이터 조회와 팩터/모멘텀 추출 (작업자 풀로 병렬 처리)
//! 3. 횡단면 직교화 (단일 배리어)
//! 4. 심볼별 점수 계산과 게이트 평가 (병렬)
//! 5. 순위 및 Top-N 선택
//!
//! 업스트림 실패나 시간 초과가 발생한 심볼은 사유와 함께 제외되며 사이클을 멈추지 않습니다.
//! 취소는 단계 사이와 각 병렬 단계 도중에 확인하며, 취소된 사이클은 결과를 남기지 않습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use scanner_analytics::{
    CompositeScorer, Extraction, FactorExtractor, FactorPanel, MomentumCalculator,
    OrthogonalityDiagnostics, Orthogonalizer, RegimeWeights, SymbolData, WeightResolver,
};
use scanner_core::{
    BookSnapshot, Candidate, Decision, FactorSet, OrthogonalFactorSet, QualityFlag, RegimeLabel,
    RegimeSnapshot, RejectionKind, ScannerError, SignalSnapshot, Symbol, Timeframe, TopNEntry,
};
use scanner_risk::{CooldownStore, GateEvaluator, GateInputs};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{PipelineConfig, ScannerConfig};
use crate::error::{ConfigError, ProviderError, Result};
use crate::providers::Providers;
use crate::ranker;
use crate::stats::{percentile, CycleStats};

/// 사이클에서 제외된 심볼.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedSymbol {
    /// 심볼
    pub symbol: Symbol,
    /// 제외 사유
    pub reason: String,
}

/// 사이클 결과.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// 사이클 ID
    pub cycle_id: String,
    /// 평가 시각
    pub as_of: DateTime<Utc>,
    /// 감지된 레짐
    pub regime: RegimeSnapshot,
    /// 적용된 레짐 프로필
    pub profile: RegimeLabel,
    /// 순위순 후보 (거절 포함)
    pub candidates: Vec<Candidate>,
    /// Top-N 요약
    pub top_n: Vec<TopNEntry>,
    /// 제외된 심볼
    pub excluded: Vec<ExcludedSymbol>,
    /// 직교화 진단 (패널이 비어 있으면 `None`)
    pub diagnostics: Option<OrthogonalityDiagnostics>,
    /// 사이클 통계
    pub stats: CycleStats,
}

impl CycleReport {
    /// 선택된 후보.
    pub fn selected(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.selected)
    }
}

/// 심볼 하나의 조회/추출 결과.
struct FetchOutcome {
    symbol: Symbol,
    latencies_ms: Vec<f64>,
    result: std::result::Result<(Extraction, Option<BookSnapshot>), String>,
}

/// 점수/게이트 단계에 공유되는 사이클 정보.
struct CycleContext {
    cycle_id: String,
    as_of: DateTime<Utc>,
    regime: RegimeSnapshot,
    profile: RegimeLabel,
    weights: RegimeWeights,
    infra_p99_ms: Option<f64>,
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn cancelled(phase: &str) -> ScannerError {
    ScannerError::Cancelled(format!("{phase} 단계에서 취소됨"))
}

/// 스캔 파이프라인.
pub struct ScanPipeline {
    config: PipelineConfig,
    providers: Providers,
    extractor: FactorExtractor,
    resolver: WeightResolver,
    orthogonalizer: Orthogonalizer,
    scorer: CompositeScorer,
    gates: GateEvaluator,
}

impl ScanPipeline {
    /// 검증된 설정으로 파이프라인을 구성합니다.
    ///
    /// # 에러
    /// 설정 불변식이 위반되면 `ConfigError`
    pub fn new(
        config: &ScannerConfig,
        providers: Providers,
        cooldown: Arc<dyn CooldownStore>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let momentum = MomentumCalculator::new(config.momentum.clone());
        Ok(Self {
            config: config.pipeline.clone(),
            providers,
            extractor: FactorExtractor::new(momentum, config.gates.funding_z_threshold),
            resolver: WeightResolver::new(config.weights.clone())?,
            orthogonalizer: Orthogonalizer::new(),
            scorer: CompositeScorer::new(config.scoring.clone())?,
            gates: GateEvaluator::new(config.thresholds(), cooldown)?,
        })
    }

    /// 파이프라인 설정.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 사이클 하나를 실행합니다.
    ///
    /// # 인자
    /// * `universe` - 스캔할 심볼 (중복은 제거됨)
    /// * `as_of` - 평가 기준 시각
    /// * `cancel` - 사이클 취소 토큰
    ///
    /// # 에러
    /// 취소되면 `ScannerError::Cancelled`. 심볼 단위 실패는 에러가 아니라 제외로 보고됩니다.
    pub async fn run_cycle(
        &self,
        universe: &[Symbol],
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4().to_string();
        let span = scanner_core::scan_span!("scan_cycle", &cycle_id);
        self.run_cycle_inner(cycle_id, universe, as_of, cancel)
            .instrument(span)
            .await
    }

    async fn run_cycle_inner(
        &self,
        cycle_id: String,
        universe: &[Symbol],
        as_of: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let started = Instant::now();
        let mut universe = universe.to_vec();
        universe.sort();
        universe.dedup();
        tracing::info!(symbols = universe.len(), as_of = %as_of, "스캔 사이클 시작");

        if cancel.is_cancelled() {
            return Err(cancelled("시작"));
        }

        // 1. 레짐
        let regime = self.current_regime(as_of).await;
        let resolved = self.resolver.resolve(&regime.label);
        tracing::info!(
            label = %regime.label,
            profile = %resolved.profile,
            fallback = resolved.fallback,
            "레짐 프로필 적용"
        );

        // 2. 추출 (병렬)
        let profile = resolved.profile;
        let fetches = stream::iter(universe.iter().cloned())
            .map(move |symbol| self.fetch_symbol(symbol, profile, as_of))
            .buffer_unordered(self.config.worker_count)
            .collect::<Vec<_>>();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("추출")),
            outcomes = fetches => outcomes,
        };

        let mut extracted = Vec::with_capacity(fetched.len());
        let mut excluded = Vec::new();
        let mut latencies = Vec::new();
        for outcome in fetched {
            latencies.extend(outcome.latencies_ms);
            match outcome.result {
                Ok(row) => extracted.push(row),
                Err(reason) => excluded.push(ExcludedSymbol {
                    symbol: outcome.symbol,
                    reason,
                }),
            }
        }
        // 완료 순서와 무관하도록 배리어 전에 정렬
        extracted.sort_by(|a, b| a.0.factors.symbol.cmp(&b.0.factors.symbol));
        let infra_p99_ms = percentile(&latencies, 99.0);

        if cancel.is_cancelled() {
            return Err(cancelled("직교화"));
        }

        // 3. 직교화 배리어
        let (extractions, books): (Vec<Extraction>, Vec<Option<BookSnapshot>>) =
            extracted.into_iter().unzip();
        let sets: Vec<FactorSet> = extractions.iter().map(|e| e.factors.clone()).collect();
        let (rows, diagnostics) = if sets.is_empty() {
            (Vec::new(), None)
        } else {
            let momentum: Vec<f64> = sets
                .iter()
                .map(|s| {
                    if s.momentum.flags.contains(&QualityFlag::InvalidForScoring) {
                        f64::NAN
                    } else {
                        s.momentum.value
                    }
                })
                .collect();
            let result = self
                .orthogonalizer
                .orthogonalize(&momentum, &FactorPanel::from_sets(&sets));
            tracing::debug!(
                rows = result.rows.len(),
                momentum_preserved = result.diagnostics.momentum_preserved,
                max_abs_correlation = result.diagnostics.max_abs_correlation,
                "직교화 완료"
            );
            (result.rows, Some(result.diagnostics))
        };

        // 4. 점수 + 게이트 (병렬)
        let context = CycleContext {
            cycle_id,
            as_of,
            regime,
            profile,
            weights: resolved.weights,
            infra_p99_ms,
        };
        let shared = &context;
        let scoring = stream::iter(extractions.into_iter().zip(books).zip(rows))
            .map(move |((extraction, book), orthogonal)| {
                self.score_symbol(shared, extraction, book, orthogonal)
            })
            .buffer_unordered(self.config.worker_count)
            .collect::<Vec<_>>();
        let scored = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("점수/게이트")),
            results = scoring => results,
        };

        let mut candidates = Vec::with_capacity(scored.len());
        for result in scored {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(exclusion) => excluded.push(exclusion),
            }
        }
        excluded.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        if cancel.is_cancelled() {
            return Err(cancelled("순위"));
        }

        // 5. 순위
        let (candidates, top_n) = ranker::rank(candidates, self.config.top_n);

        let mut stats = CycleStats::new(universe.len());
        stats.scored = candidates.len();
        stats.excluded = excluded.len();
        stats.upstream_p99_ms = infra_p99_ms;
        for candidate in &candidates {
            if candidate.is_degraded() {
                stats.degraded += 1;
            }
            match (candidate.decision, candidate.rejection) {
                (Decision::Pass, _) => stats.passed += 1,
                (Decision::Reject, Some(RejectionKind::DataFault)) => {
                    stats.rejected_data_fault += 1
                }
                (Decision::Reject, _) => stats.rejected_merits += 1,
            }
            if candidate.selected {
                stats.selected += 1;
            }
        }
        stats.elapsed = started.elapsed();

        Ok(CycleReport {
            cycle_id: context.cycle_id,
            as_of,
            regime: context.regime,
            profile,
            candidates,
            top_n,
            excluded,
            diagnostics,
            stats,
        })
    }

    /// 레짐 조회. 실패하면 neutral 프로필로 진행합니다.
    async fn current_regime(&self, as_of: DateTime<Utc>) -> RegimeSnapshot {
        let fallback = || RegimeSnapshot::new(RegimeLabel::Neutral.as_str(), 0.0, as_of);
        match timeout(
            self.config.per_symbol_timeout(),
            self.providers.regime.current_regime(),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "레짐 조회 실패, neutral 프로필 사용");
                fallback()
            }
            Err(_) => {
                tracing::warn!("레짐 조회 시간 초과, neutral 프로필 사용");
                fallback()
            }
        }
    }

    /// 심볼 하나를 조회하고 추출합니다 (시간 제한 적용).
    async fn fetch_symbol(
        &self,
        symbol: Symbol,
        profile: RegimeLabel,
        as_of: DateTime<Utc>,
    ) -> FetchOutcome {
        let limit = self.config.per_symbol_timeout();
        let mut latencies_ms = Vec::new();

        let collected = timeout(limit, self.collect(&symbol, &mut latencies_ms)).await;
        let result = match collected {
            Ok(Ok(data)) => self
                .extractor
                .extract(&data, profile, as_of)
                .map(|extraction| (extraction, data.book))
                .map_err(|e| e.to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(ProviderError::Timeout(format!(
                "{symbol}: {}ms 초과",
                limit.as_millis()
            ))
            .to_string()),
        };

        if let Err(reason) = &result {
            tracing::warn!(symbol = %symbol, reason = %reason, "심볼 제외");
        }
        FetchOutcome {
            symbol,
            latencies_ms,
            result,
        }
    }

    /// 협력자에게서 심볼 데이터를 수집합니다.
    ///
    /// 1h 캔들 조회 실패는 심볼 제외 사유입니다.
    /// 다른 타임프레임의 `NotFound`는 부분 커버리지로, 호가창/시그널 실패는 품질 저하로 처리합니다.
    async fn collect(
        &self,
        symbol: &Symbol,
        latencies_ms: &mut Vec<f64>,
    ) -> std::result::Result<SymbolData, ProviderError> {
        let mut bars = BTreeMap::new();
        for timeframe in Timeframe::ALL {
            let started = Instant::now();
            let series = self
                .providers
                .market
                .get_bars(symbol, timeframe, self.config.lookback_bars)
                .await;
            latencies_ms.push(elapsed_ms(started));

            match series {
                Ok(series) if !series.is_empty() => {
                    bars.insert(timeframe, series);
                }
                Ok(_) => {}
                Err(ProviderError::NotFound(_)) if timeframe != Timeframe::H1 => {
                    tracing::debug!(symbol = %symbol, timeframe = %timeframe, "캔들 없음");
                }
                Err(e) => return Err(e),
            }
        }

        let started = Instant::now();
        let book = match self.providers.market.get_book_snapshot(symbol).await {
            Ok(book) => Some(book),
            Err(e) => {
                tracing::debug!(symbol = %symbol, error = %e, "호가창 조회 실패");
                None
            }
        };
        latencies_ms.push(elapsed_ms(started));

        let started = Instant::now();
        let signals = match self.providers.signals.get_signals(symbol).await {
            Ok(signals) => signals,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "시그널 조회 실패, 중립값 사용");
                SignalSnapshot::default()
            }
        };
        latencies_ms.push(elapsed_ms(started));

        Ok(SymbolData {
            symbol: symbol.clone(),
            bars,
            book,
            signals,
        })
    }

    /// 심볼 하나의 점수와 게이트를 평가합니다.
    async fn score_symbol(
        &self,
        context: &CycleContext,
        extraction: Extraction,
        book: Option<BookSnapshot>,
        orthogonal: OrthogonalFactorSet,
    ) -> std::result::Result<Candidate, ExcludedSymbol> {
        let Extraction {
            factors,
            market,
            measurements,
        } = extraction;
        let (score, breakdown) = self.scorer.score(
            context.profile,
            &context.weights,
            &factors,
            &orthogonal,
            &measurements,
        );

        let inputs = GateInputs {
            regime: context.profile,
            factors: &factors,
            orthogonal: &orthogonal,
            score: &score,
            market: &market,
            book: book.as_ref(),
            infra_p99_ms: context.infra_p99_ms,
            as_of: context.as_of,
        };
        let evaluated = timeout(self.config.per_symbol_timeout(), self.gates.evaluate(inputs)).await;
        let Ok(outcome) = evaluated else {
            tracing::warn!(symbol = %factors.symbol, "게이트 평가 시간 초과, 심볼 제외");
            return Err(ExcludedSymbol {
                symbol: factors.symbol.clone(),
                reason: "게이트 평가 시간 초과".to_string(),
            });
        };

        tracing::debug!(
            symbol = %factors.symbol,
            internal = score.internal_0_100,
            final_score = score.final_with_social,
            decision = %outcome.decision,
            "후보 평가 완료"
        );

        Ok(Candidate {
            cycle_id: context.cycle_id.clone(),
            symbol: factors.symbol.clone(),
            timestamp: context.as_of,
            regime: context.regime.clone(),
            regime_profile: context.profile,
            factors,
            orthogonal,
            score,
            breakdown,
            evidence: outcome.evidence,
            decision: outcome.decision,
            rejection: outcome.rejection,
            rank: 0,
            selected: false,
        })
    }
}
