//! 외부 협력자 인터페이스.
//!
//! 시장 데이터, 레짐 감지기, 시그널 제공자는 파이프라인 밖에 있으며
//! 이 트레이트를 통해서만 접근합니다. 모든 응답은 타임스탬프를 가집니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanner_core::{Bar, BookSnapshot, RegimeSnapshot, SignalSnapshot, Symbol, Timeframe};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::ProviderError;

/// 시장 데이터 제공자.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 최근 `lookback`개 캔들 (시간순).
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// 호가창 스냅샷.
    async fn get_book_snapshot(&self, symbol: &Symbol) -> Result<BookSnapshot, ProviderError>;
}

/// 레짐 감지기.
#[async_trait]
pub trait RegimeDetector: Send + Sync {
    /// 현재 레짐.
    async fn current_regime(&self) -> Result<RegimeSnapshot, ProviderError>;
}

/// 시그널 제공자.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// 심볼별 시그널 스냅샷.
    async fn get_signals(&self, symbol: &Symbol) -> Result<SignalSnapshot, ProviderError>;
}

/// 파이프라인에 주입되는 협력자 묶음.
#[derive(Clone)]
pub struct Providers {
    /// 시장 데이터
    pub market: Arc<dyn MarketDataProvider>,
    /// 시그널
    pub signals: Arc<dyn SignalProvider>,
    /// 레짐
    pub regime: Arc<dyn RegimeDetector>,
}

impl Providers {
    /// 세 인터페이스를 모두 구현하는 단일 소스로 묶음을 만듭니다.
    pub fn from_source<T>(source: Arc<T>) -> Self
    where
        T: MarketDataProvider + SignalProvider + RegimeDetector + 'static,
    {
        Self {
            market: source.clone(),
            signals: source.clone(),
            regime: source,
        }
    }
}

/// 주기적으로만 재조회하는 레짐 감지기 래퍼.
///
/// 레짐은 주기(기본 4시간)마다 한 번 갱신되며, 그 사이에는 캐시된 값을 반환합니다.
/// 재조회가 실패하면 이전 값을 유지합니다.
pub struct CadencedRegimeDetector {
    inner: Arc<dyn RegimeDetector>,
    cadence: Duration,
    cached: Mutex<Option<(Instant, RegimeSnapshot)>>,
}

impl CadencedRegimeDetector {
    /// 새 래퍼를 생성합니다.
    pub fn new(inner: Arc<dyn RegimeDetector>, cadence: Duration) -> Self {
        Self {
            inner,
            cadence,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RegimeDetector for CadencedRegimeDetector {
    async fn current_regime(&self) -> Result<RegimeSnapshot, ProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some((fetched_at, snapshot)) = cached.as_ref() {
            if fetched_at.elapsed() < self.cadence {
                return Ok(snapshot.clone());
            }
        }

        match self.inner.current_regime().await {
            Ok(snapshot) => {
                tracing::info!(
                    label = %snapshot.label,
                    confidence = snapshot.confidence,
                    "레짐 갱신"
                );
                *cached = Some((Instant::now(), snapshot.clone()));
                Ok(snapshot)
            }
            Err(e) => match cached.as_ref() {
                Some((_, snapshot)) => {
                    tracing::warn!(error = %e, "레짐 재조회 실패, 이전 레짐 유지");
                    Ok(snapshot.clone())
                }
                None => Err(e),
            },
        }
    }
}
