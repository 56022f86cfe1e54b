//! 리플레이 피드.
//!
//! JSON 스냅샷 파일 하나로 세 협력자 인터페이스를 모두 구현합니다.
//! CLI가 거래소 클라이언트 없이 사이클을 재현할 때 사용합니다.
//!
//! 레짐은 스냅샷에 명시된 값을 우선 사용하고,
//! 없으면 `regime_inputs`를 다수결 분류기로 분류합니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanner_analytics::{RegimeClassifier, RegimeInputs};
use scanner_core::{Bar, BookSnapshot, RegimeSnapshot, SignalSnapshot, Symbol, Timeframe};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ProviderError;
use crate::providers::{MarketDataProvider, RegimeDetector, SignalProvider};

/// 심볼 하나의 리플레이 데이터.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySymbol {
    /// 타임프레임별 캔들 (시간순)
    #[serde(default)]
    pub bars: BTreeMap<Timeframe, Vec<Bar>>,
    /// 호가창
    #[serde(default)]
    pub book: Option<BookSnapshot>,
    /// 시그널
    #[serde(default)]
    pub signals: SignalSnapshot,
}

/// 리플레이 스냅샷 파일 형식.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    /// 스냅샷 기준 시각
    pub as_of: DateTime<Utc>,
    /// 명시적 레짐
    #[serde(default)]
    pub regime: Option<RegimeSnapshot>,
    /// 분류기 입력 (명시적 레짐이 없을 때)
    #[serde(default)]
    pub regime_inputs: Option<RegimeInputs>,
    /// 심볼별 데이터
    pub symbols: BTreeMap<Symbol, ReplaySymbol>,
}

/// 리플레이 피드.
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    snapshot: ReplaySnapshot,
    classifier: RegimeClassifier,
}

impl ReplayFeed {
    /// 스냅샷으로 피드를 생성합니다.
    pub fn new(snapshot: ReplaySnapshot, classifier: RegimeClassifier) -> Self {
        Self {
            snapshot,
            classifier,
        }
    }

    /// JSON 파일에서 피드를 로드합니다.
    ///
    /// # 에러
    /// 파일을 읽을 수 없으면 `Unavailable`, 형식이 잘못되었으면 `Malformed`
    pub fn from_path(
        path: impl AsRef<Path>,
        classifier: RegimeClassifier,
    ) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Unavailable(format!("{}: {e}", path.display())))?;
        let snapshot: ReplaySnapshot = serde_json::from_str(&content)
            .map_err(|e| ProviderError::Malformed(format!("{}: {e}", path.display())))?;

        tracing::info!(
            path = %path.display(),
            symbols = snapshot.symbols.len(),
            as_of = %snapshot.as_of,
            "리플레이 피드 로드"
        );
        Ok(Self::new(snapshot, classifier))
    }

    /// 스냅샷 기준 시각.
    pub fn as_of(&self) -> DateTime<Utc> {
        self.snapshot.as_of
    }

    /// 스냅샷에 포함된 전체 심볼 (정렬됨).
    pub fn universe(&self) -> Vec<Symbol> {
        self.snapshot.symbols.keys().cloned().collect()
    }

    fn symbol(&self, symbol: &Symbol) -> Result<&ReplaySymbol, ProviderError> {
        self.snapshot
            .symbols
            .get(symbol)
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))
    }
}

#[async_trait]
impl MarketDataProvider for ReplayFeed {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let series = self
            .symbol(symbol)?
            .bars
            .get(&timeframe)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let start = series.len().saturating_sub(lookback);
        Ok(series[start..].to_vec())
    }

    async fn get_book_snapshot(&self, symbol: &Symbol) -> Result<BookSnapshot, ProviderError> {
        self.symbol(symbol)?
            .book
            .clone()
            .ok_or_else(|| ProviderError::NotFound(format!("{symbol} 호가창")))
    }
}

#[async_trait]
impl SignalProvider for ReplayFeed {
    async fn get_signals(&self, symbol: &Symbol) -> Result<SignalSnapshot, ProviderError> {
        Ok(self.symbol(symbol)?.signals.clone())
    }
}

#[async_trait]
impl RegimeDetector for ReplayFeed {
    async fn current_regime(&self) -> Result<RegimeSnapshot, ProviderError> {
        if let Some(regime) = &self.snapshot.regime {
            return Ok(regime.clone());
        }
        match &self.snapshot.regime_inputs {
            Some(inputs) => Ok(self
                .classifier
                .classify(inputs)
                .into_snapshot(self.snapshot.as_of)),
            None => Err(ProviderError::NotFound("레짐 정보 없음".into())),
        }
    }
}

/// 파일을 다시 읽어 교체할 수 있는 리플레이 피드.
///
/// 데몬 모드에서 외부 프로세스가 스냅샷 파일을 갱신하면 다음 사이클부터 반영됩니다.
/// 재로드에 실패하면 이전 스냅샷을 계속 사용합니다.
pub struct ReloadableFeed {
    path: PathBuf,
    classifier: RegimeClassifier,
    current: RwLock<Arc<ReplayFeed>>,
}

impl ReloadableFeed {
    /// 파일을 처음 로드합니다.
    pub fn open(
        path: impl Into<PathBuf>,
        classifier: RegimeClassifier,
    ) -> Result<Self, ProviderError> {
        let path = path.into();
        let feed = ReplayFeed::from_path(&path, classifier.clone())?;
        Ok(Self {
            path,
            classifier,
            current: RwLock::new(Arc::new(feed)),
        })
    }

    /// 파일을 다시 읽습니다. 실패하면 현재 스냅샷은 그대로 남습니다.
    pub async fn reload(&self) -> Result<Arc<ReplayFeed>, ProviderError> {
        let feed = Arc::new(ReplayFeed::from_path(&self.path, self.classifier.clone())?);
        *self.current.write().await = feed.clone();
        Ok(feed)
    }

    /// 현재 스냅샷.
    pub async fn current(&self) -> Arc<ReplayFeed> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl MarketDataProvider for ReloadableFeed {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.current().await.get_bars(symbol, timeframe, lookback).await
    }

    async fn get_book_snapshot(&self, symbol: &Symbol) -> Result<BookSnapshot, ProviderError> {
        self.current().await.get_book_snapshot(symbol).await
    }
}

#[async_trait]
impl SignalProvider for ReloadableFeed {
    async fn get_signals(&self, symbol: &Symbol) -> Result<SignalSnapshot, ProviderError> {
        self.current().await.get_signals(symbol).await
    }
}

#[async_trait]
impl RegimeDetector for ReloadableFeed {
    async fn current_regime(&self) -> Result<RegimeSnapshot, ProviderError> {
        self.current().await.current_regime().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> ReplaySnapshot {
        let as_of = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let bars = (0..5)
            .map(|i| {
                let open_time = as_of - chrono::Duration::hours(5 - i);
                Bar {
                    timeframe: Timeframe::H1,
                    open_time,
                    close_time: open_time + chrono::Duration::hours(1),
                    open: 100.0 + i as f64,
                    high: 101.0 + i as f64,
                    low: 99.0 + i as f64,
                    close: 100.5 + i as f64,
                    volume: 10.0,
                }
            })
            .collect();

        let mut symbols = BTreeMap::new();
        symbols.insert(
            Symbol::new("BTCUSDT"),
            ReplaySymbol {
                bars: BTreeMap::from([(Timeframe::H1, bars)]),
                book: None,
                signals: SignalSnapshot::default(),
            },
        );
        ReplaySnapshot {
            as_of,
            regime: None,
            regime_inputs: Some(RegimeInputs {
                realized_vol: 0.5,
                price_vs_ma20_pct: 1.0,
                breadth: [0.2, 0.1, 0.2],
            }),
            symbols,
        }
    }

    #[tokio::test]
    async fn test_bars_respect_lookback() {
        let feed = ReplayFeed::new(snapshot(), RegimeClassifier::default());
        let symbol = Symbol::new("BTCUSDT");

        let bars = feed.get_bars(&symbol, Timeframe::H1, 3).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2].close, 104.5);

        let missing = feed.get_bars(&symbol, Timeframe::D1, 3).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol_and_missing_book() {
        let feed = ReplayFeed::new(snapshot(), RegimeClassifier::default());
        let unknown = feed.get_signals(&Symbol::new("XRPUSDT")).await;
        assert!(matches!(unknown, Err(ProviderError::NotFound(_))));

        let book = feed.get_book_snapshot(&Symbol::new("BTCUSDT")).await;
        assert!(matches!(book, Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_regime_classified_from_inputs() {
        let feed = ReplayFeed::new(snapshot(), RegimeClassifier::default());
        let regime = feed.current_regime().await.unwrap();
        assert_eq!(regime.label, "high_vol");
        assert_eq!(regime.detected_at, feed.as_of());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert!(json["symbols"]["BTCUSDT"]["bars"]["1h"].is_array());

        let parsed: ReplaySnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.symbols.len(), 1);
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = ReplayFeed::from_path(&path, RegimeClassifier::default());
        assert!(matches!(result, Err(ProviderError::Malformed(_))));

        let missing = dir.path().join("missing.json");
        let result = ReplayFeed::from_path(missing, RegimeClassifier::default());
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_reload_keeps_previous_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, serde_json::to_string(&snapshot()).unwrap()).unwrap();

        let feed = ReloadableFeed::open(&path, RegimeClassifier::default()).unwrap();
        assert_eq!(feed.current().await.universe().len(), 1);

        let mut next = snapshot();
        next.symbols.insert(Symbol::new("ETHUSDT"), ReplaySymbol::default());
        std::fs::write(&path, serde_json::to_string(&next).unwrap()).unwrap();
        feed.reload().await.unwrap();
        assert_eq!(feed.current().await.universe().len(), 2);

        std::fs::write(&path, "garbage").unwrap();
        assert!(feed.reload().await.is_err());
        assert_eq!(feed.current().await.universe().len(), 2);
    }
}
