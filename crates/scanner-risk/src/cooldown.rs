//! 가드 완화 쿨다운 저장소.
//!
//! 사이클 간에 유지되는 유일한 가변 상태입니다.
//! (심볼, 가드) 키마다 마지막 완화 시각을 기록하며, 키 단위로 접근이 직렬화됩니다.
//! 같은 키는 쿨다운 기간(기본 30분) 안에 한 번만 완화될 수 있습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scanner_core::Symbol;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

/// 완화 대상 가드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// 피로 가드
    Fatigue,
    /// 신선도 가드
    Freshness,
    /// 늦은 체결 가드
    LateFill,
}

impl GuardKind {
    /// 증거 이름 접두사.
    pub fn as_str(self) -> &'static str {
        match self {
            GuardKind::Fatigue => "fatigue",
            GuardKind::Freshness => "freshness",
            GuardKind::LateFill => "late_fill",
        }
    }

    /// 완화 세부 증거 이름.
    pub fn relaxation_evidence(self) -> String {
        format!("{}_relaxation", self.as_str())
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 쿨다운 저장소.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// 쿨다운이 지났으면 `now`를 기록하고 true를 반환합니다.
    ///
    /// 확인과 기록은 키 단위로 원자적입니다.
    async fn try_acquire(
        &self,
        symbol: &Symbol,
        guard: GuardKind,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool;

    /// 마지막 완화 시각.
    async fn last_relaxation(&self, symbol: &Symbol, guard: GuardKind) -> Option<DateTime<Utc>>;
}

type Slot = Arc<Mutex<Option<DateTime<Utc>>>>;

/// 메모리 기반 쿨다운 저장소.
#[derive(Debug, Default)]
pub struct InMemoryCooldownStore {
    slots: RwLock<HashMap<(Symbol, GuardKind), Slot>>,
}

impl InMemoryCooldownStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 키별 슬롯 획득 또는 생성.
    async fn get_or_create_slot(&self, symbol: &Symbol, guard: GuardKind) -> Slot {
        let key = (symbol.clone(), guard);
        let slots = self.slots.read().await;
        if let Some(slot) = slots.get(&key) {
            return slot.clone();
        }
        drop(slots);

        let mut slots = self.slots.write().await;
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldownStore {
    async fn try_acquire(
        &self,
        symbol: &Symbol,
        guard: GuardKind,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool {
        let slot = self.get_or_create_slot(symbol, guard).await;
        let mut last = slot.lock().await;

        let available = match *last {
            Some(at) => now - at >= cooldown,
            None => true,
        };
        if available {
            *last = Some(now);
            tracing::debug!(symbol = %symbol, guard = %guard, "가드 완화 승인");
        } else {
            tracing::debug!(symbol = %symbol, guard = %guard, "가드 완화 쿨다운 중");
        }
        available
    }

    async fn last_relaxation(&self, symbol: &Symbol, guard: GuardKind) -> Option<DateTime<Utc>> {
        let slots = self.slots.read().await;
        let slot = slots.get(&(symbol.clone(), guard))?.clone();
        drop(slots);
        let last = *slot.lock().await;
        last
    }
}
