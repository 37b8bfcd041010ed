use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::services::dashboard::DashboardSummary;
use crate::services::events::{LedgerEvent, LedgerEventHandler};

/// Cached dashboard aggregate, owned by the composition root and shared by
/// the dashboard service and the invalidation handler.
///
/// Every invalidation bumps a generation counter. A summary computed from a
/// read that started before the latest invalidation is never stored.
#[derive(Clone)]
pub struct SummaryCache {
    ttl: Duration,
    state: Arc<RwLock<CacheState>>,
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    entry: Option<(DashboardSummary, Instant)>,
}

impl SummaryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::new(RwLock::new(CacheState::default())),
        }
    }

    pub async fn get(&self) -> Option<DashboardSummary> {
        let state = self.state.read().await;
        match state.entry.as_ref() {
            Some((summary, stored_at)) if stored_at.elapsed() < self.ttl => Some(summary.clone()),
            _ => None,
        }
    }

    /// Generation to hand back to `put_if_current` once the store read finishes.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    pub async fn put(&self, summary: DashboardSummary) {
        self.state.write().await.entry = Some((summary, Instant::now()));
    }

    /// Stores the summary only if nothing invalidated the cache since
    /// `generation` was taken. Returns whether it was stored.
    pub async fn put_if_current(&self, generation: u64, summary: DashboardSummary) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            return false;
        }
        state.entry = Some((summary, Instant::now()));
        true
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        state.entry = None;
    }
}

pub struct CacheInvalidationHandler {
    cache: SummaryCache,
}

impl CacheInvalidationHandler {
    pub fn new(cache: SummaryCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl LedgerEventHandler for CacheInvalidationHandler {
    fn name(&self) -> &'static str {
        "summary_cache_invalidation"
    }

    async fn handle(&self, event: &LedgerEvent) -> anyhow::Result<Vec<LedgerEvent>> {
        if event.invalidates_aggregates() {
            self.cache.invalidate().await;
            tracing::debug!(event = event.name(), "Dashboard summary cache invalidated");
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = SummaryCache::new(Duration::from_millis(0));
        cache.put(DashboardSummary::default()).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn invalidation_handler_clears_entry() {
        let cache = SummaryCache::new(Duration::from_secs(60));
        cache.put(DashboardSummary::default()).await;
        assert!(cache.get().await.is_some());

        let handler = CacheInvalidationHandler::new(cache.clone());
        handler
            .handle(&LedgerEvent::TransactionSubmitted {
                tenant_id: Uuid::new_v4(),
                external_ref: "TXN1".into(),
                obligation_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert!(cache.get().await.is_some());

        handler
            .handle(&LedgerEvent::TransactionRejected {
                tenant_id: Uuid::new_v4(),
                external_ref: "TXN1".into(),
            })
            .await
            .unwrap();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn stale_generation_is_not_stored() {
        let cache = SummaryCache::new(Duration::from_secs(60));
        let generation = cache.generation().await;
        cache.invalidate().await;

        assert!(!cache.put_if_current(generation, DashboardSummary::default()).await);
        assert!(cache.get().await.is_none());

        let generation = cache.generation().await;
        assert!(cache.put_if_current(generation, DashboardSummary::default()).await);
        assert!(cache.get().await.is_some());
    }
}
