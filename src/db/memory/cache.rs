use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::db::cache::CacheStore;
use crate::error::AppResult;

/// Serialized value plus its absolute expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local TTL store.
///
/// Expired entries are dropped when a lookup finds them and by the periodic
/// sweep started with [`MemoryCacheStore::start_sweeper`]. There is no size
/// cap: keys come from a bounded set of request shapes.
#[derive(Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<DashMap<String, CacheEntry>>,
}

/// Handle for stopping the background sweep
pub struct CacheSweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheSweeperHandle {
    /// Stops the sweep task and waits for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache sweeper task failed");
        }
        tracing::info!("Cache sweeper stopped");
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Spawns a task that sweeps expired entries once per `interval`
    pub fn start_sweeper(&self, interval: Duration) -> CacheSweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let store = self.clone();

        let task = tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Cache sweeper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = store.len(), "Swept expired cache entries");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        CacheSweeperHandle { shutdown_tx, task }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cache::{Cache, CacheKey};

    fn key(offset: u32) -> CacheKey {
        CacheKey::Area {
            location: "Sandton".to_string(),
            limit: 20,
            offset,
        }
    }

    #[tokio::test]
    async fn test_get_set_del_clear() {
        let store = MemoryCacheStore::new();
        let cache = Cache::new(Arc::new(store.clone()));

        cache.set_default(&key(0), &"first").await;
        cache.set_default(&key(20), &"second").await;

        let first: Option<String> = cache.get(&key(0)).await;
        assert_eq!(first.as_deref(), Some("first"));

        cache.del(&key(0)).await;
        let first: Option<String> = cache.get(&key(0)).await;
        assert_eq!(first, None);
        assert_eq!(store.len(), 1);

        cache.clear().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = Cache::new(Arc::new(MemoryCacheStore::new()));
        cache.set_default(&key(0), &1).await;
        cache.set_default(&key(0), &2).await;
        assert_eq!(cache.get::<i32>(&key(0)).await, Some(2));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryCacheStore::new();
        let cache = Cache::new(Arc::new(store.clone()));

        cache.set(&key(0), &"short lived", Duration::from_secs(1)).await;
        let value: Option<String> = cache.get(&key(0)).await;
        assert_eq!(value.as_deref(), Some("short lived"));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let value: Option<String> = cache.get(&key(0)).await;
        assert_eq!(value, None);
        // Evicted on access
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let store = MemoryCacheStore::new();
        let cache = Cache::new(Arc::new(store.clone()));

        cache.set_default(&key(0), &1).await;
        cache.set_default(&key(20), &2).await;
        cache
            .set_default(
                &CacheKey::Agent {
                    agent_id: 1,
                    limit: 20,
                    offset: 0,
                },
                &3,
            )
            .await;

        assert_eq!(cache.invalidate_prefix("feed:area:").await, 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_unread_entries() {
        let store = MemoryCacheStore::new();
        store
            .set("feed:area:x:20:0", "1".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        store
            .set("feed:area:y:20:0", "2".to_string(), Duration::from_secs(600))
            .await
            .unwrap();

        let handle = store.start_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(store.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_shutdown() {
        let store = MemoryCacheStore::new();
        let handle = store.start_sweeper(Duration::from_secs(60));
        handle.shutdown().await;

        store
            .set("feed:area:x:20:0", "1".to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        // No sweep ran, so the expired entry is still stored
        assert_eq!(store.len(), 1);
    }
}
