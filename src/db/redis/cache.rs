use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Client;
use tokio::sync::mpsc;

use crate::db::cache::CacheStore;
use crate::error::{AppError, AppResult};

/// Namespace prepended to every key so `clear` never touches foreign data
const KEY_NAMESPACE: &str = "explore:";

/// Keys fetched per SCAN round trip
const SCAN_BATCH: usize = 200;

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed cache store for multi-node deployments.
///
/// Writes go through a background task so a slow or unreachable Redis never
/// delays a feed response. Reads, deletes and invalidations surface their
/// errors to the [`crate::db::Cache`] facade, which degrades them to misses.
#[derive(Clone)]
pub struct RedisCacheStore {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Sends a shutdown signal to the writer task, which flushes pending
    /// writes before exiting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

fn namespaced(key: &str) -> String {
    format!("{}{}", KEY_NAMESPACE, key)
}

/// Escapes glob metacharacters so a prefix matches literally in SCAN MATCH
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl RedisCacheStore {
    /// Creates the store and spawns its background writer
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let store = Self {
            redis_client,
            write_tx,
        };

        (store, CacheWriterHandle { shutdown_tx })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::warn!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    // Every sender clone must be dropped for recv to end, so
                    // drain what is already queued instead
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::warn!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> AppResult<Vec<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(namespaced(key)).await?;
        Ok(cached)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()> {
        let msg = CacheWriteMessage {
            key: namespaced(key),
            value,
            ttl: ttl.as_secs().max(1),
        };

        self.write_tx
            .send(msg)
            .map_err(|e| AppError::Internal(format!("Cache writer unavailable: {}", e)))
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(namespaced(key)).await?;
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.delete_matching(&format!("{}*", glob_escape(KEY_NAMESPACE)))
            .await
            .map(|_| ())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64> {
        self.delete_matching(&format!("{}*", glob_escape(&namespaced(prefix))))
            .await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cache::{Cache, CacheKey};
    use std::sync::Arc;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced("feed:area:x:20:0"), "explore:feed:area:x:20:0");
    }

    #[test]
    fn test_glob_escape() {
        assert_eq!(glob_escape("feed:area:"), "feed:area:");
        assert_eq!(glob_escape("feed:a*b?[c]"), "feed:a\\*b\\?\\[c\\]");
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_miss() {
        // Nothing listens on port 1
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (store, handle) = RedisCacheStore::new(client);
        let cache = Cache::new(Arc::new(store));

        let key = CacheKey::Agency {
            agency_id: 9,
            limit: 20,
            offset: 0,
        };
        cache.set_default(&key, &vec!["a".to_string()]).await;
        let value: Option<Vec<String>> = cache.get(&key).await;
        assert_eq!(value, None);
        assert_eq!(cache.invalidate_prefix("feed:").await, 0);

        handle.shutdown().await;
    }
}
