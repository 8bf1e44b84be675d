use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppResult;
use crate::models::feed::escape_key_segment;
use crate::models::FeedType;

/// TTL applied by [`Cache::set_default`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Scored candidates before boost injection; always offset 0
    Personalized {
        user_id: Option<i64>,
        fingerprint: String,
        limit: u32,
    },
    Recommended {
        user_id: Option<i64>,
        fingerprint: String,
        limit: u32,
        offset: u32,
    },
    Area {
        location: String,
        limit: u32,
        offset: u32,
    },
    Category {
        category: String,
        limit: u32,
        offset: u32,
    },
    Agent {
        agent_id: i64,
        limit: u32,
        offset: u32,
    },
    Developer {
        developer_id: i64,
        limit: u32,
        offset: u32,
    },
    Agency {
        agency_id: i64,
        limit: u32,
        offset: u32,
    },
}

impl CacheKey {
    /// Prefix shared by every page of one feed type, for bulk invalidation
    pub fn feed_prefix(feed_type: FeedType) -> String {
        format!("feed:{}:", feed_type)
    }
}

fn user_segment(user_id: &Option<i64>) -> String {
    match user_id {
        Some(id) => id.to_string(),
        None => "guest".to_string(),
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Personalized {
                user_id,
                fingerprint,
                limit,
            } => write!(
                f,
                "feed:personalized:{}:{}:{}:0",
                user_segment(user_id),
                fingerprint,
                limit
            ),
            CacheKey::Recommended {
                user_id,
                fingerprint,
                limit,
                offset,
            } => write!(
                f,
                "feed:recommended:{}:{}:{}:{}",
                user_segment(user_id),
                fingerprint,
                limit,
                offset
            ),
            CacheKey::Area {
                location,
                limit,
                offset,
            } => write!(
                f,
                "feed:area:{}:{}:{}",
                escape_key_segment(&location.trim().to_lowercase()),
                limit,
                offset
            ),
            CacheKey::Category {
                category,
                limit,
                offset,
            } => write!(
                f,
                "feed:category:{}:{}:{}",
                escape_key_segment(&category.trim().to_lowercase()),
                limit,
                offset
            ),
            CacheKey::Agent {
                agent_id,
                limit,
                offset,
            } => write!(f, "feed:agent:{}:{}:{}", agent_id, limit, offset),
            CacheKey::Developer {
                developer_id,
                limit,
                offset,
            } => write!(f, "feed:developer:{}:{}:{}", developer_id, limit, offset),
            CacheKey::Agency {
                agency_id,
                limit,
                offset,
            } => write!(f, "feed:agency:{}:{}:{}", agency_id, limit, offset),
        }
    }
}

/// Raw string storage behind [`Cache`].
///
/// Implementations may fail (a networked store can be unreachable); the
/// facade turns every failure into a miss or a no-op.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> AppResult<()>;

    async fn del(&self, key: &str) -> AppResult<()>;

    async fn clear(&self) -> AppResult<()>;

    /// Removes every key starting with `prefix`, returning how many went
    async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Typed, never-failing cache used by the feed pipeline.
///
/// Values are stored as JSON so every backend returns identical bytes for
/// identical inputs.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Absent, expired, undecodable and unreachable entries all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, backend = self.store.name(), "Cache read failed, treating as miss");
                return None;
            }
        };

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Cache deserialization error, treating as miss");
                    None
                }
            },
            None => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
        }
    }

    /// Stores a value with an absolute expiry of now + `ttl`
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let key = key.to_string();
        if let Err(e) = self.store.set(&key, json, ttl).await {
            tracing::warn!(error = %e, key = %key, backend = self.store.name(), "Cache write failed");
        }
    }

    pub async fn set_default<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.set(key, value, DEFAULT_TTL).await
    }

    pub async fn del(&self, key: &CacheKey) {
        let key = key.to_string();
        if let Err(e) = self.store.del(&key).await {
            tracing::warn!(error = %e, key = %key, "Cache delete failed");
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, backend = self.store.name(), "Cache clear failed");
        }
    }

    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        match self.store.invalidate_prefix(prefix).await {
            Ok(removed) => {
                tracing::info!(prefix = %prefix, removed, "Cache prefix invalidated");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, prefix = %prefix, "Cache prefix invalidation failed");
                0
            }
        }
    }
}
