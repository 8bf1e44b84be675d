pub mod cache;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod redis;
pub mod repository;

mod macros;

pub use cache::{Cache, CacheKey, CacheStore};
pub use postgres::create_pool;
pub use query::{ContentQuery, Predicate, SortKey};
pub use redis::create_redis_client;
pub use repository::{ContentRepository, PreferenceRepository};
