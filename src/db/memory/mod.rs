pub mod cache;
pub mod content;
pub mod preferences;

pub use cache::{CacheSweeperHandle, MemoryCacheStore};
pub use content::InMemoryContentRepository;
pub use preferences::InMemoryPreferenceRepository;
