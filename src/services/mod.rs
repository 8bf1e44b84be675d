pub mod boost;
pub mod feed;
pub mod profile;
pub mod scoring;

pub use boost::{BoostInjector, NoBoostInjector};
pub use feed::{FeedScope, FeedService, FeedSettings};
pub use profile::ProfileProvider;
pub use scoring::{score_item, ScoreBreakdown, ScoringWeights};
