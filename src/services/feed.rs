//! Feed assembly and feed-type routing.
//!
//! `recommended` runs the personalized pipeline
//! (fetch → exclude → score → sort → paginate → cache). Every other feed
//! type is a direct, deterministically ordered repository page.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};

use crate::cached;
use crate::config::Config;
use crate::db::query::{CANDIDATE_ORDER, SCOPED_FEED_ORDER};
use crate::db::{Cache, CacheKey, ContentQuery, ContentRepository, Predicate};
use crate::error::{AppError, AppResult};
use crate::models::{
    ContentItem, CreatorType, EngagementKind, FeedOptions, FeedRequestContext, FeedResult,
    FeedType, UserProfile,
};
use crate::services::boost::BoostInjector;
use crate::services::profile::ProfileProvider;
use crate::services::scoring::{score_item, ScoringWeights};

/// Content type served by the Explore shorts feed
pub const SHORTS_CONTENT_TYPE: &str = "video";

const FEED_KEY_PREFIX: &str = "feed:";

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub cache_ttl: Duration,
    pub max_page_size: u32,
    pub default_page_size: u32,
    pub over_fetch_multiplier: u32,
    pub content_type: String,
    pub weights: ScoringWeights,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            max_page_size: 50,
            default_page_size: 20,
            over_fetch_multiplier: 3,
            content_type: SHORTS_CONTENT_TYPE.to_string(),
            weights: ScoringWeights::default(),
        }
    }
}

impl From<&Config> for FeedSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.feed_cache_ttl_secs),
            max_page_size: config.max_page_size.max(1),
            default_page_size: config.default_page_size.max(1),
            over_fetch_multiplier: config.over_fetch_multiplier.max(1),
            ..Self::default()
        }
    }
}

/// A validated, non-personalized feed request
#[derive(Debug, Clone, PartialEq)]
pub enum FeedScope {
    Area(String),
    Category(String),
    Agent(i64),
    Developer(i64),
    Agency(i64),
}

fn required_text(value: &Option<String>, message: &str) -> AppResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

fn required_id(value: Option<i64>, message: &str) -> AppResult<i64> {
    value.ok_or_else(|| AppError::Validation(message.to_string()))
}

impl FeedScope {
    /// Checks the parameters a feed type needs. `Ok(None)` means the
    /// personalized `recommended` feed, which needs none.
    /// Text parameters are trimmed and lowercased.
    pub fn from_options(feed_type: FeedType, options: &FeedOptions) -> AppResult<Option<Self>> {
        let scope = match feed_type {
            FeedType::Recommended => return Ok(None),
            FeedType::Area => FeedScope::Area(
                required_text(&options.location, "Location required for area feed")?
                    .to_lowercase(),
            ),
            FeedType::Category => FeedScope::Category(
                required_text(&options.category, "Category required for category feed")?
                    .to_lowercase(),
            ),
            FeedType::Agent => FeedScope::Agent(required_id(
                options.agent_id,
                "Agent ID required for agent feed",
            )?),
            FeedType::Developer => FeedScope::Developer(required_id(
                options.developer_id,
                "Developer ID required for developer feed",
            )?),
            FeedType::Agency => FeedScope::Agency(required_id(
                options.agency_id,
                "Agency ID required for agency feed",
            )?),
        };
        Ok(Some(scope))
    }

    pub fn feed_type(&self) -> FeedType {
        match self {
            FeedScope::Area(_) => FeedType::Area,
            FeedScope::Category(_) => FeedType::Category,
            FeedScope::Agent(_) => FeedType::Agent,
            FeedScope::Developer(_) => FeedType::Developer,
            FeedScope::Agency(_) => FeedType::Agency,
        }
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        match self {
            FeedScope::Area(location) => vec![Predicate::LocationMatches(location.clone())],
            FeedScope::Category(category) => vec![Predicate::CategoryContains(category.clone())],
            FeedScope::Agent(id) => vec![
                Predicate::CreatorTypeIs(CreatorType::Agent),
                Predicate::CreatorIdIs(*id),
            ],
            FeedScope::Developer(id) => vec![
                Predicate::CreatorTypeIs(CreatorType::Developer),
                Predicate::CreatorIdIs(*id),
            ],
            FeedScope::Agency(id) => vec![Predicate::AgencyIs(*id)],
        }
    }

    pub fn cache_key(&self, limit: u32, offset: u32) -> CacheKey {
        match self {
            FeedScope::Area(location) => CacheKey::Area {
                location: location.clone(),
                limit,
                offset,
            },
            FeedScope::Category(category) => CacheKey::Category {
                category: category.clone(),
                limit,
                offset,
            },
            FeedScope::Agent(agent_id) => CacheKey::Agent {
                agent_id: *agent_id,
                limit,
                offset,
            },
            FeedScope::Developer(developer_id) => CacheKey::Developer {
                developer_id: *developer_id,
                limit,
                offset,
            },
            FeedScope::Agency(agency_id) => CacheKey::Agency {
                agency_id: *agency_id,
                limit,
                offset,
            },
        }
    }

    /// The requested scope, echoed back to clients
    pub fn metadata(&self) -> BTreeMap<String, Value> {
        let (name, value) = match self {
            FeedScope::Area(location) => ("location", json!(location)),
            FeedScope::Category(category) => ("category", json!(category)),
            FeedScope::Agent(id) => ("agentId", json!(id)),
            FeedScope::Developer(id) => ("developerId", json!(id)),
            FeedScope::Agency(id) => ("agencyId", json!(id)),
        };
        BTreeMap::from([(name.to_string(), value)])
    }
}

/// Assembles, ranks and caches Explore feeds
#[derive(Clone)]
pub struct FeedService {
    content: Arc<dyn ContentRepository>,
    profiles: ProfileProvider,
    boost: Arc<dyn BoostInjector>,
    cache: Cache,
    settings: Arc<FeedSettings>,
}

impl FeedService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        profiles: ProfileProvider,
        boost: Arc<dyn BoostInjector>,
        cache: Cache,
        settings: FeedSettings,
    ) -> Self {
        Self {
            content,
            profiles,
            boost,
            cache,
            settings: Arc::new(settings),
        }
    }

    pub fn profiles(&self) -> &ProfileProvider {
        &self.profiles
    }

    /// Clamps a requested page size to `[1, max_page_size]`
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size.max(1))
    }

    /// Routes a feed request to its assembler.
    ///
    /// Required parameters are validated before any repository or cache access.
    pub async fn get_feed(&self, feed_type: FeedType, options: FeedOptions) -> AppResult<FeedResult> {
        let limit = self.page_size(options.limit);

        match FeedScope::from_options(feed_type, &options)? {
            Some(scope) => self.scoped_feed(scope, limit, options.offset).await,
            None => self.recommended_feed(&options, limit).await,
        }
    }

    async fn scoped_feed(&self, scope: FeedScope, limit: u32, offset: u32) -> AppResult<FeedResult> {
        let key = scope.cache_key(limit, offset);

        cached!(self.cache, key, self.settings.cache_ttl, async {
            let started = Instant::now();
            let query = scope
                .predicates()
                .into_iter()
                .fold(
                    ContentQuery::active()
                        .with(Predicate::ContentTypeIs(self.settings.content_type.clone())),
                    ContentQuery::with,
                )
                .order_by(&SCOPED_FEED_ORDER)
                .page(limit, offset);

            let items = self.content.find(query).await?;
            // Scoped pages are shared by all viewers, so boosts cannot be per user
            let shorts = self.boost.inject(items, &UserProfile::default()).await?;

            tracing::info!(
                feed_type = %scope.feed_type(),
                returned = shorts.len(),
                limit,
                offset,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scoped feed assembled"
            );

            Ok::<_, AppError>(FeedResult::page(
                scope.feed_type(),
                shorts,
                limit,
                offset,
                Some(scope.metadata()),
            ))
        })
    }

    async fn recommended_feed(&self, options: &FeedOptions, limit: u32) -> AppResult<FeedResult> {
        let context = FeedRequestContext::from_options(options, limit);
        let key = CacheKey::Recommended {
            user_id: context.user_id,
            fingerprint: context.fingerprint(),
            limit,
            offset: context.offset,
        };

        cached!(self.cache, key, self.settings.cache_ttl, async {
            let profile = self.resolve_profile(context.user_id).await?;
            let items = self
                .assemble_personalized(&context, profile.as_ref(), limit)
                .await?;

            let boost_profile = profile.unwrap_or_default();
            let shorts = self.boost.inject(items, &boost_profile).await?;

            let mut metadata = BTreeMap::from([(
                "personalized".to_string(),
                json!(context.user_id.is_some()),
            )]);
            if let Some(user_id) = context.user_id {
                metadata.insert("userId".to_string(), json!(user_id));
            }

            Ok::<_, AppError>(FeedResult::page(
                FeedType::Recommended,
                shorts,
                limit,
                context.offset,
                Some(metadata),
            ))
        })
    }

    /// Ranked page for a viewer, before boost injection.
    ///
    /// Guests (no user id) are ranked on engagement and recency only.
    pub async fn get_personalized_feed(
        &self,
        context: &FeedRequestContext,
        limit: u32,
    ) -> AppResult<Vec<ContentItem>> {
        let limit = self.page_size(Some(limit));
        let profile = self.resolve_profile(context.user_id).await?;
        self.assemble_personalized(context, profile.as_ref(), limit)
            .await
    }

    async fn resolve_profile(&self, user_id: Option<i64>) -> AppResult<Option<UserProfile>> {
        match user_id {
            Some(id) => Ok(Some(self.profiles.get_user_profile(id).await?)),
            None => Ok(None),
        }
    }

    fn candidate_query(&self, context: &FeedRequestContext, limit: u32) -> ContentQuery {
        let mut query = ContentQuery::active()
            .with(Predicate::ContentTypeIs(self.settings.content_type.clone()));

        if !context.session_history.is_empty() {
            query = query.with(Predicate::ExcludeIds(
                context.session_history.iter().copied().collect(),
            ));
        }

        let filters = &context.filters;
        if !filters.property_types.is_empty() {
            query = query.with(Predicate::PropertyTypeIn(
                filters.property_types.iter().cloned().collect(),
            ));
        }
        if let Some(range) = filters.price_range {
            query = query.with(Predicate::PriceOverlaps(range));
        }
        if !filters.lifestyle_categories.is_empty() {
            query = query.with(Predicate::CategoryAny(
                filters.lifestyle_categories.iter().cloned().collect(),
            ));
        }
        if !filters.locations.is_empty() {
            query = query.with(Predicate::LocationMatchesAny(
                filters.locations.iter().cloned().collect(),
            ));
        }

        let fetch = limit.saturating_mul(self.settings.over_fetch_multiplier);
        query.order_by(&CANDIDATE_ORDER).page(fetch, 0)
    }

    async fn assemble_personalized(
        &self,
        context: &FeedRequestContext,
        profile: Option<&UserProfile>,
        limit: u32,
    ) -> AppResult<Vec<ContentItem>> {
        let key = CacheKey::Personalized {
            user_id: context.user_id,
            fingerprint: context.fingerprint(),
            limit,
        };

        cached!(self.cache, key, self.settings.cache_ttl, async {
            let started = Instant::now();

            // Fetch
            let candidates = self.content.find(self.candidate_query(context, limit)).await?;
            let fetched = candidates.len();

            // Exclude and score
            let now = Utc::now();
            let mut scored: Vec<(ContentItem, f64)> = candidates
                .into_iter()
                .filter(|item| !context.session_history.contains(&item.id))
                .map(|item| {
                    let score =
                        score_item(&item, profile, context, now, &self.settings.weights).total();
                    (item, score)
                })
                .collect();

            // Stable, so equal scores keep repository order
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));

            let page: Vec<ContentItem> = scored
                .into_iter()
                .take(limit as usize)
                .map(|(item, _)| item)
                .collect();

            tracing::info!(
                user_id = ?context.user_id,
                fetched,
                returned = page.len(),
                limit,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Personalized feed assembled"
            );

            Ok::<_, AppError>(page)
        })
    }

    /// Applies an engagement event to a content item's counters
    pub async fn record_engagement(&self, content_id: i64, kind: EngagementKind) -> AppResult<()> {
        if !self.content.record_engagement(content_id, kind).await? {
            return Err(AppError::NotFound(format!("Content {} not found", content_id)));
        }

        tracing::debug!(content_id, kind = ?kind, "Engagement recorded");
        Ok(())
    }

    /// Drops cached pages of one feed type, or of every feed
    pub async fn invalidate_cache(&self, feed_type: Option<FeedType>) -> u64 {
        match feed_type {
            Some(FeedType::Recommended) => {
                self.cache
                    .invalidate_prefix(&CacheKey::feed_prefix(FeedType::Recommended))
                    .await
                    + self.cache.invalidate_prefix("feed:personalized:").await
            }
            Some(feed_type) => {
                self.cache
                    .invalidate_prefix(&CacheKey::feed_prefix(feed_type))
                    .await
            }
            None => self.cache.invalidate_prefix(FEED_KEY_PREFIX).await,
        }
    }

    /// Drops cached pages under an arbitrary feed key prefix
    pub async fn invalidate_prefix(&self, prefix: &str) -> AppResult<u64> {
        if !prefix.starts_with(FEED_KEY_PREFIX) {
            return Err(AppError::Validation(format!(
                "Cache prefix must start with \"{}\"",
                FEED_KEY_PREFIX
            )));
        }
        Ok(self.cache.invalidate_prefix(prefix).await)
    }
}
