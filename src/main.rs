use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use explore_feed::config::{CacheBackend, Config, DataSource};
use explore_feed::db::memory::{
    CacheSweeperHandle, InMemoryContentRepository, InMemoryPreferenceRepository, MemoryCacheStore,
};
use explore_feed::db::postgres::{self, PgContentRepository, PgPreferenceRepository};
use explore_feed::db::redis::{CacheWriterHandle, RedisCacheStore};
use explore_feed::db::{create_redis_client, Cache, CacheStore, ContentRepository, PreferenceRepository};
use explore_feed::routes::{create_router, AppState};
use explore_feed::services::{FeedService, FeedSettings, NoBoostInjector, ProfileProvider};

/// Background task owned by the cache backend
enum CacheWorker {
    Sweeper(CacheSweeperHandle),
    Writer(CacheWriterHandle),
}

impl CacheWorker {
    async fn shutdown(self) {
        match self {
            CacheWorker::Sweeper(handle) => handle.shutdown().await,
            CacheWorker::Writer(handle) => handle.shutdown().await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,explore_feed=debug"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let (content, preferences) = repositories(&config).await?;
    let (store, worker) = cache_store(&config)?;

    let feeds = FeedService::new(
        content,
        ProfileProvider::new(preferences),
        Arc::new(NoBoostInjector),
        Cache::new(store),
        FeedSettings::from(&config),
    );
    let app = create_router(AppState::new(feeds));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Explore feed service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn repositories(
    config: &Config,
) -> anyhow::Result<(Arc<dyn ContentRepository>, Arc<dyn PreferenceRepository>)> {
    match config.data_source {
        DataSource::Postgres => {
            let pool = postgres::create_pool(&config.database_url).await?;
            postgres::run_migrations(&pool).await?;
            Ok((
                Arc::new(PgContentRepository::new(pool.clone())),
                Arc::new(PgPreferenceRepository::new(pool)),
            ))
        }
        DataSource::Memory => {
            tracing::warn!("Using empty in-memory content and preference stores");
            Ok((
                Arc::new(InMemoryContentRepository::default()),
                Arc::new(InMemoryPreferenceRepository::default()),
            ))
        }
    }
}

fn cache_store(config: &Config) -> anyhow::Result<(Arc<dyn CacheStore>, CacheWorker)> {
    match config.cache_backend {
        CacheBackend::Memory => {
            let store = MemoryCacheStore::new();
            let sweeper =
                store.start_sweeper(Duration::from_secs(config.cache_sweep_interval_secs.max(1)));
            Ok((Arc::new(store), CacheWorker::Sweeper(sweeper)))
        }
        CacheBackend::Redis => {
            let client = create_redis_client(&config.redis_url)?;
            let (store, writer) = RedisCacheStore::new(client);
            Ok((Arc::new(store), CacheWorker::Writer(writer)))
        }
    }
}

/// Resolves on Ctrl+C. Without a signal handler the server runs until killed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
