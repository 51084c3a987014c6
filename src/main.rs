//! Streamarr entry point
//!
//! Wires the shared process context (HTTP pool, Redis, Postgres) into
//! the search orchestrator and playback resolver, then serves the API.

mod settings;

use anyhow::Context;
use clap::Parser;
use settings::Settings;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use streamarr_api::AppState;
use streamarr_core::traits::{ApiKeyValidator, CacheStore};
use streamarr_debrid::DebridRegistry;
use streamarr_indexers::registry::{IndexerEndpoints, IndexerRegistry};
use streamarr_infrastructure::{ApiKeyRepository, RedisStore};
use streamarr_search::{PlaybackResolver, SearchOrchestrator, SearchSettings};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("streamarr=info,tower_http=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    info!("starting streamarr {}", env!("CARGO_PKG_VERSION"));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("streamarr/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let store: Arc<dyn CacheStore> = Arc::new(
        RedisStore::connect(&settings.redis_url)
            .await
            .context("connecting to Redis")?,
    );

    let api_keys: Option<Arc<dyn ApiKeyValidator>> = match &settings.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("connecting to Postgres")?;
            Some(Arc::new(ApiKeyRepository::new(pool)))
        }
        None => {
            info!("no DATABASE_URL set, running keyless");
            None
        }
    };

    let indexers = Arc::new(IndexerRegistry::new(
        http.clone(),
        store.clone(),
        IndexerEndpoints {
            zilean_url: settings.zilean_url.clone(),
            jackett_url: settings.jackett_url.clone(),
            jackett_api_key: settings.jackett_api_key.clone(),
        },
    ));
    let debrids = Arc::new(DebridRegistry::new(
        http.clone(),
        settings.stremthru_url.clone(),
    ));

    let orchestrator = Arc::new(SearchOrchestrator::new(
        store.clone(),
        indexers,
        debrids.clone(),
        SearchSettings::default(),
    ));
    let resolver = Arc::new(PlaybackResolver::new(
        store,
        debrids,
        settings.placeholder_video_url.clone(),
    ));

    let state = AppState {
        orchestrator,
        resolver,
        api_keys,
    };
    let app = streamarr_api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(60)));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .context("parsing bind address")?;
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding listener")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serving")?;
    Ok(())
}
