//! Orderhub server.
//!
//! Wires the whole subsystem at startup and runs it until shutdown:
//!
//! - connects and migrates the `PostgreSQL` order store (fatal on failure)
//! - compiles the order schema once
//! - spawns the cache warm rebuild (reads fall back to the store until it
//!   lands)
//! - establishes the durable subscription and spawns the ingestion loop
//! - serves the read API
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run the server
//! cargo run --bin orderhub-server
//! ```

mod config;

use anyhow::Context;
use config::ServerConfig;
use orderhub_cache::OrderCache;
use orderhub_core::feed::MessageHandler;
use orderhub_core::store::OrderStore;
use orderhub_ingest::{IngestionPipeline, SchemaValidator};
use orderhub_postgres::PgOrderStore;
use orderhub_query::QueryService;
use orderhub_redpanda::RedpandaOrderFeed;
use orderhub_web::{router, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderhub_ingest=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        brokers = %config.kafka_brokers,
        topic = %config.orders_topic,
        consumer_group = %config.consumer_group,
        http = %config.http_addr,
        "Configuration loaded"
    );

    // Store connectivity and migrations are fatal startup conditions: there
    // is no degraded mode without the source of truth.
    let store = PgOrderStore::connect(&config.database_url)
        .await
        .context("PostgreSQL must be reachable at startup")?
        .with_call_timeout(config.store_timeout);
    store
        .migrate()
        .await
        .context("Order store migrations must apply at startup")?;
    let store: Arc<dyn OrderStore> = Arc::new(store);

    // The schema compiles exactly once; per-message re-reads are a defect.
    let validator = match &config.schema_path {
        Some(path) => SchemaValidator::from_file(path)
            .with_context(|| format!("Schema override {} must compile", path.display()))?,
        None => SchemaValidator::embedded().context("Embedded order schema must compile")?,
    };

    let cache = OrderCache::new();
    {
        // Serve immediately; misses fall back to the store until the
        // rebuild completes.
        let cache = cache.clone();
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            if let Err(e) = cache.warm(store.as_ref()).await {
                tracing::error!(error = %e, "Cache warm rebuild failed; serving read-through only");
            }
        });
    }

    let pipeline: Arc<dyn MessageHandler> = Arc::new(IngestionPipeline::new(
        validator,
        Arc::clone(&store),
        cache.clone(),
    ));

    let feed = Arc::new(
        RedpandaOrderFeed::builder()
            .brokers(&config.kafka_brokers)
            .topic(&config.orders_topic)
            .consumer_group(&config.consumer_group)
            .build()
            .context("Feed consumer must be creatable at startup")?,
    );
    feed.subscribe()
        .context("Durable subscription must be established at startup")?;
    {
        let feed = Arc::clone(&feed);
        tokio::spawn(async move { feed.run(pipeline).await });
    }

    let state = AppState::new(QueryService::new(cache, store));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!(addr = %config.http_addr, "Orderhub is serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
