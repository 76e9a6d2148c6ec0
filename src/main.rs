//! Server entry-point: loads configuration, wires adapters and serves GraphQL.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use workout_tracker::adapters::graphql::{build_schema, SchemaServices};
use workout_tracker::adapters::http::{app, GraphqlAppState};
use workout_tracker::adapters::{ArchivalUploader, PostgresWorkoutStore, S3ObjectStorage};
use workout_tracker::config::AppConfig;
use workout_tracker::ports::{ObjectStorage, WorkoutStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let store = PostgresWorkoutStore::connect(&config.database).await?;
    if config.database.ensure_schema {
        store.ensure_schema().await?;
    }

    let uploader = if config.archive.enabled {
        let storage: Arc<dyn ObjectStorage> = Arc::new(S3ObjectStorage::from_config(&config.storage));
        tracing::info!(
            destination = %storage.describe(),
            policy = ?config.archive.failure_policy,
            "archival enabled"
        );
        Some(Arc::new(ArchivalUploader::from_config(storage, &config.archive)))
    } else {
        tracing::warn!("archival disabled; scrape batches will not be backed up");
        None
    };

    let schema = build_schema(SchemaServices {
        store: Arc::new(store.clone()),
        uploader,
    })?;
    let router = app(GraphqlAppState::new(schema), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let result = if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("tracing init failed: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
