mod admin;
mod assistant;
mod auth;
mod config;
mod db;
mod employee;
mod errors;
mod hr;
mod llm_client;
mod mailer;
mod models;
mod pagination;
mod pm;
mod queue;
mod reports;
mod routes;
mod state;
mod validation;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::auth::accounts::ensure_bootstrap_admin;
use crate::auth::TokenService;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::llm_client::LlmClient;
use crate::mailer::{build_mailer, Mailer};
use crate::queue::scheduler::run_scheduler;
use crate::queue::worker::{spawn_workers, WorkerContext};
use crate::queue::{RedisTaskQueue, TaskQueue};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sync'em API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;
    ensure_bootstrap_admin(&db, config.bootstrap_admin.as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("Bootstrap admin failed: {e}"))?;

    // Initialize Redis task queue
    let redis = redis::Client::open(config.redis_url.clone())?;
    let queue: Arc<dyn TaskQueue> = Arc::new(
        RedisTaskQueue::connect(&redis)
            .await
            .context("Failed to connect to Redis")?,
    );
    info!("Redis task queue connected");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize mailer
    let mailer: Arc<dyn Mailer> = Arc::from(build_mailer(&config.mail)?);
    info!(
        "Mailer initialized ({})",
        if config.mail.api_url.is_some() { "http gateway" } else { "log only" }
    );

    // Background workers and the daily scheduler
    let worker_ctx = WorkerContext {
        db: db.clone(),
        llm: llm.clone(),
        mailer,
        queue: queue.clone(),
    };
    let workers = spawn_workers(redis, worker_ctx, config.worker_concurrency);
    info!("Spawned {} background workers", workers.len());

    let scheduler = tokio::spawn(run_scheduler(
        db.clone(),
        queue.clone(),
        config.daily_report_hour_utc,
    ));

    // Build app state
    let state = AppState {
        db,
        s3,
        llm,
        tokens: TokenService::new(&config.jwt_secret, config.token_ttl_minutes),
        queue,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down background tasks");
    scheduler.abort();
    for worker in workers {
        worker.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "syncem-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
