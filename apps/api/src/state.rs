use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::auth::TokenService;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::queue::TaskQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Backup storage (S3 or MinIO).
    pub s3: S3Client,
    pub llm: LlmClient,
    pub config: Config,
    pub tokens: TokenService,
    /// Producer side of the background queue. Redis in production.
    pub queue: Arc<dyn TaskQueue>,
}
