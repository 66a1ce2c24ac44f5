use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::auth::jwt::TokenIssuer;
use crate::auth::oauth::IdTokenVerifier;
use crate::config::Config;
use crate::diagnosis::DiagnosisEngine;
use crate::email::Mailer;
use crate::jobs::JobQueue;
use crate::middleware::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Used directly only by the health check; queue and limiter hold their own clones.
    pub redis: RedisClient,
    pub config: Config,
    pub tokens: TokenIssuer,
    pub mailer: Mailer,
    /// Google ID token verification. Swappable for tests.
    pub google: Arc<dyn IdTokenVerifier>,
    /// Pluggable prediction backend. Default: RuleBasedEngine.
    pub engine: Arc<dyn DiagnosisEngine>,
    pub jobs: JobQueue,
    pub rate_limiter: RateLimiter,
}
