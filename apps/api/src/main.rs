mod audit;
mod auth;
mod config;
mod db;
mod diagnosis;
mod email;
mod errors;
mod extract;
mod jobs;
mod middleware;
mod models;
mod records;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::jwt::TokenIssuer;
use crate::auth::oauth::GoogleTokenVerifier;
use crate::config::Config;
use crate::db::create_pool;
use crate::diagnosis::{DiagnosisEngine, RuleBasedEngine};
use crate::email::Mailer;
use crate::jobs::JobQueue;
use crate::middleware::RateLimiter;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting InsightCare API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let tokens = TokenIssuer::new(
        &config.secret_key,
        &config.jwt_algorithm,
        config.access_token_expire_minutes,
    )?;
    let mailer = Mailer::new(&config.smtp, &config.frontend_url)?;
    info!(
        "Email delivery {}",
        if mailer.is_enabled() { "enabled" } else { "disabled" }
    );
    if config.google_client_id.is_none() {
        info!("GOOGLE_CLIENT_ID not set, Google sign-in disabled");
    }
    let google = Arc::new(GoogleTokenVerifier::new(config.google_client_id.clone()));

    // Initialize diagnosis engine (RuleBasedEngine by default)
    let engine: Arc<dyn DiagnosisEngine> = Arc::new(RuleBasedEngine);
    info!("Diagnosis engine initialized (model: {})", engine.model_name());

    let jobs = JobQueue::new(redis.clone(), config.diagnosis_queue.clone());
    tokio::spawn(jobs::worker::run_worker(
        jobs.clone(),
        db.clone(),
        engine.clone(),
    ));

    // Build app state
    let state = AppState {
        db,
        rate_limiter: RateLimiter::new(redis.clone(), config.rate_limit_per_minute),
        redis,
        config: config.clone(),
        tokens,
        mailer,
        google,
        engine,
        jobs,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
