use std::time::Duration;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

const REDIS_TIMEOUT: Duration = Duration::from_secs(2);

async fn ping(client: &redis::Client) -> Result<(), redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(())
}

fn describe<E: std::fmt::Display>(result: Result<(), E>) -> String {
    match result {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("disconnected: {e}"),
    }
}

/// GET /health
/// Reports service version plus database and Redis connectivity.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map(|_| ());

    let redis = match tokio::time::timeout(REDIS_TIMEOUT, ping(&state.redis)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err("timed out".to_string()),
    };

    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "database": describe(database),
        "redis": describe(redis),
    }))
}
