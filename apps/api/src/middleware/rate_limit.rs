//! Per-client fixed-window rate limiting backed by Redis.
//!
//! Each client ip gets `RATE_LIMIT_PER_MINUTE` requests per wall-clock minute,
//! counted under `ratelimit:{ip}:{window}`. `/health` is exempt. When Redis is
//! unreachable or slow the request is let through, and Redis is left alone
//! for a short cooldown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::audit::ClientInfo;
use crate::errors::AppError;
use crate::state::AppState;

const WINDOW_SECS: u64 = 60;
/// Upper bound on one counter update, connect included.
const REDIS_TIMEOUT: Duration = Duration::from_millis(500);
/// After a failed update, requests skip Redis for this long.
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);
const EXEMPT_PATHS: &[&str] = &["/health"];

#[derive(Default)]
struct Link {
    conn: Option<MultiplexedConnection>,
    down_until: Option<Instant>,
}

#[derive(Clone)]
pub struct RateLimiter {
    client: redis::Client,
    per_minute: u32,
    link: Arc<Mutex<Link>>,
}

impl RateLimiter {
    pub fn new(client: redis::Client, per_minute: u32) -> Self {
        Self {
            client,
            per_minute,
            link: Arc::new(Mutex::new(Link::default())),
        }
    }

    // The lock only guards the cached handle; connecting happens outside it.
    async fn connection(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        if let Some(conn) = self.link.lock().await.conn.clone() {
            return Ok(conn);
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        self.link.lock().await.conn = Some(conn.clone());
        Ok(conn)
    }

    async fn cooling_down(&self) -> bool {
        self.link
            .lock()
            .await
            .down_until
            .is_some_and(|until| Instant::now() < until)
    }

    async fn mark_down(&self) {
        let mut link = self.link.lock().await;
        link.conn = None;
        link.down_until = Some(Instant::now() + RECONNECT_COOLDOWN);
    }

    /// Counts one request for `client_key` in the current window.
    pub async fn hit(&self, client_key: &str, now_secs: u64) -> Result<(), AppError> {
        if self.cooling_down().await {
            debug!("Rate limiter cooling down, allowing request");
            return Ok(());
        }

        let key = window_key(client_key, now_secs);
        let count = match tokio::time::timeout(REDIS_TIMEOUT, self.increment(&key)).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                warn!("Rate limiter unavailable, allowing request: {e}");
                self.mark_down().await;
                return Ok(());
            }
            Err(_) => {
                warn!("Rate limiter timed out, allowing request");
                self.mark_down().await;
                return Ok(());
            }
        };

        if count > u64::from(self.per_minute) {
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after(now_secs),
            });
        }
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<u64, redis::RedisError> {
        let mut conn = self.connection().await?;
        let (count,): (u64,) = window_pipeline(key).query_async(&mut conn).await?;
        Ok(count)
    }
}

/// `MULTI; SET key 0 EX 60 NX; INCR key; EXEC`: the counter never exists without a TTL.
fn window_pipeline(key: &str) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(WINDOW_SECS)
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(key);
    pipe
}

pub fn window_key(client_key: &str, now_secs: u64) -> String {
    format!("ratelimit:{client_key}:{}", now_secs / WINDOW_SECS)
}

/// Seconds until the current window closes (at least 1).
pub fn retry_after(now_secs: u64) -> u64 {
    (WINDOW_SECS - now_secs % WINDOW_SECS).max(1)
}

pub async fn limit(
    State(state): State<AppState>,
    client: ClientInfo,
    req: Request,
    next: Next,
) -> Response {
    match limit_inner(&state, &client, req, next).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn limit_inner(
    state: &AppState,
    client: &ClientInfo,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if EXEMPT_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let client_key = client.ip_address.as_deref().unwrap_or("unknown");
    let now_secs = chrono::Utc::now().timestamp().max(0) as u64;
    state.rate_limiter.hit(client_key, now_secs).await?;

    Ok(next.run(req).await)
}
