//! Audit trail for security-relevant actions.
//!
//! Every event is written to `audit_logs` and mirrored to `tracing`.
//! Recording never fails the calling request: database errors are logged and dropped.

pub mod handlers;

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;

const MAX_IP_ADDRESS_LEN: usize = 50;
const MAX_EMAIL_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    Authentication,
    Account,
    Data,
}

impl AuditCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditCategory::Authentication => "authentication",
            AuditCategory::Account => "account",
            AuditCategory::Data => "data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
        }
    }
}

/// Caller details captured from the request: the peer address, or the
/// forwarding chain behind it when the peer is a trusted proxy, plus the user agent.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_parts(parts: &Parts, trusted_proxies: &[IpAddr]) -> Self {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok());

        let ip_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| resolve_client_ip(addr.ip(), forwarded, trusted_proxies))
            .map(|ip| ip.to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        ClientInfo {
            ip_address,
            user_agent,
        }
    }
}

/// Walks `X-Forwarded-For` from the nearest hop for as long as the sender is
/// a trusted proxy. Unparseable hops end the walk.
fn resolve_client_ip(peer: IpAddr, forwarded: Option<&str>, trusted: &[IpAddr]) -> IpAddr {
    let mut client = peer;
    let Some(chain) = forwarded else {
        return client;
    };
    for hop in chain.rsplit(',') {
        if !trusted.contains(&client) {
            break;
        }
        match hop.trim().parse::<IpAddr>() {
            Ok(ip) => client = ip,
            Err(_) => break,
        }
    }
    client
}

#[async_trait]
impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_parts(parts, &state.config.trusted_proxies))
    }
}

/// A single audit event to persist.
pub struct AuditEntry<'a> {
    pub event_type: &'a str,
    pub category: AuditCategory,
    pub description: String,
    pub status: AuditStatus,
    pub user_id: Option<Uuid>,
    pub user_email: Option<&'a str>,
    pub metadata: Option<Value>,
}

pub async fn record(pool: &PgPool, client: &ClientInfo, entry: AuditEntry<'_>) {
    let AuditEntry {
        event_type,
        category,
        description,
        status,
        user_id,
        user_email,
        metadata,
    } = entry;

    let user_email = user_email.map(|email| clamp(email, MAX_EMAIL_LEN));
    let ip_address = client
        .ip_address
        .as_deref()
        .map(|ip| clamp(ip, MAX_IP_ADDRESS_LEN));

    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs
            (id, user_id, user_email, event_type, event_category, description,
             ip_address, user_agent, status, extra_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(user_email)
    .bind(event_type)
    .bind(category.as_str())
    .bind(&description)
    .bind(ip_address)
    .bind(client.user_agent.as_deref())
    .bind(status.as_str())
    .bind(metadata)
    .execute(pool)
    .await;

    match result {
        Ok(_) => info!(
            event_type,
            event_category = category.as_str(),
            status = status.as_str(),
            user_email = ?user_email,
            ip_address = ?ip_address,
            "audit_event"
        ),
        Err(e) => error!("Failed to log audit event {event_type}: {e}"),
    }
}

/// Cuts `value` to at most `max` characters to fit its column.
fn clamp(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

pub async fn login_success(pool: &PgPool, client: &ClientInfo, user_id: Uuid, email: &str) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "login",
            category: AuditCategory::Authentication,
            description: format!("User {email} logged in successfully"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: None,
        },
    )
    .await
}

pub async fn login_failure(pool: &PgPool, client: &ClientInfo, email: &str, reason: &str) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "login_failed",
            category: AuditCategory::Authentication,
            description: format!("Failed login attempt for {email}: {reason}"),
            status: AuditStatus::Failure,
            user_id: None,
            user_email: Some(email),
            metadata: Some(json!({ "reason": reason })),
        },
    )
    .await
}

pub async fn registration(pool: &PgPool, client: &ClientInfo, user_id: Uuid, email: &str) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "registration",
            category: AuditCategory::Account,
            description: format!("New user registered: {email}"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: None,
        },
    )
    .await
}

pub async fn password_reset_request(pool: &PgPool, client: &ClientInfo, email: &str) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "password_reset_request",
            category: AuditCategory::Account,
            description: format!("Password reset requested for {email}"),
            status: AuditStatus::Success,
            user_id: None,
            user_email: Some(email),
            metadata: None,
        },
    )
    .await
}

pub async fn password_reset_complete(
    pool: &PgPool,
    client: &ClientInfo,
    user_id: Uuid,
    email: &str,
) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "password_reset_complete",
            category: AuditCategory::Account,
            description: format!("Password reset completed for {email}"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: None,
        },
    )
    .await
}

pub async fn email_verified(pool: &PgPool, client: &ClientInfo, user_id: Uuid, email: &str) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "email_verified",
            category: AuditCategory::Account,
            description: format!("Email verified for {email}"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: None,
        },
    )
    .await
}

pub async fn diagnosis_request(
    pool: &PgPool,
    client: &ClientInfo,
    user_id: Uuid,
    email: &str,
    symptom_count: usize,
) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "diagnosis_request",
            category: AuditCategory::Data,
            description: format!("User {email} requested diagnosis analysis"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: Some(json!({ "symptom_count": symptom_count })),
        },
    )
    .await
}

pub async fn diagnosis_task_started(
    pool: &PgPool,
    client: &ClientInfo,
    user_id: Uuid,
    email: &str,
    run_id: i64,
    job_id: Uuid,
) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "diagnosis_task_started",
            category: AuditCategory::Data,
            description: format!("Diagnosis run {run_id} scheduled by {email}"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: Some(json!({ "run_id": run_id, "job_id": job_id })),
        },
    )
    .await
}

pub async fn symptom_created(
    pool: &PgPool,
    client: &ClientInfo,
    user_id: Uuid,
    email: &str,
    symptom_id: i64,
    patient_id: i64,
) {
    record(
        pool,
        client,
        AuditEntry {
            event_type: "symptom_created",
            category: AuditCategory::Data,
            description: format!("Symptom {symptom_id} recorded for patient {patient_id}"),
            status: AuditStatus::Success,
            user_id: Some(user_id),
            user_email: Some(email),
            metadata: Some(json!({ "symptom_id": symptom_id, "patient_id": patient_id })),
        },
    )
    .await
}
