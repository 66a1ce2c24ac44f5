//! Google ID token verification.
//!
//! Tokens are checked against Google's tokeninfo endpoint, then the audience,
//! issuer and expiry are enforced locally. `AppState` carries an
//! `Arc<dyn IdTokenVerifier>` so tests can swap in a fixed identity.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Google OAuth not configured on server")]
    NotConfigured,

    #[error("{0}")]
    InvalidToken(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, OAuthError>;
}

/// Raw tokeninfo payload. Google encodes booleans and numbers as strings here.
#[derive(Debug, Deserialize)]
pub struct TokenInfo {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub aud: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<Value>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub exp: Option<Value>,
}

pub struct GoogleTokenVerifier {
    client: Client,
    client_id: Option<String>,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            client_id,
        }
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, OAuthError> {
        let client_id = self.client_id.as_deref().ok_or(OAuthError::NotConfigured)?;

        let response = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Google tokeninfo rejected token ({status}): {body}");
            return Err(OAuthError::InvalidToken(
                "Token rejected by Google".to_string(),
            ));
        }

        let info: TokenInfo = response.json().await?;
        check_claims(info, client_id, Utc::now().timestamp())
    }
}

/// Enforces audience, issuer and expiry on a tokeninfo payload.
pub fn check_claims(
    info: TokenInfo,
    client_id: &str,
    now_ts: i64,
) -> Result<GoogleIdentity, OAuthError> {
    if info.aud.as_deref() != Some(client_id) {
        return Err(OAuthError::InvalidToken("Token has wrong audience".to_string()));
    }

    match info.iss.as_deref() {
        Some(iss) if GOOGLE_ISSUERS.contains(&iss) => {}
        _ => return Err(OAuthError::InvalidToken("Wrong issuer".to_string())),
    }

    let exp = info.exp.as_ref().and_then(value_as_i64);
    if exp.map_or(true, |exp| exp < now_ts) {
        return Err(OAuthError::InvalidToken("Token expired".to_string()));
    }

    let subject = info
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuthError::InvalidToken("Token has no subject".to_string()))?;

    Ok(GoogleIdentity {
        subject,
        email: info.email,
        email_verified: info.email_verified.as_ref().map_or(false, value_as_bool),
        name: info.name,
        picture: info.picture,
    })
}

const MAX_USERNAME_LEN: usize = 100;
const SUBJECT_PREFIX_LEN: usize = 8;

/// Username for an account created through Google sign-in:
/// lower-cased display name with spaces replaced, suffixed by the subject prefix.
/// The name part is cut so the result fits `users.username`.
pub fn oauth_username(display_name: &str, subject: &str) -> String {
    let prefix: String = subject.chars().take(SUBJECT_PREFIX_LEN).collect();
    let name: String = display_name
        .replace(' ', "_")
        .to_lowercase()
        .chars()
        .take(MAX_USERNAME_LEN - SUBJECT_PREFIX_LEN - 1)
        .collect();
    format!("{name}_{prefix}")
}

fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
