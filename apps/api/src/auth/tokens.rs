use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// A single-use token for email links, with its expiry.
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn generate(ttl: Duration) -> Self {
        Self {
            value: random_url_safe(32),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn verification() -> Self {
        Self::generate(Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
    }

    pub fn password_reset() -> Self {
        Self::generate(Duration::hours(RESET_TOKEN_TTL_HOURS))
    }
}

/// `n_bytes` of OS randomness, URL-safe base64 without padding.
pub fn random_url_safe(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Missing expiry counts as expired.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.map_or(true, |exp| exp < now)
}
