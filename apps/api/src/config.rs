use std::net::IpAddr;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub secret_key: String,
    pub jwt_algorithm: String,
    pub access_token_expire_minutes: i64,
    pub environment: String,
    pub frontend_url: String,
    pub smtp: SmtpConfig,
    pub google_client_id: Option<String>,
    pub rate_limit_per_minute: u32,
    /// Peers whose `X-Forwarded-For` header is believed.
    pub trusted_proxies: Vec<IpAddr>,
    pub diagnosis_queue: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: String,
}

impl SmtpConfig {
    /// Email is only sent when both credentials are present.
    pub fn is_configured(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_algorithm = optional_env("JWT_ALGORITHM").unwrap_or_else(|| "HS256".to_string());
        if !matches!(jwt_algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            bail!("JWT_ALGORITHM must be one of HS256, HS384, HS512 (got '{jwt_algorithm}')");
        }

        let smtp_user = optional_env("SMTP_USER");

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            secret_key: require_env("SECRET_KEY")?,
            jwt_algorithm,
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 1440)?,
            environment: optional_env("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            frontend_url: optional_env("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            smtp: SmtpConfig {
                host: optional_env("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_env("SMTP_PORT", 587)?,
                password: optional_env("SMTP_PASSWORD"),
                from_email: optional_env("SMTP_FROM_EMAIL").or_else(|| smtp_user.clone()),
                from_name: optional_env("SMTP_FROM_NAME")
                    .unwrap_or_else(|| "InsightCare".to_string()),
                user: smtp_user,
            },
            google_client_id: optional_env("GOOGLE_CLIENT_ID"),
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 100)?,
            trusted_proxies: parse_ip_list(
                "TRUSTED_PROXIES",
                optional_env("TRUSTED_PROXIES").as_deref().unwrap_or_default(),
            )?,
            diagnosis_queue: optional_env("DIAGNOSIS_QUEUE")
                .unwrap_or_else(|| "insightcare:jobs:diagnosis".to_string()),
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty values are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number (got '{raw}')")),
        None => Ok(default),
    }
}

/// Comma-separated ip addresses; blank entries are skipped.
fn parse_ip_list(key: &str, raw: &str) -> Result<Vec<IpAddr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .with_context(|| format!("{key} entries must be ip addresses (got '{entry}')"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_list() {
        assert!(parse_ip_list("TRUSTED_PROXIES", "").unwrap().is_empty());
        let proxies = parse_ip_list("TRUSTED_PROXIES", "10.0.0.1, ::1,").unwrap();
        assert_eq!(
            proxies,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn test_parse_ip_list_rejects_hostnames() {
        let err = parse_ip_list("TRUSTED_PROXIES", "10.0.0.1,proxy.internal").unwrap_err();
        assert!(err.to_string().contains("proxy.internal"));
    }
}
