//! SMTP delivery for transactional email.
//!
//! The mailer is disabled when SMTP credentials are absent; sends are then
//! skipped with a warning instead of failing.

pub mod templates;

use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use templates::EmailContent;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    frontend_url: String,
}

impl Mailer {
    pub fn new(smtp: &SmtpConfig, frontend_url: &str) -> Result<Self, EmailError> {
        let (Some(user), Some(password)) = (&smtp.user, &smtp.password) else {
            warn!("SMTP credentials not configured, outgoing email disabled");
            return Ok(Self::disabled(frontend_url));
        };

        let from_email = smtp.from_email.as_deref().unwrap_or(user);
        let from = Mailbox::new(Some(smtp.from_name.clone()), from_email.parse()?);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
            .port(smtp.port)
            .credentials(Credentials::new(user.clone(), password.clone()))
            .build();

        info!("SMTP mailer configured for {}:{}", smtp.host, smtp.port);

        Ok(Self {
            transport: Some(transport),
            from: Some(from),
            frontend_url: frontend_url.to_string(),
        })
    }

    pub fn disabled(frontend_url: &str) -> Self {
        Self {
            transport: None,
            from: None,
            frontend_url: frontend_url.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send(&self, to: &str, content: EmailContent) -> Result<Delivery, EmailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            warn!(to, subject = %content.subject, "SMTP credentials not configured, skipping email");
            return Ok(Delivery::Skipped);
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to.parse()?)
            .subject(&content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html),
                    ),
            )?;

        transport.send(message).await?;
        info!(to, subject = %content.subject, "Email sent successfully");
        Ok(Delivery::Sent)
    }

    pub async fn send_verification(&self, to: &str, token: &str) -> Result<Delivery, EmailError> {
        self.send(to, templates::verification_email(&self.frontend_url, token))
            .await
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) -> Result<Delivery, EmailError> {
        self.send(to, templates::password_reset_email(&self.frontend_url, token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp(user: Option<&str>, password: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: user.map(String::from),
            password: password.map(String::from),
            from_email: None,
            from_name: "InsightCare".to_string(),
        }
    }

    #[tokio::test]
    async fn test_disabled_mailer_skips() {
        let mailer = Mailer::new(&smtp(None, None), "http://localhost:3000").unwrap();
        assert!(!mailer.is_enabled());
        let delivery = mailer
            .send_verification("user@example.com", "tok")
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Skipped);
    }

    #[test]
    fn test_missing_password_disables() {
        let mailer = Mailer::new(&smtp(Some("me@example.com"), None), "http://x").unwrap();
        assert!(!mailer.is_enabled());
    }

    #[tokio::test]
    async fn test_configured_mailer_builds_without_connecting() {
        let mailer = Mailer::new(
            &smtp(Some("me@example.com"), Some("app-password")),
            "http://localhost:3000",
        )
        .unwrap();
        assert!(mailer.is_enabled());
    }
}
