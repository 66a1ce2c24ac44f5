//! Account persistence and credential checks behind the auth endpoints.

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::oauth::{oauth_username, GoogleIdentity};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::tokens::{is_expired, OneTimeToken};
use crate::auth::validation::{normalize_email, validate_name, validate_new_password};
use crate::email::Mailer;
use crate::errors::AppError;
use crate::models::user::User;

pub struct NewAccount<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

/// Validates input, stores the account with a pending verification token and
/// sends the verification email. Email failures are logged, never fatal.
pub async fn register_user(
    pool: &PgPool,
    mailer: &Mailer,
    account: NewAccount<'_>,
) -> Result<User, AppError> {
    let name = validate_name(account.name)?;
    let email = normalize_email(account.email)?;
    validate_new_password(account.password)?;

    if find_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password_blocking(account.password.to_string()).await?;
    let verification = OneTimeToken::verification();

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (id, name, email, password_hash, is_active, is_verified,
             verification_token, verification_token_expires)
        VALUES ($1, $2, $3, $4, TRUE, FALSE, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&verification.value)
    .bind(verification.expires_at)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
            AppError::Conflict("Email already registered".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    info!("Registered user {} ({})", user.id, user.email);

    if let Err(e) = mailer.send_verification(&user.email, &verification.value).await {
        warn!("Failed to send verification email to {}: {e}", user.email);
    }

    Ok(user)
}

#[derive(Debug, thiserror::Error)]
pub enum LoginFailure {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    Inactive,
}

impl From<LoginFailure> for AppError {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::InvalidCredentials => AppError::Unauthorized(failure.to_string()),
            LoginFailure::Inactive => AppError::Forbidden(failure.to_string()),
        }
    }
}

/// Checks credentials and stamps `last_login`.
/// The outer error carries infrastructure failures; the inner one is a rejected login.
pub async fn authenticate_user(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<Result<User, LoginFailure>, AppError> {
    let email = email.trim().to_lowercase();
    let Some(user) = find_by_email(pool, &email).await? else {
        return Ok(Err(LoginFailure::InvalidCredentials));
    };

    // Accounts created through Google sign-in have no password.
    let Some(stored_hash) = user.password_hash.clone() else {
        return Ok(Err(LoginFailure::InvalidCredentials));
    };
    if !verify_password_blocking(password.to_string(), stored_hash).await? {
        return Ok(Err(LoginFailure::InvalidCredentials));
    }

    if !user.is_active {
        return Ok(Err(LoginFailure::Inactive));
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    Ok(Ok(user))
}

/// Finds or creates the account for a verified Google identity.
/// Returns the user and whether it was newly created.
pub async fn upsert_google_user(
    pool: &PgPool,
    identity: &GoogleIdentity,
) -> Result<(User, bool), AppError> {
    let email = identity
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .ok_or_else(|| AppError::Validation("Email not provided by Google".to_string()))?;

    if let Some(existing) = find_by_email(pool, &email).await? {
        if existing.oauth_provider.is_some() {
            return Ok((existing, false));
        }
        let linked = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET oauth_provider = 'google',
                oauth_id = $2,
                is_verified = is_verified OR $3,
                profile_picture = COALESCE(profile_picture, $4),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(existing.id)
        .bind(&identity.subject)
        .bind(identity.email_verified)
        .bind(identity.picture.as_deref())
        .fetch_one(pool)
        .await?;
        info!("Linked Google identity to existing user {}", linked.id);
        return Ok((linked, false));
    }

    let display_name = identity
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (id, name, email, password_hash, is_active, is_verified,
             oauth_provider, oauth_id, profile_picture, username)
        VALUES ($1, $2, $3, NULL, TRUE, $4, 'google', $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&display_name)
    .bind(&email)
    .bind(identity.email_verified)
    .bind(&identity.subject)
    .bind(identity.picture.as_deref())
    .bind(oauth_username(&display_name, &identity.subject))
    .fetch_one(pool)
    .await?;

    info!("Created user {} from Google sign-in", user.id);
    Ok((user, true))
}

pub async fn verify_email(pool: &PgPool, token: &str) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE verification_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Invalid or expired verification token".to_string())
        })?;

    if is_expired(user.verification_token_expires, Utc::now()) {
        return Err(AppError::Validation(
            "Verification token has expired".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET is_verified = TRUE,
            verification_token = NULL,
            verification_token_expires = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    info!("Email verified for user {}", user.id);
    Ok(user)
}

pub async fn store_verification_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &OneTimeToken,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET verification_token = $2, verification_token_expires = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(&token.value)
    .bind(token.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn store_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token: &OneTimeToken,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET reset_token = $2, reset_token_expires = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(&token.value)
    .bind(token.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn reset_password(
    pool: &PgPool,
    token: &str,
    new_password: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired reset token".to_string()))?;

    if is_expired(user.reset_token_expires, Utc::now()) {
        return Err(AppError::Validation("Reset token has expired".to_string()));
    }

    if new_password.chars().count() < crate::auth::validation::MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let password_hash = hash_password_blocking(new_password.to_string()).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET password_hash = $2,
            reset_token = NULL,
            reset_token_expires = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&password_hash)
    .fetch_one(pool)
    .await?;

    info!("Password reset for user {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::{insert_user, TEST_PASSWORD};

    fn account<'a>(email: &'a str) -> NewAccount<'a> {
        NewAccount {
            name: "Ada Lovelace",
            email,
            password: TEST_PASSWORD,
        }
    }

    fn expired_token() -> OneTimeToken {
        OneTimeToken {
            value: crate::auth::tokens::random_url_safe(32),
            expires_at: Utc::now() - Duration::minutes(1),
        }
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_duplicate_registration_conflicts(pool: PgPool) {
        let mailer = Mailer::disabled("http://localhost:3000");
        let user = register_user(&pool, &mailer, account("Ada@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(!user.is_verified);
        assert!(user.verification_token.is_some());

        let err = register_user(&pool, &mailer, account("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Email already registered"));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_login_outcomes(pool: PgPool) {
        insert_user(&pool, "ada@example.com", "patient", true).await;
        insert_user(&pool, "idle@example.com", "patient", false).await;

        let user = authenticate_user(&pool, " ADA@example.com ", TEST_PASSWORD)
            .await
            .unwrap()
            .unwrap();
        assert!(user.last_login.is_some());

        let wrong = authenticate_user(&pool, "ada@example.com", "nope-nope")
            .await
            .unwrap();
        assert!(matches!(wrong, Err(LoginFailure::InvalidCredentials)));

        let unknown = authenticate_user(&pool, "ghost@example.com", TEST_PASSWORD)
            .await
            .unwrap();
        assert!(matches!(unknown, Err(LoginFailure::InvalidCredentials)));

        let idle = authenticate_user(&pool, "idle@example.com", TEST_PASSWORD)
            .await
            .unwrap();
        assert!(matches!(idle, Err(LoginFailure::Inactive)));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_verification_token_lifecycle(pool: PgPool) {
        let user = insert_user(&pool, "ada@example.com", "patient", true).await;

        let stale = expired_token();
        store_verification_token(&pool, user.id, &stale).await.unwrap();
        let err = verify_email(&pool, &stale.value).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Verification token has expired"));

        let fresh = OneTimeToken::verification();
        store_verification_token(&pool, user.id, &fresh).await.unwrap();
        let verified = verify_email(&pool, &fresh.value).await.unwrap();
        assert!(verified.is_verified);
        assert!(verified.verification_token.is_none());

        let err = verify_email(&pool, &fresh.value).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ref m) if m == "Invalid or expired verification token"
        ));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_reset_token_lifecycle(pool: PgPool) {
        let user = insert_user(&pool, "ada@example.com", "patient", true).await;

        let stale = expired_token();
        store_reset_token(&pool, user.id, &stale).await.unwrap();
        let err = reset_password(&pool, &stale.value, "brand-new-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Reset token has expired"));

        let fresh = OneTimeToken::password_reset();
        store_reset_token(&pool, user.id, &fresh).await.unwrap();
        reset_password(&pool, &fresh.value, "brand-new-pass")
            .await
            .unwrap();

        let old = authenticate_user(&pool, "ada@example.com", TEST_PASSWORD)
            .await
            .unwrap();
        assert!(matches!(old, Err(LoginFailure::InvalidCredentials)));
        assert!(authenticate_user(&pool, "ada@example.com", "brand-new-pass")
            .await
            .unwrap()
            .is_ok());
    }
}
