//! Axum route handlers for the Auth API.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::audit::{self, ClientInfo};
use crate::auth::extractor::CurrentUser;
use crate::auth::oauth::OAuthError;
use crate::auth::service::{self, NewAccount};
use crate::auth::tokens::OneTimeToken;
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::models::user::{UserOut, UserProfile};
use crate::state::AppState;

const TOKEN_TYPE: &str = "Bearer";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserOut,
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserOut,
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SocialAuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserOut,
    pub is_new_user: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = service::register_user(
        &state.db,
        &state.mailer,
        NewAccount {
            name: &req.name,
            email: &req.email,
            password: &req.password,
        },
    )
    .await?;

    audit::registration(&state.db, &client, user.id, &user.email).await;

    let access_token = state
        .tokens
        .issue(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully. Please check your email to verify your account."
                .to_string(),
            user: UserOut::from(&user),
            access_token,
            token_type: TOKEN_TYPE,
        }),
    ))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = match service::authenticate_user(&state.db, &req.email, &req.password).await {
        Ok(Ok(user)) => user,
        Ok(Err(failure)) => {
            audit::login_failure(&state.db, &client, &req.email, &failure.to_string()).await;
            return Err(failure.into());
        }
        Err(e) => {
            audit::login_failure(&state.db, &client, &req.email, &e.to_string()).await;
            return Err(e);
        }
    };

    audit::login_success(&state.db, &client, user.id, &user.email).await;

    let access_token = state
        .tokens
        .issue(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: TOKEN_TYPE,
        user: UserOut::from(&user),
    }))
}

/// GET /api/auth/me
pub async fn handle_me(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// POST /api/auth/google
///
/// Verifies a Google ID token and signs the user in, creating the account on first use.
pub async fn handle_google(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<GoogleAuthRequest>,
) -> Result<Json<SocialAuthResponse>, AppError> {
    let identity = state.google.verify(&req.token).await.map_err(|e| match e {
        OAuthError::NotConfigured => AppError::OAuth(e.to_string()),
        OAuthError::InvalidToken(reason) => {
            AppError::Unauthorized(format!("Invalid Google token: {reason}"))
        }
        OAuthError::Http(err) => AppError::OAuth(format!("Google authentication failed: {err}")),
    })?;

    let (user, is_new_user) = service::upsert_google_user(&state.db, &identity).await?;

    audit::login_success(&state.db, &client, user.id, &user.email).await;

    let access_token = state
        .tokens
        .issue(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(SocialAuthResponse {
        access_token,
        token_type: TOKEN_TYPE,
        user: UserOut::from(&user),
        is_new_user,
    }))
}

/// POST /api/auth/verify-email
pub async fn handle_verify_email(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> Result<Json<Value>, AppError> {
    let user = service::verify_email(&state.db, req.token.trim()).await?;
    audit::email_verified(&state.db, &client, user.id, &user.email).await;
    Ok(message("Email verified successfully"))
}

/// POST /api/auth/resend-verification
pub async fn handle_resend_verification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, AppError> {
    if user.is_verified {
        return Ok(message("Email is already verified"));
    }

    let token = OneTimeToken::verification();
    service::store_verification_token(&state.db, user.id, &token).await?;

    state
        .mailer
        .send_verification(&user.email, &token.value)
        .await
        .map_err(|e| {
            error!("Failed to send verification email: {e}");
            AppError::Email(e.to_string())
        })?;

    info!("Verification email resent to {}", user.email);
    Ok(message("Verification email has been sent"))
}

/// POST /api/auth/forgot-password
///
/// Always answers the same way so account existence is not revealed.
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let email = req.email.trim().to_lowercase();

    if let Some(user) = service::find_by_email(&state.db, &email).await? {
        let token = OneTimeToken::password_reset();
        service::store_reset_token(&state.db, user.id, &token).await?;

        match state.mailer.send_password_reset(&user.email, &token.value).await {
            Ok(_) => info!("Password reset email sent to {}", user.email),
            Err(e) => error!("Failed to send password reset email: {e}"),
        }

        audit::password_reset_request(&state.db, &client, &user.email).await;
    }

    Ok(message(
        "If the email exists, a password reset link has been sent",
    ))
}

/// POST /api/auth/reset-password
pub async fn handle_reset_password(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let user = service::reset_password(&state.db, req.token.trim(), &req.new_password).await?;
    audit::password_reset_complete(&state.db, &client, user.id, &user.email).await;
    Ok(message("Password has been reset successfully"))
}
