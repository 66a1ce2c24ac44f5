pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::audit::handlers as audit;
use crate::auth::handlers as auth;
use crate::diagnosis::{handlers as diagnosis, runs, simulation};
use crate::middleware::{rate_limit, request_tracing, security_headers};
use crate::records::handlers as records;
use crate::state::AppState;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!("FRONTEND_URL '{frontend_url}' is not a valid origin, CORS disabled");
            cors
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.frontend_url);

    let router = Router::new()
        .route("/health", get(health::health_handler))
        // Auth API
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/me", get(auth::handle_me))
        .route("/api/auth/google", post(auth::handle_google))
        .route("/api/auth/verify-email", post(auth::handle_verify_email))
        .route(
            "/api/auth/resend-verification",
            post(auth::handle_resend_verification),
        )
        .route(
            "/api/auth/forgot-password",
            post(auth::handle_forgot_password),
        )
        .route("/api/auth/reset-password", post(auth::handle_reset_password))
        // Diagnosis API
        .route("/api/diagnosis/analyze", post(diagnosis::handle_analyze))
        .route("/api/diagnosis/diagnose", post(diagnosis::handle_analyze))
        .route("/api/diagnose", post(diagnosis::handle_analyze))
        .route("/api/diagnosis/history", get(diagnosis::handle_history))
        .route("/api/history", get(diagnosis::handle_history))
        .route("/api/diagnosis/runs", post(runs::handle_request_run))
        .route("/api/diagnosis/runs/:id", get(runs::handle_get_run))
        .route("/api/diagnosis/:id", get(diagnosis::handle_get_diagnosis))
        .route(
            "/api/quantum/simulate/:patient_id",
            get(simulation::handle_simulate),
        )
        // Records API
        .route(
            "/api/patients",
            get(records::handle_list_patients).post(records::handle_create_patient),
        )
        .route("/api/patients/:id", get(records::handle_get_patient))
        .route("/api/symptoms", post(records::handle_create_symptom))
        .route(
            "/api/symptoms/patient/:patient_id",
            get(records::handle_list_symptoms),
        )
        // Audit API
        .route("/api/audit-logs", get(audit::handle_list_audit_logs))
        .layer(from_fn_with_state(state.clone(), rate_limit::limit))
        .with_state(state);

    request_tracing(security_headers(router).layer(cors))
}
