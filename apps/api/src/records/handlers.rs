//! Axum route handlers for patient and symptom records.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::audit::{self, ClientInfo};
use crate::auth::extractor::{ROLE_ADMIN, ROLE_DOCTOR};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::patient::{PatientRow, SymptomRow};
use crate::records::service::{self, NewPatient, NewSymptom};
use crate::state::AppState;

/// GET /api/patients
pub async fn handle_list_patients(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<PatientRow>>, AppError> {
    Ok(Json(service::list_patients(&state.db).await?))
}

/// POST /api/patients
///
/// Doctors and admins only.
pub async fn handle_create_patient(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewPatient>,
) -> Result<(StatusCode, Json<PatientRow>), AppError> {
    user.require_role(&[ROLE_DOCTOR, ROLE_ADMIN])?;
    let patient = service::create_patient(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /api/patients/:id
pub async fn handle_get_patient(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<PatientRow>, AppError> {
    Ok(Json(service::find_patient(&state.db, patient_id).await?))
}

/// POST /api/symptoms
pub async fn handle_create_symptom(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    client: ClientInfo,
    ApiJson(req): ApiJson<NewSymptom>,
) -> Result<(StatusCode, Json<SymptomRow>), AppError> {
    let symptom = service::create_symptom(&state.db, user.id, &req).await?;
    audit::symptom_created(
        &state.db,
        &client,
        user.id,
        &user.email,
        symptom.id,
        symptom.patient_id,
    )
    .await;
    Ok((StatusCode::CREATED, Json(symptom)))
}

/// GET /api/symptoms/patient/:patient_id
pub async fn handle_list_symptoms(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<Vec<SymptomRow>>, AppError> {
    Ok(Json(
        service::symptoms_for_patient(&state.db, patient_id).await?,
    ))
}
