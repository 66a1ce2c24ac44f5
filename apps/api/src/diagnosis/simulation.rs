//! Risk simulation over a stored patient's vitals.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::auth::CurrentUser;
use crate::diagnosis::engine::{DiagnosisEngine, EngineError};
use crate::diagnosis::runs::build_input_payload;
use crate::errors::AppError;
use crate::extract::ApiPath;
use crate::models::patient::PatientRow;
use crate::records::service as records;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SimulationOut {
    pub patient_id: i64,
    pub simulation_result: Value,
}

pub async fn simulate_patient(
    engine: &dyn DiagnosisEngine,
    patient: &PatientRow,
) -> Result<SimulationOut, AppError> {
    let payload = build_input_payload(Some(patient), None);
    let simulation_result = engine.assess(&payload).await.map_err(|e| match e {
        EngineError::UnsupportedPayload(_) => {
            AppError::UnprocessableEntity("Patient has no vitals to simulate".to_string())
        }
    })?;
    Ok(SimulationOut {
        patient_id: patient.id,
        simulation_result,
    })
}

/// GET /api/quantum/simulate/:patient_id
pub async fn handle_simulate(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(patient_id): ApiPath<i64>,
) -> Result<Json<SimulationOut>, AppError> {
    let patient = records::find_patient(&state.db, patient_id).await?;
    Ok(Json(simulate_patient(state.engine.as_ref(), &patient).await?))
}
