//! Queued diagnosis runs: persisted in `diagnosis_runs`, executed by the job worker.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, ClientInfo};
use crate::auth::CurrentUser;
use crate::diagnosis::engine::RULES_MODEL;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::jobs::{worker, Job};
use crate::models::diagnosis::{DiagnosisRunRow, RunStatus};
use crate::models::patient::PatientRow;
use crate::records::service as records;
use crate::state::AppState;

const SCHEDULED: &str = "scheduled";
const MAX_MODEL_LEN: usize = 100;

fn default_run_async() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DiagnosisRunRequest {
    pub patient_id: Option<i64>,
    pub symptoms: Option<Value>,
    pub model: Option<String>,
    #[serde(default = "default_run_async")]
    pub run_async: bool,
}

#[derive(Debug, Serialize)]
pub struct DiagnosisRunOut {
    pub run_id: i64,
    pub patient_id: Option<i64>,
    pub status: String,
    pub model: String,
    pub input: Value,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DiagnosisRunRow> for DiagnosisRunOut {
    fn from(row: DiagnosisRunRow) -> Self {
        Self {
            run_id: row.id,
            patient_id: row.patient_id,
            status: row.status,
            model: row.model,
            input: row.input_payload,
            output: row.output_payload,
            job_id: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn has_symptoms(symptoms: Option<&Value>) -> bool {
    match symptoms {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Engine input for a run: provided symptoms win over the patient's vitals.
pub fn build_input_payload(patient: Option<&PatientRow>, symptoms: Option<&Value>) -> Value {
    if let Some(symptoms) = symptoms.filter(|s| has_symptoms(Some(*s))) {
        return json!({ "symptoms": symptoms });
    }
    match patient {
        Some(p) => json!({
            "patient_id": p.id,
            "age": p.age,
            "blood_pressure": p.blood_pressure,
            "cholesterol": p.cholesterol,
        }),
        None => json!({}),
    }
}

/// Trimmed model label, `rules_v1` when absent or blank.
fn resolve_model(requested: Option<&str>) -> Result<&str, AppError> {
    let model = requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(RULES_MODEL);
    if model.chars().count() > MAX_MODEL_LEN {
        return Err(AppError::UnprocessableEntity(format!(
            "model must be at most {MAX_MODEL_LEN} characters"
        )));
    }
    Ok(model)
}

async fn insert_run(
    pool: &PgPool,
    patient_id: Option<i64>,
    run_by: Uuid,
    input: &Value,
    model: &str,
) -> Result<DiagnosisRunRow, AppError> {
    let row = sqlx::query_as::<_, DiagnosisRunRow>(
        r#"
        INSERT INTO diagnosis_runs (patient_id, run_by, input_payload, model, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(patient_id)
    .bind(run_by)
    .bind(input)
    .bind(model)
    .bind(RunStatus::Pending.as_str())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// POST /api/diagnosis/runs
///
/// Queues the run on Redis by default; `run_async: false` executes it inline.
pub async fn handle_request_run(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    client: ClientInfo,
    ApiJson(req): ApiJson<DiagnosisRunRequest>,
) -> Result<(StatusCode, Json<DiagnosisRunOut>), AppError> {
    if req.patient_id.is_none() && !has_symptoms(req.symptoms.as_ref()) {
        return Err(AppError::Validation(
            "Provide patient_id or symptoms".to_string(),
        ));
    }

    let patient = match req.patient_id {
        Some(id) => Some(records::find_patient(&state.db, id).await?),
        None => None,
    };

    let input = build_input_payload(patient.as_ref(), req.symptoms.as_ref());
    let model = resolve_model(req.model.as_deref())?;

    let run = insert_run(&state.db, req.patient_id, user.id, &input, model).await?;

    if !req.run_async {
        let finished = worker::execute_diagnosis_run(&state.db, state.engine.as_ref(), run.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Diagnosis run not found".to_string()))?;
        return Ok((StatusCode::CREATED, Json(DiagnosisRunOut::from(finished))));
    }

    let job_id = state.jobs.enqueue(&Job::run_diagnosis(run.id)).await?;
    audit::diagnosis_task_started(&state.db, &client, user.id, &user.email, run.id, job_id).await;

    let mut out = DiagnosisRunOut::from(run);
    out.status = SCHEDULED.to_string();
    out.output = json!({});
    out.job_id = Some(job_id);
    Ok((StatusCode::CREATED, Json(out)))
}

/// GET /api/diagnosis/runs/:id
pub async fn handle_get_run(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    ApiPath(run_id): ApiPath<i64>,
) -> Result<Json<DiagnosisRunOut>, AppError> {
    let run = sqlx::query_as::<_, DiagnosisRunRow>("SELECT * FROM diagnosis_runs WHERE id = $1")
        .bind(run_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Diagnosis run not found".to_string()))?;
    Ok(Json(DiagnosisRunOut::from(run)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> PatientRow {
        PatientRow {
            id: 3,
            name: "Ada".to_string(),
            age: Some(64),
            blood_pressure: Some(150.0),
            cholesterol: None,
            diagnosis: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_async_defaults_to_true() {
        let req: DiagnosisRunRequest = serde_json::from_value(json!({ "patient_id": 1 })).unwrap();
        assert!(req.run_async);
        assert!(req.symptoms.is_none());
    }

    #[test]
    fn test_payload_from_patient_vitals() {
        let payload = build_input_payload(Some(&patient()), None);
        assert_eq!(payload["patient_id"], 3);
        assert_eq!(payload["age"], 64);
        assert_eq!(payload["blood_pressure"], 150.0);
        assert!(payload["cholesterol"].is_null());
    }

    #[test]
    fn test_symptoms_take_precedence() {
        let symptoms = json!(["fever", "cough"]);
        let payload = build_input_payload(Some(&patient()), Some(&symptoms));
        assert_eq!(payload, json!({ "symptoms": ["fever", "cough"] }));
    }

    #[test]
    fn test_empty_symptoms_ignored() {
        assert!(!has_symptoms(Some(&json!([]))));
        assert!(!has_symptoms(Some(&json!({}))));
        assert!(!has_symptoms(Some(&Value::Null)));
        assert!(has_symptoms(Some(&json!({ "fever": true }))));
        let payload = build_input_payload(Some(&patient()), Some(&json!([])));
        assert_eq!(payload["age"], 64);
    }

    #[test]
    fn test_resolve_model() {
        assert_eq!(resolve_model(None).unwrap(), RULES_MODEL);
        assert_eq!(resolve_model(Some("   ")).unwrap(), RULES_MODEL);
        assert_eq!(resolve_model(Some(" custom_v2 ")).unwrap(), "custom_v2");
        assert_eq!(resolve_model(Some(&"m".repeat(100))).unwrap().len(), 100);

        let err = resolve_model(Some(&"m".repeat(101))).unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }
}
