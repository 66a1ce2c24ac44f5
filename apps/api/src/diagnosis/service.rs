use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::diagnosis::engine::{DiagnosisEngine, SymptomInput};
use crate::errors::AppError;
use crate::models::diagnosis::DiagnosisRow;

pub const MAX_SYMPTOMS: usize = 20;
pub const MAX_HISTORY_LIMIT: i64 = 50;
const SEVERITIES: &[&str] = &["mild", "moderate", "severe"];

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisRequest {
    pub symptoms: Vec<String>,
    pub severity: Option<String>,
    pub duration: Option<String>,
}

/// Validates a symptom report and normalizes it (trimmed, lower-cased).
pub fn normalize_request(req: &DiagnosisRequest) -> Result<SymptomInput, AppError> {
    if req.symptoms.is_empty() || req.symptoms.len() > MAX_SYMPTOMS {
        return Err(AppError::UnprocessableEntity(format!(
            "symptoms must contain between 1 and {MAX_SYMPTOMS} items"
        )));
    }

    let mut symptoms = Vec::with_capacity(req.symptoms.len());
    for raw in &req.symptoms {
        let symptom = raw.trim().to_lowercase();
        let len = symptom.chars().count();
        if !(2..=100).contains(&len) {
            return Err(AppError::UnprocessableEntity(
                "Each symptom must be 2-100 characters".to_string(),
            ));
        }
        symptoms.push(symptom);
    }

    let severity = match req.severity.as_deref().map(|s| s.trim().to_lowercase()) {
        None => None,
        Some(s) if s.is_empty() => None,
        Some(s) if SEVERITIES.contains(&s.as_str()) => Some(s),
        Some(_) => {
            return Err(AppError::UnprocessableEntity(
                "Severity must be mild, moderate, or severe".to_string(),
            ))
        }
    };

    let duration = req
        .duration
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);
    if duration.as_ref().is_some_and(|d| d.chars().count() > 100) {
        return Err(AppError::UnprocessableEntity(
            "duration must be at most 100 characters".to_string(),
        ));
    }

    Ok(SymptomInput {
        symptoms,
        severity,
        duration,
    })
}

/// Validates `page` (≥ 1) and `limit` (1–50), applying defaults 1 and 10.
pub fn pagination(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(10);
    if page < 1 {
        return Err(AppError::UnprocessableEntity(
            "page must be at least 1".to_string(),
        ));
    }
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::UnprocessableEntity(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }
    Ok((page, limit))
}

pub async fn create_diagnosis(
    pool: &PgPool,
    engine: &dyn DiagnosisEngine,
    user_id: Uuid,
    input: &SymptomInput,
) -> Result<DiagnosisRow, AppError> {
    let predictions = engine
        .predict(input)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let row = sqlx::query_as::<_, DiagnosisRow>(
        r#"
        INSERT INTO diagnoses (id, user_id, symptoms, severity, duration, predictions)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&input.symptoms)
    .bind(input.severity.as_deref())
    .bind(input.duration.as_deref())
    .bind(Json(&predictions))
    .fetch_one(pool)
    .await?;

    info!(
        "Stored diagnosis {} for user {user_id} ({} predictions, model {})",
        row.id,
        predictions.len(),
        engine.model_name()
    );
    Ok(row)
}

/// Newest-first page of a user's diagnoses plus the total count.
pub async fn history(
    pool: &PgPool,
    user_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<(Vec<DiagnosisRow>, i64), AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM diagnoses WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, DiagnosisRow>(
        r#"
        SELECT * FROM diagnoses
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

/// Diagnoses are only visible to their owner; anything else is a 404.
pub async fn get_for_user(
    pool: &PgPool,
    diagnosis_id: Uuid,
    user_id: Uuid,
) -> Result<DiagnosisRow, AppError> {
    sqlx::query_as::<_, DiagnosisRow>("SELECT * FROM diagnoses WHERE id = $1 AND user_id = $2")
        .bind(diagnosis_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Diagnosis not found".to_string()))
}
