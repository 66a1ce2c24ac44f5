//! Axum route handlers for the Diagnosis API.

use axum::{
    extract::State,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{self, ClientInfo};
use crate::auth::CurrentUser;
use crate::diagnosis::service::{self, DiagnosisRequest};
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::diagnosis::{DiagnosisRow, Prediction};
use crate::state::AppState;

pub const DISCLAIMER: &str = "This is an AI-generated prediction. Please consult a healthcare professional for accurate diagnosis.";

#[derive(Debug, Serialize)]
pub struct DiagnosisOut {
    pub diagnosis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symptoms_analyzed: Vec<String>,
    pub predictions: Vec<Prediction>,
    pub disclaimer: &'static str,
}

impl From<DiagnosisRow> for DiagnosisOut {
    fn from(row: DiagnosisRow) -> Self {
        Self {
            diagnosis_id: row.id,
            timestamp: row.created_at,
            symptoms_analyzed: row.symptoms,
            predictions: row.predictions.0,
            disclaimer: DISCLAIMER,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TopPrediction {
    pub disease: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct DiagnosisHistoryItem {
    pub diagnosis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symptoms: Vec<String>,
    pub top_prediction: TopPrediction,
}

impl From<DiagnosisRow> for DiagnosisHistoryItem {
    fn from(row: DiagnosisRow) -> Self {
        let top_prediction = row
            .predictions
            .0
            .first()
            .map(|p| TopPrediction {
                disease: p.disease.clone(),
                confidence: p.confidence,
            })
            .unwrap_or(TopPrediction {
                disease: "Unknown".to_string(),
                confidence: 0.0,
            });
        Self {
            diagnosis_id: row.id,
            timestamp: row.created_at,
            symptoms: row.symptoms,
            top_prediction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiagnosisHistoryResponse {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub results: Vec<DiagnosisHistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/diagnosis/analyze
///
/// Also mounted at /api/diagnosis/diagnose and /api/diagnose.
pub async fn handle_analyze(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    client: ClientInfo,
    ApiJson(req): ApiJson<DiagnosisRequest>,
) -> Result<Json<DiagnosisOut>, AppError> {
    let input = service::normalize_request(&req)?;

    let row =
        service::create_diagnosis(&state.db, state.engine.as_ref(), user.id, &input).await?;

    audit::diagnosis_request(&state.db, &client, user.id, &user.email, input.symptoms.len())
        .await;

    Ok(Json(DiagnosisOut::from(row)))
}

/// GET /api/diagnosis/history
///
/// Also mounted at /api/history.
pub async fn handle_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(params): ApiQuery<HistoryQuery>,
) -> Result<Json<DiagnosisHistoryResponse>, AppError> {
    let (page, limit) = service::pagination(params.page, params.limit)?;
    let (rows, total) = service::history(&state.db, user.id, page, limit).await?;

    Ok(Json(DiagnosisHistoryResponse {
        total,
        page,
        limit,
        results: rows.into_iter().map(DiagnosisHistoryItem::from).collect(),
    }))
}

/// GET /api/diagnosis/:id
pub async fn handle_get_diagnosis(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(diagnosis_id): ApiPath<Uuid>,
) -> Result<Json<DiagnosisOut>, AppError> {
    let row = service::get_for_user(&state.db, diagnosis_id, user.id).await?;
    Ok(Json(DiagnosisOut::from(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json as SqlJson;

    fn row(predictions: Vec<Prediction>) -> DiagnosisRow {
        DiagnosisRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            symptoms: vec!["fever".to_string()],
            severity: Some("mild".to_string()),
            duration: None,
            predictions: SqlJson(predictions),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_item_uses_first_prediction() {
        let item = DiagnosisHistoryItem::from(row(vec![Prediction {
            disease: "Influenza".to_string(),
            confidence: 0.66,
            severity: "moderate".to_string(),
            description: String::new(),
            recommendations: vec![],
        }]));
        assert_eq!(
            item.top_prediction,
            TopPrediction {
                disease: "Influenza".to_string(),
                confidence: 0.66
            }
        );
    }

    #[test]
    fn test_history_item_without_predictions() {
        let item = DiagnosisHistoryItem::from(row(vec![]));
        assert_eq!(item.top_prediction.disease, "Unknown");
        assert_eq!(item.top_prediction.confidence, 0.0);
    }

    #[test]
    fn test_diagnosis_out_carries_disclaimer() {
        let out = serde_json::to_value(DiagnosisOut::from(row(vec![]))).unwrap();
        assert_eq!(out["disclaimer"], DISCLAIMER);
        assert_eq!(out["symptoms_analyzed"][0], "fever");
    }
}
