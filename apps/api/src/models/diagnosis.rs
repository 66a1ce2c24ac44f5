use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A single disease prediction produced by the diagnosis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub disease: String,
    pub confidence: f64, // 0.0 – 1.0
    pub severity: String,
    pub description: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DiagnosisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symptoms: Vec<String>,
    pub severity: Option<String>,
    pub duration: Option<String>,
    pub predictions: Json<Vec<Prediction>>,
    pub created_at: DateTime<Utc>,
}

/// Queued diagnosis run executed by the background worker.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DiagnosisRunRow {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub run_by: Option<Uuid>,
    pub input_payload: Value,
    pub output_payload: Value,
    pub model: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}
