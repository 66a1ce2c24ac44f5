use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientRow {
    pub id: i64,
    pub name: String,
    pub age: Option<i32>,
    pub blood_pressure: Option<f64>,
    pub cholesterol: Option<f64>,
    pub diagnosis: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SymptomRow {
    pub id: i64,
    pub patient_id: i64,
    pub reported_by: Option<Uuid>,
    pub text: String,
    pub structured: Value,
    pub severity: Option<String>,
    pub created_at: DateTime<Utc>,
}
