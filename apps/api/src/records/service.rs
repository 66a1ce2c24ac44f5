use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::patient::{PatientRow, SymptomRow};

const MAX_NAME_LEN: usize = 120;
const MAX_AGE: i32 = 150;
const MAX_DIAGNOSIS_LEN: usize = 255;
const MAX_SYMPTOM_TEXT_LEN: usize = 2000;
const SYMPTOM_SEVERITIES: &[&str] = &["mild", "moderate", "severe", "unknown"];

#[derive(Debug, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<i32>,
    pub blood_pressure: Option<f64>,
    pub cholesterol: Option<f64>,
    pub diagnosis: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewSymptom {
    pub patient_id: i64,
    pub text: String,
    pub structured: Option<Value>,
    pub severity: Option<String>,
}

pub fn validate_patient(patient: &NewPatient) -> Result<String, AppError> {
    let name = patient.name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AppError::UnprocessableEntity(format!(
            "name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if patient.age.is_some_and(|age| !(0..=MAX_AGE).contains(&age)) {
        return Err(AppError::UnprocessableEntity(format!(
            "age must be between 0 and {MAX_AGE}"
        )));
    }
    if patient
        .diagnosis
        .as_deref()
        .is_some_and(|d| d.chars().count() > MAX_DIAGNOSIS_LEN)
    {
        return Err(AppError::UnprocessableEntity(format!(
            "diagnosis must be at most {MAX_DIAGNOSIS_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Removes HTML tags and surrounding whitespace from free text.
pub fn strip_html(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
    tag.replace_all(text, "").trim().to_string()
}

/// Returns the sanitized text and normalized severity.
pub fn validate_symptom(symptom: &NewSymptom) -> Result<(String, Option<String>), AppError> {
    let text = strip_html(&symptom.text);
    let len = text.chars().count();
    if len == 0 || len > MAX_SYMPTOM_TEXT_LEN {
        return Err(AppError::UnprocessableEntity(format!(
            "text must be 1-{MAX_SYMPTOM_TEXT_LEN} characters"
        )));
    }

    let severity = match symptom.severity.as_deref().map(|s| s.trim().to_lowercase()) {
        None => None,
        Some(s) if SYMPTOM_SEVERITIES.contains(&s.as_str()) => Some(s),
        Some(_) => {
            return Err(AppError::UnprocessableEntity(
                "severity must be one of mild, moderate, severe, unknown".to_string(),
            ))
        }
    };

    Ok((text, severity))
}

pub async fn list_patients(pool: &PgPool) -> Result<Vec<PatientRow>, AppError> {
    let rows = sqlx::query_as::<_, PatientRow>("SELECT * FROM patients ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn find_patient(pool: &PgPool, patient_id: i64) -> Result<PatientRow, AppError> {
    sqlx::query_as::<_, PatientRow>("SELECT * FROM patients WHERE id = $1")
        .bind(patient_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))
}

pub async fn create_patient(pool: &PgPool, patient: &NewPatient) -> Result<PatientRow, AppError> {
    let name = validate_patient(patient)?;
    let row = sqlx::query_as::<_, PatientRow>(
        r#"
        INSERT INTO patients (name, age, blood_pressure, cholesterol, diagnosis)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(patient.age)
    .bind(patient.blood_pressure)
    .bind(patient.cholesterol)
    .bind(patient.diagnosis.as_deref())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn create_symptom(
    pool: &PgPool,
    reported_by: Uuid,
    symptom: &NewSymptom,
) -> Result<SymptomRow, AppError> {
    let (text, severity) = validate_symptom(symptom)?;
    find_patient(pool, symptom.patient_id).await?;

    let structured = symptom
        .structured
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));

    let row = sqlx::query_as::<_, SymptomRow>(
        r#"
        INSERT INTO symptoms (patient_id, reported_by, text, structured, severity)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(symptom.patient_id)
    .bind(reported_by)
    .bind(text)
    .bind(structured)
    .bind(severity)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn symptoms_for_patient(
    pool: &PgPool,
    patient_id: i64,
) -> Result<Vec<SymptomRow>, AppError> {
    let rows = sqlx::query_as::<_, SymptomRow>(
        "SELECT * FROM symptoms WHERE patient_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::insert_user;

    fn patient(name: &str, age: Option<i32>) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            age,
            blood_pressure: None,
            cholesterol: None,
            diagnosis: None,
        }
    }

    fn symptom(text: &str, severity: Option<&str>) -> NewSymptom {
        NewSymptom {
            patient_id: 1,
            text: text.to_string(),
            structured: None,
            severity: severity.map(String::from),
        }
    }

    #[test]
    fn test_patient_name_bounds() {
        assert_eq!(validate_patient(&patient("  Ada  ", None)).unwrap(), "Ada");
        assert!(validate_patient(&patient("   ", None)).is_err());
        assert!(validate_patient(&patient(&"n".repeat(121), None)).is_err());
    }

    #[test]
    fn test_patient_age_bounds() {
        assert!(validate_patient(&patient("Ada", Some(0))).is_ok());
        assert!(validate_patient(&patient("Ada", Some(150))).is_ok());
        assert!(validate_patient(&patient("Ada", Some(151))).is_err());
        assert!(validate_patient(&patient("Ada", Some(-1))).is_err());
    }

    #[test]
    fn test_patient_diagnosis_fits_column() {
        let mut p = patient("Ada", None);
        p.diagnosis = Some("d".repeat(255));
        assert!(validate_patient(&p).is_ok());

        p.diagnosis = Some("d".repeat(256));
        let err = validate_patient(&p).unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<b>sharp</b> pain <script>alert(1)</script>"),
            "sharp pain alert(1)"
        );
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn test_symptom_text_must_survive_sanitizing() {
        assert!(validate_symptom(&symptom("<br/>", None)).is_err());
        assert!(validate_symptom(&symptom(&"x".repeat(2001), None)).is_err());
        let (text, _) = validate_symptom(&symptom("<i>headache</i>", None)).unwrap();
        assert_eq!(text, "headache");
    }

    #[test]
    fn test_symptom_severity() {
        let (_, severity) = validate_symptom(&symptom("cough", Some("Severe"))).unwrap();
        assert_eq!(severity.as_deref(), Some("severe"));
        assert!(validate_symptom(&symptom("cough", Some("unknown"))).is_ok());
        assert!(validate_symptom(&symptom("cough", Some("extreme"))).is_err());
    }

    // Postgres-backed

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_patient_round_trip_and_missing(pool: PgPool) {
        let mut new = patient("  Grace Hopper ", Some(70));
        new.blood_pressure = Some(150.0);
        let created = create_patient(&pool, &new).await.unwrap();
        assert_eq!(created.name, "Grace Hopper");

        let found = find_patient(&pool, created.id).await.unwrap();
        assert_eq!(found.blood_pressure, Some(150.0));
        assert_eq!(list_patients(&pool).await.unwrap().len(), 1);

        let err = find_patient(&pool, created.id + 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Patient not found"));
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_symptoms_sanitized_and_scoped_to_patient(pool: PgPool) {
        let doctor = insert_user(&pool, "doc@example.com", "doctor", true).await;
        let grace = create_patient(&pool, &patient("Grace", None)).await.unwrap();
        let alan = create_patient(&pool, &patient("Alan", None)).await.unwrap();

        let mut first = symptom("<b>Headache</b> since noon", Some("Severe"));
        first.patient_id = grace.id;
        let stored = create_symptom(&pool, doctor.id, &first).await.unwrap();
        assert_eq!(stored.text, "Headache since noon");
        assert_eq!(stored.severity.as_deref(), Some("severe"));
        assert_eq!(stored.structured, serde_json::json!({}));

        let mut second = symptom("Dizziness", None);
        second.patient_id = grace.id;
        let later = create_symptom(&pool, doctor.id, &second).await.unwrap();

        let mut other = symptom("Cough", None);
        other.patient_id = alan.id;
        create_symptom(&pool, doctor.id, &other).await.unwrap();

        let listed = symptoms_for_patient(&pool, grace.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![later.id, stored.id]
        );

        let mut orphan = symptom("Fever", None);
        orphan.patient_id = alan.id + 100;
        let err = create_symptom(&pool, doctor.id, &orphan).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
