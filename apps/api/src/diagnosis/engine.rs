//! Pluggable, trait-based diagnosis engine.
//!
//! Default: `RuleBasedEngine` (pure-Rust, deterministic, fully testable).
//! `AppState` holds an `Arc<dyn DiagnosisEngine>`; handlers and the background
//! worker only ever talk to the trait.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::diagnosis::knowledge::{Condition, CONDITIONS};
use crate::models::diagnosis::Prediction;

pub const RULES_MODEL: &str = "rules_v1";
const MAX_PREDICTIONS: usize = 5;
const MAX_CONFIDENCE: f64 = 0.95;
const FALLBACK_CONFIDENCE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),
}

/// Normalized symptom report fed to `predict`.
#[derive(Debug, Clone, Default)]
pub struct SymptomInput {
    pub symptoms: Vec<String>,
    pub severity: Option<String>,
    pub duration: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap prediction backends without touching handlers or the worker.
#[async_trait]
pub trait DiagnosisEngine: Send + Sync {
    fn model_name(&self) -> &str;

    /// Ranked predictions for a symptom report, best first.
    async fn predict(&self, input: &SymptomInput) -> Result<Vec<Prediction>, EngineError>;

    /// Opaque payload transform used by queued diagnosis runs.
    async fn assess(&self, payload: &Value) -> Result<Value, EngineError>;
}

// ────────────────────────────────────────────────────────────────────────────
// RuleBasedEngine
// ────────────────────────────────────────────────────────────────────────────

/// Keyword-overlap engine over the built-in condition table.
///
/// Algorithm:
/// 1. A reported symptom matches a condition symptom when one contains the other.
/// 2. coverage  = matched condition symptoms / condition symptoms
///    precision = matched reported symptoms / reported symptoms
/// 3. confidence = 0.6 × coverage + 0.4 × precision, capped at 0.95
pub struct RuleBasedEngine;

#[async_trait]
impl DiagnosisEngine for RuleBasedEngine {
    fn model_name(&self) -> &str {
        RULES_MODEL
    }

    async fn predict(&self, input: &SymptomInput) -> Result<Vec<Prediction>, EngineError> {
        Ok(rank_conditions(input))
    }

    async fn assess(&self, payload: &Value) -> Result<Value, EngineError> {
        if let Some(symptoms) = payload.get("symptoms").and_then(symptoms_from_value) {
            let input = SymptomInput {
                symptoms,
                severity: payload
                    .get("severity")
                    .and_then(Value::as_str)
                    .map(str::to_lowercase),
                duration: None,
            };
            return Ok(json!({
                "model": RULES_MODEL,
                "kind": "symptom_prediction",
                "predictions": rank_conditions(&input),
            }));
        }

        let vitals = Vitals::from_payload(payload);
        if vitals.is_empty() {
            return Err(EngineError::UnsupportedPayload(
                "payload contains neither symptoms nor vitals".to_string(),
            ));
        }

        Ok(json!({
            "model": RULES_MODEL,
            "kind": "cardiovascular_risk",
            "assessment": cardiovascular_risk(&vitals),
        }))
    }
}

pub fn rank_conditions(input: &SymptomInput) -> Vec<Prediction> {
    let reported: Vec<String> = input
        .symptoms
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    if reported.is_empty() {
        return vec![fallback_prediction(input)];
    }

    let mut scored: Vec<(f64, &Condition)> = CONDITIONS
        .iter()
        .filter_map(|condition| {
            let matched_known = condition
                .symptoms
                .iter()
                .filter(|known| reported.iter().any(|r| symptom_matches(r, known)))
                .count();
            if matched_known == 0 {
                return None;
            }
            let matched_reported = reported
                .iter()
                .filter(|r| condition.symptoms.iter().any(|known| symptom_matches(r, known)))
                .count();

            let coverage = matched_known as f64 / condition.symptoms.len() as f64;
            let precision = matched_reported as f64 / reported.len() as f64;
            let confidence = round2((0.6 * coverage + 0.4 * precision).min(MAX_CONFIDENCE));
            Some((confidence, condition))
        })
        .collect();

    if scored.is_empty() {
        return vec![fallback_prediction(input)];
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.name.cmp(b.1.name))
    });

    let reported_severe = input.severity.as_deref() == Some("severe");
    scored
        .into_iter()
        .take(MAX_PREDICTIONS)
        .map(|(confidence, condition)| {
            let mut recommendations: Vec<String> = condition
                .recommendations
                .iter()
                .map(|r| r.to_string())
                .collect();
            if reported_severe {
                recommendations.insert(
                    0,
                    "Seek prompt medical attention given the reported severity".to_string(),
                );
            }
            Prediction {
                disease: condition.name.to_string(),
                confidence,
                severity: condition.severity.to_string(),
                description: condition.description.to_string(),
                recommendations,
            }
        })
        .collect()
}

fn symptom_matches(reported: &str, known: &str) -> bool {
    reported == known
        || reported.contains(known)
        || (reported.len() >= 4 && known.contains(reported))
}

fn fallback_prediction(input: &SymptomInput) -> Prediction {
    Prediction {
        disease: "Unclassified condition".to_string(),
        confidence: FALLBACK_CONFIDENCE,
        severity: input.severity.clone().unwrap_or_else(|| "mild".to_string()),
        description: "The reported symptoms do not match any known condition pattern."
            .to_string(),
        recommendations: vec![
            "Consult a healthcare professional for an accurate diagnosis".to_string(),
        ],
    }
}

/// Accepts a list of strings, or an object whose truthy keys are symptoms.
fn symptoms_from_value(value: &Value) -> Option<Vec<String>> {
    let symptoms: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Null | Value::Bool(false)))
            .map(|(k, _)| k.trim().to_lowercase())
            .collect(),
        _ => return None,
    };
    (!symptoms.is_empty()).then_some(symptoms)
}

// ────────────────────────────────────────────────────────────────────────────
// Cardiovascular risk from patient vitals
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vitals {
    pub age: Option<f64>,
    pub blood_pressure: Option<f64>,
    pub cholesterol: Option<f64>,
}

impl Vitals {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            age: payload.get("age").and_then(Value::as_f64),
            blood_pressure: payload.get("blood_pressure").and_then(Value::as_f64),
            cholesterol: payload.get("cholesterol").and_then(Value::as_f64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.blood_pressure.is_none() && self.cholesterol.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64, // 0.0 – 1.0
    pub risk_level: &'static str,
    pub factors: Vec<String>,
}

/// Logistic risk over age, systolic pressure and total cholesterol.
/// Missing values fall back to reference values (40 years, 120 mmHg, 200 mg/dL).
pub fn cardiovascular_risk(vitals: &Vitals) -> RiskAssessment {
    let age = vitals.age.unwrap_or(40.0);
    let bp = vitals.blood_pressure.unwrap_or(120.0);
    let chol = vitals.cholesterol.unwrap_or(200.0);

    let z = -5.0 + 0.04 * age + 0.02 * (bp - 120.0) + 0.01 * (chol - 200.0);
    let risk_score = (1.0 / (1.0 + (-z).exp()) * 1000.0).round() / 1000.0;

    let risk_level = if risk_score < 0.2 {
        "low"
    } else if risk_score < 0.5 {
        "moderate"
    } else {
        "high"
    };

    let mut factors = Vec::new();
    if age >= 60.0 {
        factors.push("age".to_string());
    }
    if bp >= 140.0 {
        factors.push("elevated blood pressure".to_string());
    }
    if chol >= 240.0 {
        factors.push("high cholesterol".to_string());
    }

    RiskAssessment {
        risk_score,
        risk_level,
        factors,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
