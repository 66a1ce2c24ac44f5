use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::diagnosis::engine::DiagnosisEngine;
use crate::errors::AppError;
use crate::jobs::{Job, JobKind, JobQueue, QueueError};
use crate::models::diagnosis::{DiagnosisRunRow, RunStatus};

const POLL_TIMEOUT_SECS: u64 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Consumes the diagnosis queue until the process exits.
pub async fn run_worker(queue: JobQueue, db: PgPool, engine: Arc<dyn DiagnosisEngine>) {
    info!("Job worker listening on {}", queue.queue_key());

    let mut conn = None;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if conn.is_none() {
            match queue.connect().await {
                Ok(c) => conn = Some(c),
                Err(e) => {
                    warn!("Job worker cannot reach Redis, retrying in {}s: {e}", backoff.as_secs());
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                    continue;
                }
            }
        }
        let Some(active) = conn.as_mut() else {
            continue;
        };

        match queue.pop(active, POLL_TIMEOUT_SECS).await {
            Ok(Some(job)) => {
                backoff = INITIAL_BACKOFF;
                handle_job(&db, engine.as_ref(), job).await;
            }
            Ok(None) => backoff = INITIAL_BACKOFF,
            Err(QueueError::Decode(e)) => error!("Dropping malformed job: {e}"),
            Err(QueueError::Redis(e)) => {
                warn!("Job queue error, retrying in {}s: {e}", backoff.as_secs());
                conn = None;
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }
}

async fn handle_job(db: &PgPool, engine: &dyn DiagnosisEngine, job: Job) {
    match job.kind {
        JobKind::RunDiagnosis { run_id } => {
            info!("Job {} started: diagnosis run {run_id}", job.id);
            match execute_diagnosis_run(db, engine, run_id).await {
                Ok(Some(run)) => info!("Job {} finished: run {run_id} {}", job.id, run.status),
                Ok(None) => {}
                Err(e) => error!("Job {} failed to persist run {run_id}: {e}", job.id),
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Runs the engine over a stored run's input and records the outcome.
///
/// Returns `Ok(None)` when the run row no longer exists. Engine failures are
/// stored on the row as `{"error": ...}` with status `failed`.
pub async fn execute_diagnosis_run(
    pool: &PgPool,
    engine: &dyn DiagnosisEngine,
    run_id: i64,
) -> Result<Option<DiagnosisRunRow>, AppError> {
    let Some(run) = set_status(pool, run_id, RunStatus::Running, None).await? else {
        warn!("Diagnosis run {run_id} not found, skipping");
        return Ok(None);
    };

    let (status, output) = match engine.assess(&run.input_payload).await {
        Ok(output) => (RunStatus::Completed, output),
        Err(e) => {
            warn!("Diagnosis run {run_id} failed: {e}");
            (RunStatus::Failed, json!({ "error": e.to_string() }))
        }
    };

    set_status(pool, run_id, status, Some(output)).await
}

async fn set_status(
    pool: &PgPool,
    run_id: i64,
    status: RunStatus,
    output: Option<Value>,
) -> Result<Option<DiagnosisRunRow>, AppError> {
    let row = sqlx::query_as::<_, DiagnosisRunRow>(
        r#"
        UPDATE diagnosis_runs
        SET status = $2,
            output_payload = COALESCE($3, output_payload),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(run_id)
    .bind(status.as_str())
    .bind(output)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::diagnosis::engine::{EngineError, SymptomInput};
    use crate::diagnosis::RuleBasedEngine;
    use crate::models::diagnosis::Prediction;

    struct BrokenEngine;

    #[async_trait]
    impl DiagnosisEngine for BrokenEngine {
        fn model_name(&self) -> &str {
            "broken"
        }

        async fn predict(&self, _input: &SymptomInput) -> Result<Vec<Prediction>, EngineError> {
            Err(EngineError::UnsupportedPayload("model offline".to_string()))
        }

        async fn assess(&self, _payload: &Value) -> Result<Value, EngineError> {
            Err(EngineError::UnsupportedPayload("model offline".to_string()))
        }
    }

    async fn pending_run(pool: &PgPool, input: Value) -> i64 {
        sqlx::query_scalar("INSERT INTO diagnosis_runs (input_payload) VALUES ($1) RETURNING id")
            .bind(input)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut delay = INITIAL_BACKOFF;
        let mut seen = vec![];
        for _ in 0..7 {
            seen.push(delay.as_secs());
            delay = next_backoff(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_run_completes_with_engine_output(pool: PgPool) {
        let run_id = pending_run(&pool, json!({ "symptoms": ["fever", "cough"] })).await;

        let run = execute_diagnosis_run(&pool, &RuleBasedEngine, run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.model, "rules_v1");
        assert_eq!(run.output_payload["kind"], "symptom_prediction");
        assert!(run.updated_at >= run.created_at);
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_engine_failure_is_stored_on_run(pool: PgPool) {
        let run_id = pending_run(&pool, json!({ "age": 50 })).await;

        let run = execute_diagnosis_run(&pool, &BrokenEngine, run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.status, "failed");
        assert_eq!(
            run.output_payload,
            json!({ "error": "Unsupported payload: model offline" })
        );
    }

    #[sqlx::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_missing_run_is_skipped(pool: PgPool) {
        let run = execute_diagnosis_run(&pool, &RuleBasedEngine, 424242)
            .await
            .unwrap();
        assert!(run.is_none());
    }
}
