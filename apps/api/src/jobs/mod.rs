//! Background jobs backed by a Redis list.
//!
//! Producers `LPUSH` JSON-encoded [`Job`]s onto the queue key; the worker in
//! [`worker`] consumes them with `BRPOP`, so jobs run in FIFO order.

pub mod worker;

use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed job payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Redis(e) => AppError::Redis(e),
            QueueError::Decode(e) => AppError::Internal(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    RunDiagnosis { run_id: i64 },
}

impl Job {
    pub fn run_diagnosis(run_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: JobKind::RunDiagnosis { run_id },
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    queue_key: String,
}

impl JobQueue {
    pub fn new(client: redis::Client, queue_key: impl Into<String>) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub async fn connect(&self) -> Result<MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Pushes a job and returns its id.
    pub async fn enqueue(&self, job: &Job) -> Result<Uuid, QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.connect().await?;
        let depth: i64 = redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        info!("Enqueued job {} on {} (depth {depth})", job.id, self.queue_key);
        Ok(job.id)
    }

    /// Blocks up to `timeout_secs` for the next job. `Ok(None)` on timeout.
    pub async fn pop(
        &self,
        conn: &mut MultiplexedConnection,
        timeout_secs: u64,
    ) -> Result<Option<Job>, QueueError> {
        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue_key)
            .arg(timeout_secs)
            .query_async(conn)
            .await?;

        match reply {
            Some((_key, payload)) => Ok(Some(decode_job(&payload)?)),
            None => Ok(None),
        }
    }
}

pub fn decode_job(payload: &str) -> Result<Job, QueueError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_wire_format() {
        let job = Job::run_diagnosis(42);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["kind"], "run_diagnosis");
        assert_eq!(value["run_id"], 42);
        assert_eq!(value["id"], json!(job.id.to_string()));
    }

    #[test]
    fn test_decode_job() {
        let id = Uuid::new_v4();
        let payload = json!({ "id": id, "kind": "run_diagnosis", "run_id": 7 }).to_string();
        let job = decode_job(&payload).unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.kind, JobKind::RunDiagnosis { run_id: 7 });
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let payload = json!({ "id": Uuid::new_v4(), "kind": "send_email" }).to_string();
        assert!(matches!(decode_job(&payload), Err(QueueError::Decode(_))));
    }

    #[test]
    fn test_queue_key_kept() {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let queue = JobQueue::new(client, "insightcare:jobs:diagnosis");
        assert_eq!(queue.queue_key(), "insightcare:jobs:diagnosis");
    }
}
