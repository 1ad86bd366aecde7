use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::style::StyleParams;

/// One transformation request handed over by the caller.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Correlation id for logs and the returned outcome.
    pub request_id: Uuid,
    pub tenant_id: String,
    pub source_image: Vec<u8>,
    pub style: StyleParams,
    /// Directory (under the tenant prefix) that receives the variants.
    pub directory: String,
    pub base_name: String,
}

impl JobRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        source_image: Vec<u8>,
        style: StyleParams,
        directory: impl Into<String>,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            source_image,
            style,
            directory: directory.into(),
            base_name: base_name.into(),
        }
    }
}

/// Reference to a job accepted by the remote service. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobHandle {
    job_id: String,
    submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            submitted_at: Utc::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// Remote job state as observed on a single poll tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Which known status-body layout a payload matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    QueueWrapper,
    SimpleStatus,
    NestedSuccess,
    Direct,
}

/// Terminal success payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub input_image: Option<String>,
    pub output_urls: Vec<String>,
}

/// One normalized observation of the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusSnapshot {
    pub state: JobState,
    pub shape: Option<ResponseShape>,
    /// Status string as reported, when the shape has one.
    pub status: Option<String>,
    pub worker_id: Option<String>,
    pub delay_time: Option<u64>,
    pub result: Option<JobResult>,
    pub raw: serde_json::Value,
}

impl JobStatusSnapshot {
    pub fn unknown(raw: serde_json::Value) -> Self {
        Self {
            state: JobState::Unknown,
            shape: None,
            status: None,
            worker_id: None,
            delay_time: None,
            result: None,
            raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
