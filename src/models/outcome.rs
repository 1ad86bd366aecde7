use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use uuid::Uuid;

use crate::models::artifact::{ArtifactFailure, PersistedArtifact};

/// Classification of a whole-job failure.
#[derive(Debug, Clone, Copy, Serialize, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Submission,
    RemoteFailure,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationError {
    pub kind: ErrorKind,
    pub message: String,
    /// Last status payload, kept for diagnostics on remote failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Aggregate result of one orchestration run. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationOutcome {
    pub request_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub artifacts: Vec<PersistedArtifact>,
    pub requested_count: usize,
    pub persisted_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ArtifactFailure>,
    pub timed_out: bool,
    pub poll_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OrchestrationError>,
}

impl OrchestrationOutcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
