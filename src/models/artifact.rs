use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::fetcher::FetchError;

/// Bytes downloaded for one output variant.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub index: usize,
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-URL fetch result; one failed item never affects its siblings.
#[derive(Debug)]
pub struct FetchResult {
    pub index: usize,
    pub url: String,
    pub outcome: Result<FetchedArtifact, FetchError>,
}

/// A stored output variant with its time-limited access URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedArtifact {
    pub index: usize,
    pub source_url: String,
    pub storage_path: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub content_type: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStage {
    Fetch,
    Persist,
}

/// Record of a variant that could not be fetched or persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactFailure {
    pub index: usize,
    pub url: String,
    pub stage: ArtifactStage,
    pub message: String,
}
