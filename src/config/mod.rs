use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Base URL of the staging service (e.g., "https://api.example.com/v1")
    pub staging_api_url: String,

    /// Bearer token for job submission and status calls
    pub staging_api_token: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// Delay before each status request, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Status requests allowed before the job is reported as timed out
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Lifetime of minted artifact URLs, in seconds
    #[serde(default = "default_artifact_url_ttl_secs")]
    pub artifact_url_ttl_secs: u64,

    /// Minimum accepted width and height of the source image
    #[serde(default = "default_min_image_dimension")]
    pub min_image_dimension: u32,

    /// Per-request timeout for outbound HTTP
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Prometheus scrape listener (e.g., "0.0.0.0:9000"). Disabled when unset.
    pub metrics_addr: Option<String>,
}

// 60 attempts x 2s gives a ~2 minute horizon.
fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_artifact_url_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_min_image_dimension() -> u32 {
    512
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            api_base_url: self.staging_api_url.trim_end_matches('/').to_string(),
            api_token: self.staging_api_token.clone(),
            poll: PollConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.max_poll_attempts,
            },
            url_ttl: Duration::from_secs(self.artifact_url_ttl_secs),
            min_image_dimension: self.min_image_dimension,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }
}

/// Poll loop bounds.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollConfig {
    /// Longest time the loop can wait before reporting a timeout, ignoring request latency.
    pub fn horizon(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Everything the orchestrator needs, with no literals left in the pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub api_base_url: String,
    pub api_token: String,
    pub poll: PollConfig,
    pub url_ttl: Duration,
    pub min_image_dimension: u32,
    pub http_timeout: Duration,
}
