use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::models::job::{JobHandle, JobResult, JobState, JobStatusSnapshot};
use crate::services::schema;

/// Longest slice of an unrecognized body written to the log.
const LOG_BODY_LIMIT: usize = 512;

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    Succeeded {
        result: JobResult,
        attempts: u32,
    },
    Failed {
        snapshot: JobStatusSnapshot,
        attempts: u32,
    },
    /// Budget exhausted without a terminal snapshot. The job may still finish remotely.
    TimedOut {
        attempts: u32,
        last: Option<JobStatusSnapshot>,
    },
}

/// Drives `GET /job/{id}/status` until a terminal state or the attempt budget runs out.
pub struct StatusPoller {
    http: Client,
    base_url: String,
    api_token: String,
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(http: Client, base_url: &str, api_token: &str, config: PollConfig) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            config,
        }
    }

    fn status_url(&self, handle: &JobHandle) -> String {
        format!("{}/job/{}/status", self.base_url, handle.job_id())
    }

    /// Poll strictly sequentially; no request is issued after a terminal snapshot.
    pub async fn poll_to_terminal(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let url = self.status_url(handle);
        let mut last = None;

        for attempt in 1..=self.config.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled { attempts: attempt - 1 }),
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled { attempts: attempt - 1 }),
                fetched = self.fetch_snapshot(&url, handle, attempt) => fetched,
            };
            // Unreachable service: already logged, the tick still counts.
            let Some(mut snapshot) = fetched else {
                continue;
            };

            tracing::debug!(
                job_id = %handle.job_id(),
                attempt,
                state = ?snapshot.state,
                shape = ?snapshot.shape,
                worker_id = ?snapshot.worker_id,
                "Polled job status"
            );

            match snapshot.state {
                JobState::Succeeded => {
                    if let Some(result) = snapshot.result.take() {
                        tracing::info!(
                            job_id = %handle.job_id(),
                            attempt,
                            outputs = result.output_urls.len(),
                            "Staging job succeeded"
                        );
                        return Ok(PollOutcome::Succeeded { result, attempts: attempt });
                    }
                    last = Some(snapshot);
                }
                JobState::Failed => {
                    tracing::warn!(
                        job_id = %handle.job_id(),
                        attempt,
                        status = ?snapshot.status,
                        "Staging job failed remotely"
                    );
                    return Ok(PollOutcome::Failed { snapshot, attempts: attempt });
                }
                JobState::Unknown => {
                    tracing::warn!(
                        job_id = %handle.job_id(),
                        attempt,
                        body = %truncate(&snapshot.raw.to_string(), LOG_BODY_LIMIT),
                        "Unrecognized status payload, continuing to poll"
                    );
                    last = Some(snapshot);
                }
                JobState::Queued | JobState::Running => last = Some(snapshot),
            }
        }

        tracing::warn!(
            job_id = %handle.job_id(),
            attempts = self.config.max_attempts,
            horizon_secs = self.config.horizon().as_secs(),
            since_submit_secs = (chrono::Utc::now() - handle.submitted_at()).num_seconds(),
            "Poll budget exhausted without a terminal status"
        );
        Ok(PollOutcome::TimedOut {
            attempts: self.config.max_attempts,
            last,
        })
    }

    /// One status request. `None` when no response body arrived; HTTP error codes
    /// become `Unknown` so the loop keeps going.
    async fn fetch_snapshot(&self, url: &str, handle: &JobHandle, attempt: u32) -> Option<JobStatusSnapshot> {
        let response = match self.http.get(url).bearer_auth(&self.api_token).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(job_id = %handle.job_id(), attempt, error = %e, "Status request failed");
                return None;
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(job_id = %handle.job_id(), attempt, error = %e, "Status body unreadable");
                return None;
            }
        };

        if !status.is_success() {
            tracing::warn!(
                job_id = %handle.job_id(),
                attempt,
                status = status.as_u16(),
                "Status endpoint returned an error code"
            );
            return Some(JobStatusSnapshot::unknown(serde_json::Value::String(body)));
        }

        Some(schema::resolve(&body))
    }
}

fn truncate(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}
