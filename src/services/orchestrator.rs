use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::models::artifact::{ArtifactFailure, ArtifactStage, FetchedArtifact};
use crate::models::job::JobRequest;
use crate::models::outcome::{ErrorKind, OrchestrationError, OrchestrationOutcome};
use crate::services::fetcher::{ArtifactFetcher, FetchError};
use crate::services::persister::{ArtifactPersister, PersistTarget};
use crate::services::poller::{PollError, PollOutcome, StatusPoller};
use crate::services::storage::ObjectStore;
use crate::services::submitter::{JobSubmitter, SubmitError};

/// Runs one staging job end to end: submit, poll, fetch, persist.
pub struct JobOrchestrator {
    submitter: JobSubmitter,
    poller: StatusPoller,
    fetcher: ArtifactFetcher,
    persister: ArtifactPersister,
}

impl JobOrchestrator {
    /// Build the long-lived HTTP clients once. The API client and the artifact
    /// client are separate so the bearer token never reaches result URLs.
    pub fn new(config: &OrchestratorConfig, store: Arc<dyn ObjectStore>) -> Result<Self, reqwest::Error> {
        let api_http = Client::builder().timeout(config.http_timeout).build()?;
        let artifact_http = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self::from_parts(config, api_http, artifact_http, store))
    }

    pub fn from_parts(
        config: &OrchestratorConfig,
        api_http: Client,
        artifact_http: Client,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            submitter: JobSubmitter::new(
                api_http.clone(),
                &config.api_base_url,
                &config.api_token,
                config.min_image_dimension,
            ),
            poller: StatusPoller::new(api_http, &config.api_base_url, &config.api_token, config.poll),
            fetcher: ArtifactFetcher::with_client(artifact_http),
            persister: ArtifactPersister::new(store, config.url_ttl),
        }
    }

    pub async fn run(&self, request: &JobRequest) -> OrchestrationOutcome {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops polling as soon as `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        request: &JobRequest,
        cancel: CancellationToken,
    ) -> OrchestrationOutcome {
        let started = Instant::now();
        let mut outcome = OrchestrationOutcome {
            request_id: request.request_id,
            success: false,
            job_id: None,
            artifacts: Vec::new(),
            requested_count: 0,
            persisted_count: 0,
            failed_count: 0,
            failures: Vec::new(),
            timed_out: false,
            poll_attempts: 0,
            started_at: Utc::now(),
            elapsed_ms: 0,
            error: None,
        };

        metrics::counter!("staging_jobs_total").increment(1);
        tracing::info!(
            request_id = %request.request_id,
            tenant_id = %request.tenant_id,
            design_type = %request.style.design_type,
            "Starting staging job"
        );

        let handle = match self.submitter.submit(request).await {
            Ok(handle) => handle,
            Err(e) => {
                let kind = match &e {
                    SubmitError::Validation(_) => ErrorKind::Validation,
                    _ => ErrorKind::Submission,
                };
                return finish_failed(outcome, started, kind, e.to_string(), None);
            }
        };
        outcome.job_id = Some(handle.job_id().to_string());

        let result = match self.poller.poll_to_terminal(&handle, &cancel).await {
            Ok(PollOutcome::Succeeded { result, attempts }) => {
                outcome.poll_attempts = attempts;
                result
            }
            Ok(PollOutcome::Failed { snapshot, attempts }) => {
                outcome.poll_attempts = attempts;
                let message = match &snapshot.status {
                    Some(status) => format!("Remote job reported status {status}"),
                    None => "Remote job reported failure".to_string(),
                };
                return finish_failed(outcome, started, ErrorKind::RemoteFailure, message, Some(snapshot.raw));
            }
            Ok(PollOutcome::TimedOut { attempts, last }) => {
                outcome.poll_attempts = attempts;
                outcome.timed_out = true;
                let message = format!("No terminal status after {attempts} poll attempts");
                return finish_failed(outcome, started, ErrorKind::TimedOut, message, last.map(|s| s.raw));
            }
            Err(PollError::Cancelled { attempts }) => {
                outcome.poll_attempts = attempts;
                let message = format!("Cancelled after {attempts} poll attempts");
                return finish_failed(outcome, started, ErrorKind::Cancelled, message, None);
            }
        };

        outcome.requested_count = result.output_urls.len();

        let mut fetched: Vec<FetchedArtifact> = Vec::with_capacity(result.output_urls.len());
        for item in self.fetcher.fetch_all(&result.output_urls).await {
            match item.outcome {
                Ok(artifact) => fetched.push(artifact),
                Err(e) => outcome.failures.push(failure(item.index, &item.url, ArtifactStage::Fetch, &e)),
            }
        }

        let target = PersistTarget {
            tenant_id: &request.tenant_id,
            directory: &request.directory,
            base_name: &request.base_name,
        };
        for (index, persisted) in self.persister.persist_all(&fetched, target).await {
            match persisted {
                Ok(artifact) => outcome.artifacts.push(artifact),
                Err(e) => {
                    let url = source_url(&fetched, index);
                    outcome.failures.push(ArtifactFailure {
                        index,
                        url,
                        stage: ArtifactStage::Persist,
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome.artifacts.sort_by_key(|a| a.index);
        outcome.failures.sort_by_key(|f| f.index);
        outcome.persisted_count = outcome.artifacts.len();
        outcome.failed_count = outcome.failures.len();
        outcome.success = true;
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        metrics::counter!("staging_jobs_completed").increment(1);
        metrics::counter!("staging_artifacts_failed").increment(outcome.failed_count as u64);
        metrics::histogram!("staging_poll_attempts").record(outcome.poll_attempts as f64);
        metrics::histogram!("staging_job_duration_seconds").record(started.elapsed().as_secs_f64());

        tracing::info!(
            request_id = %request.request_id,
            job_id = %handle.job_id(),
            requested = outcome.requested_count,
            persisted = outcome.persisted_count,
            failed = outcome.failed_count,
            elapsed_ms = outcome.elapsed_ms,
            "Staging job completed"
        );

        outcome
    }
}

fn failure(index: usize, url: &str, stage: ArtifactStage, error: &FetchError) -> ArtifactFailure {
    ArtifactFailure {
        index,
        url: url.to_string(),
        stage,
        message: error.to_string(),
    }
}

fn source_url(fetched: &[FetchedArtifact], index: usize) -> String {
    fetched
        .iter()
        .find(|a| a.index == index)
        .map(|a| a.url.clone())
        .unwrap_or_default()
}

fn finish_failed(
    mut outcome: OrchestrationOutcome,
    started: Instant,
    kind: ErrorKind,
    message: String,
    payload: Option<serde_json::Value>,
) -> OrchestrationOutcome {
    outcome.elapsed_ms = started.elapsed().as_millis() as u64;

    metrics::counter!("staging_jobs_failed", "kind" => kind.to_string()).increment(1);
    metrics::histogram!("staging_job_duration_seconds").record(started.elapsed().as_secs_f64());
    tracing::error!(
        request_id = %outcome.request_id,
        job_id = ?outcome.job_id,
        kind = %kind,
        attempts = outcome.poll_attempts,
        error = %message,
        "Staging job failed"
    );

    outcome.error = Some(OrchestrationError { kind, message, payload });
    outcome
}
