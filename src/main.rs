use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use twin_staging::{
    app_state::AppState,
    config::AppConfig,
    models::{job::JobRequest, style::StyleParams},
    services::storage::R2Client,
};

/// JSON file describing one staging run.
#[derive(Debug, Deserialize)]
struct StageCommand {
    tenant_id: String,
    #[serde(default)]
    directory: String,
    base_name: String,
    style: StyleParams,
    /// Local source image.
    image_path: Option<PathBuf>,
    /// Source image already stored in the bucket.
    image_key: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let Some(command_path) = std::env::args().nth(1) else {
        eprintln!("usage: twin-staging <request.json>");
        std::process::exit(2);
    };

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr.parse().expect("METRICS_ADDR is not a socket address");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    metrics::describe_counter!("staging_jobs_total", "Staging jobs started");
    metrics::describe_counter!("staging_jobs_completed", "Staging jobs that reached success");
    metrics::describe_counter!("staging_jobs_failed", "Staging jobs that failed, by kind");
    metrics::describe_counter!("staging_artifacts_failed", "Variants lost to fetch or persist errors");
    metrics::describe_histogram!("staging_poll_attempts", "Status requests issued per job");
    metrics::describe_histogram!("staging_job_duration_seconds", "Wall time of a staging job");

    let command: StageCommand = {
        let raw = std::fs::read_to_string(&command_path).expect("Failed to read request file");
        serde_json::from_str(&raw).expect("Failed to parse request file")
    };

    // Initialize R2 storage client
    tracing::info!("Initializing R2 storage client");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    let orchestrator_config = config.orchestrator_config();
    let state = AppState::new(&orchestrator_config, r2_client).expect("Failed to build HTTP clients");

    let source_image = match (&command.image_path, &command.image_key) {
        (Some(path), _) => std::fs::read(path).expect("Failed to read source image"),
        (None, Some(key)) => state
            .storage
            .download(key)
            .await
            .expect("Failed to download source image"),
        (None, None) => {
            eprintln!("request file must set image_path or image_key");
            std::process::exit(2);
        }
    };

    let request = JobRequest::new(
        command.tenant_id,
        source_image,
        command.style,
        command.directory,
        command.base_name,
    );

    tracing::info!(
        request_id = %request.request_id,
        poll_interval_ms = orchestrator_config.poll.interval.as_millis() as u64,
        max_attempts = orchestrator_config.poll.max_attempts,
        horizon_secs = orchestrator_config.poll.horizon().as_secs(),
        "Running staging job"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling job");
            on_signal.cancel();
        }
    });

    let outcome = state.orchestrator.run_with_cancel(&request, cancel).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).expect("Outcome is always serializable")
    );

    if !outcome.success {
        std::process::exit(1);
    }
}
