use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

use crate::models::artifact::{FetchResult, FetchedArtifact};

/// Downloads generated variants.
///
/// Result URLs are pre-signed, so this client is built without any default
/// headers and never carries the submission bearer token.
pub struct ArtifactFetcher {
    http: Client,
}

impl ArtifactFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Fetch every URL independently; results come back in input order.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchResult> {
        let fetches = urls.iter().enumerate().map(|(index, url)| async move {
            let outcome = self.fetch(index, url).await;
            if let Err(e) = &outcome {
                tracing::warn!(index, url = %url, error = %e, "Artifact fetch failed");
            }
            FetchResult {
                index,
                url: url.clone(),
                outcome,
            }
        });
        join_all(fetches).await
    }

    /// Plain unauthenticated GET.
    pub async fn fetch(&self, index: usize, url: &str) -> Result<FetchedArtifact, FetchError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(FetchedArtifact {
            index,
            url: url.to_string(),
            content_type,
            bytes,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Artifact download returned HTTP {0}")]
    Status(u16),

    #[error("Artifact download returned an empty body")]
    Empty,
}
