use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::models::artifact::{FetchedArtifact, PersistedArtifact};
use crate::services::storage::{ObjectStore, StorageError};

/// Writes variants to the object store and mints their access URLs.
pub struct ArtifactPersister {
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

/// Where a batch of variants should land.
#[derive(Debug, Clone, Copy)]
pub struct PersistTarget<'a> {
    pub tenant_id: &'a str,
    pub directory: &'a str,
    pub base_name: &'a str,
}

impl ArtifactPersister {
    pub fn new(store: Arc<dyn ObjectStore>, url_ttl: Duration) -> Self {
        Self { store, url_ttl }
    }

    /// Persist one variant. `artifact.index` is the sequence index used in the filename.
    pub async fn persist(
        &self,
        artifact: &FetchedArtifact,
        target: PersistTarget<'_>,
    ) -> Result<PersistedArtifact, PersistError> {
        let (extension, content_type) =
            detect_format(&artifact.bytes, artifact.content_type.as_deref());
        let filename = artifact_filename(target.base_name, Utc::now(), artifact.index, extension);

        let storage_path = self
            .store
            .upload(
                target.tenant_id,
                target.directory,
                &filename,
                &artifact.bytes,
                &content_type,
            )
            .await?;

        let (url, expires_at) = match self.mint_url(&storage_path).await {
            Ok(minted) => minted,
            Err(e) => {
                // No URL means nothing will ever reference the object.
                if let Err(cleanup) = self.store.delete(&storage_path).await {
                    tracing::warn!(path = %storage_path, error = %cleanup, "Orphaned artifact cleanup failed");
                }
                return Err(e);
            }
        };

        tracing::debug!(index = artifact.index, path = %storage_path, "Artifact persisted");

        Ok(PersistedArtifact {
            index: artifact.index,
            source_url: artifact.url.clone(),
            storage_path,
            url,
            expires_at,
            content_type,
            size_bytes: artifact.bytes.len(),
        })
    }

    /// Presign `path`; expiry follows the lifetime the store actually signed.
    async fn mint_url(&self, path: &str) -> Result<(String, DateTime<Utc>), PersistError> {
        let issued_at = Utc::now();
        let presigned = self.store.presigned_url(path, self.url_ttl).await?;
        let lifetime = chrono::Duration::from_std(presigned.expires_in)
            .map_err(|_| PersistError::TtlOutOfRange)?;
        Ok((presigned.url, issued_at + lifetime))
    }

    /// Persist every artifact; one failed write never blocks the rest.
    pub async fn persist_all(
        &self,
        artifacts: &[FetchedArtifact],
        target: PersistTarget<'_>,
    ) -> Vec<(usize, Result<PersistedArtifact, PersistError>)> {
        let writes = artifacts.iter().map(|artifact| async move {
            let result = self.persist(artifact, target).await;
            if let Err(e) = &result {
                tracing::warn!(index = artifact.index, error = %e, "Artifact persist failed");
            }
            (artifact.index, result)
        });
        join_all(writes).await
    }
}

/// `{base}_{timestamp}_{index}.{ext}`; millisecond timestamp plus index keeps names unique per run.
pub fn artifact_filename(base_name: &str, at: DateTime<Utc>, index: usize, extension: &str) -> String {
    let base: String = base_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let base = if base.is_empty() { "variant".to_string() } else { base };
    format!("{}_{}_{}.{}", base, at.format("%Y%m%dT%H%M%S%3fZ"), index, extension)
}

/// Sniff the image format, then fall back to the declared content type, then PNG.
fn detect_format(bytes: &[u8], declared: Option<&str>) -> (&'static str, String) {
    if let Ok(format) = image::guess_format(bytes) {
        let extension = format.extensions_str().first().copied().unwrap_or("png");
        return (extension, format.to_mime_type().to_string());
    }
    match declared.and_then(|mime| image::ImageFormat::from_mime_type(mime)) {
        Some(format) => (
            format.extensions_str().first().copied().unwrap_or("png"),
            format.to_mime_type().to_string(),
        ),
        None => ("png", "image/png".to_string()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Storage write failed: {0}")]
    Storage(#[from] StorageError),

    #[error("URL lifetime does not fit a timestamp")]
    TtlOutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{clamp_presign_ttl, PresignedUrl};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Signs with the same lifetime cap as R2; optionally refuses to sign at all.
    #[derive(Default)]
    struct CappedStore {
        refuse_presign: bool,
        objects: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for CappedStore {
        async fn upload(
            &self,
            tenant_id: &str,
            directory: &str,
            filename: &str,
            _data: &[u8],
            _content_type: &str,
        ) -> Result<String, StorageError> {
            let path = crate::services::storage::object_path(tenant_id, directory, filename);
            self.objects.lock().push(path.clone());
            Ok(path)
        }

        async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<PresignedUrl, StorageError> {
            if self.refuse_presign {
                return Err(StorageError::Config("no signing key".to_string()));
            }
            Ok(PresignedUrl {
                url: format!("https://r2.test/{}", path),
                expires_in: clamp_presign_ttl(ttl),
            })
        }

        async fn delete(&self, path: &str) -> Result<(), StorageError> {
            self.objects.lock().retain(|p| p != path);
            Ok(())
        }
    }

    fn fetched() -> FetchedArtifact {
        FetchedArtifact {
            index: 0,
            url: "https://cdn.test/a.png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            content_type: Some("image/png".to_string()),
        }
    }

    const TARGET: PersistTarget<'static> = PersistTarget {
        tenant_id: "t",
        directory: "staged",
        base_name: "room",
    };

    #[tokio::test]
    async fn test_expiry_follows_clamped_lifetime() {
        let store = Arc::new(CappedStore::default());
        let persister = ArtifactPersister::new(store.clone(), Duration::from_secs(30 * 24 * 60 * 60));

        let before = Utc::now();
        let persisted = persister.persist(&fetched(), TARGET).await.unwrap();

        assert!(persisted.expires_at <= Utc::now() + chrono::Duration::days(7));
        assert!(persisted.expires_at >= before + chrono::Duration::days(7) - chrono::Duration::minutes(1));
        assert_eq!(store.objects.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_presign_failure_deletes_upload() {
        let store = Arc::new(CappedStore {
            refuse_presign: true,
            ..CappedStore::default()
        });
        let persister = ArtifactPersister::new(store.clone(), Duration::from_secs(86_400));

        let err = persister.persist(&fetched(), TARGET).await.unwrap_err();
        assert!(matches!(err, PersistError::Storage(StorageError::Config(_))));
        assert!(store.objects.lock().is_empty());
    }

    #[test]
    fn test_filename_contains_base_timestamp_and_index() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            artifact_filename("living room", at, 2, "jpg"),
            "living_room_20260314T092653000Z_2.jpg"
        );
    }

    #[test]
    fn test_filename_differs_by_index() {
        let at = Utc::now();
        assert_ne!(
            artifact_filename("room", at, 0, "png"),
            artifact_filename("room", at, 1, "png")
        );
        assert!(artifact_filename("", at, 0, "png").starts_with("variant_"));
    }

    #[test]
    fn test_detect_format_prefers_sniffed_bytes() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(detect_format(&png_magic, Some("image/jpeg")), ("png", "image/png".to_string()));
        assert_eq!(detect_format(b"????", Some("image/jpeg")), ("jpg", "image/jpeg".to_string()));
        assert_eq!(detect_format(b"????", None), ("png", "image/png".to_string()));
    }
}
