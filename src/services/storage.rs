use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use std::time::Duration;

/// Object storage the pipeline writes artifacts into.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `{tenant_id}/{directory}/{filename}` and return that path.
    async fn upload(
        &self,
        tenant_id: &str,
        directory: &str,
        filename: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Mint a read URL for `path` that stops working after `ttl`. Stores may
    /// shorten the lifetime; the returned value carries the one actually signed.
    async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<PresignedUrl, StorageError>;

    /// Remove the object at `path`.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// A minted read URL and the lifetime it was signed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: Duration,
}

/// Longest lifetime S3 accepts for a presigned GET.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Clamp a requested lifetime to what S3 will sign, in whole seconds.
pub fn clamp_presign_ttl(ttl: Duration) -> Duration {
    Duration::from_secs(ttl.as_secs().clamp(1, MAX_PRESIGN_TTL.as_secs()))
}

/// Build the object key for a tenant-scoped file.
pub fn object_path(tenant_id: &str, directory: &str, filename: &str) -> String {
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        format!("{}/{}", tenant_id, filename)
    } else {
        format!("{}/{}/{}", tenant_id, directory, filename)
    }
}

/// Client for Cloudflare R2 object storage (S3-compatible).
pub struct R2Client {
    bucket: Box<Bucket>,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Download an object by key (used for source images kept in the tenant's store).
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await?;
        Ok(response.to_vec())
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn upload(
        &self,
        tenant_id: &str,
        directory: &str,
        filename: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let path = object_path(tenant_id, directory, filename);
        let response = self
            .bucket
            .put_object_with_content_type(&path, data, content_type)
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected(status));
        }
        Ok(path)
    }

    async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<PresignedUrl, StorageError> {
        let expires_in = clamp_presign_ttl(ttl);
        if expires_in != ttl {
            tracing::warn!(
                requested_secs = ttl.as_secs(),
                signed_secs = expires_in.as_secs(),
                "Presign lifetime clamped"
            );
        }
        let url = self
            .bucket
            .presign_get(path, expires_in.as_secs() as u32, None)
            .await?;
        Ok(PresignedUrl { url, expires_in })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(path).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage rejected write with HTTP {0}")]
    Rejected(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_is_tenant_scoped() {
        assert_eq!(
            object_path("tenant-1", "staging/room-4", "sofa.png"),
            "tenant-1/staging/room-4/sofa.png"
        );
        assert_eq!(object_path("tenant-1", "/staging/", "sofa.png"), "tenant-1/staging/sofa.png");
        assert_eq!(object_path("tenant-1", "", "sofa.png"), "tenant-1/sofa.png");
    }

    #[test]
    fn test_presign_ttl_clamped_to_s3_limits() {
        assert_eq!(clamp_presign_ttl(Duration::from_secs(86_400)), Duration::from_secs(86_400));
        assert_eq!(clamp_presign_ttl(Duration::from_secs(30 * 86_400)), MAX_PRESIGN_TTL);
        assert_eq!(clamp_presign_ttl(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(clamp_presign_ttl(Duration::from_millis(2_500)), Duration::from_secs(2));
    }
}
