//! Shared fixtures for pipeline tests

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use twin_staging::config::{OrchestratorConfig, PollConfig};
use twin_staging::models::job::JobRequest;
use twin_staging::models::style::{DesignType, StyleParams};
use twin_staging::services::orchestrator::JobOrchestrator;
use twin_staging::services::storage::{object_path, ObjectStore, PresignedUrl, StorageError};

pub const TOKEN: &str = "test-token";

/// In-memory object store that records every write.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    /// Filenames containing this marker are rejected.
    reject_marker: Option<String>,
    /// When set, every presign request fails after the upload succeeded.
    fail_presign: bool,
    deleted: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn rejecting(marker: &str) -> Self {
        Self {
            reject_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_presign() -> Self {
        Self {
            fail_presign: true,
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.lock().get(path).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        tenant_id: &str,
        directory: &str,
        filename: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(marker) = &self.reject_marker {
            if filename.contains(marker.as_str()) {
                return Err(StorageError::Rejected(500));
            }
        }
        let path = object_path(tenant_id, directory, filename);
        self.objects
            .lock()
            .insert(path.clone(), (data.to_vec(), content_type.to_string()));
        Ok(path)
    }

    async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<PresignedUrl, StorageError> {
        if self.fail_presign {
            return Err(StorageError::Config("signing key unavailable".to_string()));
        }
        Ok(PresignedUrl {
            url: format!("memory://{}?expires_in={}", path, ttl.as_secs()),
            expires_in: ttl,
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects.lock().remove(path);
        self.deleted.lock().push(path.to_string());
        Ok(())
    }
}

/// Encode a blank PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn interior_style() -> StyleParams {
    StyleParams {
        design_type: DesignType::Interior,
        ai_intervention: "Mid".to_string(),
        no_design: 2,
        design_style: "Scandinavian".to_string(),
        room_type: Some("Living Room".to_string()),
        custom_instruction: Some("Keep the fireplace".to_string()),
    }
}

pub fn request(image: Vec<u8>, style: StyleParams) -> JobRequest {
    JobRequest::new("tenant-42", image, style, "staging/unit-7", "living room")
}

pub fn config(base_url: &str, max_attempts: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        api_base_url: base_url.to_string(),
        api_token: TOKEN.to_string(),
        poll: PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        },
        url_ttl: Duration::from_secs(24 * 60 * 60),
        min_image_dimension: 512,
        http_timeout: Duration::from_secs(5),
    }
}

pub fn orchestrator(base_url: &str, max_attempts: u32, store: Arc<MemoryStore>) -> JobOrchestrator {
    JobOrchestrator::new(&config(base_url, max_attempts), store).expect("build orchestrator")
}
