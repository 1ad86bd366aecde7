use garde::Validate;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::io::Cursor;

use crate::models::job::{JobHandle, JobRequest};

/// Sends staging jobs to the processing service.
pub struct JobSubmitter {
    http: Client,
    base_url: String,
    api_token: String,
    min_dimension: u32,
}

impl JobSubmitter {
    pub fn new(http: Client, base_url: &str, api_token: &str, min_dimension: u32) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            min_dimension,
        }
    }

    /// Check everything that can be checked locally. Never touches the network.
    pub fn validate(&self, request: &JobRequest) -> Result<image::ImageFormat, ValidationError> {
        request.style.validate()?;

        if let Some(field) = request.style.missing_required_field() {
            return Err(ValidationError::MissingField {
                field,
                design_type: request.style.design_type.to_string(),
            });
        }

        let reader = image::ImageReader::new(Cursor::new(&request.source_image))
            .with_guessed_format()
            .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| ValidationError::UnreadableImage("unrecognized image format".to_string()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| ValidationError::UnreadableImage(e.to_string()))?;

        if width < self.min_dimension || height < self.min_dimension {
            return Err(ValidationError::ImageTooSmall {
                width,
                height,
                min: self.min_dimension,
            });
        }

        Ok(format)
    }

    /// Validate, then POST the image and style fields as one multipart request.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, SubmitError> {
        let format = self.validate(request)?;

        let extension = format.extensions_str().first().copied().unwrap_or("png");
        let image_part = Part::bytes(request.source_image.clone())
            .file_name(format!("{}.{}", request.base_name, extension))
            .mime_str(format.to_mime_type())?;

        let form = request
            .style
            .form_fields()
            .into_iter()
            .fold(Form::new().part("image", image_part), |form, (name, value)| {
                form.text(name, value)
            });

        let url = format!("{}/job", self.base_url);
        tracing::debug!(request_id = %request.request_id, url = %url, "Submitting staging job");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let job_id = parse_job_id(&body).ok_or(SubmitError::MalformedAck(body))?;
        tracing::info!(request_id = %request.request_id, job_id = %job_id, "Staging job accepted");

        Ok(JobHandle::new(job_id))
    }
}

/// Pull the job id out of an acknowledgment body (`job_id`, `id`, or `data.id`).
fn parse_job_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.get("job_id"),
        value.get("id"),
        value.get("data").and_then(|d| d.get("id")),
    ];
    let job_id = candidates.into_iter().flatten().find_map(|id| match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    job_id
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Source image is {width}x{height}, minimum is {min}x{min}")]
    ImageTooSmall { width: u32, height: u32, min: u32 },

    #[error("Source image could not be read: {0}")]
    UnreadableImage(String),

    #[error("Field `{field}` is required when design_type is {design_type}")]
    MissingField {
        field: &'static str,
        design_type: String,
    },

    #[error("Invalid style parameters: {0}")]
    InvalidParams(#[from] garde::Report),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Staging service rejected job with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Acknowledgment carried no job id: {0}")]
    MalformedAck(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::style::{DesignType, StyleParams};
    use image::{DynamicImage, ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn style() -> StyleParams {
        StyleParams {
            design_type: DesignType::Interior,
            ai_intervention: "Mid".to_string(),
            no_design: 1,
            design_style: "Modern".to_string(),
            room_type: Some("Bedroom".to_string()),
            custom_instruction: None,
        }
    }

    fn submitter() -> JobSubmitter {
        JobSubmitter::new(Client::new(), "http://127.0.0.1:9/", "token", 512)
    }

    #[test]
    fn test_accepts_minimum_size() {
        let request = JobRequest::new("t", png(512, 512), style(), "staged", "room");
        assert_eq!(submitter().validate(&request).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_rejects_narrow_or_short_images() {
        for (w, h) in [(511, 800), (800, 511), (64, 64)] {
            let request = JobRequest::new("t", png(w, h), style(), "staged", "room");
            let err = submitter().validate(&request).unwrap_err();
            assert!(
                matches!(err, ValidationError::ImageTooSmall { width, height, min: 512 } if width == w && height == h),
                "{w}x{h}: {err}"
            );
        }
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let request = JobRequest::new("t", b"not an image".to_vec(), style(), "staged", "room");
        assert!(matches!(
            submitter().validate(&request),
            Err(ValidationError::UnreadableImage(_))
        ));
    }

    #[test]
    fn test_interior_without_room_type() {
        let mut params = style();
        params.room_type = None;
        let request = JobRequest::new("t", png(600, 600), params, "staged", "room");
        let err = submitter().validate(&request).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "room_type", .. }));
    }

    #[test]
    fn test_parse_job_id_variants() {
        assert_eq!(parse_job_id(r#"{"job_id":"abc"}"#).as_deref(), Some("abc"));
        assert_eq!(parse_job_id(r#"{"id":42}"#).as_deref(), Some("42"));
        assert_eq!(parse_job_id(r#"{"data":{"id":"q-1"}}"#).as_deref(), Some("q-1"));
        assert_eq!(parse_job_id(r#"{"job_id":""}"#), None);
        assert_eq!(parse_job_id("accepted"), None);
    }

    #[test]
    fn test_parse_job_id_falls_through_empty_candidates() {
        assert_eq!(parse_job_id(r#"{"job_id":"","id":"fallback"}"#).as_deref(), Some("fallback"));
        assert_eq!(parse_job_id(r#"{"job_id":null,"data":{"id":7}}"#).as_deref(), Some("7"));
    }
}
