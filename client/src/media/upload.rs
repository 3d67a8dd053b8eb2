//! Unsigned image upload to the media host.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::MediaError;
use crate::error::{ClientError, Result};

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Accepted MIME types.
pub const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// An image held in memory, ready to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    /// Load a file from disk, inferring the MIME type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content_type = mime_from_extension(path)
            .ok_or_else(|| {
                MediaError::UnsupportedType(
                    path.extension()
                        .map(|e| e.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "unknown".to_string()),
                )
            })?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Size and type checks, run before anything is sent.
    pub fn validate(&self) -> std::result::Result<(), MediaError> {
        let content_type = self.content_type.to_ascii_lowercase();
        if !ALLOWED_TYPES.contains(&content_type.as_str()) {
            return Err(MediaError::UnsupportedType(self.content_type.clone()));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::FileTooLarge {
                size: self.bytes.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        Ok(())
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    error: UploadErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UploadErrorDetail {
    message: String,
}

/// Upload settings
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    pub folder: String,
}

/// Uploads images with a pre-configured unsigned preset.
#[derive(Debug, Clone)]
pub struct MediaUploader {
    http: reqwest::Client,
    config: UploadConfig,
    api_base: String,
}

impl MediaUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self::with_api_base(config, DEFAULT_API_BASE)
    }

    /// Point the uploader at a different API root.
    pub fn with_api_base(config: UploadConfig, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}/image/upload", self.api_base, self.config.cloud_name)
    }

    /// Validate and upload `image`.
    pub async fn upload(&self, image: ImageFile) -> Result<UploadedImage> {
        image.validate()?;

        let size = image.bytes.len();
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", self.config.folder.clone());

        tracing::info!(file = %image.file_name, size, "Uploading image");
        let resp = self.http.post(self.endpoint()).multipart(form).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<UploadErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown").to_string());
            tracing::warn!(status = status.as_u16(), %message, "Image upload rejected");
            return Err(MediaError::UploadFailed {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        serde_json::from_str::<UploadedImage>(&body).map_err(|e| {
            tracing::warn!(error = %e, "Upload response missing secure_url/public_id");
            ClientError::from(MediaError::MalformedResponse)
        })
    }
}
