//! Media host integration: delivery URLs and uploads.

use thiserror::Error;

pub mod optimizer;
pub mod upload;

pub use optimizer::{ImageSize, MediaUrlOptimizer, SizeHint, DEFAULT_THUMBNAIL_SIZE};
pub use upload::{ImageFile, MediaUploader, UploadConfig, UploadedImage};

/// Media error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("File is too large ({size} bytes, max {max})")]
    FileTooLarge { size: usize, max: usize },
    #[error("Unsupported image type: {0} (use JPEG, PNG or WebP)")]
    UnsupportedType(String),
    #[error("Image upload failed ({status}): {message}")]
    UploadFailed { status: u16, message: String },
    #[error("Image upload returned an unexpected response")]
    MalformedResponse,
}
