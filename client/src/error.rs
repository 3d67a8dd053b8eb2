//! Error types for the DigiMart client core.

use thiserror::Error;

use crate::media::MediaError;
use crate::quota::QuotaError;
use crate::stock::StockError;

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Session expired or not authenticated")]
    Unauthorized,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// The backend answered with something that is not JSON (usually an HTML error page).
    #[error("Unexpected response from backend: {0}")]
    UnexpectedResponse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Credential store error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether re-authenticating would resolve this error.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// Whether the error was detected locally, before anything reached the backend.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::Quota(_)
                | ClientError::Stock(_)
                | ClientError::Media(MediaError::FileTooLarge { .. })
                | ClientError::Media(MediaError::UnsupportedType(_))
        )
    }

    /// Short message suitable for a dismissible banner.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http(_) => "Could not reach the server. Please try again.".to_string(),
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Unauthorized => "Please log in again.".to_string(),
            ClientError::Forbidden(_) => "You do not have access to this page.".to_string(),
            ClientError::UnexpectedResponse(_) => {
                "The server returned an unexpected response.".to_string()
            }
            ClientError::Storage(_) | ClientError::Io(_) | ClientError::Json(_) => {
                "Something went wrong on this device.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field} {detail}")
            })
            .collect();
        fields.sort();
        ClientError::Validation(fields.join(", "))
    }
}
