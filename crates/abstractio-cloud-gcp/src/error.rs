//! GCP client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GCP API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Static address {name} not available: {reason}")]
    AddressUnavailable { name: String, reason: String },

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] abstractio_cloud::CloudError),
}

impl GcpError {
    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            GcpError::Api { status, .. } => Some(*status),
            GcpError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, GcpError>;
