//! Cloud operation error types

use thiserror::Error;

/// Errors raised by record handling, collaborators and polling
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Malformed record: field '{field}' {reason}")]
    MalformedRecord { field: String, reason: String },

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("No records found: {0}")]
    ListNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Conditional update rejected: {0}")]
    ConditionFailed(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Message delivery failed: {0}")]
    Delivery(String),

    #[error("Resource {resource} failed: {reason} (last status: {last_status})")]
    TerminalFailure {
        resource: String,
        reason: String,
        last_status: String,
    },

    #[error("Resource {resource} unreachable after {attempts} attempts: {error}")]
    Transient {
        resource: String,
        error: String,
        attempts: u32,
    },

    #[error("Polling of {resource} cancelled after {attempts} attempts")]
    Cancelled { resource: String, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::MalformedRecord {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the expected "record does not exist" condition
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CloudError::ClusterNotFound(_)
                | CloudError::ListNotFound(_)
                | CloudError::SecretNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
