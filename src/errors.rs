use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse classification of a [`ServiceError`], used by callers to decide
/// between inline form feedback and a dismissible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input, fulfilment conflict or gated action. Resolved locally.
    Local,
    /// The gateway call failed. The operation is considered not applied.
    Persistence,
    /// The referenced document or line vanished, typically a stale read.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn document_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Document {} not found", id))
    }

    pub fn line_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Line item {} not found", id))
    }

    /// Convenience constructor for wrapping store-level failures.
    pub fn persistence(message: impl Into<String>) -> Self {
        ServiceError::PersistenceError(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError(_) | Self::Conflict(_) | Self::InvalidOperation(_) => {
                ErrorCategory::Local
            }
            Self::PersistenceError(_) | Self::Cancelled(_) => ErrorCategory::Persistence,
            Self::NotFound(_) => ErrorCategory::NotFound,
        }
    }

    /// Whether the caller must re-fetch the document before trusting any
    /// local state. Local errors leave state untouched, so no resync is needed.
    pub fn requires_resync(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Local)
    }
}
