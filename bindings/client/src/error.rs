use std::time::Duration;

use crate::resource::ResourceKind;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("{kind} `{id}` was not found")]
    NotFound { kind: ResourceKind, id: String },
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Authentication failed for user `{username}` in tenant `{tenant_name}`")]
    Unauthorized {
        username: String,
        tenant_name: String,
    },
    #[error("Operation `{0}` requires administrative privileges")]
    Forbidden(String),
    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        timeout: Duration,
        waiting_for: String,
    },
    #[error("Invalid endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl CloudError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Deletes are idempotent for callers that treat a missing resource as already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
