//! The Analysis Services API contract.

use thiserror::Error;

use super::models::Server;

/// Errors returned by an [`AnalysisServicesClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server (or resource group) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected or lack permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The request conflicts with the current state of the resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request rate or quota exceeded.
    #[error("throttled: {0}")]
    Throttled(String),

    /// The service reported a transient failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success status.
    #[error("HTTP {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A token could not be acquired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A long-running operation ended in a failed state.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// A response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Classify a non-success HTTP status.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            404 => Self::NotFound(message),
            401 | 403 => Self::PermissionDenied(message),
            409 => Self::Conflict(message),
            429 => Self::Throttled(message),
            500..=599 => Self::Unavailable(message),
            _ => Self::Status { code, message },
        }
    }

    /// Returns true if the server does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Operations on `Microsoft.AnalysisServices/servers`.
///
/// Each call returns once the remote operation has completed; long-running
/// operations are awaited by the implementation.
#[async_trait::async_trait]
pub trait AnalysisServicesClient: Send + Sync {
    /// Create or replace a server.
    async fn create(
        &self,
        resource_group: &str,
        name: &str,
        server: &Server,
    ) -> Result<Server, ClientError>;

    /// Fetch a server.
    async fn get_details(&self, resource_group: &str, name: &str) -> Result<Server, ClientError>;

    /// Delete a single server.
    async fn delete(&self, resource_group: &str, name: &str) -> Result<(), ClientError>;
}
