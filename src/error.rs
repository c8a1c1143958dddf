//! Error types for the Azure Resource Manager provider.

use thiserror::Error;

use crate::azure::client::ClientError;
use crate::azure::resource_id::ResourceIdError;

/// Errors returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The cloud API call failed.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Binding or accepting on the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource already exists or is in a conflicting state.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Invalid request from the engine, including malformed resource ids.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
        }
    }

    /// Returns true if this error reports a missing remote resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Wrap a client error with operation context, keeping its status class.
    pub(crate) fn from_client(err: ClientError, context: impl std::fmt::Display) -> Self {
        let msg = format!("{}: {}", context, err);
        match err {
            ClientError::NotFound(_) => Self::NotFound(msg),
            ClientError::PermissionDenied(_) => Self::PermissionDenied(msg),
            ClientError::Conflict(_) => Self::AlreadyExists(msg),
            ClientError::Throttled(_) => Self::ResourceExhausted(msg),
            ClientError::Unavailable(_) | ClientError::Transport(_) => Self::Unavailable(msg),
            ClientError::Timeout(_) => Self::DeadlineExceeded(msg),
            ClientError::Auth(_) => Self::PermissionDenied(msg),
            ClientError::OperationFailed(_)
            | ClientError::Status { .. }
            | ClientError::Decode(_) => Self::Sdk(msg),
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        Self::from_client(err, "Azure API request failed")
    }
}

impl From<ResourceIdError> for ProviderError {
    fn from(err: ResourceIdError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Sdk(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            }
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            }
            ProviderError::Io(err) => tonic::Status::internal(format!("I/O error: {}", err)),
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("server-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: server-123");

        let err = ProviderError::UnknownResource("azurerm_sql_server".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: azurerm_sql_server"
        );

        let err = ProviderError::DeadlineExceeded("create took too long".to_string());
        assert_eq!(format!("{}", err), "Deadline exceeded: create took too long");
    }

    #[test]
    fn test_error_to_status() {
        let cases = vec![
            (ProviderError::NotFound("x".into()), tonic::Code::NotFound),
            (ProviderError::Validation("x".into()), tonic::Code::InvalidArgument),
            (
                ProviderError::Configuration("x".into()),
                tonic::Code::FailedPrecondition,
            ),
            (ProviderError::Sdk("x".into()), tonic::Code::Internal),
            (ProviderError::AlreadyExists("x".into()), tonic::Code::AlreadyExists),
            (
                ProviderError::PermissionDenied("x".into()),
                tonic::Code::PermissionDenied,
            ),
            (
                ProviderError::ResourceExhausted("x".into()),
                tonic::Code::ResourceExhausted,
            ),
            (ProviderError::Unavailable("x".into()), tonic::Code::Unavailable),
            (
                ProviderError::DeadlineExceeded("x".into()),
                tonic::Code::DeadlineExceeded,
            ),
            (ProviderError::InvalidRequest("x".into()), tonic::Code::InvalidArgument),
        ];

        for (err, code) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_client_error_keeps_status_class() {
        let err = ProviderError::from_client(
            ClientError::Throttled("too many requests".into()),
            "Error creating Analysis Server acctest1",
        );
        assert!(matches!(err, ProviderError::ResourceExhausted(_)));
        assert!(err.message().starts_with("Error creating Analysis Server acctest1"));

        let err = ProviderError::from(ClientError::NotFound("gone".into()));
        assert!(err.is_not_found());

        let err = ProviderError::from(ClientError::Status {
            code: 400,
            message: "BadRequest: invalid sku".into(),
        });
        assert!(matches!(err, ProviderError::Sdk(_)));
        assert!(err.message().contains("invalid sku"));
    }

    #[test]
    fn test_resource_id_error_is_invalid_request() {
        let err: ProviderError = ResourceIdError::MissingSegment("resourceGroups").into();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("missing subscription_id".to_string());
        assert_eq!(err.message(), "missing subscription_id");
    }
}
