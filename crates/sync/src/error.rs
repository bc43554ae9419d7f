use cuecast_core::error::CoreError;
use cuecast_package::PackageError;
use cuecast_transport::TransportError;

/// Failure of a sync attempt.
///
/// A 409 on the first attempt is not an error: it comes back as
/// [`PublishOutcome::Conflict`](crate::outcome::PublishOutcome::Conflict).
/// [`SyncError::Conflict`] only surfaces when a forced override is rejected.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A precondition failed before anything was serialized or sent.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Publishing needs a user identity and none is configured.
    #[error("No user identity configured for publishing")]
    MissingUser,

    #[error("Not authorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server accepted the package but reported it failed processing.
    #[error("Server rejected the package: {0}")]
    ProcessingFailed(String),

    #[error("Network error: {0}")]
    Network(#[source] TransportError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Packaging failed: {0}")]
    Packaging(#[from] PackageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Stable result code for callers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::MissingUser | Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Server { .. } | Self::ProcessingFailed(_) => "SERVER_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Packaging(_) | Self::Internal(_) => "PACKAGING_ERROR",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized => Self::Unauthorized,
            TransportError::Conflict(message) => Self::Conflict(message),
            TransportError::Server { status, message } => Self::Server { status, message },
            TransportError::Cancelled => Self::Cancelled,
            TransportError::InvalidRequest(message) => Self::Internal(message),
            other @ (TransportError::Network(_) | TransportError::InvalidResponse(_)) => {
                Self::Network(other)
            }
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(_)
            | CoreError::InvalidVersion(_)
            | CoreError::CueNotFound(_)
            | CoreError::NeverSynced
            | CoreError::Image(_) => Self::InvalidTemplate(err.to_string()),
            CoreError::Json(_) | CoreError::Io(_) | CoreError::Internal(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn transport_errors_keep_their_class() {
        assert_matches!(
            SyncError::from(TransportError::Unauthorized),
            SyncError::Unauthorized
        );
        assert_matches!(
            SyncError::from(TransportError::Server {
                status: 503,
                message: "down".into()
            }),
            SyncError::Server { status: 503, .. }
        );
        assert_matches!(
            SyncError::from(TransportError::Cancelled),
            SyncError::Cancelled
        );
        assert_matches!(
            SyncError::from(TransportError::InvalidResponse("eof".into())),
            SyncError::Network(TransportError::InvalidResponse(_))
        );
    }

    #[test]
    fn core_validation_is_invalid_template() {
        let err = SyncError::from(CoreError::Validation("Title must not be empty".into()));
        assert_eq!(err.code(), "INVALID_TEMPLATE");
        assert!(err.to_string().contains("Title must not be empty"));
    }

    #[test]
    fn codes() {
        assert_eq!(SyncError::MissingUser.code(), "UNAUTHORIZED");
        assert_eq!(SyncError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(SyncError::ProcessingFailed("x".into()).code(), "SERVER_ERROR");
        assert_eq!(SyncError::Packaging(PackageError::Empty).code(), "PACKAGING_ERROR");
        assert_eq!(SyncError::Cancelled.code(), "CANCELLED");
    }
}
