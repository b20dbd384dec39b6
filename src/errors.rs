// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture flow

use crate::backends::camera::BackendError;
use crate::capture::CaptureOperation;
use crate::permission::Capability;
use std::fmt;

/// Result type alias using MediaError
pub type MediaResult<T> = Result<T, MediaError>;

/// Main error type of the capture flow
#[derive(Debug, Clone, PartialEq)]
pub enum MediaError {
    /// A capability was denied but may be requested again
    PermissionDenied(Capability),
    /// A capability was denied and the platform will not ask again
    PermissionPermanentlyDenied(Capability),
    /// The camera could not be bound (or rebound)
    CameraBindingFailed(String),
    /// Photo capture or video recording failed
    CaptureFailed(String),
    /// The storage collaborator failed to remove a media file
    StorageDeleteFailed(String),
    /// The storage collaborator failed to report metadata
    StorageQueryFailed(String),
    /// An operation was invoked in a state that does not accept it
    InvalidStateTransition {
        /// State the component was in
        state: String,
        /// Rejected action
        action: &'static str,
    },
    /// Another capture operation is already in flight
    OperationInProgress(CaptureOperation),
    /// Configuration errors
    Config(String),
}

impl MediaError {
    /// Build an `InvalidStateTransition` from any debuggable state
    pub fn invalid(state: impl fmt::Debug, action: &'static str) -> Self {
        MediaError::InvalidStateTransition {
            state: format!("{:?}", state),
            action,
        }
    }

    /// Whether the user can recover from this error without leaving the flow
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MediaError::PermissionPermanentlyDenied(_))
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::PermissionDenied(cap) => write!(f, "Permission denied: {}", cap),
            MediaError::PermissionPermanentlyDenied(cap) => {
                write!(f, "Permission permanently denied: {}", cap)
            }
            MediaError::CameraBindingFailed(msg) => write!(f, "Camera binding failed: {}", msg),
            MediaError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            MediaError::StorageDeleteFailed(msg) => write!(f, "Failed to delete media: {}", msg),
            MediaError::StorageQueryFailed(msg) => {
                write!(f, "Failed to query media metadata: {}", msg)
            }
            MediaError::InvalidStateTransition { state, action } => {
                write!(f, "Invalid state transition: {} while {}", action, state)
            }
            MediaError::OperationInProgress(op) => write!(f, "Operation in progress: {}", op),
            MediaError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

// Backend failures reaching the flow without a more specific mapping are capture failures
impl From<BackendError> for MediaError {
    fn from(err: BackendError) -> Self {
        MediaError::CaptureFailed(err.to_string())
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        MediaError::Config(err.to_string())
    }
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = MediaError::invalid("Review", "confirm");
        assert_eq!(
            err.to_string(),
            "Invalid state transition: confirm while \"Review\""
        );
    }

    #[test]
    fn test_permanent_denial_not_recoverable() {
        assert!(!MediaError::PermissionPermanentlyDenied(Capability::Camera).is_recoverable());
        assert!(MediaError::PermissionDenied(Capability::Camera).is_recoverable());
        assert!(MediaError::CaptureFailed("disk full".into()).is_recoverable());
    }

    #[test]
    fn test_backend_error_maps_to_capture_failure() {
        let err: MediaError = BackendError::NoRecordingInProgress.into();
        assert!(matches!(err, MediaError::CaptureFailed(_)));
    }
}
