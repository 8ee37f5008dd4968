//! Error taxonomy for the sync engine
//!
//! Fetch failures never stop a refresh loop: they are recorded on the view
//! whose token is current and the next poll retries. Mutation failures roll
//! back the optimistic commit and reach the caller as [`SyncError::MutationConflict`].

use beacon_client::ClientError;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by views, queries and mutations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure or timeout; retried only by the next scheduled poll
    #[error("network error: {0}")]
    Network(String),

    /// The entity does not exist (terminal for single-entity views)
    #[error("not found: {0}")]
    NotFound(String),

    /// The controller answered with an error status
    #[error("controller error (status {status}): {message}")]
    Remote { status: u16, message: String },

    /// The controller's answer could not be decoded
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Request rejected locally before anything was sent
    #[error("invalid request: {0}")]
    Validation(String),

    /// A remote mutation failed after its optimistic commit; the commit was rolled back
    #[error("{operation} failed: {source}")]
    MutationConflict {
        operation: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The view was torn down
    #[error("view is closed")]
    Closed,
}

/// Flat discriminant of [`SyncError`], cheap to store and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    NotFound,
    Remote,
    Protocol,
    Validation,
    MutationConflict,
    Closed,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Remote { .. } => ErrorKind::Remote,
            SyncError::Protocol(_) => ErrorKind::Protocol,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::MutationConflict { .. } => ErrorKind::MutationConflict,
            SyncError::Closed => ErrorKind::Closed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::NotFound(_) => true,
            SyncError::MutationConflict { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn conflict(operation: impl Into<String>, source: SyncError) -> Self {
        SyncError::MutationConflict {
            operation: operation.into(),
            source: Box::new(source),
        }
    }
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RequestFailed(e) => SyncError::Network(e.to_string()),
            ClientError::NotFound(message) => SyncError::NotFound(message),
            ClientError::ApiError { status: 404, message } => SyncError::NotFound(message),
            ClientError::ApiError { status, message } => SyncError::Remote { status, message },
            ClientError::ParseError(message) => SyncError::Protocol(message),
            ClientError::InvalidRequest(message) => SyncError::Validation(message),
            ClientError::InternalError(message) => SyncError::Protocol(message),
        }
    }
}

/// Error as stored in view state: kind plus rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for ViewError {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
