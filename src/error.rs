/// Error types for the transformation engine
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The availability check says it cannot be used; callers degrade to the local fallback
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A ready backend failed while handling a request
    #[error("Backend invocation failed: {0}")]
    InvocationFailure(String),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Element has no text content: {0}")]
    EmptyContent(String),

    #[error("Translation already in progress")]
    AlreadyInProgress,

    /// Missing or malformed response on the message bridge
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Operation is not legal in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// A known request carried a payload we could not accept
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The other side of the bridge answered with `{error}`
    #[error("{0}")]
    Remote(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            EngineError::InvocationFailure(_) => ErrorKind::InvocationFailure,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::EmptyContent(_) => ErrorKind::EmptyContent,
            EngineError::AlreadyInProgress => ErrorKind::AlreadyInProgress,
            EngineError::ChannelError(_) => ErrorKind::ChannelError,
            EngineError::InvalidState(_) => ErrorKind::InvalidState,
            EngineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            EngineError::Remote(_) => ErrorKind::Remote,
            EngineError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Serializable tag for an [`EngineError`], carried by failed transform results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    BackendUnavailable,
    InvocationFailure,
    NotFound,
    EmptyContent,
    AlreadyInProgress,
    ChannelError,
    InvalidState,
    InvalidRequest,
    Remote,
    Config,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
