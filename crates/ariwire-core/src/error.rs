//! Shared error type across ariwire crates.

use thiserror::Error;

/// Stable error codes, used in logs and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input or configuration.
    BadRequest,
    /// Malformed envelope on the wire.
    Decode,
    /// Response without a pending request.
    Unmatched,
    /// Request id already in flight.
    Duplicate,
    /// Credentials rejected.
    AuthFailed,
    /// Socket failure.
    Transport,
    /// Event handler failure.
    Handler,
    /// Connection went away.
    Closed,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Decode => "DECODE",
            ErrorCode::Unmatched => "UNMATCHED_RESPONSE",
            ErrorCode::Duplicate => "DUPLICATE_REQUEST",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Handler => "HANDLER",
            ErrorCode::Closed => "CONNECTION_CLOSED",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AriWireError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum AriWireError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("malformed envelope: {0}")]
    Decode(String),
    #[error("no pending request for response {0}")]
    UnmatchedResponse(String),
    #[error("request id already in flight: {0}")]
    DuplicateRequest(String),
    #[error("auth failed")]
    AuthFailed,
    #[error("transport: {0}")]
    Transport(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl AriWireError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            AriWireError::BadRequest(_) => ErrorCode::BadRequest,
            AriWireError::Decode(_) => ErrorCode::Decode,
            AriWireError::UnmatchedResponse(_) => ErrorCode::Unmatched,
            AriWireError::DuplicateRequest(_) => ErrorCode::Duplicate,
            AriWireError::AuthFailed => ErrorCode::AuthFailed,
            AriWireError::Transport(_) => ErrorCode::Transport,
            AriWireError::Handler(_) => ErrorCode::Handler,
            AriWireError::ConnectionClosed => ErrorCode::Closed,
            AriWireError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            AriWireError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// True when the failure ends the connection it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AriWireError::Transport(_) | AriWireError::ConnectionClosed
        )
    }
}
