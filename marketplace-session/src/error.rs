//! Error types for marketplace-session — Railway Programming
//!
//! Every fallible operation returns `Result<T, SessionError>`.
//! No panics, no unwraps in production code paths. None of these errors is
//! user-fatal: each failure path ends in the unauthenticated state.

use thiserror::Error;

/// Unified error type for session and routing operations
#[derive(Error, Debug)]
pub enum SessionError {
    // ─── Storage Errors ───

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session record: {0}")]
    InvalidSessionRecord(String),

    // ─── Session Errors ───

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Stale external change: event observed {event_writes} local writes, current is {local_writes}")]
    ConcurrentWriteConflict { event_writes: u64, local_writes: u64 },

    // ─── Routing Errors ───

    #[error("Redirect loop starting at {path} after {hops} hops")]
    RedirectLoop { path: String, hops: usize },

    // ─── Infrastructure Errors ───

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),
}

impl SessionError {
    /// Whether the error means the persistence medium did not take the write
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
