//! Error types for the crate
//!
//! Absent keys are never errors: reads return `Ok(None)`. Errors are
//! reserved for a broken engine connection, a rejected command, a reply
//! the operation cannot interpret, or a codec failure.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors surfaced by table-store operations
#[derive(Debug, Error)]
pub enum KvError {
    /// The engine handle is disconnected (engine stopped or dropped)
    #[error("engine unavailable: {0}")]
    Engine(String),

    /// The engine rejected the command (wrong type, malformed arguments)
    #[error("engine error: {0}")]
    Command(String),

    /// The engine answered with a reply shape the operation cannot interpret
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// Name of the command that was issued
        command: &'static str,
        /// Description of the reply that came back
        reply: String,
    },

    /// Value serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A string payload was not valid UTF-8
    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,
}

impl KvError {
    /// Shorthand for an unexpected-reply error
    pub(crate) fn unexpected(command: &'static str, reply: impl ToString) -> Self {
        KvError::UnexpectedReply {
            command,
            reply: reply.to_string(),
        }
    }
}
