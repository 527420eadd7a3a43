//! Engine command and reply model
//!
//! Wire-free representation of the primitives a backing engine must
//! expose. The facade builds [`Command`] values, the engine answers with
//! [`Reply`] values; a batched operation travels as one `Vec<Command>`
//! and comes back as one `Vec<Reply>` in the same order.

use bytes::Bytes;
use std::fmt;

/// A single engine command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set `key` to `value` only if the key does not already exist
    SetNx { key: Bytes, value: Bytes },

    /// Set `key` to `value` unconditionally, with an optional TTL in
    /// seconds attached to the write
    Set {
        key: Bytes,
        value: Bytes,
        ttl: Option<u64>,
    },

    /// Read the value stored at `key`
    Get { key: Bytes },

    /// Remove `key`
    Del { key: Bytes },

    /// Set a TTL in seconds on an existing key
    Expire { key: Bytes, seconds: u64 },

    /// Prepend `value` to the list at `key`, creating the list if needed
    LPush { key: Bytes, value: Bytes },

    /// Append `value` to the list at `key`, creating the list if needed
    RPush { key: Bytes, value: Bytes },

    /// Remove and return the head of the list at `key`
    LPop { key: Bytes },

    /// Remove and return the tail of the list at `key`
    RPop { key: Bytes },

    /// List every key matching a wildcard pattern (expensive)
    Keys { pattern: String },
}

impl Command {
    /// Get the command name (for logging and error reporting)
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetNx { .. } => "SETNX",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Del { .. } => "DEL",
            Command::Expire { .. } => "EXPIRE",
            Command::LPush { .. } => "LPUSH",
            Command::RPush { .. } => "RPUSH",
            Command::LPop { .. } => "LPOP",
            Command::RPop { .. } => "RPOP",
            Command::Keys { .. } => "KEYS",
        }
    }
}

/// A single engine reply
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Generic acknowledgement
    Ok,

    /// Boolean outcome (set-if-absent, delete, expire)
    Bool(bool),

    /// Numeric outcome (list length after a push)
    Integer(i64),

    /// A value read back from the engine
    Bulk(Bytes),

    /// Absent value: missing key or empty list
    Null,

    /// Keys matching a pattern
    Keys(Vec<Bytes>),

    /// Command-level failure reported by the engine
    Error(String),
}

impl Reply {
    /// Create a bulk reply from bytes
    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(b.into())
    }

    /// Create an error reply
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Try to extract a boolean outcome
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to extract an integer outcome
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract bulk bytes
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Check whether this is the absent-value reply
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::Null)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "Ok"),
            Reply::Bool(b) => write!(f, "Bool({})", b),
            Reply::Integer(i) => write!(f, "Integer({})", i),
            Reply::Bulk(b) => write!(f, "Bulk({} bytes)", b.len()),
            Reply::Null => write!(f, "Null"),
            Reply::Keys(keys) => write!(f, "Keys({} keys)", keys.len()),
            Reply::Error(e) => write!(f, "Error({})", e),
        }
    }
}
