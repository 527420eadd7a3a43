//! Value types for the embedded engine

use bytes::Bytes;
use std::collections::VecDeque;

/// Represents the kinds of values the engine stores
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe); holds both raw string payloads and
    /// codec-encoded objects
    String(Bytes),

    /// List of values (ordered), used for the queue operations
    List(VecDeque<Bytes>),
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    /// Create an empty list
    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Try to get as string bytes
    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as mutable list
    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}
