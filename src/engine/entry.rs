//! Entry structure for stored values

use super::value::Value;
use std::time::{Duration, Instant};

/// A stored value plus its optional expiration
#[derive(Debug, Clone)]
pub struct Entry {
    /// The value
    pub value: Value,

    /// Optional expiration time (absolute)
    pub expire_at: Option<Instant>,
}

impl Entry {
    /// Create a new entry without expiration
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            expire_at: None,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        if let Some(expire_at) = self.expire_at {
            Instant::now() >= expire_at
        } else {
            false
        }
    }

    /// Set expiration time (TTL in seconds)
    pub fn set_expiration(&mut self, ttl_seconds: u64) {
        self.expire_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
    }
}
