//! Embedded in-memory engine
//!
//! An in-process implementation of the engine contract, used as the
//! default engine and as the test double. The data lives on a dedicated
//! thread that owns a [`MemoryStore`]; handles are cheap to clone and
//! send command batches over an unbounded channel, so execution is
//! serialized one message at a time and set-if-absent is atomic without
//! any locking.

use super::command::{Command, Reply};
use super::entry::Entry;
use super::value::Value;
use super::Engine;
use crate::error::{KvError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::{HashMap, VecDeque};
use std::hash::BuildHasherDefault;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Type alias for the storage map with SipHasher
type StoreMap = HashMap<Bytes, Entry, BuildHasherDefault<SipHasher13>>;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// In-memory key-value store backing the embedded engine
///
/// Expired entries are removed lazily, whenever an access touches them.
pub struct MemoryStore {
    map: StoreMap,
}

impl MemoryStore {
    /// Create a new memory store with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new memory store with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryStore {
            map: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
        }
    }

    /// Set a key, overwriting any previous entry and its expiration
    pub fn set(&mut self, key: impl Into<Bytes>, value: Value) {
        self.map.insert(key.into(), Entry::new(value));
    }

    /// Set a key only if no live entry exists, returns true when written
    pub fn set_nx(&mut self, key: impl Into<Bytes>, value: Value) -> bool {
        let key = key.into();
        if self.exists(&key) {
            return false;
        }
        self.map.insert(key, Entry::new(value));
        true
    }

    /// Get a value by key, returns None if not found or expired
    pub fn get(&mut self, key: &Bytes) -> Option<&Value> {
        let is_expired = self
            .map
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if is_expired {
            self.map.remove(key);
            return None;
        }

        self.map.get(key).map(|entry| &entry.value)
    }

    /// Get a mutable reference to a value by key
    pub fn get_mut(&mut self, key: &Bytes) -> Option<&mut Value> {
        let is_expired = self
            .map
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if is_expired {
            self.map.remove(key);
            return None;
        }

        self.map.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Get the list at `key`, creating an empty one when the key is absent
    ///
    /// Returns None when the key holds a non-list value.
    pub fn list_mut(&mut self, key: &Bytes) -> Option<&mut VecDeque<Bytes>> {
        // Clear an expired entry first so the key can be recreated
        let is_expired = self
            .map
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);
        if is_expired {
            self.map.remove(key);
        }

        self.map
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Value::empty_list()))
            .value
            .as_list_mut()
    }

    /// Delete a key, returns true if a live entry existed
    pub fn delete(&mut self, key: &Bytes) -> bool {
        match self.map.remove(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    /// Check if a key exists (and is not expired)
    pub fn exists(&mut self, key: &Bytes) -> bool {
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired() {
                self.map.remove(key);
                return false;
            }
            return true;
        }
        false
    }

    /// Set expiration on a key (TTL in seconds), returns false when absent
    pub fn expire(&mut self, key: &Bytes, ttl_seconds: u64) -> bool {
        if let Some(entry) = self.map.get_mut(key) {
            if entry.is_expired() {
                self.map.remove(key);
                return false;
            }
            entry.set_expiration(ttl_seconds);
            return true;
        }
        false
    }

    /// Get all live keys (expensive operation, scan use only)
    pub fn keys(&self) -> Vec<Bytes> {
        self.map
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Get the number of live keys
    pub fn len(&self) -> usize {
        self.map.values().filter(|entry| !entry.is_expired()).count()
    }

    /// Check if the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A command batch sent to the engine thread
struct EngineRequest {
    /// Commands to execute in order
    commands: Vec<Command>,

    /// Channel carrying the replies back, one per command
    reply_tx: oneshot::Sender<Vec<Reply>>,
}

/// Handle to the embedded engine
///
/// Cloning the handle shares the same engine thread. The thread exits
/// once every handle has been dropped.
#[derive(Clone)]
pub struct MemoryEngine {
    request_tx: mpsc::UnboundedSender<EngineRequest>,
}

impl MemoryEngine {
    /// Start an engine with default store capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Start an engine with specified initial store capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || run_engine(capacity, request_rx));

        MemoryEngine { request_tx }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.request_tx
            .send(EngineRequest { commands, reply_tx })
            .map_err(|_| KvError::Engine("engine thread stopped".to_string()))?;

        reply_rx
            .await
            .map_err(|_| KvError::Engine("engine dropped the request".to_string()))
    }
}

/// The loop that runs on the engine thread
fn run_engine(capacity: usize, mut request_rx: mpsc::UnboundedReceiver<EngineRequest>) {
    info!("memory engine started (capacity {})", capacity);

    let mut store = MemoryStore::with_capacity(capacity);

    while let Some(request) = request_rx.blocking_recv() {
        debug!("executing batch of {} command(s)", request.commands.len());

        let replies: Vec<Reply> = request
            .commands
            .into_iter()
            .map(|command| execute(&mut store, command))
            .collect();

        let _ = request.reply_tx.send(replies);
    }

    info!("memory engine stopped");
}

/// Execute one command against the store
fn execute(store: &mut MemoryStore, command: Command) -> Reply {
    match command {
        Command::SetNx { key, value } => Reply::Bool(store.set_nx(key, Value::String(value))),
        Command::Set { key, value, ttl } => {
            store.set(key.clone(), Value::String(value));
            if let Some(seconds) = ttl {
                store.expire(&key, seconds);
            }
            Reply::Ok
        }
        Command::Get { key } => match store.get(&key) {
            Some(value) => match value.as_string() {
                Some(bytes) => Reply::Bulk(bytes.clone()),
                None => {
                    warn!("GET on a {} key", value.type_name());
                    Reply::error(WRONG_TYPE)
                }
            },
            None => Reply::Null,
        },
        Command::Del { key } => Reply::Bool(store.delete(&key)),
        Command::Expire { key, seconds } => Reply::Bool(store.expire(&key, seconds)),
        Command::LPush { key, value } => push(store, key, value, true),
        Command::RPush { key, value } => push(store, key, value, false),
        Command::LPop { key } => pop(store, &key, true),
        Command::RPop { key } => pop(store, &key, false),
        Command::Keys { pattern } => {
            let keys = store
                .keys()
                .into_iter()
                .filter(|key| matches_pattern(key, &pattern))
                .collect();
            Reply::Keys(keys)
        }
    }
}

/// Push a value onto a list, creating the list if needed
fn push(store: &mut MemoryStore, key: Bytes, value: Bytes, front: bool) -> Reply {
    let list = match store.list_mut(&key) {
        Some(list) => list,
        None => {
            warn!("push on a non-list key");
            return Reply::error(WRONG_TYPE);
        }
    };

    if front {
        list.push_front(value);
    } else {
        list.push_back(value);
    }

    Reply::Integer(list.len() as i64)
}

/// Pop a value from a list; emptied lists are removed from the store
fn pop(store: &mut MemoryStore, key: &Bytes, front: bool) -> Reply {
    let list = match store.get_mut(key) {
        Some(value) => match value.as_list_mut() {
            Some(list) => list,
            None => {
                warn!("pop on a non-list key");
                return Reply::error(WRONG_TYPE);
            }
        },
        None => return Reply::Null,
    };

    let popped = if front {
        list.pop_front()
    } else {
        list.pop_back()
    };
    let emptied = list.is_empty();

    if emptied {
        store.delete(key);
    }

    match popped {
        Some(bytes) => Reply::Bulk(bytes),
        None => Reply::Null,
    }
}

/// Check if a key matches a wildcard pattern
///
/// Supports:
/// - * : matches everything
/// - prefix* : matches keys starting with prefix
/// - *suffix : matches keys ending with suffix
/// - *pattern* : matches keys containing pattern
fn matches_pattern(key: &[u8], pattern: &str) -> bool {
    let key_str = match std::str::from_utf8(key) {
        Ok(s) => s,
        Err(_) => return false,
    };

    if pattern == "*" {
        return true;
    }

    if pattern.starts_with('*') && pattern.ends_with('*') && pattern.len() >= 2 {
        let inner = &pattern[1..pattern.len() - 1];
        return key_str.contains(inner);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return key_str.ends_with(suffix);
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return key_str.starts_with(prefix);
    }

    key_str == pattern
}
