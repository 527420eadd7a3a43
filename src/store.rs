//! Table-namespaced data access
//!
//! [`TableStore`] is the public face of the crate: a thin layer that
//! groups keys into named tables on top of a flat [`Engine`] keyspace.
//! Namespacing is purely lexical, every keyed operation works on the
//! engine key `tableName=>{table}:{key}`.

use crate::codec::{self, Codec, JsonCodec};
use crate::engine::{Command, Engine, Reply};
use crate::error::{KvError, Result};
use crate::key;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Table-namespaced facade over a key-value [`Engine`]
///
/// Keyed operations (`add`, `update`, `delete`, `get`, `table_data`)
/// take a table name and address the engine key
/// `tableName=>{table}:{key}`, so tables share one keyspace without
/// colliding. Queue operations address their engine key directly.
///
/// Values are serialized through the configured [`Codec`]; the `_str`
/// queue variants store raw UTF-8 bytes instead.
#[derive(Clone)]
pub struct TableStore<E, C = JsonCodec> {
    engine: E,
    codec: C,
}

impl<E: Engine> TableStore<E> {
    /// Create a store over `engine` with the JSON codec
    pub fn new(engine: E) -> Self {
        TableStore {
            engine,
            codec: JsonCodec,
        }
    }
}

impl<E: Engine, C: Codec> TableStore<E, C> {
    /// Create a store over `engine` with a custom codec
    pub fn with_codec(engine: E, codec: C) -> Self {
        TableStore { engine, codec }
    }

    /// Push a value onto the head (left end) of a queue
    ///
    /// Returns the queue length after the push. The queue is created on
    /// first push.
    pub async fn lpush<T: Serialize>(&self, list_key: &str, value: &T) -> Result<u64> {
        let payload = self.codec.encode(value)?;
        self.push(list_key, payload, true).await
    }

    /// Push a value onto the tail (right end) of a queue
    pub async fn rpush<T: Serialize>(&self, list_key: &str, value: &T) -> Result<u64> {
        let payload = self.codec.encode(value)?;
        self.push(list_key, payload, false).await
    }

    /// Push a raw string onto the head of a queue, bypassing the codec
    pub async fn lpush_str(&self, list_key: &str, value: &str) -> Result<u64> {
        self.push(list_key, codec::string_to_bytes(value), true).await
    }

    /// Push a raw string onto the tail of a queue, bypassing the codec
    pub async fn rpush_str(&self, list_key: &str, value: &str) -> Result<u64> {
        self.push(list_key, codec::string_to_bytes(value), false).await
    }

    /// Pop a value from the head (left end) of a queue
    ///
    /// Returns None when the queue is empty or does not exist.
    pub async fn lpop<T: DeserializeOwned>(&self, list_key: &str) -> Result<Option<T>> {
        match self.pop_bytes(list_key, true).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pop a value from the tail (right end) of a queue
    pub async fn rpop<T: DeserializeOwned>(&self, list_key: &str) -> Result<Option<T>> {
        match self.pop_bytes(list_key, false).await? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pop a raw string from the head of a queue, bypassing the codec
    pub async fn lpop_str(&self, list_key: &str) -> Result<Option<String>> {
        match self.pop_bytes(list_key, true).await? {
            Some(bytes) => Ok(Some(codec::string_from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Pop a raw string from the tail of a queue, bypassing the codec
    pub async fn rpop_str(&self, list_key: &str) -> Result<Option<String>> {
        match self.pop_bytes(list_key, false).await? {
            Some(bytes) => Ok(Some(codec::string_from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key` in `table` unless the key already holds
    /// a live entry
    ///
    /// Returns true when the entry was created, false when the key
    /// already existed. When `ttl_seconds` is given the expiration is
    /// applied in the same round-trip, and it is applied to the key
    /// whether or not this call created it.
    pub async fn add<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        table: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        let engine_key = codec::string_to_bytes(&key::table_key(table, key));
        let payload = self.codec.encode(value)?;

        let mut commands = vec![Command::SetNx {
            key: engine_key.clone(),
            value: payload,
        }];
        if let Some(seconds) = ttl_seconds {
            commands.push(Command::Expire {
                key: engine_key,
                seconds,
            });
        }

        let first = self
            .engine
            .pipeline(commands)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KvError::Engine("empty pipeline reply".to_string()))?;
        expect_bool("SETNX", first)
    }

    /// Store every entry of `entries` in `table`, skipping keys that
    /// already exist
    ///
    /// The whole batch goes to the engine in a single pipelined
    /// round-trip. Per-key outcomes are not reported: a batch that
    /// reaches the engine returns true, an empty batch returns false
    /// without contacting the engine.
    pub async fn add_many<T: Serialize>(
        &self,
        entries: &HashMap<String, T>,
        table: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        if entries.is_empty() {
            return Ok(false);
        }

        let mut commands = Vec::with_capacity(entries.len() * 2);
        for (key, value) in entries {
            let engine_key = codec::string_to_bytes(&key::table_key(table, key));
            commands.push(Command::SetNx {
                key: engine_key.clone(),
                value: self.codec.encode(value)?,
            });
            if let Some(seconds) = ttl_seconds {
                commands.push(Command::Expire {
                    key: engine_key,
                    seconds,
                });
            }
        }

        self.engine.pipeline(commands).await?;
        Ok(true)
    }

    /// Store `value` under `key` in `table`, overwriting any previous
    /// entry
    pub async fn update<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        table: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        let mut entries = HashMap::with_capacity(1);
        entries.insert(key.to_string(), value);
        self.update_many(&entries, table, ttl_seconds).await
    }

    /// Store every entry of `entries` in `table`, overwriting previous
    /// entries, in a single pipelined round-trip
    ///
    /// An empty batch returns false without contacting the engine.
    pub async fn update_many<T: Serialize>(
        &self,
        entries: &HashMap<String, T>,
        table: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<bool> {
        if entries.is_empty() {
            return Ok(false);
        }

        let mut commands = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            commands.push(Command::Set {
                key: codec::string_to_bytes(&key::table_key(table, key)),
                value: self.codec.encode(value)?,
                ttl: ttl_seconds,
            });
        }

        self.engine.pipeline(commands).await?;
        Ok(true)
    }

    /// Delete `key` from `table`
    ///
    /// Returns true whether or not the key existed.
    pub async fn delete(&self, key: &str, table: &str) -> Result<bool> {
        self.delete_many(&[key], table).await
    }

    /// Delete every key of `keys` from `table` in a single pipelined
    /// round-trip
    ///
    /// An empty batch returns false without contacting the engine.
    pub async fn delete_many<S: AsRef<str>>(&self, keys: &[S], table: &str) -> Result<bool> {
        if keys.is_empty() {
            return Ok(false);
        }

        let commands: Vec<Command> = keys
            .iter()
            .map(|key| Command::Del {
                key: codec::string_to_bytes(&key::table_key(table, key.as_ref())),
            })
            .collect();

        self.engine.pipeline(commands).await?;
        Ok(true)
    }

    /// Fetch the value stored under `key` in `table`
    ///
    /// Returns None when the key does not exist or has expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, table: &str) -> Result<Option<T>> {
        let engine_key = codec::string_to_bytes(&key::table_key(table, key));
        let reply = self.engine.request(Command::Get { key: engine_key }).await?;

        match expect_bulk("GET", reply)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch every entry of `table`, keyed by short key
    ///
    /// Intended for administrative tooling: the underlying scan walks
    /// the entire keyspace, so its cost grows with everything stored in
    /// the engine, not just with this table. Keys that expire between
    /// the scan and the read are skipped.
    pub async fn table_data<T: DeserializeOwned>(&self, table: &str) -> Result<HashMap<String, T>> {
        let pattern = key::table_pattern(table);
        let reply = self.engine.request(Command::Keys { pattern }).await?;
        let engine_keys = expect_keys("KEYS", reply)?;

        if engine_keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut short_keys = Vec::with_capacity(engine_keys.len());
        let mut commands = Vec::with_capacity(engine_keys.len());
        for engine_key in engine_keys {
            let key_str = std::str::from_utf8(&engine_key).map_err(|_| KvError::InvalidUtf8)?;
            let short = match key::strip_table_prefix(table, key_str) {
                Some(short) => short.to_string(),
                None => continue,
            };
            short_keys.push(short);
            commands.push(Command::Get {
                key: engine_key.clone(),
            });
        }

        let replies = self.engine.pipeline(commands).await?;

        let mut data = HashMap::with_capacity(short_keys.len());
        for (short, reply) in short_keys.into_iter().zip(replies) {
            match expect_bulk("GET", reply)? {
                Some(bytes) => {
                    data.insert(short, self.codec.decode(&bytes)?);
                }
                // Key expired between the scan and the read
                None => debug!("key vanished during table scan"),
            }
        }

        debug!("table scan of {} returned {} entries", table, data.len());
        Ok(data)
    }

    async fn push(&self, list_key: &str, payload: Bytes, front: bool) -> Result<u64> {
        let key = codec::string_to_bytes(list_key);
        let command = if front {
            Command::LPush {
                key,
                value: payload,
            }
        } else {
            Command::RPush {
                key,
                value: payload,
            }
        };
        let name = command.name();

        let reply = self.engine.request(command).await?;
        let length = expect_integer(name, reply)?;
        u64::try_from(length).map_err(|_| KvError::unexpected(name, Reply::Integer(length)))
    }

    async fn pop_bytes(&self, list_key: &str, front: bool) -> Result<Option<Bytes>> {
        let key = codec::string_to_bytes(list_key);
        let command = if front {
            Command::LPop { key }
        } else {
            Command::RPop { key }
        };
        let name = command.name();

        let reply = self.engine.request(command).await?;
        expect_bulk(name, reply)
    }
}

fn expect_bool(command: &'static str, reply: Reply) -> Result<bool> {
    match reply.as_bool() {
        Some(flag) => Ok(flag),
        None => Err(reply_error(command, reply)),
    }
}

fn expect_integer(command: &'static str, reply: Reply) -> Result<i64> {
    match reply.as_integer() {
        Some(value) => Ok(value),
        None => Err(reply_error(command, reply)),
    }
}

fn expect_bulk(command: &'static str, reply: Reply) -> Result<Option<Bytes>> {
    match reply {
        Reply::Bulk(bytes) => Ok(Some(bytes)),
        Reply::Null => Ok(None),
        other => Err(reply_error(command, other)),
    }
}

fn expect_keys(command: &'static str, reply: Reply) -> Result<Vec<Bytes>> {
    match reply {
        Reply::Keys(keys) => Ok(keys),
        other => Err(reply_error(command, other)),
    }
}

/// Turn a reply that did not have the expected shape into an error
fn reply_error(command: &'static str, reply: Reply) -> KvError {
    match reply {
        Reply::Error(error) => KvError::Command(error),
        other => KvError::unexpected(command, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn sample_user() -> User {
        User {
            id: 7,
            name: "ada".to_string(),
        }
    }

    fn test_store() -> TableStore<MemoryEngine> {
        TableStore::new(MemoryEngine::new())
    }

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init();
    }

    /// Engine double that answers every command with the same reply
    struct FixedReply(Reply);

    #[async_trait::async_trait]
    impl Engine for FixedReply {
        async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>> {
            Ok(commands.iter().map(|_| self.0.clone()).collect())
        }
    }

    #[tokio::test]
    async fn test_add_and_get_round_trip() {
        let store = test_store();
        let user = sample_user();

        assert!(store.add("u7", &user, "users", None).await.unwrap());
        let fetched: Option<User> = store.get("u7", "users").await.unwrap();
        assert_eq!(fetched, Some(user));

        let missing: Option<User> = store.get("nobody", "users").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_add_does_not_overwrite() {
        let store = test_store();

        assert!(store.add("greeting", &"first", "config", None).await.unwrap());
        assert!(!store.add("greeting", &"second", "config", None).await.unwrap());

        let kept: Option<String> = store.get("greeting", "config").await.unwrap();
        assert_eq!(kept.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_add_applies_ttl_even_when_key_exists() {
        let store = test_store();

        assert!(store.add("k", &1u32, "counters", None).await.unwrap());
        // Second add loses the race but its TTL still lands on the key
        assert!(!store.add("k", &2u32, "counters", Some(0)).await.unwrap());

        let gone: Option<u32> = store.get("k", "counters").await.unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn test_add_with_ttl_expires() {
        init_logging();
        let store = test_store();

        assert!(store.add("session", &sample_user(), "sessions", Some(1)).await.unwrap());
        let live: Option<User> = store.get("session", "sessions").await.unwrap();
        assert!(live.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;

        let expired: Option<User> = store.get("session", "sessions").await.unwrap();
        assert_eq!(expired, None);
    }

    #[tokio::test]
    async fn test_update_inserts_and_overwrites() {
        let store = test_store();

        assert!(store.update("u1", &sample_user(), "users", None).await.unwrap());
        let first: Option<User> = store.get("u1", "users").await.unwrap();
        assert_eq!(first, Some(sample_user()));

        let renamed = User {
            id: 7,
            name: "grace".to_string(),
        };
        assert!(store.update("u1", &renamed, "users", None).await.unwrap());
        let second: Option<User> = store.get("u1", "users").await.unwrap();
        assert_eq!(second, Some(renamed));
    }

    #[tokio::test]
    async fn test_update_with_ttl() {
        let store = test_store();

        assert!(store.update("flash", &"gone", "notices", Some(0)).await.unwrap());
        let expired: Option<String> = store.get("flash", "notices").await.unwrap();
        assert_eq!(expired, None);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = test_store();
        store.add("u1", &sample_user(), "users", None).await.unwrap();

        assert!(store.delete("u1", "users").await.unwrap());
        let gone: Option<User> = store.get("u1", "users").await.unwrap();
        assert_eq!(gone, None);

        // Deleting an absent key still reports success
        assert!(store.delete("u1", "users").await.unwrap());
    }

    #[tokio::test]
    async fn test_batched_writes() {
        let store = test_store();
        let entries = HashMap::from([
            ("a".to_string(), 1u32),
            ("b".to_string(), 2u32),
        ]);

        assert!(store.add_many(&entries, "numbers", None).await.unwrap());
        assert_eq!(store.get::<u32>("a", "numbers").await.unwrap(), Some(1));
        assert_eq!(store.get::<u32>("b", "numbers").await.unwrap(), Some(2));

        // add_many never overwrites
        let replacements = HashMap::from([
            ("a".to_string(), 10u32),
            ("c".to_string(), 3u32),
        ]);
        assert!(store.add_many(&replacements, "numbers", None).await.unwrap());
        assert_eq!(store.get::<u32>("a", "numbers").await.unwrap(), Some(1));
        assert_eq!(store.get::<u32>("c", "numbers").await.unwrap(), Some(3));

        // update_many does
        assert!(store.update_many(&replacements, "numbers", None).await.unwrap());
        assert_eq!(store.get::<u32>("a", "numbers").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = test_store();
        let entries = HashMap::from([
            ("a".to_string(), 1u32),
            ("b".to_string(), 2u32),
        ]);
        store.add_many(&entries, "numbers", None).await.unwrap();

        assert!(store.delete_many(&["a", "b"], "numbers").await.unwrap());
        assert_eq!(store.get::<u32>("a", "numbers").await.unwrap(), None);
        assert_eq!(store.get::<u32>("b", "numbers").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_batches_return_false() {
        let store = test_store();

        let no_entries: HashMap<String, u32> = HashMap::new();
        assert!(!store.add_many(&no_entries, "t", None).await.unwrap());
        assert!(!store.update_many(&no_entries, "t", None).await.unwrap());

        let no_keys: [&str; 0] = [];
        assert!(!store.delete_many(&no_keys, "t").await.unwrap());
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let store = test_store();

        store.add("k", &"from users", "users", None).await.unwrap();
        store.add("k", &"from orders", "orders", None).await.unwrap();

        let users: Option<String> = store.get("k", "users").await.unwrap();
        let orders: Option<String> = store.get("k", "orders").await.unwrap();
        assert_eq!(users.as_deref(), Some("from users"));
        assert_eq!(orders.as_deref(), Some("from orders"));

        store.delete("k", "users").await.unwrap();
        let survivor: Option<String> = store.get("k", "orders").await.unwrap();
        assert_eq!(survivor.as_deref(), Some("from orders"));
    }

    #[tokio::test]
    async fn test_table_data() {
        init_logging();
        let store = test_store();

        for id in 1..=3u64 {
            let user = User {
                id,
                name: format!("user{}", id),
            };
            store.add(&format!("u{}", id), &user, "users", None).await.unwrap();
        }
        // A neighbouring table must not leak into the scan
        store.add("o1", &sample_user(), "orders", None).await.unwrap();

        let data: HashMap<String, User> = store.table_data("users").await.unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data["u2"].name, "user2");
        assert!(!data.contains_key("o1"));

        let empty: HashMap<String, User> = store.table_data("carts").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_queue_round_trip() {
        let store = test_store();
        let first = sample_user();
        let second = User {
            id: 8,
            name: "lin".to_string(),
        };

        assert_eq!(store.lpush("jobs", &first).await.unwrap(), 1);
        assert_eq!(store.lpush("jobs", &second).await.unwrap(), 2);

        // lpush prepends, so the first push sits at the tail
        let tail: Option<User> = store.rpop("jobs").await.unwrap();
        assert_eq!(tail, Some(first));
        let head: Option<User> = store.lpop("jobs").await.unwrap();
        assert_eq!(head, Some(second));

        let drained: Option<User> = store.lpop("jobs").await.unwrap();
        assert_eq!(drained, None);
    }

    #[tokio::test]
    async fn test_rpush_builds_fifo_queue() {
        let store = test_store();

        for (expected_len, value) in [(1, "a"), (2, "b"), (3, "c")] {
            assert_eq!(store.rpush_str("fifo", value).await.unwrap(), expected_len);
        }

        assert_eq!(store.lpop_str("fifo").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.lpop_str("fifo").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.lpop_str("fifo").await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.lpop_str("fifo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_string_queue_is_raw() {
        let engine = MemoryEngine::new();
        let store = TableStore::new(engine.clone());

        store.rpush_str("raw", "héllo").await.unwrap();

        // The payload goes in unquoted, not as a JSON string
        let reply = engine
            .request(Command::LPop {
                key: Bytes::from("raw"),
            })
            .await
            .unwrap();
        assert_eq!(reply, Reply::bulk("héllo"));
    }

    #[tokio::test]
    async fn test_engine_key_format() {
        let engine = MemoryEngine::new();
        let store = TableStore::new(engine.clone());

        store.add("u1", &sample_user(), "users", None).await.unwrap();

        let reply = engine
            .request(Command::Get {
                key: Bytes::from("tableName=>users:u1"),
            })
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Bulk(_)));
    }

    #[tokio::test]
    async fn test_wrong_type_surfaces_as_error() {
        let store = test_store();
        store.add("x", &1u32, "t", None).await.unwrap();

        let err = store.lpush_str("tableName=>t:x", "y").await.unwrap_err();
        assert!(matches!(err, KvError::Command(_)));
    }

    #[tokio::test]
    async fn test_get_decode_mismatch() {
        let store = test_store();
        store.add("n", &42u32, "numbers", None).await.unwrap();

        let err = store.get::<User>("n", "numbers").await.unwrap_err();
        assert!(matches!(err, KvError::Serde(_)));
    }

    #[tokio::test]
    async fn test_unexpected_reply_shapes() {
        let store = TableStore::new(FixedReply(Reply::Ok));

        let err = store.add("k", &1u32, "t", None).await.unwrap_err();
        assert!(matches!(
            err,
            KvError::UnexpectedReply { command: "SETNX", .. }
        ));

        let err = store.get::<u32>("k", "t").await.unwrap_err();
        assert!(matches!(
            err,
            KvError::UnexpectedReply { command: "GET", .. }
        ));

        let err = store.table_data::<u32>("t").await.unwrap_err();
        assert!(matches!(
            err,
            KvError::UnexpectedReply { command: "KEYS", .. }
        ));
    }

    #[tokio::test]
    async fn test_negative_push_length_is_rejected() {
        let store = TableStore::new(FixedReply(Reply::Integer(-1)));

        let err = store.rpush_str("q", "x").await.unwrap_err();
        assert!(matches!(
            err,
            KvError::UnexpectedReply { command: "RPUSH", .. }
        ));
    }

    #[derive(Clone, Copy)]
    struct PrettyJson;

    impl Codec for PrettyJson {
        fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes> {
            Ok(Bytes::from(serde_json::to_vec_pretty(value)?))
        }

        fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
            Ok(serde_json::from_slice(bytes)?)
        }
    }

    #[tokio::test]
    async fn test_custom_codec() {
        let store = TableStore::with_codec(MemoryEngine::new(), PrettyJson);

        store.update("u1", &sample_user(), "users", None).await.unwrap();
        let back: Option<User> = store.get("u1", "users").await.unwrap();
        assert_eq!(back, Some(sample_user()));
    }

    #[tokio::test]
    async fn test_update_then_scan() -> anyhow::Result<()> {
        let store = test_store();

        store.update("u1", &sample_user(), "users", None).await?;
        store.update("u1", &sample_user(), "archive", None).await?;
        store.delete("u1", "archive").await?;

        let data: HashMap<String, User> = store.table_data("users").await?;
        assert_eq!(data.len(), 1);
        let archived: HashMap<String, User> = store.table_data("archive").await?;
        assert!(archived.is_empty());
        Ok(())
    }
}
