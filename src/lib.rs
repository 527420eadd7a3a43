//! TableKV - A table-namespaced data-access layer over a key-value engine
//!
//! TableKV groups flat key-value pairs into named tables by prefixing
//! every key with its table name, and offers the usual data-access verbs
//! on top: set-if-absent, upsert, delete, point reads, full-table scans
//! and FIFO/LIFO queues. Batched variants of the write operations reach
//! the engine in a single pipelined round-trip.
//!
//! The design keeps modules loosely coupled:
//! - Each module has a single, well-defined responsibility
//! - The engine is swappable behind one trait, the embedded
//!   [`MemoryEngine`] is the default
//! - Value encoding is swappable behind the [`Codec`] trait, JSON is
//!   the default
//!
//! ```
//! # #[tokio::main]
//! # async fn main() -> tablekv::Result<()> {
//! use tablekv::{MemoryEngine, TableStore};
//!
//! let store = TableStore::new(MemoryEngine::new());
//! store.update("u1", &"ada", "users", None).await?;
//!
//! let name: Option<String> = store.get("u1", "users").await?;
//! assert_eq!(name.as_deref(), Some("ada"));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod engine;
pub mod error;
pub mod key;
pub mod store;

/// Re-export commonly used types
pub use codec::{Codec, JsonCodec};
pub use engine::{Command, Engine, MemoryEngine, Reply};
pub use error::{KvError, Result};
pub use store::TableStore;
