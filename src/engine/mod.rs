//! Key-value engine contract and the embedded implementation
//!
//! The data-access layer talks to its backing store through the
//! [`Engine`] trait: a small command set (strings, lists, expiration,
//! key scans) executed either one at a time or as a pipelined batch.
//! [`MemoryEngine`] is the embedded implementation; a driver for an
//! external Redis-compatible server would implement the same trait.

mod command;
mod entry;
mod memory;
mod value;

pub use command::{Command, Reply};
pub use entry::Entry;
pub use memory::{MemoryEngine, MemoryStore};
pub use value::Value;

use crate::error::{KvError, Result};
use async_trait::async_trait;

/// Backing store for the data-access layer
///
/// A pipelined batch is one round-trip: commands execute in order and
/// the replies come back in the same order, one per command. Errors at
/// this level mean the engine itself failed; a command that merely did
/// not find its key reports that through its [`Reply`].
#[async_trait]
pub trait Engine: Send + Sync {
    /// Execute a single command
    async fn request(&self, command: Command) -> Result<Reply> {
        self.pipeline(vec![command])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KvError::Engine("empty pipeline reply".to_string()))
    }

    /// Execute a batch of commands in one round-trip
    async fn pipeline(&self, commands: Vec<Command>) -> Result<Vec<Reply>>;
}
