//! TTL-aware key-value store interface and implementations.
//!
//! Job records live behind this trait: every write carries a time-to-live,
//! and entries past their deadline read as absent. An in-memory
//! implementation backs tests and a redb-based implementation provides
//! persistence across restarts.

pub mod memory;
pub mod redb;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: corrupt entry for key {0}")]
    Corrupt(String),
}

/// Result type for KV operations.
pub type KvResult<T> = Result<T, KvError>;

/// TTL key-value store trait.
///
/// All operations are atomic with respect to a single key; there is no
/// multi-key transaction. Expiry is lazy: an entry whose deadline has
/// passed behaves as absent on `get`, `update`, `delete` and `scan`.
pub trait KvStore: Send + Sync {
    /// Get a live value by key. Expired entries read as `None`.
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Set a key-value pair, refreshing the TTL to `ttl` from now.
    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()>;

    /// Write only if the key currently holds a live entry.
    ///
    /// Returns `true` if the write happened. A missing or expired key is
    /// left untouched, which is what lets a background writer observe
    /// "the client abandoned this record" instead of resurrecting it.
    fn update(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<bool>;

    /// Delete a key. Returns `true` if a live entry existed.
    fn delete(&self, key: &str) -> KvResult<bool>;

    /// Scan live entries with the given key prefix, sorted by key.
    fn scan(&self, prefix: &str) -> KvResult<Vec<(String, Vec<u8>)>>;
}

impl fmt::Debug for dyn KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KvStore {{ ... }}")
    }
}

pub use memory::MemoryStore;
pub use redb::RedbStore;
