//! In-memory TTL key-value store implementation for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::{KvError, KvResult, KvStore};

struct Entry {
    value: Vec<u8>,
    deadline: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// An in-memory TTL key-value store backed by a HashMap.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        match data.get(key) {
            Some(entry) if entry.live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                data.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                deadline: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn update(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<bool> {
        let now = Instant::now();
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        match data.get(key) {
            Some(entry) if entry.live(now) => {
                data.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_vec(),
                        deadline: now + ttl,
                    },
                );
                Ok(true)
            }
            Some(_) => {
                data.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> KvResult<bool> {
        let now = Instant::now();
        let mut data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        match data.remove(key) {
            Some(entry) => Ok(entry.live(now)),
            None => Ok(false),
        }
    }

    fn scan(&self, prefix: &str) -> KvResult<Vec<(String, Vec<u8>)>> {
        let now = Instant::now();
        let data = self
            .data
            .lock()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let mut results: Vec<(String, Vec<u8>)> = data
            .iter()
            .filter(|(k, entry)| k.starts_with(prefix) && entry.live(now))
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}
