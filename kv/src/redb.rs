//! Redb-based persistent TTL key-value store implementation.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableTable, TableDefinition};

use crate::{KvError, KvResult, KvStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Size of the deadline header prepended to each stored value.
const HEADER_LEN: usize = 8;

/// A persistent TTL key-value store backed by redb.
///
/// Each value is stored as an 8-byte big-endian unix-millis deadline
/// followed by the payload. Expiry is checked lazily; expired rows are
/// removed the next time they are touched.
pub struct RedbStore {
    db: Database,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn encode(value: &[u8], ttl: Duration) -> Vec<u8> {
    let deadline = now_millis().saturating_add(ttl.as_millis() as u64);
    let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
    buf.extend_from_slice(&deadline.to_be_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Decodes a stored row into its payload, or `None` if expired or corrupt.
fn decode(key: &str, raw: &[u8]) -> KvResult<Option<Vec<u8>>> {
    if raw.len() < HEADER_LEN {
        return Err(KvError::Corrupt(key.to_string()));
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&raw[..HEADER_LEN]);
    let deadline = u64::from_be_bytes(header);
    if now_millis() >= deadline {
        return Ok(None);
    }
    Ok(Some(raw[HEADER_LEN..].to_vec()))
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KvResult<Self> {
        let db = Database::create(path).map_err(|e| KvError::Storage(e.to_string()))?;

        // Create the table if it doesn't exist
        let tx = db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let _ = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;

        Ok(Self { db })
    }

    fn remove_row(&self, key: &str) -> KvResult<()> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KvError::Storage(e.to_string()))?;

        let raw = match table
            .get(key)
            .map_err(|e| KvError::Storage(e.to_string()))?
        {
            Some(value) => value.value().to_vec(),
            None => return Ok(None),
        };
        drop(table);

        match decode(key, &raw)? {
            Some(payload) => Ok(Some(payload)),
            None => {
                // Expired: drop the dead row so it does not linger on disk.
                self.remove_row(key)?;
                Ok(None)
            }
        }
    }

    fn put(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<()> {
        let encoded = encode(value, ttl);
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            table
                .insert(key, encoded.as_slice())
                .map_err(|e| KvError::Storage(e.to_string()))?;
        }
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(())
    }

    fn update(&self, key: &str, value: &[u8], ttl: Duration) -> KvResult<bool> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let written = {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            let live = match table
                .get(key)
                .map_err(|e| KvError::Storage(e.to_string()))?
            {
                Some(existing) => decode(key, existing.value())?.is_some(),
                None => false,
            };
            if live {
                let encoded = encode(value, ttl);
                table
                    .insert(key, encoded.as_slice())
                    .map_err(|e| KvError::Storage(e.to_string()))?;
            } else {
                // Clear an expired row while we hold the write transaction.
                table
                    .remove(key)
                    .map_err(|e| KvError::Storage(e.to_string()))?;
            }
            live
        };
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(written)
    }

    fn delete(&self, key: &str) -> KvResult<bool> {
        let tx = self
            .db
            .begin_write()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let existed = {
            let mut table = tx
                .open_table(TABLE)
                .map_err(|e| KvError::Storage(e.to_string()))?;
            match table
                .remove(key)
                .map_err(|e| KvError::Storage(e.to_string()))?
            {
                Some(removed) => decode(key, removed.value())?.is_some(),
                None => false,
            }
        };
        tx.commit().map_err(|e| KvError::Storage(e.to_string()))?;
        Ok(existed)
    }

    fn scan(&self, prefix: &str) -> KvResult<Vec<(String, Vec<u8>)>> {
        let tx = self
            .db
            .begin_read()
            .map_err(|e| KvError::Storage(e.to_string()))?;
        let table = tx
            .open_table(TABLE)
            .map_err(|e| KvError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        for item in table.iter().map_err(|e| KvError::Storage(e.to_string()))? {
            let (key, value) = item.map_err(|e| KvError::Storage(e.to_string()))?;
            let key = key.value().to_string();
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(payload) = decode(&key, value.value())? {
                results.push((key, payload));
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}
