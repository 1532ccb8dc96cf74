//! TTL-backed job record store.

use std::sync::Arc;
use std::time::Duration;

use murmur_kv::KvStore;

use crate::{Job, JobError};

/// Namespace prefix for job record keys.
const KEY_PREFIX: &str = "murmur:job:";

/// The authoritative store for job records.
///
/// A thin schema layer over a [`KvStore`]: records are serialized with a
/// fixed serde shape (stored bytes that fail to deserialize are a store
/// error, not silently trusted), keys are namespaced, and every write
/// refreshes the configured TTL. A record untouched for the TTL window
/// reads as absent, indistinguishable from never created.
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(job_id: &str) -> String {
        format!("{KEY_PREFIX}{job_id}")
    }

    /// Writes a record unconditionally, refreshing its TTL.
    pub fn put(&self, job: &Job) -> Result<(), JobError> {
        let raw = serde_json::to_vec(job)?;
        self.kv.put(&Self::key(&job.job_id), &raw, self.ttl)?;
        Ok(())
    }

    /// Writes a record only if it still exists (single-writer terminal
    /// transitions use this so an expired or deleted job is not
    /// resurrected). Returns whether the write happened.
    pub fn update(&self, job: &Job) -> Result<bool, JobError> {
        let raw = serde_json::to_vec(job)?;
        Ok(self.kv.update(&Self::key(&job.job_id), &raw, self.ttl)?)
    }

    /// Reads a record; `None` covers both never-created and expired.
    pub fn get(&self, job_id: &str) -> Result<Option<Job>, JobError> {
        match self.kv.get(&Self::key(job_id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Deletes a record, reporting whether it existed.
    pub fn delete(&self, job_id: &str) -> Result<bool, JobError> {
        Ok(self.kv.delete(&Self::key(job_id))?)
    }
}
