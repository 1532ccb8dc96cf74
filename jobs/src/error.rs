//! Error taxonomy for the job pipeline.

use thiserror::Error;

use crate::JobStatus;

/// Errors surfaced by the job service and its stores.
///
/// Synthesis failures are deliberately absent: by the time a backend
/// fails, the creating call has long returned, so the failure is captured
/// into the job record and observed via status polling only.
#[derive(Error, Debug)]
pub enum JobError {
    /// Malformed client input; no record is created.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Job, segment or audio file absent (expired records included).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Action requires a state the job is not in.
    #[error("job is {status}, not completed")]
    InvalidState { status: JobStatus },

    /// The execution queue is full; the client should retry later.
    #[error("job queue is full")]
    Overloaded,

    /// Job store unreachable or holding a corrupt record. Fatal to the
    /// current operation, never retried automatically.
    #[error("store error: {0}")]
    Store(String),

    /// Audio cache IO failure.
    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),

    /// Backend-facing call (voice listing) failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<murmur_kv::KvError> for JobError {
    fn from(e: murmur_kv::KvError) -> Self {
        JobError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::Store(format!("bad job record: {e}"))
    }
}
