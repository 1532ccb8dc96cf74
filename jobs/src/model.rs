//! Job and segment records.

use std::fmt;

use chrono::Utc;
use murmur_synth::{WordTiming, extension_for};
use serde::{Deserialize, Serialize};

/// Upper bound on error messages captured into a job record.
pub const MAX_ERROR_LEN: usize = 1024;

/// Lifecycle state of a job.
///
/// Transitions are monotonic: `pending → processing → completed | failed`,
/// and nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One client-submitted synthesis request and its tracked lifecycle.
///
/// The record keeps the original text's length for provenance, never the
/// text itself. The segment list is ordered; the current design always
/// produces exactly one segment per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub voice: String,
    pub text_len: usize,
    #[serde(default)]
    pub prefer_phonemes: bool,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Creates a fresh `pending` record.
    pub fn new(job_id: impl Into<String>, voice: impl Into<String>, text_len: usize, prefer_phonemes: bool) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            created_at: Utc::now().to_rfc3339(),
            voice: voice.into(),
            text_len,
            prefer_phonemes,
            segments: Vec::new(),
            error: None,
        }
    }

    /// Marks the job failed, capturing a bounded copy of the message.
    pub fn fail(&mut self, message: &str) {
        self.status = JobStatus::Failed;
        self.error = Some(truncate_error(message));
    }
}

/// Derives the deterministic segment identifier for a job and ordinal.
pub fn segment_id(job_id: &str, index: usize) -> String {
    format!("{job_id}-seg-{index}")
}

/// One unit of synthesized audio belonging to a job.
///
/// Finalized atomically with the parent's terminal transition and never
/// mutated afterward. Its cache file exists if and only if the status is
/// `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub index: usize,
    pub status: JobStatus,
    pub audio_url: String,
    /// Cache file name, `{segment_id}.{ext}`. A reference, not ownership:
    /// the file is deleted together with the job.
    pub file: String,
    pub file_size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub word_timings: Vec<WordTiming>,
}

impl Segment {
    /// Builds a finalized `completed` segment for the given job ordinal.
    pub fn completed(
        job_id: &str,
        index: usize,
        content_type: &str,
        file_size: u64,
        word_timings: Vec<WordTiming>,
    ) -> Self {
        let id = segment_id(job_id, index);
        Self {
            audio_url: format!("/v1/tts/jobs/{job_id}/segments/{id}/audio"),
            file: format!("{id}.{}", extension_for(content_type)),
            id,
            index,
            status: JobStatus::Completed,
            file_size,
            content_type: content_type.to_string(),
            word_timings,
        }
    }
}

/// Truncates an error message to [`MAX_ERROR_LEN`] on a char boundary.
pub fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
