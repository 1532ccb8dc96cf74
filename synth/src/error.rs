//! Error types for synthesis backends.

use thiserror::Error;

/// Error type for synthesis backend operations.
#[derive(Error, Debug)]
pub enum SynthError {
    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// IO error (subprocess spawn, pipe).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine reported a failure.
    #[error("synthesis failed: {0}")]
    Backend(String),

    /// The engine succeeded but produced no audio.
    #[error("synthesis produced empty audio")]
    EmptyAudio,

    /// Input exceeds the engine's text length limit.
    #[error("text too long: {len} chars (max {max})")]
    TextTooLong { len: usize, max: usize },

    /// The engine did not answer within its deadline.
    #[error("synthesis timed out after {0}s")]
    Timeout(u64),
}
