//! Common request/response types shared by all backends.

use serde::{Deserialize, Serialize};

/// One synthesis request handed to a backend.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Text to synthesize. Already trimmed and validated non-empty.
    pub text: String,
    /// Voice identifier, engine-specific.
    pub voice: String,
    /// Engine tuning knobs.
    pub options: SynthesisOptions,
}

/// Backend tuning options carried alongside a request.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Convert text to IPA phonemes before synthesis, where supported.
    pub prefer_phonemes: bool,
    /// Language hint for engines that want one.
    pub language: Option<String>,
}

/// The result of one successful synthesis call.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Audio bytes in the backend's native format.
    pub audio: Vec<u8>,
    /// Content type of `audio`.
    pub content_type: &'static str,
    /// Word-level timing markers, empty if the engine has none.
    pub word_timings: Vec<WordTiming>,
}

/// Timing marker for one spoken token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    /// The spoken token.
    pub text: String,
    /// Start offset from the beginning of the audio, in milliseconds.
    pub offset_ms: f64,
    /// Duration of the token, in milliseconds.
    pub duration_ms: f64,
}

/// One entry of a backend's voice catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}
