//! Pluggable text-to-speech synthesis backends.
//!
//! The job pipeline is backend-agnostic: everything engine-specific sits
//! behind [`SynthesisBackend`], a single opaque capability that turns text
//! into audio bytes plus optional word-level timing data. Three
//! implementations are provided:
//! - [`EdgeBackend`]: cloud voice engine behind an HTTP relay (MP3).
//! - [`EspeakBackend`]: offline espeak-ng subprocess, optional IPA phoneme
//!   input via an external phonemizer service (WAV).
//! - [`GpuBackend`]: GPU-hosted neural worker speaking a small JSON
//!   protocol (WAV).

mod edge;
mod error;
mod espeak;
mod gpu;
mod types;

pub use edge::*;
pub use error::*;
pub use espeak::*;
pub use gpu::*;
pub use types::*;

use async_trait::async_trait;

/// A synthesis engine, opaque to the job pipeline.
///
/// Implementations report failure as an error value; nothing engine-side
/// is allowed to panic across this boundary.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Short engine name, used in health reporting and logs.
    fn name(&self) -> &'static str;

    /// Content type of produced audio. Fixed per backend; also determines
    /// the cache file extension.
    fn content_type(&self) -> &'static str;

    /// Synthesizes the request into audio bytes, called exactly once per job.
    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Synthesis, SynthError>;

    /// Lists the voices this engine offers.
    async fn voices(&self) -> Result<Vec<Voice>, SynthError>;

    /// Cheap liveness probe for health reporting.
    async fn healthy(&self) -> bool {
        true
    }
}

/// Maps an audio content type to its cache file extension.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        _ => "bin",
    }
}
