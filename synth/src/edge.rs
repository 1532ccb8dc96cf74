//! Cloud voice engine backend.
//!
//! Talks to an edge-tts relay over HTTP: one POST per synthesis, audio
//! returned base64-encoded together with word-boundary events. Boundary
//! offsets arrive in 100-nanosecond ticks and are converted to
//! milliseconds here, so the rest of the pipeline only ever sees ms.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    Synthesis, SynthesisBackend, SynthesisRequest, SynthError, Voice, WordTiming,
};

const CONTENT_TYPE: &str = "audio/mpeg";

/// Cloud TTS backend speaking to an edge-tts relay endpoint.
pub struct EdgeBackend {
    http: reqwest::Client,
    base_url: String,
}

impl EdgeBackend {
    /// Creates a backend for the relay at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
struct RelayResponse {
    audio: String,
    #[serde(default)]
    word_boundaries: Vec<RelayWordBoundary>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct RelayWordBoundary {
    text: String,
    /// Offset in 100ns ticks.
    offset: f64,
    /// Duration in 100ns ticks.
    duration: f64,
}

#[derive(Deserialize)]
struct RelayVoice {
    #[serde(rename = "ShortName")]
    short_name: String,
    #[serde(rename = "FriendlyName")]
    friendly_name: String,
    #[serde(rename = "Gender")]
    gender: String,
    #[serde(rename = "Locale")]
    locale: String,
}

#[async_trait]
impl SynthesisBackend for EdgeBackend {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Synthesis, SynthError> {
        let url = format!("{}/synthesize", self.base_url);
        let response: RelayResponse = self
            .http
            .post(&url)
            .json(&RelayRequest {
                text: &req.text,
                voice: &req.voice,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(SynthError::Backend(error));
        }

        let audio = BASE64.decode(&response.audio)?;
        if audio.is_empty() {
            return Err(SynthError::EmptyAudio);
        }

        let word_timings = response
            .word_boundaries
            .into_iter()
            .map(|b| WordTiming {
                text: b.text,
                offset_ms: b.offset / 10_000.0,
                duration_ms: b.duration / 10_000.0,
            })
            .collect();

        Ok(Synthesis {
            audio,
            content_type: CONTENT_TYPE,
            word_timings,
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthError> {
        let url = format!("{}/voices", self.base_url);
        let voices: Vec<RelayVoice> = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(voices
            .into_iter()
            .map(|v| Voice {
                id: v.short_name.clone(),
                name: v.friendly_name,
                language: v.locale,
                gender: Some(v.gender),
            })
            .collect())
    }
}
