//! GPU-hosted neural worker backend.
//!
//! The worker exposes one `/synthesize` endpoint taking JSON and returning
//! base64 WAV. Model loading, device placement and scaling are the
//! worker's problem; this client only enforces the text-length limit the
//! worker advertises and maps its error envelope onto [`SynthError`].

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::{Synthesis, SynthesisBackend, SynthesisRequest, SynthError, Voice};

const CONTENT_TYPE: &str = "audio/wav";

/// Neural TTS backend speaking to a GPU worker over HTTP.
pub struct GpuBackend {
    http: reqwest::Client,
    base_url: String,
    max_text_len: usize,
}

impl GpuBackend {
    /// Creates a backend for the worker at `base_url` with the given
    /// text-length limit.
    pub fn new(base_url: impl Into<String>, max_text_len: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_text_len,
        }
    }
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

#[derive(Deserialize)]
struct WorkerResponse {
    status: String,
    #[serde(default)]
    audio: String,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl SynthesisBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Synthesis, SynthError> {
        let len = req.text.chars().count();
        if len > self.max_text_len {
            return Err(SynthError::TextTooLong {
                len,
                max: self.max_text_len,
            });
        }

        let url = format!("{}/synthesize", self.base_url);
        let voice = if req.voice.is_empty() {
            None
        } else {
            Some(req.voice.as_str())
        };
        let response: WorkerResponse = self
            .http
            .post(&url)
            .json(&WorkerRequest {
                text: &req.text,
                language: req.options.language.as_deref(),
                voice,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "success" {
            let msg = response
                .error
                .unwrap_or_else(|| format!("worker status {}", response.status));
            return Err(SynthError::Backend(msg));
        }

        let audio = BASE64.decode(&response.audio)?;
        if audio.is_empty() {
            return Err(SynthError::EmptyAudio);
        }

        Ok(Synthesis {
            audio,
            content_type: CONTENT_TYPE,
            word_timings: vec![],
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthError> {
        // The worker exposes no catalog; it synthesizes with its loaded
        // model's default voice (or a cloned one supplied out of band).
        Ok(vec![Voice {
            id: "default".to_string(),
            name: "Model default voice".to_string(),
            language: "en".to_string(),
            gender: None,
        }])
    }
}
