//! Offline phoneme engine backend.
//!
//! Shells out to `espeak-ng` for each synthesis, capturing WAV audio from
//! stdout. When phoneme input is requested the text is first converted to
//! IPA through an external phonemizer service and fed to espeak-ng with
//! `--ipa`; a failed conversion falls back to plain text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use crate::{Synthesis, SynthesisBackend, SynthesisRequest, SynthError, Voice};

const CONTENT_TYPE: &str = "audio/wav";

const PHONEMIZE_TIMEOUT: Duration = Duration::from_secs(10);

/// Offline TTS backend wrapping the espeak-ng binary.
pub struct EspeakBackend {
    /// Speaking speed in words per minute.
    speed: u32,
    /// Per-call subprocess deadline in seconds.
    timeout_secs: u64,
    /// Phonemizer service base URL, if phoneme input is available.
    phonemizer_url: Option<String>,
    http: reqwest::Client,
}

impl EspeakBackend {
    /// Creates a backend with the given speaking speed (words per minute).
    pub fn new(speed: u32) -> Self {
        Self {
            speed,
            timeout_secs: 30,
            phonemizer_url: None,
            http: reqwest::Client::new(),
        }
    }

    /// Sets the phonemizer service used for IPA conversion.
    pub fn with_phonemizer(mut self, base_url: impl Into<String>) -> Self {
        self.phonemizer_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Overrides the per-call subprocess deadline.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Probes whether the espeak-ng binary is runnable.
    pub async fn available(&self) -> bool {
        match Command::new("espeak-ng")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    /// Converts text to IPA phonemes, or `None` if conversion is
    /// unavailable or fails (caller falls back to plain text).
    async fn phonemize(&self, text: &str) -> Option<String> {
        let base = self.phonemizer_url.as_deref()?;
        let url = format!("{base}/v1/dicts/phonemize");

        #[derive(Deserialize)]
        struct PhonemizeResponse {
            phonemes: Option<String>,
        }

        let result = self
            .http
            .get(&url)
            .query(&[("text", text)])
            .timeout(PHONEMIZE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<PhonemizeResponse>().await {
                    Ok(body) => body.phonemes.filter(|p| !p.is_empty()),
                    Err(e) => {
                        warn!(error = %e, "espeak: bad phonemizer response");
                        None
                    }
                }
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "espeak: phonemizer rejected request");
                None
            }
            Err(e) => {
                warn!(error = %e, "espeak: phonemizer unreachable");
                None
            }
        }
    }
}

#[async_trait]
impl SynthesisBackend for EspeakBackend {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Synthesis, SynthError> {
        let mut input = req.text.clone();
        let mut ipa_mode = false;

        if req.options.prefer_phonemes {
            if let Some(phonemes) = self.phonemize(&req.text).await {
                input = phonemes;
                ipa_mode = true;
            } else {
                warn!("espeak: phoneme conversion failed, using plain text");
            }
        }

        let mut cmd = Command::new("espeak-ng");
        cmd.arg("-v")
            .arg(&req.voice)
            .arg("-s")
            .arg(self.speed.to_string())
            .arg("--stdout");
        if ipa_mode {
            cmd.arg("--ipa");
        }
        cmd.arg(&input);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        // Reap the subprocess if the deadline fires.
        cmd.kill_on_drop(true);

        let run = async {
            let output = cmd.spawn()?.wait_with_output().await?;
            Ok::<_, SynthError>(output)
        };
        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| SynthError::Timeout(self.timeout_secs))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthError::Backend(stderr));
        }
        if output.stdout.is_empty() {
            return Err(SynthError::EmptyAudio);
        }

        Ok(Synthesis {
            audio: output.stdout,
            content_type: CONTENT_TYPE,
            word_timings: vec![],
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>, SynthError> {
        let output = Command::new("espeak-ng")
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SynthError::Backend(stderr));
        }

        Ok(parse_voice_table(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn healthy(&self) -> bool {
        self.available().await
    }
}

/// Parses `espeak-ng --voices` output.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other_langs`; the
/// header line is skipped and short rows ignored.
fn parse_voice_table(table: &str) -> Vec<Voice> {
    let mut voices = Vec::new();
    for line in table.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let language = parts[1].to_string();
        let name = parts[3].to_string();
        let gender = match parts[2].rsplit('/').next() {
            Some("M") => Some("Male".to_string()),
            Some("F") => Some("Female".to_string()),
            _ => None,
        };
        voices.push(Voice {
            id: name.clone(),
            name,
            language,
            gender,
        });
    }
    voices
}
