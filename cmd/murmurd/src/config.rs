//! Environment configuration.
//!
//! Everything is read once at startup; nothing in the pipeline consults
//! the environment afterward.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail};

/// Which synthesis engine this instance runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Edge,
    Espeak,
    Gpu,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "edge" => Ok(BackendKind::Edge),
            "espeak" => Ok(BackendKind::Espeak),
            "gpu" => Ok(BackendKind::Gpu),
            other => bail!("unknown backend {other:?} (expected edge, espeak or gpu)"),
        }
    }
}

impl BackendKind {
    /// The voice used when a request names none.
    pub fn default_voice(&self) -> &'static str {
        match self {
            BackendKind::Edge => "en-US-AriaNeural",
            BackendKind::Espeak => "en-us",
            BackendKind::Gpu => "default",
        }
    }
}

/// Daemon configuration, `MURMUR_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub store_path: PathBuf,
    pub cache_dir: PathBuf,
    pub backend: BackendKind,
    pub default_voice: String,
    pub job_ttl: Duration,
    pub workers: usize,
    pub queue_depth: usize,
    pub edge_url: String,
    pub gpu_url: String,
    pub max_text_len: usize,
    pub espeak_speed: u32,
    pub phonemizer_url: Option<String>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let backend: BackendKind = env_or("MURMUR_BACKEND", "espeak")
            .parse()
            .map_err(|e: anyhow::Error| e.context("MURMUR_BACKEND"))?;

        Ok(Self {
            addr: env_or("MURMUR_ADDR", "0.0.0.0:8080"),
            store_path: env_or("MURMUR_STORE_PATH", "/data/murmur.redb").into(),
            cache_dir: env_or("MURMUR_CACHE_DIR", "/data/cache").into(),
            default_voice: env_or("MURMUR_DEFAULT_VOICE", backend.default_voice()),
            backend,
            job_ttl: Duration::from_secs(env_parse("MURMUR_JOB_TTL_SECS", 3600u64)?),
            workers: env_parse("MURMUR_WORKERS", 4usize)?,
            queue_depth: env_parse("MURMUR_QUEUE_DEPTH", 64usize)?,
            edge_url: env_or("MURMUR_EDGE_URL", "http://localhost:8001"),
            gpu_url: env_or("MURMUR_GPU_URL", "http://localhost:8080"),
            max_text_len: env_parse("MURMUR_MAX_TEXT_LEN", 5000usize)?,
            espeak_speed: env_parse("MURMUR_ESPEAK_SPEED", 175u32)?,
            phonemizer_url: std::env::var("MURMUR_PHONEMIZER_URL").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("edge".parse::<BackendKind>().unwrap(), BackendKind::Edge);
        assert_eq!("espeak".parse::<BackendKind>().unwrap(), BackendKind::Espeak);
        assert_eq!("gpu".parse::<BackendKind>().unwrap(), BackendKind::Gpu);
        assert!("piper".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_default_voice_per_backend() {
        assert_eq!(BackendKind::Edge.default_voice(), "en-US-AriaNeural");
        assert_eq!(BackendKind::Espeak.default_voice(), "en-us");
        assert_eq!(BackendKind::Gpu.default_voice(), "default");
    }
}
