//! murmurd - asynchronous text-to-speech job daemon.

mod config;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use murmur_jobs::{AudioCache, Executor, JobService, JobStore};
use murmur_kv::RedbStore;
use murmur_synth::{EdgeBackend, EspeakBackend, GpuBackend, SynthesisBackend};

use config::{BackendKind, Config};
use server::{AppState, router};

/// Asynchronous TTS job daemon.
///
/// Configuration comes from MURMUR_* environment variables; see config.rs
/// for the full list. The flags below override the environment.
#[derive(Parser, Debug)]
#[command(name = "murmurd")]
#[command(about = "Asynchronous text-to-speech job daemon")]
struct Args {
    /// Listen address (overrides MURMUR_ADDR)
    #[arg(short, long)]
    addr: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn build_backend(cfg: &Config) -> Arc<dyn SynthesisBackend> {
    match cfg.backend {
        BackendKind::Edge => Arc::new(EdgeBackend::new(&cfg.edge_url)),
        BackendKind::Espeak => {
            let mut backend = EspeakBackend::new(cfg.espeak_speed);
            if let Some(url) = &cfg.phonemizer_url {
                backend = backend.with_phonemizer(url);
            }
            Arc::new(backend)
        }
        BackendKind::Gpu => Arc::new(GpuBackend::new(&cfg.gpu_url, cfg.max_text_len)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut cfg = Config::from_env()?;
    if let Some(addr) = args.addr {
        cfg.addr = addr;
    }

    // Store and cache are opened once here and injected everywhere;
    // closing happens when the process exits.
    if let Some(parent) = cfg.store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let kv = RedbStore::open(&cfg.store_path)
        .with_context(|| format!("opening store {}", cfg.store_path.display()))?;
    let store = JobStore::new(Arc::new(kv), cfg.job_ttl);
    let cache = AudioCache::new(&cfg.cache_dir)
        .with_context(|| format!("creating cache dir {}", cfg.cache_dir.display()))?;

    let backend = build_backend(&cfg);
    let executor = Executor::spawn(
        cfg.workers,
        cfg.queue_depth,
        store.clone(),
        cache.clone(),
        backend.clone(),
    );
    let service = JobService::new(store, cache, backend.clone(), executor, &cfg.default_voice);

    let app = router(AppState { service, backend: backend.clone() });

    info!(
        addr = %cfg.addr,
        backend = backend.name(),
        default_voice = %cfg.default_voice,
        ttl_secs = cfg.job_ttl.as_secs(),
        workers = cfg.workers,
        "murmurd started"
    );

    let listener = tokio::net::TcpListener::bind(&cfg.addr)
        .await
        .with_context(|| format!("binding {}", cfg.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
