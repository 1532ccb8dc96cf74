//! Background job execution.
//!
//! A bounded worker pool replaces the original per-job detached tasks:
//! workers own long-lived store handles and receive work over an mpsc
//! channel, so queue depth is the backpressure knob and nothing sets up a
//! fresh connection per job.

use std::sync::Arc;

use murmur_synth::{SynthesisBackend, SynthesisOptions, SynthesisRequest};
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, warn};

use crate::{AudioCache, Job, JobError, JobStatus, JobStore, Segment};

/// One unit of work handed to the pool. The text travels here rather than
/// in the record - the store keeps only its length.
#[derive(Debug)]
pub struct ExecuteRequest {
    pub job_id: String,
    pub text: String,
}

/// Cloneable submission handle for the worker pool.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: mpsc::Sender<ExecuteRequest>,
}

impl ExecutorHandle {
    /// Enqueues a job without blocking. A full queue is backpressure,
    /// surfaced as [`JobError::Overloaded`].
    pub fn submit(&self, req: ExecuteRequest) -> Result<(), JobError> {
        self.tx.try_send(req).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => JobError::Overloaded,
            mpsc::error::TrySendError::Closed(_) => {
                JobError::Store("executor stopped".to_string())
            }
        })
    }
}

/// The background worker pool.
pub struct Executor;

impl Executor {
    /// Spawns `workers` worker tasks sharing a queue of `queue_depth`
    /// and returns the submission handle. Workers run for the lifetime
    /// of the runtime; dropping every handle shuts them down.
    pub fn spawn(
        workers: usize,
        queue_depth: usize,
        store: JobStore,
        cache: AudioCache,
        backend: Arc<dyn SynthesisBackend>,
    ) -> ExecutorHandle {
        let (tx, rx) = mpsc::channel::<ExecuteRequest>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for id in 0..workers.max(1) {
            let rx = rx.clone();
            let store = store.clone();
            let cache = cache.clone();
            let backend = backend.clone();
            tokio::spawn(async move {
                loop {
                    let req = { rx.lock().await.recv().await };
                    match req {
                        Some(req) => run_job(&store, &cache, backend.as_ref(), req).await,
                        None => break,
                    }
                }
                info!(worker = id, "executor worker stopped");
            });
        }

        ExecutorHandle { tx }
    }
}

/// Drives one job to a terminal state. Never propagates an error: every
/// failure inside is absorbed into a `failed` record (or logged when even
/// that write is impossible).
async fn run_job(
    store: &JobStore,
    cache: &AudioCache,
    backend: &dyn SynthesisBackend,
    req: ExecuteRequest,
) {
    if let Err(e) = process(store, cache, backend, &req).await {
        // The store itself is down; the record will age out via TTL.
        error!(job_id = %req.job_id, error = %e, "job execution failed without a terminal write");
    }
}

async fn process(
    store: &JobStore,
    cache: &AudioCache,
    backend: &dyn SynthesisBackend,
    req: &ExecuteRequest,
) -> Result<(), JobError> {
    // Re-read: defends against the record not being visible yet, and
    // against create-then-delete races. Absent means abandoned.
    let Some(mut job) = store.get(&req.job_id)? else {
        warn!(job_id = %req.job_id, "job vanished before execution");
        return Ok(());
    };

    job.status = JobStatus::Processing;
    if !store.update(&job)? {
        warn!(job_id = %req.job_id, "job expired before processing");
        return Ok(());
    }

    info!(
        job_id = %req.job_id,
        backend = backend.name(),
        chars = req.text.chars().count(),
        "starting synthesis"
    );

    let synth_req = SynthesisRequest {
        text: req.text.clone(),
        voice: job.voice.clone(),
        options: SynthesisOptions {
            prefer_phonemes: job.prefer_phonemes,
            language: None,
        },
    };

    // Exactly one backend call per job; no retry on failure.
    match backend.synthesize(&synth_req).await {
        Ok(synthesis) if !synthesis.audio.is_empty() => {
            let segment = Segment::completed(
                &job.job_id,
                0,
                synthesis.content_type,
                synthesis.audio.len() as u64,
                synthesis.word_timings,
            );

            // Write-then-publish: the audio file must be retrievable
            // before any reader can observe `completed`.
            if let Err(e) = cache.write(&segment.file, &synthesis.audio).await {
                job.fail(&format!("failed to persist audio: {e}"));
                publish(store, cache, &job).await?;
                return Ok(());
            }

            job.status = JobStatus::Completed;
            job.segments = vec![segment];
            publish(store, cache, &job).await?;
            info!(job_id = %job.job_id, size = job.segments[0].file_size, "job completed");
        }
        Ok(_) => {
            job.fail("synthesis produced empty audio");
            publish(store, cache, &job).await?;
            warn!(job_id = %job.job_id, "job failed: empty audio");
        }
        Err(e) => {
            job.fail(&e.to_string());
            publish(store, cache, &job).await?;
            warn!(job_id = %job.job_id, error = %e, "job failed");
        }
    }

    Ok(())
}

/// Publishes a terminal record. If the record expired or was deleted
/// mid-flight the write no-ops; any audio already materialized is removed
/// so an abandoned job cannot leak a cache file.
async fn publish(store: &JobStore, cache: &AudioCache, job: &Job) -> Result<(), JobError> {
    if store.update(job)? {
        return Ok(());
    }
    warn!(job_id = %job.job_id, status = %job.status, "record gone, terminal write dropped");
    for segment in &job.segments {
        if let Err(e) = cache.delete(&segment.file).await {
            warn!(job_id = %job.job_id, file = %segment.file, error = %e, "orphan cache cleanup failed");
        }
    }
    Ok(())
}
