//! The job service façade.

use std::sync::Arc;

use murmur_synth::{SynthesisBackend, Voice};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AudioCache, ExecuteRequest, ExecutorHandle, Job, JobError, JobStatus, JobStore,
};

/// Client-facing create parameters.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub text: String,
    pub voice: Option<String>,
    /// Legacy alias for `voice`, kept for API compatibility.
    pub model_id: Option<String>,
    pub prefer_phonemes: bool,
}

/// A completed segment's audio, ready for streaming.
#[derive(Debug)]
pub struct SegmentAudio {
    pub file: tokio::fs::File,
    pub size: u64,
    pub content_type: String,
    pub file_name: String,
}

/// The synchronous-looking API surface over the asynchronous pipeline.
///
/// Constructed explicitly with its collaborators; there is no global
/// store handle anywhere. Cloning shares the same underlying stores and
/// executor.
#[derive(Clone)]
pub struct JobService {
    store: JobStore,
    cache: AudioCache,
    backend: Arc<dyn SynthesisBackend>,
    executor: ExecutorHandle,
    default_voice: String,
}

impl JobService {
    pub fn new(
        store: JobStore,
        cache: AudioCache,
        backend: Arc<dyn SynthesisBackend>,
        executor: ExecutorHandle,
        default_voice: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            backend,
            executor,
            default_voice: default_voice.into(),
        }
    }

    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Creates a job and hands it to the executor.
    ///
    /// Returns as soon as the `pending` record is durably written and the
    /// work item enqueued - never waits for synthesis. On a full queue
    /// the just-written record is removed again so no orphan `pending`
    /// job lingers.
    pub async fn create(&self, req: CreateRequest) -> Result<Job, JobError> {
        let text = req.text.trim();
        if text.is_empty() {
            return Err(JobError::InvalidRequest("text is required"));
        }

        let voice = req
            .voice
            .filter(|v| !v.is_empty())
            .or(req.model_id.filter(|v| !v.is_empty()))
            .unwrap_or_else(|| self.default_voice.clone());

        let job = Job::new(
            Uuid::new_v4().to_string(),
            voice,
            text.chars().count(),
            req.prefer_phonemes,
        );
        self.store.put(&job)?;

        if let Err(e) = self.executor.submit(ExecuteRequest {
            job_id: job.job_id.clone(),
            text: text.to_string(),
        }) {
            if let Err(del) = self.store.delete(&job.job_id) {
                warn!(job_id = %job.job_id, error = %del, "failed to remove unqueued record");
            }
            return Err(e);
        }

        info!(job_id = %job.job_id, voice = %job.voice, chars = job.text_len, "job created");
        Ok(job)
    }

    /// Reads the job record; expired and never-created are the same.
    pub async fn status(&self, job_id: &str) -> Result<Job, JobError> {
        self.store.get(job_id)?.ok_or(JobError::NotFound("job"))
    }

    /// Opens a completed segment's audio for streaming.
    pub async fn segment_audio(
        &self,
        job_id: &str,
        segment_id: &str,
    ) -> Result<SegmentAudio, JobError> {
        let job = self.status(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(JobError::InvalidState { status: job.status });
        }
        let segment = job
            .segments
            .iter()
            .find(|s| s.id == segment_id)
            .ok_or(JobError::NotFound("segment"))?;
        self.open_segment_audio(&segment.file, &segment.content_type)
            .await
    }

    /// Opens the whole job's audio: with single-segment jobs this is the
    /// first segment's file.
    pub async fn job_audio(&self, job_id: &str) -> Result<SegmentAudio, JobError> {
        let job = self.status(job_id).await?;
        if job.status != JobStatus::Completed {
            return Err(JobError::InvalidState { status: job.status });
        }
        let segment = job.segments.first().ok_or(JobError::NotFound("segment"))?;
        self.open_segment_audio(&segment.file, &segment.content_type)
            .await
    }

    async fn open_segment_audio(
        &self,
        file_name: &str,
        content_type: &str,
    ) -> Result<SegmentAudio, JobError> {
        // Covers the crash-between-write-and-publish edge: a completed
        // record pointing at a missing file reads as not found.
        let (file, size) = self
            .cache
            .open(file_name)
            .await?
            .ok_or(JobError::NotFound("audio file"))?;
        Ok(SegmentAudio {
            file,
            size,
            content_type: content_type.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Deletes a job and its audio, cache files first so a crash
    /// mid-delete never leaves a completed record pointing at nothing.
    pub async fn delete(&self, job_id: &str) -> Result<(), JobError> {
        let job = self.store.get(job_id)?.ok_or(JobError::NotFound("job"))?;

        for segment in &job.segments {
            if let Err(e) = self.cache.delete(&segment.file).await {
                warn!(job_id, file = %segment.file, error = %e, "cache delete failed");
            }
        }
        self.store.delete(job_id)?;
        info!(job_id, "job deleted");
        Ok(())
    }

    /// Lists the backend's voice catalog.
    pub async fn voices(&self) -> Result<Vec<Voice>, JobError> {
        self.backend
            .voices()
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use murmur_kv::{KvStore as _, MemoryStore};
    use murmur_synth::{Synthesis, SynthError, SynthesisRequest, WordTiming};

    use crate::Executor;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Empty,
        Slow,
    }

    struct MockBackend {
        behavior: Behavior,
    }

    #[async_trait]
    impl SynthesisBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }
        fn content_type(&self) -> &'static str {
            "audio/wav"
        }
        async fn synthesize(&self, _req: &SynthesisRequest) -> Result<Synthesis, SynthError> {
            match self.behavior {
                Behavior::Succeed => Ok(Synthesis {
                    audio: b"RIFFmockaudio".to_vec(),
                    content_type: "audio/wav",
                    word_timings: vec![WordTiming {
                        text: "hello".into(),
                        offset_ms: 0.0,
                        duration_ms: 320.0,
                    }],
                }),
                Behavior::Fail => Err(SynthError::Backend("engine exploded".into())),
                Behavior::Empty => Ok(Synthesis {
                    audio: vec![],
                    content_type: "audio/wav",
                    word_timings: vec![],
                }),
                Behavior::Slow => {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok(Synthesis {
                        audio: b"RIFFslow".to_vec(),
                        content_type: "audio/wav",
                        word_timings: vec![],
                    })
                }
            }
        }
        async fn voices(&self) -> Result<Vec<Voice>, SynthError> {
            Ok(vec![Voice {
                id: "mock-voice".into(),
                name: "Mock Voice".into(),
                language: "en".into(),
                gender: None,
            }])
        }
    }

    struct Fixture {
        kv: MemoryStore,
        service: JobService,
        cache: AudioCache,
        _dir: tempfile::TempDir,
    }

    fn fixture(behavior: Behavior) -> Fixture {
        fixture_with_ttl(behavior, Duration::from_secs(60))
    }

    fn fixture_with_ttl(behavior: Behavior, ttl: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let kv = MemoryStore::new();
        let store = JobStore::new(Arc::new(kv.clone()), ttl);
        let cache = AudioCache::new(dir.path().join("cache")).unwrap();
        let backend: Arc<dyn SynthesisBackend> = Arc::new(MockBackend { behavior });
        let executor = Executor::spawn(2, 16, store.clone(), cache.clone(), backend.clone());
        let service = JobService::new(store, cache.clone(), backend, executor, "en-us");
        Fixture { kv, service, cache, _dir: dir }
    }

    async fn wait_terminal(service: &JobService, job_id: &str) -> Job {
        for _ in 0..200 {
            let job = service.status(job_id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_create_returns_pending_promptly() {
        let f = fixture(Behavior::Slow);
        let started = std::time::Instant::now();
        let job = f
            .service
            .create(CreateRequest { text: "Hello world".into(), ..Default::default() })
            .await
            .unwrap();

        // Must not have waited for the 150ms synthesis.
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.voice, "en-us");
        assert!(job.segments.is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_default_voice() {
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "Hello world".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(job.voice, "en-us");

        let done = wait_terminal(&f.service, &job.job_id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.segments.len(), 1);
        let segment = &done.segments[0];
        assert_eq!(segment.id, format!("{}-seg-0", job.job_id));
        assert_eq!(segment.content_type, "audio/wav");
        assert_eq!(segment.word_timings.len(), 1);

        let audio = f
            .service
            .segment_audio(&job.job_id, &segment.id)
            .await
            .unwrap();
        assert!(audio.size > 0);
        assert_eq!(audio.content_type, "audio/wav");
    }

    #[tokio::test]
    async fn test_voice_resolution_order() {
        let f = fixture(Behavior::Succeed);

        let explicit = f
            .service
            .create(CreateRequest {
                text: "hi".into(),
                voice: Some("en-gb".into()),
                model_id: Some("ignored".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(explicit.voice, "en-gb");

        let alias = f
            .service
            .create(CreateRequest {
                text: "hi".into(),
                model_id: Some("legacy-voice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(alias.voice, "legacy-voice");
    }

    #[tokio::test]
    async fn test_whitespace_text_creates_nothing() {
        let f = fixture(Behavior::Succeed);
        let err = f
            .service
            .create(CreateRequest { text: "   ".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidRequest(_)));
        // No record of any kind was written.
        assert!(f.kv.scan("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_backend_captured_in_record() {
        let f = fixture(Behavior::Fail);
        let job = f
            .service
            .create(CreateRequest { text: "boom".into(), ..Default::default() })
            .await
            .unwrap();

        let done = wait_terminal(&f.service, &job.job_id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.as_deref().unwrap().contains("engine exploded"));

        let err = f
            .service
            .segment_audio(&job.job_id, &format!("{}-seg-0", job.job_id))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidState { status: JobStatus::Failed }));
    }

    #[tokio::test]
    async fn test_empty_audio_is_failure() {
        let f = fixture(Behavior::Empty);
        let job = f
            .service
            .create(CreateRequest { text: "silence".into(), ..Default::default() })
            .await
            .unwrap();
        let done = wait_terminal(&f.service, &job.job_id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.is_some());
    }

    #[tokio::test]
    async fn test_status_is_monotonic_after_terminal() {
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        wait_terminal(&f.service, &job.job_id).await;

        for _ in 0..10 {
            let seen = f.service.status(&job.job_id).await.unwrap();
            assert_eq!(seen.status, JobStatus::Completed);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test]
    async fn test_completed_audio_always_retrievable() {
        // Write-before-publish: the instant status reads completed, the
        // file must resolve.
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        let done = wait_terminal(&f.service, &job.job_id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert!(f.cache.exists(&done.segments[0].file));
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_audio() {
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        let done = wait_terminal(&f.service, &job.job_id).await;
        let file = done.segments[0].file.clone();
        assert!(f.cache.exists(&file));

        f.service.delete(&job.job_id).await.unwrap();

        assert!(matches!(
            f.service.status(&job.job_id).await.unwrap_err(),
            JobError::NotFound("job")
        ));
        assert!(matches!(
            f.service.segment_audio(&job.job_id, &done.segments[0].id).await.unwrap_err(),
            JobError::NotFound("job")
        ));
        assert!(!f.cache.exists(&file));

        // Deleting twice never succeeds the second time.
        assert!(matches!(
            f.service.delete(&job.job_id).await.unwrap_err(),
            JobError::NotFound("job")
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown_job() {
        let f = fixture(Behavior::Succeed);
        assert!(matches!(
            f.service.delete("no-such-job").await.unwrap_err(),
            JobError::NotFound("job")
        ));
    }

    #[tokio::test]
    async fn test_unknown_segment_is_not_found() {
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        wait_terminal(&f.service, &job.job_id).await;

        let err = f
            .service
            .segment_audio(&job.job_id, "bogus-seg-9")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound("segment")));
    }

    #[tokio::test]
    async fn test_missing_cache_file_is_not_found() {
        // Completed record whose file was lost out-of-band (storage
        // failure injected after completion).
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        let done = wait_terminal(&f.service, &job.job_id).await;
        f.cache.delete(&done.segments[0].file).await.unwrap();

        let err = f
            .service
            .segment_audio(&job.job_id, &done.segments[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound("audio file")));
    }

    #[tokio::test]
    async fn test_ttl_expiry_looks_never_created() {
        let f = fixture_with_ttl(Behavior::Succeed, Duration::from_millis(40));
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        wait_terminal(&f.service, &job.job_id).await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(matches!(
            f.service.status(&job.job_id).await.unwrap_err(),
            JobError::NotFound("job")
        ));
    }

    #[tokio::test]
    async fn test_job_audio_uses_first_segment() {
        let f = fixture(Behavior::Succeed);
        let job = f
            .service
            .create(CreateRequest { text: "hi".into(), ..Default::default() })
            .await
            .unwrap();
        wait_terminal(&f.service, &job.job_id).await;

        let audio = f.service.job_audio(&job.job_id).await.unwrap();
        assert!(audio.size > 0);
        assert_eq!(audio.file_name, format!("{}-seg-0.wav", job.job_id));
    }

    #[tokio::test]
    async fn test_voices_passthrough() {
        let f = fixture(Behavior::Succeed);
        let voices = f.service.voices().await.unwrap();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].id, "mock-voice");
    }
}
