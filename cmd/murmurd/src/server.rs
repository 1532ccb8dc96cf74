//! HTTP surface for the job service.
//!
//! API endpoints:
//! - GET    /health                                          - liveness + default voice
//! - GET    /v1/tts/voices                                   - backend voice catalog
//! - POST   /v1/tts/jobs                                     - create a synthesis job
//! - GET    /v1/tts/jobs/{job_id}                            - job record
//! - GET    /v1/tts/jobs/{job_id}/segments/{segment_id}/audio - segment audio stream
//! - GET    /v1/tts/jobs/{job_id}/audio                      - whole-job audio
//! - DELETE /v1/tts/jobs/{job_id}                            - delete job + audio

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

use murmur_jobs::{CreateRequest, Job, JobError, JobService, SegmentAudio};
use murmur_synth::{SynthesisBackend, Voice};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: JobService,
    pub backend: Arc<dyn SynthesisBackend>,
}

/// Error wrapper mapping [`JobError`] onto HTTP responses.
pub struct ApiError(JobError);

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            JobError::InvalidRequest(_) | JobError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            JobError::Store(_) | JobError::Cache(_) | JobError::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/tts/voices", get(list_voices))
        .route("/v1/tts/jobs", axum::routing::post(create_job))
        .route("/v1/tts/jobs/{job_id}", get(get_job).delete(delete_job))
        .route(
            "/v1/tts/jobs/{job_id}/segments/{segment_id}/audio",
            get(get_segment_audio),
        )
        .route("/v1/tts/jobs/{job_id}/audio", get(get_job_audio))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let healthy = state.backend.healthy().await;
    Json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": state.backend.name(),
        "default_voice": state.service.default_voice(),
    }))
}

#[derive(Serialize)]
struct VoicesResponse {
    voices: Vec<Voice>,
    count: usize,
}

async fn list_voices(State(state): State<AppState>) -> Result<Json<VoicesResponse>, ApiError> {
    let voices = state.service.voices().await?;
    let count = voices.len();
    Ok(Json(VoicesResponse { voices, count }))
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    #[serde(default)]
    text: String,
    #[serde(default)]
    voice: Option<String>,
    /// Legacy alias for `voice`.
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    prefer_phonemes: bool,
}

#[derive(Serialize)]
struct CreateJobResponse {
    job_id: String,
    status: &'static str,
    message: &'static str,
}

async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let job = state
        .service
        .create(CreateRequest {
            text: req.text,
            voice: req.voice,
            model_id: req.model_id,
            prefer_phonemes: req.prefer_phonemes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id: job.job_id,
            status: "pending",
            message: "Job created successfully",
        }),
    ))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.service.status(&job_id).await?))
}

async fn get_segment_audio(
    State(state): State<AppState>,
    Path((job_id, segment_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let audio = state.service.segment_audio(&job_id, &segment_id).await?;
    Ok(audio_response(audio))
}

async fn get_job_audio(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let audio = state.service.job_audio(&job_id).await?;
    Ok(audio_response(audio))
}

fn audio_response(audio: SegmentAudio) -> Response {
    let stream = ReaderStream::new(audio.file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, audio.content_type)
        .header(header::CONTENT_LENGTH, audio.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", audio.file_name),
        )
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.delete(&job_id).await?;
    Ok(Json(serde_json::json!({ "message": "Job deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use murmur_jobs::{AudioCache, Executor, JobStore};
    use murmur_kv::MemoryStore;
    use murmur_synth::{Synthesis, SynthError, SynthesisRequest};

    struct TestBackend {
        delay: Duration,
    }

    #[async_trait]
    impl SynthesisBackend for TestBackend {
        fn name(&self) -> &'static str {
            "test"
        }
        fn content_type(&self) -> &'static str {
            "audio/wav"
        }
        async fn synthesize(&self, _req: &SynthesisRequest) -> Result<Synthesis, SynthError> {
            tokio::time::sleep(self.delay).await;
            Ok(Synthesis {
                audio: b"RIFFtestwav".to_vec(),
                content_type: "audio/wav",
                word_timings: vec![],
            })
        }
        async fn voices(&self) -> Result<Vec<Voice>, SynthError> {
            Ok(vec![Voice {
                id: "en-us".into(),
                name: "en-us".into(),
                language: "en-us".into(),
                gender: None,
            }])
        }
    }

    fn app(delay: Duration) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let cache = AudioCache::new(dir.path().join("cache")).unwrap();
        let backend: Arc<dyn SynthesisBackend> = Arc::new(TestBackend { delay });
        let executor = Executor::spawn(2, 16, store.clone(), cache.clone(), backend.clone());
        let service = JobService::new(store, cache, backend.clone(), executor, "en-us");
        (router(AppState { service, backend }), dir)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app(Duration::ZERO);
        let resp = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["default_voice"], "en-us");
    }

    #[tokio::test]
    async fn test_voices() {
        let (app, _dir) = app(Duration::ZERO);
        let resp = app.oneshot(get_req("/v1/tts/voices")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["voices"][0]["id"], "en-us");
    }

    #[tokio::test]
    async fn test_create_empty_text_is_400() {
        let (app, _dir) = app(Duration::ZERO);
        let resp = app
            .oneshot(post_json("/v1/tts/jobs", r#"{"text": "   "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("text"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let (app, _dir) = app(Duration::ZERO);
        let resp = app.oneshot(get_req("/v1/tts/jobs/nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_audio_before_completion_is_400() {
        let (app, _dir) = app(Duration::from_millis(300));
        let resp = app
            .clone()
            .oneshot(post_json("/v1/tts/jobs", r#"{"text": "Hello world"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let uri = format!("/v1/tts/jobs/{job_id}/segments/{job_id}-seg-0/audio");
        let resp = app.oneshot(get_req(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("not completed"));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (app, _dir) = app(Duration::ZERO);

        // Create with no voice: default applies.
        let resp = app
            .clone()
            .oneshot(post_json("/v1/tts/jobs", r#"{"text": "Hello world"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "pending");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        // Poll until completed.
        let mut record = serde_json::Value::Null;
        for _ in 0..200 {
            let resp = app
                .clone()
                .oneshot(get_req(&format!("/v1/tts/jobs/{job_id}")))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            record = body_json(resp).await;
            if record["status"] == "completed" || record["status"] == "failed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(record["status"], "completed");
        assert_eq!(record["voice"], "en-us");
        let segment_id = record["segments"][0]["id"].as_str().unwrap().to_string();

        // Fetch audio.
        let uri = format!("/v1/tts/jobs/{job_id}/segments/{segment_id}/audio");
        let resp = app.clone().oneshot(get_req(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "audio/wav"
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(!bytes.is_empty());

        // Delete, then everything is gone.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/tts/jobs/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(get_req(&format!("/v1/tts/jobs/{job_id}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get_req(&uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
