//! HTTP API server.
//!
//! Accepts a URL to an audio file, adds themed BGM and returns either a
//! public S3 URL or the local path of the result.

use crate::audio::{download_audio, RemoteAudio};
use crate::cli::Output;
use crate::config::{ServerSettings, Settings};
use crate::error::UndertoneError;
use crate::pipeline::Pipeline;
use crate::storage::{self, processed_audio_key, ObjectStore, WAV_CONTENT_TYPE};
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub pipeline: Pipeline,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub http: reqwest::Client,
    pub settings: Settings,
    /// Serializes processing; one file at a time.
    pub processing: Mutex<()>,
}

impl AppState {
    pub fn new(
        pipeline: Pipeline,
        store: Option<Arc<dyn ObjectStore>>,
        settings: Settings,
    ) -> Self {
        Self {
            pipeline,
            store,
            http: reqwest::Client::new(),
            settings,
            processing: Mutex::new(()),
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(&settings)?;
    let store = storage::from_settings(&settings.storage)
        .await
        .map(|s| Arc::new(s) as Arc<dyn ObjectStore>);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let uploads = store.is_some();

    let state = Arc::new(AppState::new(pipeline, store, settings));
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Undertone API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("S3 upload", if uploads { "enabled" } else { "disabled" });
    println!();
    println!("Endpoints:");
    Output::kv("Root", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Process", "POST /process-audio");
    Output::kv("BGM files", "GET  /bgm-files");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router with CORS applied.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.server);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/process-audio", post(process_audio))
        .route("/bgm-files", get(bgm_files))
        .layer(cors)
        .with_state(state)
}

/// CORS policy from the configured origins.
///
/// `*` allows any origin except in production, where it allows none.
/// Credentials are only allowed with an explicit origin list.
fn cors_layer(server: &ServerSettings) -> CorsLayer {
    let base = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

    let wildcard = server.cors_origins.iter().any(|o| o == "*");
    if wildcard {
        let base = base.allow_headers(Any);
        if server.is_production() {
            warn!("CORS_ORIGINS is '*' in production; cross-origin requests are disabled");
            return base.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()));
        }
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    // Wildcard headers cannot be combined with credentials
    base.allow_headers(AllowHeaders::mirror_request())
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ProcessAudioRequest {
    s3_url: String,
    #[serde(default = "default_volume_reduction")]
    bgm_volume_reduction: f32,
}

fn default_volume_reduction() -> f32 {
    35.0
}

#[derive(Serialize)]
struct ProcessAudioResponse {
    status: &'static str,
    message: &'static str,
    original_filename: String,
    processed_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    s3_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_path: Option<PathBuf>,
}

/// Error response with an HTTP status and a `detail` message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "BGM Inserter API is running" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "service": "BGM Inserter API" }))
}

async fn bgm_files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "bgm_files": state.pipeline.catalog().list() }))
}

async fn process_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessAudioRequest>,
) -> Result<Json<ProcessAudioResponse>, ApiError> {
    let remote = RemoteAudio::parse(&req.s3_url).map_err(|e| match e {
        UndertoneError::InvalidInput(msg) => ApiError::bad_request(msg),
        other => ApiError::bad_request(other.to_string()),
    })?;

    let _guard = state.processing.lock().await;

    if let Some(max_age) = state.settings.server.output_retention() {
        if let Err(e) = state.pipeline.prune_outputs(max_age) {
            warn!("Failed to prune old outputs: {}", e);
        }
    }

    // Dropped at the end of the request, which removes the download
    let input = download_audio(
        &state.http,
        &remote,
        state.pipeline.temp_dir(),
        state.settings.max_file_size_bytes(),
    )
    .await
    .map_err(|e| ApiError::bad_request(format!("Error downloading file from URL: {}", e)))?;

    let result = state
        .pipeline
        .process(input.path(), None, req.bgm_volume_reduction)
        .await
        .map_err(|e| ApiError::internal(format!("Error processing audio: {}", e)))?;

    let output = result.output_path;
    let original_filename = remote.file_name.clone();
    let processed_filename = remote.processed_file_name();

    let Some(store) = &state.store else {
        info!("S3 upload disabled; keeping {}", output.display());
        return Ok(Json(ProcessAudioResponse {
            status: "success",
            message: "Audio processed successfully (S3 upload disabled)",
            original_filename,
            processed_filename,
            s3_url: None,
            local_path: Some(output),
        }));
    };

    let key = processed_audio_key(
        &state.settings.storage.prefix,
        &original_filename,
        chrono::Local::now(),
    );
    let uploaded = store.upload(&output, &key, WAV_CONTENT_TYPE).await;

    if let Err(e) = tokio::fs::remove_file(&output).await {
        warn!("Failed to remove {}: {}", output.display(), e);
    }

    let s3_url =
        uploaded.map_err(|e| ApiError::internal(format!("Error processing audio: {}", e)))?;

    Ok(Json(ProcessAudioResponse {
        status: "success",
        message: "Audio processed and uploaded successfully",
        original_filename,
        processed_filename,
        s3_url: Some(s3_url),
        local_path: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{write_wav, AudioBuffer};
    use crate::catalog::{BgmCatalog, BgmClip};
    use crate::error::Result;
    use crate::theme::{Classifier, Theme, ThemedSpan};
    use crate::transcription::{Transcriber, Transcript, TranscriptSegment};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::path::Path;
    use tower::ServiceExt;

    struct MockTranscriber;

    #[async_trait]
    impl Transcriber for MockTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript> {
            Ok(Transcript::new(
                "voice".to_string(),
                vec![TranscriptSegment::new(0.0, 1.0, "Welcome".to_string())],
            ))
        }
    }

    struct MockClassifier;

    #[async_trait]
    impl Classifier for MockClassifier {
        async fn classify(&self, _transcript: &Transcript) -> Result<Vec<ThemedSpan>> {
            Ok(vec![ThemedSpan::new(0.0, 1.0, "Hook")])
        }
    }

    struct MockStore {
        uploads: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for MockStore {
        async fn upload(&self, path: &Path, key: &str, content_type: &str) -> Result<String> {
            assert!(path.exists());
            assert_eq!(content_type, "audio/wav");
            self.uploads.lock().unwrap().push(key.to_string());
            Ok(format!("https://bucket.s3.test.amazonaws.com/{}", key))
        }
    }

    struct TestApp {
        dir: tempfile::TempDir,
        router: Router,
    }

    fn test_app(store: Option<Arc<dyn ObjectStore>>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("Start HOOK.wav");
        write_wav(&clip, &AudioBuffer::new(vec![0.5; 4000], 8000, 1)).unwrap();
        let catalog = Arc::new(BgmCatalog::from_clips([BgmClip::new(Theme::Hook, clip)]));

        let mut settings = Settings::default();
        settings.general.temp_dir = dir.path().join("tmp").to_string_lossy().to_string();

        let pipeline = Pipeline::with_components(
            &settings,
            Arc::new(MockTranscriber),
            Arc::new(MockClassifier),
            catalog,
        )
        .unwrap();

        let router = create_router(Arc::new(AppState::new(pipeline, store, settings)));
        TestApp { dir, router }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Serve a WAV fixture on a local port and return its URL.
    async fn serve_voice(path: &str) -> String {
        let mut bytes = Vec::new();
        {
            let file = tempfile::NamedTempFile::new().unwrap();
            write_wav(file.path(), &AudioBuffer::new(vec![0.1; 8000], 8000, 1)).unwrap();
            bytes.extend(std::fs::read(file.path()).unwrap());
        }

        let router = Router::new().route(path, get(move || async move { bytes.clone() }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}{}", addr, path)
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = test_app(None);

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "BGM Inserter API is running" })
        );

        let response = app
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "status": "healthy", "service": "BGM Inserter API" })
        );
    }

    #[tokio::test]
    async fn test_bgm_files() {
        let app = test_app(None);
        let response = app
            .router
            .oneshot(Request::builder().uri("/bgm-files").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "bgm_files": ["Hook: Start HOOK.wav"] })
        );
    }

    #[tokio::test]
    async fn test_process_rejects_bad_urls() {
        let app = test_app(None);

        let response = app
            .router
            .clone()
            .oneshot(post_json(
                "/process-audio",
                serde_json::json!({ "s3_url": "s3://bucket/talk.mp3" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("HTTP/HTTPS"));

        let response = app
            .router
            .oneshot(post_json(
                "/process-audio",
                serde_json::json!({ "s3_url": "https://bucket/talk.mp4" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("Unsupported file type"));
    }

    #[tokio::test]
    async fn test_process_download_failure_is_bad_request() {
        let app = test_app(None);
        let url = serve_voice("/present.wav").await.replace("present", "absent");

        let response = app
            .router
            .oneshot(post_json("/process-audio", serde_json::json!({ "s3_url": url })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Error downloading file from URL"));
    }

    #[tokio::test]
    async fn test_process_without_upload_returns_local_path() {
        let app = test_app(None);
        let url = serve_voice("/talks/episode.wav").await;

        let response = app
            .router
            .oneshot(post_json(
                "/process-audio",
                serde_json::json!({ "s3_url": url, "bgm_volume_reduction": 20.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Audio processed successfully (S3 upload disabled)");
        assert_eq!(body["original_filename"], "episode.wav");
        assert_eq!(body["processed_filename"], "processed_episode.wav");
        assert!(body.get("s3_url").is_none());

        let local = PathBuf::from(body["local_path"].as_str().unwrap());
        assert!(local.exists());
        assert!(local.starts_with(app.dir.path()));
    }

    #[tokio::test]
    async fn test_process_prunes_expired_local_results() {
        let app = test_app(None);
        let stale = app.dir.path().join("tmp").join("undertone-output-old.wav");
        std::fs::write(&stale, b"old").unwrap();
        let two_days_ago = std::time::SystemTime::now() - std::time::Duration::from_secs(48 * 3600);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(two_days_ago)
            .unwrap();

        let url = serve_voice("/episode.wav").await;
        let response = app
            .router
            .oneshot(post_json("/process-audio", serde_json::json!({ "s3_url": url })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(PathBuf::from(body["local_path"].as_str().unwrap()).exists());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_process_with_upload_returns_s3_url() {
        let store = Arc::new(MockStore {
            uploads: std::sync::Mutex::new(Vec::new()),
        });
        let app = test_app(Some(store.clone() as Arc<dyn ObjectStore>));
        let url = serve_voice("/episode.wav").await;

        let response = app
            .router
            .oneshot(post_json("/process-audio", serde_json::json!({ "s3_url": url })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Audio processed and uploaded successfully");
        assert!(body.get("local_path").is_none());

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].starts_with("processed_audio/"));
        assert!(uploads[0].ends_with("_episode_with_bgm.wav"));
        assert_eq!(
            body["s3_url"],
            format!("https://bucket.s3.test.amazonaws.com/{}", uploads[0])
        );
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/health")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap()
        };
        let app = |server: &ServerSettings| {
            Router::new()
                .route("/health", get(health))
                .layer(cors_layer(server))
        };

        let mut server = ServerSettings::default();
        let response = app(&server).oneshot(preflight("https://a.example")).await.unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        server.environment = "production".to_string();
        let response = app(&server).oneshot(preflight("https://a.example")).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());

        server.cors_origins = vec!["https://app.example.com".to_string()];
        let response = app(&server).oneshot(preflight("https://app.example.com")).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example.com"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }
}
