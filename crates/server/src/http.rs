//! HTTP Endpoints
//!
//! REST API for extraction and audio generation.

use axum::{
    extract::{Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use vocab_audio_config::{ConcurrencyConfig, GenerationMode, VoiceMode};
use vocab_audio_core::{
    AudioFileEntry, ExtractionOptions, FileId, FileStatus, OcrEngine, VocabList,
};
use vocab_audio_llm::{ApiKeyStatus, ExtractionClientConfig, OpenAiExtractionClient};
use vocab_audio_pipeline::{
    AudioAssembler, AudioGenerationRun, AudioSynthesisPipeline, ExtractionOrchestrator,
    ExtractionOutcome, GenerationSettings, InMemoryPages, OcrPageReader, SynthesisConfig,
};

use crate::metrics::{metrics_handler, record_audio_file, record_extraction, record_request};
use crate::state::AppState;
use crate::ServerError;

const DEFAULT_PAGE_MIME: &str = "image/png";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let (cors_layer, timeout) = {
        let config = state.config.read();
        (
            build_cors_layer(&config.server.cors_origins, config.server.cors_enabled),
            Duration::from_secs(config.server.timeout_seconds),
        )
    };

    // Chunked extraction waits on the shared rate limiter and can outlast
    // any fixed request deadline, so it is routed outside the timeout.
    let extraction = Router::new().route("/api/extract", post(extract));

    let timed = Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        // API keys
        .route("/api/keys/validate", post(validate_key))
        // Audio generation
        .route("/api/audio", post(start_audio))
        .route("/api/audio/:run_id", get(audio_status).delete(delete_audio))
        .route("/api/audio/:run_id/cancel", post(cancel_audio))
        .route("/api/audio/:run_id/files/:file_id", get(download_file))
        // Settings
        .route(
            "/api/settings/concurrency",
            get(get_concurrency).put(update_concurrency),
        )
        .layer(TimeoutLayer::new(timeout));

    timed
        .merge(extraction)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty or all invalid, allows localhost:3000 only
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];

    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready once the hosted services have an API key
///
/// The OCR sidecar is reported but does not gate readiness; plain text
/// extraction works without it.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let ready = state.is_ready();
    let ocr_ok = state.ocr.health_check().await;
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "extraction": if state.extractor.is_some() { "ok" } else { "missing_api_key" },
                "speech": if state.speech.is_some() { "ok" } else { "missing_api_key" },
                "ocr": if ocr_ok { "ok" } else { "unreachable" },
            }
        })),
    )
}

#[derive(Debug, Deserialize)]
struct ValidateKeyRequest {
    #[serde(default)]
    api_key: String,
}

async fn validate_key(
    State(state): State<AppState>,
    Json(request): Json<ValidateKeyRequest>,
) -> Result<Json<ApiKeyStatus>, ServerError> {
    record_request("keys_validate");
    let api_key = request.api_key.trim();
    if api_key.is_empty() {
        return Ok(Json(ApiKeyStatus {
            valid: false,
            message: "API key is required".to_string(),
        }));
    }

    let config = {
        let settings = state.config.read();
        ExtractionClientConfig::from_settings(&settings.openai, &settings.extraction.languages)
            .with_api_key(api_key)
    };
    let client = OpenAiExtractionClient::new(config)
        .map_err(|e| ServerError::Internal(format!("Failed to create client: {}", e)))?;

    Ok(Json(client.validate_api_key(api_key).await))
}

/// Extraction request: plain text or base64-encoded page images
#[derive(Debug, Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    pages: Option<Vec<String>>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    include_secondary: Option<bool>,
}

async fn extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractionOutcome>, ServerError> {
    record_request("extract");
    let extractor = state
        .extractor
        .clone()
        .ok_or_else(|| ServerError::Unavailable("Extraction service not configured".to_string()))?;
    let settings = state.settings();

    let options = ExtractionOptions {
        include_secondary: request
            .include_secondary
            .unwrap_or(settings.extraction.include_secondary),
    };
    let orchestrator = ExtractionOrchestrator::new(
        extractor,
        state.limiter.clone(),
        &settings.extraction,
        settings.concurrency.clone(),
    );

    let outcome = match (request.text, request.pages) {
        (_, Some(pages)) if !pages.is_empty() => {
            let images = decode_pages(&pages)?;
            let mime = request.mime_type.as_deref().unwrap_or(DEFAULT_PAGE_MIME);
            let source = InMemoryPages::new(images, mime);
            let reader = OcrPageReader::new(state.ocr.clone(), settings.ocr.languages.clone());
            orchestrator.extract_pages(&reader, &source, &options).await?
        },
        (Some(text), _) => orchestrator.extract_document(&text, &options).await?,
        _ => {
            return Err(ServerError::InvalidRequest(
                "Either text or pages is required".to_string(),
            ))
        },
    };

    record_extraction(outcome.method.label(), outcome.processed_chunks);
    tracing::info!(
        method = outcome.method.label(),
        items = outcome.list.len(),
        processed = outcome.processed_chunks,
        total = outcome.total_chunks,
        "Extraction request completed"
    );
    Ok(Json(outcome))
}

fn decode_pages(pages: &[String]) -> Result<Vec<Bytes>, ServerError> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            base64::engine::general_purpose::STANDARD
                .decode(page.trim())
                .map(Bytes::from)
                .map_err(|e| ServerError::InvalidRequest(format!("Page {}: invalid base64: {}", i + 1, e)))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AudioRequest {
    list: VocabList,
    #[serde(default)]
    items_per_file: Option<usize>,
    #[serde(default)]
    generation_mode: Option<GenerationMode>,
    #[serde(default)]
    voice_mode: Option<VoiceMode>,
    #[serde(default)]
    include_secondary: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AudioStarted {
    run_id: String,
    total_parts: usize,
}

/// Start an audio generation run in the background
async fn start_audio(
    State(state): State<AppState>,
    Json(request): Json<AudioRequest>,
) -> Result<(StatusCode, Json<AudioStarted>), ServerError> {
    record_request("audio_start");
    let speech = state
        .speech
        .clone()
        .ok_or_else(|| ServerError::Unavailable("Speech service not configured".to_string()))?;
    let settings = state.settings();

    let mut audio = settings.audio.clone();
    if let Some(items_per_file) = request.items_per_file {
        audio.items_per_file = items_per_file;
    }
    if let Some(mode) = request.generation_mode {
        audio.generation_mode = mode;
    }
    if let Some(mode) = request.voice_mode {
        audio.voice_mode = mode;
    }
    if let Some(include) = request.include_secondary {
        audio.include_secondary = include;
    }
    audio.validate()?;

    let pipeline = AudioSynthesisPipeline::new(
        speech,
        AudioAssembler::from_config(&audio),
        SynthesisConfig::from_settings(&audio, &settings.extraction.languages),
    );
    let run = Arc::new(AudioGenerationRun::new(
        &request.list,
        GenerationSettings::from_settings(&audio, &settings.concurrency),
    )?);

    let run_id = uuid::Uuid::new_v4().to_string();
    let total_parts = run.total_parts();
    state.insert_run(run_id.clone(), run.clone());
    tracing::info!(run_id = %run_id, parts = total_parts, "Audio run started");

    let task_run_id = run_id.clone();
    tokio::spawn(async move {
        let summary = run.run(&pipeline).await;
        for entry in run.entries() {
            record_audio_file(entry.status.as_str());
        }
        tracing::info!(
            run_id = %task_run_id,
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Audio run finished"
        );
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AudioStarted {
            run_id,
            total_parts,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct FileView {
    #[serde(flatten)]
    entry: AudioFileEntry,
    file_name: String,
}

#[derive(Debug, Serialize)]
struct RunView {
    run_id: String,
    title: String,
    total_parts: usize,
    cancelled: bool,
    finished: bool,
    files: Vec<FileView>,
}

async fn audio_status(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunView>, ServerError> {
    let run = state.run(&run_id)?;
    let files = run
        .entries()
        .into_iter()
        .map(|entry| FileView {
            file_name: run.file_name(&entry),
            entry,
        })
        .collect();

    Ok(Json(RunView {
        run_id,
        title: run.title().to_string(),
        total_parts: run.total_parts(),
        cancelled: run.is_cancelled(),
        finished: run.is_finished(),
        files,
    }))
}

async fn cancel_audio(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    let run = state.run(&run_id)?;
    run.cancel();
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "run_id": run_id, "status": "cancelled" })),
    ))
}

/// Cancel the run if needed and free its audio
async fn delete_audio(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.remove_run(&run_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download_file(
    State(state): State<AppState>,
    Path((run_id, file_id)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let run = state.run(&run_id)?;
    let id: FileId = file_id.parse().map_err(ServerError::InvalidRequest)?;
    let entry = run
        .entry(id)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown file: {}", id)))?;

    let audio = match (&entry.status, &entry.audio) {
        (FileStatus::Completed, Some(audio)) => audio.clone(),
        (status, _) => {
            return Err(ServerError::NotReady(format!(
                "File {} is {}",
                id,
                status.as_str()
            )))
        },
    };

    let disposition = format!("attachment; filename=\"{}\"", run.file_name(&entry));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ServerError::Internal(format!("Invalid file name header: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(audio.format.mime_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        audio.bytes,
    )
        .into_response())
}

async fn get_concurrency(State(state): State<AppState>) -> Json<ConcurrencyConfig> {
    Json(state.concurrency())
}

async fn update_concurrency(
    State(state): State<AppState>,
    Json(concurrency): Json<ConcurrencyConfig>,
) -> Result<Json<ConcurrencyConfig>, ServerError> {
    state.update_concurrency(concurrency)?;
    Ok(Json(state.concurrency()))
}
