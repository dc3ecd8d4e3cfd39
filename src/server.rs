//! HTTP request layer.
//!
//! Accepts uploads, checks the extension, decodes to PCM and hands the buffer
//! to the [`Recognizer`]. Decoding and fingerprinting are CPU-bound and run on
//! the blocking pool.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::audio_processor::decode::{decode_bytes, is_allowed_extension};
use crate::db::{Recording, RecordingId};
use crate::error::{EngineError, StorageError};
use crate::matcher::{MatchOutcome, ScoredCandidate};
use crate::recognizer::{IngestReport, Recognizer};

/// Uploads larger than this are rejected.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidRate { .. } | EngineError::Decode(_) => {
                ApiError::BadRequest(err.to_string())
            }
            EngineError::Storage(StorageError::UnknownRecording(id)) => {
                ApiError::NotFound(format!("recording {id} not found"))
            }
            EngineError::Storage(ref storage) if storage.is_transient() => {
                ApiError::Unavailable(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => {
                error!(error = %m, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<RecordingId>,
    pub confidence: f64,
    pub score: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_ms: Option<i64>,
    pub candidates: Vec<ScoredCandidate>,
}

impl From<MatchOutcome> for MatchResponse {
    fn from(outcome: MatchOutcome) -> Self {
        let score = outcome.score();
        let (recording, recording_id, offset_ms) = match outcome.best {
            Some(best) => (Some(best.name), Some(best.recording_id), Some(best.offset_ms)),
            None => (None, None, None),
        };
        Self {
            matched: outcome.matched,
            recording,
            recording_id,
            confidence: outcome.confidence,
            score,
            offset_ms,
            candidates: outcome.candidates,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub success: bool,
    pub message: String,
    pub recording_id: RecordingId,
    pub stats: AddStats,
}

#[derive(Debug, Serialize)]
pub struct AddStats {
    pub duration: f64,
    pub num_fingerprints: usize,
}

impl From<IngestReport> for AddResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            success: true,
            message: format!("Added song: {}", report.name),
            recording_id: report.recording_id,
            stats: AddStats {
                duration: report.duration_secs,
                num_fingerprints: report.fingerprints,
            },
        }
    }
}

pub fn router(recognizer: Recognizer) -> Router {
    Router::new()
        .route("/health", get(|| async { "healthy" }))
        .route("/add", post(add_song))
        .route("/match", post(match_audio))
        .route("/clear_db", post(clear_database))
        .route("/songs", get(list_songs))
        .route("/songs/{id}", get(get_song).delete(delete_song))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(recognizer)
}

pub async fn serve(recognizer: Recognizer, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router(recognizer))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("serving HTTP")?;
    Ok(())
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
    name: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let bad_request = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.to_string());

    let mut file = None;
    let mut name = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        match field.name().map(str::to_string).as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("name") => name = Some(field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file part".into()))?;
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("No selected file".into()));
    }
    if !is_allowed_extension(&file_name) {
        return Err(ApiError::BadRequest("Invalid file type".into()));
    }
    Ok(Upload {
        file_name,
        bytes,
        name: name.filter(|n| !n.trim().is_empty()),
    })
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn add_song(
    State(recognizer): State<Recognizer>,
    multipart: Multipart,
) -> Result<Json<AddResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let name = upload
        .name
        .ok_or_else(|| ApiError::BadRequest("Missing file or song name".into()))?;
    let file_name = upload.file_name;
    let bytes = upload.bytes;

    let report = run_blocking(move || {
        let buffer = decode_bytes(bytes, Some(&file_name))?;
        recognizer.ingest(&name, &buffer)
    })
    .await?;
    Ok(Json(report.into()))
}

async fn match_audio(
    State(recognizer): State<Recognizer>,
    multipart: Multipart,
) -> Result<Json<MatchResponse>, ApiError> {
    let Upload {
        file_name, bytes, ..
    } = read_upload(multipart).await?;

    let outcome = run_blocking(move || {
        let buffer = decode_bytes(bytes, Some(&file_name))?;
        recognizer.identify(&buffer)
    })
    .await?;
    Ok(Json(outcome.into()))
}

async fn clear_database(State(recognizer): State<Recognizer>) -> Result<Json<serde_json::Value>, ApiError> {
    run_blocking(move || recognizer.clear()).await?;
    Ok(Json(json!({ "message": "Database cleared successfully" })))
}

async fn list_songs(State(recognizer): State<Recognizer>) -> Result<Json<Vec<Recording>>, ApiError> {
    Ok(Json(run_blocking(move || recognizer.recordings()).await?))
}

async fn get_song(
    State(recognizer): State<Recognizer>,
    Path(id): Path<RecordingId>,
) -> Result<Json<Recording>, ApiError> {
    run_blocking(move || recognizer.recording(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("recording {id} not found")))
}

async fn delete_song(
    State(recognizer): State<Recognizer>,
    Path(id): Path<RecordingId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if run_blocking(move || recognizer.delete_recording(id)).await? {
        Ok(Json(json!({ "deleted": id })))
    } else {
        Err(ApiError::NotFound(format!("recording {id} not found")))
    }
}
