//! HTTP API
//!
//! axum server exposing the two halves of the service: receipt structuring
//! (`POST /process`) and natural-language ledger queries (`POST /query`),
//! plus a health probe. Handlers stay thin; all interesting behavior lives
//! in [`crate::chat`] and [`crate::receipt`].

use crate::chat::pipeline::{ChatPipeline, FailureKind, QueryReport};
use crate::config::AppConfig;
use crate::error::{QuittungError, Result};
use crate::llm::LlmClient;
use crate::receipt::ingest::{detect_file_kind, join_ocr_segments, FileKind, OcrProvider, TranscriptionProvider};
use crate::receipt::model::Receipt;
use crate::receipt::structurer::{LlmStructurer, ReceiptStructurer};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Uploads above this size are refused outright.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub pipeline: ChatPipeline,
    pub structurer: Arc<dyn ReceiptStructurer>,
    /// Optional engines; endpoints needing an absent one answer 501.
    pub ocr: Option<Arc<dyn OcrProvider>>,
    pub transcriber: Option<Arc<dyn TranscriptionProvider>>,
    pub redact_rejected_sql: bool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Production wiring: LLM-backed pipeline and structurer, no OCR or
    /// transcription engines unless a host attaches them.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = LlmClient::new(&config.llm)?;
        Ok(Self {
            pipeline: ChatPipeline::from_config(config)?,
            structurer: Arc::new(LlmStructurer::new(llm)),
            ocr: None,
            transcriber: None,
            redact_rejected_sql: config.redact_rejected_sql,
        })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("question must be a non-empty string of reasonable size")]
    InvalidQuestion,
    #[error("Unsupported file type.")]
    UnsupportedFileType,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} is not configured on this deployment")]
    ProviderUnavailable(&'static str),
    #[error(transparent)]
    Internal(#[from] QuittungError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidQuestion | AppError::UnsupportedFileType | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ProviderUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Internal(QuittungError::Llm(_)) => StatusCode::BAD_GATEWAY,
            AppError::Internal(QuittungError::Structuring(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorPayload {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct NlQueryRequest {
    pub question: String,
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .route("/process", post(process_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Runs the server until ctrl-c.
pub async fn serve(addr: SocketAddr, state: SharedState) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "quittung",
    }))
}

async fn query_handler(
    State(state): State<SharedState>,
    Json(request): Json<NlQueryRequest>,
) -> std::result::Result<Json<QueryReport>, AppError> {
    let question = request.question.trim();
    if question.is_empty() || question.len() > state.pipeline.max_question_bytes() {
        return Err(AppError::InvalidQuestion);
    }

    let mut report = state.pipeline.answer(question).await;
    if state.redact_rejected_sql && report.error == Some(FailureKind::Rejected) {
        report.generated_sql.clear();
    }
    Ok(Json(report))
}

async fn process_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<Vec<Receipt>>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut e2e = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read upload: {}", e)))?;
                upload = Some((filename, bytes.to_vec()));
            }
            Some("e2e") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read e2e flag: {}", e)))?;
                e2e = matches!(value.trim(), "1" | "true" | "True" | "on");
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        AppError::BadRequest("multipart body must contain a 'file' field".to_string())
    })?;

    let receipts = match detect_file_kind(Path::new(&filename)) {
        FileKind::Image if e2e => {
            let mime = mime_guess::from_path(&filename).first_or_octet_stream();
            state
                .structurer
                .structure_image(&bytes, mime.essence_str())
                .await?
        }
        FileKind::Image => {
            let ocr = state
                .ocr
                .as_ref()
                .ok_or(AppError::ProviderUnavailable("OCR"))?;
            let segments = ocr.extract_text(&bytes).await?;
            state
                .structurer
                .structure_text(&join_ocr_segments(&segments))
                .await?
        }
        FileKind::Audio => {
            let transcriber = state
                .transcriber
                .as_ref()
                .ok_or(AppError::ProviderUnavailable("speech transcription"))?;
            let transcript = transcriber.transcribe(&bytes).await?;
            state.structurer.structure_text(&transcript).await?
        }
        FileKind::Unknown => return Err(AppError::UnsupportedFileType),
    };

    tracing::info!(file = %filename, receipts = receipts.len(), "upload processed");
    Ok(Json(receipts))
}
