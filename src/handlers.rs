use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

use crate::error::UploadError;
use crate::models::{ChunkMeta, ChunkUploadResponse, ErrorResponse, ProbeParams};
use crate::registry::ChunkProbe;
use crate::state::AppState;
use crate::transfer::ChunkOutcome;
use crate::utils::sanitize_filename;

type Rejection = (StatusCode, Json<ErrorResponse>);

fn reject(err: UploadError) -> Rejection {
    (
        err.status(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, UploadError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| UploadError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

// receive one chunk of a transfer via multipart form data
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ChunkUploadResponse>, Rejection> {
    tracing::debug!("Processing chunk upload request");

    // collect the form fields; clients send them in arbitrary order
    let mut identifier: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut chunk_number: Option<u64> = None;
    let mut chunk_size: Option<u64> = None;
    let mut current_chunk_size: Option<u64> = None;
    let mut total_chunks: Option<u64> = None;
    let mut total_size: Option<u64> = None;
    let mut payload: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Failed to read multipart field: {}", e),
            }),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let data = field.bytes().await.map_err(|e| {
                tracing::error!("Failed to read chunk bytes: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("Failed to read chunk bytes: {}", e),
                    }),
                )
            })?;
            payload = Some(data);
            continue;
        }

        let text = field.text().await.map_err(|e| {
            tracing::error!("Failed to read field `{}`: {}", name, e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Failed to read field `{}`: {}", name, e),
                }),
            )
        })?;

        match name.as_str() {
            "identifier" => identifier = Some(text),
            "filename" => filename = Some(text),
            "chunkNumber" => chunk_number = Some(parse_u64("chunkNumber", &text).map_err(reject)?),
            "chunkSize" => chunk_size = Some(parse_u64("chunkSize", &text).map_err(reject)?),
            "currentChunkSize" => {
                current_chunk_size = Some(parse_u64("currentChunkSize", &text).map_err(reject)?)
            }
            "totalChunks" => total_chunks = Some(parse_u64("totalChunks", &text).map_err(reject)?),
            "totalSize" => total_size = Some(parse_u64("totalSize", &text).map_err(reject)?),
            // unknown fields are ignored, uploader widgets add their own extras
            _ => tracing::trace!("Ignoring unknown field `{}`", name),
        }
    }

    let identifier = identifier
        .filter(|s| !s.is_empty())
        .ok_or_else(|| reject(UploadError::MissingField("identifier")))?;
    let raw_filename = filename.ok_or_else(|| reject(UploadError::MissingField("filename")))?;
    let chunk_number = chunk_number.ok_or_else(|| reject(UploadError::MissingField("chunkNumber")))?;
    let chunk_size = chunk_size.ok_or_else(|| reject(UploadError::MissingField("chunkSize")))?;
    let current_chunk_size =
        current_chunk_size.ok_or_else(|| reject(UploadError::MissingField("currentChunkSize")))?;
    let total_chunks = total_chunks.ok_or_else(|| reject(UploadError::MissingField("totalChunks")))?;
    let total_size = total_size.ok_or_else(|| reject(UploadError::MissingField("totalSize")))?;
    let payload = payload.ok_or_else(|| reject(UploadError::MissingField("file")))?;

    // sanitize filename to prevent directory traversal
    let filename = sanitize_filename(&raw_filename);
    if filename.is_empty() {
        tracing::warn!("Filename {:?} sanitized to nothing", raw_filename);
        return Err(reject(UploadError::InvalidField {
            field: "filename",
            reason: "empty after sanitization".to_string(),
        }));
    }
    tracing::trace!("Sanitized filename: {} -> {}", raw_filename, filename);

    let meta = ChunkMeta {
        identifier,
        filename,
        chunk_size,
        total_chunks,
        total_size,
    };

    let transfer = state.registry.get_or_create(&meta).await.map_err(|e| {
        tracing::error!("Failed to set up transfer {}: {}", meta.identifier, e);
        reject(e)
    })?;

    let outcome = transfer
        .write_chunk(chunk_number, payload, current_chunk_size)
        .await
        .map_err(|e| {
            tracing::error!(
                "Chunk {} of transfer {} failed: {}",
                chunk_number,
                meta.identifier,
                e
            );
            reject(e)
        })?;

    match outcome {
        ChunkOutcome::Accepted => tracing::debug!(
            "📦 Received chunk {}/{} for transfer {}",
            chunk_number,
            transfer.total_chunks(),
            meta.identifier
        ),
        ChunkOutcome::Duplicate => tracing::debug!(
            "Duplicate chunk {} for transfer {}, skipped",
            chunk_number,
            meta.identifier
        ),
        ChunkOutcome::Completed => tracing::info!(
            "✅ Transfer {} finished with chunk {}",
            meta.identifier,
            chunk_number
        ),
    }

    Ok(Json(ChunkUploadResponse {
        success: true,
        chunk_number,
        received_chunks: transfer.received_count(),
        total_chunks: transfer.total_chunks(),
        complete: transfer.is_finalized(),
        skipped: outcome == ChunkOutcome::Duplicate,
    }))
}

// ask whether a chunk has already arrived
pub async fn probe_chunk(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProbeParams>,
) -> StatusCode {
    tracing::trace!(
        "Probe for chunk {} of transfer {}",
        params.chunk_number,
        params.identifier
    );
    match state.registry.probe(&params.identifier, params.chunk_number) {
        ChunkProbe::Present => StatusCode::OK,
        // anything not on disk answers 204 so the uploader retransmits the
        // chunk instead of treating the probe as a permanent failure
        ChunkProbe::Pending | ChunkProbe::Absent => StatusCode::NO_CONTENT,
    }
}

// health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chunkbay",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
