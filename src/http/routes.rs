//! Route handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::Json;
use tempfile::TempDir;

use super::types::{ApiError, ChatRequest, HealthResponse};
use crate::core::{AppState, Request, Response};

const UPLOAD_FIELD: &str = "file";

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match &state.db {
        Some(db) => Some(db.health_check().await.unwrap_or(false)),
        None => None,
    };

    let session = state.lifecycle.status();
    Json(HealthResponse {
        status: session.state.as_str().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session,
        pool: state.pool.stats(),
        database,
    })
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let response = state
        .coordinator
        .handle(Request::Chat {
            message: request.message,
        })
        .await;
    Ok(response)
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let staged = stage_upload(&mut multipart).await?;
    let response = state
        .coordinator
        .handle(Request::ExtractFile {
            path: staged.path.clone(),
        })
        .await;
    Ok(response)
}

pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let staged = stage_upload(&mut multipart).await?;
    let response = state
        .coordinator
        .handle(Request::Transcribe {
            path: staged.path.clone(),
        })
        .await;
    Ok(response)
}

/// An uploaded file on disk; the directory is removed on drop
struct StagedUpload {
    _dir: TempDir,
    path: PathBuf,
}

async fn stage_upload(multipart: &mut Multipart) -> Result<StagedUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = sanitize_file_name(field.file_name());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(format!("Failed to read upload: {}", e)))?;

        let dir = TempDir::new()
            .map_err(|e| ApiError::new(format!("Failed to stage upload: {}", e)))?;
        let path = dir.path().join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::new(format!("Failed to stage upload: {}", e)))?;

        tracing::debug!("Staged upload {} ({} bytes)", path.display(), bytes.len());
        return Ok(StagedUpload { _dir: dir, path });
    }

    Err(ApiError::new("No file provided"))
}

/// Last path component of the client supplied name, so the extension survives
fn sanitize_file_name(name: Option<&str>) -> String {
    name.and_then(|n| Path::new(n).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string())
}
