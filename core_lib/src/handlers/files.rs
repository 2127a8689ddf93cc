use axum::{
    extract::{Multipart, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::Path;
use tracing::info;

use crate::{
    error::{AppError, Result},
    extractors::{ApiJson, ApiQuery},
    files::{
        list_drives, CopyPasteRequest, CreateDirOutcome, CreateDirRequest, DeleteRequest, Drive,
        Entry, PathQuery, RenameRequest,
    },
    sanitize::{content_disposition, DispositionKind},
    transfer::{self, upload::multipart_error},
    AppState,
};

fn required_path(query: PathQuery) -> Result<String> {
    query
        .path
        .filter(|path| !path.is_empty())
        .ok_or_else(|| AppError::BadRequest("path is required".to_string()))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub async fn check_auth() -> Json<serde_json::Value> {
    Json(json!({}))
}

/// Disk enumeration makes blocking syscalls, so it runs off the async workers.
pub async fn get_drives(State(state): State<AppState>) -> Result<Json<Vec<Drive>>> {
    let sandbox = state.file_manager.sandbox().clone();
    let drives = tokio::task::spawn_blocking(move || list_drives(&sandbox))
        .await
        .map_err(|err| AppError::Other(anyhow::Error::new(err).context("drive listing task failed")))?;
    Ok(Json(drives))
}

pub async fn list_files(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PathQuery>,
) -> Result<Json<Vec<Entry>>> {
    let path = required_path(query)?;
    let entries = state.file_manager.list(&path).await?;
    Ok(Json(entries))
}

pub async fn create_dir(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateDirRequest>,
) -> Result<Response> {
    if body.path.is_empty() {
        return Err(AppError::BadRequest("path is required".to_string()));
    }

    let response = match state.file_manager.create_dir(&body.path).await? {
        CreateDirOutcome::Created => {
            (StatusCode::CREATED, Json(json!({ "path": body.path }))).into_response()
        }
        CreateDirOutcome::AlreadyExisted => {
            (StatusCode::OK, Json(json!({ "existed": true, "path": body.path }))).into_response()
        }
    };
    Ok(response)
}

pub async fn rename(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RenameRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .file_manager
        .rename(&body.from_path, &body.to_path)
        .await?;
    Ok(Json(json!({ "path": body.to_path })))
}

pub async fn copy_paste(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CopyPasteRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.to_path.is_empty() {
        return Err(AppError::BadRequest("toPath is required".to_string()));
    }

    state
        .file_manager
        .copy_or_move(&body.from_paths, &body.to_path, body.is_move)
        .await?;
    Ok(Json(json!({ "path": body.to_path })))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteRequest>,
) -> Result<Json<serde_json::Value>> {
    state.file_manager.delete(&body.path.to_vec()).await?;
    Ok(Json(json!({ "path": body.path })))
}

/// Inline view of a single file.
pub async fn stream_file(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PathQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let raw = required_path(query)?;
    let (path, metadata) = state.file_manager.stat(&raw).await?;
    if metadata.is_dir() {
        return Err(AppError::NotAFile(raw));
    }

    transfer::file_response(&path, &metadata, &base_name(&path), DispositionKind::Inline, &headers).await
}

/// A single file is sent as-is; a directory or several paths become a ZIP.
pub async fn download(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    let paths = transfer::download_paths(query.as_deref());
    if paths.is_empty() {
        return Err(AppError::BadRequest("path(s) parameter is required".to_string()));
    }

    let sandbox = state.file_manager.sandbox();
    let roots = paths
        .iter()
        .map(|path| sandbox.check(path))
        .collect::<Result<Vec<_>>>()?;

    if let [single] = paths.as_slice() {
        let (path, metadata) = state.file_manager.stat(single).await?;
        if !metadata.is_dir() {
            return transfer::file_response(
                &path,
                &metadata,
                &base_name(&path),
                DispositionKind::Attachment,
                &headers,
            )
            .await;
        }
    }

    let archive_name = transfer::archive_name(&paths);
    info!(archive = %archive_name, paths = paths.len(), "streaming zip download");

    let disposition = HeaderValue::from_str(&content_disposition(DispositionKind::Attachment, &archive_name))
        .map_err(|err| AppError::Other(err.into()))?;
    let body = transfer::archive_body(roots, state.file_manager.max_walk_depth());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn upload_file(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PathQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let sandbox = state.file_manager.sandbox();
    let dest_dir = transfer::upload_destination(sandbox, query.path.as_deref(), &state.upload_dir)?;
    let explicit_target = query.path.as_deref().is_some_and(|path| !path.is_empty());

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(transfer::UPLOAD_FIELD) {
            continue;
        }

        let file_name = transfer::upload_file_name(field.file_name().unwrap_or_default())?;
        if explicit_target {
            sandbox.check(&dest_dir.join(&file_name).to_string_lossy())?;
        }

        transfer::save_field(field, &dest_dir, &file_name).await?;
        return Ok(Json(json!({ "message": "File uploaded successfully!" })));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}
