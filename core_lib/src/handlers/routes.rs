//! Route table for the `/api` surface.

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::files;
use crate::{middleware::auth::token_auth_middleware, AppState};

pub fn create_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/", get(handle_info))
        .route("/api", get(handle_info))
        .nest("/api/files", file_routes(state))
}

/// Everything under `/api/files` requires the shared token.
fn file_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth", get(files::check_auth))
        .route("/drives", get(files::get_drives))
        .route("/list", get(files::list_files))
        .route("/create-dir", post(files::create_dir))
        .route("/rename", post(files::rename))
        .route("/copy-paste", post(files::copy_paste))
        .route("/delete", post(files::delete))
        .route("/stream", get(files::stream_file))
        .route("/download", get(files::download))
        .route(
            "/upload-file",
            post(files::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route_layer(middleware::from_fn_with_state(state, token_auth_middleware))
}

async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": state.app_name,
        "version": state.version,
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}
