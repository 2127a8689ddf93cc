//! Application error types and handling

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Path is not safe: {0}")]
    PathUnsafe(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Path is not a file: {0}")]
    NotAFile(String),

    #[error("Destination path already exists: {0}")]
    AlreadyExists(String),

    #[error("Paths cannot be the same: {0}")]
    SameSource(String),

    #[error("Authorization failed")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Range not satisfiable")]
    RangeNotSatisfiable(u64),

    /// A batch operation stopped at its first failing path.
    #[error("{source}")]
    Batch {
        completed: usize,
        #[source]
        source: Box<AppError>,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Wraps an `io::Error` with the path it happened on.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn batch(completed: usize, source: AppError) -> Self {
        AppError::Batch {
            completed,
            source: Box::new(source),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PathUnsafe(_)
            | AppError::NotADirectory(_)
            | AppError::NotAFile(_)
            | AppError::SameSource(_)
            | AppError::BadRequest(_)
            | AppError::Batch { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Io { .. } | AppError::IoError(_) | AppError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable identifier clients can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::PathUnsafe(_) => "PATH_UNSAFE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NotADirectory(_) => "NOT_A_DIRECTORY",
            AppError::NotAFile(_) => "NOT_A_FILE",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::SameSource(_) => "SAME_SOURCE",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::RangeNotSatisfiable(_) => "RANGE_NOT_SATISFIABLE",
            AppError::Batch { source, .. } => source.code(),
            AppError::Io { .. } | AppError::IoError(_) => "IO_FAILURE",
            AppError::Other(_) => "INTERNAL",
        }
    }

    /// The path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            AppError::PathUnsafe(p)
            | AppError::NotFound(p)
            | AppError::NotADirectory(p)
            | AppError::NotAFile(p)
            | AppError::AlreadyExists(p)
            | AppError::SameSource(p) => Some(p),
            AppError::Io { path, .. } => Some(path),
            AppError::Batch { source, .. } => source.path(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Io { path, source } => {
                tracing::error!(path = %path, error = %source, "filesystem error");
                format!("Filesystem operation failed: {}", path)
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                "Internal server error".to_string()
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "message": message,
            "code": self.code(),
            "status": status.as_u16(),
        });
        if let Some(path) = self.path() {
            body["path"] = json!(path);
        }
        if let AppError::Batch { completed, .. } = &self {
            body["completed"] = json!(completed);
        }

        let mut response = (status, Json(body)).into_response();

        if let AppError::RangeNotSatisfiable(size) = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_variant_has_distinct_code() {
        let errors = vec![
            AppError::PathUnsafe("/x".into()),
            AppError::NotFound("/x".into()),
            AppError::NotADirectory("/x".into()),
            AppError::NotAFile("/x".into()),
            AppError::AlreadyExists("/x".into()),
            AppError::SameSource("/x".into()),
            AppError::Unauthorized,
            AppError::Forbidden("banned".into()),
            AppError::BadRequest("bad".into()),
        ];

        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_batch_keeps_inner_code_but_answers_400() {
        let err = AppError::batch(1, AppError::AlreadyExists("/dst/b".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "ALREADY_EXISTS");
        assert_eq!(err.path(), Some("/dst/b"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("a".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::AlreadyExists("a".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Forbidden("a".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
