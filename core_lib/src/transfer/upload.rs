use axum::extract::multipart::{Field, MultipartError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::sandbox::Sandbox;

pub const UPLOAD_FIELD: &str = "file";

/// Reduces a client-supplied multipart filename to its last path component.
pub fn upload_file_name(raw: &str) -> Result<String> {
    let name = raw.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default().trim();
    match name {
        "" | "." | ".." => Err(AppError::BadRequest(format!("Invalid upload filename: {:?}", raw))),
        name => Ok(name.to_string()),
    }
}

/// Where an upload lands: the parent of an explicit target path, which must
/// pass the sandbox, or else the configured default directory.
pub fn upload_destination(sandbox: &Sandbox, target: Option<&str>, default_dir: &Path) -> Result<PathBuf> {
    match target.filter(|path| !path.is_empty()) {
        Some(target) => {
            let target = sandbox.check(target)?;
            let parent = target.parent().unwrap_or(&target).to_string_lossy().into_owned();
            sandbox.check(&parent)
        }
        None => Ok(default_dir.to_path_buf()),
    }
}

/// Streams `field` into `dest_dir/file_name`, creating the directory when it
/// is missing. A partially written file is removed on failure.
pub async fn save_field(mut field: Field<'_>, dest_dir: &Path, file_name: &str) -> Result<(PathBuf, u64)> {
    fs::create_dir_all(dest_dir)
        .await
        .map_err(|err| AppError::io(dest_dir, err))?;

    let dest = dest_dir.join(file_name);
    let mut file = File::create(&dest)
        .await
        .map_err(|err| AppError::io(&dest, err))?;

    let mut written = 0u64;
    let result: Result<()> = async {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk)
                .await
                .map_err(|err| AppError::io(&dest, err))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|err| AppError::io(&dest, err))
    }
    .await;

    if let Err(err) = result {
        drop(file);
        if let Err(cleanup) = fs::remove_file(&dest).await {
            warn!(path = %dest.display(), error = %cleanup, "failed to remove partial upload");
        }
        return Err(err);
    }

    info!(path = %dest.display(), bytes = written, "stored upload");
    Ok((dest, written))
}

pub fn multipart_error(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}
