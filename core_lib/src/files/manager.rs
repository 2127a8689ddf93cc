use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::models::{CreateDirOutcome, Entry};
use crate::error::{AppError, Result};
use crate::sandbox::{self, Sandbox};

pub const DEFAULT_MAX_WALK_DEPTH: usize = 64;

/// Filesystem operations confined to a [`Sandbox`]. Holds no state between
/// calls: every listing and copy reflects the disk at call time.
#[derive(Clone)]
pub struct FileManager {
    sandbox: Sandbox,
    max_walk_depth: usize,
}

impl FileManager {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }

    pub fn with_max_walk_depth(mut self, depth: usize) -> Self {
        self.max_walk_depth = depth;
        self
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn max_walk_depth(&self) -> usize {
        self.max_walk_depth
    }

    /// Sandbox check followed by a `stat` that follows symlinks.
    pub async fn stat(&self, raw: &str) -> Result<(PathBuf, Metadata)> {
        let path = self.sandbox.check(raw)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|err| missing_or_io(raw, &path, err))?;
        Ok((path, metadata))
    }

    pub async fn list(&self, raw: &str) -> Result<Vec<Entry>> {
        let (path, metadata) = self.stat(raw).await?;
        if !metadata.is_dir() {
            return Err(AppError::NotADirectory(raw.to_string()));
        }

        let mut dir = fs::read_dir(&path)
            .await
            .map_err(|err| AppError::io(&path, err))?;

        let mut entries = Vec::new();
        while let Some(child) = dir
            .next_entry()
            .await
            .map_err(|err| AppError::io(&path, err))?
        {
            let name = child.file_name().to_string_lossy().into_owned();
            let entry = match fs::metadata(child.path()).await {
                Ok(metadata) => Entry::from_metadata(name, &metadata),
                Err(err) => {
                    debug!(path = %child.path().display(), error = %err, "stat failed for listed entry");
                    Entry::from_error(name, &err)
                }
            };
            entries.push(entry);
        }

        debug!(path = %path.display(), count = entries.len(), "listed directory");
        Ok(entries)
    }

    pub async fn create_dir(&self, raw: &str) -> Result<CreateDirOutcome> {
        let path = self.sandbox.check(raw)?;
        if exists(&path).await {
            return Ok(CreateDirOutcome::AlreadyExisted);
        }

        fs::create_dir_all(&path)
            .await
            .map_err(|err| AppError::io(&path, err))?;

        info!(path = %path.display(), "created directory");
        Ok(CreateDirOutcome::Created)
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        if from.is_empty() || to.is_empty() {
            return Err(AppError::BadRequest("fromPath or toPath is required".to_string()));
        }
        if sandbox::normalize(from) == sandbox::normalize(to) {
            return Err(AppError::SameSource(from.to_string()));
        }

        let source = self.sandbox.check(from)?;
        let target = self.sandbox.check(to)?;

        if !exists(&source).await {
            return Err(AppError::NotFound(from.to_string()));
        }
        if exists(&target).await {
            return Err(AppError::AlreadyExists(to.to_string()));
        }

        fs::rename(&source, &target)
            .await
            .map_err(|err| AppError::io(&source, err))?;

        info!(from = %source.display(), to = %target.display(), "renamed");
        Ok(())
    }

    /// Copies (or moves) each source into `to_dir`, one after another. Stops at
    /// the first failure; sources handled before it stay copied/moved.
    pub async fn copy_or_move(&self, from_paths: &[String], to_dir: &str, is_move: bool) -> Result<usize> {
        if from_paths.is_empty() {
            return Err(AppError::BadRequest("fromPaths is required".to_string()));
        }

        for (index, from) in from_paths.iter().enumerate() {
            self.transfer_entry(from, to_dir, is_move)
                .await
                .map_err(|err| AppError::batch(index, err))?;
        }

        Ok(from_paths.len())
    }

    async fn transfer_entry(&self, from: &str, to_dir: &str, is_move: bool) -> Result<PathBuf> {
        let source = self.sandbox.check(from)?;
        let dest_dir = self.sandbox.check(to_dir)?;

        let metadata = fs::metadata(&source)
            .await
            .map_err(|err| missing_or_io(from, &source, err))?;

        let dest_metadata = fs::metadata(&dest_dir)
            .await
            .map_err(|err| missing_or_io(to_dir, &dest_dir, err))?;
        if !dest_metadata.is_dir() {
            return Err(AppError::NotADirectory(to_dir.to_string()));
        }

        let name = source
            .file_name()
            .ok_or_else(|| AppError::BadRequest(format!("Cannot copy a filesystem root: {}", from)))?;
        let target = dest_dir.join(name);
        if exists(&target).await {
            return Err(AppError::AlreadyExists(target.display().to_string()));
        }

        if metadata.is_dir() {
            let source_str = source.to_string_lossy();
            let target_str = target.to_string_lossy();
            if sandbox::is_within(&source_str, &target_str) {
                return Err(AppError::BadRequest(format!(
                    "Cannot copy a directory into itself: {}",
                    from
                )));
            }
            self.copy_tree(&source, &target).await?;
        } else {
            fs::copy(&source, &target)
                .await
                .map_err(|err| AppError::io(&source, err))?;
        }

        if is_move {
            remove_path(&source, metadata.is_dir()).await?;
        }

        info!(
            from = %source.display(),
            to = %target.display(),
            is_move,
            "copied entry"
        );
        Ok(target)
    }

    /// Depth-first copy of a directory tree using an explicit work stack.
    async fn copy_tree(&self, source: &Path, target: &Path) -> Result<()> {
        let mut pending = vec![(source.to_path_buf(), target.to_path_buf(), 0usize)];

        while let Some((from, to, depth)) = pending.pop() {
            if depth > self.max_walk_depth {
                return Err(AppError::BadRequest(format!(
                    "Directory tree under {} is deeper than {} levels",
                    source.display(),
                    self.max_walk_depth
                )));
            }

            fs::create_dir_all(&to)
                .await
                .map_err(|err| AppError::io(&to, err))?;

            let mut children = fs::read_dir(&from)
                .await
                .map_err(|err| AppError::io(&from, err))?;

            while let Some(child) = children
                .next_entry()
                .await
                .map_err(|err| AppError::io(&from, err))?
            {
                let child_from = child.path();
                let child_to = to.join(child.file_name());
                let metadata = fs::metadata(&child_from)
                    .await
                    .map_err(|err| AppError::io(&child_from, err))?;

                if metadata.is_dir() {
                    pending.push((child_from, child_to, depth + 1));
                } else {
                    fs::copy(&child_from, &child_to)
                        .await
                        .map_err(|err| AppError::io(&child_from, err))?;
                }
            }
        }

        Ok(())
    }

    /// Checks every path first and removes nothing unless all of them pass.
    /// The filesystem can still change between the two phases.
    pub async fn delete(&self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Err(AppError::BadRequest("path is required".to_string()));
        }

        let mut targets = Vec::with_capacity(paths.len());
        for raw in paths {
            let path = self
                .sandbox
                .check(raw)
                .map_err(|err| AppError::batch(0, err))?;
            let metadata = fs::symlink_metadata(&path)
                .await
                .map_err(|err| AppError::batch(0, missing_or_io(raw, &path, err)))?;
            targets.push((path, metadata.is_dir()));
        }

        for (index, (path, is_dir)) in targets.iter().enumerate() {
            remove_path(path, *is_dir)
                .await
                .map_err(|err| AppError::batch(index, err))?;
            info!(path = %path.display(), "deleted");
        }

        Ok(targets.len())
    }
}

/// `lstat`-based existence: a dangling symlink still occupies its name.
async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

async fn remove_path(path: &Path, is_dir: bool) -> Result<()> {
    let result = if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    result.map_err(|err| AppError::io(path, err))
}

pub(crate) fn missing_or_io(raw: &str, path: &Path, err: std::io::Error) -> AppError {
    if err.kind() == ErrorKind::NotFound {
        AppError::NotFound(raw.to_string())
    } else {
        AppError::io(path, err)
    }
}
