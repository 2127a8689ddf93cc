//! Streaming ZIP packaging for multi-path downloads.
//!
//! The archive is written into one end of an in-memory duplex pipe by a
//! spawned task while the response body drains the other end, so memory use
//! is bounded by the pipe buffer rather than by the size of the tree. A task
//! that fails part way ends the body with an error instead of a clean EOF.

use async_zip::error::ZipError;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use axum::body::{Body, Bytes};
use futures_util::stream::{self, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::sandbox;

const PIPE_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_ARCHIVE_NAME: &str = "download";

/// `<base>.zip` for a single path, `<parent dir>.zip` for several.
pub fn archive_name(paths: &[String]) -> String {
    let source = match paths {
        [] => None,
        [single] => Some(sandbox::normalize(single)),
        [first, ..] => Some(parent_of(&sandbox::normalize(first))),
    };

    let base = source
        .as_deref()
        .and_then(|path| Path::new(path).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());

    format!("{}.zip", base)
}

fn parent_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Starts packaging `roots` in the background and returns the body that
/// streams the archive bytes as they are produced.
pub fn archive_body(roots: Vec<PathBuf>, max_depth: usize) -> Body {
    let (writer, reader) = tokio::io::duplex(PIPE_BUFFER_SIZE);
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = write_archive(writer, &roots, max_depth).await;
        match &outcome {
            Ok(entries) => info!(roots = roots.len(), entries, "archive stream finished"),
            Err(err) => error!(error = %err, "archive stream aborted"),
        }
        let _ = done_tx.send(outcome.map(|_| ()));
    });

    // the pipe reaches EOF as soon as the writer is dropped, so the task's
    // outcome decides whether the body ends cleanly or with an error
    let trailer = stream::once(done_rx).filter_map(|outcome| async move {
        match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(Err::<Bytes, _>(io::Error::new(
                io::ErrorKind::Other,
                format!("archive incomplete: {}", err),
            ))),
            Err(_) => Some(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive task ended without a result",
            ))),
        }
    });

    Body::from_stream(ReaderStream::new(reader).chain(trailer))
}

/// Writes every path in `roots` into a ZIP on `writer`, naming entries
/// relative to each root's parent. Nodes whose metadata cannot be read, and
/// nodes deeper than `max_depth`, are skipped. A root without a base name is
/// archived under `download/`. Returns the number of entries.
pub async fn write_archive<W>(writer: W, roots: &[PathBuf], max_depth: usize) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut zip = ZipFileWriter::with_tokio(writer);
    let mut written = 0;

    for root in roots {
        let root_name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());

        let mut pending = vec![(root.clone(), root_name, 0usize)];
        while let Some((path, entry_name, depth)) = pending.pop() {
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable archive node");
                    continue;
                }
            };

            if metadata.is_dir() {
                if depth >= max_depth {
                    warn!(path = %path.display(), max_depth, "skipping directory below depth limit");
                    continue;
                }

                let children = match read_children(&path).await {
                    Ok(children) => children,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable directory");
                        continue;
                    }
                };

                if children.is_empty() {
                    let builder = ZipEntryBuilder::new(format!("{}/", entry_name).into(), Compression::Stored);
                    zip.write_entry_whole(builder, &[]).await.map_err(zip_error)?;
                    written += 1;
                    continue;
                }

                // reversed so the stack pops children in name order
                for child in children.into_iter().rev() {
                    let child_entry = format!("{}/{}", entry_name, child);
                    pending.push((path.join(&child), child_entry, depth + 1));
                }
            } else {
                let file = match fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable file");
                        continue;
                    }
                };

                let builder = ZipEntryBuilder::new(entry_name.clone().into(), Compression::Deflate);
                let mut entry = zip.write_entry_stream(builder).await.map_err(zip_error)?;
                futures_util::io::copy(&mut file.compat(), &mut entry)
                    .await
                    .map_err(|err| AppError::io(&path, err))?;
                entry.close().await.map_err(zip_error)?;

                debug!(entry = %entry_name, size = metadata.len(), "archived file");
                written += 1;
            }
        }
    }

    zip.close().await.map_err(zip_error)?;
    Ok(written)
}

async fn read_children(path: &Path) -> std::io::Result<Vec<String>> {
    let mut dir = fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(child) = dir.next_entry().await? {
        names.push(child.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn zip_error(err: ZipError) -> AppError {
    AppError::Other(anyhow::Error::new(err).context("failed to write zip archive"))
}
