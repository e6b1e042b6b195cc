//! Media payload classification and spooling.
//!
//! Payloads from `/next-video` are written to a spool directory so the video
//! pipeline can open them by path. Each spooled file is owned by a
//! [`MediaHandle`]; dropping the handle releases the file.

use crate::api::{ApiError, MediaPayload};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// Prefix of every spool file; used to sweep leftovers.
const SPOOL_PREFIX: &str = "media-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Classify a `Content-Type` header value.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("video") {
            Some(MediaKind::Video)
        } else if content_type.contains("image") {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image => "png",
        }
    }
}

/// Why a load attempt failed. All variants are retried by the playback loop.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Unsupported content type: {0}")]
    Unsupported(String),

    #[error("failed to spool media: {0}")]
    Spool(#[from] std::io::Error),
}

/// A spooled payload. The file is removed when the handle is dropped.
#[derive(Debug)]
pub struct MediaHandle {
    path: PathBuf,
    kind: MediaKind,
    size: u64,
}

impl MediaHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        tracing::debug!("Releasing {:?}", self.path);
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove spool file {:?}: {}", self.path, e);
            }
        }
    }
}

/// Writes payloads into the spool directory.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    /// Create the spool directory and sweep files left by a previous run.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).context("Failed to create spool directory")?;
        let spool = Self { dir };
        let swept = spool.sweep();
        if swept > 0 {
            tracing::info!("Removed {} stale spool files", swept);
        }
        Ok(spool)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sweep(&self) -> usize {
        let mut removed = 0;
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let is_spool_file = entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(SPOOL_PREFIX));
            if is_spool_file {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Failed to remove {:?}: {}", entry.path(), e),
                }
            }
        }
        removed
    }

    /// Classify `payload` and write it to a fresh spool file.
    pub async fn store(&self, payload: MediaPayload) -> Result<MediaHandle, LoadError> {
        let kind = MediaKind::from_content_type(&payload.content_type)
            .ok_or_else(|| LoadError::Unsupported(payload.content_type.clone()))?;

        let path = self.dir.join(format!(
            "{}{:016x}.{}",
            SPOOL_PREFIX,
            rand::random::<u64>(),
            kind.extension()
        ));

        // Own the path before writing so a failed write still cleans up.
        let handle = MediaHandle {
            path,
            kind,
            size: payload.bytes.len() as u64,
        };

        let mut file = tokio::fs::File::create(&handle.path).await?;
        file.write_all(&payload.bytes).await?;
        file.flush().await?;

        tracing::debug!(
            "Spooled {:?} ({:.2} KB)",
            handle.path,
            handle.size as f64 / 1024.0
        );
        Ok(handle)
    }
}
