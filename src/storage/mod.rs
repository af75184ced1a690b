// File attachment store
//
// Uploaded files live under one root directory, served back at /uploads/*.
// The database stores web paths ("/uploads/articles/gambar-....jpg"), never
// disk paths. Deletion is best-effort: a missing file is logged and the
// request that triggered it still succeeds.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::ApiError;

/// Web prefix every stored path starts with.
pub const WEB_PREFIX: &str = "/uploads";

/// Filesystem seam, swapped out in tests.
#[async_trait]
pub trait AttachmentBackend: Send + Sync {
    async fn remove(&self, path: &Path) -> std::io::Result<()>;
}

struct FsBackend;

#[async_trait]
impl AttachmentBackend for FsBackend {
    async fn remove(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// A file accepted during the current request. If the owning write fails,
/// the request handler releases these again before responding.
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    /// Multipart field the file arrived under.
    pub field: String,
    /// Stored web path.
    pub path: String,
    /// Prefix the path was stored under; release re-checks it.
    pub prefix: &'static str,
}

/// A stored path scheduled for release after a write commits.
#[derive(Debug, Clone)]
pub struct PendingRelease {
    pub path: String,
    pub prefix: &'static str,
}

impl From<&AcceptedUpload> for PendingRelease {
    fn from(upload: &AcceptedUpload) -> Self {
        PendingRelease {
            path: upload.path.clone(),
            prefix: upload.prefix,
        }
    }
}

#[derive(Clone)]
pub struct FileAttachmentStore {
    root: PathBuf,
    max_file_size: usize,
    backend: Arc<dyn AttachmentBackend>,
}

impl FileAttachmentStore {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            max_file_size: config.max_file_size_bytes,
            backend: Arc::new(FsBackend),
        }
    }

    pub fn with_backend(
        config: &UploadConfig,
        backend: Arc<dyn AttachmentBackend>,
    ) -> Self {
        Self {
            root: PathBuf::from(&config.root_dir),
            max_file_size: config.max_file_size_bytes,
            backend,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and persist one uploaded file under `prefix`. The stored name
    /// is derived from the field, the current millisecond timestamp and a
    /// random tail; the client's file name is never used for the path.
    pub async fn accept(
        &self,
        prefix: &'static str,
        field: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<AcceptedUpload, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::validation(format!(
                "uploaded file for '{}' is empty",
                field
            )));
        }
        if bytes.len() > self.max_file_size {
            return Err(ApiError::validation(format!(
                "uploaded file for '{}' exceeds the {} byte limit",
                field, self.max_file_size
            )));
        }
        let ext = sniff_image(bytes).ok_or_else(|| {
            ApiError::validation(format!(
                "uploaded file '{}' for '{}' is not a supported image (jpeg, png, gif, webp)",
                original_name, field
            ))
        })?;

        let folder = folder_of(prefix);
        let filename = format!(
            "{}-{}-{}.{}",
            sanitize_field(field),
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8],
            ext
        );

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::persistence("failed to prepare upload directory", Some(e.to_string())))?;
        tokio::fs::write(dir.join(&filename), bytes)
            .await
            .map_err(|e| ApiError::persistence("failed to store uploaded file", Some(e.to_string())))?;

        let path = format!("{}{}", prefix, filename);
        debug!(path, size = bytes.len(), "stored attachment");
        Ok(AcceptedUpload {
            field: field.to_string(),
            path,
            prefix,
        })
    }

    /// Best-effort removal of a stored path. Paths outside their required
    /// prefix are refused and logged; nothing here ever fails the request.
    pub async fn release(&self, path: &str, required_prefix: &str) {
        if !path_within(path, required_prefix) {
            warn!(
                path,
                required_prefix, "refusing to release path outside its prefix"
            );
            return;
        }
        let Some(disk) = self.disk_path(path) else {
            warn!(path, "refusing to release unmappable path");
            return;
        };
        match self.backend.remove(&disk).await {
            Ok(()) => debug!(path, "released attachment"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path, "attachment already gone")
            }
            Err(e) => warn!(path, error = %e, "failed to release attachment"),
        }
    }

    /// Release a batch; the removals are independent of each other.
    pub async fn release_many(&self, pending: &[PendingRelease]) {
        futures::future::join_all(
            pending
                .iter()
                .map(|p| self.release(&p.path, p.prefix)),
        )
        .await;
    }

    /// Roll back files accepted earlier in a failed request.
    pub async fn release_accepted(&self, uploads: &[AcceptedUpload]) {
        let pending: Vec<PendingRelease> = uploads.iter().map(PendingRelease::from).collect();
        self.release_many(&pending).await;
    }

    fn disk_path(&self, web_path: &str) -> Option<PathBuf> {
        let rel = web_path.strip_prefix(WEB_PREFIX)?.strip_prefix('/')?;
        if rel.is_empty() || rel.starts_with('/') {
            return None;
        }
        Some(self.root.join(rel))
    }
}

/// A path may only be released under the exact prefix its entity declares.
fn path_within(path: &str, required_prefix: &str) -> bool {
    required_prefix.starts_with(WEB_PREFIX)
        && path.starts_with(required_prefix)
        && !path.contains("..")
        && !path.contains('\\')
}

fn folder_of(prefix: &str) -> &str {
    prefix.trim_start_matches(WEB_PREFIX).trim_matches('/')
}

fn sanitize_field(field: &str) -> String {
    let cleaned: String = field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Identify the image type from its leading bytes. The client-supplied file
/// name and content type are not trusted.
fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}
