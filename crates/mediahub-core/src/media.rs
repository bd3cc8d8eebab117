//! Media storage
//!
//! Uploaded files arrive as locally staged paths. A [`MediaStore`] turns a
//! staged file into a durable asset with a public URL. The staged file is
//! consumed either way: it is removed whether or not the upload succeeds.

use crate::{MediaHubError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A durably stored media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Public URL the asset is served from
    pub url: String,
    /// Store-specific identifier, used for deletion
    pub public_id: String,
    /// Coarse kind: `image`, `video` or `raw`
    pub resource_type: String,
    /// Size in bytes
    pub bytes: u64,
    /// Playback duration in seconds, when the store can derive it
    pub duration: Option<f64>,
}

/// Trait for media storage backends
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a locally staged file. The local file is removed afterwards.
    async fn upload(&self, local_path: &Path) -> Result<MediaAsset>;

    /// Delete a previously uploaded asset
    async fn delete(&self, public_id: &str) -> Result<()>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Filesystem-backed media store
///
/// Moves staged files into `upload_dir` under a random name and exposes them
/// below `public_base_url`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(upload_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    async fn store(&self, local_path: &Path) -> Result<MediaAsset> {
        let metadata = tokio::fs::metadata(local_path).await?;
        if !metadata.is_file() {
            return Err(MediaHubError::MediaError(format!(
                "{} is not a regular file",
                local_path.display()
            )));
        }

        let extension = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let public_id = match &extension {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let destination = self.upload_dir.join(&public_id);

        // Rename fails across filesystems; fall back to copying.
        if tokio::fs::rename(local_path, &destination).await.is_err() {
            tokio::fs::copy(local_path, &destination).await?;
        }

        Ok(MediaAsset {
            url: format!("{}/{public_id}", self.public_base_url),
            public_id,
            resource_type: resource_type_for(extension.as_deref()).to_string(),
            bytes: metadata.len(),
            duration: None,
        })
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, local_path: &Path) -> Result<MediaAsset> {
        let result = self.store(local_path).await;

        if let Err(e) = tokio::fs::remove_file(local_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %local_path.display(), error = %e, "Failed to remove staged upload");
            }
        }

        match &result {
            Ok(asset) => tracing::debug!(public_id = %asset.public_id, bytes = asset.bytes, "Stored media asset"),
            Err(e) => tracing::warn!(path = %local_path.display(), error = %e, "Media upload failed"),
        }

        result
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        if public_id.is_empty() || public_id.contains(['/', '\\']) || public_id.starts_with('.') {
            return Err(MediaHubError::ValidationError(format!(
                "Invalid media id: {public_id}"
            )));
        }

        match tokio::fs::remove_file(self.upload_dir.join(public_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaHubError::NotFound(format!("media {public_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

fn resource_type_for(extension: Option<&str>) -> &'static str {
    match extension {
        Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg") => "image",
        Some("mp4" | "webm" | "mov" | "mkv" | "avi" | "m4v") => "video",
        _ => "raw",
    }
}
