// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for captured photo and video files

use crate::errors::{MediaError, MediaResult};
use crate::media::{MediaMetadata, MediaReference};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Platform file/content storage
///
/// Both operations may block on disk I/O; implementations must keep that off
/// the caller's thread.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Remove the stored media
    async fn delete(&self, reference: &MediaReference) -> MediaResult<()>;

    /// Size and resolved path of the stored media
    async fn query_metadata(&self, reference: &MediaReference) -> MediaResult<MediaMetadata>;
}

/// Storage backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileStorage;

impl FileStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn delete(&self, reference: &MediaReference) -> MediaResult<()> {
        let path = reference.location().to_path_buf();
        debug!(path = %path.display(), "Deleting media file");

        let result = tokio::task::spawn_blocking(move || std::fs::remove_file(&path))
            .await
            .map_err(|e| MediaError::StorageDeleteFailed(format!("Task join error: {}", e)))?;

        result.map_err(|e| {
            MediaError::StorageDeleteFailed(format!("{}: {}", reference.location().display(), e))
        })?;
        info!(id = reference.id(), "Media file deleted");
        Ok(())
    }

    async fn query_metadata(&self, reference: &MediaReference) -> MediaResult<MediaMetadata> {
        let path = reference.location().to_path_buf();

        tokio::task::spawn_blocking(move || {
            let metadata = std::fs::metadata(&path)
                .map_err(|e| MediaError::StorageQueryFailed(format!("{}: {}", path.display(), e)))?;
            let resolved = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            Ok(MediaMetadata {
                size: metadata.len(),
                path: resolved,
            })
        })
        .await
        .map_err(|e| MediaError::StorageQueryFailed(format!("Task join error: {}", e)))?
    }
}

/// Default directory for captured media
///
/// `~/Pictures/media-selector`, or the working directory when no picture
/// directory is known.
pub fn default_media_directory() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::constants::app_info::APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[tokio::test]
    async fn test_metadata_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.jpg");
        std::fs::write(&path, b"12345").unwrap();
        let reference = MediaReference::new("clip", &path, MediaKind::Photo);

        let storage = FileStorage::new();
        let metadata = storage.query_metadata(&reference).await.unwrap();
        assert_eq!(metadata.size, 5);
        assert!(metadata.is_playable());

        storage.delete(&reference).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let reference = MediaReference::new("gone", dir.path().join("gone.jpg"), MediaKind::Photo);

        let err = FileStorage::new().delete(&reference).await.unwrap_err();
        assert!(matches!(err, MediaError::StorageDeleteFailed(_)));
        let err = FileStorage::new().query_metadata(&reference).await.unwrap_err();
        assert!(matches!(err, MediaError::StorageQueryFailed(_)));
    }
}
