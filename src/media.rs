// SPDX-License-Identifier: GPL-3.0-only

//! Media handles passed between capture, review and the caller

use crate::constants::naming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// MIME type requested from a platform camera for this kind
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => naming::PHOTO_MIME,
            MediaKind::Video => naming::VIDEO_MIME,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Opaque handle to a stored photo or video
///
/// Produced by a photo completion or a recording finalize event, consumed by
/// review and, on confirm, handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaReference {
    id: String,
    location: PathBuf,
    kind: MediaKind,
}

impl MediaReference {
    pub fn new(id: impl Into<String>, location: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            kind,
        }
    }

    /// Collaborator-assigned identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the media is stored
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.location.display())
    }
}

/// Storage metadata of a media reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Size in bytes
    pub size: u64,
    /// Resolved filesystem path
    pub path: PathBuf,
}

impl MediaMetadata {
    /// Empty files are kept but not offered for playback
    pub fn is_playable(&self) -> bool {
        self.size > 0
    }
}

/// Where a capture should be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDestination {
    /// Target directory
    pub directory: PathBuf,
    /// File stem, without extension
    pub stem: String,
    /// Requested MIME type
    pub mime_type: &'static str,
}

impl MediaDestination {
    /// Destination named after the current local time
    pub fn timestamped(directory: impl Into<PathBuf>, kind: MediaKind) -> Self {
        let stem = chrono::Local::now()
            .format(naming::FILENAME_FORMAT)
            .to_string();
        Self {
            directory: directory.into(),
            stem,
            mime_type: kind.mime_type(),
        }
    }

    /// Same destination with a different MIME type (the backend may pick its container)
    pub fn with_mime_type(mut self, mime_type: &'static str) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Full output path including the extension implied by the MIME type
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!(
            "{}.{}",
            self.stem,
            naming::extension_for(self.mime_type)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_path_uses_mime_extension() {
        let dest = MediaDestination {
            directory: PathBuf::from("/tmp/media"),
            stem: "2024-01-01-00-00-00-000".to_string(),
            mime_type: naming::PHOTO_MIME,
        };
        assert_eq!(
            dest.path(),
            PathBuf::from("/tmp/media/2024-01-01-00-00-00-000.jpg")
        );

        let dest = dest.with_mime_type(naming::MJPEG_MIME);
        assert!(dest.path().to_string_lossy().ends_with(".mjpeg"));
    }

    #[test]
    fn test_timestamped_stem_shape() {
        let dest = MediaDestination::timestamped("/tmp", MediaKind::Video);
        // yyyy-MM-dd-HH-mm-ss-SSS
        assert_eq!(dest.stem.len(), 23);
        assert_eq!(dest.stem.matches('-').count(), 6);
        assert_eq!(dest.mime_type, naming::VIDEO_MIME);
    }

    #[test]
    fn test_empty_media_not_playable() {
        let meta = MediaMetadata {
            size: 0,
            path: PathBuf::from("/tmp/x.mp4"),
        };
        assert!(!meta.is_playable());
    }
}
