// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Gesture tuning constants
///
/// These are tuned values, not hard invariants. Each one backs a
/// [`Config`](crate::config::Config) field and only acts as its default.
pub mod gesture {
    /// Pinch distance (in touch units) that changes the zoom ratio by 1.0
    pub const ZOOM_SENSITIVITY: f32 = 200.0;

    /// Hold time before a capture-button press turns into a long press
    pub const LONG_PRESS_MS: u64 = 500;

    /// Hard cutoff of the press-and-hold capture countdown
    pub const CAPTURE_CUTOFF_MS: u64 = 60_000;

    /// Cadence of countdown progress reports
    pub const PROGRESS_INTERVAL_MS: u64 = 50;

    /// Full sweep of the progress arc in degrees
    pub const PROGRESS_FULL_DEGREES: f32 = 360.0;
}

/// Zoom bounds
pub mod zoom {
    /// Lowest zoom ratio any binding accepts
    pub const MIN_RATIO: f32 = 1.0;
}

/// Output naming for captured media
pub mod naming {
    /// Local-time file stem, millisecond precision (e.g. `2024-03-01-12-30-05-123`)
    pub const FILENAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

    /// MIME type requested for photos
    pub const PHOTO_MIME: &str = "image/jpeg";

    /// MIME type requested for platform video recordings
    pub const VIDEO_MIME: &str = "video/mp4";

    /// MIME type of recordings produced by the virtual camera
    pub const MJPEG_MIME: &str = "video/x-motion-jpeg";

    /// File extension for a MIME type
    pub fn extension_for(mime: &str) -> &'static str {
        match mime {
            PHOTO_MIME => "jpg",
            VIDEO_MIME => "mp4",
            MJPEG_MIME => "mjpeg",
            _ => "bin",
        }
    }
}

/// Default camera resolution hint
pub mod resolution {
    /// Default hint width
    pub const DEFAULT_WIDTH: u32 = 1920;

    /// Default hint height
    pub const DEFAULT_HEIGHT: u32 = 1080;
}

/// Virtual camera output constants
pub mod virtual_camera {
    use super::Duration;

    /// Frame rate of synthesized recordings
    pub const RECORDING_FPS: u32 = 5;

    /// Upper bound on frames written for one recording
    pub const MAX_RECORDING_FRAMES: u64 = 300;

    /// Edge length cap for synthesized frames (keeps test-pattern files small)
    pub const MAX_FRAME_EDGE: u32 = 640;

    /// JPEG quality for synthesized frames
    pub const JPEG_QUALITY: u8 = 80;

    /// Maximum zoom ratio reported by the virtual lens
    pub const MAX_ZOOM_RATIO: f32 = 8.0;

    /// Simulated settle time of a bind
    pub const BIND_SETTLE: Duration = Duration::from_millis(5);

    /// Simulated time between a photo request and the frame being written
    pub const SHUTTER_DELAY: Duration = Duration::from_millis(5);
}

/// Application information utilities
pub mod app_info {
    /// Application name used for config and media directories
    pub const APP_NAME: &str = "media-selector";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(naming::extension_for(naming::PHOTO_MIME), "jpg");
        assert_eq!(naming::extension_for(naming::VIDEO_MIME), "mp4");
        assert_eq!(naming::extension_for(naming::MJPEG_MIME), "mjpeg");
        assert_eq!(naming::extension_for("application/x-unknown"), "bin");
    }
}
