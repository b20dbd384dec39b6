// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state types

use crate::backends::camera::RecordingHandle;
use crate::constants::zoom::MIN_RATIO;
use std::time::Instant;

/// Which camera pipeline is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

/// A capture operation that can be in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOperation {
    Photo,
    Video,
}

impl std::fmt::Display for CaptureOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureOperation::Photo => write!(f, "photo capture"),
            CaptureOperation::Video => write!(f, "video recording"),
        }
    }
}

/// Session state machine
///
/// There is no state in which a photo and a video capture overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unbound,
    Bound,
    Capturing(CaptureOperation),
}

impl SessionState {
    pub fn mode(&self) -> CaptureMode {
        match self {
            SessionState::Capturing(CaptureOperation::Video) => CaptureMode::Video,
            _ => CaptureMode::Photo,
        }
    }
}

/// Recording state machine
///
/// Simple two-state design: either recording or not.
#[derive(Debug, Default)]
pub enum RecordingState {
    /// Not recording
    #[default]
    Idle,
    /// Actively recording
    Recording {
        /// When recording started
        start_time: Instant,
        /// Recorder handle, taken once a stop has been requested
        handle: Option<RecordingHandle>,
    },
}

impl RecordingState {
    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording { .. })
    }

    /// Whether a stop was requested and the finalize event is pending
    pub fn is_stopping(&self) -> bool {
        matches!(self, RecordingState::Recording { handle: None, .. })
    }

    /// Get the elapsed recording duration in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        match self {
            RecordingState::Idle => 0,
            RecordingState::Recording { start_time, .. } => start_time.elapsed().as_millis(),
        }
    }

    /// Start recording
    pub fn start(handle: RecordingHandle) -> Self {
        RecordingState::Recording {
            start_time: Instant::now(),
            handle: Some(handle),
        }
    }

    /// Take the recorder handle (consumes it)
    pub fn take_handle(&mut self) -> Option<RecordingHandle> {
        match self {
            RecordingState::Idle => None,
            RecordingState::Recording { handle, .. } => handle.take(),
        }
    }

    /// Stop recording (returns the previous state, leaves Idle)
    pub fn stop(&mut self) -> Self {
        std::mem::replace(self, RecordingState::Idle)
    }
}

/// Zoom ratio bounded by the binding's range
///
/// `1.0 <= current <= max` holds after every update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    current: f32,
    max: f32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(MIN_RATIO)
    }
}

impl ZoomState {
    /// Fresh zoom state for a binding; ratios below 1.0 are raised to 1.0
    pub fn new(max_ratio: f32) -> Self {
        let max = if max_ratio.is_finite() {
            max_ratio.max(MIN_RATIO)
        } else {
            MIN_RATIO
        };
        Self {
            current: MIN_RATIO,
            max,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Clamp a ratio into `[1.0, max]`; NaN maps to 1.0
    pub fn clamp(&self, ratio: f32) -> f32 {
        if ratio.is_nan() {
            MIN_RATIO
        } else {
            ratio.clamp(MIN_RATIO, self.max)
        }
    }

    /// Set the ratio (clamped) and return the value applied
    pub fn set(&mut self, ratio: f32) -> f32 {
        self.current = self.clamp(ratio);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamped_for_any_sequence() {
        let mut zoom = ZoomState::new(4.0);
        let deltas = [0.5, 3.0, 10.0, -2.0, -100.0, f32::INFINITY, f32::NAN, 1.25];
        for delta in deltas {
            let applied = zoom.set(zoom.current() + delta);
            assert!((1.0..=4.0).contains(&applied), "ratio {} escaped", applied);
        }
    }

    #[test]
    fn test_zoom_max_below_one_is_raised() {
        let zoom = ZoomState::new(0.5);
        assert_eq!(zoom.max(), 1.0);
        assert_eq!(zoom.clamp(3.0), 1.0);
    }

    #[test]
    fn test_recording_stop_request() {
        let mut recording = RecordingState::start(RecordingHandle {
            id: 1,
            binding_id: 1,
        });
        assert!(recording.is_recording());
        assert!(recording.take_handle().is_some());
        assert!(recording.is_stopping());
        assert!(recording.take_handle().is_none());
        recording.stop();
        assert!(!recording.is_recording());
    }

    #[test]
    fn test_mode_follows_video_capture() {
        assert_eq!(SessionState::Bound.mode(), CaptureMode::Photo);
        assert_eq!(
            SessionState::Capturing(CaptureOperation::Video).mode(),
            CaptureMode::Video
        );
    }
}
