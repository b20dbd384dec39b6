// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Which physical camera a binding uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LensFacing {
    Front,
    #[default]
    Back,
}

impl LensFacing {
    /// The opposite lens
    pub fn flipped(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

/// Preferred capture resolution; the backend picks the closest it supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionHint {
    pub width: u32,
    pub height: u32,
}

impl Default for ResolutionHint {
    fn default() -> Self {
        Self {
            width: crate::constants::resolution::DEFAULT_WIDTH,
            height: crate::constants::resolution::DEFAULT_HEIGHT,
        }
    }
}

impl std::fmt::Display for ResolutionHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Point on the viewfinder, in view coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeteringPoint {
    pub x: f32,
    pub y: f32,
}

/// An active association with a camera device and its pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct CameraBinding {
    /// Backend-assigned binding id
    pub id: u64,
    /// Lens the binding was made for
    pub lens: LensFacing,
    /// Resolution actually selected
    pub resolution: ResolutionHint,
    /// Maximum zoom ratio of the bound device (at least 1.0)
    pub max_zoom_ratio: f32,
}

/// An in-progress recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingHandle {
    /// Backend-assigned recording id
    pub id: u64,
    /// Binding the recording runs on
    pub binding_id: u64,
}

/// A started recording and the channel its finalize event arrives on
///
/// The recorder raises exactly one finalize event per recording, whether it
/// was asked to stop or ended on its own (e.g. storage ran out). A closed
/// channel means the recording was abandoned without one.
#[derive(Debug)]
pub struct Recording {
    pub handle: RecordingHandle,
    pub finalized: oneshot::Receiver<BackendResult<RecordingOutput>>,
}

/// Payload of a recording's finalize event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingOutput {
    /// Identifier of the stored media
    pub media_id: String,
    /// Output location, if the recorder produced one
    pub location: Option<PathBuf>,
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Failed to initialize the device
    InitializationFailed(String),
    /// Operation needs a binding that does not exist (anymore)
    NotBound,
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// General I/O error (e.g. insufficient storage)
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::NotBound => write!(f, "Camera not bound"),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
