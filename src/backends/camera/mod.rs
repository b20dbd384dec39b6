// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The platform camera is consumed through the [`CameraBackend`] trait.
//!
//! ```text
//! ┌─────────────────────┐
//! │   FlowCoordinator   │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Binding ownership, capture state machine
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   ┌────────────────┐
//!   │ VirtualCamera  │  ← File-producing implementation
//!   └────────────────┘
//! ```

pub mod types;
pub mod virtual_camera;

pub use types::*;
pub use virtual_camera::VirtualCamera;

use crate::media::{MediaDestination, MediaReference};
use async_trait::async_trait;

/// Camera backend trait
///
/// Every operation is asynchronous: implementations complete it when the
/// device reports back (capture saved, recording finalized).
#[async_trait]
pub trait CameraBackend: Send + Sync {
    // ===== Lifecycle =====

    /// Bind the camera for the given lens with preview, photo and video pipelines
    async fn bind(&self, lens: LensFacing, hint: ResolutionHint) -> BackendResult<CameraBinding>;

    /// Release the binding and the hardware behind it
    ///
    /// Completes only once the device is fully torn down.
    async fn unbind(&self, binding: &CameraBinding) -> BackendResult<()>;

    // ===== Controls =====

    /// Apply a zoom ratio (already clamped by the caller)
    async fn set_zoom(&self, binding: &CameraBinding, ratio: f32) -> BackendResult<()>;

    /// Turn photo flash on or off
    async fn set_flash(&self, binding: &CameraBinding, on: bool) -> BackendResult<()>;

    /// Focus and meter on a viewfinder point
    async fn focus_at(&self, _binding: &CameraBinding, _point: MeteringPoint) -> BackendResult<()> {
        Ok(())
    }

    // ===== Capture =====

    /// Capture a photo and store it at `destination`
    async fn take_photo(
        &self,
        binding: &CameraBinding,
        destination: MediaDestination,
    ) -> BackendResult<MediaReference>;

    /// Start recording to `destination`
    ///
    /// The finalize event is delivered on [`Recording::finalized`].
    async fn start_video(
        &self,
        binding: &CameraBinding,
        destination: MediaDestination,
    ) -> BackendResult<Recording>;

    /// Ask the recorder to stop
    ///
    /// Returns once the request is accepted; the outcome arrives as the
    /// recording's finalize event. Fails with
    /// [`BackendError::NoRecordingInProgress`] if the recording already ended.
    async fn stop_video(&self, recording: &RecordingHandle) -> BackendResult<()>;
}
