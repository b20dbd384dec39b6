// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! Owns the live camera binding (lens facing, flash, zoom) and the capture
//! state machine `Unbound → Bound → Capturing(Photo | Video) → Bound`.
//!
//! Photo capture and recording are split into a step that moves the state
//! machine and hands back a future ([`begin_photo`](CaptureSession::begin_photo),
//! [`start_video`](CaptureSession::start_video)), and a `finish_*` step that
//! consumes its result. The coordinator runs the future as a task so that
//! events arriving meanwhile are rejected with
//! [`MediaError::OperationInProgress`] instead of being queued.
//!
//! A recording's future resolves on its finalize event, which the recorder
//! raises after [`request_stop`](CaptureSession::request_stop) or on its own
//! when it fails. The [`take_photo`](CaptureSession::take_photo) and
//! [`stop_video`](CaptureSession::stop_video) conveniences run both steps
//! inline.

pub mod state;

pub use state::{CaptureMode, CaptureOperation, RecordingState, SessionState, ZoomState};

use crate::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBinding, LensFacing, MeteringPoint, RecordingOutput,
    ResolutionHint,
};
use crate::errors::{MediaError, MediaResult};
use crate::media::{MediaDestination, MediaKind, MediaReference};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Photo capture in flight
pub type PendingPhoto = BoxFuture<'static, BackendResult<MediaReference>>;

/// Finalize event of a running recording
pub type PendingFinalize = BoxFuture<'static, BackendResult<RecordingOutput>>;

/// The bound camera pipeline and its capture state
pub struct CaptureSession {
    camera: Arc<dyn CameraBackend>,
    binding: Option<CameraBinding>,
    state: SessionState,
    recording: RecordingState,
    lens: LensFacing,
    flash: bool,
    zoom: ZoomState,
    resolution: ResolutionHint,
    media_dir: PathBuf,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("lens", &self.lens)
            .field("flash", &self.flash)
            .field("zoom", &self.zoom)
            .finish()
    }
}

impl CaptureSession {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        lens: LensFacing,
        resolution: ResolutionHint,
        media_dir: PathBuf,
    ) -> Self {
        Self {
            camera,
            binding: None,
            state: SessionState::Unbound,
            recording: RecordingState::Idle,
            lens,
            flash: false,
            zoom: ZoomState::default(),
            resolution,
            media_dir,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.state.mode()
    }

    pub fn recording(&self) -> &RecordingState {
        &self.recording
    }

    pub fn lens(&self) -> LensFacing {
        self.lens
    }

    pub fn flash(&self) -> bool {
        self.flash
    }

    pub fn zoom(&self) -> ZoomState {
        self.zoom
    }

    pub fn binding(&self) -> Option<&CameraBinding> {
        self.binding.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    fn require_binding(&self, action: &'static str) -> MediaResult<CameraBinding> {
        self.binding
            .clone()
            .ok_or_else(|| MediaError::invalid(self.state, action))
    }

    fn reject_if_capturing(&self) -> MediaResult<()> {
        match self.state {
            SessionState::Capturing(op) => Err(MediaError::OperationInProgress(op)),
            _ => Ok(()),
        }
    }

    // ===== Lifecycle =====

    /// Bind the camera for `lens`, tearing down any existing binding first
    ///
    /// The previous binding is fully released before the new one is
    /// requested; the device cannot host both.
    pub async fn bind(&mut self, lens: LensFacing) -> MediaResult<CameraBinding> {
        self.reject_if_capturing()?;

        if self.binding.is_some() {
            self.unbind().await;
        }

        info!(lens = %lens, resolution = %self.resolution, "Binding camera");
        let binding = self
            .camera
            .bind(lens, self.resolution)
            .await
            .map_err(|e| {
                error!(lens = %lens, error = %e, "Camera binding failed");
                MediaError::CameraBindingFailed(e.to_string())
            })?;

        self.lens = lens;
        self.zoom = ZoomState::new(binding.max_zoom_ratio);
        self.binding = Some(binding.clone());
        self.state = SessionState::Bound;

        if self.flash {
            if let Err(e) = self.camera.set_flash(&binding, true).await {
                warn!(error = %e, "Failed to restore flash after bind");
            }
        }
        Ok(binding)
    }

    /// Rebind with the opposite lens
    pub async fn switch_lens(&mut self) -> MediaResult<CameraBinding> {
        self.bind(self.lens.flipped()).await
    }

    /// Release the camera unconditionally
    ///
    /// Any capture in flight is abandoned; its late completion is rejected
    /// by the matching `finish_*` call.
    pub async fn unbind(&mut self) {
        let Some(binding) = self.binding.take() else {
            self.state = SessionState::Unbound;
            return;
        };

        if self.recording.stop().is_recording() {
            warn!("Releasing camera while recording");
        }
        if let SessionState::Capturing(op) = self.state {
            warn!(operation = %op, "Releasing camera with capture in flight");
        }
        self.state = SessionState::Unbound;

        match self.camera.unbind(&binding).await {
            Ok(()) => info!(id = binding.id, "Camera released"),
            Err(e) => warn!(id = binding.id, error = %e, "Camera unbind reported an error"),
        }
    }

    // ===== Controls =====

    /// Apply a zoom ratio clamped to `[1.0, max]`; returns the ratio applied
    pub async fn set_zoom(&mut self, ratio: f32) -> MediaResult<f32> {
        let binding = self.require_binding("set zoom")?;
        let applied = self.zoom.clamp(ratio);
        self.camera.set_zoom(&binding, applied).await?;
        self.zoom.set(applied);
        debug!(requested = ratio, applied, "Zoom applied");
        Ok(applied)
    }

    pub async fn set_flash(&mut self, on: bool) -> MediaResult<()> {
        let binding = self.require_binding("set flash")?;
        self.camera.set_flash(&binding, on).await?;
        self.flash = on;
        info!(on, "Flash mode changed");
        Ok(())
    }

    pub async fn focus_at(&self, point: MeteringPoint) -> MediaResult<()> {
        let binding = self.require_binding("focus")?;
        self.camera.focus_at(&binding, point).await?;
        Ok(())
    }

    fn destination(&self, kind: MediaKind) -> MediaDestination {
        MediaDestination::timestamped(&self.media_dir, kind)
    }

    // ===== Photo =====

    /// Enter `Capturing(Photo)` and hand back the capture to run
    pub fn begin_photo(&mut self) -> MediaResult<PendingPhoto> {
        self.reject_if_capturing()?;
        let binding = self.require_binding("take photo")?;

        let camera = Arc::clone(&self.camera);
        let destination = self.destination(MediaKind::Photo);
        self.state = SessionState::Capturing(CaptureOperation::Photo);
        info!(path = %destination.path().display(), "Taking photo");

        Ok(Box::pin(async move {
            camera.take_photo(&binding, destination).await
        }))
    }

    /// Consume a photo result; returns to `Bound` on success and on failure
    pub fn finish_photo(
        &mut self,
        result: BackendResult<MediaReference>,
    ) -> MediaResult<MediaReference> {
        if self.state != SessionState::Capturing(CaptureOperation::Photo) {
            return Err(MediaError::invalid(self.state, "complete photo"));
        }
        self.state = SessionState::Bound;

        match result {
            Ok(reference) => {
                info!(reference = %reference, "Photo saved");
                Ok(reference)
            }
            Err(e) => {
                error!(error = %e, "Photo capture failed");
                Err(MediaError::CaptureFailed(e.to_string()))
            }
        }
    }

    /// Take a photo and wait for it to be saved
    pub async fn take_photo(&mut self) -> MediaResult<MediaReference> {
        let pending = self.begin_photo()?;
        let result = pending.await;
        self.finish_photo(result)
    }

    // ===== Video =====

    /// Start recording; only valid from `Bound` with no recording active
    ///
    /// The returned future resolves on the recording's finalize event.
    pub async fn start_video(&mut self) -> MediaResult<PendingFinalize> {
        self.reject_if_capturing()?;
        let binding = self.require_binding("start video")?;
        if self.recording.is_recording() {
            return Err(MediaError::OperationInProgress(CaptureOperation::Video));
        }

        let destination = self.destination(MediaKind::Video);
        let recording = self
            .camera
            .start_video(&binding, destination)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to start recording");
                MediaError::CaptureFailed(e.to_string())
            })?;

        let id = recording.handle.id;
        info!(recording = id, "Recording started");
        self.recording = RecordingState::start(recording.handle);
        self.state = SessionState::Capturing(CaptureOperation::Video);

        let finalized = recording.finalized;
        Ok(Box::pin(async move {
            finalized.await.unwrap_or_else(|_| {
                Err(BackendError::Other(format!(
                    "recording {} ended without a finalize event",
                    id
                )))
            })
        }))
    }

    /// Ask the recorder to stop; the finalize event completes the recording
    ///
    /// A recorder that already ended on its own has its finalize event on
    /// the way, so a refused stop is only logged.
    pub async fn request_stop(&mut self) -> MediaResult<()> {
        if self.state != SessionState::Capturing(CaptureOperation::Video) {
            return Err(MediaError::invalid(self.state, "stop video"));
        }
        let Some(handle) = self.recording.take_handle() else {
            return Err(MediaError::invalid("finalize pending", "stop video"));
        };

        info!(
            recording = handle.id,
            elapsed_ms = self.recording.elapsed_ms() as u64,
            "Stopping recording"
        );
        if let Err(e) = self.camera.stop_video(&handle).await {
            warn!(recording = handle.id, error = %e, "Recorder refused stop");
        }
        Ok(())
    }

    /// Consume a finalize event, explicit or raised by the recorder itself
    ///
    /// A finalize without an output location is a capture failure. Either
    /// way the session returns to `Bound` with no recording.
    pub fn finish_video(
        &mut self,
        result: BackendResult<RecordingOutput>,
    ) -> MediaResult<MediaReference> {
        if self.state != SessionState::Capturing(CaptureOperation::Video) {
            return Err(MediaError::invalid(self.state, "finalize video"));
        }
        self.recording.stop();
        self.state = SessionState::Bound;

        match result {
            Ok(RecordingOutput {
                media_id,
                location: Some(location),
            }) => {
                let reference = MediaReference::new(media_id, location, MediaKind::Video);
                info!(reference = %reference, "Recording finalized");
                Ok(reference)
            }
            Ok(RecordingOutput { location: None, .. }) => {
                error!("Recording finalized without an output location");
                Err(MediaError::CaptureFailed(
                    "recording finalized without output location".to_string(),
                ))
            }
            Err(e) => {
                error!(error = %e, "Recording failed");
                Err(MediaError::CaptureFailed(e.to_string()))
            }
        }
    }

    /// Stop recording and wait for the finalize event
    pub async fn stop_video(&mut self, finalize: PendingFinalize) -> MediaResult<MediaReference> {
        self.request_stop().await?;
        let result = finalize.await;
        self.finish_video(result)
    }
}
