// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! Stands in for camera hardware: photos are synthesized test-pattern JPEGs
//! and recordings are Motion JPEG streams (concatenated JPEG frames) sized by
//! the recording's wall-clock duration. Only one binding may exist at a time,
//! like a real device, so a rebind that skips teardown fails.
//!
//! Failures can be injected to exercise error paths, and a running
//! recording can be interrupted the way a recorder running out of storage
//! ends one on its own.

use super::types::*;
use super::CameraBackend;
use crate::constants::{naming, virtual_camera as vc};
use crate::media::{MediaDestination, MediaKind, MediaReference};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Bind,
    Zoom,
    Photo,
    StartVideo,
    /// Finalize reports an error (e.g. insufficient storage)
    Finalize,
    /// Finalize succeeds but carries no output location
    FinalizeWithoutOutput,
}

#[derive(Debug)]
struct ActiveRecording {
    id: u64,
    binding_id: u64,
    path: PathBuf,
    resolution: ResolutionHint,
    lens: LensFacing,
    started_at: Instant,
    finalized: oneshot::Sender<BackendResult<RecordingOutput>>,
}

#[derive(Debug, Default)]
struct DeviceState {
    next_id: u64,
    binding: Option<CameraBinding>,
    recording: Option<ActiveRecording>,
    flash: bool,
    zoom: f32,
    failures: Vec<FailurePoint>,
    bind_count: usize,
    unbind_count: usize,
}

impl DeviceState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_failure(&mut self, point: FailurePoint) -> bool {
        match self.failures.iter().position(|p| *p == point) {
            Some(index) => {
                self.failures.remove(index);
                true
            }
            None => false,
        }
    }

    fn check_binding(&self, binding: &CameraBinding) -> BackendResult<()> {
        match &self.binding {
            Some(current) if current.id == binding.id => Ok(()),
            _ => Err(BackendError::NotBound),
        }
    }
}

/// File-producing camera without hardware
#[derive(Debug)]
pub struct VirtualCamera {
    state: Mutex<DeviceState>,
    max_zoom_ratio: f32,
    shutter_delay: Duration,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCamera {
    pub fn new() -> Self {
        Self::with_max_zoom(vc::MAX_ZOOM_RATIO)
    }

    /// Virtual lens with a specific zoom range
    pub fn with_max_zoom(max_zoom_ratio: f32) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                zoom: 1.0,
                ..Default::default()
            }),
            max_zoom_ratio: max_zoom_ratio.max(1.0),
            shutter_delay: vc::SHUTTER_DELAY,
        }
    }

    /// Time between a photo request and the frame being written
    pub fn with_shutter_delay(mut self, delay: Duration) -> Self {
        self.shutter_delay = delay;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next operation at `point` fail
    pub fn inject_failure(&self, point: FailurePoint) {
        self.lock().failures.push(point);
    }

    pub fn is_bound(&self) -> bool {
        self.lock().binding.is_some()
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording.is_some()
    }

    /// Lens of the current binding
    pub fn bound_lens(&self) -> Option<LensFacing> {
        self.lock().binding.as_ref().map(|b| b.lens)
    }

    pub fn zoom(&self) -> f32 {
        self.lock().zoom
    }

    pub fn flash(&self) -> bool {
        self.lock().flash
    }

    /// End the running recording with a device error, as the recorder does
    /// when storage runs out; `false` if nothing was recording
    pub fn interrupt_recording(&self, reason: &str) -> bool {
        let Some(active) = self.lock().recording.take() else {
            return false;
        };
        warn!(id = active.id, reason, "Virtual recording interrupted");
        if active
            .finalized
            .send(Err(BackendError::IoError(reason.to_string())))
            .is_err()
        {
            debug!(id = active.id, "Finalize event had no listener");
        }
        true
    }

    /// (binds, unbinds) performed so far
    pub fn lifecycle_counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.bind_count, state.unbind_count)
    }
}

#[async_trait]
impl CameraBackend for VirtualCamera {
    async fn bind(&self, lens: LensFacing, hint: ResolutionHint) -> BackendResult<CameraBinding> {
        tokio::time::sleep(vc::BIND_SETTLE).await;

        let mut state = self.lock();
        if state.take_failure(FailurePoint::Bind) {
            return Err(BackendError::InitializationFailed(format!(
                "{} camera failed to open",
                lens
            )));
        }
        if let Some(existing) = &state.binding {
            return Err(BackendError::InitializationFailed(format!(
                "device busy with binding {}",
                existing.id
            )));
        }

        let binding = CameraBinding {
            id: state.allocate_id(),
            lens,
            resolution: hint,
            max_zoom_ratio: self.max_zoom_ratio,
        };
        state.binding = Some(binding.clone());
        state.zoom = 1.0;
        state.bind_count += 1;

        info!(id = binding.id, lens = %lens, resolution = %hint, "Virtual camera bound");
        Ok(binding)
    }

    async fn unbind(&self, binding: &CameraBinding) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_binding(binding)?;

        if let Some(recording) = state.recording.take() {
            warn!(
                recording = recording.id,
                path = %recording.path.display(),
                "Recording abandoned by unbind"
            );
        }
        state.binding = None;
        state.unbind_count += 1;

        info!(id = binding.id, "Virtual camera unbound");
        Ok(())
    }

    async fn set_zoom(&self, binding: &CameraBinding, ratio: f32) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_binding(binding)?;
        if state.take_failure(FailurePoint::Zoom) {
            return Err(BackendError::Other("zoom control failed".to_string()));
        }
        state.zoom = ratio;
        Ok(())
    }

    async fn set_flash(&self, binding: &CameraBinding, on: bool) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_binding(binding)?;
        state.flash = on;
        Ok(())
    }

    async fn focus_at(&self, binding: &CameraBinding, point: MeteringPoint) -> BackendResult<()> {
        self.lock().check_binding(binding)?;
        debug!(x = point.x, y = point.y, "Virtual camera focus");
        Ok(())
    }

    async fn take_photo(
        &self,
        binding: &CameraBinding,
        destination: MediaDestination,
    ) -> BackendResult<MediaReference> {
        {
            let mut state = self.lock();
            state.check_binding(binding)?;
            if state.take_failure(FailurePoint::Photo) {
                return Err(BackendError::Other("photo capture failed".to_string()));
            }
        }
        tokio::time::sleep(self.shutter_delay).await;

        let destination = destination.with_mime_type(naming::PHOTO_MIME);
        let path = destination.path();
        let resolution = binding.resolution;
        let lens = binding.lens;
        let write_path = path.clone();

        tokio::task::spawn_blocking(move || {
            let frame = encode_frame(resolution, lens, 0)?;
            write_media(&write_path, &[frame])
        })
        .await
        .map_err(|e| BackendError::Other(format!("Task join error: {}", e)))??;

        let id = uuid::Uuid::new_v4().to_string();
        info!(id = %id, path = %path.display(), "Virtual photo saved");
        Ok(MediaReference::new(id, path, MediaKind::Photo))
    }

    async fn start_video(
        &self,
        binding: &CameraBinding,
        destination: MediaDestination,
    ) -> BackendResult<Recording> {
        let mut state = self.lock();
        state.check_binding(binding)?;
        if state.recording.is_some() {
            return Err(BackendError::RecordingInProgress);
        }
        if state.take_failure(FailurePoint::StartVideo) {
            return Err(BackendError::Other("recorder failed to start".to_string()));
        }

        let path = destination.with_mime_type(naming::MJPEG_MIME).path();
        let id = state.allocate_id();
        info!(id, path = %path.display(), "Virtual recording started");

        let (finalized_tx, finalized) = oneshot::channel();
        state.recording = Some(ActiveRecording {
            id,
            binding_id: binding.id,
            path,
            resolution: binding.resolution,
            lens: binding.lens,
            started_at: Instant::now(),
            finalized: finalized_tx,
        });

        Ok(Recording {
            handle: RecordingHandle {
                id,
                binding_id: binding.id,
            },
            finalized,
        })
    }

    async fn stop_video(&self, recording: &RecordingHandle) -> BackendResult<()> {
        let (active, fail, drop_output) = {
            let mut state = self.lock();
            let matches = state
                .recording
                .as_ref()
                .is_some_and(|r| r.id == recording.id && r.binding_id == recording.binding_id);
            if !matches {
                return Err(BackendError::NoRecordingInProgress);
            }
            let fail = state.take_failure(FailurePoint::Finalize);
            let drop_output = state.take_failure(FailurePoint::FinalizeWithoutOutput);
            match state.recording.take() {
                Some(active) => (active, fail, drop_output),
                None => return Err(BackendError::NoRecordingInProgress),
            }
        };

        debug!(id = active.id, "Virtual recording stopping");
        tokio::spawn(finalize_recording(active, fail, drop_output));
        Ok(())
    }
}

/// Write a stopped recording out and raise its finalize event
async fn finalize_recording(active: ActiveRecording, fail: bool, drop_output: bool) {
    let ActiveRecording {
        id,
        path,
        resolution,
        lens,
        started_at,
        finalized,
        ..
    } = active;

    let result = if fail {
        warn!(id, "Virtual recording finalized with error");
        Err(BackendError::IoError("insufficient storage".to_string()))
    } else if drop_output {
        warn!(id, "Virtual recording finalized without output");
        Ok(RecordingOutput {
            media_id: uuid::Uuid::new_v4().to_string(),
            location: None,
        })
    } else {
        write_recording(path, resolution, lens, started_at).await
    };

    if finalized.send(result).is_err() {
        debug!(id, "Finalize event had no listener");
    }
}

async fn write_recording(
    path: PathBuf,
    resolution: ResolutionHint,
    lens: LensFacing,
    started_at: Instant,
) -> BackendResult<RecordingOutput> {
    let frame_count = ((started_at.elapsed().as_millis() as u64 * vc::RECORDING_FPS as u64)
        / 1000)
        .clamp(1, vc::MAX_RECORDING_FRAMES);
    let write_path = path.clone();

    tokio::task::spawn_blocking(move || {
        let frames = (0..frame_count)
            .map(|seq| encode_frame(resolution, lens, seq))
            .collect::<BackendResult<Vec<_>>>()?;
        write_media(&write_path, &frames)
    })
    .await
    .map_err(|e| BackendError::Other(format!("Task join error: {}", e)))??;

    info!(path = %path.display(), frames = frame_count, "Virtual recording finalized");
    Ok(RecordingOutput {
        media_id: uuid::Uuid::new_v4().to_string(),
        location: Some(path),
    })
}

/// Scale the requested resolution down to the synthesized frame size
fn frame_size(resolution: ResolutionHint) -> (u32, u32) {
    let width = resolution.width.max(1);
    let height = resolution.height.max(1);
    let longest = width.max(height);
    if longest <= vc::MAX_FRAME_EDGE {
        return (width, height);
    }
    let scale = vc::MAX_FRAME_EDGE as f32 / longest as f32;
    (
        ((width as f32 * scale).round() as u32).max(1),
        ((height as f32 * scale).round() as u32).max(1),
    )
}

/// Render one test-pattern frame and encode it as JPEG
fn encode_frame(resolution: ResolutionHint, lens: LensFacing, seq: u64) -> BackendResult<Vec<u8>> {
    let (width, height) = frame_size(resolution);
    let tint: u8 = match lens {
        LensFacing::Back => 64,
        LensFacing::Front => 192,
    };
    let shift = (seq % 256) as u32;

    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            ((x * 255 / width + shift) % 256) as u8,
            ((y * 255 / height) % 256) as u8,
            tint,
        ])
    });

    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, vc::JPEG_QUALITY)
        .encode_image(&img)
        .map_err(|e| BackendError::Other(format!("JPEG encoding failed: {}", e)))?;
    Ok(bytes)
}

fn write_media(path: &Path, frames: &[Vec<u8>]) -> BackendResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, frames.concat())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(dir: &Path, kind: MediaKind) -> MediaDestination {
        MediaDestination::timestamped(dir, kind)
    }

    #[test]
    fn test_frame_size_caps_longest_edge() {
        let (w, h) = frame_size(ResolutionHint {
            width: 1920,
            height: 1080,
        });
        assert_eq!(w, vc::MAX_FRAME_EDGE);
        assert_eq!(h, 360);

        let small = ResolutionHint {
            width: 320,
            height: 240,
        };
        assert_eq!(frame_size(small), (320, 240));
    }

    #[tokio::test]
    async fn test_rebind_without_teardown_is_rejected() {
        let camera = VirtualCamera::new();
        let binding = camera
            .bind(LensFacing::Back, ResolutionHint::default())
            .await
            .unwrap();
        assert!(
            camera
                .bind(LensFacing::Front, ResolutionHint::default())
                .await
                .is_err()
        );

        camera.unbind(&binding).await.unwrap();
        assert!(
            camera
                .bind(LensFacing::Front, ResolutionHint::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_photo_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let camera = VirtualCamera::new();
        let binding = camera
            .bind(LensFacing::Back, ResolutionHint::default())
            .await
            .unwrap();

        let reference = camera
            .take_photo(&binding, destination(dir.path(), MediaKind::Photo))
            .await
            .unwrap();

        let bytes = std::fs::read(reference.location()).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(reference.kind(), MediaKind::Photo);
    }

    #[tokio::test]
    async fn test_recording_finalize_and_injected_failures() {
        let dir = tempfile::tempdir().unwrap();
        let camera = VirtualCamera::new();
        let binding = camera
            .bind(LensFacing::Front, ResolutionHint::default())
            .await
            .unwrap();

        let recording = camera
            .start_video(&binding, destination(dir.path(), MediaKind::Video))
            .await
            .unwrap();
        assert!(matches!(
            camera
                .start_video(&binding, destination(dir.path(), MediaKind::Video))
                .await,
            Err(BackendError::RecordingInProgress)
        ));
        camera.stop_video(&recording.handle).await.unwrap();
        assert_eq!(
            camera.stop_video(&recording.handle).await,
            Err(BackendError::NoRecordingInProgress)
        );
        let output = recording.finalized.await.unwrap().unwrap();
        let location = output.location.expect("output location");
        assert!(std::fs::metadata(&location).unwrap().len() > 0);

        camera.inject_failure(FailurePoint::FinalizeWithoutOutput);
        let recording = camera
            .start_video(&binding, destination(dir.path(), MediaKind::Video))
            .await
            .unwrap();
        camera.stop_video(&recording.handle).await.unwrap();
        assert_eq!(recording.finalized.await.unwrap().unwrap().location, None);

        camera.inject_failure(FailurePoint::Finalize);
        let recording = camera
            .start_video(&binding, destination(dir.path(), MediaKind::Video))
            .await
            .unwrap();
        camera.stop_video(&recording.handle).await.unwrap();
        assert!(matches!(
            recording.finalized.await.unwrap(),
            Err(BackendError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn test_interrupted_recording_finalizes_without_stop() {
        let dir = tempfile::tempdir().unwrap();
        let camera = VirtualCamera::new();
        let binding = camera
            .bind(LensFacing::Back, ResolutionHint::default())
            .await
            .unwrap();
        assert!(!camera.interrupt_recording("disk full"));

        let recording = camera
            .start_video(&binding, destination(dir.path(), MediaKind::Video))
            .await
            .unwrap();
        assert!(camera.interrupt_recording("disk full"));
        assert!(!camera.is_recording());
        assert_eq!(
            recording.finalized.await.unwrap(),
            Err(BackendError::IoError("disk full".to_string()))
        );
        assert_eq!(
            camera.stop_video(&recording.handle).await,
            Err(BackendError::NoRecordingInProgress)
        );
    }

    #[tokio::test]
    async fn test_unbind_abandons_recording() {
        let dir = tempfile::tempdir().unwrap();
        let camera = VirtualCamera::new();
        let binding = camera
            .bind(LensFacing::Back, ResolutionHint::default())
            .await
            .unwrap();
        let recording = camera
            .start_video(&binding, destination(dir.path(), MediaKind::Video))
            .await
            .unwrap();

        camera.unbind(&binding).await.unwrap();
        assert!(recording.finalized.await.is_err());
    }
}
