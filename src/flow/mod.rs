// SPDX-License-Identifier: GPL-3.0-only

//! Capture flow coordinator
//!
//! ```text
//! Init ─► PermissionCheck ─► Capture ◄─► Review ─► Terminal(Confirmed)
//!              │   ▲            │
//!              │   └─ Resumed ──┘        any state ─► Terminal(Cancelled)
//!              └─► Terminal(Cancelled)
//! ```
//!
//! The coordinator is a single task that owns every component. Host events
//! arrive on a channel; slow work (permission requests, photo capture,
//! recording finalize, metadata queries, deletes) runs in spawned tasks that
//! post their completion back to the coordinator. Only one capture operation
//! is ever in flight, and a second one is rejected rather than queued.
//!
//! A recording completes on the recorder's finalize event, whether the user
//! stopped it or the device ended it with an error.
//!
//! Reaching `Terminal` releases the camera whichever state the flow was in.
//! Permission and metadata work is aborted. A capture still in flight is
//! abandoned instead: whatever it stores afterwards is deleted.

pub mod state;

pub use state::{FlowEvent, FlowResult, FlowState, FlowUpdate};

use crate::backends::camera::{BackendResult, CameraBackend, RecordingOutput};
use crate::backends::permission::{PermissionBackend, RequestOutcome};
use crate::capture::CaptureSession;
use crate::config::Config;
use crate::errors::{MediaError, MediaResult};
use crate::gesture::{GestureConfig, GestureSignal, GestureZoomController, TouchEvent};
use crate::media::{MediaKind, MediaMetadata, MediaReference};
use crate::permission::{Capability, PermissionGate, PermissionPrompt};
use crate::review::ReviewController;
use crate::storage::StorageBackend;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// External systems the flow drives
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn CameraBackend>,
    pub permissions: Arc<dyn PermissionBackend>,
    pub storage: Arc<dyn StorageBackend>,
}

/// Results of spawned work, posted back to the coordinator
enum Completion {
    Permission(Capability, RequestOutcome),
    Photo(u64, BackendResult<MediaReference>),
    Finalized(u64, BackendResult<RecordingOutput>),
    Metadata(MediaReference, MediaResult<MediaMetadata>),
    Deleted(MediaReference, MediaResult<()>),
}

/// Sequences permissions, capture and review into one result
pub struct FlowCoordinator {
    state: FlowState,
    gate: PermissionGate,
    session: CaptureSession,
    gestures: GestureZoomController,
    review: ReviewController,
    permissions: Arc<dyn PermissionBackend>,
    storage: Arc<dyn StorageBackend>,
    updates: mpsc::UnboundedSender<FlowUpdate>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    /// Capability with a platform request outstanding
    pending_request: Option<Capability>,
    permission_task: Option<JoinHandle<()>>,
    metadata_task: Option<JoinHandle<()>>,
    /// Bumped whenever an in-flight capture is abandoned; shared with
    /// capture tasks so they can tell their result is no longer wanted
    capture_seq: Arc<AtomicU64>,
    epoch: Instant,
}

impl FlowCoordinator {
    /// Build a coordinator; updates for the host arrive on the returned receiver
    pub fn new(
        config: &Config,
        collaborators: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<FlowUpdate>) {
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            state: FlowState::Init,
            gate: PermissionGate::new(
                &config.required_capabilities,
                config.justifications.clone(),
            ),
            session: CaptureSession::new(
                collaborators.camera,
                config.default_lens,
                config.resolution_hint,
                config.media_directory(),
            ),
            gestures: GestureZoomController::new(GestureConfig::from(config)),
            review: ReviewController::new(Arc::clone(&collaborators.storage)),
            permissions: collaborators.permissions,
            storage: collaborators.storage,
            updates,
            completions_tx,
            completions_rx,
            pending_request: None,
            permission_task: None,
            metadata_task: None,
            capture_seq: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
        };
        (coordinator, updates_rx)
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Drive the flow until it reaches a terminal state
    ///
    /// A closed event channel counts as the host navigating away.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<FlowEvent>) -> FlowResult {
        info!(required = ?self.gate.required(), "Capture flow started");
        self.enter_permission_check().await;

        let mut ticker: Option<Interval> = None;
        loop {
            if let FlowState::Terminal(result) = &self.state {
                let result = result.clone();
                self.shutdown(&result).await;
                return result;
            }

            if self.gestures.needs_ticks() {
                if ticker.is_none() {
                    let period = self.gestures.config().progress_interval;
                    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    ticker = Some(interval);
                }
            } else {
                ticker = None;
            }

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        info!("Host went away, cancelling flow");
                        self.finish(FlowResult::Cancelled);
                    }
                },
                Some(completion) = self.completions_rx.recv() => self.complete(completion).await,
                _ = next_tick(&mut ticker) => self.on_tick().await,
            }
        }
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn emit(&self, update: FlowUpdate) {
        // The host may stop listening; the flow still runs to completion
        let _ = self.updates.send(update);
    }

    fn set_state(&mut self, state: FlowState) {
        if self.state != state {
            info!(from = self.state.name(), to = state.name(), "Flow state changed");
            self.state = state.clone();
            self.emit(FlowUpdate::StateChanged(state));
        }
    }

    fn finish(&mut self, result: FlowResult) {
        if self.state.is_terminal() {
            return;
        }
        self.set_state(FlowState::Terminal(result));
    }

    /// Report a failed operation: contract violations are rejected, the rest
    /// are recoverable capture errors
    fn report(&self, err: MediaError) {
        match err {
            MediaError::InvalidStateTransition { .. } | MediaError::OperationInProgress(_) => {
                warn!(state = self.state.name(), error = %err, "Event rejected");
                self.emit(FlowUpdate::Rejected(err));
            }
            _ => {
                error!(state = self.state.name(), error = %err, "Capture error");
                self.emit(FlowUpdate::CaptureError(err));
            }
        }
    }

    fn reject(&self, action: &'static str) {
        self.report(MediaError::invalid(self.state.name(), action));
    }

    // ===== Events =====

    async fn handle(&mut self, event: FlowEvent) {
        if self.state.is_terminal() {
            debug!(?event, "Flow finished, ignoring event");
            return;
        }

        match event {
            FlowEvent::Cancel => {
                info!(state = self.state.name(), "Flow cancelled by user");
                self.finish(FlowResult::Cancelled);
            }
            FlowEvent::Resumed => self.on_resumed().await,
            FlowEvent::RequestPermission => self.on_request_permission(),
            FlowEvent::OpenSettings => self.on_open_settings().await,
            FlowEvent::Confirm => self.on_confirm(),
            FlowEvent::Discard => self.on_discard().await,
            event if self.state != FlowState::Capture => {
                debug!(?event, "Capture event outside capture");
                self.reject(capture_action(&event));
            }
            FlowEvent::Touch(touch) => self.on_touch(touch).await,
            FlowEvent::TakePhoto => self.take_photo(),
            FlowEvent::StartVideo => self.start_video().await,
            FlowEvent::StopVideo => self.stop_video().await,
            FlowEvent::SwitchLens => self.switch_lens().await,
            FlowEvent::ToggleFlash => {
                let on = !self.session.flash();
                match self.session.set_flash(on).await {
                    Ok(()) => self.emit(FlowUpdate::FlashChanged(on)),
                    Err(e) => self.report(e),
                }
            }
            FlowEvent::SetZoom(ratio) => self.apply_zoom(ratio).await,
        }
    }

    async fn complete(&mut self, completion: Completion) {
        let stale = match &completion {
            Completion::Photo(seq, _) | Completion::Finalized(seq, _) => {
                !self.is_current_capture(*seq)
            }
            _ => false,
        };
        if stale {
            let storage = Arc::clone(&self.storage);
            tokio::spawn(async move { discard_abandoned(storage.as_ref(), completion).await });
            return;
        }

        match completion {
            Completion::Permission(capability, outcome) => {
                self.permission_task = None;
                self.pending_request = None;
                if self.state != FlowState::PermissionCheck {
                    debug!(capability = %capability, "Permission result outside permission check");
                    return;
                }
                self.gate.on_permission_result(capability, outcome);
                if let Some(err) = self.gate.blocking_error() {
                    self.emit(FlowUpdate::PermissionBlocked(err));
                }
                self.advance_permissions().await;
            }
            Completion::Photo(_, result) => {
                match self.session.finish_photo(result) {
                    Ok(reference) => self.enter_review(reference).await,
                    Err(e) => self.report(e),
                }
            }
            Completion::Finalized(_, result) => {
                // A press still held belongs to the recording that just ended
                self.gestures.reset();
                self.gestures.sync_zoom(self.session.zoom());
                self.emit(FlowUpdate::RecordingProgress(0.0));
                match self.session.finish_video(result) {
                    Ok(reference) => self.enter_review(reference).await,
                    Err(e) => self.report(e),
                }
            }
            Completion::Metadata(reference, result) => {
                self.metadata_task = None;
                if self.state != FlowState::Review(reference.clone()) {
                    return;
                }
                match result {
                    Ok(metadata) => {
                        let playable = metadata.is_playable();
                        if !playable {
                            warn!(reference = %reference, "Captured media is empty");
                        }
                        self.emit(FlowUpdate::MediaInfo { metadata, playable });
                    }
                    Err(e) => warn!(reference = %reference, error = %e, "Metadata query failed"),
                }
            }
            Completion::Deleted(reference, result) => {
                self.emit(FlowUpdate::Deleted { reference, result });
            }
        }
    }

    fn is_current_capture(&self, seq: u64) -> bool {
        let current = self.capture_seq.load(Ordering::SeqCst);
        if seq != current || self.state != FlowState::Capture {
            debug!(seq, current, "Dropping stale capture completion");
            return false;
        }
        true
    }

    /// Run a capture future as a task that reports back to the coordinator
    ///
    /// If the capture was abandoned by the time it completes, the task
    /// deletes whatever it stored instead of reporting.
    fn spawn_capture<T, F>(&self, pending: F, into_completion: fn(u64, T) -> Completion)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let seq = self.capture_seq.load(Ordering::SeqCst);
        let current = Arc::clone(&self.capture_seq);
        let storage = Arc::clone(&self.storage);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let completion = into_completion(seq, pending.await);
            if current.load(Ordering::SeqCst) != seq {
                return discard_abandoned(storage.as_ref(), completion).await;
            }
            if let Err(mpsc::error::SendError(completion)) = tx.send(completion) {
                discard_abandoned(storage.as_ref(), completion).await;
            }
        });
    }

    fn abandon_capture(&self) {
        self.capture_seq.fetch_add(1, Ordering::SeqCst);
    }

    // ===== Permissions =====

    async fn enter_permission_check(&mut self) {
        self.set_state(FlowState::PermissionCheck);
        self.refresh_permissions();
        self.advance_permissions().await;
    }

    fn refresh_permissions(&mut self) {
        let required = self.gate.required().to_vec();
        for capability in required {
            let granted = self.permissions.check_granted(capability);
            self.gate.refresh(capability, granted);
        }
    }

    /// Ask for the next missing capability, or open the camera once none is
    async fn advance_permissions(&mut self) {
        match self.gate.prompt() {
            None => self.enter_capture().await,
            Some(prompt) => {
                debug!(?prompt, "Permission prompt");
                self.emit(FlowUpdate::Prompt(prompt.clone()));
                if let PermissionPrompt::Request {
                    capability,
                    retry: false,
                    ..
                } = prompt
                {
                    self.request_permission(capability);
                }
            }
        }
    }

    fn request_permission(&mut self, capability: Capability) {
        if let Some(pending) = self.pending_request {
            debug!(capability = %pending, "Permission request already outstanding");
            return;
        }
        info!(capability = %capability, "Requesting permission");
        self.pending_request = Some(capability);

        let permissions = Arc::clone(&self.permissions);
        let tx = self.completions_tx.clone();
        self.permission_task = Some(tokio::spawn(async move {
            let outcome = permissions.request(capability).await;
            let _ = tx.send(Completion::Permission(capability, outcome));
        }));
    }

    fn on_request_permission(&mut self) {
        if self.state != FlowState::PermissionCheck {
            return self.reject("request permission");
        }
        match self.gate.prompt() {
            Some(PermissionPrompt::Request { capability, .. }) => {
                self.request_permission(capability)
            }
            Some(PermissionPrompt::SettingsOrCancel { capability }) => {
                self.emit(FlowUpdate::Rejected(
                    MediaError::PermissionPermanentlyDenied(capability),
                ));
            }
            None => {}
        }
    }

    async fn on_open_settings(&mut self) {
        match (&self.state, self.gate.prompt()) {
            (FlowState::PermissionCheck, Some(PermissionPrompt::SettingsOrCancel { capability })) => {
                info!(capability = %capability, "Opening system settings");
                self.permissions.open_settings().await;
            }
            _ => self.reject("open settings"),
        }
    }

    /// Re-check grants after the host returns to the foreground
    async fn on_resumed(&mut self) {
        match self.state {
            FlowState::PermissionCheck => {
                self.refresh_permissions();
                if self.pending_request.is_none() {
                    self.advance_permissions().await;
                }
            }
            FlowState::Capture => {
                self.refresh_permissions();
                if !self.gate.all_granted() {
                    warn!("Permission revoked while capturing");
                    self.release_camera().await;
                    self.enter_permission_check().await;
                } else if !self.session.is_bound() {
                    info!(lens = %self.session.lens(), "Retrying camera bind");
                    self.enter_capture().await;
                }
            }
            FlowState::Review(_) => {
                // Checked again on the way back to capture
                self.refresh_permissions();
            }
            FlowState::Init | FlowState::Terminal(_) => {}
        }
    }

    // ===== Capture =====

    async fn enter_capture(&mut self) {
        self.set_state(FlowState::Capture);
        let lens = self.session.lens();
        match self.session.bind(lens).await {
            Ok(binding) => {
                self.gestures.sync_zoom(self.session.zoom());
                self.emit(FlowUpdate::CameraReady {
                    lens: binding.lens,
                    max_zoom: self.session.zoom().max(),
                });
            }
            Err(e) => self.report(e),
        }
    }

    /// Back to capture after a discard, unless a grant went away meanwhile
    async fn return_to_capture(&mut self) {
        self.refresh_permissions();
        if self.gate.all_granted() {
            self.enter_capture().await;
        } else {
            self.enter_permission_check().await;
        }
    }

    async fn release_camera(&mut self) {
        self.abandon_capture();
        self.gestures.reset();
        self.session.unbind().await;
    }

    async fn on_touch(&mut self, touch: TouchEvent) {
        let signals = self.gestures.on_touch(touch, self.now());
        self.apply_signals(signals).await;
    }

    async fn on_tick(&mut self) {
        let signals = self.gestures.on_tick(self.now());
        self.apply_signals(signals).await;
    }

    async fn apply_signals(&mut self, signals: Vec<GestureSignal>) {
        for signal in signals {
            if self.state != FlowState::Capture {
                break;
            }
            match signal {
                GestureSignal::TakePhoto => self.take_photo(),
                GestureSignal::CaptureStart => self.start_video().await,
                GestureSignal::CaptureEnd => {
                    let recording = self.session.recording();
                    if recording.is_recording() && !recording.is_stopping() {
                        self.stop_video().await;
                    }
                }
                GestureSignal::Progress(degrees) => {
                    self.emit(FlowUpdate::RecordingProgress(degrees))
                }
                GestureSignal::Zoom(ratio) => self.apply_zoom(ratio).await,
                GestureSignal::FocusAt(point) => {
                    if let Err(e) = self.session.focus_at(point).await {
                        debug!(error = %e, "Focus request failed");
                    }
                }
            }
        }
    }

    async fn apply_zoom(&mut self, ratio: f32) {
        match self.session.set_zoom(ratio).await {
            Ok(applied) => {
                self.gestures.sync_zoom(self.session.zoom());
                self.emit(FlowUpdate::ZoomChanged(applied));
            }
            Err(e) => {
                // The pinch already moved the controller's ratio
                self.gestures.sync_zoom(self.session.zoom());
                self.report(e);
            }
        }
    }

    fn take_photo(&mut self) {
        match self.session.begin_photo() {
            Ok(pending) => self.spawn_capture(pending, Completion::Photo),
            Err(e) => self.report(e),
        }
    }

    async fn start_video(&mut self) {
        match self.session.start_video().await {
            Ok(finalize) => {
                self.spawn_capture(finalize, Completion::Finalized);
                self.emit(FlowUpdate::RecordingStarted);
            }
            Err(e) => self.report(e),
        }
    }

    async fn stop_video(&mut self) {
        if let Err(e) = self.session.request_stop().await {
            self.report(e);
        }
    }

    async fn switch_lens(&mut self) {
        match self.session.switch_lens().await {
            Ok(binding) => {
                self.gestures.sync_zoom(self.session.zoom());
                self.emit(FlowUpdate::CameraReady {
                    lens: binding.lens,
                    max_zoom: self.session.zoom().max(),
                });
            }
            Err(e) => self.report(e),
        }
    }

    // ===== Review =====

    async fn enter_review(&mut self, reference: MediaReference) {
        self.gestures.reset();
        self.session.unbind().await;

        if let Err(e) = self.review.present(reference.clone()) {
            self.report(e);
            return;
        }
        self.set_state(FlowState::Review(reference.clone()));
        self.emit(FlowUpdate::ReviewReady(reference.clone()));

        match self.review.metadata() {
            Ok(query) => {
                let tx = self.completions_tx.clone();
                self.metadata_task = Some(tokio::spawn(async move {
                    let result = query.await;
                    let _ = tx.send(Completion::Metadata(reference, result));
                }));
            }
            Err(e) => warn!(error = %e, "Cannot query metadata"),
        }
    }

    fn on_confirm(&mut self) {
        if !matches!(self.state, FlowState::Review(_)) {
            return self.reject("confirm");
        }
        match self.review.confirm() {
            Ok(result) => self.finish(result),
            Err(e) => self.report(e),
        }
    }

    async fn on_discard(&mut self) {
        if !matches!(self.state, FlowState::Review(_)) {
            return self.reject("discard");
        }
        let (reference, delete) = match self.review.discard() {
            Ok(discarded) => discarded,
            Err(e) => return self.report(e),
        };
        if let Some(task) = self.metadata_task.take() {
            task.abort();
        }

        // The delete outlives the flow; only its report goes through the loop
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = delete.await.unwrap_or_else(|e| {
                Err(MediaError::StorageDeleteFailed(format!("Task join error: {}", e)))
            });
            let _ = tx.send(Completion::Deleted(reference, result));
        });

        self.return_to_capture().await;
    }

    // ===== Teardown =====

    async fn shutdown(&mut self, result: &FlowResult) {
        for task in [self.permission_task.take(), self.metadata_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.abandon_capture();
        self.gestures.reset();
        self.session.unbind().await;

        // Captures that already reported are deleted here; later ones find
        // the channel closed and clean up after themselves
        self.completions_rx.close();
        while let Ok(completion) = self.completions_rx.try_recv() {
            if matches!(completion, Completion::Photo(..) | Completion::Finalized(..)) {
                discard_abandoned(self.storage.as_ref(), completion).await;
            }
        }

        match result {
            FlowResult::Confirmed(reference) => info!(reference = %reference, "Flow confirmed"),
            FlowResult::Cancelled => info!("Flow cancelled"),
        }
        self.emit(FlowUpdate::Finished(result.clone()));
    }
}

/// Delete media stored by a capture nobody is waiting for anymore
async fn discard_abandoned(storage: &dyn StorageBackend, completion: Completion) {
    let reference = match completion {
        Completion::Photo(_, Ok(reference)) => reference,
        Completion::Finalized(
            _,
            Ok(RecordingOutput {
                media_id,
                location: Some(location),
            }),
        ) => MediaReference::new(media_id, location, MediaKind::Video),
        _ => return,
    };
    match storage.delete(&reference).await {
        Ok(()) => info!(reference = %reference, "Deleted abandoned capture"),
        Err(e) => warn!(reference = %reference, error = %e, "Failed to delete abandoned capture"),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn capture_action(event: &FlowEvent) -> &'static str {
    match event {
        FlowEvent::Touch(_) => "touch",
        FlowEvent::TakePhoto => "take photo",
        FlowEvent::StartVideo => "start video",
        FlowEvent::StopVideo => "stop video",
        FlowEvent::SwitchLens => "switch lens",
        FlowEvent::ToggleFlash => "toggle flash",
        FlowEvent::SetZoom(_) => "set zoom",
        _ => "capture",
    }
}

/// Host side of a running flow
pub struct FlowHandle {
    events: mpsc::UnboundedSender<FlowEvent>,
    updates: mpsc::UnboundedReceiver<FlowUpdate>,
    task: JoinHandle<FlowResult>,
}

impl FlowHandle {
    /// Queue an event; `false` once the flow has ended
    pub fn send(&self, event: FlowEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Extra sender, e.g. for a signal handler
    pub fn sender(&self) -> mpsc::UnboundedSender<FlowEvent> {
        self.events.clone()
    }

    pub async fn next_update(&mut self) -> Option<FlowUpdate> {
        self.updates.recv().await
    }

    /// Skip updates until one matches; `None` if the flow ends first
    pub async fn wait_for<F>(&mut self, mut matches: F) -> Option<FlowUpdate>
    where
        F: FnMut(&FlowUpdate) -> bool,
    {
        while let Some(update) = self.updates.recv().await {
            if matches(&update) {
                return Some(update);
            }
        }
        None
    }

    /// Wait for the terminal result
    pub async fn result(self) -> FlowResult {
        let Self { events, updates, task } = self;
        let result = task.await;
        drop(events);
        drop(updates);
        result.unwrap_or_else(|e| {
            error!(error = %e, "Flow task failed");
            FlowResult::Cancelled
        })
    }

    /// Leave the flow without a decision, as a host navigating away
    pub async fn abandon(self) -> FlowResult {
        let Self { events, updates, task } = self;
        drop(events);
        drop(updates);
        task.await.unwrap_or_else(|e| {
            error!(error = %e, "Flow task failed");
            FlowResult::Cancelled
        })
    }
}

/// Validate the configuration and start a flow on the current runtime
pub fn launch(config: &Config, collaborators: Collaborators) -> MediaResult<FlowHandle> {
    config.validate()?;
    let (events, events_rx) = mpsc::unbounded_channel();
    let (coordinator, updates) = FlowCoordinator::new(config, collaborators);
    let task = tokio::spawn(coordinator.run(events_rx));
    Ok(FlowHandle {
        events,
        updates,
        task,
    })
}
