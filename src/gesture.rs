// SPDX-License-Identifier: GPL-3.0-only

//! Touch gesture interpretation
//!
//! Two touch surfaces feed the controller:
//!
//! - the **viewfinder**: a single pointer focuses, two pointers pinch-zoom;
//! - the **capture button**: a tap takes a photo, a press held past the
//!   long-press threshold starts a recording and a countdown that reports
//!   arc progress until release or the hard cutoff.
//!
//! The controller is pure: callers pass the current time with every event
//! and call [`GestureZoomController::on_tick`] at the progress cadence while
//! [`GestureZoomController::needs_ticks`] is true. The countdown only feeds
//! the progress arc; the recorder decides the real maximum length.

use crate::backends::camera::MeteringPoint;
use crate::capture::ZoomState;
use crate::config::Config;
use crate::constants::gesture::PROGRESS_FULL_DEGREES;
use std::time::Duration;
use tracing::debug;

/// Touch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Surface a touch lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchTarget {
    Viewfinder,
    CaptureButton,
}

/// One pointer update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub target: TouchTarget,
    pub pointer_id: u32,
    pub x: f32,
    pub y: f32,
    pub phase: TouchPhase,
}

impl TouchEvent {
    pub fn new(target: TouchTarget, pointer_id: u32, x: f32, y: f32, phase: TouchPhase) -> Self {
        Self {
            target,
            pointer_id,
            x,
            y,
            phase,
        }
    }

    /// Capture-button event; the position does not matter there
    pub fn button(pointer_id: u32, phase: TouchPhase) -> Self {
        Self::new(TouchTarget::CaptureButton, pointer_id, 0.0, 0.0, phase)
    }

    /// Viewfinder event
    pub fn viewfinder(pointer_id: u32, x: f32, y: f32, phase: TouchPhase) -> Self {
        Self::new(TouchTarget::Viewfinder, pointer_id, x, y, phase)
    }
}

/// What a gesture asks the flow to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureSignal {
    /// Tap on the capture button
    TakePhoto,
    /// Long press began
    CaptureStart,
    /// Long press released, cancelled or cut off
    CaptureEnd,
    /// Countdown arc in degrees (0 resets it)
    Progress(f32),
    /// New zoom ratio from a pinch
    Zoom(f32),
    /// Single pointer down on the viewfinder
    FocusAt(MeteringPoint),
}

/// Gesture tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Pinch distance per unit of zoom
    pub zoom_sensitivity: f32,
    pub long_press: Duration,
    pub capture_cutoff: Duration,
    pub progress_interval: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for GestureConfig {
    fn from(config: &Config) -> Self {
        Self {
            zoom_sensitivity: config.zoom_sensitivity,
            long_press: Duration::from_millis(config.long_press_ms),
            capture_cutoff: Duration::from_millis(config.capture_cutoff_ms),
            progress_interval: Duration::from_millis(config.progress_interval_ms),
        }
    }
}

/// Capture-button press state
#[derive(Debug, Clone, Copy, PartialEq)]
enum PressState {
    Idle,
    /// Down, not yet a long press
    Pressed { pointer_id: u32, since: Duration },
    /// Long press active, countdown running
    Capturing { pointer_id: u32, started: Duration },
    /// Cut off; waiting for the pointer to lift
    Expired { pointer_id: u32 },
}

/// Converts touch streams into capture and zoom signals
#[derive(Debug, Clone)]
pub struct GestureZoomController {
    config: GestureConfig,
    zoom: ZoomState,
    pointers: Vec<(u32, f32, f32)>,
    initial_distance: Option<f32>,
    press: PressState,
}

impl GestureZoomController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            zoom: ZoomState::default(),
            pointers: Vec::new(),
            initial_distance: None,
            press: PressState::Idle,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Track the session's zoom (after a bind or an explicit zoom change)
    pub fn sync_zoom(&mut self, zoom: ZoomState) {
        self.zoom = zoom;
    }

    pub fn zoom(&self) -> ZoomState {
        self.zoom
    }

    /// Whether the countdown needs [`on_tick`](Self::on_tick) calls
    pub fn needs_ticks(&self) -> bool {
        matches!(
            self.press,
            PressState::Pressed { .. } | PressState::Capturing { .. }
        )
    }

    /// Forget all pointers and any press in progress
    pub fn reset(&mut self) {
        self.pointers.clear();
        self.initial_distance = None;
        self.press = PressState::Idle;
    }

    pub fn on_touch(&mut self, event: TouchEvent, now: Duration) -> Vec<GestureSignal> {
        match event.target {
            TouchTarget::Viewfinder => self.on_viewfinder(event),
            TouchTarget::CaptureButton => self.on_button(event, now),
        }
    }

    /// Advance the long-press detection and the countdown
    pub fn on_tick(&mut self, now: Duration) -> Vec<GestureSignal> {
        match self.press {
            PressState::Pressed { pointer_id, since } => {
                if now.saturating_sub(since) >= self.config.long_press {
                    debug!(pointer_id, "Long press, capture start");
                    self.press = PressState::Capturing {
                        pointer_id,
                        started: since + self.config.long_press,
                    };
                    vec![GestureSignal::CaptureStart]
                } else {
                    Vec::new()
                }
            }
            PressState::Capturing {
                pointer_id,
                started,
            } => {
                let elapsed = now.saturating_sub(started);
                if elapsed >= self.config.capture_cutoff {
                    debug!(pointer_id, "Capture cutoff reached");
                    self.press = PressState::Expired { pointer_id };
                    vec![GestureSignal::CaptureEnd, GestureSignal::Progress(0.0)]
                } else {
                    vec![GestureSignal::Progress(self.progress_degrees(elapsed))]
                }
            }
            PressState::Idle | PressState::Expired { .. } => Vec::new(),
        }
    }

    /// Arc sweep for an elapsed countdown time
    pub fn progress_degrees(&self, elapsed: Duration) -> f32 {
        let cutoff = self.config.capture_cutoff.as_millis().max(1) as f32;
        let ratio = (elapsed.as_millis() as f32 / cutoff).min(1.0);
        ratio * PROGRESS_FULL_DEGREES
    }

    fn on_button(&mut self, event: TouchEvent, now: Duration) -> Vec<GestureSignal> {
        match (event.phase, self.press) {
            (TouchPhase::Down, PressState::Idle) => {
                self.press = PressState::Pressed {
                    pointer_id: event.pointer_id,
                    since: now,
                };
                Vec::new()
            }
            (TouchPhase::Up, PressState::Pressed { pointer_id, .. })
                if pointer_id == event.pointer_id =>
            {
                self.press = PressState::Idle;
                vec![GestureSignal::TakePhoto]
            }
            (TouchPhase::Up | TouchPhase::Cancel, PressState::Capturing { pointer_id, .. })
                if pointer_id == event.pointer_id =>
            {
                self.press = PressState::Idle;
                vec![GestureSignal::CaptureEnd, GestureSignal::Progress(0.0)]
            }
            (
                TouchPhase::Up | TouchPhase::Cancel,
                PressState::Pressed { pointer_id, .. } | PressState::Expired { pointer_id },
            ) if pointer_id == event.pointer_id => {
                self.press = PressState::Idle;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_viewfinder(&mut self, event: TouchEvent) -> Vec<GestureSignal> {
        match event.phase {
            TouchPhase::Down => {
                self.pointers.retain(|(id, _, _)| *id != event.pointer_id);
                self.pointers.push((event.pointer_id, event.x, event.y));
                match self.pointers.len() {
                    1 => vec![GestureSignal::FocusAt(MeteringPoint {
                        x: event.x,
                        y: event.y,
                    })],
                    _ => {
                        self.initial_distance = self.pinch_distance();
                        Vec::new()
                    }
                }
            }
            TouchPhase::Move => {
                if let Some(pointer) = self
                    .pointers
                    .iter_mut()
                    .find(|(id, _, _)| *id == event.pointer_id)
                {
                    pointer.1 = event.x;
                    pointer.2 = event.y;
                }
                if self.pointers.len() != 2 {
                    return Vec::new();
                }
                self.apply_pinch()
            }
            TouchPhase::Up => {
                self.pointers.retain(|(id, _, _)| *id != event.pointer_id);
                self.initial_distance = if self.pointers.len() >= 2 {
                    self.pinch_distance()
                } else {
                    None
                };
                Vec::new()
            }
            TouchPhase::Cancel => {
                self.pointers.clear();
                self.initial_distance = None;
                Vec::new()
            }
        }
    }

    fn pinch_distance(&self) -> Option<f32> {
        match self.pointers.as_slice() {
            [(_, x0, y0), (_, x1, y1), ..] => {
                let dx = x0 - x1;
                let dy = y0 - y1;
                Some((dx * dx + dy * dy).sqrt())
            }
            _ => None,
        }
    }

    fn apply_pinch(&mut self) -> Vec<GestureSignal> {
        let (Some(initial), Some(current)) = (self.initial_distance, self.pinch_distance()) else {
            return Vec::new();
        };

        let delta = (current - initial) / self.config.zoom_sensitivity;
        let previous = self.zoom.current();
        let ratio = self.zoom.set(previous + delta);
        // Incremental: the next delta is measured from here
        self.initial_distance = Some(current);

        if ratio == previous {
            Vec::new()
        } else {
            vec![GestureSignal::Zoom(ratio)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn controller(max_zoom: f32) -> GestureZoomController {
        let mut controller = GestureZoomController::new(GestureConfig::default());
        controller.sync_zoom(ZoomState::new(max_zoom));
        controller
    }

    fn start_pinch(controller: &mut GestureZoomController, distance: f32) {
        controller.on_touch(TouchEvent::viewfinder(0, 0.0, 0.0, TouchPhase::Down), ms(0));
        controller.on_touch(
            TouchEvent::viewfinder(1, distance, 0.0, TouchPhase::Down),
            ms(0),
        );
    }

    #[test]
    fn test_pinch_delta_from_initial_distance() {
        let mut controller = controller(4.0);
        start_pinch(&mut controller, 100.0);

        let signals = controller.on_touch(
            TouchEvent::viewfinder(1, 300.0, 0.0, TouchPhase::Move),
            ms(10),
        );
        assert_eq!(signals, vec![GestureSignal::Zoom(2.0)]);
    }

    #[test]
    fn test_pinch_is_incremental() {
        let mut controller = controller(4.0);
        start_pinch(&mut controller, 100.0);

        controller.on_touch(TouchEvent::viewfinder(1, 300.0, 0.0, TouchPhase::Move), ms(10));
        // Same position again: no further change
        let signals =
            controller.on_touch(TouchEvent::viewfinder(1, 300.0, 0.0, TouchPhase::Move), ms(20));
        assert!(signals.is_empty());

        let signals =
            controller.on_touch(TouchEvent::viewfinder(1, 400.0, 0.0, TouchPhase::Move), ms(30));
        assert_eq!(signals, vec![GestureSignal::Zoom(2.5)]);
    }

    #[test]
    fn test_pinch_stays_within_bounds() {
        let mut controller = controller(4.0);
        start_pinch(&mut controller, 100.0);

        let positions = [5000.0, 20.0, 1.0, 9000.0, 150.0, 0.5, 400.0];
        for (i, x) in positions.into_iter().enumerate() {
            controller.on_touch(
                TouchEvent::viewfinder(1, x, 0.0, TouchPhase::Move),
                ms(i as u64),
            );
            let ratio = controller.zoom().current();
            assert!((1.0..=4.0).contains(&ratio), "ratio {} escaped", ratio);
        }
    }

    #[test]
    fn test_single_pointer_focuses_and_does_not_zoom() {
        let mut controller = controller(4.0);
        let signals =
            controller.on_touch(TouchEvent::viewfinder(0, 12.0, 34.0, TouchPhase::Down), ms(0));
        assert_eq!(
            signals,
            vec![GestureSignal::FocusAt(MeteringPoint { x: 12.0, y: 34.0 })]
        );
        let signals =
            controller.on_touch(TouchEvent::viewfinder(0, 500.0, 34.0, TouchPhase::Move), ms(5));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_pinch_ends_when_pointer_lifts() {
        let mut controller = controller(4.0);
        start_pinch(&mut controller, 100.0);
        controller.on_touch(TouchEvent::viewfinder(1, 100.0, 0.0, TouchPhase::Up), ms(5));
        let signals =
            controller.on_touch(TouchEvent::viewfinder(0, 900.0, 0.0, TouchPhase::Move), ms(6));
        assert!(signals.is_empty());
        assert_eq!(controller.zoom().current(), 1.0);
    }

    #[test]
    fn test_tap_takes_photo() {
        let mut controller = controller(1.0);
        controller.on_touch(TouchEvent::button(7, TouchPhase::Down), ms(0));
        assert!(controller.needs_ticks());
        assert!(controller.on_tick(ms(50)).is_empty());

        let signals = controller.on_touch(TouchEvent::button(7, TouchPhase::Up), ms(120));
        assert_eq!(signals, vec![GestureSignal::TakePhoto]);
        assert!(!controller.needs_ticks());
    }

    #[test]
    fn test_hold_reports_progress_until_release() {
        let mut controller = controller(1.0);
        let long_press = controller.config().long_press.as_millis() as u64;
        controller.on_touch(TouchEvent::button(1, TouchPhase::Down), ms(0));

        let mut now = 0;
        let mut started = false;
        while now < long_press {
            now += 50;
            let signals = controller.on_tick(ms(now));
            if signals.contains(&GestureSignal::CaptureStart) {
                started = true;
            }
        }
        assert!(started);

        // 2500 ms of capture at a 50 ms cadence
        let mut progress = Vec::new();
        for _ in 0..50 {
            now += 50;
            for signal in controller.on_tick(ms(now)) {
                match signal {
                    GestureSignal::Progress(degrees) => progress.push(degrees),
                    other => panic!("unexpected signal {:?}", other),
                }
            }
        }
        assert_eq!(progress.len(), 50);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        let last = progress[progress.len() - 1];
        assert!((last - 15.0).abs() < 1e-3, "last progress {}", last);

        let signals = controller.on_touch(TouchEvent::button(1, TouchPhase::Up), ms(now));
        assert_eq!(
            signals,
            vec![GestureSignal::CaptureEnd, GestureSignal::Progress(0.0)]
        );
        assert!(!controller.needs_ticks());
    }

    #[test]
    fn test_cutoff_forces_capture_end() {
        let mut controller = GestureZoomController::new(GestureConfig {
            zoom_sensitivity: 200.0,
            long_press: ms(100),
            capture_cutoff: ms(1000),
            progress_interval: ms(50),
        });
        controller.on_touch(TouchEvent::button(3, TouchPhase::Down), ms(0));
        assert_eq!(controller.on_tick(ms(100)), vec![GestureSignal::CaptureStart]);
        assert_eq!(
            controller.on_tick(ms(600)),
            vec![GestureSignal::Progress(180.0)]
        );
        assert_eq!(
            controller.on_tick(ms(1100)),
            vec![GestureSignal::CaptureEnd, GestureSignal::Progress(0.0)]
        );
        assert!(!controller.needs_ticks());

        // Releasing after the cutoff neither ends the capture again nor takes a photo
        assert!(
            controller
                .on_touch(TouchEvent::button(3, TouchPhase::Up), ms(1200))
                .is_empty()
        );
    }

    #[test]
    fn test_cancel_before_long_press_is_not_a_tap() {
        let mut controller = controller(1.0);
        controller.on_touch(TouchEvent::button(2, TouchPhase::Down), ms(0));
        assert!(
            controller
                .on_touch(TouchEvent::button(2, TouchPhase::Cancel), ms(30))
                .is_empty()
        );
        assert!(!controller.needs_ticks());
    }
}
