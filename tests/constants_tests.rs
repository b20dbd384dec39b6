// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use media_selector::constants::{gesture, naming};
use media_selector::gesture::{GestureConfig, GestureZoomController};
use media_selector::media::{MediaDestination, MediaKind};
use std::time::Duration;

#[test]
fn test_progress_reaches_full_circle_at_cutoff() {
    let controller = GestureZoomController::new(GestureConfig::default());
    let cutoff = Duration::from_millis(gesture::CAPTURE_CUTOFF_MS);

    assert_eq!(controller.progress_degrees(cutoff), gesture::PROGRESS_FULL_DEGREES);
    assert_eq!(controller.progress_degrees(cutoff * 2), 360.0);
    assert!((controller.progress_degrees(Duration::from_millis(2500)) - 15.0).abs() < 0.01);
    assert_eq!(controller.progress_degrees(Duration::ZERO), 0.0);
}

#[test]
fn test_long_press_shorter_than_cutoff() {
    assert!(gesture::LONG_PRESS_MS < gesture::CAPTURE_CUTOFF_MS);
    assert!(gesture::PROGRESS_INTERVAL_MS < gesture::LONG_PRESS_MS);
}

#[test]
fn test_destination_names() {
    let photo = MediaDestination::timestamped("/tmp/out", MediaKind::Photo);
    assert_eq!(photo.mime_type, naming::PHOTO_MIME);
    let path = photo.path();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
    // 2024-03-01-12-30-05-123
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
    assert_eq!(stem.split('-').count(), 7);

    let video = MediaDestination::timestamped("/tmp/out", MediaKind::Video)
        .with_mime_type(naming::MJPEG_MIME);
    assert_eq!(
        video.path().extension().and_then(|e| e.to_str()),
        Some("mjpeg")
    );
}
