// SPDX-License-Identifier: GPL-3.0-only

//! Flow states, inputs and outputs

use crate::backends::camera::LensFacing;
use crate::errors::MediaError;
use crate::gesture::TouchEvent;
use crate::media::{MediaMetadata, MediaReference};
use crate::permission::PermissionPrompt;
use serde::{Deserialize, Serialize};

/// Terminal value of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FlowResult {
    Confirmed(MediaReference),
    Cancelled,
}

impl FlowResult {
    pub fn reference(&self) -> Option<&MediaReference> {
        match self {
            FlowResult::Confirmed(reference) => Some(reference),
            FlowResult::Cancelled => None,
        }
    }
}

/// Top-level flow state
///
/// `Terminal` is absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Init,
    PermissionCheck,
    Capture,
    Review(MediaReference),
    Terminal(FlowResult),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Terminal(_))
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Init => "init",
            FlowState::PermissionCheck => "permission-check",
            FlowState::Capture => "capture",
            FlowState::Review(_) => "review",
            FlowState::Terminal(_) => "terminal",
        }
    }
}

/// Input from the host (user actions and lifecycle)
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Ask again for a previously denied capability
    RequestPermission,
    /// Send the user to system settings for a capability that cannot be asked again
    OpenSettings,
    /// Host came back to the foreground
    Resumed,
    Touch(TouchEvent),
    TakePhoto,
    StartVideo,
    StopVideo,
    SwitchLens,
    ToggleFlash,
    SetZoom(f32),
    Confirm,
    Discard,
    /// Back / cancel from any state
    Cancel,
}

/// Output to the host
#[derive(Debug, Clone, PartialEq)]
pub enum FlowUpdate {
    StateChanged(FlowState),
    /// Present a permission request or the settings-or-cancel choice
    Prompt(PermissionPrompt),
    /// A request was refused; the prompt that follows says what is possible next
    PermissionBlocked(MediaError),
    CameraReady { lens: LensFacing, max_zoom: f32 },
    ZoomChanged(f32),
    FlashChanged(bool),
    RecordingStarted,
    /// Countdown arc in degrees
    RecordingProgress(f32),
    /// Recoverable capture or binding failure; the flow stays in capture
    CaptureError(MediaError),
    ReviewReady(MediaReference),
    MediaInfo {
        metadata: MediaMetadata,
        playable: bool,
    },
    /// Background delete of a discarded capture finished
    Deleted {
        reference: MediaReference,
        result: Result<(), MediaError>,
    },
    /// Event not valid in the current state
    Rejected(MediaError),
    Finished(FlowResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[test]
    fn test_result_json_shape() {
        let json = serde_json::to_value(FlowResult::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!({ "result": "cancelled" }));

        let confirmed = FlowResult::Confirmed(MediaReference::new(
            "abc",
            "/tmp/abc.jpg",
            MediaKind::Photo,
        ));
        let json = serde_json::to_value(&confirmed).unwrap();
        assert_eq!(json["result"], "confirmed");
        assert_eq!(json["id"], "abc");
        assert_eq!(json["location"], "/tmp/abc.jpg");
    }
}
