// SPDX-License-Identifier: GPL-3.0-only

//! Permission gating
//!
//! The gate decides which capability to ask for next and interprets the
//! answers reported by the permission collaborator. It performs no I/O:
//! requests and their asynchronous results are driven by the flow
//! coordinator.

use crate::backends::permission::RequestOutcome;
use crate::errors::MediaError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A capability the capture flow depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Camera,
    Microphone,
    Storage,
}

impl Capability {
    /// All capabilities in acquisition priority order
    pub const ALL: [Capability; 3] = [
        Capability::Camera,
        Capability::Microphone,
        Capability::Storage,
    ];

    /// Get display name for the capability
    pub fn display_name(&self) -> &'static str {
        match self {
            Capability::Camera => "Camera",
            Capability::Microphone => "Microphone",
            Capability::Storage => "Storage",
        }
    }

    fn index(self) -> usize {
        match self {
            Capability::Camera => 0,
            Capability::Microphone => 1,
            Capability::Storage => 2,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "camera" => Ok(Capability::Camera),
            "microphone" | "audio" | "mic" => Ok(Capability::Microphone),
            "storage" | "store" => Ok(Capability::Storage),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Grant status of one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Unknown,
    Granted,
    Denied,
    PermanentlyDenied,
}

/// Status of every capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionState {
    statuses: [PermissionStatus; 3],
}

impl PermissionState {
    pub fn get(&self, capability: Capability) -> PermissionStatus {
        self.statuses[capability.index()]
    }

    fn set(&mut self, capability: Capability, status: PermissionStatus) {
        self.statuses[capability.index()] = status;
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.get(capability) == PermissionStatus::Granted
    }
}

/// First capability of `required` that is not granted, in fixed priority order
///
/// The order of `required` does not matter; Camera always precedes
/// Microphone, which always precedes Storage.
pub fn next_missing(state: &PermissionState, required: &[Capability]) -> Option<Capability> {
    Capability::ALL
        .into_iter()
        .filter(|cap| required.contains(cap))
        .find(|cap| !state.is_granted(*cap))
}

/// Caller-supplied explanation per capability
///
/// Empty text means no explanatory panel is shown for that capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Justifications {
    pub camera: String,
    pub microphone: String,
    pub storage: String,
}

impl Justifications {
    pub fn new(
        camera: impl Into<String>,
        microphone: impl Into<String>,
        storage: impl Into<String>,
    ) -> Self {
        Self {
            camera: camera.into(),
            microphone: microphone.into(),
            storage: storage.into(),
        }
    }

    /// Justification text, or `None` when the panel should be omitted
    pub fn for_capability(&self, capability: Capability) -> Option<&str> {
        let text = match capability {
            Capability::Camera => &self.camera,
            Capability::Microphone => &self.microphone,
            Capability::Storage => &self.storage,
        };
        if text.is_empty() { None } else { Some(text.as_str()) }
    }
}

/// What the user should be shown next while permissions are missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionPrompt {
    /// Ask the platform for the capability
    Request {
        capability: Capability,
        justification: Option<String>,
        /// Previously denied; wait for the user's request action instead of asking right away
        retry: bool,
    },
    /// The platform will not ask again: offer system settings or cancel the flow
    SettingsOrCancel { capability: Capability },
}

impl PermissionPrompt {
    pub fn capability(&self) -> Capability {
        match self {
            PermissionPrompt::Request { capability, .. } => *capability,
            PermissionPrompt::SettingsOrCancel { capability } => *capability,
        }
    }
}

/// Sequential acquisition of the required capabilities
#[derive(Debug, Clone)]
pub struct PermissionGate {
    state: PermissionState,
    required: Vec<Capability>,
    justifications: Justifications,
}

impl PermissionGate {
    pub fn new(required: &[Capability], justifications: Justifications) -> Self {
        let mut required = required.to_vec();
        required.sort();
        required.dedup();
        Self {
            state: PermissionState::default(),
            required,
            justifications,
        }
    }

    pub fn state(&self) -> &PermissionState {
        &self.state
    }

    pub fn required(&self) -> &[Capability] {
        &self.required
    }

    /// Next capability to acquire, `None` once everything required is granted
    pub fn next_missing(&self) -> Option<Capability> {
        next_missing(&self.state, &self.required)
    }

    pub fn all_granted(&self) -> bool {
        self.next_missing().is_none()
    }

    /// Record a `checkGranted` answer
    ///
    /// A revoked grant drops back to `Unknown`; a denial recorded earlier is
    /// kept so the user is not asked again without cause.
    pub fn refresh(&mut self, capability: Capability, granted: bool) {
        let current = self.state.get(capability);
        let next = match (granted, current) {
            (true, _) => PermissionStatus::Granted,
            (false, PermissionStatus::Granted) => PermissionStatus::Unknown,
            (false, other) => other,
        };
        if next != current {
            debug!(capability = %capability, from = ?current, to = ?next, "Permission refreshed");
            self.state.set(capability, next);
        }
    }

    /// Interpret the outcome of a platform request
    pub fn on_permission_result(
        &mut self,
        capability: Capability,
        outcome: RequestOutcome,
    ) -> &PermissionState {
        let status = match outcome {
            RequestOutcome::Granted => PermissionStatus::Granted,
            RequestOutcome::Denied => PermissionStatus::Denied,
            RequestOutcome::PermanentlyDenied => PermissionStatus::PermanentlyDenied,
        };
        info!(capability = %capability, status = ?status, "Permission result");
        self.state.set(capability, status);
        &self.state
    }

    /// Prompt for the next missing capability
    pub fn prompt(&self) -> Option<PermissionPrompt> {
        let capability = self.next_missing()?;
        let prompt = match self.state.get(capability) {
            PermissionStatus::PermanentlyDenied => PermissionPrompt::SettingsOrCancel { capability },
            status => PermissionPrompt::Request {
                capability,
                justification: self
                    .justifications
                    .for_capability(capability)
                    .map(str::to_string),
                retry: status == PermissionStatus::Denied,
            },
        };
        Some(prompt)
    }

    /// Error describing why the flow is held at the gate, if it is
    pub fn blocking_error(&self) -> Option<MediaError> {
        let capability = self.next_missing()?;
        match self.state.get(capability) {
            PermissionStatus::PermanentlyDenied => {
                Some(MediaError::PermissionPermanentlyDenied(capability))
            }
            PermissionStatus::Denied => Some(MediaError::PermissionDenied(capability)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> PermissionGate {
        PermissionGate::new(&Capability::ALL, Justifications::default())
    }

    #[test]
    fn test_next_missing_fixed_order_regardless_of_grant_order() {
        let orders = [
            [Capability::Storage, Capability::Microphone, Capability::Camera],
            [Capability::Microphone, Capability::Storage, Capability::Camera],
            [Capability::Camera, Capability::Storage, Capability::Microphone],
        ];

        for order in orders {
            let mut gate = gate();
            let mut remaining: Vec<Capability> = Capability::ALL.to_vec();
            for cap in order {
                // Before each grant the answer is the first remaining in priority order
                assert_eq!(gate.next_missing(), remaining.first().copied());
                gate.on_permission_result(cap, RequestOutcome::Granted);
                remaining.retain(|c| *c != cap);
            }
            assert_eq!(gate.next_missing(), None);
        }
    }

    #[test]
    fn test_required_order_does_not_matter() {
        let gate = PermissionGate::new(
            &[Capability::Storage, Capability::Camera],
            Justifications::default(),
        );
        assert_eq!(gate.next_missing(), Some(Capability::Camera));
        assert_eq!(gate.required(), &[Capability::Camera, Capability::Storage]);
    }

    #[test]
    fn test_unrequired_capability_is_skipped() {
        let mut gate = PermissionGate::new(&[Capability::Camera], Justifications::default());
        gate.on_permission_result(Capability::Camera, RequestOutcome::Granted);
        assert!(gate.all_granted());
    }

    #[test]
    fn test_prompt_carries_justification_and_retry() {
        let mut gate = PermissionGate::new(
            &Capability::ALL,
            Justifications::new("", "need audio", ""),
        );
        gate.refresh(Capability::Camera, true);

        assert_eq!(
            gate.prompt(),
            Some(PermissionPrompt::Request {
                capability: Capability::Microphone,
                justification: Some("need audio".to_string()),
                retry: false,
            })
        );

        gate.on_permission_result(Capability::Microphone, RequestOutcome::Denied);
        assert_eq!(
            gate.prompt(),
            Some(PermissionPrompt::Request {
                capability: Capability::Microphone,
                justification: Some("need audio".to_string()),
                retry: true,
            })
        );
        assert_eq!(
            gate.blocking_error(),
            Some(MediaError::PermissionDenied(Capability::Microphone))
        );
    }

    #[test]
    fn test_empty_justification_omits_panel() {
        let gate = gate();
        match gate.prompt() {
            Some(PermissionPrompt::Request { justification, .. }) => assert!(justification.is_none()),
            other => panic!("unexpected prompt: {:?}", other),
        }
    }

    #[test]
    fn test_permanent_denial_offers_settings() {
        let mut gate = gate();
        gate.on_permission_result(Capability::Camera, RequestOutcome::PermanentlyDenied);
        assert_eq!(
            gate.prompt(),
            Some(PermissionPrompt::SettingsOrCancel {
                capability: Capability::Camera
            })
        );

        // Still not granted after returning from settings: keep offering settings
        gate.refresh(Capability::Camera, false);
        assert_eq!(
            gate.state().get(Capability::Camera),
            PermissionStatus::PermanentlyDenied
        );

        gate.refresh(Capability::Camera, true);
        assert_eq!(gate.next_missing(), Some(Capability::Microphone));
    }

    #[test]
    fn test_revoked_grant_returns_to_unknown() {
        let mut gate = gate();
        gate.refresh(Capability::Camera, true);
        gate.refresh(Capability::Camera, false);
        assert_eq!(gate.state().get(Capability::Camera), PermissionStatus::Unknown);
    }

    #[test]
    fn test_capability_from_str() {
        assert_eq!("Camera".parse::<Capability>(), Ok(Capability::Camera));
        assert_eq!("audio".parse::<Capability>(), Ok(Capability::Microphone));
        assert!("gps".parse::<Capability>().is_err());
    }
}
