// SPDX-License-Identifier: GPL-3.0-only

//! Permission collaborator
//!
//! The platform permission subsystem is consumed through [`PermissionBackend`].
//! [`StaticPermissions`] answers from a preset table and an optional script of
//! request outcomes; the CLI and the tests drive the flow with it.

use crate::permission::Capability;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Answer to a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Granted,
    /// Denied, the platform may ask again
    Denied,
    /// Denied, the platform will not show its request dialog again
    PermanentlyDenied,
}

/// Platform permission subsystem
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// Whether the capability is currently granted
    fn check_granted(&self, capability: Capability) -> bool;

    /// Ask the user for the capability
    async fn request(&self, capability: Capability) -> RequestOutcome;

    /// Send the user to the system settings page of this application
    async fn open_settings(&self) {}
}

#[derive(Debug, Default)]
struct StaticState {
    granted: HashSet<Capability>,
    scripted: HashMap<Capability, VecDeque<RequestOutcome>>,
    blocked: HashSet<Capability>,
    requests: Vec<Capability>,
    settings_opened: usize,
}

/// Preset permission table with scripted request outcomes
///
/// A request pops the next scripted outcome for the capability. With no
/// script left the request is granted, unless the capability was marked
/// blocked, in which case it is permanently denied.
#[derive(Debug, Default)]
pub struct StaticPermissions {
    state: Mutex<StaticState>,
}

impl StaticPermissions {
    /// Nothing granted up front
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything granted up front
    pub fn all_granted() -> Self {
        let permissions = Self::new();
        for cap in Capability::ALL {
            permissions.grant(cap);
        }
        permissions
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StaticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn grant(&self, capability: Capability) {
        self.lock().granted.insert(capability);
    }

    pub fn revoke(&self, capability: Capability) {
        self.lock().granted.remove(&capability);
    }

    /// Requests for this capability end in a permanent denial once the script runs out
    pub fn block(&self, capability: Capability) {
        self.lock().blocked.insert(capability);
    }

    /// Queue outcomes returned by successive requests
    pub fn script(&self, capability: Capability, outcomes: impl IntoIterator<Item = RequestOutcome>) {
        self.lock()
            .scripted
            .entry(capability)
            .or_default()
            .extend(outcomes);
    }

    /// Capabilities requested so far, in request order
    pub fn requests(&self) -> Vec<Capability> {
        self.lock().requests.clone()
    }

    pub fn settings_opened(&self) -> usize {
        self.lock().settings_opened
    }
}

#[async_trait]
impl PermissionBackend for StaticPermissions {
    fn check_granted(&self, capability: Capability) -> bool {
        self.lock().granted.contains(&capability)
    }

    async fn request(&self, capability: Capability) -> RequestOutcome {
        let mut state = self.lock();
        state.requests.push(capability);

        let outcome = match state.scripted.get_mut(&capability).and_then(VecDeque::pop_front) {
            Some(outcome) => outcome,
            None if state.blocked.contains(&capability) => RequestOutcome::PermanentlyDenied,
            None => RequestOutcome::Granted,
        };

        if outcome == RequestOutcome::Granted {
            state.granted.insert(capability);
        }
        debug!(capability = %capability, outcome = ?outcome, "Static permission request");
        outcome
    }

    async fn open_settings(&self) {
        info!("Opening application settings");
        self.lock().settings_opened += 1;
    }
}
