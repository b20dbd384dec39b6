// SPDX-License-Identifier: MPL-2.0

//! Media Selector - capture, review and hand back one photo or video
//!
//! This library sequences a capture flow: acquire the camera, microphone and
//! storage permissions, run a viewfinder with pinch zoom and tap / hold
//! capture, review the result, and return exactly one result to the caller.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`flow`]: Top-level coordinator, its events and updates
//! - [`permission`]: Sequential permission acquisition
//! - [`capture`]: Camera binding and capture state machine
//! - [`gesture`]: Touch gestures to zoom and capture signals
//! - [`review`]: Confirm or discard a capture
//! - [`backends`]: Camera and permission collaborators
//! - [`storage`]: Storage collaborator
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let handle = media_selector::flow::launch(&config, collaborators)?;
//! handle.send(FlowEvent::TakePhoto);
//! let result = handle.result().await;
//! ```

pub mod backends;
pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flow;
pub mod gesture;
pub mod media;
pub mod permission;
pub mod review;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use errors::{MediaError, MediaResult};
pub use flow::{Collaborators, FlowEvent, FlowHandle, FlowResult, FlowState, FlowUpdate, launch};
pub use media::{MediaKind, MediaReference};
pub use permission::Capability;
