// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator backends consumed by the capture flow

pub mod camera;
pub mod permission;
