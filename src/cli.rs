// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the capture flow
//!
//! This module provides command-line functionality for:
//! - Running a capture flow against the virtual camera, scripted from stdin
//! - Printing the effective configuration
//!
//! Flow updates are printed to stderr as they happen; the final result is
//! printed to stdout as JSON.

use media_selector::backends::camera::VirtualCamera;
use media_selector::backends::permission::{RequestOutcome, StaticPermissions};
use media_selector::gesture::{TouchEvent, TouchPhase};
use media_selector::permission::PermissionPrompt;
use media_selector::storage::FileStorage;
use media_selector::{Capability, Collaborators, Config, FlowEvent, FlowHandle, FlowUpdate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Quiet period after which a command without a definite outcome is done
const SETTLE: Duration = Duration::from_millis(150);

/// Options of the `run` command
pub struct RunOptions {
    pub deny: Vec<Capability>,
    pub block: Vec<Capability>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Print the effective configuration and where it comes from
pub fn show_config(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.or_else(Config::default_path);
    let config = match &path {
        Some(path) if path.exists() => {
            println!("Config file: {}", path.display());
            Config::load_from(path)?
        }
        Some(path) => {
            println!("Config file: {} (not found, using defaults)", path.display());
            Config::default()
        }
        None => {
            println!("Config file: none (using defaults)");
            Config::default()
        }
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Run a capture flow with the virtual camera, reading commands from stdin
pub fn run_flow(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(output) = options.output {
        config.media_dir = Some(output);
    }

    let permissions = Arc::new(StaticPermissions::new());
    for capability in Capability::ALL {
        if options.block.contains(&capability) {
            permissions.block(capability);
        } else if options.deny.contains(&capability) {
            permissions.script(capability, [RequestOutcome::Denied]);
        } else {
            permissions.grant(capability);
        }
    }

    // Create async runtime for the flow
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let collaborators = Collaborators {
            camera: Arc::new(VirtualCamera::new()),
            permissions: permissions.clone(),
            storage: Arc::new(FileStorage::new()),
        };
        let mut handle = media_selector::launch(&config, collaborators)?;

        // Set up Ctrl+C handler
        let cancel = handle.sender();
        ctrlc::set_handler(move || {
            let _ = cancel.send(FlowEvent::Cancel);
        })?;

        eprintln!("Commands: photo | record <ms> | hold <ms> | pinch <from> <to> | flip | flash");
        eprintln!("          request | settings | grant <cap> | resume | confirm | discard | cancel");

        let mut finished = wait_until(&mut handle, awaits_user).await;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while !finished {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match execute(&mut handle, &permissions, &config, line).await {
                Ok(done) => finished = done,
                Err(message) => eprintln!("error: {}", message),
            }
        }

        if !finished {
            // End of input leaves the flow like a host navigating away
            handle.send(FlowEvent::Cancel);
        }
        let result = handle.result().await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Run one command; `Ok(true)` once the flow has finished
async fn execute(
    handle: &mut FlowHandle,
    permissions: &StaticPermissions,
    config: &Config,
    line: &str,
) -> Result<bool, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("photo", []) => {
            handle.send(FlowEvent::TakePhoto);
            Ok(wait_until(handle, capture_settled).await)
        }
        ("record", [ms]) => {
            let duration = parse_ms(ms)?;
            handle.send(FlowEvent::StartVideo);
            tokio::time::sleep(duration).await;
            handle.send(FlowEvent::StopVideo);
            Ok(wait_until(handle, capture_settled).await)
        }
        ("hold", [ms]) => {
            let duration = parse_ms(ms)?;
            handle.send(FlowEvent::Touch(TouchEvent::button(0, TouchPhase::Down)));
            tokio::time::sleep(duration).await;
            handle.send(FlowEvent::Touch(TouchEvent::button(0, TouchPhase::Up)));
            Ok(wait_until(handle, capture_settled).await)
        }
        ("pinch", [from, to]) => {
            let from = parse_distance(from)?;
            let to = parse_distance(to)?;
            for event in [
                TouchEvent::viewfinder(0, 0.0, 0.0, TouchPhase::Down),
                TouchEvent::viewfinder(1, from, 0.0, TouchPhase::Down),
                TouchEvent::viewfinder(1, to, 0.0, TouchPhase::Move),
                TouchEvent::viewfinder(1, to, 0.0, TouchPhase::Up),
                TouchEvent::viewfinder(0, 0.0, 0.0, TouchPhase::Up),
            ] {
                handle.send(FlowEvent::Touch(event));
            }
            Ok(settle(handle).await)
        }
        ("flip", []) => {
            handle.send(FlowEvent::SwitchLens);
            Ok(wait_until(handle, |u| {
                matches!(
                    u,
                    FlowUpdate::CameraReady { .. }
                        | FlowUpdate::CaptureError(_)
                        | FlowUpdate::Rejected(_)
                )
            })
            .await)
        }
        ("flash", []) => {
            handle.send(FlowEvent::ToggleFlash);
            Ok(wait_until(handle, |u| {
                matches!(
                    u,
                    FlowUpdate::FlashChanged(_) | FlowUpdate::CaptureError(_) | FlowUpdate::Rejected(_)
                )
            })
            .await)
        }
        ("request", []) => {
            handle.send(FlowEvent::RequestPermission);
            Ok(wait_until(handle, |u| awaits_user(u) || matches!(u, FlowUpdate::Rejected(_))).await)
        }
        ("settings", []) => {
            handle.send(FlowEvent::OpenSettings);
            Ok(settle(handle).await)
        }
        ("grant", [capability]) => {
            let capability: Capability = capability.parse()?;
            permissions.grant(capability);
            eprintln!("granted {} in system settings", capability);
            Ok(false)
        }
        ("resume", []) => {
            handle.send(FlowEvent::Resumed);
            Ok(settle(handle).await)
        }
        ("confirm", []) => {
            handle.send(FlowEvent::Confirm);
            Ok(wait_until(handle, |u| matches!(u, FlowUpdate::Rejected(_))).await)
        }
        ("discard", []) => {
            handle.send(FlowEvent::Discard);
            Ok(wait_until(handle, |u| awaits_user(u) || matches!(u, FlowUpdate::Rejected(_))).await)
        }
        ("cancel", []) => {
            handle.send(FlowEvent::Cancel);
            Ok(wait_until(handle, |_| false).await)
        }
        _ => Err(format!(
            "unknown command '{}' (long press is {} ms)",
            line, config.long_press_ms
        )),
    }
}

/// Print updates until `done` matches one; `true` if the flow finished first
async fn wait_until<F>(handle: &mut FlowHandle, mut done: F) -> bool
where
    F: FnMut(&FlowUpdate) -> bool,
{
    let mut finished = true;
    handle
        .wait_for(|update| {
            print_update(update);
            if matches!(update, FlowUpdate::Finished(_)) {
                return true;
            }
            if done(update) {
                finished = false;
                return true;
            }
            false
        })
        .await;
    finished
}

/// Print updates until the flow has been quiet for a moment
async fn settle(handle: &mut FlowHandle) -> bool {
    loop {
        match tokio::time::timeout(SETTLE, handle.next_update()).await {
            Ok(Some(update)) => {
                print_update(&update);
                if matches!(update, FlowUpdate::Finished(_)) {
                    return true;
                }
            }
            Ok(None) => return true,
            Err(_) => return false,
        }
    }
}

/// The flow is idle until the user does something
fn awaits_user(update: &FlowUpdate) -> bool {
    matches!(
        update,
        FlowUpdate::CameraReady { .. }
            | FlowUpdate::CaptureError(_)
            | FlowUpdate::Prompt(PermissionPrompt::Request { retry: true, .. })
            | FlowUpdate::Prompt(PermissionPrompt::SettingsOrCancel { .. })
    )
}

fn capture_settled(update: &FlowUpdate) -> bool {
    matches!(
        update,
        FlowUpdate::ReviewReady(_) | FlowUpdate::CaptureError(_) | FlowUpdate::Rejected(_)
    )
}

fn print_update(update: &FlowUpdate) {
    match update {
        FlowUpdate::StateChanged(state) => eprintln!("state: {}", state.name()),
        FlowUpdate::Prompt(PermissionPrompt::Request {
            capability,
            justification,
            retry,
        }) => {
            let action = if *retry { "denied, 'request' to ask again" } else { "requesting" };
            match justification {
                Some(text) => eprintln!("permission: {} {} ({})", capability, action, text),
                None => eprintln!("permission: {} {}", capability, action),
            }
        }
        FlowUpdate::Prompt(PermissionPrompt::SettingsOrCancel { capability }) => {
            eprintln!("permission: {} blocked, 'settings' or 'cancel'", capability)
        }
        FlowUpdate::PermissionBlocked(err) => eprintln!("permission: {}", err),
        FlowUpdate::CameraReady { lens, max_zoom } => {
            eprintln!("camera: {} lens ready (zoom up to {:.1}x)", lens, max_zoom)
        }
        FlowUpdate::ZoomChanged(ratio) => eprintln!("zoom: {:.2}x", ratio),
        FlowUpdate::FlashChanged(on) => eprintln!("flash: {}", if *on { "on" } else { "off" }),
        FlowUpdate::RecordingStarted => eprintln!("recording..."),
        // Progress arrives every tick; too noisy for a terminal
        FlowUpdate::RecordingProgress(_) => {}
        FlowUpdate::CaptureError(err) => eprintln!("capture error: {}", err),
        FlowUpdate::ReviewReady(reference) => {
            eprintln!("review: {} ('confirm' or 'discard')", reference)
        }
        FlowUpdate::MediaInfo { metadata, playable } => eprintln!(
            "media: {} bytes at {}{}",
            metadata.size,
            metadata.path.display(),
            if *playable { "" } else { " (empty)" }
        ),
        FlowUpdate::Deleted { reference, result } => match result {
            Ok(()) => eprintln!("deleted: {}", reference),
            Err(err) => eprintln!("delete failed: {}", err),
        },
        FlowUpdate::Rejected(err) => eprintln!("rejected: {}", err),
        FlowUpdate::Finished(_) => eprintln!("done"),
    }
}

fn parse_ms(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("invalid duration '{}' (milliseconds)", value))
}

fn parse_distance(value: &str) -> Result<f32, String> {
    value
        .parse::<f32>()
        .ok()
        .filter(|distance| distance.is_finite() && *distance >= 0.0)
        .ok_or_else(|| format!("invalid distance '{}'", value))
}
