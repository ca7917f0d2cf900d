// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session network resources
//!
//! Three backends:
//!
//! - `user`: QEMU's builtin slirp stack; nothing to provision on the host.
//! - `tap`: a kernel tap interface owned by this session, attached to a
//!   bridge that is shared between concurrently running sessions. The bridge
//!   is created on first use and only ever ensured-active afterwards; two
//!   sessions racing to create it must both succeed. The tap is created
//!   scoped to the invoking user's uid so the unprivileged emulator child
//!   can open it, brought up, then attached to the bridge.
//! - `vde`: a long-lived userspace switch helper. Setup spawns it and polls
//!   for its control socket before declaring success.
//!
//! Setup hands back a [`NetworkGuard`] whose release runs on drop and, once
//! registered, on SIGINT/SIGTERM, so a killed session does not leak its
//! interface. Teardown never fails: each step checks for existence first and
//! swallows errors, because the resource may already be partially gone. The
//! shared bridge is never deleted; another session may still be using it.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::config::{Configuration, NetMode};
use super::error::NetworkError;

/// Linux interface name limit (IFNAMSIZ minus the trailing NUL)
const IFNAME_MAX: usize = 15;

/// Bounded wait for the VDE helper's control socket
const HELPER_POLL_ATTEMPTS: u32 = 5;
const HELPER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Network parameters extracted from a validated configuration
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub mode: NetMode,
    pub bridge: Option<String>,
    pub tap_hint: Option<String>,
    pub mac: Option<String>,
    pub vde_socket: PathBuf,
    pub vde_helper: String,
}

impl NetworkSettings {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            mode: config.net,
            bridge: config.bridge.clone(),
            tap_hint: config.tap.clone(),
            mac: config.mac.clone(),
            vde_socket: PathBuf::from(&config.vde_socket),
            vde_helper: config.vde_helper.clone(),
        }
    }
}

/// Descriptive handle for the session's provisioned network endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResource {
    pub mode: NetMode,
    /// Shared bridge the session interface is attached to (tap mode)
    pub bridge: Option<String>,
    /// Session-owned interface name (tap mode)
    pub interface: Option<String>,
    /// Fixed guest MAC address, if configured
    pub mac: Option<String>,
    /// Control socket of the userspace switch (vde mode)
    pub vde_socket: Option<PathBuf>,
}

impl NetworkResource {
    fn user(mac: Option<String>) -> Self {
        Self {
            mode: NetMode::User,
            bridge: None,
            interface: None,
            mac,
            vde_socket: None,
        }
    }
}

/// Mutable teardown state shared between the guard, the drop path and the
/// signal handler
#[derive(Debug, Default)]
struct TeardownState {
    resource: Option<NetworkResource>,
    helper: Option<Child>,
}

/// Owns the session's network resources until released
///
/// Dropping the guard tears the resources down; `teardown` may also be
/// called explicitly. Both paths are idempotent.
#[derive(Debug)]
pub struct NetworkGuard {
    state: Arc<Mutex<TeardownState>>,
}

impl NetworkGuard {
    /// Run teardown when the process receives SIGINT or SIGTERM
    ///
    /// May be registered at most once per process.
    pub fn register_signal_teardown(&self) -> Result<(), NetworkError> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || {
            log::warn!("Interrupted, releasing network resources");
            if let Ok(mut state) = state.lock() {
                teardown_state(&mut state);
            }
            // 128 + SIGINT
            std::process::exit(130);
        })
        .map_err(|e| NetworkError::CommandFailed {
            command: "signal handler registration".to_string(),
            detail: e.to_string(),
        })
    }

    /// Release the session's network resources; never fails
    pub fn teardown(&self) {
        if let Ok(mut state) = self.state.lock() {
            teardown_state(&mut state);
        }
    }
}

impl Drop for NetworkGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Provision the session's network endpoint
///
/// Returns the descriptive resource handle together with its guard. Any
/// failure after partial setup rolls the completed steps back inline before
/// propagating.
pub fn setup(settings: &NetworkSettings) -> Result<(NetworkResource, NetworkGuard), NetworkError> {
    let (resource, helper) = match settings.mode {
        NetMode::User => {
            log::debug!("Network: user-mode stack, nothing to provision");
            (NetworkResource::user(settings.mac.clone()), None)
        }
        NetMode::Tap => (setup_tap(settings)?, None),
        NetMode::Vde => {
            let (resource, child) = setup_vde(settings)?;
            (resource, Some(child))
        }
    };

    let guard = NetworkGuard {
        state: Arc::new(Mutex::new(TeardownState {
            resource: Some(resource.clone()),
            helper,
        })),
    };
    Ok((resource, guard))
}

/// Describe the resource `setup` would provision, without touching the host
///
/// Used for dry runs: the returned handle carries the names a real setup
/// would use, so the composed command line matches the real one.
pub fn preview(settings: &NetworkSettings) -> NetworkResource {
    match settings.mode {
        NetMode::User => NetworkResource::user(settings.mac.clone()),
        NetMode::Tap => NetworkResource {
            mode: NetMode::Tap,
            bridge: settings.bridge.clone(),
            interface: Some(session_interface_name(settings.tap_hint.as_deref())),
            mac: settings.mac.clone(),
            vde_socket: None,
        },
        NetMode::Vde => NetworkResource {
            mode: NetMode::Vde,
            bridge: None,
            interface: None,
            mac: settings.mac.clone(),
            vde_socket: Some(settings.vde_socket.clone()),
        },
    }
}

/// Derive the session's interface name, truncated to the host limit
pub fn session_interface_name(hint: Option<&str>) -> String {
    let mut name = match hint {
        Some(hint) => hint.to_string(),
        None => format!("mbtap{}", std::process::id()),
    };
    name.truncate(IFNAME_MAX);
    name
}

fn setup_tap(settings: &NetworkSettings) -> Result<NetworkResource, NetworkError> {
    // Validated at the configuration boundary; tap mode always has a bridge.
    let bridge = settings.bridge.clone().ok_or_else(|| NetworkError::BridgeSetup {
        bridge: String::new(),
        detail: "no bridge name configured".to_string(),
    })?;

    ensure_bridge(&bridge)?;
    log::debug!("Network: bridge {} ready", bridge);

    let tap = session_interface_name(settings.tap_hint.as_deref());
    let uid = unsafe { libc::geteuid() }.to_string();

    ip(&["tuntap", "add", "dev", &tap, "mode", "tap", "user", &uid]).map_err(|e| {
        NetworkError::TapSetup {
            tap: tap.clone(),
            detail: e.to_string(),
        }
    })?;

    // From here on a failure must undo the steps already completed.
    if let Err(e) = ip(&["link", "set", &tap, "up"])
        .and_then(|_| ip(&["link", "set", &tap, "master", &bridge]))
    {
        log::warn!("Tap setup failed after creation, rolling back {}", tap);
        remove_interface(&tap);
        return Err(NetworkError::TapSetup {
            tap,
            detail: e.to_string(),
        });
    }

    log::info!("Network: {} attached to bridge {}", tap, bridge);
    Ok(NetworkResource {
        mode: NetMode::Tap,
        bridge: Some(bridge),
        interface: Some(tap),
        mac: settings.mac.clone(),
        vde_socket: None,
    })
}

/// Create and activate the shared bridge, tolerating concurrent creation
fn ensure_bridge(bridge: &str) -> Result<(), NetworkError> {
    if !link_exists(bridge) {
        match ip(&["link", "add", bridge, "type", "bridge"]) {
            Ok(()) => log::info!("Network: created bridge {}", bridge),
            // Another session may have created it between the check and the
            // add; that is fine as long as it exists now.
            Err(e) => {
                if link_exists(bridge) {
                    log::debug!("Network: bridge {} created concurrently", bridge);
                } else {
                    return Err(NetworkError::BridgeSetup {
                        bridge: bridge.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }
    }

    // Pre-existing bridges still get activated; sessions only ever add to
    // the bridge, never reconfigure it.
    ip(&["link", "set", bridge, "up"]).map_err(|e| NetworkError::BridgeSetup {
        bridge: bridge.to_string(),
        detail: e.to_string(),
    })
}

fn setup_vde(settings: &NetworkSettings) -> Result<(NetworkResource, Child), NetworkError> {
    let socket = settings.vde_socket.clone();
    let helper = settings.vde_helper.clone();

    let mut child = Command::new(&helper)
        .arg("-s")
        .arg(&socket)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| NetworkError::HelperSpawn {
            helper: helper.clone(),
            detail: e.to_string(),
        })?;

    // The switch is ready once its control socket shows up. Bounded wait:
    // the helper may be broken and never create it.
    for attempt in 1..=HELPER_POLL_ATTEMPTS {
        if socket.exists() {
            log::info!(
                "Network: VDE switch ready at {} (attempt {})",
                socket.display(),
                attempt
            );
            return Ok((
                NetworkResource {
                    mode: NetMode::Vde,
                    bridge: None,
                    interface: None,
                    mac: settings.mac.clone(),
                    vde_socket: Some(socket),
                },
                child,
            ));
        }

        if let Ok(Some(status)) = child.try_wait() {
            return Err(NetworkError::HelperSpawn {
                helper,
                detail: format!("exited during startup with {}", status),
            });
        }

        if attempt < HELPER_POLL_ATTEMPTS {
            thread::sleep(HELPER_POLL_INTERVAL);
        }
    }

    // Roll back the half-started helper before propagating.
    let _ = child.kill();
    let _ = child.wait();
    Err(NetworkError::HelperTimeout {
        helper,
        socket: socket.display().to_string(),
        attempts: HELPER_POLL_ATTEMPTS,
    })
}

/// Unconditional cleanup; each step is existence-checked and best-effort
fn teardown_state(state: &mut TeardownState) {
    let Some(resource) = state.resource.take() else {
        return;
    };

    match resource.mode {
        NetMode::User => {}
        NetMode::Tap => {
            if let Some(tap) = resource.interface.as_deref() {
                if link_exists(tap) {
                    remove_interface(tap);
                } else {
                    log::debug!("Network: {} already gone", tap);
                }
            }
            // The bridge stays: it is shared with other sessions.
        }
        NetMode::Vde => {
            if let Some(mut helper) = state.helper.take() {
                if helper.kill().is_err() {
                    log::debug!("Network: VDE helper already exited");
                }
                let _ = helper.wait();
            }
            if let Some(socket) = resource.vde_socket.as_deref() {
                if socket.exists() {
                    let removed = if socket.is_dir() {
                        std::fs::remove_dir_all(socket)
                    } else {
                        std::fs::remove_file(socket)
                    };
                    if let Err(e) = removed {
                        log::warn!(
                            "Network: could not remove VDE socket {}: {}",
                            socket.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    log::debug!("Network: resources released");
}

/// Detach, bring down and delete a session interface, logging failures
fn remove_interface(name: &str) {
    for args in [
        &["link", "set", name, "nomaster"][..],
        &["link", "set", name, "down"][..],
        &["link", "del", name][..],
    ] {
        if let Err(e) = ip(args) {
            log::warn!("Network: cleanup step failed: {}", e);
        }
    }
}

fn link_exists(name: &str) -> bool {
    Command::new("ip")
        .args(["link", "show", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run an `ip` subcommand, capturing stderr for diagnostics
fn ip(args: &[&str]) -> Result<(), NetworkError> {
    let output = Command::new("ip").args(args).output().map_err(|e| {
        NetworkError::CommandFailed {
            command: format!("ip {}", args.join(" ")),
            detail: e.to_string(),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NetworkError::CommandFailed {
            command: format!("ip {}", args.join(" ")),
            detail: format!("{} ({})", output.status, stderr.trim()),
        });
    }
    Ok(())
}
