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

//! Launch supervision
//!
//! One launch is one sequential pipeline:
//!
//! ```text
//! Idle -> Validated -> ResourcesReady -> CommandBuilt -> Running
//!                                                          |
//!                                              Completed / Failed
//! ```
//!
//! Validation runs before anything on the host is touched; storage and boot
//! state come next, then network resources (with teardown registered on all
//! exit paths), then the argument list, then the emulator itself as a
//! foreground child. The child's exit code is the supervisor's result.
//! Teardown runs after the child exits or after any earlier failure, in
//! reverse order of acquisition.

use std::path::Path;
use std::process::{Command, Stdio};

use serde::Serialize;

use super::address::{self, AddressPlan, LogicalRole};
use super::command::{BootSelection, Invocation, MediaPaths};
use super::config::{Configuration, Machine};
use super::error::{LauncherError, Result};
use super::net::{self, NetworkSettings};
use super::pram::Pram;

/// Supervisor exit code for failures before the emulator was spawned
///
/// Distinct from anything the emulator itself reports on a clean run.
pub const EXIT_LAUNCH_FAILURE: i32 = 2;

/// Launch pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    Validated,
    ResourcesReady,
    CommandBuilt,
    Running,
    Completed,
    Failed,
}

/// Per-launch request parameters
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest {
    /// Media supplied on the command line (installer, extra disk)
    pub media: MediaPaths,
    /// Give the installer medium top boot priority
    pub boot_from_installer: bool,
}

/// Everything a launch would do, computed without host side effects
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub machine: Machine,
    pub addresses: AddressPlan,
    pub boot: BootSelection,
    /// Bus id the firmware will boot from
    pub boot_target: u8,
    pub invocation: Invocation,
}

/// Compute the full launch plan for a request
///
/// Pure: storage addresses, boot selection and the argument list, with the
/// network resource described rather than provisioned. This is what
/// `--dry-run` and `--print-plan` show, and the real launch builds the same
/// invocation from the provisioned resource.
pub fn plan_launch(config: &Configuration, request: &LaunchRequest) -> Result<LaunchPlan> {
    let has_installer = request.media.installer.is_some();
    let has_extra = request.media.extra_disk.is_some();

    let addresses = address::plan(
        config.machine,
        has_installer,
        has_extra,
        request.boot_from_installer,
    )?;

    let boot_role = address::boot_role(has_installer, request.boot_from_installer);
    let boot_target = addresses[&boot_role].id;
    let boot = boot_selection(config, boot_role);

    let net_resource = net::preview(&NetworkSettings::from_config(config));
    let invocation = Invocation::build(config, &addresses, &boot, &net_resource, &request.media);

    Ok(LaunchPlan {
        machine: config.machine,
        addresses,
        boot,
        boot_target,
        invocation,
    })
}

fn boot_selection(config: &Configuration, boot_role: LogicalRole) -> BootSelection {
    if config.machine.uses_pram() {
        BootSelection::Pram {
            image: config.pram.clone(),
        }
    } else {
        BootSelection::Ordinal {
            device: match boot_role {
                LogicalRole::InstallerMedium => 'd',
                _ => 'c',
            },
        }
    }
}

/// Sequences one launch from validation through child exit
pub struct LaunchSupervisor {
    config: Configuration,
    state: LaunchState,
}

impl LaunchSupervisor {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            state: LaunchState::Idle,
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Run the launch pipeline and return the emulator's exit code
    pub fn run(&mut self, request: &LaunchRequest) -> Result<i32> {
        match self.run_pipeline(request) {
            Ok(code) => {
                self.transition(LaunchState::Completed);
                Ok(code)
            }
            Err(e) => {
                self.transition(LaunchState::Failed);
                Err(e)
            }
        }
    }

    fn run_pipeline(&mut self, request: &LaunchRequest) -> Result<i32> {
        self.validate(request)?;
        self.transition(LaunchState::Validated);

        let has_installer = request.media.installer.is_some();
        let has_extra = request.media.extra_disk.is_some();
        let addresses = address::plan(
            self.config.machine,
            has_installer,
            has_extra,
            request.boot_from_installer,
        )?;

        let boot_role = address::boot_role(has_installer, request.boot_from_installer);
        let boot = self.prepare_boot_state(&addresses, boot_role)?;

        let (net_resource, net_guard) =
            net::setup(&NetworkSettings::from_config(&self.config))?;
        // Interrupt signals must release the tap/helper too; failing to
        // install the handler is logged, not fatal.
        if let Err(e) = net_guard.register_signal_teardown() {
            log::warn!("Could not register signal cleanup: {}", e);
        }
        self.transition(LaunchState::ResourcesReady);

        let invocation =
            Invocation::build(&self.config, &addresses, &boot, &net_resource, &request.media);
        self.transition(LaunchState::CommandBuilt);
        log::info!("Launching: {}", invocation.command_line());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| LauncherError::SpawnFailed {
                program: invocation.program.clone(),
                reason: e.to_string(),
            })?;
        self.transition(LaunchState::Running);

        let status = child.wait()?;

        // The emulator's exit status is its own business; it is forwarded,
        // not interpreted.
        let code = match status.code() {
            Some(code) => {
                if code == 0 {
                    log::info!("Emulator exited cleanly");
                } else {
                    log::warn!("Emulator exited with code {}", code);
                }
                code
            }
            None => {
                log::warn!("Emulator terminated by signal");
                1
            }
        };

        drop(net_guard);
        Ok(code)
    }

    /// Check every referenced file before any resource is created
    fn validate(&self, request: &LaunchRequest) -> Result<()> {
        let mut required: Vec<(&str, &str)> = vec![
            (LogicalRole::OsDisk.describe(), self.config.os_disk.as_str()),
            (
                LogicalRole::SharedDisk.describe(),
                self.config.shared_disk.as_str(),
            ),
        ];
        if self.config.machine == Machine::Q800 {
            if let Some(rom) = &self.config.rom {
                required.push(("ROM image", rom.as_str()));
            }
        }
        if let Some(installer) = &request.media.installer {
            required.push((LogicalRole::InstallerMedium.describe(), installer.as_str()));
        }
        if let Some(extra) = &request.media.extra_disk {
            required.push((LogicalRole::ExtraDisk.describe(), extra.as_str()));
        }

        for (role, path) in required {
            if !Path::new(path).exists() {
                return Err(LauncherError::MediaNotFound {
                    role: role.to_string(),
                    path: path.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Persist the boot preference and return the boot selection
    fn prepare_boot_state(
        &self,
        addresses: &AddressPlan,
        boot_role: LogicalRole,
    ) -> Result<BootSelection> {
        let boot_target = addresses[&boot_role].id;

        if self.config.machine.uses_pram() {
            let mut pram = Pram::ensure(&self.config.pram)?;
            pram.write_boot_target(boot_target)?;
            log::info!(
                "Boot device: {} ({} id {})",
                boot_role.describe(),
                addresses[&boot_role].bus.name(),
                boot_target
            );
        }

        Ok(boot_selection(&self.config, boot_role))
    }

    fn transition(&mut self, next: LaunchState) {
        log::debug!("Launch state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
