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

//! Storage address planning
//!
//! Each machine exposes one storage bus and a fixed priority table mapping
//! logical disk roles to bus ids. Id 0 is the highest-priority slot on both
//! buses, so the OS disk lands there and the machine boots it by default.
//!
//! Default tables:
//!
//! ```text
//! q800 (SCSI, ids 0..=6):   os=0  shared=1  installer=3 (CD)
//! mac99 (IDE, ids 0..=3):   os=0  shared=1  installer=2 (CD)
//! ```
//!
//! Installing an OS inverts the priorities: with `boot_from_installer` set
//! and an installer medium attached, the installer takes the OS disk's id
//! and the OS disk moves to the installer's default id. The OS disk stays on
//! the bus so the installer can partition and write it. An extra disk, when
//! attached, takes the lowest id not claimed by the core roles.
//!
//! Planning is a pure computation; nothing on the host is touched.

use std::collections::BTreeMap;

use serde::Serialize;

use super::config::Machine;
use super::error::AddressError;

/// Architecture-independent disk roles
///
/// Declaration order is also the deterministic emission order for storage
/// argument groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalRole {
    OsDisk,
    SharedDisk,
    InstallerMedium,
    ExtraDisk,
}

impl LogicalRole {
    /// Short tag used as the drive id in emulator arguments
    pub fn drive_tag(&self) -> &'static str {
        match self {
            LogicalRole::OsDisk => "os",
            LogicalRole::SharedDisk => "shared",
            LogicalRole::InstallerMedium => "install",
            LogicalRole::ExtraDisk => "extra",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            LogicalRole::OsDisk => "OS disk",
            LogicalRole::SharedDisk => "shared disk",
            LogicalRole::InstallerMedium => "installer medium",
            LogicalRole::ExtraDisk => "extra disk",
        }
    }
}

/// Storage bus exposed by the emulated machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Scsi,
    Ide,
}

impl BusKind {
    pub fn name(&self) -> &'static str {
        match self {
            BusKind::Scsi => "SCSI",
            BusKind::Ide => "IDE",
        }
    }

    /// Number of usable device ids
    ///
    /// SCSI id 7 belongs to the host adapter and is never assigned.
    pub fn capacity(&self) -> usize {
        match self {
            BusKind::Scsi => 7,
            BusKind::Ide => 4,
        }
    }
}

/// Media kind of a storage attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Disk,
    Cdrom,
}

impl MediaKind {
    pub fn as_arg(&self) -> &'static str {
        match self {
            MediaKind::Disk => "disk",
            MediaKind::Cdrom => "cdrom",
        }
    }
}

/// Bus address assigned to one logical role for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceAddress {
    pub bus: BusKind,
    pub id: u8,
    pub media: MediaKind,
    pub drive_tag: &'static str,
}

/// Address plan for one launch
pub type AddressPlan = BTreeMap<LogicalRole, DeviceAddress>;

impl Machine {
    /// Storage bus this machine exposes
    pub fn bus(&self) -> BusKind {
        match self {
            Machine::Q800 => BusKind::Scsi,
            Machine::Mac99 => BusKind::Ide,
        }
    }
}

/// Default priority table: (os, shared, installer) bus ids
///
/// The extra disk has no fixed slot; plan() assigns it the lowest free id.
fn default_ids(machine: Machine) -> (u8, u8, u8) {
    match machine {
        Machine::Q800 => (0, 1, 3),
        Machine::Mac99 => (0, 1, 2),
    }
}

/// The role the firmware should boot from
pub fn boot_role(has_installer: bool, boot_from_installer: bool) -> LogicalRole {
    if boot_from_installer && has_installer {
        LogicalRole::InstallerMedium
    } else {
        LogicalRole::OsDisk
    }
}

/// Compute the address plan for one launch
///
/// Returns one [`DeviceAddress`] per attached role. Ids are unique on the
/// bus; running out of ids is an error, a role is never silently dropped.
pub fn plan(
    machine: Machine,
    has_installer: bool,
    has_extra_disk: bool,
    boot_from_installer: bool,
) -> Result<AddressPlan, AddressError> {
    let bus = machine.bus();

    let mut requested = 2usize;
    if has_installer {
        requested += 1;
    }
    if has_extra_disk {
        requested += 1;
    }
    if requested > bus.capacity() {
        return Err(AddressError::BusFull {
            bus: bus.name(),
            capacity: bus.capacity(),
            requested,
        });
    }

    let (mut os_id, shared_id, mut installer_id) = default_ids(machine);
    if boot_from_installer && has_installer {
        std::mem::swap(&mut os_id, &mut installer_id);
    }

    let mut assigned = AddressPlan::new();
    assigned.insert(
        LogicalRole::OsDisk,
        DeviceAddress {
            bus,
            id: os_id,
            media: MediaKind::Disk,
            drive_tag: LogicalRole::OsDisk.drive_tag(),
        },
    );
    assigned.insert(
        LogicalRole::SharedDisk,
        DeviceAddress {
            bus,
            id: shared_id,
            media: MediaKind::Disk,
            drive_tag: LogicalRole::SharedDisk.drive_tag(),
        },
    );
    if has_installer {
        assigned.insert(
            LogicalRole::InstallerMedium,
            DeviceAddress {
                bus,
                id: installer_id,
                media: MediaKind::Cdrom,
                drive_tag: LogicalRole::InstallerMedium.drive_tag(),
            },
        );
    }

    if has_extra_disk {
        let used: Vec<u8> = assigned.values().map(|a| a.id).collect();
        let free = (0..bus.capacity() as u8).find(|id| !used.contains(id));
        let Some(id) = free else {
            return Err(AddressError::BusFull {
                bus: bus.name(),
                capacity: bus.capacity(),
                requested,
            });
        };
        assigned.insert(
            LogicalRole::ExtraDisk,
            DeviceAddress {
                bus,
                id,
                media: MediaKind::Disk,
                drive_tag: LogicalRole::ExtraDisk.drive_tag(),
            },
        );
    }

    debug_assert!(unique_ids(&assigned));
    Ok(assigned)
}

fn unique_ids(plan: &AddressPlan) -> bool {
    let mut ids: Vec<u8> = plan.values().map(|a| a.id).collect();
    ids.sort_unstable();
    ids.windows(2).all(|w| w[0] != w[1])
}
