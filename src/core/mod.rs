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

//! Core launcher components
//!
//! This module contains all launch orchestration components:
//! - Configuration (machine description parsing and validation)
//! - Address planning (logical disk roles onto SCSI/IDE bus ids)
//! - PRAM (persistent boot-device preference)
//! - Network (tap/bridge and VDE session resources)
//! - Command (emulator argument list assembly)
//! - Launch (pipeline supervision and child process handling)

pub mod address;
pub mod command;
pub mod config;
pub mod error;
pub mod launch;
pub mod net;
pub mod pram;

// Re-export commonly used types
pub use address::{AddressPlan, BusKind, DeviceAddress, LogicalRole, MediaKind};
pub use command::{BootSelection, Invocation, MediaPaths};
pub use config::{Configuration, Machine};
pub use error::{LauncherError, Result};
pub use launch::{LaunchRequest, LaunchSupervisor};
pub use net::{NetworkGuard, NetworkResource};
pub use pram::Pram;
