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

//! Classic Macintosh emulator launcher
//!
//! This library turns a declarative machine description into a running QEMU
//! instance with correctly attached storage, persistent PRAM boot state and
//! session network resources.
//!
//! # Example
//!
//! ```no_run
//! use macboot::core::launch::{LaunchRequest, LaunchSupervisor};
//! use macboot::core::Configuration;
//!
//! let config = Configuration::load("quadra.conf").unwrap();
//! let mut supervisor = LaunchSupervisor::new(config);
//! let exit_code = supervisor.run(&LaunchRequest::default()).unwrap();
//! std::process::exit(exit_code);
//! ```

pub mod core;
