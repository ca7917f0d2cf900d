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

/// Launcher error types
use thiserror::Error;

/// Result type for launcher operations
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Main error type for the launcher
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Address planning error: {0}")]
    Address(#[from] AddressError),

    #[error("PRAM error: {0}")]
    Pram(#[from] PramError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Media file not found for {role}: {path}")]
    MediaNotFound { role: String, path: String },

    #[error("Failed to spawn emulator '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Malformed line {line}: '{text}' (expected key = value)")]
    MalformedLine { line: usize, text: String },

    #[error("Missing required key '{key}' for machine {machine}")]
    MissingKey { key: &'static str, machine: String },

    #[error("Invalid value for '{key}': '{value}' (expected {expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Unsupported machine type: {0}")]
    UnknownMachine(String),

    #[error("aio={aio} bypasses host buffering and requires cache=none or cache=directsync (got cache={cache})")]
    AioRequiresDirectCache { aio: String, cache: String },
}

/// Address-planning error types
#[derive(Error, Debug)]
pub enum AddressError {
    #[error("{bus} bus has {capacity} usable ids but {requested} devices were requested")]
    BusFull {
        bus: &'static str,
        capacity: usize,
        requested: usize,
    },
}

/// PRAM (boot-state image) error types
#[derive(Error, Debug)]
pub enum PramError {
    #[error("PRAM image {path} is {got} bytes (expected {expected}); recreate it with macboot-pram --reset")]
    BadSize {
        path: String,
        expected: usize,
        got: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Network resource error types
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("'{command}' exited with {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("Could not set up bridge {bridge}: {detail}")]
    BridgeSetup { bridge: String, detail: String },

    #[error("Could not set up tap interface {tap}: {detail}")]
    TapSetup { tap: String, detail: String },

    #[error("Failed to start network helper '{helper}': {detail}")]
    HelperSpawn { helper: String, detail: String },

    #[error("Network helper '{helper}' produced no control socket at {socket} after {attempts} attempts")]
    HelperTimeout {
        helper: String,
        socket: String,
        attempts: u32,
    },
}
