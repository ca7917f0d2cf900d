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

//! Machine configuration loading and validation
//!
//! A machine is described by a flat key/value file, one assignment per line.
//! Values may be quoted; `#` starts a comment. Example:
//!
//! ```text
//! machine = q800
//! ram = 128M
//! rom = "Quadra800.rom"
//! os_disk = macos8.img
//! shared_disk = shared.img
//! cache = none
//! aio = native
//! net = tap
//! bridge = macbr0
//! ```
//!
//! Parsing and validation happen in one pass at load time, before any host
//! resource is touched. Every stringly-typed mode becomes a closed enum here;
//! the rest of the pipeline never re-validates them. Keys this version does
//! not recognize are preserved verbatim and stay available to callers.

use std::collections::BTreeMap;
use std::path::Path;

use super::error::ConfigError;

/// Supported target machines
///
/// This is a closed set: the machine tag selects the emulator binary, the
/// storage bus layout and the boot-preference mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    /// Motorola 68040 Quadra 800 (SCSI storage, PRAM boot preference)
    Q800,
    /// PowerPC Power Mac (IDE storage, OpenBIOS ordinal boot selector)
    Mac99,
}

impl Machine {
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        match tag {
            "q800" => Ok(Machine::Q800),
            "mac99" => Ok(Machine::Mac99),
            other => Err(ConfigError::UnknownMachine(other.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Machine::Q800 => "q800",
            Machine::Mac99 => "mac99",
        }
    }

    /// Default emulator binary for this machine
    pub fn emulator_binary(&self) -> &'static str {
        match self {
            Machine::Q800 => "qemu-system-m68k",
            Machine::Mac99 => "qemu-system-ppc",
        }
    }

    /// Built-in network interface model the guest OS has drivers for
    pub fn default_nic_model(&self) -> &'static str {
        match self {
            Machine::Q800 => "dp83932",
            Machine::Mac99 => "sungem",
        }
    }

    /// Whether boot preference lives in a persistent PRAM image
    ///
    /// The Quadra firmware reads its boot device from PRAM; OpenBIOS on the
    /// Power Mac takes an ordinal selector on the command line instead.
    pub fn uses_pram(&self) -> bool {
        matches!(self, Machine::Q800)
    }
}

/// Host cache behavior for a storage attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Writethrough,
    Writeback,
    None,
    Directsync,
    Unsafe,
}

impl CacheMode {
    fn from_value(value: &str) -> Result<Self, ConfigError> {
        match value {
            "writethrough" => Ok(CacheMode::Writethrough),
            "writeback" => Ok(CacheMode::Writeback),
            "none" => Ok(CacheMode::None),
            "directsync" => Ok(CacheMode::Directsync),
            "unsafe" => Ok(CacheMode::Unsafe),
            other => Err(ConfigError::InvalidValue {
                key: "cache",
                value: other.to_string(),
                expected: "writethrough|writeback|none|directsync|unsafe",
            }),
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            CacheMode::Writethrough => "writethrough",
            CacheMode::Writeback => "writeback",
            CacheMode::None => "none",
            CacheMode::Directsync => "directsync",
            CacheMode::Unsafe => "unsafe",
        }
    }

    /// True for the modes that open the backing file with O_DIRECT
    pub fn is_direct(&self) -> bool {
        matches!(self, CacheMode::None | CacheMode::Directsync)
    }
}

/// Asynchronous I/O backend for a storage attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AioMode {
    Threads,
    Native,
    IoUring,
}

impl AioMode {
    fn from_value(value: &str) -> Result<Self, ConfigError> {
        match value {
            "threads" => Ok(AioMode::Threads),
            "native" => Ok(AioMode::Native),
            "io_uring" => Ok(AioMode::IoUring),
            other => Err(ConfigError::InvalidValue {
                key: "aio",
                value: other.to_string(),
                expected: "threads|native|io_uring",
            }),
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            AioMode::Threads => "threads",
            AioMode::Native => "native",
            AioMode::IoUring => "io_uring",
        }
    }

    /// True for the backends that bypass the host page cache and therefore
    /// require a direct cache mode on the same drive
    pub fn bypasses_host_cache(&self) -> bool {
        matches!(self, AioMode::Native | AioMode::IoUring)
    }
}

/// Network backend for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetMode {
    /// QEMU user-mode (slirp) networking; no host resources
    User,
    /// Kernel tap interface attached to a shared bridge
    Tap,
    /// Userspace switch reached through a VDE control socket
    Vde,
}

impl NetMode {
    fn from_value(value: &str) -> Result<Self, ConfigError> {
        match value {
            "user" => Ok(NetMode::User),
            "tap" => Ok(NetMode::Tap),
            "vde" => Ok(NetMode::Vde),
            other => Err(ConfigError::InvalidValue {
                key: "net",
                value: other.to_string(),
                expected: "user|tap|vde",
            }),
        }
    }
}

/// Display frontend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    Sdl,
    Gtk,
    Cocoa,
    None,
}

impl DisplayKind {
    fn from_value(value: &str) -> Result<Self, ConfigError> {
        match value {
            "sdl" => Ok(DisplayKind::Sdl),
            "gtk" => Ok(DisplayKind::Gtk),
            "cocoa" => Ok(DisplayKind::Cocoa),
            "none" => Ok(DisplayKind::None),
            other => Err(ConfigError::InvalidValue {
                key: "display",
                value: other.to_string(),
                expected: "sdl|gtk|cocoa|none",
            }),
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            DisplayKind::Sdl => "sdl",
            DisplayKind::Gtk => "gtk",
            DisplayKind::Cocoa => "cocoa",
            DisplayKind::None => "none",
        }
    }
}

/// Host audio backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    Pa,
    Alsa,
    Coreaudio,
    None,
}

impl AudioBackend {
    fn from_value(value: &str) -> Result<Self, ConfigError> {
        match value {
            "pa" => Ok(AudioBackend::Pa),
            "alsa" => Ok(AudioBackend::Alsa),
            "coreaudio" => Ok(AudioBackend::Coreaudio),
            "none" => Ok(AudioBackend::None),
            other => Err(ConfigError::InvalidValue {
                key: "audio",
                value: other.to_string(),
                expected: "pa|alsa|coreaudio|none",
            }),
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            AudioBackend::Pa => "pa",
            AudioBackend::Alsa => "alsa",
            AudioBackend::Coreaudio => "coreaudio",
            AudioBackend::None => "none",
        }
    }
}

/// Default PRAM image path when the configuration does not name one
pub const DEFAULT_PRAM_PATH: &str = "pram.img";

/// Default VDE control socket path
pub const DEFAULT_VDE_SOCKET: &str = "/tmp/macboot-vde.ctl";

/// Default VDE helper binary
pub const DEFAULT_VDE_HELPER: &str = "vde_switch";

/// Validated machine configuration
///
/// Built once by [`Configuration::load`] or [`Configuration::parse`] and
/// never mutated afterwards; the launcher passes it around by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Target machine (selects emulator binary, bus layout, boot mechanism)
    pub machine: Machine,

    /// Guest memory size in MiB
    pub ram_mib: u32,

    /// Macintosh ROM image path (required for q800, unused on mac99)
    pub rom: Option<String>,

    /// Backing image for the operating-system disk
    pub os_disk: String,

    /// Backing image for the shared/transfer disk
    pub shared_disk: String,

    /// PRAM image path (q800 only)
    pub pram: String,

    /// Host cache mode for all storage attachments
    pub cache: CacheMode,

    /// Asynchronous I/O backend for all storage attachments
    pub aio: AioMode,

    /// Network backend
    pub net: NetMode,

    /// Bridge name (required when `net = tap`)
    pub bridge: Option<String>,

    /// Tap interface name hint; derived from the session when absent
    pub tap: Option<String>,

    /// Fixed guest MAC address
    pub mac: Option<String>,

    /// Network interface model presented to the guest
    pub net_model: String,

    /// VDE control socket path
    pub vde_socket: String,

    /// VDE helper binary
    pub vde_helper: String,

    /// Display frontend, only emitted when present
    pub display: Option<DisplayKind>,

    /// Audio backend, only emitted when present
    pub audio: Option<AudioBackend>,

    /// Override for the emulator binary path
    pub emulator: Option<String>,

    /// Verbatim arguments appended to the end of the invocation
    pub extra_args: Vec<String>,

    /// Keys this version does not recognize, preserved verbatim
    pub passthrough: BTreeMap<String, String>,
}

/// Keys with defined meaning in this version
const KNOWN_KEYS: &[&str] = &[
    "machine",
    "ram",
    "rom",
    "os_disk",
    "shared_disk",
    "pram",
    "cache",
    "aio",
    "net",
    "bridge",
    "tap",
    "mac",
    "net_model",
    "vde_socket",
    "vde_helper",
    "display",
    "audio",
    "emulator",
    "extra_args",
];

impl Configuration {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        Self::parse(&text)
    }

    /// Parse and validate configuration text
    ///
    /// Fails fast on the first malformed line, missing required key or
    /// out-of-set value. No side effects.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw = parse_assignments(text)?;

        let machine_tag = raw
            .get("machine")
            .ok_or_else(|| ConfigError::MissingKey {
                key: "machine",
                machine: "unspecified".to_string(),
            })?
            .as_str();
        let machine = Machine::from_tag(machine_tag)?;

        let require = |key: &'static str| -> Result<String, ConfigError> {
            raw.get(key).cloned().ok_or_else(|| ConfigError::MissingKey {
                key,
                machine: machine.tag().to_string(),
            })
        };

        let ram_mib = parse_size_mib(&require("ram")?)?;
        let os_disk = require("os_disk")?;
        let shared_disk = require("shared_disk")?;

        // The Quadra cannot start without its ROM image; OpenBIOS is built
        // into the PPC emulator.
        let rom = match machine {
            Machine::Q800 => Some(require("rom")?),
            Machine::Mac99 => {
                if raw.contains_key("rom") {
                    log::warn!("Ignoring rom: mac99 boots its builtin OpenBIOS");
                }
                None
            }
        };

        let cache = match raw.get("cache") {
            Some(v) => CacheMode::from_value(v)?,
            None => CacheMode::Writethrough,
        };
        let aio = match raw.get("aio") {
            Some(v) => AioMode::from_value(v)?,
            None => AioMode::Threads,
        };
        if aio.bypasses_host_cache() && !cache.is_direct() {
            return Err(ConfigError::AioRequiresDirectCache {
                aio: aio.as_arg().to_string(),
                cache: cache.as_arg().to_string(),
            });
        }

        let net = match raw.get("net") {
            Some(v) => NetMode::from_value(v)?,
            None => NetMode::User,
        };
        let bridge = raw.get("bridge").cloned();
        if net == NetMode::Tap && bridge.is_none() {
            return Err(ConfigError::MissingKey {
                key: "bridge",
                machine: machine.tag().to_string(),
            });
        }

        let mac = match raw.get("mac") {
            Some(v) => {
                validate_mac(v)?;
                Some(v.clone())
            }
            None => None,
        };

        let display = match raw.get("display") {
            Some(v) => Some(DisplayKind::from_value(v)?),
            None => None,
        };
        let audio = match raw.get("audio") {
            Some(v) => Some(AudioBackend::from_value(v)?),
            None => None,
        };

        let extra_args = raw
            .get("extra_args")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut passthrough = BTreeMap::new();
        for (key, value) in &raw {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                log::debug!("Passing through unrecognized key: {}", key);
                passthrough.insert(key.clone(), value.clone());
            }
        }

        Ok(Self {
            machine,
            ram_mib,
            rom,
            os_disk,
            shared_disk,
            pram: raw
                .get("pram")
                .cloned()
                .unwrap_or_else(|| DEFAULT_PRAM_PATH.to_string()),
            cache,
            aio,
            net,
            bridge,
            tap: raw.get("tap").cloned(),
            mac,
            net_model: raw
                .get("net_model")
                .cloned()
                .unwrap_or_else(|| machine.default_nic_model().to_string()),
            vde_socket: raw
                .get("vde_socket")
                .cloned()
                .unwrap_or_else(|| DEFAULT_VDE_SOCKET.to_string()),
            vde_helper: raw
                .get("vde_helper")
                .cloned()
                .unwrap_or_else(|| DEFAULT_VDE_HELPER.to_string()),
            display,
            audio,
            emulator: raw.get("emulator").cloned(),
            extra_args,
            passthrough,
        })
    }

    /// Emulator binary to invoke (configured override or machine default)
    pub fn emulator_program(&self) -> &str {
        self.emulator
            .as_deref()
            .unwrap_or_else(|| self.machine.emulator_binary())
    }
}

/// Collect `key = value` assignments, preserving the last occurrence of a key
fn parse_assignments(text: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut map = BTreeMap::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedLine {
                line: index + 1,
                text: line.to_string(),
            });
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::MalformedLine {
                line: index + 1,
                text: line.to_string(),
            });
        }

        map.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(map)
}

/// Strip one matching pair of surrounding quotes, if any
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Parse a memory size into MiB
///
/// Accepts a bare integer (MiB), or an integer with an `M` or `G` suffix.
fn parse_size_mib(value: &str) -> Result<u32, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "ram",
        value: value.to_string(),
        expected: "integer MiB, or <n>M / <n>G",
    };

    let (digits, multiplier) = match value.as_bytes().last() {
        Some(b'M') | Some(b'm') => (&value[..value.len() - 1], 1u32),
        Some(b'G') | Some(b'g') => (&value[..value.len() - 1], 1024u32),
        _ => (value, 1u32),
    };

    let amount: u32 = digits.parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

/// Validate a colon-separated 6-octet MAC address
fn validate_mac(value: &str) -> Result<(), ConfigError> {
    let octets: Vec<&str> = value.split(':').collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return Err(ConfigError::InvalidValue {
            key: "mac",
            value: value.to_string(),
            expected: "aa:bb:cc:dd:ee:ff",
        });
    }
    Ok(())
}
