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

//! Test fixtures for common launch scenarios

use std::fs;
use std::path::{Path, PathBuf};

use macboot::core::config::Configuration;

/// Create a dummy media file and return its path
#[allow(dead_code)]
pub fn write_media(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"media").expect("Failed to write media file");
    path
}

/// Configuration text for a Quadra 800 with all media files created in `dir`
#[allow(dead_code)]
pub fn q800_config_text(dir: &Path) -> String {
    let rom = write_media(dir, "Quadra800.rom");
    let os = write_media(dir, "macos8.img");
    let shared = write_media(dir, "shared.img");
    format!(
        "machine = q800\nram = 128M\nrom = {}\nos_disk = {}\nshared_disk = {}\npram = {}",
        rom.display(),
        os.display(),
        shared.display(),
        dir.join("pram.img").display()
    )
}

/// Configuration text for a Power Mac with all media files created in `dir`
#[allow(dead_code)]
pub fn mac99_config_text(dir: &Path) -> String {
    let os = write_media(dir, "macos9.img");
    let shared = write_media(dir, "shared.img");
    format!(
        "machine = mac99\nram = 256\nos_disk = {}\nshared_disk = {}",
        os.display(),
        shared.display()
    )
}

/// Parse configuration text, panicking on validation failure
#[allow(dead_code)]
pub fn parse(text: &str) -> Configuration {
    Configuration::parse(text).expect("Fixture configuration must validate")
}

/// Write an executable stub standing in for the emulator binary
///
/// The stub ignores its arguments and exits with the given code.
#[allow(dead_code)]
#[cfg(unix)]
pub fn stub_emulator(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("fake-qemu-{}", exit_code));
    fs::write(&path, format!("#!/bin/sh\nexit {}\n", exit_code))
        .expect("Failed to write stub emulator");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark stub emulator executable");
    path
}

/// Write a stand-in for the VDE switch helper
///
/// The script creates the control socket named by `-s` and then idles, the
/// way the real switch holds its socket open for the session's lifetime.
#[allow(dead_code)]
#[cfg(unix)]
pub fn stub_vde_helper(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-vde-switch");
    let script = "#!/bin/sh\n\
                  sock=\"\"\n\
                  while [ $# -gt 0 ]; do\n\
                    case \"$1\" in\n\
                      -s) sock=\"$2\"; shift 2 ;;\n\
                      *) shift ;;\n\
                    esac\n\
                  done\n\
                  touch \"$sock\"\n\
                  sleep 60\n";
    fs::write(&path, script).expect("Failed to write stub VDE helper");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark stub VDE helper executable");
    path
}
