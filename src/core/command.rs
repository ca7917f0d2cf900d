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

//! Emulator invocation assembly
//!
//! Turns the validated configuration, the address plan, the boot selection
//! and the provisioned network resource into the ordered argument list for
//! `qemu-system-*`. Building is a pure computation: the same logical inputs
//! always produce the same argument list, in a fixed group order:
//!
//! ```text
//! machine, memory, ROM, PRAM drive, storage groups (role order),
//! ordinal boot selector, network, display, audio, pass-through tail
//! ```
//!
//! A group is emitted exactly when its inclusion condition holds; groups are
//! never reordered or dropped after that.

use serde::Serialize;

use super::address::{AddressPlan, DeviceAddress, LogicalRole, MediaKind};
use super::config::{Configuration, Machine, NetMode};
use super::net::NetworkResource;

/// Boot preference handed to the emulator
///
/// The Quadra reads its boot device from the PRAM image, which rides along
/// as an mtd drive; OpenBIOS takes an ordinal selector flag instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootSelection {
    Pram { image: String },
    Ordinal { device: char },
}

/// Per-launch media supplied on the command line rather than in the
/// configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPaths {
    pub installer: Option<String>,
    pub extra_disk: Option<String>,
}

/// A fully composed emulator invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Compose the emulator argument list
    pub fn build(
        config: &Configuration,
        plan: &AddressPlan,
        boot: &BootSelection,
        net: &NetworkResource,
        media: &MediaPaths,
    ) -> Self {
        let mut args: Vec<String> = Vec::new();

        args.push("-M".to_string());
        args.push(config.machine.tag().to_string());

        args.push("-m".to_string());
        args.push(config.ram_mib.to_string());

        if let Some(rom) = &config.rom {
            args.push("-bios".to_string());
            args.push(rom.clone());
        }

        if let BootSelection::Pram { image } = boot {
            args.push("-drive".to_string());
            args.push(format!("file={},format=raw,if=mtd", image));
        }

        for (role, address) in plan {
            let Some(path) = media_path(config, media, *role) else {
                continue;
            };
            storage_group(&mut args, config, *role, address, path);
        }

        if let BootSelection::Ordinal { device } = boot {
            args.push("-boot".to_string());
            args.push(device.to_string());
        }

        args.push("-nic".to_string());
        args.push(nic_group(config, net));

        if let Some(display) = config.display {
            args.push("-display".to_string());
            args.push(display.as_arg().to_string());
        }

        if let Some(audio) = config.audio {
            args.push("-audiodev".to_string());
            args.push(format!("{},id=audio0", audio.as_arg()));
        }

        args.extend(config.extra_args.iter().cloned());

        Self {
            program: config.emulator_program().to_string(),
            args,
        }
    }

    /// Printable single-line form for logs and dry runs
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Backing path for a role: core disks come from the configuration, the
/// removable/extra media from the per-launch paths
fn media_path<'a>(
    config: &'a Configuration,
    media: &'a MediaPaths,
    role: LogicalRole,
) -> Option<&'a str> {
    match role {
        LogicalRole::OsDisk => Some(&config.os_disk),
        LogicalRole::SharedDisk => Some(&config.shared_disk),
        LogicalRole::InstallerMedium => media.installer.as_deref(),
        LogicalRole::ExtraDisk => media.extra_disk.as_deref(),
    }
}

/// Emit one storage attachment group
fn storage_group(
    args: &mut Vec<String>,
    config: &Configuration,
    role: LogicalRole,
    address: &DeviceAddress,
    path: &str,
) {
    let mut drive = format!("file={}", path);

    match config.machine {
        Machine::Q800 => {
            drive.push_str(&format!(",if=none,id={}", address.drive_tag));
        }
        Machine::Mac99 => {
            drive.push_str(&format!(",if=ide,index={}", address.id));
        }
    }

    drive.push_str(",format=raw");
    drive.push_str(&format!(",media={}", address.media.as_arg()));
    drive.push_str(&format!(",cache={}", config.cache.as_arg()));
    // Cache-bypassing AIO backends are only valid with an explicit direct
    // flag on the same drive.
    if config.aio.bypasses_host_cache() {
        drive.push_str(",cache.direct=on");
    }
    if address.media == MediaKind::Cdrom {
        drive.push_str(",readonly=on");
    }
    drive.push_str(&format!(",aio={}", config.aio.as_arg()));

    args.push("-drive".to_string());
    args.push(drive);

    if config.machine == Machine::Q800 {
        let device = match address.media {
            MediaKind::Disk => "scsi-hd",
            MediaKind::Cdrom => "scsi-cd",
        };
        args.push("-device".to_string());
        args.push(format!(
            "{},scsi-id={},drive={}",
            device, address.id, address.drive_tag
        ));
    }

    log::debug!(
        "Storage: {} -> {} id {} ({})",
        role.describe(),
        address.bus.name(),
        address.id,
        path
    );
}

/// Emit the single network attachment group
fn nic_group(config: &Configuration, net: &NetworkResource) -> String {
    let mut nic = match net.mode {
        NetMode::User => "user".to_string(),
        NetMode::Tap => {
            let ifname = net.interface.as_deref().unwrap_or_default();
            format!("tap,ifname={},script=no,downscript=no", ifname)
        }
        NetMode::Vde => {
            let sock = net
                .vde_socket
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            format!("vde,sock={}", sock)
        }
    };
    nic.push_str(&format!(",model={}", config.net_model));
    if let Some(mac) = &net.mac {
        nic.push_str(&format!(",mac={}", mac));
    }
    nic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address;
    use crate::core::config::Configuration;
    use crate::core::net::NetworkResource;

    fn q800_config(extra: &str) -> Configuration {
        let text = format!(
            "machine = q800\nram = 128M\nrom = Quadra800.rom\n\
             os_disk = macos8.img\nshared_disk = shared.img\n{}",
            extra
        );
        Configuration::parse(&text).unwrap()
    }

    fn mac99_config(extra: &str) -> Configuration {
        let text = format!(
            "machine = mac99\nram = 512M\nos_disk = macos9.img\nshared_disk = shared.img\n{}",
            extra
        );
        Configuration::parse(&text).unwrap()
    }

    fn user_net() -> NetworkResource {
        NetworkResource {
            mode: NetMode::User,
            bridge: None,
            interface: None,
            mac: None,
            vde_socket: None,
        }
    }

    fn arg_after<'a>(inv: &'a Invocation, flag: &str, n: usize) -> &'a str {
        let mut seen = 0;
        let mut iter = inv.args.iter();
        while let Some(arg) = iter.next() {
            if arg == flag {
                if seen == n {
                    return iter.next().expect("flag without value");
                }
                seen += 1;
            }
        }
        panic!("{} occurrence {} not found in {:?}", flag, n, inv.args);
    }

    #[test]
    fn test_q800_machine_and_memory_groups() {
        let config = q800_config("");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &MediaPaths::default());

        assert_eq!(inv.program, "qemu-system-m68k");
        assert_eq!(arg_after(&inv, "-M", 0), "q800");
        assert_eq!(arg_after(&inv, "-m", 0), "128");
        assert_eq!(arg_after(&inv, "-bios", 0), "Quadra800.rom");
        assert_eq!(
            arg_after(&inv, "-drive", 0),
            "file=pram.img,format=raw,if=mtd"
        );
    }

    #[test]
    fn test_q800_storage_groups_carry_scsi_ids() {
        let config = q800_config("");
        let plan = address::plan(Machine::Q800, true, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let media = MediaPaths {
            installer: Some("install.iso".to_string()),
            extra_disk: None,
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &media);

        // PRAM drive first, then one drive per role in role order
        assert_eq!(
            arg_after(&inv, "-drive", 1),
            "file=macos8.img,if=none,id=os,format=raw,media=disk,cache=writethrough,aio=threads"
        );
        assert_eq!(arg_after(&inv, "-device", 0), "scsi-hd,scsi-id=0,drive=os");
        assert_eq!(
            arg_after(&inv, "-device", 1),
            "scsi-hd,scsi-id=1,drive=shared"
        );
        assert_eq!(
            arg_after(&inv, "-drive", 3),
            "file=install.iso,if=none,id=install,format=raw,media=cdrom,cache=writethrough,readonly=on,aio=threads"
        );
        assert_eq!(
            arg_after(&inv, "-device", 2),
            "scsi-cd,scsi-id=3,drive=install"
        );
    }

    #[test]
    fn test_direct_cache_flag_rides_with_native_aio() {
        let config = q800_config("cache = none\naio = native");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &MediaPaths::default());

        let os_drive = arg_after(&inv, "-drive", 1);
        assert!(os_drive.contains("cache=none,cache.direct=on"), "{}", os_drive);
        assert!(os_drive.ends_with("aio=native"), "{}", os_drive);
    }

    #[test]
    fn test_mac99_ide_and_ordinal_boot() {
        let config = mac99_config("");
        let plan = address::plan(Machine::Mac99, true, false, true).unwrap();
        let boot = BootSelection::Ordinal { device: 'd' };
        let media = MediaPaths {
            installer: Some("install.iso".to_string()),
            extra_disk: None,
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &media);

        assert_eq!(inv.program, "qemu-system-ppc");
        // Install boot swapped ids: installer on 0, OS on 2
        assert_eq!(
            arg_after(&inv, "-drive", 0),
            "file=macos9.img,if=ide,index=2,format=raw,media=disk,cache=writethrough,aio=threads"
        );
        assert_eq!(
            arg_after(&inv, "-drive", 2),
            "file=install.iso,if=ide,index=0,format=raw,media=cdrom,cache=writethrough,readonly=on,aio=threads"
        );
        assert_eq!(arg_after(&inv, "-boot", 0), "d");
        // No SCSI devices and no PRAM drive on the Power Mac
        assert!(!inv.args.iter().any(|a| a == "-device"));
        assert!(!inv.args.iter().any(|a| a.contains("if=mtd")));
    }

    #[test]
    fn test_nic_group_forms() {
        let config = q800_config("");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };

        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &MediaPaths::default());
        assert_eq!(arg_after(&inv, "-nic", 0), "user,model=dp83932");

        let tap = NetworkResource {
            mode: NetMode::Tap,
            bridge: Some("macbr0".to_string()),
            interface: Some("mbtap1".to_string()),
            mac: Some("52:54:00:12:34:56".to_string()),
            vde_socket: None,
        };
        let inv = Invocation::build(&config, &plan, &boot, &tap, &MediaPaths::default());
        assert_eq!(
            arg_after(&inv, "-nic", 0),
            "tap,ifname=mbtap1,script=no,downscript=no,model=dp83932,mac=52:54:00:12:34:56"
        );

        let vde = NetworkResource {
            mode: NetMode::Vde,
            bridge: None,
            interface: None,
            mac: None,
            vde_socket: Some("/tmp/macboot-vde.ctl".into()),
        };
        let inv = Invocation::build(&config, &plan, &boot, &vde, &MediaPaths::default());
        assert_eq!(
            arg_after(&inv, "-nic", 0),
            "vde,sock=/tmp/macboot-vde.ctl,model=dp83932"
        );
    }

    #[test]
    fn test_display_and_audio_only_when_configured() {
        let plain = q800_config("");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let inv = Invocation::build(&plain, &plan, &boot, &user_net(), &MediaPaths::default());
        assert!(!inv.args.iter().any(|a| a == "-display"));
        assert!(!inv.args.iter().any(|a| a == "-audiodev"));

        let rich = q800_config("display = sdl\naudio = pa");
        let inv = Invocation::build(&rich, &plan, &boot, &user_net(), &MediaPaths::default());
        assert_eq!(arg_after(&inv, "-display", 0), "sdl");
        assert_eq!(arg_after(&inv, "-audiodev", 0), "pa,id=audio0");
    }

    #[test]
    fn test_extra_args_trail_the_invocation() {
        let config = q800_config("extra_args = \"-serial stdio\"");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &MediaPaths::default());
        assert_eq!(inv.args[inv.args.len() - 2..], ["-serial", "stdio"]);
    }

    #[test]
    fn test_same_inputs_same_argument_list() {
        let config = q800_config("display = gtk\nmac = 52:54:00:00:00:01");
        let plan = address::plan(Machine::Q800, true, true, true).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let media = MediaPaths {
            installer: Some("install.iso".to_string()),
            extra_disk: Some("extra.img".to_string()),
        };
        let a = Invocation::build(&config, &plan, &boot, &user_net(), &media);
        let b = Invocation::build(&config, &plan, &boot, &user_net(), &media);
        assert_eq!(a, b);
    }

    #[test]
    fn test_emulator_override() {
        let config = q800_config("emulator = /opt/qemu/bin/qemu-system-m68k");
        let plan = address::plan(Machine::Q800, false, false, false).unwrap();
        let boot = BootSelection::Pram {
            image: "pram.img".to_string(),
        };
        let inv = Invocation::build(&config, &plan, &boot, &user_net(), &MediaPaths::default());
        assert_eq!(inv.program, "/opt/qemu/bin/qemu-system-m68k");
    }

    #[test]
    fn test_command_line_quotes_spaced_arguments() {
        let inv = Invocation {
            program: "qemu-system-ppc".to_string(),
            args: vec!["-drive".to_string(), "file=Mac OS 9.img".to_string()],
        };
        assert_eq!(
            inv.command_line(),
            "qemu-system-ppc -drive 'file=Mac OS 9.img'"
        );
    }
}
