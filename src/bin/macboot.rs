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

use clap::Parser;
use log::{error, info};
use macboot::core::command::MediaPaths;
use macboot::core::config::Configuration;
use macboot::core::launch::{self, LaunchRequest, LaunchSupervisor, EXIT_LAUNCH_FAILURE};

/// Classic Macintosh emulator launcher
#[derive(Parser)]
#[command(name = "macboot")]
#[command(about = "Classic Macintosh emulator launcher for QEMU", long_about = None)]
struct Args {
    /// Path to the machine configuration file
    config: String,

    /// Path to an installer CD image to attach
    #[arg(short = 'i', long)]
    installer: Option<String>,

    /// Path to an additional disk image to attach
    #[arg(long)]
    extra_disk: Option<String>,

    /// Boot from the installer medium instead of the OS disk
    #[arg(long, requires = "installer")]
    install: bool,

    /// Print the emulator command line without launching anything
    #[arg(long)]
    dry_run: bool,

    /// Print the launch plan as JSON without launching anything
    #[arg(long)]
    print_plan: bool,
}

fn main() {
    // Load .env file if present (for development configuration)
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize logger with default level INFO
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("macboot v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    std::process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    info!("Loading configuration from: {}", args.config);
    let config = match Configuration::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration failed: {}", e);
            return EXIT_LAUNCH_FAILURE;
        }
    };
    info!("Machine: {}", config.machine.tag());

    let request = LaunchRequest {
        media: MediaPaths {
            installer: args.installer.clone(),
            extra_disk: args.extra_disk.clone(),
        },
        boot_from_installer: args.install,
    };

    if args.dry_run || args.print_plan {
        let plan = match launch::plan_launch(&config, &request) {
            Ok(plan) => plan,
            Err(e) => {
                error!("Planning failed: {}", e);
                return EXIT_LAUNCH_FAILURE;
            }
        };
        if args.print_plan {
            match serde_json::to_string_pretty(&plan) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("Could not serialize launch plan: {}", e);
                    return EXIT_LAUNCH_FAILURE;
                }
            }
        } else {
            println!("{}", plan.invocation.command_line());
        }
        return 0;
    }

    let mut supervisor = LaunchSupervisor::new(config);
    match supervisor.run(&request) {
        Ok(code) => code,
        Err(e) => {
            error!("Launch failed: {}", e);
            EXIT_LAUNCH_FAILURE
        }
    }
}
