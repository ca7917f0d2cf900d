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

//! PRAM image inspection and reset tool
//!
//! The launcher itself only ever rewrites the boot-device fields of a PRAM
//! image. Resetting the image, or forcing a specific boot target by hand,
//! is an operator action and lives here.

use clap::Parser;
use log::info;
use macboot::core::error::Result;
use macboot::core::pram::Pram;

/// PRAM boot-state inspection tool
#[derive(Parser)]
#[command(name = "macboot-pram")]
#[command(about = "Inspect or reset a Macintosh PRAM image", long_about = None)]
struct Args {
    /// Path to the PRAM image
    pram_file: String,

    /// Recreate the image zero-filled, discarding all stored preferences
    #[arg(long, conflicts_with = "set_target")]
    reset: bool,

    /// Write a boot target (bus id) directly
    #[arg(long)]
    set_target: Option<u8>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    if args.reset {
        Pram::recreate(&args.pram_file)?;
        info!("Reset PRAM image: {}", args.pram_file);
        return Ok(());
    }

    let mut pram = Pram::ensure(&args.pram_file)?;

    if let Some(id) = args.set_target {
        pram.write_boot_target(id)?;
        info!("Boot target set to bus id {}", id);
        return Ok(());
    }

    match pram.boot_target() {
        Some(id) => println!("boot target: bus id {}", id),
        None => println!("boot target: not set"),
    }
    Ok(())
}
