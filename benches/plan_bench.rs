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

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use macboot::core::address;
use macboot::core::command::{BootSelection, Invocation, MediaPaths};
use macboot::core::config::{Configuration, Machine, NetMode};
use macboot::core::net::NetworkResource;
use macboot::core::pram::{decode_boot_reference, encode_boot_reference};

const Q800_CONFIG: &str = "machine = q800\nram = 128M\nrom = Quadra800.rom\n\
                           os_disk = macos8.img\nshared_disk = shared.img\n\
                           display = sdl\naudio = pa";

fn config_parse_benchmark(c: &mut Criterion) {
    c.bench_function("config_parse", |b| {
        b.iter(|| Configuration::parse(black_box(Q800_CONFIG)).unwrap());
    });
}

fn address_plan_benchmark(c: &mut Criterion) {
    c.bench_function("address_plan", |b| {
        b.iter(|| {
            address::plan(black_box(Machine::Q800), true, true, true).unwrap();
        });
    });
}

fn pram_encode_benchmark(c: &mut Criterion) {
    c.bench_function("pram_encode_decode", |b| {
        b.iter(|| {
            for id in 0u8..7 {
                let reference = encode_boot_reference(black_box(id));
                black_box(decode_boot_reference(reference));
            }
        });
    });
}

fn invocation_build_benchmark(c: &mut Criterion) {
    let config = Configuration::parse(Q800_CONFIG).unwrap();
    let plan = address::plan(Machine::Q800, true, true, true).unwrap();
    let boot = BootSelection::Pram {
        image: "pram.img".to_string(),
    };
    let net = NetworkResource {
        mode: NetMode::User,
        bridge: None,
        interface: None,
        mac: None,
        vde_socket: None,
    };
    let media = MediaPaths {
        installer: Some("install.iso".to_string()),
        extra_disk: Some("extra.img".to_string()),
    };

    c.bench_function("invocation_build", |b| {
        b.iter(|| {
            black_box(Invocation::build(
                black_box(&config),
                &plan,
                &boot,
                &net,
                &media,
            ));
        });
    });
}

criterion_group!(
    benches,
    config_parse_benchmark,
    address_plan_benchmark,
    pram_encode_benchmark,
    invocation_build_benchmark
);
criterion_main!(benches);
