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

//! Custom assertions over composed emulator invocations

use macboot::core::command::Invocation;

/// All values following occurrences of `flag`, in order
#[allow(dead_code)]
pub fn flag_values(invocation: &Invocation, flag: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut iter = invocation.args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            if let Some(value) = iter.next() {
                values.push(value.clone());
            }
        }
    }
    values
}

/// Assert that some value of `flag` contains `fragment`
#[allow(dead_code)]
pub fn assert_flag_contains(invocation: &Invocation, flag: &str, fragment: &str) {
    let values = flag_values(invocation, flag);
    assert!(
        values.iter().any(|v| v.contains(fragment)),
        "No {} value containing '{}' in {:?}",
        flag,
        fragment,
        values
    );
}

/// Assert that no value of `flag` contains `fragment`
#[allow(dead_code)]
pub fn assert_flag_lacks(invocation: &Invocation, flag: &str, fragment: &str) {
    let values = flag_values(invocation, flag);
    assert!(
        values.iter().all(|v| !v.contains(fragment)),
        "Unexpected {} value containing '{}' in {:?}",
        flag,
        fragment,
        values
    );
}
