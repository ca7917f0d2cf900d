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

//! PRAM boot-device preference
//!
//! The Quadra keeps its settings in a 256-byte battery-backed parameter RAM.
//! The emulator is handed the same region as a raw image file, and the ROM
//! reads the preferred boot device from two fields inside it:
//!
//! ```text
//! 0x78 (120): boot partition selector, one byte; 0xFF = any partition
//! 0x7A (122): boot device reference, two bytes little-endian
//! ```
//!
//! The reference value is the bitwise complement of the device's driver
//! reference number, which for SCSI id `n` is `n + 32`:
//!
//! ```text
//! reference = !(n + 32) & 0xFFFF        e.g. id 0 -> 0xFFDF
//! n         = (!reference & 0xFFFF) - 32
//! ```
//!
//! The launcher only ever rewrites these two fields. Every other byte of the
//! image is user territory (volume, mouse scaling, AppleTalk state, ...) and
//! round-trips untouched, so preferences set from inside the guest survive
//! across launches. The image is created zero-filled when absent and is
//! never deleted here; resetting it is an operator action (`macboot-pram`).

use std::fs;
use std::path::{Path, PathBuf};

use super::error::PramError;

/// PRAM image size in bytes
pub const PRAM_SIZE: usize = 256;

/// Byte offset of the boot partition selector
pub const BOOT_SELECTOR_OFFSET: usize = 120;

/// Byte offset of the little-endian boot device reference
pub const BOOT_REFERENCE_OFFSET: usize = 122;

/// Selector value meaning "boot any partition of the referenced device"
pub const BOOT_ANY_PARTITION: u8 = 0xFF;

/// Driver reference bias added to a SCSI id before complementing
const DRIVER_REF_BIAS: u16 = 32;

/// Encode a bus id into the PRAM reference value
pub fn encode_boot_reference(id: u8) -> u16 {
    !(id as u16 + DRIVER_REF_BIAS)
}

/// Recover the bus id from a PRAM reference value
///
/// Returns `None` for bit patterns that do not invert to a representable
/// id; those are foreign values the launcher leaves alone.
pub fn decode_boot_reference(reference: u16) -> Option<u8> {
    let id = (!reference).checked_sub(DRIVER_REF_BIAS)?;
    u8::try_from(id).ok()
}

/// In-memory copy of a PRAM image, tied to its backing file
#[derive(Debug, Clone)]
pub struct Pram {
    path: PathBuf,
    bytes: [u8; PRAM_SIZE],
}

impl Pram {
    /// Open a PRAM image, creating a zero-filled one if absent or empty
    ///
    /// An existing file of the wrong size is refused rather than resized;
    /// truncating or padding it would clobber whatever the operator has in
    /// there.
    pub fn ensure<P: AsRef<Path>>(path: P) -> Result<Self, PramError> {
        let path = path.as_ref();

        let existing = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(PramError::Io(e)),
        };

        let mut bytes = [0u8; PRAM_SIZE];
        match existing.len() {
            0 => {
                fs::write(path, bytes)?;
                log::info!("Created blank PRAM image: {}", path.display());
            }
            PRAM_SIZE => bytes.copy_from_slice(&existing),
            other => {
                return Err(PramError::BadSize {
                    path: path.display().to_string(),
                    expected: PRAM_SIZE,
                    got: other,
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    /// Recreate the image zero-filled, discarding all stored preferences
    ///
    /// This is the operator-facing reset used by `macboot-pram --reset`; the
    /// launch path never calls it.
    pub fn recreate<P: AsRef<Path>>(path: P) -> Result<Self, PramError> {
        let path = path.as_ref();
        let bytes = [0u8; PRAM_SIZE];
        fs::write(path, bytes)?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw image contents
    pub fn bytes(&self) -> &[u8; PRAM_SIZE] {
        &self.bytes
    }

    /// Record `id` as the boot device and persist the image
    ///
    /// Touches exactly three bytes: the selector and the two reference
    /// bytes.
    pub fn write_boot_target(&mut self, id: u8) -> Result<(), PramError> {
        let reference = encode_boot_reference(id);
        self.bytes[BOOT_SELECTOR_OFFSET] = BOOT_ANY_PARTITION;
        self.bytes[BOOT_REFERENCE_OFFSET..BOOT_REFERENCE_OFFSET + 2]
            .copy_from_slice(&reference.to_le_bytes());
        fs::write(&self.path, self.bytes)?;
        log::debug!(
            "PRAM boot target set: id={} reference={:#06X}",
            id,
            reference
        );
        Ok(())
    }

    /// Currently recorded boot device, if any
    pub fn boot_target(&self) -> Option<u8> {
        if self.bytes[BOOT_SELECTOR_OFFSET] != BOOT_ANY_PARTITION {
            return None;
        }
        let reference = u16::from_le_bytes([
            self.bytes[BOOT_REFERENCE_OFFSET],
            self.bytes[BOOT_REFERENCE_OFFSET + 1],
        ]);
        decode_boot_reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("pram.img")
    }

    #[test]
    fn test_encode_known_values() {
        // SCSI id 0 -> driver ref 32 -> complement 0xFFDF
        assert_eq!(encode_boot_reference(0), 0xFFDF);
        assert_eq!(encode_boot_reference(3), 0xFFDC);
        assert_eq!(encode_boot_reference(6), 0xFFD9);
    }

    #[test]
    fn test_round_trip_all_ids() {
        for id in 0..=u8::MAX {
            assert_eq!(decode_boot_reference(encode_boot_reference(id)), Some(id));
        }
    }

    #[test]
    fn test_decode_rejects_foreign_patterns() {
        // Inverts to 0xFFFF - 32, far above any u8 id
        assert_eq!(decode_boot_reference(0x0000), None);
        // Inverts to 31, below the driver reference bias
        assert_eq!(decode_boot_reference(!31u16), None);
    }

    #[test]
    fn test_ensure_creates_blank_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);

        let pram = Pram::ensure(&path).unwrap();
        assert_eq!(pram.bytes(), &[0u8; PRAM_SIZE]);
        assert_eq!(pram.boot_target(), None);
        assert_eq!(fs::read(&path).unwrap().len(), PRAM_SIZE);
    }

    #[test]
    fn test_ensure_accepts_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);
        fs::write(&path, b"").unwrap();

        let pram = Pram::ensure(&path).unwrap();
        assert_eq!(pram.boot_target(), None);
    }

    #[test]
    fn test_ensure_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);
        fs::write(&path, vec![0u8; 100]).unwrap();

        let err = Pram::ensure(&path).unwrap_err();
        assert!(matches!(
            err,
            PramError::BadSize {
                expected: PRAM_SIZE,
                got: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_write_and_read_back_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);

        let mut pram = Pram::ensure(&path).unwrap();
        pram.write_boot_target(3).unwrap();
        assert_eq!(pram.boot_target(), Some(3));

        // A fresh load sees the persisted target
        let reloaded = Pram::ensure(&path).unwrap();
        assert_eq!(reloaded.boot_target(), Some(3));
        assert_eq!(
            reloaded.bytes()[BOOT_SELECTOR_OFFSET],
            BOOT_ANY_PARTITION
        );
    }

    #[test]
    fn test_write_preserves_other_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);

        // Simulate operator preferences spread across the image
        let mut image = [0u8; PRAM_SIZE];
        for (i, byte) in image.iter_mut().enumerate() {
            *byte = i as u8;
        }
        fs::write(&path, image).unwrap();

        let mut pram = Pram::ensure(&path).unwrap();
        pram.write_boot_target(0).unwrap();

        let after = fs::read(&path).unwrap();
        for (offset, byte) in after.iter().enumerate() {
            let touched = offset == BOOT_SELECTOR_OFFSET
                || offset == BOOT_REFERENCE_OFFSET
                || offset == BOOT_REFERENCE_OFFSET + 1;
            if !touched {
                assert_eq!(*byte, image[offset], "byte {} changed", offset);
            }
        }
        assert_eq!(after[BOOT_SELECTOR_OFFSET], BOOT_ANY_PARTITION);
        assert_eq!(after[BOOT_REFERENCE_OFFSET], 0xDF);
        assert_eq!(after[BOOT_REFERENCE_OFFSET + 1], 0xFF);
    }

    #[test]
    fn test_selector_gate() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);

        let mut image = [0u8; PRAM_SIZE];
        // Reference present but selector unset: no boot target
        image[BOOT_REFERENCE_OFFSET..BOOT_REFERENCE_OFFSET + 2]
            .copy_from_slice(&encode_boot_reference(2).to_le_bytes());
        fs::write(&path, image).unwrap();

        let pram = Pram::ensure(&path).unwrap();
        assert_eq!(pram.boot_target(), None);
    }

    #[test]
    fn test_recreate_discards_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(&dir);

        let mut pram = Pram::ensure(&path).unwrap();
        pram.write_boot_target(5).unwrap();

        let reset = Pram::recreate(&path).unwrap();
        assert_eq!(reset.boot_target(), None);
        assert_eq!(fs::read(&path).unwrap(), vec![0u8; PRAM_SIZE]);
    }
}
