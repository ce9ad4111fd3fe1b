// Copyright (c) The recordkv Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! The checksum stored in the file header is a bit-reflected CRC-32
//! (polynomial `0xEDB88320`, init `0xFFFFFFFF`) with **no final XOR**. That
//! is the same bit-serial algorithm the standard CRC-32/ISO-HDLC checksum
//! uses, minus its last step, so it is exactly the bitwise complement of
//! the value `crc32fast` (which does apply the final XOR) would produce.

use crc32fast::Hasher;

/// Streaming accumulator for the header's checksum convention.
pub struct Crc32 {
    hasher: Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Crc32 { hasher: Hasher::new() }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Consumes the accumulator, returning the checksum without the final
    /// complement the standard algorithm applies.
    pub fn finish(self) -> u32 {
        !self.hasher.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Crc32::new()
    }
}

/// Convenience one-shot form of [`Crc32`].
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finish()
}
