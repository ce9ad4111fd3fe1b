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

//! Fixed-width little-endian encoding helpers for the on-disk format.
//!
//! The store's layout is tightly packed with no padding, so every field is
//! read and written as explicit bytes rather than through platform struct
//! layout.

/// Writes `n` into `buf[0..2]`, little-endian.
pub fn encode_fixed16(buf: &mut [u8], n: u16) {
    buf[0..2].copy_from_slice(&n.to_le_bytes());
}

/// Reads a little-endian `u16` from `buf[0..2]`.
pub fn decode_fixed16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

/// Writes `n` into `buf[0..4]`, little-endian.
pub fn encode_fixed32(buf: &mut [u8], n: u32) {
    buf[0..4].copy_from_slice(&n.to_le_bytes());
}

/// Reads a little-endian `u32` from `buf[0..4]`.
pub fn decode_fixed32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fixed16() {
        let mut buf = [0u8; 2];
        encode_fixed16(&mut buf, 0xBEEF);
        assert_eq!(buf, [0xEF, 0xBE]);
        assert_eq!(decode_fixed16(&buf), 0xBEEF);
    }

    #[test]
    fn round_trips_fixed32() {
        let mut buf = [0u8; 4];
        encode_fixed32(&mut buf, 0xDEAD_BEEF);
        assert_eq!(buf, [0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(decode_fixed32(&buf), 0xDEAD_BEEF);
    }
}
