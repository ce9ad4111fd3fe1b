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

//! A growable byte region holding the entire store image, capped at a
//! configured maximum. Supports in-place insertion and erasure via
//! `memmove`-style shifts, which is how records make room for themselves
//! or close the gap they leave behind.

use crate::util::error::{Error, Result};

pub struct Buffer {
    data: Vec<u8>,
    end: usize,
    max_size: usize,
}

impl Buffer {
    /// An empty buffer bounded by `max_size` bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        Buffer {
            data: Vec::new(),
            end: 0,
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Logical length of the image currently held.
    pub fn len(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.end]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.end]
    }

    /// Sets the logical length directly, used when loading an on-disk
    /// image whose validated content length differs from its allocation.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.end = len;
    }

    /// Grows the backing allocation to at least `capacity` bytes, leaving
    /// the logical end and existing prefix untouched. Fails with
    /// [`Error::TooBig`] if `capacity` exceeds `max_size`, or
    /// [`Error::OutOfMemory`] if the allocator cannot satisfy the request.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity > self.max_size {
            return Err(Error::TooBig("requested capacity exceeds the adjusted maximum size"));
        }
        if capacity > self.data.len() {
            let additional = capacity - self.data.len();
            self.data
                .try_reserve(additional)
                .map_err(|_| Error::OutOfMemory)?;
            self.data.resize(capacity, 0);
        }
        Ok(())
    }

    /// Makes room for `n` new bytes at `offset` by shifting
    /// `[offset, end)` right by `n`, growing the allocation first. The new
    /// `n` bytes are left uninitialized (zeroed, in practice, since
    /// `reserve` zero-fills on growth) for the caller to overwrite.
    pub fn insert_bytes(&mut self, offset: usize, n: usize) -> Result<()> {
        debug_assert!(offset <= self.end);
        self.reserve(self.end + n)?;
        self.data.copy_within(offset..self.end, offset + n);
        self.end += n;
        Ok(())
    }

    /// Closes the gap left by removing `n` bytes at `offset`, shifting
    /// `[offset + n, end)` left by `n`.
    pub fn erase_bytes(&mut self, offset: usize, n: usize) {
        debug_assert!(offset + n <= self.end);
        self.data.copy_within(offset + n..self.end, offset);
        self.end -= n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_rejects_over_cap() {
        let mut buf = Buffer::with_max_size(16);
        assert!(matches!(buf.reserve(17), Err(Error::TooBig(_))));
        assert!(buf.reserve(16).is_ok());
    }

    #[test]
    fn insert_shifts_the_tail_right() {
        let mut buf = Buffer::with_max_size(64);
        buf.insert_bytes(0, 4).unwrap();
        buf.as_mut_slice()[0..4].copy_from_slice(b"abcd");
        buf.insert_bytes(2, 2).unwrap();
        buf.as_mut_slice()[2..4].copy_from_slice(b"XY");
        assert_eq!(buf.as_slice(), b"abXYcd");
    }

    #[test]
    fn erase_shifts_the_tail_left() {
        let mut buf = Buffer::with_max_size(64);
        buf.insert_bytes(0, 6).unwrap();
        buf.as_mut_slice().copy_from_slice(b"abXYcd");
        buf.erase_bytes(2, 2);
        assert_eq!(buf.as_slice(), b"abcd");
    }
}
