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

//! The public operations on the buffer viewed as a sequence of records:
//! begin/end, insert-at, erase-at, find-by-key, put-unique,
//! alloc-unique-in-range, erase-range, iterate-range.
//!
//! All enumeration here is O(n) over the record count. That is deliberate:
//! this store's domain expects at most a few hundred small records, so a
//! linear scan is simpler and cheaper in practice than maintaining an
//! index.

use crate::buffer::Buffer;
use crate::record::{self, RecordHeader, HEADER_KEY, HEADER_SIZE, RESERVED_KEY_FIRST};
use crate::util::error::{Error, Result};

/// A position within the record sequence. Cursors are plain byte offsets,
/// not borrowed references. They stay valid across the buffer they index
/// into only until the next mutating call, same as the raw pointers they
/// stand in for. Comparing, copying, and storing a `Cursor` is cheap and
/// safe; dereferencing one after a mutation is a logic error the caller
/// must avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(pub(crate) usize);

/// The record sequence engine: a [`Buffer`] interpreted as a packed list
/// of [`RecordHeader`]-prefixed records, starting right after the file
/// header.
pub struct Kvp {
    buffer: Buffer,
}

impl Kvp {
    pub(crate) fn new(buffer: Buffer) -> Self {
        Kvp { buffer }
    }

    pub(crate) fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// First user record, immediately after the file header.
    pub fn begin(&self) -> Cursor {
        Cursor(record::FILE_HEADER_SIZE)
    }

    /// The sentinel one-past-the-end position.
    pub fn end(&self) -> Cursor {
        Cursor(self.buffer.len())
    }

    fn header_at(&self, pos: Cursor) -> RecordHeader {
        RecordHeader::decode(&self.buffer.as_slice()[pos.0..])
    }

    /// The key of the record at `pos`. Panics if `pos == end()`.
    pub fn key_at(&self, pos: Cursor) -> u16 {
        self.header_at(pos).key
    }

    /// The total size (header + value) of the record at `pos`.
    pub fn size_at(&self, pos: Cursor) -> u16 {
        self.header_at(pos).size
    }

    /// The value bytes of the record at `pos`.
    pub fn value_at(&self, pos: Cursor) -> &[u8] {
        let header = self.header_at(pos);
        let start = pos.0 + HEADER_SIZE;
        let end = pos.0 + header.size as usize;
        &self.buffer.as_slice()[start..end]
    }

    fn advance(&self, pos: Cursor) -> Cursor {
        Cursor(record::next(self.buffer.as_slice(), pos.0, self.buffer.len()))
    }

    /// Inserts a new record at `pos` with the given `key` and a value
    /// region of `value_size` (uninitialized) bytes, shifting every
    /// record from `pos` onward to make room. Fails with
    /// [`Error::TooBig`] if `value_size + HEADER_SIZE` would overflow a
    /// 16-bit record size, or if the resulting buffer would exceed the
    /// adjusted maximum size.
    pub fn insert(&mut self, pos: Cursor, key: u16, value_size: u16) -> Result<Cursor> {
        let kvp_size = (value_size as u32) + HEADER_SIZE as u32;
        if kvp_size > u16::MAX as u32 {
            return Err(Error::TooBig("value size overflows the 16-bit record size"));
        }
        let kvp_size = kvp_size as u16;

        self.buffer.insert_bytes(pos.0, kvp_size as usize)?;
        RecordHeader { key, size: kvp_size }.encode(&mut self.buffer.as_mut_slice()[pos.0..]);
        Ok(pos)
    }

    /// Erases the record at `pos`, shifting everything after it left.
    /// Returns the position where the following record now lives (or
    /// `end()` if `pos` was the last record).
    pub fn erase(&mut self, pos: Cursor) -> Cursor {
        let size = self.header_at(pos).size as usize;
        self.buffer.erase_bytes(pos.0, size);
        pos
    }

    /// Linear scan for the first record with the given `key`.
    pub fn try_get(&self, key: u16) -> Option<Cursor> {
        let mut p = self.begin();
        let end = self.end();
        while p != end {
            if self.key_at(p) == key {
                return Some(p);
            }
            p = self.advance(p);
        }
        None
    }

    /// Writes `src` into the value region of the record at `pos`, starting
    /// at `offset`. Fails with [`Error::TooBig`] if `offset + src.len()`
    /// exceeds the value region.
    ///
    /// Any bytes in the value region after `offset + src.len()` are
    /// zeroed, even if they held data from a previous write. Callers that
    /// need to preserve earlier bytes past the written range must
    /// re-supply them.
    pub fn write_value(&mut self, pos: Cursor, offset: usize, src: &[u8]) -> Result<()> {
        let header = self.header_at(pos);
        let value_len = header.size as usize - HEADER_SIZE;
        if offset + src.len() > value_len {
            return Err(Error::TooBig("write_value offset + length exceeds the value region"));
        }
        let value_start = pos.0 + HEADER_SIZE;
        let dst = &mut self.buffer.as_mut_slice()[value_start..value_start + value_len];
        dst[offset..offset + src.len()].copy_from_slice(src);
        for b in &mut dst[offset + src.len()..] {
            *b = 0;
        }
        Ok(())
    }

    /// Ensures exactly one record with `key` exists, holding `value_size`
    /// bytes. Reuses the first record with a matching key if its total
    /// size already matches; otherwise erases it (and any further record
    /// sharing the key) and appends a fresh one. If `src` is `Some`, its
    /// bytes are written into the new value region starting at offset 0.
    /// Fails with [`Error::InvalidArgument`] if `key` falls in the reserved
    /// range `0xFFFB..=0xFFFF`, which is set aside for the file header.
    pub fn put_unique(&mut self, key: u16, src: Option<&[u8]>, value_size: u16) -> Result<Cursor> {
        if key >= RESERVED_KEY_FIRST {
            return Err(Error::InvalidArgument("key falls in the reserved range 0xFFFB..=0xFFFF"));
        }
        let wanted_size = (value_size as u32 + HEADER_SIZE as u32) as u16;
        let mut reused: Option<Cursor> = None;

        // `end()` is re-read after every erase: erasing shifts the
        // buffer, so the old end would point past the new logical end.
        let mut p = self.begin();
        while p != self.end() {
            if self.key_at(p) != key {
                p = self.advance(p);
                continue;
            }
            if reused.is_none() && self.size_at(p) == wanted_size {
                reused = Some(p);
                p = self.advance(p);
            } else {
                p = self.erase(p);
            }
        }

        let pos = match reused {
            Some(pos) => pos,
            None => self.insert(self.end(), key, value_size)?,
        };
        if let Some(src) = src {
            self.write_value(pos, 0, &src[..value_size as usize])?;
        }
        Ok(pos)
    }

    /// Finds the smallest unused key in `[first_key, last_key)`, stepping
    /// by `increment` from `first_key`, and appends a new record with that
    /// key holding `value_size` (uninitialized) bytes. Fails with
    /// [`Error::NotFound`] if the candidate key would escape the range, the
    /// range enters the reserved keys `0xFFFB..=0xFFFF`, or the additive
    /// step would overflow 16 bits before a free key is found. Uniqueness
    /// is checked only against the store's current contents; mixing this
    /// with manual inserts of colliding keys is the caller's responsibility
    /// to avoid.
    pub fn alloc_unique(
        &mut self,
        first_key: u16,
        last_key: u16,
        value_size: u16,
        increment: u16,
    ) -> Result<Cursor> {
        let last_key = last_key.min(RESERVED_KEY_FIRST);
        let mut candidate = first_key;
        loop {
            if candidate >= last_key {
                return Err(Error::NotFound);
            }
            if self.try_get(candidate).is_none() {
                return self.insert(self.end(), candidate, value_size);
            }
            match candidate.checked_add(increment) {
                Some(next) => candidate = next,
                None => return Err(Error::NotFound),
            }
        }
    }

    /// Whether `key` matches the range predicate shared by
    /// [`Kvp::erase_in_range`] and [`Kvp::next_in_range`].
    fn in_range(key: u16, first_key: u16, last_key: u16, increment: u32) -> bool {
        if key < first_key || key >= last_key {
            return false;
        }
        (u32::from(key) - u32::from(first_key)) % increment == 0
    }

    /// Erases every record whose key satisfies
    /// `first_key <= key < last_key && (key - first_key) % increment == 0`.
    /// Fails with [`Error::InvalidArgument`] if `first_key > last_key` or
    /// `increment == 0`.
    pub fn erase_in_range(&mut self, first_key: u16, last_key: u16, increment: u16) -> Result<()> {
        if first_key > last_key {
            return Err(Error::InvalidArgument("first_key must not be greater than last_key"));
        }
        if increment == 0 {
            return Err(Error::InvalidArgument("increment must be at least 1"));
        }
        let increment = u32::from(increment);

        let mut p = self.begin();
        while p != self.end() {
            if Self::in_range(self.key_at(p), first_key, last_key, increment) {
                p = self.erase(p);
            } else {
                p = self.advance(p);
            }
        }
        Ok(())
    }

    /// The next record after `pos` (or from `begin()` if `pos` is `None`)
    /// matching the same range predicate as [`Kvp::erase_in_range`], or
    /// `end()` if none remains.
    pub fn next_in_range(
        &self,
        pos: Option<Cursor>,
        first_key: u16,
        last_key: u16,
        increment: u16,
    ) -> Cursor {
        if increment == 0 {
            return self.end();
        }
        let increment = u32::from(increment);
        let mut p = match pos {
            Some(pos) => self.advance(pos),
            None => self.begin(),
        };
        let end = self.end();
        while p != end {
            if Self::in_range(self.key_at(p), first_key, last_key, increment) {
                return p;
            }
            p = self.advance(p);
        }
        end
    }

    /// An iterator over every record matching the range predicate, built
    /// from repeated [`Kvp::next_in_range`] calls. Like every cursor this
    /// crate hands out, the iterator is invalidated by any mutation made
    /// to the store while it is alive.
    pub fn range(&self, first_key: u16, last_key: u16, increment: u16) -> RangeIter<'_> {
        RangeIter {
            kvp: self,
            first_key,
            last_key,
            increment,
            pos: None,
            done: false,
        }
    }
}

/// Iterator over records matching a `(first_key, last_key, increment)`
/// predicate, yielding their [`Cursor`]s in ascending buffer order.
pub struct RangeIter<'a> {
    kvp: &'a Kvp,
    first_key: u16,
    last_key: u16,
    increment: u16,
    pos: Option<Cursor>,
    done: bool,
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = Cursor;

    fn next(&mut self) -> Option<Cursor> {
        if self.done {
            return None;
        }
        let next = self
            .kvp
            .next_in_range(self.pos, self.first_key, self.last_key, self.increment);
        if next == self.kvp.end() {
            self.done = true;
            return None;
        }
        self.pos = Some(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_kvp(max_size: usize) -> Kvp {
        let mut buffer = Buffer::with_max_size(max_size);
        buffer.insert_bytes(0, record::FILE_HEADER_SIZE).unwrap();
        RecordHeader {
            key: HEADER_KEY,
            size: record::FILE_HEADER_SIZE as u16,
        }
        .encode(buffer.as_mut_slice());
        Kvp::new(buffer)
    }

    #[test]
    fn insert_then_find_round_trips_value() {
        let mut kvp = fresh_kvp(4096);
        let pos = kvp.insert(kvp.end(), 7, 3).unwrap();
        kvp.write_value(pos, 0, b"abc").unwrap();
        let found = kvp.try_get(7).unwrap();
        assert_eq!(kvp.value_at(found), b"abc");
    }

    #[test]
    fn insert_rejects_16_bit_overflow() {
        let mut kvp = fresh_kvp(1 << 20);
        let err = kvp.insert(kvp.end(), 1, 0xFFFF).unwrap_err();
        assert!(matches!(err, Error::TooBig(_)));
    }

    #[test]
    fn erase_removes_exactly_one_record() {
        let mut kvp = fresh_kvp(4096);
        kvp.insert(kvp.end(), 1, 0).unwrap();
        let b = kvp.insert(kvp.end(), 2, 0).unwrap();
        kvp.insert(kvp.end(), 3, 0).unwrap();
        kvp.erase(b);
        assert!(kvp.try_get(2).is_none());
        assert!(kvp.try_get(1).is_some());
        assert!(kvp.try_get(3).is_some());
    }

    #[test]
    fn write_value_zeroes_the_tail() {
        let mut kvp = fresh_kvp(4096);
        let pos = kvp.insert(kvp.end(), 1, 4).unwrap();
        kvp.write_value(pos, 0, b"abcd").unwrap();
        kvp.write_value(pos, 0, b"zz").unwrap();
        assert_eq!(kvp.value_at(pos), &[b'z', b'z', 0, 0]);
    }

    #[test]
    fn write_value_rejects_overrun() {
        let mut kvp = fresh_kvp(4096);
        let pos = kvp.insert(kvp.end(), 1, 2).unwrap();
        let err = kvp.write_value(pos, 1, b"abc").unwrap_err();
        assert!(matches!(err, Error::TooBig(_)));
    }

    #[test]
    fn put_unique_reuses_matching_size() {
        let mut kvp = fresh_kvp(4096);
        kvp.put_unique(5, Some(b"AAA"), 3).unwrap();
        kvp.put_unique(5, Some(b"BB"), 2).unwrap();
        let mut matches = 0;
        let mut p = kvp.begin();
        while p != kvp.end() {
            if kvp.key_at(p) == 5 {
                matches += 1;
                assert_eq!(kvp.value_at(p), b"BB");
            }
            p = kvp.advance(p);
        }
        assert_eq!(matches, 1);
    }

    #[test]
    fn put_unique_rejects_reserved_key() {
        let mut kvp = fresh_kvp(4096);
        let err = kvp.put_unique(HEADER_KEY, Some(b"x"), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        // nothing was appended: the record sequence is still empty.
        assert_eq!(kvp.begin(), kvp.end());
    }

    #[test]
    fn alloc_unique_does_not_cross_into_the_reserved_range() {
        let mut kvp = fresh_kvp(4096);
        // first_key..last_key spans into the reserved range 0xFFFB..=0xFFFF;
        // only the one user key below it (0xFFFA) may be handed out.
        let pos = kvp.alloc_unique(0xFFFA, 0xFFFF, 0, 1).unwrap();
        assert_eq!(kvp.key_at(pos), 0xFFFA);
        let err = kvp.alloc_unique(0xFFFA, 0xFFFF, 0, 1).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn alloc_unique_walks_the_keyspace() {
        let mut kvp = fresh_kvp(4096);
        let mut allocated = Vec::new();
        for _ in 0..5 {
            let pos = kvp.alloc_unique(100, 110, 0, 2).unwrap();
            allocated.push(kvp.key_at(pos));
        }
        assert_eq!(allocated, vec![100, 102, 104, 106, 108]);
        let err = kvp.alloc_unique(100, 110, 0, 2).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn erase_in_range_leaves_non_matching_keys() {
        let mut kvp = fresh_kvp(4096);
        for key in [1u16, 2, 3, 255, 256, 257] {
            kvp.insert(kvp.end(), key, 0).unwrap();
        }
        kvp.erase_in_range(0, 256, 1).unwrap();
        let remaining: Vec<u16> = kvp.range(0, u16::MAX, 1).map(|p| kvp.key_at(p)).collect();
        assert_eq!(remaining, vec![256, 257]);
    }

    #[test]
    fn erase_in_range_rejects_invalid_bounds() {
        let mut kvp = fresh_kvp(4096);
        assert!(matches!(
            kvp.erase_in_range(10, 5, 1).unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            kvp.erase_in_range(0, 10, 0).unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn range_iterator_matches_increment_predicate() {
        let mut kvp = fresh_kvp(4096);
        for key in 0u16..10 {
            kvp.insert(kvp.end(), key, 0).unwrap();
        }
        let evens: Vec<u16> = kvp.range(0, 10, 2).map(|p| kvp.key_at(p)).collect();
        assert_eq!(evens, vec![0, 2, 4, 6, 8]);
    }
}
