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

//! Pure validation of a candidate store image: decides whether a byte
//! range is a well-formed image and, if so, what its effective content
//! length is (which may be shorter than the bytes handed in; see the
//! crash-recovery case in [`crate::store`]).

use crate::crc;
use crate::record::{self, FileHeader, HEADER_KEY, SIGNATURE, VERSION};

/// Validates `buf[..size]` as a store image. Returns `0` if invalid,
/// otherwise the effective content length in `[FILE_HEADER_SIZE, size]`.
pub fn validate(buf: &[u8], size: usize) -> usize {
    if size < record::FILE_HEADER_SIZE {
        return 0;
    }
    if !record::can_dereference(buf, 0, size) {
        return 0;
    }
    let header = record::RecordHeader::decode(&buf[0..4]);
    if header.key != HEADER_KEY || (header.size as usize) < record::FILE_HEADER_SIZE {
        return 0;
    }
    if buf[4] != SIGNATURE || buf[5] != VERSION {
        return 0;
    }
    let file_header = FileHeader::decode(buf);
    let file_size = file_header.file_size as usize;
    if file_size < record::FILE_HEADER_SIZE || file_size > size {
        return 0;
    }
    let expected_crc = crc::checksum(&buf[record::FILE_HEADER_SIZE..file_size]);
    if file_header.crc != expected_crc {
        return 0;
    }

    let mut p = record::FILE_HEADER_SIZE;
    while p != file_size {
        if !record::can_dereference(buf, p, file_size) {
            return 0;
        }
        let rec = record::RecordHeader::decode(&buf[p..]);
        if rec.key == HEADER_KEY {
            return 0;
        }
        p = record::next(buf, p, file_size);
    }

    file_size
}
