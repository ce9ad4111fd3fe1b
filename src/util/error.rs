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

use std::io;

use quick_error::quick_error;

quick_error! {
    /// The error taxonomy for every fallible operation in this crate.
    #[derive(Debug)]
    pub enum Error {
        /// `Store::open` was called on a handle that already owns a file.
        AlreadyOpen {
            display("store is already open")
        }
        /// Open without `create` found an absent or empty file, or a
        /// unique-key allocator exhausted its range.
        NotFound {
            display("not found")
        }
        /// The on-disk file is shorter than the minimum header size.
        OutOfRange {
            display("file is shorter than the minimum header size")
        }
        /// Format validation failed, an invalid replica mode was supplied,
        /// or a range operation was given inverted bounds / a zero increment.
        InvalidArgument(msg: &'static str) {
            display("invalid argument: {}", msg)
        }
        /// A requested capacity exceeds the adjusted maximum size, or a
        /// `write_value` call would run past the end of its value region.
        TooBig(msg: &'static str) {
            display("too big: {}", msg)
        }
        /// Buffer reallocation failed.
        OutOfMemory {
            display("out of memory")
        }
        /// The adjusted maximum size computed for this path is zero.
        NoSpace {
            display("no space: adjusted maximum size is zero")
        }
        /// A filesystem primitive returned a platform error.
        Io(err: io::Error) {
            display("I/O error: {}", err)
            from()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
