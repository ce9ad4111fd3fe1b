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

//! A small, durable, file-backed key-value record store for embedded and
//! system-configuration use.
//!
//! A store is a flat sequence of short binary values identified by a
//! 16-bit key, persisted on a single filesystem path with crash-safe
//! updates and on-disk format self-validation. It is opened by exactly
//! one writer or by any number of concurrent readers, loaded fully into
//! memory, edited in memory, and committed atomically (swap mode) or in
//! place back to storage.
//!
//! ```no_run
//! use recordkv::{OpenOptions, Store};
//!
//! let mut store = Store::new();
//! store.open("config.db", OpenOptions::new().writable(true).create(true).max_size(8192))?;
//! let kvp = store.kvp_mut()?;
//! let pos = kvp.put_unique(1, Some(b"hello"), 5)?;
//! assert_eq!(kvp.value_at(pos), b"hello");
//! store.commit()?;
//! # Ok::<(), recordkv::Error>(())
//! ```
//!
//! Not supported: multiple concurrent writers on one instance,
//! transactional atomicity spanning multiple commits, indexed or sorted
//! lookups (this is a linear sequence, not a map), and values longer than
//! 65,531 bytes.

mod buffer;
mod crc;
mod fsadapter;
mod kvp;
mod record;
mod store;
mod util;
mod validate;

pub use crate::kvp::{Cursor, Kvp, RangeIter};
pub use crate::record::{HEADER_KEY, INVALID_KEY, MAX_USER_KEY, MAX_VALUE_SIZE, RESERVED_KEY_FIRST};
pub use crate::store::{OpenOptions, ReplicaMode, Store};
pub use crate::util::error::{Error, Result};
