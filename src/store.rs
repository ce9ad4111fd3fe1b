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

//! File lifecycle: open (with lock and mode-dependent loading), commit
//! (in-place or swap-and-rename), close; plus recovery rules for
//! truncated or leftover-swap files.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};

use crate::buffer::Buffer;
use crate::crc;
use crate::fsadapter;
use crate::kvp::Kvp;
use crate::record::{self, FileHeader};
use crate::util::error::{Error, Result};
use crate::validate;

/// Durability strategy used by [`Store::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaMode {
    /// Overwrite the primary file in place and truncate to the new length.
    InPlace,
    /// Write to a `.tmp` sibling and atomically rename it over the
    /// primary, closing the store as a side effect of the rename.
    Swap,
}

/// Configuration for [`Store::open`], built with a small chained builder
/// in the style of this corpus's `Options`/`ReadOptions` structs.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    readable: bool,
    writable: bool,
    create: bool,
    truncate: bool,
    replica_mode: ReplicaMode,
    requested_max_size: u32,
}

impl OpenOptions {
    /// Defaults to a read-only, non-creating, in-place open with no
    /// capacity (callers must set at least `max_size`).
    pub fn new() -> Self {
        OpenOptions {
            readable: true,
            writable: false,
            create: false,
            truncate: false,
            replica_mode: ReplicaMode::InPlace,
            requested_max_size: 0,
        }
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn replica_mode(mut self, mode: ReplicaMode) -> Self {
        self.replica_mode = mode;
        self
    }

    pub fn max_size(mut self, requested_max_size: u32) -> Self {
        self.requested_max_size = requested_max_size;
        self
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions::new()
    }
}

struct OpenState {
    file: File,
    path: PathBuf,
    writable: bool,
    replica_mode: ReplicaMode,
    kvp: Kvp,
}

/// A handle to a single store file. Closed handles are reusable: call
/// [`Store::open`] again after [`Store::close`] (or after a swap-mode
/// commit, which closes the store as part of the rename).
pub struct Store {
    state: Option<OpenState>,
}

impl Store {
    pub fn new() -> Self {
        Store { state: None }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Opens `path` according to `options`. See the module docs for the
    /// full sequence of checks this performs.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, options: OpenOptions) -> Result<()> {
        if self.state.is_some() {
            return Err(Error::AlreadyOpen);
        }
        let path = path.as_ref();

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let adjusted_max = fsadapter::adjusted_max_size(dir, options.requested_max_size);
        if adjusted_max == 0 {
            return Err(Error::NoSpace);
        }

        if options.replica_mode == ReplicaMode::Swap {
            let tmp_path = swap_tmp_path(path);
            match fs::remove_file(&tmp_path) {
                Ok(()) => warn!("removed leftover swap file {}", tmp_path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        let mut file = open_primary_file(path, &options)?;
        if options.writable {
            file.try_lock_exclusive().map_err(Error::Io)?;
        } else {
            file.try_lock_shared().map_err(Error::Io)?;
        }

        let length = file.metadata().map_err(Error::Io)?.len() as usize;
        let is_new = length == 0;
        if is_new && !(options.create || options.truncate) {
            return Err(Error::NotFound);
        }

        let mut buffer = Buffer::with_max_size(adjusted_max as usize);
        let content_len;
        if is_new {
            buffer.insert_bytes(0, record::FILE_HEADER_SIZE)?;
            FileHeader::new_empty().encode(buffer.as_mut_slice());
            content_len = record::FILE_HEADER_SIZE;
            debug!("created new store image at {}", path.display());
        } else {
            if length < record::FILE_HEADER_SIZE {
                return Err(Error::OutOfRange);
            }
            buffer.insert_bytes(0, length)?;
            file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
            file.read_exact(buffer.as_mut_slice()).map_err(Error::Io)?;

            let validated = validate::validate(buffer.as_slice(), length);
            if validated == 0 {
                return Err(Error::InvalidArgument("store image failed format validation"));
            }
            content_len = validated;

            if content_len < length && options.writable && options.replica_mode == ReplicaMode::InPlace {
                warn!(
                    "truncating {} from {} to {} bytes left over from an interrupted commit",
                    path.display(),
                    length,
                    content_len
                );
                file.set_len(content_len as u64).map_err(Error::Io)?;
                file.sync_all().map_err(Error::Io)?;
            }
            buffer.set_len(content_len);
        }

        self.state = Some(OpenState {
            file,
            path: path.to_path_buf(),
            writable: options.writable,
            replica_mode: options.replica_mode,
            kvp: Kvp::new(buffer),
        });
        Ok(())
    }

    /// Flushes the in-memory image to storage. In swap mode, success
    /// closes the store (see [`ReplicaMode::Swap`]).
    pub fn commit(&mut self) -> Result<()> {
        let state = self.state.as_mut().ok_or(Error::InvalidArgument("store is not open"))?;
        if !state.writable {
            return Err(Error::InvalidArgument("store was not opened writable"));
        }

        let end = state.kvp.buffer().len();
        let crc = crc::checksum(&state.kvp.buffer().as_slice()[record::FILE_HEADER_SIZE..end]);
        let mut header = FileHeader::decode(state.kvp.buffer().as_slice());
        header.file_size = end as u32;
        header.crc = crc;
        header.encode(state.kvp.buffer_mut().as_mut_slice());

        match state.replica_mode {
            ReplicaMode::InPlace => {
                state.file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
                state.file.write_all(state.kvp.buffer().as_slice()).map_err(Error::Io)?;
                state.file.set_len(end as u64).map_err(Error::Io)?;
                state.file.sync_all().map_err(Error::Io)?;
                debug!("committed {} bytes in place to {}", end, state.path.display());
                Ok(())
            }
            ReplicaMode::Swap => {
                let tmp_path = swap_tmp_path(&state.path);
                let mut tmp_file = File::create(&tmp_path).map_err(Error::Io)?;
                tmp_file.write_all(state.kvp.buffer().as_slice()).map_err(Error::Io)?;
                tmp_file.set_len(end as u64).map_err(Error::Io)?;
                tmp_file.sync_all().map_err(Error::Io)?;
                drop(tmp_file);
                fs::rename(&tmp_path, &state.path).map_err(Error::Io)?;
                debug!("committed {} bytes via swap to {}", end, state.path.display());
                self.close();
                Ok(())
            }
        }
    }

    /// Releases the file lock, the path, and the in-memory buffer. A
    /// closed store is reusable via [`Store::open`].
    pub fn close(&mut self) {
        if let Some(state) = self.state.take() {
            let _ = FileExt::unlock(&state.file);
        }
    }

    pub fn kvp(&self) -> Result<&Kvp> {
        Ok(&self.state.as_ref().ok_or(Error::InvalidArgument("store is not open"))?.kvp)
    }

    pub fn kvp_mut(&mut self) -> Result<&mut Kvp> {
        Ok(&mut self.state.as_mut().ok_or(Error::InvalidArgument("store is not open"))?.kvp)
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}

fn swap_tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn open_primary_file(path: &Path, options: &OpenOptions) -> Result<File> {
    let mut os_opts = fs::OpenOptions::new();
    os_opts.read(true).write(options.writable).create(options.create).truncate(options.truncate);
    match os_opts.open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_without_create_on_missing_file_fails_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut store = Store::new();
        let err = store
            .open(&path, OpenOptions::new().max_size(8192))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn open_new_then_commit_writes_bare_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut store = Store::new();
        store
            .open(
                &path,
                OpenOptions::new().writable(true).create(true).max_size(8192),
            )
            .unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        store.commit().unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), record::FILE_HEADER_SIZE);
        assert_eq!(bytes[0..4], [0xFB, 0xFF, 0x0E, 0x00]);
        assert_eq!(bytes[4], 0xC6);
        assert_eq!(bytes[5], 0x00);
        assert_eq!(bytes[6..10], [0x0E, 0x00, 0x00, 0x00]);
        assert_eq!(bytes[10..14], [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn already_open_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut store = Store::new();
        store
            .open(&path, OpenOptions::new().writable(true).create(true).max_size(8192))
            .unwrap();
        let err = store
            .open(&path, OpenOptions::new().writable(true).create(true).max_size(8192))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyOpen));
    }

    #[test]
    fn round_trip_through_commit_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let mut store = Store::new();
            store
                .open(&path, OpenOptions::new().writable(true).create(true).max_size(8192))
                .unwrap();
            let kvp = store.kvp_mut().unwrap();
            let pos = kvp.insert(kvp.end(), 189, 9).unwrap();
            kvp.write_value(
                pos,
                0,
                &[0x94, 0xA9, 0xBE, 0xB0, 0x57, 0xE7, 0x71, 0xEE, 0x1E],
            )
            .unwrap();
            store.commit().unwrap();
        }
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), record::FILE_HEADER_SIZE + 4 + 9);
        assert_eq!(
            bytes[record::FILE_HEADER_SIZE..record::FILE_HEADER_SIZE + 4],
            [0xBD, 0x00, 0x0D, 0x00]
        );

        let mut store = Store::new();
        store
            .open(&path, OpenOptions::new().writable(true).max_size(8192))
            .unwrap();
        let kvp = store.kvp().unwrap();
        let pos = kvp.try_get(189).unwrap();
        assert_eq!(
            kvp.value_at(pos),
            &[0x94, 0xA9, 0xBE, 0xB0, 0x57, 0xE7, 0x71, 0xEE, 0x1E]
        );
    }

    #[test]
    fn swap_commit_closes_the_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let mut store = Store::new();
        store
            .open(
                &path,
                OpenOptions::new()
                    .writable(true)
                    .create(true)
                    .replica_mode(ReplicaMode::Swap)
                    .max_size(8192),
            )
            .unwrap();
        store.commit().unwrap();
        assert!(!store.is_open());
        assert!(fs::metadata(&path).unwrap().len() >= record::FILE_HEADER_SIZE as u64);
    }

    #[test]
    fn leftover_tmp_sibling_is_removed_before_any_primary_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        let tmp_path = swap_tmp_path(&path);
        {
            let mut store = Store::new();
            store
                .open(
                    &path,
                    OpenOptions::new()
                        .writable(true)
                        .create(true)
                        .replica_mode(ReplicaMode::Swap)
                        .max_size(8192),
                )
                .unwrap();
            store.commit().unwrap();
        }
        fs::write(&tmp_path, b"stale swap contents").unwrap();
        assert!(tmp_path.exists());

        let mut store = Store::new();
        store
            .open(
                &path,
                OpenOptions::new().replica_mode(ReplicaMode::Swap).max_size(8192),
            )
            .unwrap();
        assert!(!tmp_path.exists());
    }

    #[test]
    fn crash_recovery_truncates_trailing_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let mut store = Store::new();
            store
                .open(&path, OpenOptions::new().writable(true).create(true).max_size(8192))
                .unwrap();
            store.commit().unwrap();
        }
        let valid_len = fs::metadata(&path).unwrap().len();
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0, 0, 0, 0]).unwrap();
        drop(file);
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len + 4);

        let mut store = Store::new();
        store
            .open(&path, OpenOptions::new().writable(true).max_size(8192))
            .unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
    }
}
