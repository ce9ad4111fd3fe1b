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

//! Computes a usable maximum image size by subtracting the per-block
//! filesystem metadata overhead a requested size would incur, so the
//! store never asks the buffer to grow past what the filesystem could
//! actually hold.

use std::path::Path;

/// Per-block overhead, in bytes, modelling inode-pointer bookkeeping. This
/// constant is fixed by the format, not discovered at runtime.
const POINTER_OVERHEAD_PER_BLOCK: u64 = 16;

/// Returns the requested size minus the estimated filesystem bookkeeping
/// overhead for a file of that size, or `0` if `requested <= 16` or the
/// containing directory's block size cannot be determined.
pub fn adjusted_max_size(dir: &Path, requested: u32) -> u32 {
    if requested <= 16 {
        return 0;
    }
    let block_size = match fs2::allocation_granularity(dir) {
        Ok(size) if size > 0 => size,
        _ => return 0,
    };
    let requested = u64::from(requested);
    let blocks = (requested + block_size - 1) / block_size;
    let overhead = blocks * POINTER_OVERHEAD_PER_BLOCK;
    requested.saturating_sub(overhead) as u32
}
