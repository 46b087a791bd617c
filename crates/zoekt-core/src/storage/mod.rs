// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
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

//! Shard storage access layer.
//!
//! Everything above this module reads shard bytes through [`IndexFile`]; only
//! the implementations here know how the bytes get into memory.

mod mmap;

pub use mmap::MmapIndexFile;

use crate::error::StorageError;
use std::ops::Range;

/// Files at or above this many bytes cannot be opened: the format stores
/// offsets and lengths as u32.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Read-only, random-access view of one finalized shard file.
pub trait IndexFile: Send + Sync + std::fmt::Debug {
    /// Borrow `sz` bytes starting at `off`. The view is tied to `&self`, so
    /// it cannot outlive a later `close`.
    fn read(&self, off: u32, sz: u32) -> Result<&[u8], StorageError>;

    fn name(&self) -> &str;

    /// Size in bytes recorded when the file was opened.
    fn size(&self) -> u32;

    /// Release the underlying resources. Calling it again is a no-op.
    fn close(&mut self);
}

/// Validate `[off, off+sz)` against `size`, catching u32 overflow of the end
/// before comparing.
pub(crate) fn checked_range(
    name: &str,
    off: u32,
    sz: u32,
    size: u32,
) -> Result<Range<usize>, StorageError> {
    match off.checked_add(sz) {
        Some(end) if end <= size => Ok(off as usize..end as usize),
        _ => Err(StorageError::OutOfBounds {
            name: name.to_string(),
            off,
            sz,
            size,
        }),
    }
}
