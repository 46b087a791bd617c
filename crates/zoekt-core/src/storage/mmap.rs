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

use super::{checked_range, IndexFile, MAX_FILE_SIZE};
use crate::error::StorageError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// Shard file mapped read-only into the address space.
///
/// The mapping is owned exclusively; the file descriptor it came from is
/// released as soon as the mapping exists.
pub struct MmapIndexFile {
    name: String,
    size: u32,
    data: Option<Mmap>,
}

impl MmapIndexFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::new(file, path.display().to_string())
    }

    /// Take ownership of `file` and map it. The caller must not use the
    /// descriptor afterwards.
    pub fn new(file: File, name: impl Into<String>) -> Result<Self, StorageError> {
        let name = name.into();
        let len = file.metadata()?.len();
        if len >= MAX_FILE_SIZE {
            return Err(StorageError::SizeExceeded { name, size: len });
        }
        // SAFETY: shards are never modified after finalize; replacements are
        // written to a new file and renamed over the old path.
        let data = unsafe { Mmap::map(&file)? };
        drop(file);
        if data.len() as u64 >= MAX_FILE_SIZE {
            return Err(StorageError::SizeExceeded {
                name,
                size: data.len() as u64,
            });
        }
        #[cfg(unix)]
        if !data.is_empty() {
            if let Err(e) = data.advise(memmap2::Advice::Random) {
                warn!("madvise failed for {}: {}", name, e);
            }
        }
        let size = data.len() as u32;
        debug!(name = %name, size, "mapped index file");
        Ok(Self {
            name,
            size,
            data: Some(data),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }
}

impl IndexFile for MmapIndexFile {
    fn read(&self, off: u32, sz: u32) -> Result<&[u8], StorageError> {
        let range = checked_range(&self.name, off, sz, self.size)?;
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| StorageError::Closed(self.name.clone()))?;
        data.get(range).ok_or(StorageError::OutOfBounds {
            name: self.name.clone(),
            off,
            sz,
            size: self.size,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn close(&mut self) {
        match self.data.take() {
            // memmap2 unmaps on drop and swallows munmap errors
            Some(mmap) => {
                drop(mmap);
                debug!(name = %self.name, "unmapped index file");
            }
            None => warn!("index file {} closed more than once", self.name),
        }
    }
}

impl Drop for MmapIndexFile {
    fn drop(&mut self) {
        if self.data.is_some() {
            self.close();
        }
    }
}

impl std::fmt::Debug for MmapIndexFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapIndexFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("closed", &self.data.is_none())
            .finish()
    }
}
