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

//! Error types, one enum per layer.

use thiserror::Error;

/// Errors from the shard storage access layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("file {name} too large: {size}")]
    SizeExceeded { name: String, size: u64 },

    #[error("out of bounds: {off}+{sz}, len {size}, name {name}")]
    OutOfBounds {
        name: String,
        off: u32,
        sz: u32,
        size: u32,
    },

    #[error("{0} is closed")]
    Closed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors decoding a shard file.
#[derive(Error, Debug)]
pub enum ShardError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("bad header in {name}: magic={magic:#x} version={version}")]
    BadHeader {
        name: String,
        magic: u32,
        version: u32,
    },

    #[error("shard {name} corrupted: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("document {doc} out of range (shard has {count})")]
    NoSuchDocument { doc: u32, count: u32 },
}

impl ShardError {
    pub(crate) fn corrupt(name: &str, reason: impl Into<String>) -> Self {
        ShardError::Corrupt {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors from building shards.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build IO failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("shard {path} would be {size} bytes, above the 4GiB format limit")]
    ShardTooLarge { path: String, size: u64 },

    #[error("shard {0} is already being written by another builder")]
    ShardLocked(String),

    #[error("invalid large_files pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("{0} too long for the shard format")]
    FieldTooLong(String),

    #[error("build already failed: {0}")]
    AlreadyFailed(String),

    #[error("builder already finished")]
    Finished,
}

/// Query-level failures. Per-shard crashes never show up here.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("no shards available")]
    NoShards,

    #[error("all {crashes} shards crashed")]
    AllShardsFailed { crashes: u64 },

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] regex::Error),

    #[error("query slot unavailable: coordinator shut down")]
    Closed,
}

/// Errors loading an index configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
