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

//! Storage-and-query core of a zoekt-style code search engine.
//!
//! Shards are immutable files produced by [`Builder`], opened through the
//! [`storage`] layer and searched concurrently by the [`Coordinator`].

pub mod build;
pub mod config;
pub mod error;
pub mod query;
pub mod search;
pub mod shard;
pub mod stats;
pub mod storage;
pub mod trigram;
pub mod types;

pub use crate::build::{Builder, Options, RepositoryDescription};
pub use crate::error::{BuildError, ConfigError, SearchError, ShardError, StorageError};
pub use crate::query::Query;
pub use crate::search::{
    next_page_num, Coordinator, CoordinatorConfig, SearchOptions, SearchResult, Searchable,
    ShardResult, ShardSet,
};
pub use crate::shard::{Shard, ShardWriter};
pub use crate::stats::Stats;
pub use crate::storage::{IndexFile, MmapIndexFile};
pub use crate::types::{Document, FileMatch, Fragment, LineMatch, SkipCause};
