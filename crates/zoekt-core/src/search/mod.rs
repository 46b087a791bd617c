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

//! Shard set and concurrent query coordination.

mod coordinator;
mod shard_set;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use shard_set::ShardSet;

use crate::error::ShardError;
use crate::query::CompiledQuery;
use crate::stats::Stats;
use crate::types::FileMatch;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something the coordinator can dispatch a query unit to. Implemented by
/// [`crate::Shard`]; tests plug in their own.
pub trait Searchable: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate `query` against this shard. Panics and errors are both
    /// treated by the coordinator as a crash of this unit.
    fn search(&self, query: &CompiledQuery, opts: &SearchOptions) -> Result<ShardResult, ShardError>;
}

/// One unit's contribution.
#[derive(Debug, Clone, Default)]
pub struct ShardResult {
    pub files: Vec<FileMatch>,
    pub stats: Stats,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of files returned; 0 means unlimited.
    pub num: usize,
    /// Wall-clock budget. Units still running when it expires are abandoned.
    pub max_wall_time: Option<Duration>,
    /// Stop scanning a shard once it produced this many line matches; 0
    /// means no cap.
    pub shard_max_match_count: usize,
    pub debug_score: bool,
    /// Trim fragment context to this many characters.
    pub max_fragment_chars: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            num: 50,
            max_wall_time: Some(Duration::from_secs(10)),
            shard_max_match_count: 0,
            debug_score: false,
            max_fragment_chars: None,
        }
    }
}

/// Aggregated response for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResult {
    pub files: Vec<FileMatch>,
    pub stats: Stats,
}

/// Result budget for a "show more" request following one with `num`.
pub fn next_page_num(num: usize) -> usize {
    num.saturating_mul(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_more_triples_budget() {
        assert_eq!(next_page_num(50), 150);
        assert_eq!(next_page_num(usize::MAX), usize::MAX);
    }
}
