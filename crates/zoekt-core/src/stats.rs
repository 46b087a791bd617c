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

//! Execution statistics and their merge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Counters reported by one shard evaluation or, merged, by a whole query.
///
/// Every field except `duration` and `wait` is additive. Those two are wall
/// clock spans owned by the coordinator and are never summed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stats {
    /// Line matches, including those in files beyond the result budget.
    pub match_count: u64,
    /// Matching files, including those beyond the result budget.
    pub file_count: u64,
    pub documents: u64,
    pub repos: u64,
    pub content_bytes: u64,
    pub index_bytes: u64,
    pub content_bytes_loaded: u64,
    pub index_bytes_loaded: u64,
    pub ngram_matches: u64,
    pub files_considered: u64,
    pub files_loaded: u64,
    pub files_skipped: u64,
    pub shards_scanned: u64,
    pub shards_skipped: u64,
    pub shards_skipped_filter: u64,
    pub crashes: u64,
    pub duration: Duration,
    pub wait: Duration,
}

impl Stats {
    /// Add `other`'s counters into `self`. Leaves `duration`/`wait` alone.
    pub fn add(&mut self, other: &Stats) {
        self.match_count += other.match_count;
        self.file_count += other.file_count;
        self.documents += other.documents;
        self.repos += other.repos;
        self.content_bytes += other.content_bytes;
        self.index_bytes += other.index_bytes;
        self.content_bytes_loaded += other.content_bytes_loaded;
        self.index_bytes_loaded += other.index_bytes_loaded;
        self.ngram_matches += other.ngram_matches;
        self.files_considered += other.files_considered;
        self.files_loaded += other.files_loaded;
        self.files_skipped += other.files_skipped;
        self.shards_scanned += other.shards_scanned;
        self.shards_skipped += other.shards_skipped;
        self.shards_skipped_filter += other.shards_skipped_filter;
        self.crashes += other.crashes;
    }

    pub fn merge<'a>(units: impl IntoIterator<Item = &'a Stats>) -> Stats {
        let mut out = Stats::default();
        for s in units {
            out.add(s);
        }
        out
    }

    /// Stats for a unit that crashed: the shard counts as skipped and
    /// nothing else is attributed to it.
    pub fn crashed() -> Stats {
        Stats {
            crashes: 1,
            shards_skipped: 1,
            ..Default::default()
        }
    }

    /// True when some shards or files were not fully searched.
    pub fn is_partial(&self) -> bool {
        self.crashes > 0 || self.shards_skipped > 0 || self.files_skipped > 0
    }
}

/// Format a count with a metric suffix, e.g. `1536` -> `1.5k`.
pub fn human_unit(n: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1_000_000_000_000, "T"),
        (1_000_000_000, "G"),
        (1_000_000, "M"),
        (1_000, "k"),
    ];
    for (scale, suffix) in UNITS {
        if n >= scale {
            return format!("{:.1}{}", n as f64 / scale as f64, suffix);
        }
    }
    n.to_string()
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matches in {} files, took {:?}",
            self.match_count, self.file_count, self.duration
        )?;
        if !self.wait.is_zero() {
            write!(f, " (queued: {:?})", self.wait)?;
        }
        write!(
            f,
            " for {}B index data, {} ngram matches, {} docs considered, {} docs ({}B) loaded, {} shards scanned, {} shards filtered",
            human_unit(self.index_bytes_loaded),
            self.ngram_matches,
            self.files_considered,
            self.files_loaded,
            human_unit(self.content_bytes_loaded),
            self.shards_scanned,
            self.shards_skipped_filter,
        )?;
        if self.files_skipped > 0 || self.shards_skipped > 0 {
            write!(
                f,
                ", {} docs skipped, {} shards skipped",
                self.files_skipped, self.shards_skipped
            )?;
        }
        if self.crashes > 0 {
            write!(f, ", {} shards crashed", self.crashes)?;
        }
        Ok(())
    }
}
