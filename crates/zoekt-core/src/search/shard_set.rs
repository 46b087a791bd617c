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

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::Searchable;
use crate::shard::{Shard, SHARD_EXTENSION};

/// The shards currently served, keyed by name.
///
/// Queries take a snapshot of the `Arc`s, so swapping or removing an entry
/// never disturbs a query already running against the old shard. The old
/// shard is closed when its last `Arc` goes away.
#[derive(Default)]
pub struct ShardSet {
    shards: RwLock<BTreeMap<String, Arc<dyn Searchable>>>,
}

impl ShardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the shard stored under its name, returning the
    /// previous one.
    pub fn insert(&self, shard: Arc<dyn Searchable>) -> Option<Arc<dyn Searchable>> {
        let name = shard.name().to_string();
        self.shards.write().insert(name, shard)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Searchable>> {
        self.shards.write().remove(name)
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn Searchable>> {
        self.shards.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.shards.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }

    /// Open every `*.zoekt` file directly under `dir`. Files that fail to
    /// open are logged and left out. Returns the number of shards loaded.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> std::io::Result<usize> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|x| x == SHARD_EXTENSION))
            .collect();
        paths.sort();
        let mut loaded = 0;
        for path in paths {
            match Shard::open(&path) {
                Ok(shard) => {
                    self.insert(Arc::new(shard));
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable shard"),
            }
        }
        info!(dir = %dir.display(), loaded, "loaded shards");
        Ok(loaded)
    }
}

impl std::fmt::Debug for ShardSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardSet").field("shards", &self.names()).finish()
    }
}
