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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{SearchOptions, SearchResult, ShardResult, ShardSet};
use crate::error::SearchError;
use crate::query::{CompiledQuery, Query};
use crate::stats::Stats;
use crate::types::FileMatch;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Shard units evaluated at the same time, across all queries.
    pub parallelism: usize,
    /// Queries admitted at once; later ones wait for a slot.
    pub max_concurrent_queries: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let n = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            parallelism: n,
            max_concurrent_queries: n,
        }
    }
}

/// Fans a query out over every shard of a [`ShardSet`] and merges the
/// answers. Must be used from within a tokio runtime.
pub struct Coordinator {
    shards: Arc<ShardSet>,
    workers: Arc<Semaphore>,
    queries: Arc<Semaphore>,
}

enum Outcome {
    Done(ShardResult),
    Failed(String),
}

impl Coordinator {
    pub fn new(shards: Arc<ShardSet>, config: CoordinatorConfig) -> Self {
        Self {
            shards,
            workers: Arc::new(Semaphore::new(config.parallelism.max(1))),
            queries: Arc::new(Semaphore::new(config.max_concurrent_queries.max(1))),
        }
    }

    pub fn shard_set(&self) -> &Arc<ShardSet> {
        &self.shards
    }

    pub async fn search(&self, query: &Query, opts: &SearchOptions) -> Result<SearchResult, SearchError> {
        let started = Instant::now();
        let compiled = Arc::new(CompiledQuery::new(query)?);
        let _slot = self
            .queries
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SearchError::Closed)?;
        let wait = started.elapsed();
        let dispatched_at = Instant::now();

        let shards = self.shards.snapshot();
        if shards.is_empty() {
            return Err(SearchError::NoShards);
        }
        let deadline = opts
            .max_wall_time
            .map(|d| tokio::time::Instant::now() + d);
        let unit_opts = Arc::new(opts.clone());

        let mut units = JoinSet::new();
        for shard in shards {
            let workers = self.workers.clone();
            let q = compiled.clone();
            let o = unit_opts.clone();
            units.spawn(async move {
                let name = shard.name().to_string();
                let Ok(permit) = workers.acquire_owned().await else {
                    return (name, Outcome::Failed("worker pool closed".into()));
                };
                // The permit moves into the blocking task so an abandoned
                // unit keeps its worker until it really finishes.
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    shard.search(&q, &o)
                })
                .await;
                let outcome = match joined {
                    Ok(Ok(res)) => Outcome::Done(res),
                    Ok(Err(e)) => Outcome::Failed(e.to_string()),
                    Err(e) if e.is_panic() => Outcome::Failed("panicked".into()),
                    Err(e) => Outcome::Failed(e.to_string()),
                };
                (name, outcome)
            });
        }
        let dispatched = units.len();

        let mut unit_stats: Vec<Stats> = Vec::with_capacity(dispatched);
        let mut files: Vec<FileMatch> = Vec::new();
        let mut completed = 0usize;
        loop {
            let next = match deadline {
                Some(d) => match tokio::time::timeout_at(d, units.join_next()).await {
                    Ok(next) => next,
                    Err(_) => break,
                },
                None => units.join_next().await,
            };
            let Some(joined) = next else { break };
            completed += 1;
            match joined {
                Ok((_, Outcome::Done(res))) => {
                    unit_stats.push(res.stats);
                    files.extend(res.files);
                }
                Ok((name, Outcome::Failed(reason))) => {
                    warn!(shard = %name, %reason, "shard search crashed");
                    unit_stats.push(Stats::crashed());
                }
                Err(e) => {
                    warn!(error = %e, "shard unit crashed");
                    unit_stats.push(Stats::crashed());
                }
            }
        }

        let abandoned = (dispatched - completed) as u64;
        if abandoned > 0 {
            units.abort_all();
            warn!(query = %compiled, abandoned, "deadline exceeded, abandoning shards");
            unit_stats.push(Stats {
                shards_skipped: abandoned,
                ..Default::default()
            });
        }

        let mut stats = Stats::merge(&unit_stats);
        if stats.crashes == dispatched as u64 {
            return Err(SearchError::AllShardsFailed {
                crashes: stats.crashes,
            });
        }

        rank(&mut files);
        dedupe(&mut files);
        if opts.num > 0 {
            files.truncate(opts.num);
        }
        stats.duration = dispatched_at.elapsed();
        stats.wait = wait;
        debug!(query = %compiled, returned = files.len(), %stats, "search done");
        Ok(SearchResult { files, stats })
    }
}

/// Score descending, then repository, then file name.
fn rank(files: &mut [FileMatch]) {
    files.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
}

/// Later files with the same content point at the first one and drop their
/// matches.
fn dedupe(files: &mut [FileMatch]) {
    let mut canonical: HashMap<[u8; 32], String> = HashMap::new();
    for fm in files.iter_mut() {
        match canonical.get(&fm.checksum) {
            Some(id) => {
                fm.duplicate_id = Some(id.clone());
                fm.matches.clear();
            }
            None => {
                canonical.insert(fm.checksum, fm.result_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(repo: &str, name: &str, score: f64, checksum: u8) -> FileMatch {
        FileMatch {
            result_id: FileMatch::anchor(repo, name),
            repo: repo.into(),
            file_name: name.into(),
            score,
            checksum: [checksum; 32],
            ..Default::default()
        }
    }

    #[test]
    fn ties_break_on_repo_then_name() {
        let mut v = vec![
            file("b", "x", 1.0, 1),
            file("a", "y", 1.0, 2),
            file("a", "x", 1.0, 3),
            file("z", "z", 9.0, 4),
        ];
        rank(&mut v);
        let order: Vec<_> = v.iter().map(|f| f.result_id.as_str()).collect();
        assert_eq!(order, ["z:z", "a:x", "a:y", "b:x"]);
    }

    #[test]
    fn duplicates_point_at_earlier_result() {
        let mut v = vec![file("a", "f", 2.0, 7), file("b", "f", 1.0, 7)];
        v[1].matches.push(Default::default());
        dedupe(&mut v);
        assert!(v[0].duplicate_id.is_none());
        assert_eq!(v[1].duplicate_id.as_deref(), Some("a:f"));
        assert!(v[1].matches.is_empty());
    }
}
