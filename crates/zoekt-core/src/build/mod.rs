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

//! Turns a stream of documents into finalized shard files.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::shard::{shard_file_name, ShardWriter};
use crate::types::{Document, SkipCause};

pub use crate::types::RepositoryDescription;

pub const DEFAULT_SIZE_MAX: usize = 2 << 20;
pub const DEFAULT_SHARD_MAX: usize = 100 << 20;

#[derive(Debug, Clone)]
pub struct Options {
    /// Directory shards are written to; created when missing.
    pub index_dir: PathBuf,
    /// Files larger than this are recorded as skipped.
    pub size_max: usize,
    /// Glob patterns exempt from `size_max` and binary detection.
    pub large_files: Vec<String>,
    pub repository: RepositoryDescription,
    /// Threads used for trigram extraction; `None` picks a default.
    pub parallelism: Option<usize>,
    /// Content bytes per shard before a new one is started.
    pub shard_max: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            index_dir: crate::config::default_index_dir(),
            size_max: DEFAULT_SIZE_MAX,
            large_files: Vec::new(),
            repository: RepositoryDescription::default(),
            parallelism: None,
            shard_max: DEFAULT_SHARD_MAX,
        }
    }
}

#[derive(Debug)]
enum State {
    Open,
    Finished,
    Failed(String),
}

struct TempShard {
    tmp: PathBuf,
    dest: PathBuf,
}

/// Single-writer shard builder for one repository.
///
/// Shards are written to `{name}.tmp` first and renamed into place by
/// [`Builder::finish`]. Dropping an unfinished builder removes its temp files.
pub struct Builder {
    opts: Options,
    large_files: GlobSet,
    pool: Option<ThreadPool>,
    pending: ShardWriter,
    temps: Vec<TempShard>,
    finalized: Vec<PathBuf>,
    state: State,
}

impl Builder {
    pub fn new(opts: Options) -> Result<Self, BuildError> {
        fs::create_dir_all(&opts.index_dir)?;
        let mut globs = GlobSetBuilder::new();
        for pat in &opts.large_files {
            globs.add(Glob::new(pat)?);
        }
        let large_files = globs.build()?;

        let avail = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let threads = opts.parallelism.unwrap_or_else(|| avail.min(8)).max(1);
        let pool = match ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "could not build indexing pool, using the global one");
                None
            }
        };
        debug!(repo = %opts.repository.name, dir = %opts.index_dir.display(), threads, "builder ready");
        Ok(Self {
            pending: ShardWriter::new(opts.repository.clone()),
            opts,
            large_files,
            pool,
            temps: Vec::new(),
            finalized: Vec::new(),
            state: State::Open,
        })
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Register a document as is. Skip markers are stored without content.
    pub fn add(&mut self, doc: Document) -> Result<(), BuildError> {
        self.check_open()?;
        self.pending.add(doc);
        if self.pending.content_size() >= self.opts.shard_max {
            self.flush()?;
        }
        Ok(())
    }

    /// Wrap `content` into a document, turning oversized or binary files
    /// into skip markers unless `name` matches a `large_files` pattern.
    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Result<(), BuildError> {
        let name = name.into();
        let content = content.into();
        let doc = match self.skip_cause(&name, &content) {
            Some(cause) => {
                debug!(file = %name, %cause, "skipping");
                Document::skipped(name, cause.to_string())
            }
            None => Document::new(name, content),
        };
        self.add(doc)
    }

    /// Size check alone, so callers can skip reading files that would be
    /// dropped anyway.
    pub fn oversized(&self, name: &str, size: usize) -> Option<SkipCause> {
        if size > self.opts.size_max && !self.large_files.is_match(name) {
            return Some(SkipCause::DocumentTooLarge {
                size,
                limit: self.opts.size_max,
            });
        }
        None
    }

    fn skip_cause(&self, name: &str, content: &[u8]) -> Option<SkipCause> {
        if self.large_files.is_match(name) {
            return None;
        }
        if let Some(cause) = self.oversized(name, content.len()) {
            return Some(cause);
        }
        if content.contains(&0) {
            return Some(SkipCause::Binary);
        }
        None
    }

    /// Write pending documents and move every shard into place. Only the
    /// first call does work; later calls repeat its outcome.
    pub fn finish(&mut self) -> Result<(), BuildError> {
        match &self.state {
            State::Finished => return Ok(()),
            State::Failed(msg) => return Err(BuildError::AlreadyFailed(msg.clone())),
            State::Open => {}
        }
        let res = self.finish_inner();
        self.state = match &res {
            Ok(()) => State::Finished,
            Err(e) => State::Failed(e.to_string()),
        };
        res
    }

    fn finish_inner(&mut self) -> Result<(), BuildError> {
        // An empty repository still gets a shard so it shows up in searches.
        if !self.pending.is_empty() || self.temps.is_empty() {
            self.write_pending()?;
        }
        for t in std::mem::take(&mut self.temps) {
            if let Err(e) = fs::rename(&t.tmp, &t.dest) {
                self.temps.push(t);
                return Err(e.into());
            }
            self.finalized.push(t.dest);
        }
        self.remove_stale_shards();
        info!(
            repo = %self.opts.repository.name,
            shards = self.finalized.len(),
            "finished build"
        );
        Ok(())
    }

    /// Finalized shard files; empty until [`Builder::finish`] succeeds.
    pub fn shard_paths(&self) -> &[PathBuf] {
        &self.finalized
    }

    fn check_open(&self) -> Result<(), BuildError> {
        match &self.state {
            State::Open => Ok(()),
            State::Finished => Err(BuildError::Finished),
            State::Failed(msg) => Err(BuildError::AlreadyFailed(msg.clone())),
        }
    }

    fn flush(&mut self) -> Result<(), BuildError> {
        let res = self.write_pending();
        if let Err(e) = &res {
            self.state = State::Failed(e.to_string());
        }
        res
    }

    fn write_pending(&mut self) -> Result<(), BuildError> {
        let dest = self
            .opts
            .index_dir
            .join(shard_file_name(&self.opts.repository.name, self.temps.len()));
        let tmp = tmp_path(&dest);
        let mut f = match OpenOptions::new().write(true).create_new(true).open(&tmp) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(BuildError::ShardLocked(tmp.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        self.temps.push(TempShard {
            tmp: tmp.clone(),
            dest,
        });
        let writer = std::mem::replace(&mut self.pending, ShardWriter::new(self.opts.repository.clone()));
        let bytes = writer.encode(self.pool.as_ref())?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        info!(shard = %tmp.display(), docs = writer.len(), bytes = bytes.len(), "wrote shard");
        Ok(())
    }

    /// Shards of this repository numbered past the ones just written are
    /// left over from an earlier, larger build.
    fn remove_stale_shards(&self) {
        let mut n = self.finalized.len();
        loop {
            let stale = self
                .opts
                .index_dir
                .join(shard_file_name(&self.opts.repository.name, n));
            if !stale.exists() {
                break;
            }
            match fs::remove_file(&stale) {
                Ok(()) => info!(shard = %stale.display(), "removed stale shard"),
                Err(e) => {
                    warn!(shard = %stale.display(), error = %e, "could not remove stale shard");
                    break;
                }
            }
            n += 1;
        }
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        for t in &self.temps {
            match fs::remove_file(&t.tmp) {
                Ok(()) => debug!(tmp = %t.tmp.display(), "removed temp shard"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(tmp = %t.tmp.display(), error = %e, "could not remove temp shard"),
            }
        }
    }
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut s = dest.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}
