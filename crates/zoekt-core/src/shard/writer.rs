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

use rayon::prelude::*;
use rayon::ThreadPool;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

use super::codec::{put_str, put_u32, write_var_u32};
use super::{HEADER_SIZE, MAGIC, VERSION};
use crate::error::BuildError;
use crate::storage::MAX_FILE_SIZE;
use crate::trigram::trigram_set;
use crate::types::{language_for, Document, RepositoryDescription};

/// Accumulates documents for one shard and serializes them.
pub struct ShardWriter {
    repo: RepositoryDescription,
    docs: Vec<Document>,
    content_size: usize,
}

struct Analyzed {
    trigrams: Vec<[u8; 3]>,
    checksum: [u8; 32],
}

impl ShardWriter {
    pub fn new(repo: RepositoryDescription) -> Self {
        Self {
            repo,
            docs: Vec::new(),
            content_size: 0,
        }
    }

    /// Append a document. Skip markers lose any content they carry.
    pub fn add(&mut self, mut doc: Document) {
        if doc.is_skipped() {
            doc.content.clear();
        }
        if doc.language.is_none() {
            doc.language = language_for(&doc.name).map(str::to_string);
        }
        self.content_size += doc.content.len();
        self.docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Content bytes buffered so far.
    pub fn content_size(&self) -> usize {
        self.content_size
    }

    /// Serialize the shard. Trigram extraction and hashing run on `pool`
    /// when given, otherwise on rayon's global pool.
    pub fn encode(&self, pool: Option<&ThreadPool>) -> Result<Vec<u8>, BuildError> {
        let started = Instant::now();
        let analyze = || -> Vec<Analyzed> {
            self.docs
                .par_iter()
                .map(|d| Analyzed {
                    trigrams: trigram_set(&d.content),
                    checksum: Sha256::digest(&d.content).into(),
                })
                .collect()
        };
        let analyzed = match pool {
            Some(p) => p.install(analyze),
            None => analyze(),
        };

        let mut postings: BTreeMap<[u8; 3], Vec<u32>> = BTreeMap::new();
        for (doc, a) in analyzed.iter().enumerate() {
            for tri in &a.trigrams {
                postings.entry(*tri).or_default().push(doc as u32);
            }
        }

        let too_large = |size: u64| BuildError::ShardTooLarge {
            path: self.repo.name.clone(),
            size,
        };
        let doc_count = u32::try_from(self.docs.len()).map_err(|_| too_large(u64::MAX))?;

        let mut buf: Vec<u8> = Vec::with_capacity(self.content_size + 4096);
        buf.resize(HEADER_SIZE as usize, 0);

        let meta_off = buf.len();
        self.put_field(&mut buf, &self.repo.name, "repository name")?;
        self.put_field(&mut buf, &self.repo.source, "repository source")?;
        let n_branches = u16::try_from(self.repo.branches.len())
            .map_err(|_| BuildError::FieldTooLong("branch list".into()))?;
        buf.extend_from_slice(&n_branches.to_le_bytes());
        for b in &self.repo.branches {
            self.put_field(&mut buf, b, "branch name")?;
        }

        let docs_off = buf.len();
        let mut rel: u64 = 0;
        for (d, a) in self.docs.iter().zip(&analyzed) {
            self.put_field(&mut buf, &d.name, "document name")?;
            self.put_field(&mut buf, d.skip_reason.as_deref().unwrap_or(""), "skip reason")?;
            self.put_field(&mut buf, d.language.as_deref().unwrap_or(""), "language")?;
            let len = d.content.len() as u64;
            if rel + len >= MAX_FILE_SIZE {
                return Err(too_large(rel + len));
            }
            put_u32(&mut buf, rel as u32);
            put_u32(&mut buf, len as u32);
            buf.extend_from_slice(&a.checksum);
            rel += len;
        }

        let content_off = buf.len();
        if content_off as u64 + rel >= MAX_FILE_SIZE {
            return Err(too_large(content_off as u64 + rel));
        }
        for d in &self.docs {
            buf.extend_from_slice(&d.content);
        }

        let postings_off = buf.len();
        put_u32(&mut buf, postings.len() as u32);
        let mut list: Vec<u8> = Vec::new();
        for (tri, docs) in &postings {
            list.clear();
            let mut prev = 0u32;
            for d in docs {
                write_var_u32(&mut list, d - prev);
                prev = *d;
            }
            buf.extend_from_slice(tri);
            put_u32(&mut buf, docs.len() as u32);
            put_u32(&mut buf, list.len() as u32);
            buf.extend_from_slice(&list);
            if buf.len() as u64 >= MAX_FILE_SIZE {
                return Err(too_large(buf.len() as u64));
            }
        }
        let file_size = checked_file_size(buf.len()).ok_or_else(|| too_large(buf.len() as u64))?;
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        for v in [
            MAGIC,
            VERSION,
            doc_count,
            meta_off as u32,
            docs_off as u32,
            content_off as u32,
            postings_off as u32,
            file_size,
        ] {
            put_u32(&mut header, v);
        }
        buf[..HEADER_SIZE as usize].copy_from_slice(&header);

        debug!(
            repo = %self.repo.name,
            docs = self.docs.len(),
            terms = postings.len(),
            bytes = buf.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "encoded shard"
        );
        Ok(buf)
    }

    /// Encode and write the shard to `path`, syncing it to disk.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<u64, BuildError> {
        let bytes = self.encode(None)?;
        let mut f = File::create(path.as_ref())?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        Ok(bytes.len() as u64)
    }

    fn put_field(&self, buf: &mut Vec<u8>, s: &str, what: &str) -> Result<(), BuildError> {
        put_str(buf, s).ok_or_else(|| BuildError::FieldTooLong(format!("{} {:?}", what, truncate(s))))
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(40) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Length of an encoded shard as stored in its header, if it is openable.
fn checked_file_size(len: usize) -> Option<u32> {
    u32::try_from(len).ok().filter(|n| (*n as u64) < MAX_FILE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_size_limit() {
        assert_eq!(checked_file_size(32), Some(32));
        assert_eq!(checked_file_size(u32::MAX as usize - 1), Some(u32::MAX - 1));
        assert_eq!(checked_file_size(u32::MAX as usize), None);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(checked_file_size(u32::MAX as usize + 5), None);
    }
}
