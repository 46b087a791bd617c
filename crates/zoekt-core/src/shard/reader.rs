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
use std::path::Path;
use tracing::debug;

use super::codec::Cursor;
use super::{HEADER_SIZE, MAGIC, VERSION};
use crate::error::ShardError;
use crate::storage::{IndexFile, MmapIndexFile};
use crate::types::RepositoryDescription;

/// One document's entry in the shard's document table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub name: String,
    pub skip_reason: Option<String>,
    pub language: Option<String>,
    pub checksum: [u8; 32],
    content_off: u32,
    content_len: u32,
}

impl DocEntry {
    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }

    pub fn content_len(&self) -> u32 {
        self.content_len
    }
}

// Smallest encodings: three empty strings, offset, length and checksum for a
// document; trigram, doc count and length for a term.
const MIN_DOC_ENTRY: u32 = 3 * 2 + 4 + 4 + 32;
const MIN_TERM_ENTRY: u32 = 3 + 4 + 4;

#[derive(Clone, Copy, Debug)]
struct TermEntry {
    off: u32,
    len: u32,
    n_docs: u32,
}

/// Docs of one trigram plus the index bytes read to decode them.
pub(crate) struct Postings {
    pub(crate) docs: Vec<u32>,
    pub(crate) bytes_read: u64,
}

/// A finalized shard opened for reading. Immutable; share it behind an `Arc`.
#[derive(Debug)]
pub struct Shard {
    file: Box<dyn IndexFile>,
    repo: RepositoryDescription,
    docs: Vec<DocEntry>,
    terms: HashMap<[u8; 3], TermEntry>,
    content_bytes: u64,
}

impl Shard {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ShardError> {
        let file = MmapIndexFile::open(path)?;
        Self::from_index_file(Box::new(file))
    }

    /// Decode the shard's tables from `file`, which the shard then owns.
    pub fn from_index_file(file: Box<dyn IndexFile>) -> Result<Self, ShardError> {
        let name = file.name().to_string();
        if file.size() < HEADER_SIZE {
            return Err(ShardError::corrupt(&name, format!("file too small ({} bytes)", file.size())));
        }
        let mut h = Cursor::new(&name, file.read(0, HEADER_SIZE)?);
        let magic = h.u32("magic")?;
        let version = h.u32("version")?;
        if magic != MAGIC || version != VERSION {
            return Err(ShardError::BadHeader {
                name,
                magic,
                version,
            });
        }
        let doc_count = h.u32("doc_count")?;
        let meta_off = h.u32("meta_off")?;
        let docs_off = h.u32("docs_off")?;
        let content_off = h.u32("content_off")?;
        let postings_off = h.u32("postings_off")?;
        let file_size = h.u32("file_size")?;
        if file_size != file.size() {
            return Err(ShardError::corrupt(
                &name,
                format!("header says {} bytes, file has {}", file_size, file.size()),
            ));
        }
        let ordered = HEADER_SIZE <= meta_off
            && meta_off <= docs_off
            && docs_off <= content_off
            && content_off <= postings_off
            && postings_off <= file_size;
        if !ordered {
            return Err(ShardError::corrupt(&name, "section offsets out of order"));
        }

        let mut m = Cursor::new(&name, file.read(meta_off, docs_off - meta_off)?);
        let repo_name = m.str("repo name")?;
        let source = m.str("repo source")?;
        let n_branches = m.u16("branch count")?;
        let mut branches = Vec::with_capacity(n_branches as usize);
        for _ in 0..n_branches {
            branches.push(m.str("branch name")?);
        }
        let repo = RepositoryDescription {
            name: repo_name,
            source,
            branches,
        };

        let content_len = postings_off - content_off;
        if doc_count > (content_off - docs_off) / MIN_DOC_ENTRY {
            return Err(ShardError::corrupt(
                &name,
                format!("{} documents do not fit the document table", doc_count),
            ));
        }
        let mut d = Cursor::new(&name, file.read(docs_off, content_off - docs_off)?);
        let mut docs = Vec::with_capacity(doc_count as usize);
        let mut content_bytes = 0u64;
        for _ in 0..doc_count {
            let doc_name = d.str("document name")?;
            let skip = d.str("skip reason")?;
            let lang = d.str("language")?;
            let off = d.u32("content offset")?;
            let len = d.u32("content length")?;
            let mut checksum = [0u8; 32];
            checksum.copy_from_slice(d.bytes(32, "checksum")?);
            match off.checked_add(len) {
                Some(end) if end <= content_len => {}
                _ => {
                    return Err(ShardError::corrupt(
                        &name,
                        format!("content of {} outside the content section", doc_name),
                    ))
                }
            }
            content_bytes += len as u64;
            docs.push(DocEntry {
                name: doc_name,
                skip_reason: (!skip.is_empty()).then_some(skip),
                language: (!lang.is_empty()).then_some(lang),
                checksum,
                content_off: content_off + off,
                content_len: len,
            });
        }

        let postings = file.read(postings_off, file_size - postings_off)?;
        let mut p = Cursor::new(&name, postings);
        let term_count = p.u32("term count")?;
        if term_count > (file_size - postings_off) / MIN_TERM_ENTRY {
            return Err(ShardError::corrupt(
                &name,
                format!("{} terms do not fit the postings section", term_count),
            ));
        }
        let mut terms = HashMap::with_capacity(term_count as usize);
        for _ in 0..term_count {
            let b = p.bytes(3, "trigram")?;
            let tri = [b[0], b[1], b[2]];
            let n_docs = p.u32("posting doc count")?;
            let len = p.u32("posting length")?;
            // Every delta takes at least one byte.
            if n_docs > len {
                return Err(ShardError::corrupt(&name, "posting doc count exceeds its list"));
            }
            let off = postings_off + p.offset() as u32;
            p.bytes(len as usize, "posting list")?;
            terms.insert(tri, TermEntry { off, len, n_docs });
        }

        debug!(shard = %name, repo = %repo.name, docs = docs.len(), terms = terms.len(), "opened shard");
        Ok(Self {
            file,
            repo,
            docs,
            terms,
            content_bytes,
        })
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn repository(&self) -> &RepositoryDescription {
        &self.repo
    }

    pub fn documents(&self) -> &[DocEntry] {
        &self.docs
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Total file size.
    pub fn index_bytes(&self) -> u32 {
        self.file.size()
    }

    pub fn content_bytes(&self) -> u64 {
        self.content_bytes
    }

    /// Zero-copy content of document `doc`. Skipped documents have none.
    pub fn content(&self, doc: u32) -> Result<&[u8], ShardError> {
        let entry = self.docs.get(doc as usize).ok_or(ShardError::NoSuchDocument {
            doc,
            count: self.doc_count(),
        })?;
        Ok(self.file.read(entry.content_off, entry.content_len)?)
    }

    /// Sorted doc ids containing `tri`; `None` if the trigram never occurs.
    pub(crate) fn postings(&self, tri: &[u8; 3]) -> Result<Option<Postings>, ShardError> {
        let Some(entry) = self.terms.get(tri) else {
            return Ok(None);
        };
        let raw = self.file.read(entry.off, entry.len)?;
        let mut c = Cursor::at(self.name(), raw, 0);
        let mut docs = Vec::with_capacity(entry.n_docs as usize);
        let mut prev = 0u32;
        for _ in 0..entry.n_docs {
            let delta = c.var_u32("posting delta")?;
            prev = prev
                .checked_add(delta)
                .ok_or_else(|| ShardError::corrupt(self.name(), "posting doc id overflow"))?;
            if prev >= self.doc_count() {
                return Err(ShardError::corrupt(self.name(), "posting refers to missing document"));
            }
            docs.push(prev);
        }
        Ok(Some(Postings {
            docs,
            bytes_read: entry.len as u64,
        }))
    }

    /// Release the mapping early. Dropping the shard does the same.
    pub fn close(&mut self) {
        self.file.close();
    }
}
