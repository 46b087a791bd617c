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

//! On-disk shard format.
//!
//! All integers are little-endian; offsets are absolute u32 file offsets.
//!
//! ```text
//! header   magic u32 | version u32 | doc_count u32 | meta_off u32 | docs_off u32
//!          | content_off u32 | postings_off u32 | file_size u32
//! meta     repo name str | repo source str | n_branches u16 | branch str*
//! docs     per doc: name str | skip_reason str | language str
//!          | content_off u32 (relative to content section) | content_len u32
//!          | sha256 [u8; 32]
//! content  document bytes, concatenated in document order
//! postings term_count u32 | per term: trigram [u8; 3] | n_docs u32
//!          | byte_len u32 | varint doc-id deltas
//! ```
//!
//! `str` is a u16 length followed by UTF-8 bytes.

mod codec;
mod reader;
mod searcher;
mod writer;

pub use reader::{DocEntry, Shard};
pub use writer::ShardWriter;

pub(crate) use codec::{intersect_sorted, union_sorted};

pub const MAGIC: u32 = 0x5a4f_454b; // 'ZOEK'
pub const VERSION: u32 = 16;
pub const HEADER_SIZE: u32 = 32;
pub const SHARD_EXTENSION: &str = "zoekt";

/// File name for the `n`th shard of `repo`: `{repo}_v{VERSION}.{n:05}.zoekt`,
/// with path separators and other unsafe characters replaced by `_`.
pub fn shard_file_name(repo: &str, n: usize) -> String {
    let sanitized: String = repo
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let base = if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    };
    format!("{}_v{}.{:05}.{}", base, VERSION, n, SHARD_EXTENSION)
}
