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

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Labels attached to every document of a shard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescription {
    pub name: String,
    /// Where the documents came from (a directory or URL); informational.
    pub source: String,
    pub branches: Vec<String>,
}

/// One logical source file handed to the builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub content: Vec<u8>,
    /// Set when the document is deliberately excluded; such documents carry
    /// no content.
    pub skip_reason: Option<String>,
    /// Language label; inferred from the extension when absent.
    pub language: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skip_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// Why the builder turned a file into a skip marker. Not an error: the build
/// goes on and the reason text is stored with the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    DocumentTooLarge { size: usize, limit: usize },
    Binary,
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::DocumentTooLarge { size, limit } => {
                write!(f, "document size {} larger than limit {}", size, limit)
            }
            SkipCause::Binary => write!(f, "binary content"),
        }
    }
}

/// A run of text on one line: context before, the match, context after.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fragment {
    pub pre: String,
    #[serde(rename = "Match")]
    pub matched: String,
    pub post: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineMatch {
    /// 1-based line number; 0 when the match is on the file name.
    pub line_num: u32,
    pub fragments: Vec<Fragment>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score_debug: Option<String>,
    #[serde(skip)]
    pub score: f64,
}

impl LineMatch {
    pub fn is_file_name_match(&self) -> bool {
        self.line_num == 0
    }
}

/// One file's result for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileMatch {
    /// Anchor other results in the same response refer to.
    #[serde(rename = "ResultID")]
    pub result_id: String,
    pub repo: String,
    pub file_name: String,
    pub language: Option<String>,
    pub branches: BTreeSet<String>,
    #[serde(rename = "DuplicateID", skip_serializing_if = "Option::is_none", default)]
    pub duplicate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score_debug: Option<String>,
    pub matches: Vec<LineMatch>,
    pub score: f64,
    /// SHA-256 of the full file content.
    #[serde(skip)]
    pub checksum: [u8; 32],
}

impl FileMatch {
    pub fn anchor(repo: &str, file_name: &str) -> String {
        format!("{}:{}", repo, file_name)
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_id.is_some()
    }

    /// Number of non-file-name line matches.
    pub fn line_match_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| !m.is_file_name_match())
            .count()
    }
}

static LANGUAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("rs", "rust"),
        ("go", "go"),
        ("ts", "typescript"),
        ("tsx", "typescript"),
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("py", "python"),
        ("java", "java"),
        ("cs", "csharp"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("cc", "cpp"),
        ("cxx", "cpp"),
        ("hpp", "cpp"),
        ("hxx", "cpp"),
        ("rb", "ruby"),
        ("php", "php"),
        ("sh", "shell"),
        ("bash", "shell"),
        ("md", "markdown"),
        ("yml", "yaml"),
        ("yaml", "yaml"),
        ("toml", "toml"),
        ("json", "json"),
    ]
    .into_iter()
    .collect()
});

/// Best-effort language label from a file name's extension.
pub fn language_for(name: &str) -> Option<&'static str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    LANGUAGES.get(ext.to_ascii_lowercase().as_str()).copied()
}
