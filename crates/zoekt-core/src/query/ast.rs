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

use std::fmt;

/// An already-parsed query predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Literal text in file content.
    Substring {
        pattern: String,
        case_sensitive: bool,
    },
    /// Regular expression over file content.
    Regex {
        pattern: String,
        case_sensitive: bool,
    },
    /// Regular expression over the file name.
    FileName(String),
    /// Regular expression over the repository name. Decided per shard.
    Repo(String),
    /// Exact branch name. Decided per shard.
    Branch(String),
    Language(String),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Const(bool),
}

impl Query {
    /// Case-insensitive literal.
    pub fn substring(pattern: impl Into<String>) -> Self {
        Query::Substring {
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Query::Regex {
            pattern: pattern.into(),
            case_sensitive: false,
        }
    }

    pub fn and(children: impl IntoIterator<Item = Query>) -> Self {
        Query::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Query>) -> Self {
        Query::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(q: Query) -> Self {
        Query::Not(Box::new(q))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |f: &mut fmt::Formatter<'_>, op: &str, qs: &[Query]| -> fmt::Result {
            write!(f, "({}", op)?;
            for q in qs {
                write!(f, " {}", q)?;
            }
            write!(f, ")")
        };
        match self {
            Query::Substring {
                pattern,
                case_sensitive,
            } => write!(f, "{}L({})", if *case_sensitive { "c" } else { "" }, pattern),
            Query::Regex {
                pattern,
                case_sensitive,
            } => write!(f, "{}R({})", if *case_sensitive { "c" } else { "" }, pattern),
            Query::FileName(p) => write!(f, "file:{}", p),
            Query::Repo(p) => write!(f, "repo:{}", p),
            Query::Branch(b) => write!(f, "branch:{}", b),
            Query::Language(l) => write!(f, "lang:{}", l),
            Query::And(qs) => list(f, "AND", qs),
            Query::Or(qs) => list(f, "OR", qs),
            Query::Not(q) => write!(f, "(NOT {})", q),
            Query::Const(b) => write!(f, "{}", b),
        }
    }
}
