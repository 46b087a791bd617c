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

use super::ast::Query;
use crate::trigram::trigram_set;
use crate::types::RepositoryDescription;
use regex::bytes::{Regex as BytesRegex, RegexBuilder as BytesRegexBuilder};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Query compiled once per search and shared by every shard unit.
#[derive(Clone)]
pub struct CompiledQuery {
    root: Matcher,
    source: String,
}

impl CompiledQuery {
    pub fn new(q: &Query) -> Result<Self, regex::Error> {
        Ok(Self {
            root: Matcher::compile(q)?,
            source: q.to_string(),
        })
    }

    pub(crate) fn root(&self) -> &Matcher {
        &self.root
    }

    /// Resolve shard-level predicates against `repo` and fold constants.
    pub(crate) fn for_shard(&self, repo: &RepositoryDescription) -> Matcher {
        self.root.simplify(repo)
    }
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledQuery").field(&self.source).finish()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Clone)]
pub(crate) struct ContentMatcher {
    pub(crate) re: BytesRegex,
    /// Trigrams every matching document must contain; empty means no
    /// prefilter is possible.
    pub(crate) trigrams: Vec<[u8; 3]>,
}

#[derive(Clone)]
pub(crate) enum Matcher {
    Content(ContentMatcher),
    FileName(Regex),
    Repo(Regex),
    Branch(String),
    Language(String),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
    Const(bool),
}

impl Matcher {
    fn compile(q: &Query) -> Result<Self, regex::Error> {
        Ok(match q {
            Query::Substring {
                pattern,
                case_sensitive,
            } => {
                if pattern.is_empty() {
                    return Ok(Matcher::Const(true));
                }
                // ASCII-only folding, the same folding the trigram index uses.
                let re = BytesRegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(!case_sensitive)
                    .unicode(false)
                    .build()?;
                Matcher::Content(ContentMatcher {
                    re,
                    trigrams: trigram_set(pattern.as_bytes()),
                })
            }
            Query::Regex {
                pattern,
                case_sensitive,
            } => {
                let re = BytesRegexBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .multi_line(true)
                    .build()?;
                Matcher::Content(ContentMatcher {
                    re,
                    trigrams: Vec::new(),
                })
            }
            Query::FileName(p) => Matcher::FileName(Regex::new(p)?),
            Query::Repo(p) => Matcher::Repo(Regex::new(p)?),
            Query::Branch(b) => Matcher::Branch(b.clone()),
            Query::Language(l) => Matcher::Language(l.to_ascii_lowercase()),
            Query::And(qs) => Matcher::And(qs.iter().map(Matcher::compile).collect::<Result<_, _>>()?),
            Query::Or(qs) => Matcher::Or(qs.iter().map(Matcher::compile).collect::<Result<_, _>>()?),
            Query::Not(q) => Matcher::Not(Box::new(Matcher::compile(q)?)),
            Query::Const(b) => Matcher::Const(*b),
        })
    }

    pub(crate) fn simplify(&self, repo: &RepositoryDescription) -> Matcher {
        match self {
            Matcher::Repo(re) => Matcher::Const(re.is_match(&repo.name)),
            Matcher::Branch(b) => Matcher::Const(repo.branches.iter().any(|x| x == b)),
            Matcher::And(ms) => {
                let mut out = Vec::with_capacity(ms.len());
                for m in ms {
                    match m.simplify(repo) {
                        Matcher::Const(false) => return Matcher::Const(false),
                        Matcher::Const(true) => {}
                        other => out.push(other),
                    }
                }
                match out.len() {
                    0 => Matcher::Const(true),
                    1 => out.remove(0),
                    _ => Matcher::And(out),
                }
            }
            Matcher::Or(ms) => {
                let mut out = Vec::with_capacity(ms.len());
                for m in ms {
                    match m.simplify(repo) {
                        Matcher::Const(true) => return Matcher::Const(true),
                        Matcher::Const(false) => {}
                        other => out.push(other),
                    }
                }
                match out.len() {
                    0 => Matcher::Const(false),
                    1 => out.remove(0),
                    _ => Matcher::Or(out),
                }
            }
            Matcher::Not(m) => match m.simplify(repo) {
                Matcher::Const(b) => Matcher::Const(!b),
                other => Matcher::Not(Box::new(other)),
            },
            other => other.clone(),
        }
    }

    /// Whether evaluating this tree requires document content.
    pub(crate) fn needs_content(&self) -> bool {
        match self {
            Matcher::Content(_) => true,
            Matcher::And(ms) | Matcher::Or(ms) => ms.iter().any(Matcher::needs_content),
            Matcher::Not(m) => m.needs_content(),
            _ => false,
        }
    }

    /// Evaluate against one document. Shard-level leaves must already have
    /// been resolved by `simplify`; any left over count as matching.
    pub(crate) fn matches(&self, name: &str, language: Option<&str>, content: &[u8]) -> bool {
        match self {
            Matcher::Content(c) => c.re.is_match(content),
            Matcher::FileName(re) => re.is_match(name),
            Matcher::Language(l) => language.is_some_and(|x| x.eq_ignore_ascii_case(l)),
            Matcher::Repo(_) | Matcher::Branch(_) => true,
            Matcher::And(ms) => ms.iter().all(|m| m.matches(name, language, content)),
            Matcher::Or(ms) => ms.iter().any(|m| m.matches(name, language, content)),
            Matcher::Not(m) => !m.matches(name, language, content),
            Matcher::Const(b) => *b,
        }
    }

    /// Collect the leaves whose hits should be highlighted: those reached
    /// without passing through a `Not`.
    pub(crate) fn positive_leaves<'a>(&'a self, out: &mut Vec<&'a Matcher>) {
        match self {
            Matcher::Content(_) | Matcher::FileName(_) => out.push(self),
            Matcher::And(ms) | Matcher::Or(ms) => {
                for m in ms {
                    m.positive_leaves(out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, branches: &[&str]) -> RepositoryDescription {
        RepositoryDescription {
            name: name.into(),
            branches: branches.iter().map(|b| b.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn repo_filter_folds_to_constant() {
        let q = Query::and([Query::Repo("^github.com/a$".into()), Query::substring("foo")]);
        let cq = CompiledQuery::new(&q).unwrap();
        assert!(matches!(cq.for_shard(&repo("github.com/b", &[])), Matcher::Const(false)));
        assert!(matches!(cq.for_shard(&repo("github.com/a", &[])), Matcher::Content(_)));
    }

    #[test]
    fn branch_and_negation_fold() {
        let q = Query::not(Query::Branch("main".into()));
        let cq = CompiledQuery::new(&q).unwrap();
        assert!(matches!(cq.for_shard(&repo("r", &["main"])), Matcher::Const(false)));
        assert!(matches!(cq.for_shard(&repo("r", &["dev"])), Matcher::Const(true)));
    }

    #[test]
    fn substring_respects_case_flag() {
        let ci = CompiledQuery::new(&Query::substring("Foo")).unwrap();
        assert!(ci.root().matches("a", None, b"xx foo xx"));
        let cs = CompiledQuery::new(&Query::Substring {
            pattern: "Foo".into(),
            case_sensitive: true,
        })
        .unwrap();
        assert!(!cs.root().matches("a", None, b"xx foo xx"));
        assert!(cs.root().matches("a", None, b"xx Foo xx"));
    }

    #[test]
    fn regex_special_chars_in_substring_are_literal() {
        let q = CompiledQuery::new(&Query::substring("a.b(")).unwrap();
        assert!(q.root().matches("f", None, b"a.b("));
        assert!(!q.root().matches("f", None, b"axb("));
    }

    #[test]
    fn invalid_regex_is_reported() {
        assert!(CompiledQuery::new(&Query::regex("(")).is_err());
    }
}
