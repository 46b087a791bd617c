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

use std::collections::BTreeSet;

use super::{intersect_sorted, union_sorted, Shard};
use crate::error::ShardError;
use crate::query::{CompiledQuery, Matcher};
use crate::search::{SearchOptions, Searchable, ShardResult};
use crate::stats::Stats;
use crate::types::{FileMatch, Fragment, LineMatch};

const FRAGMENT_SCORE: f64 = 1.0;
const BOUNDARY_SCORE: f64 = 0.5;
const FILE_NAME_SCORE: f64 = 5.0;

impl Searchable for Shard {
    fn name(&self) -> &str {
        Shard::name(self)
    }

    fn search(&self, query: &CompiledQuery, opts: &SearchOptions) -> Result<ShardResult, ShardError> {
        let matcher = query.for_shard(self.repository());
        let mut stats = Stats::default();
        if matches!(matcher, Matcher::Const(false)) {
            stats.shards_skipped_filter = 1;
            return Ok(ShardResult {
                files: Vec::new(),
                stats,
            });
        }
        stats.shards_scanned = 1;
        stats.repos = 1;
        stats.documents = self.doc_count() as u64;
        stats.content_bytes = self.content_bytes();
        stats.index_bytes = self.index_bytes() as u64;

        let candidates = match self.candidates(&matcher, &mut stats)? {
            Some(docs) => docs,
            None => (0..self.doc_count()).collect(),
        };
        let needs_content = matcher.needs_content();
        let mut leaves = Vec::new();
        matcher.positive_leaves(&mut leaves);
        let branches: BTreeSet<String> = self.repository().branches.iter().cloned().collect();

        let mut files = Vec::new();
        for (i, &doc) in candidates.iter().enumerate() {
            if opts.shard_max_match_count > 0 && stats.match_count >= opts.shard_max_match_count as u64 {
                stats.files_skipped += (candidates.len() - i) as u64;
                break;
            }
            let entry = &self.documents()[doc as usize];
            if entry.is_skipped() {
                stats.files_skipped += 1;
                continue;
            }
            stats.files_considered += 1;
            let content = if needs_content {
                let c = self.content(doc)?;
                stats.files_loaded += 1;
                stats.content_bytes_loaded += c.len() as u64;
                c
            } else {
                &[][..]
            };
            if !matcher.matches(&entry.name, entry.language.as_deref(), content) {
                continue;
            }
            let mut fm = FileMatch {
                result_id: FileMatch::anchor(&self.repository().name, &entry.name),
                repo: self.repository().name.clone(),
                file_name: entry.name.clone(),
                language: entry.language.clone(),
                branches: branches.clone(),
                checksum: entry.checksum,
                ..Default::default()
            };
            collect_matches(&mut fm, &leaves, content, opts);
            stats.file_count += 1;
            stats.match_count += fm.matches.len() as u64;
            files.push(fm);
        }
        Ok(ShardResult { files, stats })
    }
}

impl Shard {
    /// Candidate documents from the trigram index, or `None` when the
    /// matcher cannot be narrowed and every document must be considered.
    fn candidates(&self, m: &Matcher, stats: &mut Stats) -> Result<Option<Vec<u32>>, ShardError> {
        match m {
            Matcher::Content(c) if !c.trigrams.is_empty() => {
                let mut acc: Option<Vec<u32>> = None;
                for tri in &c.trigrams {
                    let Some(p) = self.postings(tri)? else {
                        return Ok(Some(Vec::new()));
                    };
                    stats.ngram_matches += p.docs.len() as u64;
                    stats.index_bytes_loaded += p.bytes_read;
                    acc = Some(match acc {
                        None => p.docs,
                        Some(prev) => intersect_sorted(&prev, &p.docs),
                    });
                    if acc.as_ref().is_some_and(Vec::is_empty) {
                        break;
                    }
                }
                Ok(acc)
            }
            Matcher::And(ms) => {
                let mut acc: Option<Vec<u32>> = None;
                for child in ms {
                    if let Some(docs) = self.candidates(child, stats)? {
                        acc = Some(match acc {
                            None => docs,
                            Some(prev) => intersect_sorted(&prev, &docs),
                        });
                    }
                }
                Ok(acc)
            }
            Matcher::Or(ms) => {
                let mut acc = Vec::new();
                for child in ms {
                    match self.candidates(child, stats)? {
                        Some(docs) => acc = union_sorted(&acc, &docs),
                        None => return Ok(None),
                    }
                }
                Ok(Some(acc))
            }
            Matcher::Const(false) => Ok(Some(Vec::new())),
            _ => Ok(None),
        }
    }
}

/// Fill `fm.matches` with the hits of every highlightable leaf and score the
/// file.
fn collect_matches(fm: &mut FileMatch, leaves: &[&Matcher], content: &[u8], opts: &SearchOptions) {
    let mut name_ranges = Vec::new();
    let mut content_ranges = Vec::new();
    for leaf in leaves {
        match leaf {
            Matcher::FileName(re) => {
                name_ranges.extend(re.find_iter(&fm.file_name).map(|m| (m.start(), m.end())));
            }
            Matcher::Content(c) => {
                content_ranges.extend(c.re.find_iter(content).map(|m| (m.start(), m.end())));
            }
            _ => {}
        }
    }

    let mut file_name_score = 0.0;
    let name_ranges = merge_ranges(name_ranges);
    if !name_ranges.is_empty() {
        let mut line = build_line(fm.file_name.as_bytes(), 0, &name_ranges, opts);
        line.score = FILE_NAME_SCORE;
        if opts.debug_score {
            line.score_debug = Some(format!("score:{:.2} <- file name", line.score));
        }
        file_name_score = line.score;
        fm.matches.push(line);
    }

    let mut fragment_score = 0.0;
    let content_ranges = merge_ranges(content_ranges);
    let mut i = 0;
    while i < content_ranges.len() {
        let (start, _) = content_ranges[i];
        let line_start = content[..start].iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
        let line_end = content[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(content.len(), |p| start + p);
        let mut on_line = Vec::new();
        while i < content_ranges.len() && content_ranges[i].0 < line_end.max(start + 1) {
            let (s, e) = content_ranges[i];
            on_line.push((s - line_start, e.min(line_end).max(s) - line_start));
            i += 1;
        }
        let line_num = 1 + content[..line_start].iter().filter(|&&b| b == b'\n').count() as u32;
        let text = &content[line_start..line_end];
        let mut line = build_line(text, line_num, &on_line, opts);
        line.score = on_line.iter().map(|&(s, e)| fragment_score_for(text, s, e)).sum();
        if opts.debug_score {
            line.score_debug = Some(format!("score:{:.2} <- {} fragments", line.score, on_line.len()));
        }
        fragment_score += line.score;
        fm.matches.push(line);
    }

    fm.score = fragment_score + file_name_score;
    if opts.debug_score {
        fm.score_debug = Some(format!(
            "score:{:.2} <- fragments:{:.2}, file name:{:.2}",
            fm.score, fragment_score, file_name_score
        ));
    }
}

/// Sort and coalesce overlapping ranges; empty ranges are dropped.
fn merge_ranges(mut ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    ranges.retain(|(s, e)| e > s);
    ranges.sort_unstable();
    let mut out: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (s, e) in ranges {
        match out.last_mut() {
            Some(last) if s <= last.1 => last.1 = last.1.max(e),
            _ => out.push((s, e)),
        }
    }
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn fragment_score_for(line: &[u8], start: usize, end: usize) -> f64 {
    let mut score = FRAGMENT_SCORE;
    if start == 0 || !is_word_byte(line[start - 1]) {
        score += BOUNDARY_SCORE;
    }
    if end >= line.len() || !is_word_byte(line[end]) {
        score += BOUNDARY_SCORE;
    }
    score
}

/// One fragment per range: `pre` runs from the previous range (or the line
/// start), and only the last fragment carries the rest of the line as `post`.
fn build_line(text: &[u8], line_num: u32, ranges: &[(usize, usize)], opts: &SearchOptions) -> LineMatch {
    let mut fragments = Vec::with_capacity(ranges.len());
    let mut last = 0;
    for (idx, &(s, e)) in ranges.iter().enumerate() {
        let pre = String::from_utf8_lossy(&text[last..s]);
        let matched = String::from_utf8_lossy(&text[s..e]).into_owned();
        let post = if idx + 1 == ranges.len() {
            String::from_utf8_lossy(&text[e..]).into_owned()
        } else {
            String::new()
        };
        let (pre, post) = match opts.max_fragment_chars {
            Some(max) => (trim_last_n_chars(&pre, max, true), trim_first_n_chars(&post, max, true)),
            None => (pre.into_owned(), post),
        };
        fragments.push(Fragment { pre, matched, post });
        last = e;
    }
    LineMatch {
        line_num,
        fragments,
        ..Default::default()
    }
}

/// Keep the last `max` characters of `s`, marking the cut.
fn trim_last_n_chars(s: &str, max: usize, add_ellipsis: bool) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    let split = s.char_indices().nth(count - max).map_or(s.len(), |(i, _)| i);
    if add_ellipsis {
        format!("…{}", &s[split..])
    } else {
        s[split..].to_string()
    }
}

/// Keep the first `max` characters of `s`, marking the cut.
fn trim_first_n_chars(s: &str, max: usize, add_ellipsis: bool) -> String {
    let split = match s.char_indices().nth(max) {
        Some((i, _)) => i,
        None => return s.to_string(),
    };
    if add_ellipsis {
        format!("{}…", &s[..split])
    } else {
        s[..split].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::shard::ShardWriter;
    use crate::types::{Document, RepositoryDescription};

    fn shard_of(repo: &str, docs: Vec<Document>) -> (tempfile::TempDir, Shard) {
        let dir = tempfile::tempdir().unwrap();
        let mut w = ShardWriter::new(RepositoryDescription {
            name: repo.into(),
            branches: vec!["main".into()],
            ..Default::default()
        });
        for d in docs {
            w.add(d);
        }
        let path = dir.path().join("t.zoekt");
        w.write_file(&path).unwrap();
        let shard = Shard::open(&path).unwrap();
        (dir, shard)
    }

    fn run(shard: &Shard, q: Query) -> ShardResult {
        let cq = CompiledQuery::new(&q).unwrap();
        shard.search(&cq, &SearchOptions::default()).unwrap()
    }

    #[test]
    fn substring_hits_become_fragments() {
        let (_d, shard) = shard_of(
            "r",
            vec![
                Document::new("a.go", "package main\nfunc foo() { foo() }\n"),
                Document::new("b.go", "package other\n"),
            ],
        );
        let res = run(&shard, Query::substring("foo"));
        assert_eq!(res.files.len(), 1);
        let fm = &res.files[0];
        assert_eq!(fm.file_name, "a.go");
        assert_eq!(fm.language.as_deref(), Some("go"));
        assert_eq!(fm.matches.len(), 1);
        let line = &fm.matches[0];
        assert_eq!(line.line_num, 2);
        assert_eq!(line.fragments.len(), 2);
        assert_eq!(line.fragments[0].pre, "func ");
        assert_eq!(line.fragments[0].matched, "foo");
        assert_eq!(line.fragments[0].post, "");
        assert_eq!(line.fragments[1].pre, "() { ");
        assert_eq!(line.fragments[1].post, "() }");
        assert_eq!(res.stats.files_considered, 1);
        assert_eq!(res.stats.files_loaded, 1);
        assert_eq!(res.stats.match_count, 1);
        assert!(res.stats.ngram_matches > 0);
    }

    #[test]
    fn skipped_documents_are_counted_not_loaded() {
        let (_d, shard) = shard_of(
            "r",
            vec![
                Document::skipped("big.bin", "document size 200 larger than limit 100"),
                Document::new("a.txt", "hello"),
            ],
        );
        let res = run(&shard, Query::FileName(".".into()));
        assert_eq!(res.files.len(), 1);
        assert_eq!(res.stats.files_skipped, 1);
        assert_eq!(res.stats.files_loaded, 0);
        assert_eq!(res.files[0].matches[0].line_num, 0);
        assert_eq!(res.files[0].score, FILE_NAME_SCORE);
    }

    #[test]
    fn repo_mismatch_skips_shard() {
        let (_d, shard) = shard_of("github.com/a", vec![Document::new("a.txt", "hello")]);
        let res = run(&shard, Query::and([Query::Repo("^other$".into()), Query::substring("hello")]));
        assert!(res.files.is_empty());
        assert_eq!(res.stats.shards_skipped_filter, 1);
        assert_eq!(res.stats.shards_scanned, 0);
    }

    #[test]
    fn match_cap_skips_remaining_candidates() {
        let docs = (0..5)
            .map(|i| Document::new(format!("f{}.txt", i), "needle"))
            .collect();
        let (_d, shard) = shard_of("r", docs);
        let cq = CompiledQuery::new(&Query::substring("needle")).unwrap();
        let opts = SearchOptions {
            shard_max_match_count: 2,
            ..Default::default()
        };
        let res = shard.search(&cq, &opts).unwrap();
        assert_eq!(res.files.len(), 2);
        assert_eq!(res.stats.files_skipped, 3);
    }

    #[test]
    fn word_boundaries_raise_score() {
        let (_d, shard) = shard_of(
            "r",
            vec![Document::new("a.txt", "foo"), Document::new("b.txt", "xfoox")],
        );
        let res = run(&shard, Query::substring("foo"));
        let a = res.files.iter().find(|f| f.file_name == "a.txt").unwrap();
        let b = res.files.iter().find(|f| f.file_name == "b.txt").unwrap();
        assert_eq!(a.score, 2.0);
        assert_eq!(b.score, 1.0);
    }

    #[test]
    fn negated_content_does_not_use_index() {
        let (_d, shard) = shard_of(
            "r",
            vec![Document::new("a.txt", "alpha"), Document::new("b.txt", "beta")],
        );
        let res = run(&shard, Query::not(Query::substring("alpha")));
        assert_eq!(res.files.len(), 1);
        assert_eq!(res.files[0].file_name, "b.txt");
        assert!(res.files[0].matches.is_empty());
    }

    #[test]
    fn context_is_trimmed() {
        assert_eq!(trim_last_n_chars("abcdef", 3, true), "…def");
        assert_eq!(trim_first_n_chars("abcdef", 3, true), "abc…");
        assert_eq!(trim_first_n_chars("ab", 3, true), "ab");
        assert_eq!(trim_last_n_chars("héllo", 4, false), "éllo");
    }

    #[test]
    fn overlapping_ranges_merge() {
        assert_eq!(merge_ranges(vec![(4, 6), (0, 2), (1, 3), (5, 5)]), vec![(0, 3), (4, 6)]);
    }
}
