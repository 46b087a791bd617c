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

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zoekt_core::config;
use zoekt_core::{next_page_num, Coordinator, CoordinatorConfig, Query, SearchOptions, ShardSet};

/// Search a directory of zoekt shards.
#[derive(Parser)]
#[clap(name = "zr-search")]
struct Opts {
    /// Shard directory; defaults to ~/.zoekt/indexdb
    #[clap(long)]
    index_dir: Option<PathBuf>,
    /// Maximum number of files to print; 0 for all
    #[clap(long, default_value_t = 50)]
    num: usize,
    /// Print one JSON object per file instead of text
    #[clap(long)]
    json: bool,
    /// Only search repositories whose name matches this regex
    #[clap(long)]
    repo: Option<String>,
    /// Only search files whose name matches this regex
    #[clap(long)]
    file: Option<String>,
    /// Treat QUERY as a regular expression
    #[clap(long)]
    regex: bool,
    /// Match case exactly
    #[clap(long)]
    case: bool,
    /// Give up on shards still running after this many milliseconds
    #[clap(long, default_value_t = 10_000)]
    timeout_ms: u64,
    /// Attach score breakdowns to results
    #[clap(long)]
    debug_score: bool,
    query: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let dir = opts.index_dir.clone().unwrap_or_else(config::default_index_dir);
    let shards = Arc::new(ShardSet::new());
    shards
        .load_dir(&dir)
        .with_context(|| format!("loading shards from {}", dir.display()))?;

    let mut parts = vec![if opts.regex {
        Query::Regex {
            pattern: opts.query.clone(),
            case_sensitive: opts.case,
        }
    } else {
        Query::Substring {
            pattern: opts.query.clone(),
            case_sensitive: opts.case,
        }
    }];
    if let Some(r) = &opts.repo {
        parts.push(Query::Repo(r.clone()));
    }
    if let Some(f) = &opts.file {
        parts.push(Query::FileName(f.clone()));
    }
    let query = Query::and(parts);
    let search_opts = SearchOptions {
        num: opts.num,
        max_wall_time: Some(Duration::from_millis(opts.timeout_ms)),
        debug_score: opts.debug_score,
        max_fragment_chars: Some(100),
        ..Default::default()
    };

    let rt = tokio::runtime::Runtime::new()?;
    let coordinator = Coordinator::new(shards, CoordinatorConfig::default());
    let result = rt.block_on(coordinator.search(&query, &search_opts))?;

    for fm in &result.files {
        if opts.json {
            println!("{}", serde_json::to_string(fm)?);
            continue;
        }
        match &fm.duplicate_id {
            Some(id) => println!("{}:{} (duplicate of {})", fm.repo, fm.file_name, id),
            None => println!("{}:{}", fm.repo, fm.file_name),
        }
        for m in fm.matches.iter().filter(|m| !m.is_file_name_match()) {
            let line: String = m
                .fragments
                .iter()
                .map(|f| format!("{}{}{}", f.pre, f.matched, f.post))
                .collect();
            println!("  {}: {}", m.line_num, line);
        }
    }
    eprintln!("{}", result.stats);
    if opts.num > 0 && result.stats.file_count as usize > result.files.len() {
        eprintln!(
            "{} more files; rerun with --num {}",
            result.stats.file_count as usize - result.files.len(),
            next_page_num(opts.num)
        );
    }
    Ok(())
}
