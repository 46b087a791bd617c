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
use clap::{Parser, Subcommand};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use zoekt_core::config::{self, IndexConfig};
use zoekt_core::{Builder, Document, Options};

/// Build zoekt shards from directories on disk.
///
/// Index files go to ~/.zoekt/indexdb unless --index-dir says otherwise.
#[derive(Parser)]
#[clap(name = "zr-index")]
struct Opts {
    /// Directory to write index files to
    #[clap(long)]
    index_dir: Option<PathBuf>,
    /// Comma separated list of directories to ignore
    #[clap(long, default_value = config::DEFAULT_IGNORE_DIRS)]
    ignore_dirs: String,
    /// Skip files larger than this many bytes
    #[clap(long)]
    size_max: Option<usize>,
    /// Indexing threads; overrides ZOEKT_INDEX_THREADS
    #[clap(long)]
    parallelism: Option<usize>,
    #[clap(subcommand)]
    command: Option<Command>,
    /// Directories to index, one repository each
    paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Index every path of a named JSON configuration
    Update {
        /// Configuration name under ~/.zoekt, or a path to a .json file
        config: String,
    },
    /// List the configurations in a directory
    List {
        /// Defaults to ~/.zoekt
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opts = Opts::parse();
    match &opts.command {
        Some(Command::List { dir }) => list(dir.clone().unwrap_or_else(config::default_config_dir)),
        Some(Command::Update { config: name }) => update(&opts, name),
        None => {
            if opts.paths.is_empty() {
                anyhow::bail!("no paths given; see --help");
            }
            let mut cfg = IndexConfig {
                ignore_dirs: opts.ignore_dirs.clone(),
                ..Default::default()
            };
            cfg.apply_env();
            for path in &opts.paths {
                let mut build = cfg.build_options(path);
                apply_flags(&opts, &mut build);
                index_path(path, build, &cfg.ignore_dir_set(), &HashSet::new())?;
            }
            Ok(())
        }
    }
}

fn apply_flags(opts: &Opts, build: &mut Options) {
    if let Some(dir) = &opts.index_dir {
        build.index_dir = dir.clone();
    }
    if let Some(n) = opts.size_max {
        build.size_max = n;
    }
    if let Some(n) = opts.parallelism {
        build.parallelism = Some(n);
    }
}

fn update(opts: &Opts, name: &str) -> Result<()> {
    let path = config::config_path(name);
    let cfg = config::load_index_config(&path)?;
    let ignore = cfg.ignore_dir_set();
    let exts = cfg.extension_set();
    for p in &cfg.paths {
        let p = Path::new(p);
        let mut build = cfg.build_options(p);
        apply_flags(opts, &mut build);
        tracing::info!(path = %p.display(), repo = %build.repository.name, "indexing path");
        index_path(p, build, &ignore, &exts).with_context(|| format!("indexing {}", p.display()))?;
    }
    Ok(())
}

fn list(dir: PathBuf) -> Result<()> {
    let configs = config::list_configs(&dir).with_context(|| format!("reading {}", dir.display()))?;
    println!("Available configurations:");
    println!("------------------------");
    if configs.is_empty() {
        println!("No configuration files found.");
        println!("Create JSON files in {} to get started.", dir.display());
        return Ok(());
    }
    for (name, cfg) in configs {
        let cfg = match cfg {
            Ok(c) => c,
            Err(e) => {
                println!("- {} (Error: {})", name, e);
                continue;
            }
        };
        println!("- {}:", name);
        if !cfg.repo_name.is_empty() {
            println!("  Repo Name: {}", cfg.repo_name);
        }
        if cfg.parallelism > 0 {
            println!("  Parallelism: {}", cfg.parallelism);
        }
        println!("  Paths: {} directories", cfg.paths.len());
        for p in cfg.paths.iter().take(3) {
            println!("    - {}", p);
        }
        if cfg.paths.len() > 3 {
            println!("    - ... and {} more", cfg.paths.len() - 3);
        }
        println!("  Ignore: {}", cfg.ignore_dirs);
        if !cfg.file_extensions.is_empty() {
            println!("  File Extensions: {}", cfg.file_extensions);
        }
    }
    Ok(())
}

/// Walk `dir` and feed every regular file to a fresh builder.
fn index_path(dir: &Path, opts: Options, ignore: &HashSet<String>, exts: &HashSet<String>) -> Result<()> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("resolving {}", dir.display()))?;
    let mut builder = Builder::new(opts)?;

    let skip_dirs = ignore.clone();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |e| {
            let is_dir = e.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && skip_dirs.contains(e.file_name().to_string_lossy().as_ref()))
        })
        .build();

    let res = (|| -> Result<()> {
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            if !exts.is_empty() {
                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                if !exts.contains(&ext) {
                    continue;
                }
            }
            let name = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            let size = entry.metadata()?.len() as usize;
            if let Some(cause) = builder.oversized(&name, size) {
                builder.add(Document::skipped(name, cause.to_string()))?;
                continue;
            }
            let content = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            builder.add_file(name, content)?;
        }
        Ok(())
    })();
    // Always finish; a walk error still reports first.
    let finished = builder.finish();
    res?;
    finished?;
    for p in builder.shard_paths() {
        println!("{}", p.display());
    }
    Ok(())
}
