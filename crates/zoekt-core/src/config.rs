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

//! Named JSON index configurations and the defaults around them.
//!
//! Values are layered as defaults <- config file <- environment <- command
//! line. This module covers the first three; binaries apply their flags last.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::build::Options;
use crate::error::ConfigError;
use crate::types::RepositoryDescription;

pub const DEFAULT_IGNORE_DIRS: &str = ".git,.hg,.svn";
pub const THREADS_ENV: &str = "ZOEKT_INDEX_THREADS";

/// Directory holding named configurations: `$HOME/.zoekt`.
pub fn default_config_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".zoekt"),
        None => PathBuf::from(".zoekt"),
    }
}

pub fn default_index_dir() -> PathBuf {
    default_config_dir().join("indexdb")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub paths: Vec<String>,
    /// Comma separated directory base names never descended into.
    pub ignore_dirs: String,
    pub repo_name: String,
    /// Pipe separated extensions without the dot, e.g. `rs|go`. Empty keeps
    /// every file.
    pub file_extensions: String,
    pub index_dir: String,
    pub parallelism: usize,
    pub size_max: usize,
    pub large_files: Vec<String>,
}

impl IndexConfig {
    /// Override values from the environment.
    pub fn apply_env(&mut self) {
        if let Some(n) = std::env::var(THREADS_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            self.parallelism = n;
        }
    }

    pub fn ignore_dir_set(&self) -> HashSet<String> {
        split_list(&self.ignore_dirs, ',').collect()
    }

    /// Lowercase extensions, without the leading dot.
    pub fn extension_set(&self) -> HashSet<String> {
        split_list(&self.file_extensions, '|')
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    }

    /// Repository name for `path`. With several paths each gets its base
    /// name appended so the names stay unique.
    pub fn repo_name_for(&self, path: &Path) -> String {
        if self.repo_name.is_empty() {
            return base_name(path);
        }
        if self.paths.len() > 1 {
            format!("{}/{}", self.repo_name, base_name(path))
        } else {
            self.repo_name.clone()
        }
    }

    /// Builder options for indexing `path` with this configuration.
    pub fn build_options(&self, path: &Path) -> Options {
        let mut opts = Options::default();
        if !self.index_dir.is_empty() {
            opts.index_dir = PathBuf::from(&self.index_dir);
        }
        if self.size_max > 0 {
            opts.size_max = self.size_max;
        }
        if self.parallelism > 0 {
            opts.parallelism = Some(self.parallelism);
        }
        opts.large_files = self.large_files.clone();
        opts.repository = RepositoryDescription {
            name: self.repo_name_for(path),
            source: path.display().to_string(),
            branches: Vec::new(),
        };
        opts
    }
}

fn split_list(s: &str, sep: char) -> impl Iterator<Item = String> + '_ {
    s.split(sep)
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
}

/// Base name of `path`, resolving `.` and similar through the filesystem.
pub fn base_name(path: &Path) -> String {
    let named = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| n != "." && n != "..");
    named
        .or_else(|| {
            fs::canonicalize(path)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| path.display().to_string())
}

/// Resolve a configuration by name (`{config_dir}/{name}.json`) or by path.
pub fn config_path(name_or_path: &str) -> PathBuf {
    let p = Path::new(name_or_path);
    if name_or_path.ends_with(".json") || p.components().count() > 1 {
        p.to_path_buf()
    } else {
        default_config_dir().join(format!("{}.json", name_or_path))
    }
}

/// Read a JSON configuration, fill defaults, then apply the environment.
pub fn load_index_config(path: impl AsRef<Path>) -> Result<IndexConfig, ConfigError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::NotFound(shown));
    }
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let mut cfg: IndexConfig = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;
    if cfg.ignore_dirs.is_empty() {
        cfg.ignore_dirs = DEFAULT_IGNORE_DIRS.to_string();
    }
    cfg.apply_env();
    debug!(path = %shown, paths = cfg.paths.len(), "loaded index config");
    Ok(cfg)
}

/// Every `*.json` configuration in `dir`, sorted by name, each with its load
/// outcome.
pub fn list_configs(dir: impl AsRef<Path>) -> std::io::Result<Vec<(String, Result<IndexConfig, ConfigError>)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |e| e != "json") {
            continue;
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push((name, load_index_config(&path)));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn init_test_logging() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        });
    }

    fn write_config(dir: &Path, name: &str, json: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, json).unwrap();
        p
    }

    #[test]
    #[serial_test::serial]
    fn file_values_and_defaults() {
        init_test_logging();
        std::env::remove_var(THREADS_ENV);
        let dir = tempfile::tempdir().unwrap();
        let p = write_config(
            dir.path(),
            "work.json",
            r#"{"paths": ["/src/a", "/src/b"], "repo_name": "work", "file_extensions": "rs|.GO", "parallelism": 3}"#,
        );
        let cfg = load_index_config(&p).unwrap();
        assert_eq!(cfg.ignore_dirs, DEFAULT_IGNORE_DIRS);
        assert_eq!(cfg.parallelism, 3);
        assert!(cfg.ignore_dir_set().contains(".hg"));
        let exts = cfg.extension_set();
        assert!(exts.contains("rs") && exts.contains("go"));
        assert_eq!(cfg.repo_name_for(Path::new("/src/a")), "work/a");

        let opts = cfg.build_options(Path::new("/src/b"));
        assert_eq!(opts.repository.name, "work/b");
        assert_eq!(opts.repository.source, "/src/b");
        assert_eq!(opts.parallelism, Some(3));
    }

    #[test]
    #[serial_test::serial]
    fn env_overrides_file_parallelism() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let p = write_config(dir.path(), "c.json", r#"{"paths": ["x"], "parallelism": 3}"#);
        std::env::set_var(THREADS_ENV, "7");
        let cfg = load_index_config(&p).unwrap();
        std::env::remove_var(THREADS_ENV);
        assert_eq!(cfg.parallelism, 7);
        assert_eq!(cfg.repo_name_for(Path::new("/src/x")), "x");
    }

    #[test]
    fn missing_and_malformed_configs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_index_config(dir.path().join("nope.json")),
            Err(ConfigError::NotFound(_))
        ));
        let bad = write_config(dir.path(), "bad.json", "{not json");
        assert!(matches!(load_index_config(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    #[serial_test::serial]
    fn lists_configs_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "b.json", r#"{"paths": []}"#);
        write_config(dir.path(), "a.json", "{oops");
        write_config(dir.path(), "notes.txt", "ignored");
        let listed = list_configs(dir.path()).unwrap();
        let names: Vec<_> = listed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(listed[0].1.is_err());
        assert!(listed[1].1.is_ok());
    }

    #[test]
    fn config_names_resolve_under_config_dir() {
        assert_eq!(config_path("work"), default_config_dir().join("work.json"));
        assert_eq!(config_path("./cfg/work.json"), PathBuf::from("./cfg/work.json"));
    }
}
