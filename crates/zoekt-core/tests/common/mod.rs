#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use zoekt_core::{Builder, Options, RepositoryDescription, Shard, ShardSet};

pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn options(dir: &Path, repo: &str) -> Options {
    Options {
        index_dir: dir.to_path_buf(),
        repository: RepositoryDescription {
            name: repo.into(),
            source: format!("/src/{}", repo),
            branches: vec!["main".into()],
        },
        parallelism: Some(2),
        ..Default::default()
    }
}

/// Build one repository from `(name, content)` pairs and return its shards.
pub fn build_repo(dir: &Path, repo: &str, files: &[(&str, &[u8])]) -> Vec<PathBuf> {
    let mut b = Builder::new(options(dir, repo)).expect("builder");
    for (name, content) in files {
        b.add_file(*name, content.to_vec()).expect("add_file");
    }
    b.finish().expect("finish");
    b.shard_paths().to_vec()
}

pub fn open_all(paths: &[PathBuf]) -> Arc<ShardSet> {
    let set = Arc::new(ShardSet::new());
    for p in paths {
        set.insert(Arc::new(Shard::open(p).expect("open shard")));
    }
    set
}
