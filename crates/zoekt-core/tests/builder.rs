mod common;

use anyhow::Result;
use zoekt_core::{BuildError, Builder, Document, Shard, ShardError};

#[test]
fn oversized_file_is_recorded_as_skipped() -> Result<()> {
    common::init_test_logging();
    let dir = tempfile::tempdir()?;
    let mut opts = common::options(dir.path(), "repo");
    opts.size_max = 100;
    let mut b = Builder::new(opts)?;
    b.add_file("a.go", "package main\n")?;
    b.add_file("big.bin", vec![b'x'; 200])?;
    b.finish()?;

    let shard = Shard::open(&b.shard_paths()[0])?;
    let docs = shard.documents();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].name, "a.go");
    assert_eq!(shard.content(0)?, b"package main\n");
    assert_eq!(docs[1].name, "big.bin");
    let reason = docs[1].skip_reason.as_deref().unwrap_or_default();
    assert!(reason.contains("larger than limit 100"), "{}", reason);
    assert_eq!(shard.content(1)?, b"");
    Ok(())
}

#[test]
fn large_file_patterns_bypass_the_limit() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = common::options(dir.path(), "repo");
    opts.size_max = 10;
    opts.large_files = vec!["vendor/**".into()];
    let mut b = Builder::new(opts)?;
    b.add_file("vendor/big.txt", vec![b'y'; 50])?;
    b.add_file("big.txt", vec![b'y'; 50])?;
    b.finish()?;

    let shard = Shard::open(&b.shard_paths()[0])?;
    assert!(!shard.documents()[0].is_skipped());
    assert_eq!(shard.documents()[0].content_len(), 50);
    assert!(shard.documents()[1].is_skipped());
    Ok(())
}

#[test]
fn documents_keep_call_order_and_metadata() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut b = Builder::new(common::options(dir.path(), "github.com/x/y"))?;
    for name in ["z.rs", "a.rs", "m.rs"] {
        b.add(Document::new(name, format!("fn {}() {{}}", &name[..1])))?;
    }
    b.add(Document::skipped("gen.rs", "generated"))?;
    b.finish()?;

    let path = &b.shard_paths()[0];
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("github.com_x_y_v16.00000"));
    let shard = Shard::open(path)?;
    let names: Vec<_> = shard.documents().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["z.rs", "a.rs", "m.rs", "gen.rs"]);
    assert_eq!(shard.documents()[0].language.as_deref(), Some("rust"));
    assert_eq!(shard.repository().branches, vec!["main".to_string()]);
    assert_eq!(shard.repository().source, "/src/github.com/x/y");
    Ok(())
}

#[test]
fn shard_max_splits_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = common::options(dir.path(), "repo");
    opts.shard_max = 10;
    let mut b = Builder::new(opts)?;
    for i in 0..3 {
        b.add_file(format!("f{}.txt", i), vec![b'a'; 10])?;
    }
    b.finish()?;
    assert_eq!(b.shard_paths().len(), 3);
    for p in b.shard_paths() {
        assert_eq!(Shard::open(p)?.doc_count(), 1);
    }
    Ok(())
}

#[test]
fn smaller_rebuild_removes_stale_shards() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = common::options(dir.path(), "repo");
    opts.shard_max = 1;
    let mut b = Builder::new(opts.clone())?;
    b.add_file("a", "1")?;
    b.add_file("b", "2")?;
    b.finish()?;
    assert_eq!(b.shard_paths().len(), 2);

    opts.shard_max = 1 << 20;
    let mut b = Builder::new(opts)?;
    b.add_file("a", "1")?;
    b.finish()?;
    let left = std::fs::read_dir(dir.path())?.count();
    assert_eq!(left, 1);
    Ok(())
}

#[test]
fn second_builder_on_same_shard_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut opts = common::options(dir.path(), "repo");
    opts.shard_max = 1;
    let mut first = Builder::new(opts.clone())?;
    first.add_file("a.txt", "busy")?;

    let mut second = Builder::new(opts)?;
    let err = second.add_file("b.txt", "also busy").unwrap_err();
    assert!(matches!(err, BuildError::ShardLocked(_)), "{}", err);
    assert!(matches!(second.finish(), Err(BuildError::AlreadyFailed(_))));

    first.finish()?;
    assert_eq!(first.shard_paths().len(), 1);
    Ok(())
}

#[test]
fn empty_repository_still_gets_a_shard() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut b = Builder::new(common::options(dir.path(), "empty"))?;
    b.finish()?;
    let shard = Shard::open(&b.shard_paths()[0])?;
    assert_eq!(shard.doc_count(), 0);
    assert_eq!(shard.repository().name, "empty");
    Ok(())
}

#[test]
fn truncated_shard_fails_to_open() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = common::build_repo(dir.path(), "repo", &[("a.txt", b"hello world")]);
    let bytes = std::fs::read(&paths[0])?;
    let cut = dir.path().join("cut.zoekt");
    std::fs::write(&cut, &bytes[..bytes.len() - 3])?;
    assert!(matches!(Shard::open(&cut), Err(ShardError::Corrupt { .. })));

    let mut bad = bytes.clone();
    bad[0] ^= 0xFF;
    let bad_path = dir.path().join("bad.zoekt");
    std::fs::write(&bad_path, &bad)?;
    assert!(matches!(Shard::open(&bad_path), Err(ShardError::BadHeader { .. })));
    Ok(())
}

fn patched(dir: &std::path::Path, bytes: &[u8], at: usize, v: u32) -> Result<std::path::PathBuf> {
    let mut b = bytes.to_vec();
    b[at..at + 4].copy_from_slice(&v.to_le_bytes());
    let path = dir.join(format!("patched-{}.zoekt", at));
    std::fs::write(&path, &b)?;
    Ok(path)
}

#[test]
fn implausible_counts_are_corrupt_not_fatal() -> Result<()> {
    common::init_test_logging();
    let dir = tempfile::tempdir()?;
    let paths = common::build_repo(dir.path(), "repo", &[("a.txt", b"hello world")]);
    let bytes = std::fs::read(&paths[0])?;
    let postings_off = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]) as usize;

    // Document count in the header.
    let p = patched(dir.path(), &bytes, 8, u32::MAX)?;
    assert!(matches!(Shard::open(&p), Err(ShardError::Corrupt { .. })));
    // Term count at the start of the postings section.
    let p = patched(dir.path(), &bytes, postings_off, u32::MAX)?;
    assert!(matches!(Shard::open(&p), Err(ShardError::Corrupt { .. })));
    // Doc count of the first posting list, after its trigram.
    let p = patched(dir.path(), &bytes, postings_off + 4 + 3, u32::MAX)?;
    assert!(matches!(Shard::open(&p), Err(ShardError::Corrupt { .. })));
    Ok(())
}
