use proptest::prelude::*;
use std::time::Duration;
use zoekt_core::Stats;

fn arb_stats() -> impl Strategy<Value = Stats> {
    (proptest::collection::vec(0u64..1_000_000, 16), 0u64..10_000).prop_map(|(v, ms)| Stats {
        match_count: v[0],
        file_count: v[1],
        documents: v[2],
        repos: v[3],
        content_bytes: v[4],
        index_bytes: v[5],
        content_bytes_loaded: v[6],
        index_bytes_loaded: v[7],
        ngram_matches: v[8],
        files_considered: v[9],
        files_loaded: v[10],
        files_skipped: v[11],
        shards_scanned: v[12],
        shards_skipped: v[13],
        shards_skipped_filter: v[14],
        crashes: v[15],
        duration: Duration::from_millis(ms),
        wait: Duration::from_millis(ms / 2),
    })
}

proptest! {
    #[test]
    fn merge_is_commutative(a in arb_stats(), b in arb_stats()) {
        prop_assert_eq!(Stats::merge([&a, &b]), Stats::merge([&b, &a]));
    }

    #[test]
    fn merge_is_associative(a in arb_stats(), b in arb_stats(), c in arb_stats()) {
        let left = Stats::merge([&Stats::merge([&a, &b]), &c]);
        let right = Stats::merge([&a, &Stats::merge([&b, &c])]);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn empty_merge_is_identity(a in arb_stats()) {
        let mut expected = a.clone();
        expected.duration = Duration::ZERO;
        expected.wait = Duration::ZERO;
        prop_assert_eq!(Stats::merge([&a, &Stats::default()]), expected);
    }
}

#[test]
fn serializes_with_pascal_case_fields() {
    let s = Stats {
        shards_skipped_filter: 3,
        ..Default::default()
    };
    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["ShardsSkippedFilter"], 3);
    assert_eq!(v["FilesSkipped"], 0);
}
