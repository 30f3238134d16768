use std::collections::HashMap;

use tempdir::TempDir;

use super::*;

fn test_config(dir: &TempDir) -> Config {
    Config {
        data_dir: dir.path().to_path_buf(),
        shard_count: 4,
        worker_count: 2,
        max_batch_size_mb: 1,
        db_cache_mb: 8,
        mem_table_mb: 8,
    }
}

#[test]
fn set_get_delete_roundtrip() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    store.set("k1", "v1").unwrap();
    assert_eq!(store.get_string("k1").unwrap().unwrap(), "v1");

    store.delete("k1").unwrap();
    assert_eq!(store.get("k1").unwrap(), None);
    assert_eq!(store.get("missing").unwrap(), None);
}

#[test]
fn merge_appends_in_call_order() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    store.merge("k", "a").unwrap();
    store.merge("k", "b").unwrap();
    store.merge("k", "c").unwrap();
    assert_eq!(store.get_string("k").unwrap().unwrap(), "a,b,c");
}

#[test]
fn shard_routing_is_stable_and_in_range() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    for i in 0..100 {
        let key = format!("key-{}", i);
        let shard = store.shard_index(&key);
        assert!(shard < 4);
        assert_eq!(shard, store.shard_index(&key));
    }
}

#[test]
fn bulk_merge_joins_segments_per_key() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    let mut entries = HashMap::new();
    entries.insert(
        "addr-a".to_string(),
        vec!["row1".to_string(), "row2".to_string()],
    );
    entries.insert("addr-b".to_string(), vec!["row3".to_string()]);
    entries.insert("addr-empty".to_string(), Vec::new());
    store.bulk_merge(&entries).unwrap();

    assert_eq!(store.get_string("addr-a").unwrap().unwrap(), "row1,row2");
    assert_eq!(store.get_string("addr-b").unwrap().unwrap(), "row3");
    assert_eq!(store.get("addr-empty").unwrap(), None);

    // A second bulk call appends after the first.
    store.bulk_merge(&entries).unwrap();
    assert_eq!(
        store.get_string("addr-a").unwrap().unwrap(),
        "row1,row2,row1,row2"
    );
}

#[test]
fn bulk_merge_spanning_many_batches_lands_every_entry() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    // More keys than one batch holds, spread across all shards.
    let entries: HashMap<String, Vec<String>> = (0..12_000)
        .map(|i| (format!("key-{}", i), vec![format!("row-{}", i)]))
        .collect();
    store.bulk_merge(&entries).unwrap();

    for i in (0..12_000).step_by(997) {
        let key = format!("key-{}", i);
        assert_eq!(
            store.get_string(&key).unwrap().unwrap(),
            format!("row-{}", i)
        );
    }
}

#[test]
fn bulk_write_overwrites() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    let mut first = HashMap::new();
    first.insert("k".to_string(), "old".to_string());
    store.bulk_write(&first).unwrap();

    let mut second = HashMap::new();
    second.insert("k".to_string(), "new".to_string());
    store.bulk_write(&second).unwrap();

    assert_eq!(store.get_string("k").unwrap().unwrap(), "new");
}

#[test]
fn bulk_query_returns_only_present_keys() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    store.set("k1", "v1").unwrap();
    store.set("k2", "v2").unwrap();

    let found = store
        .bulk_query(["k1", "k2", "k3"].iter().copied())
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["k1"], "v1");
    assert_eq!(found["k2"], "v2");
    assert!(!found.contains_key("k3"));
}

#[test]
fn scan_n_caps_the_result() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let store = ShardedStore::open(&test_config(&dir), "t").unwrap();

    for i in 0..50 {
        store.set(&format!("key-{}", i), "v").unwrap();
    }
    assert_eq!(store.scan_n(10).unwrap().len(), 10);
    assert_eq!(store.scan_n(1000).unwrap().len(), 50);
}

#[test]
fn data_survives_reopen_after_sync() {
    quagga_test::init();

    let dir = TempDir::new("quagga-sharded").unwrap();
    let config = test_config(&dir);
    {
        let store = ShardedStore::open(&config, "t").unwrap();
        store.merge("k", "row").unwrap();
        store.sync().unwrap();
    }
    let store = ShardedStore::open(&config, "t").unwrap();
    assert_eq!(store.get_string("k").unwrap().unwrap(), "row");
}
