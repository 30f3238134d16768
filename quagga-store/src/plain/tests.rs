use tempdir::TempDir;

use super::*;

fn open_in(dir: &TempDir) -> PlainStore {
    PlainStore::open("mempool_test", dir.path().join("mempool_test")).unwrap()
}

#[test]
fn prefix_scan_only_sees_matching_keys() {
    quagga_test::init();

    let dir = TempDir::new("quagga-plain").unwrap();
    let store = open_in(&dir);

    store.set("addr-a_tx1:0", "row-a0").unwrap();
    store.set("addr-a_tx2:1", "row-a1").unwrap();
    store.set("addr-b_tx3:0", "row-b0").unwrap();

    let rows = store.scan_prefix("addr-a_").unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|(k, _)| k.starts_with("addr-a_")));

    assert!(store.scan_prefix("addr-z_").unwrap().is_empty());
}

#[test]
fn delete_prefix_removes_exactly_the_prefix() {
    quagga_test::init();

    let dir = TempDir::new("quagga-plain").unwrap();
    let store = open_in(&dir);

    store.set("addr-a_tx1:0", "row").unwrap();
    store.set("addr-a_tx2:1", "row").unwrap();
    store.set("addr-ab_tx4:0", "row").unwrap();

    // "addr-a_" must not touch "addr-ab_" keys.
    let removed = store.delete_prefix("addr-a_").unwrap();
    assert_eq!(removed, 2);
    assert!(store.get("addr-a_tx1:0").unwrap().is_none());
    assert!(store.get("addr-ab_tx4:0").unwrap().is_some());
}

#[test]
fn merge_concatenates_like_the_sharded_store() {
    quagga_test::init();

    let dir = TempDir::new("quagga-plain").unwrap();
    let store = open_in(&dir);

    store.merge("k", "a").unwrap();
    store.merge("k", "b").unwrap();
    assert_eq!(store.get_string("k").unwrap().unwrap(), "a,b");
}

#[test]
fn wipe_discards_all_rows() {
    quagga_test::init();

    let dir = TempDir::new("quagga-plain").unwrap();
    let store = open_in(&dir);

    store.set("k1", "v").unwrap();
    store.set("k2", "v").unwrap();

    let store = store.wipe().unwrap();
    assert!(store.get("k1").unwrap().is_none());
    assert!(store.scan_n(10).unwrap().is_empty());

    // The wiped store is immediately writable again.
    store.set("k3", "v").unwrap();
    assert!(store.get("k3").unwrap().is_some());
}
