use tempdir::TempDir;

use super::*;

fn test_config(dir: &TempDir, shard_count: usize) -> Config {
    Config {
        data_dir: dir.path().to_path_buf(),
        shard_count,
        ..Config::default()
    }
}

#[test]
fn fresh_meta_records_schema_and_shard_count() {
    quagga_test::init();

    let dir = TempDir::new("quagga-meta").unwrap();
    let meta = MetaStore::open(&test_config(&dir, 8)).unwrap();

    assert_eq!(meta.last_indexed_height(TokenFamily::Ft).unwrap(), None);
    assert_eq!(meta.last_indexed_height(TokenFamily::Nft).unwrap(), None);
}

#[test]
fn reopening_with_a_different_shard_count_is_fatal() {
    quagga_test::init();

    let dir = TempDir::new("quagga-meta").unwrap();
    drop(MetaStore::open(&test_config(&dir, 8)).unwrap());

    match MetaStore::open(&test_config(&dir, 16)) {
        Err(StoreError::ShardCountMismatch { stored, requested }) => {
            assert_eq!(stored, 8);
            assert_eq!(requested, 16);
        }
        other => panic!("expected shard count mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn heights_are_tracked_per_family_and_survive_reopen() {
    quagga_test::init();

    let dir = TempDir::new("quagga-meta").unwrap();
    let config = test_config(&dir, 8);
    {
        let meta = MetaStore::open(&config).unwrap();
        meta.set_last_indexed_height(TokenFamily::Ft, Height(41))
            .unwrap();
        meta.set_last_indexed_height(TokenFamily::Ft, Height(42))
            .unwrap();
        meta.set_last_indexed_height(TokenFamily::Nft, Height(7))
            .unwrap();
    }

    let meta = MetaStore::open(&config).unwrap();
    assert_eq!(
        meta.last_indexed_height(TokenFamily::Ft).unwrap(),
        Some(Height(42))
    );
    assert_eq!(
        meta.last_indexed_height(TokenFamily::Nft).unwrap(),
        Some(Height(7))
    );
}
