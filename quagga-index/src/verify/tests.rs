use std::sync::Arc;

use quagga_chain::record::{GenesisUtxoRow, Tail};
use quagga_chain::transaction;
use tempdir::TempDir;

use super::*;
use quagga_chain::contract::ContractKind;

fn hash(byte: u8) -> transaction::Hash {
    transaction::Hash([byte; 32])
}

fn sensible_for(genesis_tx: transaction::Hash, vout: u32) -> SensibleId {
    SensibleId::new(format!("{}{}", genesis_tx, hex::encode(vout.to_le_bytes())))
}

fn open_stores(dir: &TempDir, family: TokenFamily) -> Arc<FamilyStores> {
    let config = quagga_store::Config {
        data_dir: dir.path().to_path_buf(),
        shard_count: 2,
        ..quagga_store::Config::default()
    };
    Arc::new(FamilyStores::open(&config, family).unwrap())
}

fn ft_row(tx: u8, vout: u32, sensible: SensibleId) -> OutputRow {
    OutputRow {
        tx_id: hash(tx),
        address: "addr-a".to_string(),
        code_hash: "c0de".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: sensible,
        quantity: 1000,
        vout,
        value: 546,
        tail: Tail::Ft {
            decimal: 8,
            name: "Token".to_string(),
            symbol: "TOK".to_string(),
        },
        height: 5,
        kind: ContractKind::Ft,
    }
}

fn enqueue(stores: &FamilyStores, row: &OutputRow) -> String {
    let key = row.outpoint().to_string();
    stores
        .uncheck
        .merge(&key, &row.to_record().unwrap())
        .unwrap();
    key
}

#[test]
fn genesis_sentinel_promotes_immediately() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let row = ft_row(0x11, 0, SensibleId::sentinel());
    let key = enqueue(&stores, &row);

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    assert_eq!(verifier.tick().unwrap(), 1);

    // Promoted into both valid indexes and out of the queue.
    assert!(stores
        .address_income_valid
        .get_string("addr-a")
        .unwrap()
        .is_some());
    assert!(stores
        .code_income_valid
        .get_string("c0de@9e4e")
        .unwrap()
        .is_some());
    assert!(stores.uncheck.get(&key).unwrap().is_none());
}

#[test]
fn outpoint_without_lineage_stays_queued() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let row = ft_row(0x11, 0, sensible_for(hash(0x10), 0));
    let key = enqueue(&stores, &row);

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    assert_eq!(verifier.tick().unwrap(), 0);
    assert!(stores.uncheck.get(&key).unwrap().is_some());
}

#[test]
fn matching_lineage_in_used_income_promotes() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let sensible = sensible_for(hash(0x10), 0);
    let row = ft_row(0x11, 0, sensible.clone());
    let key = enqueue(&stores, &row);

    // The spending transaction consumed an output of the same family.
    let used = UsedRow {
        address: "addr-0".to_string(),
        code_hash: "c0de".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: sensible,
        quantity: 1000,
        prev_tx_id: hash(0x09),
        prev_vout: 0,
        value: 546,
        height: 4,
    };
    stores
        .used_income
        .merge(&hash(0x11).to_string(), &used.to_record().unwrap())
        .unwrap();

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    assert_eq!(verifier.tick().unwrap(), 1);
    assert!(stores.uncheck.get(&key).unwrap().is_none());
}

#[test]
fn mismatched_family_does_not_promote() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let row = ft_row(0x11, 0, sensible_for(hash(0x10), 0));
    let key = enqueue(&stores, &row);

    // Lineage exists but belongs to a different code hash.
    let used = UsedRow {
        address: "addr-0".to_string(),
        code_hash: "other".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: sensible_for(hash(0x10), 0),
        quantity: 1000,
        prev_tx_id: hash(0x09),
        prev_vout: 0,
        value: 546,
        height: 4,
    };
    stores
        .used_income
        .merge(&hash(0x11).to_string(), &used.to_record().unwrap())
        .unwrap();

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    assert_eq!(verifier.tick().unwrap(), 0);
    assert!(stores.uncheck.get(&key).unwrap().is_some());
}

#[test]
fn corrupt_uncheck_records_move_to_the_invalid_store() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let key = format!("{}:0", hash(0x11));
    stores.uncheck.merge(&key, "not@a@valid@row").unwrap();

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    assert_eq!(verifier.tick().unwrap(), 1);
    assert!(stores.uncheck.get(&key).unwrap().is_none());
    assert!(stores.invalid.get_string(&key).unwrap().is_some());
}

#[test]
fn explicit_decoder_feedback_marks_invalid() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let row = ft_row(0x11, 0, sensible_for(hash(0x10), 0));
    let key = enqueue(&stores, &row);

    let verifier = Verifier::new(stores.clone(), Duration::from_secs(5), 1000, 2);
    verifier.mark_invalid(&key, "decoder inconsistency").unwrap();

    assert_eq!(
        stores.invalid.get_string(&key).unwrap().unwrap(),
        "decoder inconsistency"
    );
    assert!(stores.uncheck.get(&key).unwrap().is_none());
}

#[test]
fn nft_genesis_output_branches_match() {
    quagga_test::init();

    let token = OutputRow {
        kind: ContractKind::Nft,
        quantity: 0,
        sensible_id: sensible_for(hash(0x10), 0),
        tail: Tail::Nft {
            token_supply: 10,
            meta_tx_id: "0".repeat(64),
            meta_vout: 0,
        },
        ..ft_row(0x11, 0, sensible_for(hash(0x10), 0))
    };

    // The new-genesis branch: sentinel sensible id.
    assert!(triple_matches(
        &token,
        "c0de",
        "9e4e",
        &SensibleId::sentinel(),
        7,
        true
    ));
    // The token branch: matching token index.
    assert!(triple_matches(
        &token,
        "c0de",
        "9e4e",
        &sensible_for(hash(0x55), 1),
        0,
        true
    ));
    // Neither branch exists for FT.
    assert!(!triple_matches(
        &token,
        "c0de",
        "9e4e",
        &SensibleId::sentinel(),
        7,
        false
    ));
    // Family identity always binds.
    assert!(!triple_matches(
        &token,
        "c0de",
        "other",
        &SensibleId::sentinel(),
        7,
        true
    ));
}

#[test]
fn genesis_spent_flag_survives_verification_reads() {
    quagga_test::init();

    let dir = TempDir::new("quagga-verify").unwrap();
    let stores = open_stores(&dir, TokenFamily::Ft);

    let descriptor = GenesisUtxoRow {
        address: "addr-a".to_string(),
        code_hash: "c0de".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: SensibleId::sentinel(),
        quantity: 1000,
        value: 546,
        height: 1,
        spent: true,
    };
    let key = format!("{}:0", hash(0x10));
    stores
        .genesis_utxo
        .set(&key, &descriptor.to_record().unwrap())
        .unwrap();

    let read = stores.genesis_utxo.get_string(&key).unwrap().unwrap();
    assert!(read.ends_with("@1"));
}
