use std::sync::Arc;

use quagga_chain::block::{self, Block, Height};
use quagga_chain::contract::{Contract, FtInfo, SensibleId, TokenFamily};
use quagga_chain::transaction::Transaction;
use quagga_chain::transparent::{Input, OutPoint, Output};
use tempdir::TempDir;

use super::*;
use crate::mempool::ConfirmedDelta;
use crate::{input, output};

fn hash(byte: u8) -> transaction::Hash {
    transaction::Hash([byte; 32])
}

fn sensible_for(genesis_tx: transaction::Hash, vout: u32) -> SensibleId {
    SensibleId::new(format!("{}{}", genesis_tx, hex::encode(vout.to_le_bytes())))
}

fn ft_output(address: &str, amount: u64, sensible: SensibleId) -> Output {
    Output {
        address: address.to_string(),
        value: 546,
        contract: Some(Contract::Ft(FtInfo {
            code_hash: "c0de".to_string(),
            genesis: "9e4e".to_string(),
            sensible_id: sensible,
            amount,
            decimal: 8,
            name: "Token".to_string(),
            symbol: "TOK".to_string(),
        })),
    }
}

fn block_at(height: u64, transactions: Vec<Transaction>) -> Block {
    Block {
        height: Height(height),
        hash: block::Hash([height as u8; 32]),
        time: 1_600_000_000_000 + height as i64,
        is_partial: false,
        transactions: transactions.into_iter().map(Arc::new).collect(),
    }
}

struct Harness {
    _dir: TempDir,
    stores: Arc<FamilyStores>,
}

/// Genesis 1000 to addr-a at H=1, then a transfer of the whole amount
/// to addr-b at H=2.
fn indexed_transfer() -> Harness {
    let dir = TempDir::new("quagga-query").unwrap();
    let config = quagga_store::Config {
        data_dir: dir.path().to_path_buf(),
        shard_count: 2,
        ..quagga_store::Config::default()
    };
    let stores = Arc::new(FamilyStores::open(&config, TokenFamily::Ft).unwrap());

    let genesis = Transaction {
        id: hash(0x10),
        time: 0,
        inputs: vec![Input::Coinbase],
        outputs: vec![ft_output("addr-a", 1000, SensibleId::sentinel())],
    };
    let transfer = Transaction {
        id: hash(0x20),
        time: 0,
        inputs: vec![Input::PrevOut {
            outpoint: OutPoint {
                hash: hash(0x10),
                index: 0,
            },
        }],
        outputs: vec![ft_output("addr-b", 1000, sensible_for(hash(0x10), 0))],
    };

    for block in [block_at(1, vec![genesis]), block_at(2, vec![transfer])] {
        let mut delta = ConfirmedDelta::default();
        output::index_block(&stores, &block, 1000, &mut delta).unwrap();
        input::resolve_block(&stores, None, &block, 1000, &mut delta).unwrap();
    }

    Harness { _dir: dir, stores }
}

#[test]
fn balances_follow_the_transfer() {
    quagga_test::init();
    let harness = indexed_transfer();

    let a = balance(&harness.stores, None, "addr-a", None).unwrap();
    assert_eq!(a.confirmed_income, 1000);
    assert_eq!(a.confirmed_spend, 1000);
    assert_eq!(a.confirmed(), 0);

    let b = balance(&harness.stores, None, "addr-b", Some("c0de@9e4e")).unwrap();
    assert_eq!(b.confirmed(), 1000);

    // A key filter for a family the address never held.
    let other = balance(&harness.stores, None, "addr-b", Some("c0de@feed")).unwrap();
    assert_eq!(other.confirmed(), 0);
}

#[test]
fn owners_and_supply_dedup_by_outpoint() {
    quagga_test::init();
    let harness = indexed_transfer();

    let owners = owners(&harness.stores, "c0de@9e4e").unwrap();
    assert_eq!(owners.get("addr-b"), Some(&1000));
    // addr-a netted to zero and is dropped from the view.
    assert!(owners.get("addr-a").is_none());

    assert_eq!(supply(&harness.stores, "c0de@9e4e").unwrap(), 1000);
}

#[test]
fn reindexing_the_same_block_does_not_change_balances() {
    quagga_test::init();
    let harness = indexed_transfer();

    // Re-feed block 2; raw values now carry duplicate segments.
    let transfer = Transaction {
        id: hash(0x20),
        time: 0,
        inputs: vec![Input::PrevOut {
            outpoint: OutPoint {
                hash: hash(0x10),
                index: 0,
            },
        }],
        outputs: vec![ft_output("addr-b", 1000, sensible_for(hash(0x10), 0))],
    };
    let block = block_at(2, vec![transfer]);
    let mut delta = ConfirmedDelta::default();
    output::index_block(&harness.stores, &block, 1000, &mut delta).unwrap();
    input::resolve_block(&harness.stores, None, &block, 1000, &mut delta).unwrap();

    let raw = harness
        .stores
        .address_income
        .get_string("addr-b")
        .unwrap()
        .unwrap();
    assert!(raw.contains(','), "duplicate segments are expected");

    let b = balance(&harness.stores, None, "addr-b", None).unwrap();
    assert_eq!(b.confirmed(), 1000);
    assert_eq!(supply(&harness.stores, "c0de@9e4e").unwrap(), 1000);
}

#[test]
fn history_records_both_directions() {
    quagga_test::init();
    let harness = indexed_transfer();

    let a = address_history(&harness.stores, "addr-a").unwrap();
    let kinds: Vec<_> = a.iter().map(|row| row.kind).collect();
    assert_eq!(
        kinds,
        vec![
            quagga_chain::record::HistoryKind::Income,
            quagga_chain::record::HistoryKind::Outcome
        ]
    );
    assert_eq!(a[0].height, 1);
    assert_eq!(a[1].height, 2);

    // The family history saw the issuance, the transfer income, and
    // the transfer outcome.
    let family = family_history(&harness.stores, "c0de@9e4e").unwrap();
    assert_eq!(family.len(), 3);
}

#[test]
fn ft_info_is_recorded_by_the_first_non_genesis_output() {
    quagga_test::init();
    let harness = indexed_transfer();

    let info = ft_info(&harness.stores, "c0de@9e4e").unwrap().unwrap();
    assert_eq!(info.symbol, "TOK");
    assert_eq!(info.decimal, 8);

    assert!(ft_info(&harness.stores, "dead@beef").unwrap().is_none());
}

#[test]
fn address_utxos_excludes_spent_outpoints() {
    quagga_test::init();
    let harness = indexed_transfer();

    assert!(address_utxos(&harness.stores, "addr-a").unwrap().is_empty());

    let utxos = address_utxos(&harness.stores, "addr-b").unwrap();
    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].tx_id, hash(0x20));
    assert_eq!(utxos[0].quantity, 1000);
}
