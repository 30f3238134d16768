use super::*;
use crate::contract::{Contract, SensibleId, UniqueInfo};
use crate::transparent::{Input, OutPoint, Output};

fn plain_output() -> Output {
    Output {
        address: "addr-a".to_string(),
        value: 546,
        contract: None,
    }
}

fn unique_output() -> Output {
    Output {
        address: "addr-a".to_string(),
        value: 546,
        contract: Some(Contract::Unique(UniqueInfo {
            code_hash: "c0de".to_string(),
            genesis: "9e4e".to_string(),
            sensible_id: SensibleId::sentinel(),
        })),
    }
}

#[test]
fn coinbase_outpoint_sentinel() {
    quagga_test::init();

    let coinbase = OutPoint {
        hash: Hash::ZERO,
        index: OutPoint::COINBASE_INDEX,
    };
    assert!(coinbase.is_coinbase());

    let normal = OutPoint {
        hash: Hash([1; 32]),
        index: OutPoint::COINBASE_INDEX,
    };
    assert!(!normal.is_coinbase());
}

#[test]
fn outpoint_canonical_string_roundtrip() {
    quagga_test::init();

    let outpoint = OutPoint {
        hash: Hash([0xcd; 32]),
        index: 7,
    };
    let rendered = outpoint.to_string();
    assert_eq!(rendered, format!("{}:7", "cd".repeat(32)));
    assert_eq!(rendered.parse::<OutPoint>().unwrap(), outpoint);
}

#[test]
fn contract_outputs_skips_plain_value_outputs() {
    quagga_test::init();

    let tx = Transaction {
        id: Hash([9; 32]),
        time: 0,
        inputs: vec![Input::Coinbase],
        outputs: vec![plain_output(), unique_output(), plain_output()],
    };
    let indexes: Vec<u32> = tx.contract_outputs().map(|(i, _, _)| i).collect();
    assert_eq!(indexes, vec![1]);
}

#[test]
fn spent_outpoints_skips_coinbase_inputs() {
    quagga_test::init();

    let outpoint = OutPoint {
        hash: Hash([3; 32]),
        index: 0,
    };
    let tx = Transaction {
        id: Hash([9; 32]),
        time: 0,
        inputs: vec![Input::Coinbase, Input::PrevOut { outpoint }],
        outputs: vec![unique_output()],
    };
    let spent: Vec<&OutPoint> = tx.spent_outpoints().collect();
    assert_eq!(spent, vec![&outpoint]);
    assert!(!tx.is_coinbase());
}

#[test]
fn hash_display_is_lowercase_hex() {
    quagga_test::init();

    let hash = Hash([0xAB; 32]);
    assert_eq!(hash.to_string(), "ab".repeat(32));
    assert_eq!(hash.to_string().parse::<Hash>().unwrap(), hash);
}
