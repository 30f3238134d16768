use std::sync::Arc;

use super::*;
use crate::transaction::Transaction;

fn tx(byte: u8) -> Arc<Transaction> {
    Arc::new(Transaction {
        id: crate::transaction::Hash([byte; 32]),
        time: 0,
        inputs: Vec::new(),
        outputs: Vec::new(),
    })
}

fn block_with(txs: usize) -> Block {
    Block {
        height: Height(100),
        hash: Hash([0x0b; 32]),
        time: 1_600_000_000_000,
        is_partial: false,
        transactions: (0..txs).map(|i| tx(i as u8)).collect(),
    }
}

#[test]
fn small_blocks_are_never_split() {
    quagga_test::init();

    let partials = block_with(3).split_into_partials(10);
    assert_eq!(partials.len(), 1);
    assert!(!partials[0].is_partial);
}

#[test]
fn oversized_blocks_split_with_partial_flag_on_all_but_last() {
    quagga_test::init();

    let partials = block_with(25).split_into_partials(10);
    assert_eq!(partials.len(), 3);
    assert_eq!(
        partials.iter().map(|b| b.transactions.len()).sum::<usize>(),
        25
    );
    assert!(partials[0].is_partial);
    assert!(partials[1].is_partial);
    assert!(!partials[2].is_partial);
    // Every slice keeps the parent block identity.
    for partial in &partials {
        assert_eq!(partial.height, Height(100));
        assert_eq!(partial.time, 1_600_000_000_000);
    }
}

#[test]
fn exact_multiple_still_marks_only_the_last_slice_final() {
    quagga_test::init();

    let partials = block_with(20).split_into_partials(10);
    assert_eq!(partials.len(), 2);
    assert!(partials[0].is_partial);
    assert!(!partials[1].is_partial);
}
