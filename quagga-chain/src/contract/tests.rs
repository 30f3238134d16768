use super::*;
use crate::transaction;

#[test]
fn sentinel_is_exactly_seventy_two_zeros() {
    quagga_test::init();

    assert_eq!(SENSIBLE_SENTINEL.len(), 72);
    assert!(SensibleId::sentinel().is_sentinel());
    // Near-misses do not trigger the genesis branch.
    assert!(!SensibleId::new("0".repeat(71)).is_sentinel());
    assert!(!SensibleId::new(format!("{}1", "0".repeat(71))).is_sentinel());
}

#[test]
fn sensible_id_recovers_its_genesis_outpoint() {
    quagga_test::init();

    let mut bytes = [0u8; 36];
    bytes[..32].copy_from_slice(&[0xab; 32]);
    bytes[32..].copy_from_slice(&3u32.to_le_bytes());
    let id = SensibleId::new(hex::encode(bytes));

    let point = id.genesis_point().unwrap();
    assert_eq!(point.hash, transaction::Hash([0xab; 32]));
    assert_eq!(point.index, 3);
}

#[test]
fn sensible_id_with_wrong_length_is_corrupt() {
    quagga_test::init();

    let short = SensibleId::new("abcd");
    assert!(matches!(
        short.genesis_point(),
        Err(RecordError::SensibleIdLength(2))
    ));
}

#[test]
fn token_key_orders_lexicographically_like_numerically() {
    quagga_test::init();

    let key = |token_index| {
        TokenKey {
            code_hash: "c0de".to_string(),
            genesis: "9e4e".to_string(),
            token_index,
        }
        .to_string()
    };
    assert!(key(2) < key(10));
    assert!(key(999) < key(1_000_000_000));
    assert_eq!(key(5).rsplit('@').next().unwrap().len(), TOKEN_INDEX_WIDTH);
}

#[test]
fn contract_key_is_code_hash_at_genesis() {
    quagga_test::init();

    let contract = Contract::Unique(UniqueInfo {
        code_hash: "c0de".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: SensibleId::sentinel(),
    });
    assert_eq!(contract.contract_key().to_string(), "c0de@9e4e");
}

#[test]
fn nft_meta_placeholder_detection() {
    quagga_test::init();

    let mut info = NftInfo {
        code_hash: "c0de".to_string(),
        genesis: "9e4e".to_string(),
        sensible_id: SensibleId::sentinel(),
        token_index: 1,
        token_supply: 10,
        meta_tx_id: "0".repeat(64),
        meta_vout: 0,
    };
    assert!(info.meta_is_placeholder());

    info.meta_tx_id = format!("{}1", "0".repeat(63));
    assert!(!info.meta_is_placeholder());
}
