//! Shared fixtures: an in-memory chain adapter and contract-output
//! builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use quagga_chain::block::{self, Block, Height};
use quagga_chain::contract::{Contract, FtInfo, NftInfo, NftSellInfo, SensibleId};
use quagga_chain::parameters::{Chain, ChainParams, Network};
use quagga_chain::transaction::{self, Transaction};
use quagga_chain::transparent::{Input, OutPoint, Output};
use quagga_index::adapter::{BoxError, ChainAdapter};

pub fn hash(byte: u8) -> transaction::Hash {
    transaction::Hash([byte; 32])
}

pub fn outpoint(tx: u8, index: u32) -> OutPoint {
    OutPoint {
        hash: hash(tx),
        index,
    }
}

pub fn sensible_for(genesis_tx: transaction::Hash, vout: u32) -> SensibleId {
    SensibleId::new(format!("{}{}", genesis_tx, hex::encode(vout.to_le_bytes())))
}

pub fn ft_output(address: &str, amount: u64, sensible: SensibleId) -> Output {
    Output {
        address: address.to_string(),
        value: 546,
        contract: Some(Contract::Ft(FtInfo {
            code_hash: "c0de".to_string(),
            genesis: "9e4e".to_string(),
            sensible_id: sensible,
            amount,
            decimal: 8,
            name: "Example Token".to_string(),
            symbol: "EXT".to_string(),
        })),
    }
}

pub fn nft_output(
    address: &str,
    sensible: SensibleId,
    token_index: u64,
    meta_tx_id: String,
) -> Output {
    Output {
        address: address.to_string(),
        value: 546,
        contract: Some(Contract::Nft(NftInfo {
            code_hash: "nf7c".to_string(),
            genesis: "0123".to_string(),
            sensible_id: sensible,
            token_index,
            token_supply: 10,
            meta_tx_id,
            meta_vout: 0,
        })),
    }
}

pub fn nft_sell_output(nft_address: &str, price: u64, token_index: u64) -> Output {
    Output {
        // The output itself pays to the sell contract's P2SH address.
        address: "addr-sell-contract".to_string(),
        value: 546,
        contract: Some(Contract::NftSell(NftSellInfo {
            code_hash: "se11".to_string(),
            genesis: "0123".to_string(),
            nft_address: nft_address.to_string(),
            price,
            contract_address: "addr-sell-contract".to_string(),
            token_index,
        })),
    }
}

pub fn coinbase_tx(id: u8, outputs: Vec<Output>) -> Transaction {
    Transaction {
        id: hash(id),
        time: 1_600_000_000_000,
        inputs: vec![Input::Coinbase],
        outputs,
    }
}

pub fn spending_tx(id: u8, spends: Vec<OutPoint>, outputs: Vec<Output>) -> Transaction {
    Transaction {
        id: hash(id),
        time: 1_600_000_000_000,
        inputs: spends
            .into_iter()
            .map(|outpoint| Input::PrevOut { outpoint })
            .collect(),
        outputs,
    }
}

pub fn block_at(height: u64, transactions: Vec<Transaction>) -> Block {
    Block {
        height: Height(height),
        hash: block::Hash([height as u8; 32]),
        time: 1_600_000_000_000 + height as i64 * 1000,
        is_partial: false,
        transactions: transactions.into_iter().map(Arc::new).collect(),
    }
}

/// An in-memory chain: blocks appended at runtime, plus a fake
/// mempool served through `raw_mempool`/`get_transaction`.
pub struct MockAdapter {
    blocks: Mutex<Vec<Block>>,
    mempool: Mutex<HashMap<transaction::Hash, Transaction>>,
}

impl MockAdapter {
    pub fn with_blocks(blocks: Vec<Block>) -> Arc<MockAdapter> {
        Arc::new(MockAdapter {
            blocks: Mutex::new(blocks),
            mempool: Mutex::new(HashMap::new()),
        })
    }

    /// Append the next block; the coordinator picks it up on its next
    /// poll.
    pub fn push_block(&self, block: Block) {
        self.blocks.lock().unwrap().push(block);
    }

    pub fn add_mempool_tx(&self, tx: Transaction) {
        self.mempool.lock().unwrap().insert(tx.id, tx);
    }
}

impl ChainAdapter for MockAdapter {
    fn connect(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn chain_name(&self) -> &str {
        "mock"
    }

    fn chain_params(&self) -> ChainParams {
        ChainParams {
            chain: Chain::Btc,
            network: Network::Regtest,
        }
    }

    fn block_count(&self) -> Result<Height, BoxError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(Height(blocks.len() as u64 - 1))
    }

    fn block_hash(&self, height: Height) -> Result<block::Hash, BoxError> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .get(height.0 as usize)
            .map(|block| block.hash)
            .ok_or_else(|| "height past tip".into())
    }

    fn get_block(&self, height: Height) -> Result<Block, BoxError> {
        let blocks = self.blocks.lock().unwrap();
        blocks
            .get(height.0 as usize)
            .cloned()
            .ok_or_else(|| "height past tip".into())
    }

    fn get_transaction(&self, id: transaction::Hash) -> Result<Transaction, BoxError> {
        self.mempool
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| "unknown transaction".into())
    }

    fn raw_mempool(&self) -> Result<Vec<transaction::Hash>, BoxError> {
        Ok(self.mempool.lock().unwrap().keys().copied().collect())
    }

    fn find_reorg_height(&self) -> Result<Option<(Height, Height)>, BoxError> {
        Ok(None)
    }
}
