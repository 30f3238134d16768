//! Optional compressed archive of parsed blocks.
//!
//! Layout under the archive root:
//! `blockFiles/<millions>/<thousands>/<height>[_part_N].dat.zst`,
//! each file a zstd frame around a Protocol-Buffers serialization of
//! the parsed block. The archive exists for replay and backfill; the
//! indexing pipeline never reads it on the hot path.

use std::convert::TryFrom;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prost::Message;
use thiserror::Error;

use crate::block::{Block, Height};
use crate::contract::{Contract, FtInfo, NftInfo, NftSellInfo, SensibleId, UniqueInfo};
use crate::record::RecordError;
use crate::transaction::Transaction;
use crate::transparent::{Input, OutPoint, Output};


/// Directory name of the archive under the data directory.
pub const ARCHIVE_DIR: &str = "blockFiles";

/// zstd compression level for archive frames.
const COMPRESSION_LEVEL: i32 = 3;

/// An archive read or write error.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive io error: {0}")]
    Io(#[from] io::Error),

    #[error("archive protobuf error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("archived block is malformed: {0}")]
    Record(#[from] RecordError),
}

#[derive(Clone, PartialEq, Message)]
struct BlockProto {
    #[prost(uint64, tag = "1")]
    height: u64,
    #[prost(string, tag = "2")]
    hash: String,
    #[prost(int64, tag = "3")]
    time: i64,
    #[prost(bool, tag = "4")]
    is_partial: bool,
    #[prost(message, repeated, tag = "5")]
    transactions: Vec<TransactionProto>,
}

#[derive(Clone, PartialEq, Message)]
struct TransactionProto {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(int64, tag = "2")]
    time: i64,
    #[prost(message, repeated, tag = "3")]
    inputs: Vec<InputProto>,
    #[prost(message, repeated, tag = "4")]
    outputs: Vec<OutputProto>,
}

#[derive(Clone, PartialEq, Message)]
struct InputProto {
    #[prost(bool, tag = "1")]
    coinbase: bool,
    #[prost(string, tag = "2")]
    prev_tx_id: String,
    #[prost(uint32, tag = "3")]
    prev_vout: u32,
}

#[derive(Clone, PartialEq, Message)]
struct OutputProto {
    #[prost(string, tag = "1")]
    address: String,
    #[prost(uint64, tag = "2")]
    value: u64,
    #[prost(message, optional, tag = "3")]
    contract: Option<ContractProto>,
}

/// Flattened contract payload; `kind` selects which fields are
/// meaningful, unused fields keep their protobuf defaults.
#[derive(Clone, PartialEq, Message)]
struct ContractProto {
    #[prost(string, tag = "1")]
    kind: String,
    #[prost(string, tag = "2")]
    code_hash: String,
    #[prost(string, tag = "3")]
    genesis: String,
    #[prost(string, tag = "4")]
    sensible_id: String,
    #[prost(uint64, tag = "5")]
    quantity: u64,
    #[prost(uint32, tag = "6")]
    decimal: u32,
    #[prost(string, tag = "7")]
    name: String,
    #[prost(string, tag = "8")]
    symbol: String,
    #[prost(uint64, tag = "9")]
    token_supply: u64,
    #[prost(string, tag = "10")]
    meta_tx_id: String,
    #[prost(uint32, tag = "11")]
    meta_vout: u32,
    #[prost(uint64, tag = "12")]
    price: u64,
    #[prost(string, tag = "13")]
    contract_address: String,
    #[prost(string, tag = "14")]
    nft_address: String,
}

impl From<&Contract> for ContractProto {
    fn from(contract: &Contract) -> ContractProto {
        let mut proto = ContractProto::default();
        proto.kind = contract.kind().as_str().to_string();
        proto.code_hash = contract.code_hash().to_string();
        proto.genesis = contract.genesis().to_string();
        match contract {
            Contract::Ft(info) => {
                proto.sensible_id = info.sensible_id.as_str().to_string();
                proto.quantity = info.amount;
                proto.decimal = info.decimal as u32;
                proto.name = info.name.clone();
                proto.symbol = info.symbol.clone();
            }
            Contract::Unique(info) => {
                proto.sensible_id = info.sensible_id.as_str().to_string();
            }
            Contract::Nft(info) => {
                proto.sensible_id = info.sensible_id.as_str().to_string();
                proto.quantity = info.token_index;
                proto.token_supply = info.token_supply;
                proto.meta_tx_id = info.meta_tx_id.clone();
                proto.meta_vout = info.meta_vout;
            }
            Contract::NftSell(info) => {
                proto.quantity = info.token_index;
                proto.price = info.price;
                proto.contract_address = info.contract_address.clone();
                proto.nft_address = info.nft_address.clone();
            }
        }
        proto
    }
}

impl TryFrom<ContractProto> for Contract {
    type Error = RecordError;

    fn try_from(proto: ContractProto) -> Result<Contract, RecordError> {
        Ok(match proto.kind.as_str() {
            "ft" => Contract::Ft(FtInfo {
                code_hash: proto.code_hash,
                genesis: proto.genesis,
                sensible_id: SensibleId::new(proto.sensible_id),
                amount: proto.quantity,
                decimal: proto.decimal as u8,
                name: proto.name,
                symbol: proto.symbol,
            }),
            "unique" => Contract::Unique(UniqueInfo {
                code_hash: proto.code_hash,
                genesis: proto.genesis,
                sensible_id: SensibleId::new(proto.sensible_id),
            }),
            "nft" => Contract::Nft(NftInfo {
                code_hash: proto.code_hash,
                genesis: proto.genesis,
                sensible_id: SensibleId::new(proto.sensible_id),
                token_index: proto.quantity,
                token_supply: proto.token_supply,
                meta_tx_id: proto.meta_tx_id,
                meta_vout: proto.meta_vout,
            }),
            "nft_sell" => Contract::NftSell(NftSellInfo {
                code_hash: proto.code_hash,
                genesis: proto.genesis,
                nft_address: proto.nft_address,
                price: proto.price,
                contract_address: proto.contract_address,
                token_index: proto.quantity,
            }),
            other => return Err(RecordError::UnknownTag(other.to_string())),
        })
    }
}

impl From<&Block> for BlockProto {
    fn from(block: &Block) -> BlockProto {
        BlockProto {
            height: block.height.0,
            hash: block.hash.to_string(),
            time: block.time,
            is_partial: block.is_partial,
            transactions: block
                .transactions
                .iter()
                .map(|tx| TransactionProto {
                    id: tx.id.to_string(),
                    time: tx.time,
                    inputs: tx
                        .inputs
                        .iter()
                        .map(|input| match input {
                            Input::Coinbase => InputProto {
                                coinbase: true,
                                ..InputProto::default()
                            },
                            Input::PrevOut { outpoint } => InputProto {
                                coinbase: false,
                                prev_tx_id: outpoint.hash.to_string(),
                                prev_vout: outpoint.index,
                            },
                        })
                        .collect(),
                    outputs: tx
                        .outputs
                        .iter()
                        .map(|output| OutputProto {
                            address: output.address.clone(),
                            value: output.value,
                            contract: output.contract.as_ref().map(ContractProto::from),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<BlockProto> for Block {
    type Error = RecordError;

    fn try_from(proto: BlockProto) -> Result<Block, RecordError> {
        let mut transactions = Vec::with_capacity(proto.transactions.len());
        for tx in proto.transactions {
            let mut inputs = Vec::with_capacity(tx.inputs.len());
            for input in tx.inputs {
                inputs.push(if input.coinbase {
                    Input::Coinbase
                } else {
                    Input::PrevOut {
                        outpoint: OutPoint {
                            hash: input.prev_tx_id.parse()?,
                            index: input.prev_vout,
                        },
                    }
                });
            }
            let mut outputs = Vec::with_capacity(tx.outputs.len());
            for output in tx.outputs {
                outputs.push(Output {
                    address: output.address,
                    value: output.value,
                    contract: output.contract.map(Contract::try_from).transpose()?,
                });
            }
            transactions.push(Arc::new(Transaction {
                id: tx.id.parse()?,
                time: tx.time,
                inputs,
                outputs,
            }));
        }
        Ok(Block {
            height: Height(proto.height),
            hash: proto.hash.parse()?,
            time: proto.time,
            is_partial: proto.is_partial,
            transactions,
        })
    }
}

/// The archive file path for a block, relative to `root`.
pub fn archive_path(root: &Path, height: Height, part: Option<u32>) -> PathBuf {
    let millions = height.0 / 1_000_000;
    let thousands = (height.0 % 1_000_000) / 1_000;
    let name = match part {
        Some(n) => format!("{}_part_{}.dat.zst", height, n),
        None => format!("{}.dat.zst", height),
    };
    root.join(ARCHIVE_DIR)
        .join(millions.to_string())
        .join(thousands.to_string())
        .join(name)
}

/// Serialize, compress, and write one block to the archive.
///
/// Returns the path written. Parent directories are created as needed;
/// an existing file for the same height is overwritten, which makes
/// replay after a partially indexed block safe.
pub fn write_block(root: &Path, block: &Block, part: Option<u32>) -> Result<PathBuf, ArchiveError> {
    let path = archive_path(root, block.height, part);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let proto = BlockProto::from(block);
    let encoded = proto.encode_to_vec();
    let compressed = zstd::stream::encode_all(&encoded[..], COMPRESSION_LEVEL)?;
    fs::write(&path, compressed)?;
    Ok(path)
}

/// Read one archived block back.
pub fn read_block(path: &Path) -> Result<Block, ArchiveError> {
    let compressed = fs::read(path)?;
    let encoded = zstd::stream::decode_all(&compressed[..])?;
    let proto = BlockProto::decode(&encoded[..])?;
    Ok(Block::try_from(proto)?)
}
