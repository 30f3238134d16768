//! The ASCII record codec shared by every derived store.
//!
//! Store values are sequences of `@`-separated fields concatenated
//! with `,`. The merge operator only ever appends, so a value read
//! back from a store may contain duplicated segments and empty
//! segments (adjacent or trailing commas); readers skip empties and
//! dedup by `(tx_id, vout)`. Each store holds rows of exactly one
//! type, and every row type has a fixed field count, so a wrong arity
//! after splitting is a corruption signal rather than a versioning
//! one.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::hash::Hash as StdHash;

use thiserror::Error;

use crate::contract::{Contract, ContractKind, SensibleId};
use crate::transaction;
use crate::transparent::{OutPoint, Output};

pub mod pool;


/// Separator between fields of one row.
pub const FIELD_SEPARATOR: char = '@';

/// Separator between rows of one value.
pub const ROW_SEPARATOR: char = ',';

/// A record codec error.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The segment splits into the wrong number of fields for its store.
    #[error("wrong field count: expected {expected}, found {found}")]
    Arity { expected: usize, found: usize },

    /// A numeric field failed to parse.
    #[error("invalid integer field: {0}")]
    Int(#[from] std::num::ParseIntError),

    /// A hex field failed to parse.
    #[error("invalid hex field: {0}")]
    Hex(#[from] hex::FromHexError),

    /// A decoder-supplied text field contains a reserved separator.
    #[error("field {0:?} contains a reserved separator")]
    ReservedSeparator(String),

    /// An unknown enum tag.
    #[error("unknown tag: {0:?}")]
    UnknownTag(String),

    /// A sensible id decoded to the wrong byte length.
    #[error("sensible id is {0} bytes, expected 36")]
    SensibleIdLength(usize),

    /// A genesis-utxo row carries a trailing flag other than `1`.
    #[error("invalid spent flag: {0:?}")]
    SpentFlag(String),
}

/// Types that serialize to one `@`-joined row.
pub trait EncodeRecord {
    /// Append this row's fields to `out`, without any row separator.
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError>;

    /// Render this row to a fresh string.
    fn to_record(&self) -> Result<String, RecordError> {
        let mut out = String::new();
        self.encode_record(&mut out)?;
        Ok(out)
    }
}

/// Types that parse from one `@`-joined row.
pub trait DecodeRecord: Sized {
    fn decode_record(segment: &str) -> Result<Self, RecordError>;
}

/// Split a stored value into its non-empty row segments.
pub fn split_rows(value: &str) -> impl Iterator<Item = &str> {
    value.split(ROW_SEPARATOR).filter(|s| !s.is_empty())
}

/// Parse every row of a stored value, failing on the first bad segment.
pub fn decode_rows<T: DecodeRecord>(value: &str) -> Result<Vec<T>, RecordError> {
    split_rows(value).map(T::decode_record).collect()
}

/// Parse the rows of a stored value, dropping corrupt segments.
///
/// Returns the parsed rows and the number of segments skipped; callers
/// log the skip count and may promote the key to the invalid store.
pub fn decode_rows_lossy<T: DecodeRecord>(value: &str) -> (Vec<T>, usize) {
    let mut rows = Vec::new();
    let mut corrupt = 0;
    for segment in split_rows(value) {
        match T::decode_record(segment) {
            Ok(row) => rows.push(row),
            Err(_) => corrupt += 1,
        }
    }
    (rows, corrupt)
}

/// Keep the first row for each key produced by `key`, preserving order.
///
/// Merge-append never dedups, so any read that feeds arithmetic (or a
/// response) collapses duplicates here first.
pub fn dedup_rows<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + StdHash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(key(row)))
        .collect()
}

/// Join pre-encoded segments into a merge suffix.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = pool::take();
    for segment in segments {
        if !out.is_empty() {
            out.push(ROW_SEPARATOR);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Incremental writer for one row.
struct FieldWriter<'a> {
    out: &'a mut String,
    first: bool,
}

impl<'a> FieldWriter<'a> {
    fn new(out: &'a mut String) -> FieldWriter<'a> {
        FieldWriter { out, first: true }
    }

    fn sep(&mut self) {
        if self.first {
            self.first = false;
        } else {
            self.out.push(FIELD_SEPARATOR);
        }
    }

    /// A decoder-supplied text field; separators inside it would shift
    /// every later field, so they are rejected as corrupt.
    fn text(&mut self, value: &str) -> Result<(), RecordError> {
        if value.contains(FIELD_SEPARATOR) || value.contains(ROW_SEPARATOR) {
            return Err(RecordError::ReservedSeparator(value.to_string()));
        }
        self.sep();
        self.out.push_str(value);
        Ok(())
    }

    /// A field whose rendering cannot contain separators (hashes, numbers).
    fn safe(&mut self, value: impl fmt::Display) {
        self.sep();
        let _ = write!(self.out, "{}", value);
    }
}

fn fields_of(segment: &str) -> Vec<&str> {
    segment.split(FIELD_SEPARATOR).collect()
}

fn expect_arity(found: usize, expected: usize) -> Result<(), RecordError> {
    if found == expected {
        Ok(())
    } else {
        Err(RecordError::Arity { expected, found })
    }
}

/// Kind-specific trailing fields of a canonical output row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Tail {
    Ft {
        decimal: u8,
        name: String,
        symbol: String,
    },
    Unique,
    Nft {
        token_supply: u64,
        meta_tx_id: String,
        meta_vout: u32,
    },
    NftSell {
        price: u64,
        contract_address: String,
        /// The seller's address. The output itself pays to the sell
        /// contract, so the seller is only recoverable from here when
        /// the output is later spent.
        nft_address: String,
    },
}

impl Tail {
    fn field_count(kind: ContractKind) -> usize {
        match kind {
            ContractKind::Ft => 3,
            ContractKind::Unique => 0,
            ContractKind::Nft => 3,
            ContractKind::NftSell => 3,
        }
    }
}

/// The canonical output record: one row per contract output, stored in
/// `contract_*_utxo` under the transaction id and reused verbatim by
/// the income, uncheck and genesis-output stores.
///
/// Field order:
/// `tx_id@address@code_hash@genesis@sensible_id@quantity@vout@value@tail…@height@kind`
/// where `quantity` is the token amount for FT rows and the token
/// index for NFT rows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputRow {
    pub tx_id: transaction::Hash,
    pub address: String,
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub quantity: u64,
    pub vout: u32,
    pub value: u64,
    pub tail: Tail,
    pub height: u64,
    pub kind: ContractKind,
}

impl OutputRow {
    /// Build the canonical row for one decoded contract output.
    pub fn from_output(
        tx_id: transaction::Hash,
        vout: u32,
        output: &Output,
        contract: &Contract,
        height: u64,
    ) -> OutputRow {
        let (sensible_id, tail) = match contract {
            Contract::Ft(info) => (
                info.sensible_id.clone(),
                Tail::Ft {
                    decimal: info.decimal,
                    name: info.name.clone(),
                    symbol: info.symbol.clone(),
                },
            ),
            Contract::Unique(info) => (info.sensible_id.clone(), Tail::Unique),
            Contract::Nft(info) => (
                info.sensible_id.clone(),
                Tail::Nft {
                    token_supply: info.token_supply,
                    meta_tx_id: info.meta_tx_id.clone(),
                    meta_vout: info.meta_vout,
                },
            ),
            Contract::NftSell(info) => (
                SensibleId::new(""),
                Tail::NftSell {
                    price: info.price,
                    contract_address: info.contract_address.clone(),
                    nft_address: info.nft_address.clone(),
                },
            ),
        };
        OutputRow {
            tx_id,
            address: output.address.clone(),
            code_hash: contract.code_hash().to_string(),
            genesis: contract.genesis().to_string(),
            sensible_id,
            quantity: contract.quantity(),
            vout,
            value: output.value,
            tail,
            height,
            kind: contract.kind(),
        }
    }

    /// The outpoint this row describes.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            hash: self.tx_id,
            index: self.vout,
        }
    }

    /// The family identity key.
    pub fn contract_key(&self) -> String {
        format!("{}@{}", self.code_hash, self.genesis)
    }

    /// The address whose position a spend of this output debits.
    ///
    /// Sell-contract outputs pay to the contract itself; the position
    /// belongs to the seller recorded in the tail, and the spend side
    /// must key by the same address the income side used.
    pub fn owner_address(&self) -> &str {
        match &self.tail {
            Tail::NftSell { nft_address, .. } => nft_address,
            _ => &self.address,
        }
    }
}

impl EncodeRecord for OutputRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.safe(self.tx_id);
        w.text(&self.address)?;
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.text(self.sensible_id.as_str())?;
        w.safe(self.quantity);
        w.safe(self.vout);
        w.safe(self.value);
        match &self.tail {
            Tail::Ft {
                decimal,
                name,
                symbol,
            } => {
                w.safe(decimal);
                w.text(name)?;
                w.text(symbol)?;
            }
            Tail::Unique => {}
            Tail::Nft {
                token_supply,
                meta_tx_id,
                meta_vout,
            } => {
                w.safe(token_supply);
                w.text(meta_tx_id)?;
                w.safe(meta_vout);
            }
            Tail::NftSell {
                price,
                contract_address,
                nft_address,
            } => {
                w.safe(price);
                w.text(contract_address)?;
                w.text(nft_address)?;
            }
        }
        w.safe(self.height);
        w.safe(self.kind);
        Ok(())
    }
}

impl DecodeRecord for OutputRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        // The kind tag is the last field; it fixes the expected arity.
        let kind: ContractKind = fields
            .last()
            .ok_or_else(|| RecordError::UnknownTag(String::new()))?
            .parse()?;
        let expected = 10 + Tail::field_count(kind);
        expect_arity(fields.len(), expected)?;

        let tail = match kind {
            ContractKind::Ft => Tail::Ft {
                decimal: fields[8].parse()?,
                name: fields[9].to_string(),
                symbol: fields[10].to_string(),
            },
            ContractKind::Unique => Tail::Unique,
            ContractKind::Nft => Tail::Nft {
                token_supply: fields[8].parse()?,
                meta_tx_id: fields[9].to_string(),
                meta_vout: fields[10].parse()?,
            },
            ContractKind::NftSell => Tail::NftSell {
                price: fields[8].parse()?,
                contract_address: fields[9].to_string(),
                nft_address: fields[10].to_string(),
            },
        };
        Ok(OutputRow {
            tx_id: fields[0].parse()?,
            address: fields[1].to_string(),
            code_hash: fields[2].to_string(),
            genesis: fields[3].to_string(),
            sensible_id: SensibleId::new(fields[4]),
            quantity: fields[5].parse()?,
            vout: fields[6].parse()?,
            value: fields[7].parse()?,
            tail,
            height: fields[expected - 2].parse()?,
            kind,
        })
    }
}

/// A spend record: one row per resolved input, stored under the
/// spending address and under the family key.
///
/// `prev_tx_id@prev_vout@code_hash@genesis@sensible_id@quantity@value@height@spending_tx_id`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpendRow {
    pub prev_tx_id: transaction::Hash,
    pub prev_vout: u32,
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub quantity: u64,
    pub value: u64,
    pub height: u64,
    pub spending_tx_id: transaction::Hash,
}

impl SpendRow {
    /// The outpoint being consumed.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            hash: self.prev_tx_id,
            index: self.prev_vout,
        }
    }
}

impl EncodeRecord for SpendRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.safe(self.prev_tx_id);
        w.safe(self.prev_vout);
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.text(self.sensible_id.as_str())?;
        w.safe(self.quantity);
        w.safe(self.value);
        w.safe(self.height);
        w.safe(self.spending_tx_id);
        Ok(())
    }
}

impl DecodeRecord for SpendRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 9)?;
        Ok(SpendRow {
            prev_tx_id: fields[0].parse()?,
            prev_vout: fields[1].parse()?,
            code_hash: fields[2].to_string(),
            genesis: fields[3].to_string(),
            sensible_id: SensibleId::new(fields[4]),
            quantity: fields[5].parse()?,
            value: fields[6].parse()?,
            height: fields[7].parse()?,
            spending_tx_id: fields[8].parse()?,
        })
    }
}

/// An owner-balance delta: `address@quantity@tx_id@vout`.
///
/// Balance per address is Σ owners_income − Σ owners_spend with
/// `(tx_id, vout)` dedup on each side.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OwnerRow {
    pub address: String,
    pub quantity: u64,
    pub tx_id: transaction::Hash,
    pub vout: u32,
}

impl EncodeRecord for OwnerRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(&self.address)?;
        w.safe(self.quantity);
        w.safe(self.tx_id);
        w.safe(self.vout);
        Ok(())
    }
}

impl DecodeRecord for OwnerRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 4)?;
        Ok(OwnerRow {
            address: fields[0].to_string(),
            quantity: fields[1].parse()?,
            tx_id: fields[2].parse()?,
            vout: fields[3].parse()?,
        })
    }
}

/// Direction tag of a history row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HistoryKind {
    Income,
    Outcome,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryKind::Income => "income",
            HistoryKind::Outcome => "outcome",
        })
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(HistoryKind::Income),
            "outcome" => Ok(HistoryKind::Outcome),
            other => Err(RecordError::UnknownTag(other.to_string())),
        }
    }
}

/// A history entry: `tx_id@timestamp@{income|outcome}@height`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryRow {
    pub tx_id: transaction::Hash,
    /// Millisecond block timestamp.
    pub time: i64,
    pub kind: HistoryKind,
    pub height: u64,
}

impl EncodeRecord for HistoryRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.safe(self.tx_id);
        w.safe(self.time);
        w.safe(self.kind);
        w.safe(self.height);
        Ok(())
    }
}

impl DecodeRecord for HistoryRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 4)?;
        Ok(HistoryRow {
            tx_id: fields[0].parse()?,
            time: fields[1].parse()?,
            kind: fields[2].parse()?,
            height: fields[3].parse()?,
        })
    }
}

/// FT family metadata, keyed by ContractKey, write-once:
/// `sensible_id@name@symbol@decimal`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FtInfoRow {
    pub sensible_id: SensibleId,
    pub name: String,
    pub symbol: String,
    pub decimal: u8,
}

impl EncodeRecord for FtInfoRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(self.sensible_id.as_str())?;
        w.text(&self.name)?;
        w.text(&self.symbol)?;
        w.safe(self.decimal);
        Ok(())
    }
}

impl DecodeRecord for FtInfoRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 4)?;
        Ok(FtInfoRow {
            sensible_id: SensibleId::new(fields[0]),
            name: fields[1].to_string(),
            symbol: fields[2].to_string(),
            decimal: fields[3].parse()?,
        })
    }
}

/// NFT token metadata, keyed by TokenKey, write-once:
/// `sensible_id@token_supply@meta_tx_id@meta_vout`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NftInfoRow {
    pub sensible_id: SensibleId,
    pub token_supply: u64,
    pub meta_tx_id: String,
    pub meta_vout: u32,
}

impl EncodeRecord for NftInfoRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(self.sensible_id.as_str())?;
        w.safe(self.token_supply);
        w.text(&self.meta_tx_id)?;
        w.safe(self.meta_vout);
        Ok(())
    }
}

impl DecodeRecord for NftInfoRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 4)?;
        Ok(NftInfoRow {
            sensible_id: SensibleId::new(fields[0]),
            token_supply: fields[1].parse()?,
            meta_tx_id: fields[2].to_string(),
            meta_vout: fields[3].parse()?,
        })
    }
}

/// The header of a token family, keyed by the genesis outpoint:
/// `code_hash@genesis@sensible_id@quantity@height`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenesisRow {
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub quantity: u64,
    pub height: u64,
}

impl EncodeRecord for GenesisRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.text(self.sensible_id.as_str())?;
        w.safe(self.quantity);
        w.safe(self.height);
        Ok(())
    }
}

impl DecodeRecord for GenesisRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 5)?;
        Ok(GenesisRow {
            code_hash: fields[0].to_string(),
            genesis: fields[1].to_string(),
            sensible_id: SensibleId::new(fields[2]),
            quantity: fields[3].parse()?,
            height: fields[4].parse()?,
        })
    }
}

/// An unspent genesis descriptor, keyed by its outpoint:
/// `address@code_hash@genesis@sensible_id@quantity@value@height[@1]`.
///
/// The trailing `@1` marks the genesis as spent; once appended it is
/// never removed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenesisUtxoRow {
    pub address: String,
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub quantity: u64,
    pub value: u64,
    pub height: u64,
    pub spent: bool,
}

impl GenesisUtxoRow {
    /// A copy of this row with the spent flag raised.
    pub fn into_spent(mut self) -> GenesisUtxoRow {
        self.spent = true;
        self
    }
}

impl EncodeRecord for GenesisUtxoRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(&self.address)?;
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.text(self.sensible_id.as_str())?;
        w.safe(self.quantity);
        w.safe(self.value);
        w.safe(self.height);
        if self.spent {
            w.safe(1);
        }
        Ok(())
    }
}

impl DecodeRecord for GenesisUtxoRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        let spent = match fields.len() {
            7 => false,
            8 if fields[7] == "1" => true,
            8 => return Err(RecordError::SpentFlag(fields[7].to_string())),
            found => return Err(RecordError::Arity { expected: 7, found }),
        };
        Ok(GenesisUtxoRow {
            address: fields[0].to_string(),
            code_hash: fields[1].to_string(),
            genesis: fields[2].to_string(),
            sensible_id: SensibleId::new(fields[3]),
            quantity: fields[4].parse()?,
            value: fields[5].parse()?,
            height: fields[6].parse()?,
            spent,
        })
    }
}

/// A lineage record, keyed by the spending transaction id: what prior
/// output did this transaction consume?
///
/// `address@code_hash@genesis@sensible_id@quantity@prev_tx_id@prev_vout@value@height`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UsedRow {
    pub address: String,
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub quantity: u64,
    pub prev_tx_id: transaction::Hash,
    pub prev_vout: u32,
    pub value: u64,
    pub height: u64,
}

impl EncodeRecord for UsedRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.text(&self.address)?;
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.text(self.sensible_id.as_str())?;
        w.safe(self.quantity);
        w.safe(self.prev_tx_id);
        w.safe(self.prev_vout);
        w.safe(self.value);
        w.safe(self.height);
        Ok(())
    }
}

impl DecodeRecord for UsedRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 9)?;
        Ok(UsedRow {
            address: fields[0].to_string(),
            code_hash: fields[1].to_string(),
            genesis: fields[2].to_string(),
            sensible_id: SensibleId::new(fields[3]),
            quantity: fields[4].parse()?,
            prev_tx_id: fields[5].parse()?,
            prev_vout: fields[6].parse()?,
            value: fields[7].parse()?,
            height: fields[8].parse()?,
        })
    }
}

/// A unique-contract spend: `prev_tx_id@prev_vout@spending_tx_id`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniqueSpendRow {
    pub prev_tx_id: transaction::Hash,
    pub prev_vout: u32,
    pub spending_tx_id: transaction::Hash,
}

impl EncodeRecord for UniqueSpendRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.safe(self.prev_tx_id);
        w.safe(self.prev_vout);
        w.safe(self.spending_tx_id);
        Ok(())
    }
}

impl DecodeRecord for UniqueSpendRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 3)?;
        Ok(UniqueSpendRow {
            prev_tx_id: fields[0].parse()?,
            prev_vout: fields[1].parse()?,
            spending_tx_id: fields[2].parse()?,
        })
    }
}

/// An NFT sell-contract income row:
/// `tx_id@vout@code_hash@genesis@price@contract_address@value@height`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SellRow {
    pub tx_id: transaction::Hash,
    pub vout: u32,
    pub code_hash: String,
    pub genesis: String,
    pub price: u64,
    pub contract_address: String,
    pub value: u64,
    pub height: u64,
}

impl EncodeRecord for SellRow {
    fn encode_record(&self, out: &mut String) -> Result<(), RecordError> {
        let mut w = FieldWriter::new(out);
        w.safe(self.tx_id);
        w.safe(self.vout);
        w.text(&self.code_hash)?;
        w.text(&self.genesis)?;
        w.safe(self.price);
        w.text(&self.contract_address)?;
        w.safe(self.value);
        w.safe(self.height);
        Ok(())
    }
}

impl DecodeRecord for SellRow {
    fn decode_record(segment: &str) -> Result<Self, RecordError> {
        let fields = fields_of(segment);
        expect_arity(fields.len(), 8)?;
        Ok(SellRow {
            tx_id: fields[0].parse()?,
            vout: fields[1].parse()?,
            code_hash: fields[2].to_string(),
            genesis: fields[3].to_string(),
            price: fields[4].parse()?,
            contract_address: fields[5].to_string(),
            value: fields[6].parse()?,
            height: fields[7].parse()?,
        })
    }
}
