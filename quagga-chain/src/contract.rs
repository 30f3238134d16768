//! Contract payloads recognised by the chain-specific script decoders.
//!
//! The decoders themselves are external collaborators; this module
//! only defines the field bags they return and the derived identity
//! keys (`ContractKey`, `TokenKey`) the stores are built around.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::RecordError;
use crate::transparent::OutPoint;

#[cfg(test)]
mod tests;

/// The width of a token index when embedded in a [`TokenKey`].
///
/// Zero-padding to 30 decimal digits keeps lexicographic order equal
/// to numeric order for every representable index.
pub const TOKEN_INDEX_WIDTH: usize = 30;

/// The two indexed token families.
///
/// Each family owns a full set of derived stores and its own
/// last-indexed height, so a deployment can serve one family or both.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFamily {
    Ft,
    Nft,
}

impl TokenFamily {
    /// The short tag used in store names and meta keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFamily::Ft => "ft",
            TokenFamily::Nft => "nft",
        }
    }
}

impl fmt::Display for TokenFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The on-disk type tag for each contract flavour.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// A fungible token output.
    Ft,
    /// The unique (singleton) FT variant.
    Unique,
    /// A non-fungible token output.
    Nft,
    /// An NFT offered for sale through a sell contract.
    NftSell,
}

impl ContractKind {
    /// The string tag stored in the last field of canonical rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractKind::Ft => "ft",
            ContractKind::Unique => "unique",
            ContractKind::Nft => "nft",
            ContractKind::NftSell => "nft_sell",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ft" => Ok(ContractKind::Ft),
            "unique" => Ok(ContractKind::Unique),
            "nft" => Ok(ContractKind::Nft),
            "nft_sell" => Ok(ContractKind::NftSell),
            other => Err(RecordError::UnknownTag(other.to_string())),
        }
    }
}

/// A sensible id: the 72-hex-character pointer from a token output back
/// to the outpoint that issued its family.
///
/// Layout: 32 bytes of genesis transaction id followed by a
/// little-endian u32 genesis output index. The all-zero value is the
/// issuance sentinel carried by genesis outputs themselves.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SensibleId(String);

/// The all-zero issuance sentinel.
pub const SENSIBLE_SENTINEL: &str =
    "000000000000000000000000000000000000000000000000000000000000000000000000";

impl SensibleId {
    /// Wraps a decoder-supplied hex string without re-validating it;
    /// malformed values surface as `Corrupt` when a genesis point is
    /// first requested.
    pub fn new(hex: impl Into<String>) -> SensibleId {
        SensibleId(hex.into())
    }

    /// The issuance sentinel.
    pub fn sentinel() -> SensibleId {
        SensibleId(SENSIBLE_SENTINEL.to_string())
    }

    /// Returns `true` only for the exact 72-zero sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.0 == SENSIBLE_SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the `(genesis_tx_id, genesis_vout)` outpoint this id
    /// points at.
    pub fn genesis_point(&self) -> Result<OutPoint, RecordError> {
        let bytes = hex::decode(&self.0)?;
        if bytes.len() != 36 {
            return Err(RecordError::SensibleIdLength(bytes.len()));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[..32]);
        let index = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        Ok(OutPoint {
            hash: crate::transaction::Hash(hash),
            index,
        })
    }
}

impl fmt::Display for SensibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity of a token family: `code_hash@genesis`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub code_hash: String,
    pub genesis: String,
}

impl ContractKey {
    pub fn new(code_hash: impl Into<String>, genesis: impl Into<String>) -> ContractKey {
        ContractKey {
            code_hash: code_hash.into(),
            genesis: genesis.into(),
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code_hash, self.genesis)
    }
}

/// The identity of a single NFT within a family:
/// `code_hash@genesis@zero-padded-token-index`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TokenKey {
    pub code_hash: String,
    pub genesis: String,
    pub token_index: u64,
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}@{:0width$}",
            self.code_hash,
            self.genesis,
            self.token_index,
            width = TOKEN_INDEX_WIDTH
        )
    }
}

/// A decoded fungible token output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FtInfo {
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    /// Token amount carried by this output, in base token units.
    pub amount: u64,
    pub decimal: u8,
    pub name: String,
    pub symbol: String,
}

/// A decoded unique (singleton FT) output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UniqueInfo {
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
}

/// A decoded non-fungible token output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NftInfo {
    pub code_hash: String,
    pub genesis: String,
    pub sensible_id: SensibleId,
    pub token_index: u64,
    pub token_supply: u64,
    /// Transaction carrying the token metadata, hex; all-zero until the
    /// metadata transaction is minted.
    pub meta_tx_id: String,
    pub meta_vout: u32,
}

impl NftInfo {
    /// Returns `true` while the metadata pointer is still the all-zero
    /// placeholder, i.e. this output belongs to an issuing genesis
    /// lineage rather than a minted token.
    pub fn meta_is_placeholder(&self) -> bool {
        !self.meta_tx_id.is_empty() && self.meta_tx_id.bytes().all(|b| b == b'0')
    }
}

/// A decoded NFT sell-contract output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NftSellInfo {
    pub code_hash: String,
    pub genesis: String,
    /// The address of the NFT holder offering the token.
    pub nft_address: String,
    pub price: u64,
    /// The P2SH address of the sell contract itself.
    pub contract_address: String,
    pub token_index: u64,
}

/// A decoded contract payload, one variant per decoder result.
///
/// The on-disk format stays string-tagged (`ft`, `unique`, `nft`,
/// `nft_sell`) for forward compatibility; in memory the indexer
/// branches on this enum.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Contract {
    Ft(FtInfo),
    Unique(UniqueInfo),
    Nft(NftInfo),
    NftSell(NftSellInfo),
}

impl Contract {
    pub fn kind(&self) -> ContractKind {
        match self {
            Contract::Ft(_) => ContractKind::Ft,
            Contract::Unique(_) => ContractKind::Unique,
            Contract::Nft(_) => ContractKind::Nft,
            Contract::NftSell(_) => ContractKind::NftSell,
        }
    }

    pub fn code_hash(&self) -> &str {
        match self {
            Contract::Ft(info) => &info.code_hash,
            Contract::Unique(info) => &info.code_hash,
            Contract::Nft(info) => &info.code_hash,
            Contract::NftSell(info) => &info.code_hash,
        }
    }

    pub fn genesis(&self) -> &str {
        match self {
            Contract::Ft(info) => &info.genesis,
            Contract::Unique(info) => &info.genesis,
            Contract::Nft(info) => &info.genesis,
            Contract::NftSell(info) => &info.genesis,
        }
    }

    /// The family identity key `code_hash@genesis`.
    pub fn contract_key(&self) -> ContractKey {
        ContractKey::new(self.code_hash(), self.genesis())
    }

    /// The sensible id, for variants that carry one.
    pub fn sensible_id(&self) -> Option<&SensibleId> {
        match self {
            Contract::Ft(info) => Some(&info.sensible_id),
            Contract::Unique(info) => Some(&info.sensible_id),
            Contract::Nft(info) => Some(&info.sensible_id),
            Contract::NftSell(_) => None,
        }
    }

    /// Amount for FT outputs, token index for NFT outputs; the shared
    /// `quantity` slot of canonical rows.
    pub fn quantity(&self) -> u64 {
        match self {
            Contract::Ft(info) => info.amount,
            Contract::Unique(_) => 0,
            Contract::Nft(info) => info.token_index,
            Contract::NftSell(info) => info.token_index,
        }
    }
}
