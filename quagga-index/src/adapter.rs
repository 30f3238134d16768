//! Interfaces to the external collaborators.
//!
//! The indexing core never speaks RPC or parses scripts itself: a
//! chain adapter delivers parsed blocks and transactions, a
//! transaction decoder turns raw mempool bytes into the same shape,
//! and a mempool source pushes raw transactions as the node announces
//! them. Implementations live in downstream crates, one per chain.

use quagga_chain::block::{self, Block, Height};
use quagga_chain::parameters::ChainParams;
use quagga_chain::transaction::{self, Transaction};

/// The transport error type adapters surface.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A blocking client for one chain node.
///
/// Calls rely on the transport's own timeouts; there is no
/// per-operation deadline in the core.
pub trait ChainAdapter: Send + Sync {
    /// Establish the node connection.
    fn connect(&self) -> Result<(), BoxError>;

    /// Close the node connection. In-flight calls get a grace period
    /// from the runtime shell before the process exits.
    fn shutdown(&self) -> Result<(), BoxError>;

    /// A short chain label for logs, e.g. `btc`.
    fn chain_name(&self) -> &str;

    /// The chain and network this adapter serves.
    fn chain_params(&self) -> ChainParams;

    /// The node's current best height.
    fn block_count(&self) -> Result<Height, BoxError>;

    /// The hash of the block at `height`.
    fn block_hash(&self, height: Height) -> Result<block::Hash, BoxError>;

    /// Fetch and parse the block at `height`, scripts already decoded.
    fn get_block(&self, height: Height) -> Result<Block, BoxError>;

    /// Fetch and parse one transaction by id.
    fn get_transaction(&self, id: transaction::Hash) -> Result<Transaction, BoxError>;

    /// The ids of every transaction currently in the node's mempool.
    fn raw_mempool(&self) -> Result<Vec<transaction::Hash>, BoxError>;

    /// Detect a reorg: `Some((last_common_height, end_height))` when
    /// the node's chain diverged from the indexed one, `None`
    /// otherwise.
    fn find_reorg_height(&self) -> Result<Option<(Height, Height)>, BoxError>;
}

/// Decodes raw transaction bytes into the adapter's parsed shape.
///
/// Used only on the mempool path; confirmed blocks arrive already
/// parsed.
pub trait TransactionDecoder: Send + Sync {
    fn decode_transaction(&self, raw: &[u8]) -> Result<Transaction, BoxError>;
}

/// A callback-registering publisher of raw mempool transactions.
pub trait MempoolSource: Send {
    /// Register the raw-transaction handler. Must be called before
    /// [`MempoolSource::start`].
    fn on_rawtx(&mut self, handler: Box<dyn Fn(Vec<u8>) + Send + Sync>);

    /// Start delivering transactions.
    fn start(&mut self) -> Result<(), BoxError>;

    /// Stop delivering transactions.
    fn stop(&mut self) -> Result<(), BoxError>;
}
