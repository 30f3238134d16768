//! The lineage verifier.
//!
//! Income rows start life in `uncheck_*_outpoint`. On a timer, a
//! batch of unchecked outpoints is drained to a worker pool; each
//! worker walks the spending transaction's lineage
//! (`used_*_income[tx_id]`) and the produced-output list of the
//! claimed genesis (`contract_*_genesis_output`) looking for a
//! matching `(code_hash, genesis, sensible_id)` triple. A match
//! proves the output's contract lineage is rooted in the family it
//! claims, and the outpoint is promoted to the valid income indexes.
//! Genesis outputs themselves (sentinel sensible id) promote
//! immediately.
//!
//! Workers read disjoint outpoints from a channel and commit
//! independently; nothing here batches across workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick, unbounded};
use quagga_chain::contract::{SensibleId, TokenFamily};
use quagga_chain::record::{
    decode_rows_lossy, DecodeRecord, EncodeRecord, OutputRow, RecordError, UsedRow,
};
use tracing::{debug, trace, warn};

use crate::mempool::{owner_key, MempoolManager, Stamped};
use crate::shutdown::StopSignal;
use crate::stores::FamilyStores;
use crate::Result;

#[cfg(test)]
mod tests;

/// The outcome of one verification attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Lineage proven; promote to the valid income indexes.
    Valid,
    /// Lineage not provable yet; leave in the uncheck queue.
    Pending,
    /// Prerequisites missing (NFT verify marker); reconsider later.
    Skip,
    /// Provably broken record; move to the invalid index.
    Invalid(String),
}

/// Storage the verifier runs against: the confirmed family stores or
/// a family's mempool shadow.
pub trait VerifyBackend: Send + Sync {
    fn family(&self) -> TokenFamily;

    /// Up to `limit` `(outpoint, raw value)` pairs from the uncheck
    /// queue.
    fn scan_uncheck(&self, limit: usize) -> Result<Vec<(String, String)>>;

    /// Decode one uncheck value to its output row.
    fn decode_uncheck(&self, value: &str) -> std::result::Result<OutputRow, RecordError>;

    fn used_income(&self, tx_id: &str) -> Result<Option<String>>;

    fn genesis_output(&self, outpoint: &str) -> Result<Option<String>>;

    /// Whether the spending transaction was marked as carrying
    /// contract outputs. Always true on the confirmed side; on the
    /// mempool side the marker may lag the income row.
    fn has_verify_marker(&self, tx_id: &str) -> Result<bool>;

    /// Write the row into the valid income indexes and drop it from
    /// the uncheck queue.
    fn promote_valid(&self, outpoint: &str, row: &OutputRow) -> Result<()>;

    /// Record the outpoint as permanently bad and drop it from the
    /// uncheck queue.
    fn promote_invalid(&self, outpoint: &str, reason: &str) -> Result<()>;
}

impl VerifyBackend for FamilyStores {
    fn family(&self) -> TokenFamily {
        self.family
    }

    fn scan_uncheck(&self, limit: usize) -> Result<Vec<(String, String)>> {
        Ok(self.uncheck.scan_n(limit)?)
    }

    fn decode_uncheck(&self, value: &str) -> std::result::Result<OutputRow, RecordError> {
        // A replayed block appends a duplicate segment; the first one
        // is authoritative.
        OutputRow::decode_record(first_segment(value))
    }

    fn used_income(&self, tx_id: &str) -> Result<Option<String>> {
        Ok(self.used_income.get_string(tx_id)?)
    }

    fn genesis_output(&self, outpoint: &str) -> Result<Option<String>> {
        Ok(self.genesis_output.get_string(outpoint)?)
    }

    fn has_verify_marker(&self, _tx_id: &str) -> Result<bool> {
        Ok(true)
    }

    fn promote_valid(&self, outpoint: &str, row: &OutputRow) -> Result<()> {
        let segment = row.to_record()?;
        self.address_income_valid.merge(&row.address, &segment)?;
        self.code_income_valid.merge(&row.contract_key(), &segment)?;
        self.uncheck.delete(outpoint)?;
        Ok(())
    }

    fn promote_invalid(&self, outpoint: &str, reason: &str) -> Result<()> {
        self.invalid.set(outpoint, reason)?;
        self.uncheck.delete(outpoint)?;
        Ok(())
    }
}

impl VerifyBackend for MempoolManager {
    fn family(&self) -> TokenFamily {
        MempoolManager::family(self)
    }

    fn scan_uncheck(&self, limit: usize) -> Result<Vec<(String, String)>> {
        self.with_stores(|stores| Ok(stores.uncheck.scan_n(limit)?))
    }

    fn decode_uncheck(&self, value: &str) -> std::result::Result<OutputRow, RecordError> {
        Stamped::<OutputRow>::decode_record(first_segment(value)).map(|stamped| stamped.row)
    }

    fn used_income(&self, tx_id: &str) -> Result<Option<String>> {
        self.with_stores(|stores| Ok(stores.used_income.get_string(tx_id)?))
    }

    fn genesis_output(&self, outpoint: &str) -> Result<Option<String>> {
        self.with_stores(|stores| Ok(stores.genesis_output.get_string(outpoint)?))
    }

    fn has_verify_marker(&self, tx_id: &str) -> Result<bool> {
        self.with_stores(|stores| Ok(stores.verify_tx.get(tx_id)?.is_some()))
    }

    fn promote_valid(&self, outpoint: &str, row: &OutputRow) -> Result<()> {
        self.with_stores(|stores| {
            stores
                .income_valid
                .set(&owner_key(&row.address, outpoint), &row.to_record()?)?;
            stores.uncheck.delete(outpoint)?;
            Ok(())
        })
    }

    fn promote_invalid(&self, outpoint: &str, reason: &str) -> Result<()> {
        // The shadow stores carry no invalid index; dropping the
        // outpoint is enough, confirmation will re-verify it anyway.
        warn!(outpoint, reason, "mempool outpoint dropped as invalid");
        self.with_stores(|stores| {
            stores.uncheck.delete(outpoint)?;
            Ok(())
        })
    }
}

/// The periodic verification task over one backend.
pub struct Verifier<B> {
    backend: Arc<B>,
    interval: Duration,
    batch: usize,
    workers: usize,
}

impl<B: VerifyBackend> Verifier<B> {
    pub fn new(backend: Arc<B>, interval: Duration, batch: usize, workers: usize) -> Verifier<B> {
        Verifier {
            backend,
            interval,
            batch: batch.max(1),
            workers: workers.max(1),
        }
    }

    /// Tick until the stop signal fires. The ticker stops before the
    /// worker pool of the final tick drains.
    pub fn run(&self, stop: StopSignal) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(stop.receiver()) -> _ => break,
                recv(ticker) -> _ => {
                    if let Err(error) = self.tick() {
                        warn!(family = %self.backend.family(), %error, "verifier tick failed");
                    }
                }
            }
        }
        debug!(family = %self.backend.family(), "verifier stopped");
    }

    /// Verify one batch of unchecked outpoints; returns the number of
    /// promotions (valid or invalid).
    pub fn tick(&self) -> Result<usize> {
        let items = self.backend.scan_uncheck(self.batch)?;
        if items.is_empty() {
            return Ok(0);
        }

        let (work_tx, work_rx) = unbounded();
        for item in items {
            let _ = work_tx.send(item);
        }
        drop(work_tx);

        let promoted = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..self.workers {
                let work_rx = work_rx.clone();
                let promoted = &promoted;
                let backend = &*self.backend;
                scope.spawn(move || {
                    while let Ok((outpoint, value)) = work_rx.recv() {
                        if process_one(backend, &outpoint, &value) {
                            promoted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        let promoted = promoted.into_inner();
        if promoted > 0 {
            metrics::counter!(
                "verify.promoted",
                promoted as u64,
                "family" => self.backend.family().as_str()
            );
        }
        Ok(promoted)
    }

    /// Explicit decoder-feedback channel: mark one outpoint invalid.
    /// The verifier itself never synthesizes this.
    pub fn mark_invalid(&self, outpoint: &str, reason: &str) -> Result<()> {
        self.backend.promote_invalid(outpoint, reason)
    }
}

/// Verify one outpoint and apply the verdict. Errors are logged per
/// outpoint and never abort the tick. Returns true when the outpoint
/// left the uncheck queue.
fn process_one<B: VerifyBackend>(backend: &B, outpoint: &str, value: &str) -> bool {
    let row = match backend.decode_uncheck(value) {
        Ok(row) => row,
        Err(error) => {
            warn!(outpoint, %error, "corrupt uncheck record");
            return backend
                .promote_invalid(outpoint, "corrupt uncheck record")
                .map_err(|e| warn!(outpoint, error = %e, "invalid promotion failed"))
                .is_ok();
        }
    };

    match verify_row(backend, &row) {
        Ok(Verdict::Valid) => match backend.promote_valid(outpoint, &row) {
            Ok(()) => {
                trace!(outpoint, "lineage verified");
                true
            }
            Err(error) => {
                warn!(outpoint, %error, "valid promotion failed");
                false
            }
        },
        Ok(Verdict::Invalid(reason)) => match backend.promote_invalid(outpoint, &reason) {
            Ok(()) => true,
            Err(error) => {
                warn!(outpoint, %error, "invalid promotion failed");
                false
            }
        },
        Ok(Verdict::Pending) | Ok(Verdict::Skip) => false,
        Err(error) => {
            warn!(outpoint, %error, "verification attempt failed");
            false
        }
    }
}

/// The lineage walk. First match wins, checking the spending
/// transaction's consumed inputs before the genesis's produced
/// outputs.
pub fn verify_row<B: VerifyBackend>(backend: &B, row: &OutputRow) -> Result<Verdict> {
    // A genesis output is its own proof.
    if row.sensible_id.is_sentinel() {
        return Ok(Verdict::Valid);
    }

    let genesis_point = match row.sensible_id.genesis_point() {
        Ok(point) => point,
        Err(_) => return Ok(Verdict::Invalid("malformed sensible id".to_string())),
    };

    let nft = backend.family() == TokenFamily::Nft;
    if nft && !backend.has_verify_marker(&row.tx_id.to_string())? {
        return Ok(Verdict::Skip);
    }

    let used_value = backend.used_income(&row.tx_id.to_string())?;
    if let Some(value) = &used_value {
        let (used_rows, corrupt) = decode_rows_lossy::<UsedRow>(value);
        if corrupt > 0 {
            warn!(tx = %row.tx_id, corrupt, "corrupt lineage segments");
        }
        for used in &used_rows {
            if triple_matches(
                row,
                &used.code_hash,
                &used.genesis,
                &used.sensible_id,
                used.quantity,
                nft,
            ) {
                return Ok(Verdict::Valid);
            }
        }
    }

    if let Some(value) = backend.genesis_output(&genesis_point.to_string())? {
        let (produced, corrupt) = decode_rows_lossy::<OutputRow>(&value);
        if corrupt > 0 {
            warn!(genesis = %genesis_point, corrupt, "corrupt genesis-output segments");
        }
        for candidate in &produced {
            if triple_matches(
                row,
                &candidate.code_hash,
                &candidate.genesis,
                &candidate.sensible_id,
                candidate.quantity,
                nft,
            ) {
                return Ok(Verdict::Valid);
            }
        }
    }

    // Without a lineage record there is nothing to judge yet; keep the
    // outpoint queued for a later attempt.
    Ok(Verdict::Pending)
}

fn first_segment(value: &str) -> &str {
    value.split(',').find(|s| !s.is_empty()).unwrap_or("")
}

/// Does a lineage candidate prove `row`'s family membership?
///
/// FT requires the exact `(code_hash, genesis, sensible_id)` triple.
/// NFT additionally accepts the new-genesis branch (sentinel
/// sensible id) and the token branch (matching token index) of a
/// genesis-output row.
fn triple_matches(
    row: &OutputRow,
    code_hash: &str,
    genesis: &str,
    sensible_id: &SensibleId,
    quantity: u64,
    nft: bool,
) -> bool {
    if code_hash != row.code_hash || genesis != row.genesis {
        return false;
    }
    if sensible_id == &row.sensible_id {
        return true;
    }
    nft && (sensible_id.is_sentinel() || quantity == row.quantity)
}
