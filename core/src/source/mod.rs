//! Chain data sources: the capability interface the trace engine pulls
//! wallets and transactions through.
//!
//! One implementation per chain, selected by a registry keyed on
//! `ChainType`. Remote explorers, recorded snapshots and the memoizing
//! store wrapper all sit behind the same trait.

use crate::{
    error::{TraceError, TraceResult},
    ledger::{Transaction, Wallet},
    types::ChainType,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

mod memory;
mod stored;

pub use memory::{LedgerSnapshot, MemorySource, SnapshotTransaction, SnapshotWallet};
pub use stored::StoredSource;

/// The contract every chain source must fulfill.
///
/// Sources return whole, validated transactions or an error, never a
/// partially populated transaction.
pub trait ChainDataSource {
    fn chain(&self) -> ChainType;

    /// Resolve the wallet record for `address`, `None` if the chain has no
    /// data for it.
    fn find_address(&self, address: &str) -> TraceResult<Option<Wallet>>;

    /// Transactions touching `address`, oldest first. With a limit, only
    /// the most recent `limit` transactions.
    fn get_transactions(&self, address: &str, limit: Option<usize>) -> TraceResult<Vec<Transaction>>;

    /// Transactions inside `[start, end]`, oldest first, at most `limit`.
    fn get_transactions_in_range(
        &self,
        address: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> TraceResult<Vec<Transaction>> {
        Ok(self
            .get_transactions(address, None)?
            .into_iter()
            .filter(|tx| tx.timestamp >= start && tx.timestamp <= end)
            .take(limit)
            .collect())
    }
}

/// Chain sources keyed by chain type.
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<ChainType, Box<dyn ChainDataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own chain type, replacing any previous one.
    pub fn register(&mut self, source: Box<dyn ChainDataSource>) {
        let chain = source.chain();
        if self.sources.insert(chain, source).is_some() {
            log::debug!("Replaced source for {chain}");
        }
    }

    pub fn with(mut self, source: Box<dyn ChainDataSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, chain: ChainType) -> TraceResult<&dyn ChainDataSource> {
        self.sources
            .get(&chain)
            .map(|s| s.as_ref())
            .ok_or_else(|| TraceError::UnsupportedChain { chain: chain.to_string() })
    }

    pub fn chains(&self) -> Vec<ChainType> {
        let mut chains: Vec<_> = self.sources.keys().copied().collect();
        chains.sort();
        chains
    }
}
