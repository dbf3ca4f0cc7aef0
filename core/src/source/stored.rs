//! Memoizing source: answers from the ledger store when it can, otherwise
//! asks the wrapped source and persists what comes back.

use super::ChainDataSource;
use crate::{
    error::TraceResult,
    ledger::{Transaction, Wallet},
    store::LedgerStore,
    types::ChainType,
};
use chrono::{DateTime, Utc};

pub struct StoredSource<S> {
    inner: S,
    store: LedgerStore,
}

impl<S: ChainDataSource> StoredSource<S> {
    pub fn new(inner: S, store: LedgerStore) -> Self {
        Self { inner, store }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    fn persist(&self, address: &str, txs: &[Transaction]) -> TraceResult<()> {
        let chain = self.inner.chain();
        let mut fresh = 0;
        for tx in txs {
            if self.store.insert_transaction(chain, tx)? {
                fresh += 1;
            }
            self.store.link_wallet_transaction(address, &tx.id)?;
        }
        log::debug!("Stored {fresh}/{} transactions for {address}", txs.len());
        Ok(())
    }
}

impl<S: ChainDataSource> ChainDataSource for StoredSource<S> {
    fn chain(&self) -> ChainType {
        self.inner.chain()
    }

    fn find_address(&self, address: &str) -> TraceResult<Option<Wallet>> {
        if let Some(wallet) = self.store.find_wallet(address)? {
            return Ok(Some(wallet));
        }
        let found = self.inner.find_address(address)?;
        if let Some(wallet) = &found {
            self.store.upsert_wallet(wallet)?;
        }
        Ok(found)
    }

    /// Stored history wins once any exists for the address; the cache does
    /// not track whether an earlier fetch was limited.
    fn get_transactions(&self, address: &str, limit: Option<usize>) -> TraceResult<Vec<Transaction>> {
        let cached = self.store.transactions_for_address(address, limit)?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        let fetched = self.inner.get_transactions(address, limit)?;
        self.persist(address, &fetched)?;
        Ok(fetched)
    }

    fn get_transactions_in_range(
        &self,
        address: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> TraceResult<Vec<Transaction>> {
        let fetched = self.inner.get_transactions_in_range(address, start, end, limit)?;
        self.persist(address, &fetched)?;
        Ok(fetched)
    }
}
