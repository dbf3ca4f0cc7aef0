//! Recorded ledger snapshots served from memory.

use super::ChainDataSource;
use crate::{
    error::TraceResult,
    ledger::{Transaction, Transfer, Wallet},
    types::{Address, ChainType, TxId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotWallet {
    pub address: Address,
    pub chain:   ChainType,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotTransaction {
    pub chain:     ChainType,
    pub id:        TxId,
    pub amount:    Decimal,
    pub timestamp: DateTime<Utc>,
    pub transfers: Vec<Transfer>,
}

/// A recorded slice of one or more ledgers, as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub wallets:      Vec<SnapshotWallet>,
    #[serde(default)]
    pub transactions: Vec<SnapshotTransaction>,
}

impl LedgerSnapshot {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading ledger {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// In-memory source for one chain.
pub struct MemorySource {
    chain:        ChainType,
    wallets:      HashMap<Address, Wallet>,
    transactions: Vec<Transaction>,           // oldest first
    by_address:   HashMap<Address, Vec<usize>>,
}

impl MemorySource {
    pub fn new(chain: ChainType) -> Self {
        Self {
            chain,
            wallets: HashMap::new(),
            transactions: Vec::new(),
            by_address: HashMap::new(),
        }
    }

    /// Build a source from the `chain` slice of `snapshot`. Every
    /// transaction is validated against the chain's accounting model and
    /// duplicate ids are dropped.
    pub fn from_snapshot(snapshot: &LedgerSnapshot, chain: ChainType) -> TraceResult<Self> {
        let mut source = Self::new(chain);
        for w in snapshot.wallets.iter().filter(|w| w.chain == chain) {
            source.add_wallet(Wallet::new(w.address.clone(), chain, w.balance));
        }

        let mut seen: HashSet<TxId> = HashSet::new();
        let mut txs = Vec::new();
        for t in snapshot.transactions.iter().filter(|t| t.chain == chain) {
            if !seen.insert(t.id.clone()) {
                log::warn!("Duplicate transaction {} in snapshot, keeping the first", t.id);
                continue;
            }
            let tx = Transaction {
                id:        t.id.clone(),
                amount:    t.amount,
                timestamp: t.timestamp,
                transfers: t.transfers.clone(),
            };
            tx.validate(chain.model())?;
            txs.push(tx);
        }
        source.extend_transactions(txs);

        log::debug!(
            "Loaded {} wallets and {} transactions for {chain}",
            source.wallets.len(),
            source.transactions.len()
        );
        Ok(source)
    }

    pub fn add_wallet(&mut self, wallet: Wallet) {
        self.wallets.insert(wallet.address.clone(), wallet);
    }

    /// Validate and add transactions.
    pub fn add_transactions(&mut self, txs: Vec<Transaction>) -> TraceResult<()> {
        for tx in &txs {
            tx.validate(self.chain.model())?;
        }
        self.extend_transactions(txs);
        Ok(())
    }

    /// Add already-validated transactions and rebuild the address index.
    fn extend_transactions(&mut self, txs: impl IntoIterator<Item = Transaction>) {
        self.transactions.extend(txs);
        self.transactions
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        self.by_address.clear();
        for (idx, tx) in self.transactions.iter().enumerate() {
            let mut touched: Vec<&Address> = tx.counterparties().collect();
            touched.sort();
            touched.dedup();
            for address in touched {
                self.by_address.entry(address.clone()).or_default().push(idx);
            }
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

impl ChainDataSource for MemorySource {
    fn chain(&self) -> ChainType {
        self.chain
    }

    fn find_address(&self, address: &str) -> TraceResult<Option<Wallet>> {
        if let Some(wallet) = self.wallets.get(address) {
            return Ok(Some(wallet.clone()));
        }
        // Seen on chain but never recorded: zero-balance wallet.
        if self.by_address.contains_key(address) {
            return Ok(Some(Wallet::new(address, self.chain, Decimal::ZERO)));
        }
        Ok(None)
    }

    fn get_transactions(&self, address: &str, limit: Option<usize>) -> TraceResult<Vec<Transaction>> {
        let Some(indices) = self.by_address.get(address) else {
            return Ok(Vec::new());
        };
        let skip = limit.map_or(0, |l| indices.len().saturating_sub(l));
        Ok(indices[skip..]
            .iter()
            .map(|&i| self.transactions[i].clone())
            .collect())
    }
}
