//! Ledger model: wallets, transactions and transfers as held in memory
//! for one analysis batch.
//!
//! RULE: records are created by a chain source on first sight and are
//! immutable afterwards, except for `Wallet::analysis`, which only the
//! detector pipeline writes.

use crate::{
    error::{TraceError, TraceResult},
    types::{Address, ChainType, LedgerModel, TxId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ── Patterns ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FixedAmount,
    MultiIo,
    Looping,
    Relayer,
    PeelChain,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::FixedAmount,
        PatternKind::MultiIo,
        PatternKind::Looping,
        PatternKind::Relayer,
        PatternKind::PeelChain,
    ];

    /// Presentation name, stable across releases.
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::FixedAmount => "FixedAmount",
            PatternKind::MultiIo     => "MultiIO",
            PatternKind::Looping     => "Looping",
            PatternKind::Relayer     => "Relayer",
            PatternKind::PeelChain   => "PeelChain",
        }
    }

    fn bit(self) -> u8 {
        match self {
            PatternKind::FixedAmount => 1 << 0,
            PatternKind::MultiIo     => 1 << 1,
            PatternKind::Looping     => 1 << 2,
            PatternKind::Relayer     => 1 << 3,
            PatternKind::PeelChain   => 1 << 4,
        }
    }
}

/// Per-wallet analysis result, updated by each detector in turn.
///
/// A flag is `None` until its detector has looked at the wallet at least
/// once. `pattern_count` counts distinct patterns that were ever detected,
/// so it never decreases and re-detection never double-counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub fixed_amount:  Option<bool>,
    pub multi_io:      Option<bool>,
    pub looping:       Option<bool>,
    pub relayer:       Option<bool>,
    pub peel_chain:    Option<bool>,
    pub pattern_count: u32,
    #[serde(default)]
    counted_mask:      u8,
}

impl PatternAnalysis {
    /// Rebuild from persisted columns.
    pub fn from_parts(flags: [Option<bool>; 5], pattern_count: u32, counted_mask: u8) -> Self {
        Self {
            fixed_amount: flags[0],
            multi_io:     flags[1],
            looping:      flags[2],
            relayer:      flags[3],
            peel_chain:   flags[4],
            pattern_count,
            counted_mask,
        }
    }

    pub fn flag(&self, kind: PatternKind) -> Option<bool> {
        match kind {
            PatternKind::FixedAmount => self.fixed_amount,
            PatternKind::MultiIo     => self.multi_io,
            PatternKind::Looping     => self.looping,
            PatternKind::Relayer     => self.relayer,
            PatternKind::PeelChain   => self.peel_chain,
        }
    }

    fn flag_mut(&mut self, kind: PatternKind) -> &mut Option<bool> {
        match kind {
            PatternKind::FixedAmount => &mut self.fixed_amount,
            PatternKind::MultiIo     => &mut self.multi_io,
            PatternKind::Looping     => &mut self.looping,
            PatternKind::Relayer     => &mut self.relayer,
            PatternKind::PeelChain   => &mut self.peel_chain,
        }
    }

    /// Store a detector verdict. Returns true only when this is the first
    /// time `kind` has ever been detected on the wallet.
    pub fn record(&mut self, kind: PatternKind, detected: bool) -> bool {
        *self.flag_mut(kind) = Some(detected);
        if detected && self.counted_mask & kind.bit() == 0 {
            self.counted_mask |= kind.bit();
            self.pattern_count += 1;
            return true;
        }
        false
    }

    /// Fold an earlier record of the same wallet into this one. Verdicts
    /// already present here win; detection history is the union of both.
    pub fn absorb(&mut self, earlier: &PatternAnalysis) {
        for kind in PatternKind::ALL {
            let flag = self.flag_mut(kind);
            if flag.is_none() {
                *flag = earlier.flag(kind);
            }
        }
        self.counted_mask |= earlier.counted_mask;
        self.pattern_count = self
            .pattern_count
            .max(earlier.pattern_count)
            .max(self.counted_mask.count_ones());
    }

    /// `kind` has been detected at least once, whatever the current flag.
    pub fn ever_detected(&self, kind: PatternKind) -> bool {
        self.counted_mask & kind.bit() != 0
    }

    pub fn is_flagged(&self, kind: PatternKind) -> bool {
        self.flag(kind) == Some(true)
    }

    /// Every detector has produced a verdict at least once.
    pub fn is_complete(&self) -> bool {
        PatternKind::ALL.iter().all(|k| self.flag(*k).is_some())
    }

    pub fn flags(&self) -> [Option<bool>; 5] {
        [self.fixed_amount, self.multi_io, self.looping, self.relayer, self.peel_chain]
    }

    pub fn counted_mask(&self) -> u8 {
        self.counted_mask
    }

    pub fn labels(&self) -> Vec<&'static str> {
        PatternKind::ALL
            .iter()
            .filter(|k| self.is_flagged(**k))
            .map(|k| k.label())
            .collect()
    }
}

// ── Transfers and transactions ──────────────────────────────────────────────

/// One directed movement of value inside a transaction: sender → receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender:   Address,
    pub receiver: Address,
    pub amount:   Decimal,
}

impl Transfer {
    pub fn new(sender: impl Into<Address>, receiver: impl Into<Address>, amount: Decimal) -> Self {
        Self { sender: sender.into(), receiver: receiver.into(), amount }
    }

    pub fn touches(&self, address: &str) -> bool {
        self.sender == address || self.receiver == address
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id:        TxId,
    pub amount:    Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
}

impl Transaction {
    pub fn new(id: impl Into<TxId>, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { id: id.into(), amount, timestamp, transfers: Vec::new() }
    }

    pub fn with_transfer(mut self, transfer: Transfer) -> Self {
        self.transfers.push(transfer);
        self
    }

    /// Check the transfers against the declared amount under `model`.
    ///
    /// Account chains carry exactly one transfer for the full amount.
    /// UTXO chains decompose the full amount across their transfers.
    pub fn validate(&self, model: LedgerModel) -> TraceResult<()> {
        let inconsistent = |reason: String| TraceError::InconsistentTransaction {
            tx_id: self.id.clone(),
            reason,
        };

        if self.amount.is_sign_negative() {
            return Err(TraceError::InvalidAmount { value: self.amount.to_string() });
        }
        if let Some(t) = self.transfers.iter().find(|t| t.amount.is_sign_negative()) {
            return Err(TraceError::InvalidAmount { value: t.amount.to_string() });
        }

        match model {
            LedgerModel::Account => {
                if self.transfers.len() != 1 {
                    return Err(inconsistent(format!(
                        "account transfer must have exactly one leg, found {}",
                        self.transfers.len()
                    )));
                }
                if self.transfers[0].amount != self.amount {
                    return Err(inconsistent(format!(
                        "leg amount {} differs from declared {}",
                        self.transfers[0].amount, self.amount
                    )));
                }
            }
            LedgerModel::Utxo => {
                if self.transfers.is_empty() {
                    return Err(inconsistent("no transfers".into()));
                }
                let total: Decimal = self.transfers.iter().map(|t| t.amount).sum();
                if total != self.amount {
                    return Err(inconsistent(format!(
                        "transfers sum to {total}, declared {}",
                        self.amount
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every address appearing on either side of a transfer.
    pub fn counterparties(&self) -> impl Iterator<Item = &Address> {
        self.transfers
            .iter()
            .flat_map(|t| [&t.sender, &t.receiver])
    }

    pub fn involves(&self, address: &str) -> bool {
        self.transfers.iter().any(|t| t.touches(address))
    }
}

// ── Wallets ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub address:      Address,
    pub chain:        ChainType,
    pub balance:      Decimal,
    #[serde(default)]
    pub analysis:     PatternAnalysis,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Wallet {
    pub fn new(address: impl Into<Address>, chain: ChainType, balance: Decimal) -> Self {
        Self {
            address: address.into(),
            chain,
            balance,
            analysis: PatternAnalysis::default(),
            transactions: Vec::new(),
        }
    }

    /// Merge `txs` into the wallet, skipping ids it already holds.
    /// Returns how many were added.
    pub fn attach_transactions<I>(&mut self, txs: I) -> usize
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut known: HashSet<TxId> = self.transactions.iter().map(|t| t.id.clone()).collect();
        let before = self.transactions.len();
        for tx in txs {
            if known.insert(tx.id.clone()) {
                self.transactions.push(tx);
            }
        }
        self.transactions.len() - before
    }

    pub fn sort_transactions(&mut self) {
        self.transactions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    }

    /// Keep only the `n` most recent transactions, oldest first.
    pub fn retain_recent(&mut self, n: usize) {
        self.sort_transactions();
        let excess = self.transactions.len().saturating_sub(n);
        self.transactions.drain(..excess);
    }

    /// Addresses this wallet's transactions connect it to, itself excluded.
    pub fn neighbours(&self) -> BTreeSet<Address> {
        self.transactions
            .iter()
            .flat_map(|tx| tx.counterparties())
            .filter(|a| **a != self.address)
            .cloned()
            .collect()
    }
}
