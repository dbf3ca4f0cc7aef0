//! Shared fixtures: deterministic timestamps and small ledger builders.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use mixtrace_core::{
    ledger::{Transaction, Transfer, Wallet},
    source::MemorySource,
    types::ChainType,
};
use rust_decimal::Decimal;

/// Fixed origin so every test is reproducible.
pub const T0: i64 = 1_700_000_000;

/// Route `log` output through the test harness; `RUST_LOG` picks the level.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(T0 + secs, 0).expect("valid timestamp")
}

pub fn amt(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// Account-model transaction: one leg carrying the full amount.
pub fn payment(id: &str, from: &str, to: &str, value: &str, secs: i64) -> Transaction {
    Transaction::new(id, amt(value), at(secs)).with_transfer(Transfer::new(from, to, amt(value)))
}

/// UTXO transaction whose amount is the sum of its legs.
pub fn utxo(id: &str, legs: &[(&str, &str, &str)], secs: i64) -> Transaction {
    let total: Decimal = legs.iter().map(|(_, _, v)| amt(v)).sum();
    legs.iter().fold(Transaction::new(id, total, at(secs)), |tx, (from, to, v)| {
        tx.with_transfer(Transfer::new(*from, *to, amt(v)))
    })
}

/// A wallet holding every transaction in `txs` that involves it.
pub fn wallet(address: &str, chain: ChainType, txs: &[Transaction]) -> Wallet {
    let mut w = Wallet::new(address, chain, Decimal::ZERO);
    w.attach_transactions(txs.iter().filter(|tx| tx.involves(address)).cloned());
    w.sort_transactions();
    w
}

/// One wallet per address, each with its own slice of `txs`.
pub fn batch(chain: ChainType, addresses: &[&str], txs: &[Transaction]) -> Vec<Wallet> {
    addresses.iter().map(|a| wallet(a, chain, txs)).collect()
}

pub fn source(chain: ChainType, txs: Vec<Transaction>) -> MemorySource {
    let mut source = MemorySource::new(chain);
    source.add_transactions(txs).expect("consistent fixture transactions");
    source
}

pub fn find<'a>(wallets: &'a [Wallet], address: &str) -> &'a Wallet {
    wallets
        .iter()
        .find(|w| w.address == address)
        .unwrap_or_else(|| panic!("wallet {address} missing from batch"))
}
