//! Chain source tests.
//!
//! Tests cover: per-model validation, snapshot loading, history ordering
//! and limits, in-range retrieval, and registry lookup.

mod common;

use common::{amt, at, payment, source, utxo};
use mixtrace_core::{
    error::TraceError,
    ledger::{Transaction, Transfer},
    source::{ChainDataSource, LedgerSnapshot, MemorySource, SourceRegistry},
    types::{ChainType, LedgerModel},
};

const SNAPSHOT: &str = r#"{
  "wallets": [
    { "address": "bc1qa", "chain": "bitcoin", "balance": "1.5" }
  ],
  "transactions": [
    { "chain": "bitcoin", "id": "b1", "amount": "0.7", "timestamp": "2024-03-01T10:00:00Z",
      "transfers": [
        { "sender": "bc1qa", "receiver": "bc1qb", "amount": "0.5" },
        { "sender": "bc1qa", "receiver": "bc1qc", "amount": "0.2" }
      ] },
    { "chain": "bitcoin", "id": "b1", "amount": "9", "timestamp": "2024-03-01T11:00:00Z",
      "transfers": [ { "sender": "bc1qa", "receiver": "bc1qz", "amount": "9" } ] },
    { "chain": "ethereum", "id": "e1", "amount": "2", "timestamp": "2024-03-01T12:00:00Z",
      "transfers": [ { "sender": "0xa", "receiver": "0xb", "amount": "2" } ] }
  ]
}"#;

#[test]
fn account_transaction_needs_exactly_one_matching_leg() {
    let two_legs = Transaction::new("t1", amt("2"), at(0))
        .with_transfer(Transfer::new("A", "B", amt("1")))
        .with_transfer(Transfer::new("A", "C", amt("1")));
    assert!(matches!(
        two_legs.validate(LedgerModel::Account),
        Err(TraceError::InconsistentTransaction { .. })
    ));

    let mismatched = Transaction::new("t2", amt("2"), at(0)).with_transfer(Transfer::new("A", "B", amt("1")));
    assert!(matches!(
        mismatched.validate(LedgerModel::Account),
        Err(TraceError::InconsistentTransaction { .. })
    ));

    assert!(payment("t3", "A", "B", "1", 0).validate(LedgerModel::Account).is_ok());
}

#[test]
fn utxo_legs_must_sum_to_the_declared_amount() {
    let tx = utxo("t1", &[("A", "B", "0.5"), ("A", "C", "0.25")], 0);
    assert!(tx.validate(LedgerModel::Utxo).is_ok(), "Legs summing to the amount are valid");

    let short = Transaction::new("t2", amt("1"), at(0)).with_transfer(Transfer::new("A", "B", amt("0.5")));
    assert!(matches!(
        short.validate(LedgerModel::Utxo),
        Err(TraceError::InconsistentTransaction { .. })
    ));

    let empty = Transaction::new("t3", amt("0"), at(0));
    assert!(empty.validate(LedgerModel::Utxo).is_err(), "A UTXO transaction needs at least one leg");
}

#[test]
fn negative_amounts_are_rejected() {
    let tx = payment("t1", "A", "B", "-1", 0);
    assert!(matches!(
        tx.validate(LedgerModel::Account),
        Err(TraceError::InvalidAmount { .. })
    ));
}

#[test]
fn memory_source_rejects_inconsistent_transactions() {
    let mut src = MemorySource::new(ChainType::Ethereum);
    let bad = utxo("t1", &[("A", "B", "1"), ("A", "C", "1")], 0);
    assert!(src.add_transactions(vec![bad]).is_err());
    assert_eq!(src.transaction_count(), 0, "Nothing is added from a rejected batch");
}

#[test]
fn snapshot_is_split_by_chain_and_deduplicated() {
    let snapshot: LedgerSnapshot = serde_json::from_str(SNAPSHOT).expect("snapshot parses");

    let btc = MemorySource::from_snapshot(&snapshot, ChainType::Bitcoin).expect("bitcoin slice");
    assert_eq!(btc.transaction_count(), 1, "Duplicate id b1 keeps the first occurrence");
    let wallet = btc.find_address("bc1qa").expect("lookup").expect("recorded wallet");
    assert_eq!(wallet.balance, amt("1.5"));

    let eth = MemorySource::from_snapshot(&snapshot, ChainType::Ethereum).expect("ethereum slice");
    assert_eq!(eth.transaction_count(), 1);
    assert!(eth.find_address("bc1qa").expect("lookup").is_none());
}

#[test]
fn counterparty_without_record_resolves_to_zero_balance_wallet() {
    let src = source(ChainType::Ethereum, vec![payment("t1", "A", "B", "1", 0)]);

    let wallet = src.find_address("B").expect("lookup").expect("seen on chain");
    assert!(wallet.balance.is_zero());
    assert!(src.find_address("nobody").expect("lookup").is_none());
}

#[test]
fn limited_history_is_the_most_recent_in_ascending_order() {
    let src = source(
        ChainType::Ethereum,
        vec![
            payment("t3", "A", "B", "1", 30),
            payment("t1", "A", "B", "1", 10),
            payment("t2", "B", "A", "1", 20),
        ],
    );

    let ids = |txs: Vec<Transaction>| txs.into_iter().map(|t| t.id).collect::<Vec<_>>();
    assert_eq!(ids(src.get_transactions("A", None).expect("history")), vec!["t1", "t2", "t3"]);
    assert_eq!(ids(src.get_transactions("A", Some(2)).expect("history")), vec!["t2", "t3"]);
}

#[test]
fn in_range_retrieval_is_inclusive_and_limited() {
    let src = source(
        ChainType::Ethereum,
        (0..5).map(|i| payment(&format!("t{i}"), "A", "B", "1", i * 100)).collect(),
    );

    let txs = src
        .get_transactions_in_range("A", at(100), at(300), 10)
        .expect("range query");
    assert_eq!(txs.len(), 3, "Both bounds are inclusive");

    let txs = src
        .get_transactions_in_range("A", at(100), at(300), 2)
        .expect("range query");
    let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2"], "The earliest in-range transactions come first");
}

#[test]
fn registry_routes_by_chain() {
    let registry = SourceRegistry::new().with(Box::new(MemorySource::new(ChainType::Bitcoin)));

    assert_eq!(registry.chains(), vec![ChainType::Bitcoin]);
    assert_eq!(registry.get(ChainType::Bitcoin).expect("registered").chain(), ChainType::Bitcoin);
    assert!(matches!(
        registry.get(ChainType::Ethereum),
        Err(TraceError::UnsupportedChain { .. })
    ));
}

#[test]
fn chain_names_parse_case_insensitively() {
    assert_eq!("Bitcoin".parse::<ChainType>().expect("bitcoin"), ChainType::Bitcoin);
    assert_eq!("ETHEREUM".parse::<ChainType>().expect("ethereum"), ChainType::Ethereum);
    assert!(matches!(
        "dogecoin".parse::<ChainType>(),
        Err(TraceError::UnsupportedChain { .. })
    ));
}
