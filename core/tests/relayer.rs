//! Relayer detector tests.
//!
//! Tests cover: the composite score and its 0.70 threshold, receiver
//! freshness against the batch, and verdicts on every batch wallet.

mod common;

use common::{batch, find, payment};
use mixtrace_core::{
    config::RelayerParams,
    detect::{Detector, RelayerDetector},
    ledger::Transaction,
    types::ChainType,
};

fn detector() -> RelayerDetector {
    RelayerDetector::new(RelayerParams::default())
}

const BATCH: [&str; 4] = ["R", "X1", "X2", "X3"];

fn payouts(amounts: [&str; 3], offsets: [i64; 3]) -> Vec<Transaction> {
    (0..3)
        .map(|i| payment(&format!("p{i}"), "R", &format!("X{}", i + 1), amounts[i], offsets[i]))
        .collect()
}

#[test]
fn uniform_regular_payouts_to_fresh_addresses_are_flagged() {
    let txs = payouts(["1", "1", "1"], [0, 60, 120]);
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(true));
    assert_eq!(find(&wallets, "R").analysis.pattern_count, 1);
    for receiver in ["X1", "X2", "X3"] {
        assert_eq!(
            find(&wallets, receiver).analysis.relayer,
            Some(false),
            "{receiver} only receives"
        );
    }
}

#[test]
fn two_payouts_never_reach_the_threshold() {
    let txs = vec![
        payment("p0", "R", "X1", "1", 0),
        payment("p1", "R", "X2", "1", 60),
    ];
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(false), "Score tops out at 0.60");
}

#[test]
fn payouts_beyond_the_window_do_not_group() {
    let txs = payouts(["1", "1", "1"], [0, 200, 400]);
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(false));
}

#[test]
fn uniform_amounts_alone_sit_exactly_on_the_threshold() {
    // Irregular intervals (CV > 1) and a receiver with earlier history:
    // 0.4 (count) + 0.3 (uniform) = 0.70.
    let mut txs = payouts(["1", "1", "1"], [0, 10, 290]);
    txs.push(payment("prior", "Y", "X1", "5", -100));
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(true));
}

#[test]
fn uneven_amounts_to_a_seen_receiver_are_not_flagged() {
    // 0.4 (count) + 0.2 (regular) = 0.60.
    let mut txs = payouts(["1", "1.5", "2"], [0, 60, 120]);
    txs.push(payment("prior", "Y", "X2", "5", -100));
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(false));
}

#[test]
fn uneven_amounts_to_fresh_receivers_are_flagged() {
    // 0.4 (count) + 0.2 (regular) + 0.1 (fresh) = 0.70.
    let txs = payouts(["1", "1.5", "2"], [0, 60, 120]);
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(true));
}

#[test]
fn simultaneous_payouts_count_as_regular() {
    let txs = payouts(["1", "1", "1"], [0, 0, 0]);
    let mut wallets = batch(ChainType::Ethereum, &BATCH, &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "R").analysis.relayer, Some(true));
}

#[test]
fn relayer_outside_the_batch_is_not_flagged_on_anyone() {
    let txs = payouts(["1", "1", "1"], [0, 60, 120]);
    let mut wallets = batch(ChainType::Ethereum, &["X1", "X2", "X3"], &txs);

    detector().analyze(&mut wallets);

    assert!(
        wallets.iter().all(|w| w.analysis.relayer == Some(false)),
        "Only the sender itself can carry the relayer flag"
    );
}
