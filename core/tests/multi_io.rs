//! Multi-IO detector tests.
//!
//! Tests cover: the 3/3 counterparty boundary, output homogeneity, and the
//! time window.

mod common;

use common::{batch, find, payment};
use mixtrace_core::{
    config::MultiIoParams,
    detect::{Detector, MultiIoDetector},
    ledger::Transaction,
    types::ChainType,
};

fn detector() -> MultiIoDetector {
    MultiIoDetector::new(MultiIoParams::default())
}

/// `senders` pay into W, then W pays each receiver, all 30 s apart.
fn fan(senders: &[&str], payouts: &[(&str, &str)], step: i64) -> Vec<Transaction> {
    let mut txs = Vec::new();
    let mut t = 0;
    for (i, s) in senders.iter().enumerate() {
        txs.push(payment(&format!("in{i}"), s, "W", "1", t));
        t += step;
    }
    for (i, (r, v)) in payouts.iter().enumerate() {
        txs.push(payment(&format!("out{i}"), "W", r, v, t));
        t += step;
    }
    txs
}

#[test]
fn three_senders_and_three_receivers_are_flagged() {
    let txs = fan(&["S1", "S2", "S3"], &[("R1", "1"), ("R2", "1"), ("R3", "1")], 30);
    let mut wallets = batch(ChainType::Ethereum, &["W"], &txs);

    detector().analyze(&mut wallets);

    let w = find(&wallets, "W");
    assert_eq!(w.analysis.multi_io, Some(true), "3 senders and 3 receivers within 300 s");
    assert_eq!(w.analysis.pattern_count, 1);
}

#[test]
fn two_senders_and_three_receivers_are_not_flagged() {
    let txs = fan(&["S1", "S2"], &[("R1", "1"), ("R2", "1"), ("R3", "1")], 30);
    let mut wallets = batch(ChainType::Ethereum, &["W"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "W").analysis.multi_io, Some(false));
}

#[test]
fn heterogeneous_outputs_fail_the_cv_bound() {
    let txs = fan(&["S1", "S2", "S3"], &[("R1", "1"), ("R2", "5"), ("R3", "20")], 30);

    let mut wallets = batch(ChainType::Ethereum, &["W"], &txs);
    detector().analyze(&mut wallets);
    assert_eq!(find(&wallets, "W").analysis.multi_io, Some(false), "Output CV far above 0.30");

    let unbounded = MultiIoDetector::new(MultiIoParams { max_output_cv: None, ..MultiIoParams::default() });
    let mut wallets = batch(ChainType::Ethereum, &["W"], &txs);
    unbounded.analyze(&mut wallets);
    assert_eq!(find(&wallets, "W").analysis.multi_io, Some(true), "Counts alone suffice without a bound");
}

#[test]
fn counterparties_outside_the_window_are_not_counted() {
    // 6 transactions 100 s apart span 500 s; no 300 s window sees 3 + 3.
    let txs = fan(&["S1", "S2", "S3"], &[("R1", "1"), ("R2", "1"), ("R3", "1")], 100);
    let mut wallets = batch(ChainType::Ethereum, &["W"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "W").analysis.multi_io, Some(false));
}

#[test]
fn utxo_mixing_transaction_is_flagged_for_a_participant() {
    let tx = common::utxo(
        "mix",
        &[("W", "R1", "1"), ("S2", "R2", "1"), ("S3", "R3", "1"), ("S4", "R4", "1")],
        0,
    );
    let mut wallets = batch(ChainType::Bitcoin, &["W"], &[tx]);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "W").analysis.multi_io, Some(true));
}
