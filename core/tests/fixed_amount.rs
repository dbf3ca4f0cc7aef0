//! Fixed-amount detector tests.
//!
//! Tests cover: the 300 s window boundary, denomination concentration,
//! direction of transfers, and empty wallets.

mod common;

use common::{batch, find, utxo};
use mixtrace_core::{
    config::FixedAmountParams,
    detect::{Detector, FixedAmountDetector},
    ledger::Wallet,
    types::ChainType,
};
use rust_decimal::Decimal;

fn detector() -> FixedAmountDetector {
    FixedAmountDetector::new(FixedAmountParams::default())
}

#[test]
fn three_near_identical_payments_within_window_are_flagged() {
    let txs = vec![
        utxo("f1", &[("S", "R1", "0.99")], 0),
        utxo("f2", &[("S", "R2", "1.00")], 100),
        utxo("f3", &[("S", "R3", "1.01")], 200),
    ];
    let mut wallets = batch(ChainType::Bitcoin, &["S"], &txs);

    detector().analyze(&mut wallets);

    let s = find(&wallets, "S");
    assert_eq!(s.analysis.fixed_amount, Some(true), "Three 1.00 ± 1% payments in 200 s");
    assert_eq!(s.analysis.pattern_count, 1);
}

#[test]
fn same_payments_spread_400s_apart_are_not_flagged() {
    let txs = vec![
        utxo("f1", &[("S", "R1", "0.99")], 0),
        utxo("f2", &[("S", "R2", "1.00")], 400),
        utxo("f3", &[("S", "R3", "1.01")], 800),
    ];
    let mut wallets = batch(ChainType::Bitcoin, &["S"], &txs);

    detector().analyze(&mut wallets);

    let s = find(&wallets, "S");
    assert_eq!(s.analysis.fixed_amount, Some(false), "No window holds three payments");
    assert_eq!(s.analysis.pattern_count, 0);
}

#[test]
fn window_end_is_inclusive() {
    let txs = vec![
        utxo("f1", &[("S", "R1", "1")], 0),
        utxo("f2", &[("S", "R2", "1")], 150),
        utxo("f3", &[("S", "R3", "1")], 300),
    ];
    let mut wallets = batch(ChainType::Bitcoin, &["S"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "S").analysis.fixed_amount, Some(true));
}

#[test]
fn amounts_outside_tolerance_do_not_count() {
    let txs = vec![
        utxo("f1", &[("S", "R1", "0.97")], 0),
        utxo("f2", &[("S", "R2", "1.00")], 60),
        utxo("f3", &[("S", "R3", "1.03")], 120),
    ];
    let mut wallets = batch(ChainType::Bitcoin, &["S"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "S").analysis.fixed_amount, Some(false), "±3% is outside ±2%");
}

#[test]
fn payments_spread_across_denominations_are_not_flagged() {
    let values = ["1", "10", "0.1", "1", "10", "0.1", "1", "10", "0.1"];
    let txs: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let receiver = format!("R{i}");
            utxo(&format!("f{i}"), &[("S", receiver.as_str(), *v)], i as i64 * 20)
        })
        .collect();
    let mut wallets = batch(ChainType::Bitcoin, &["S"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(
        find(&wallets, "S").analysis.fixed_amount,
        Some(false),
        "Uniform spread has high entropy"
    );
}

#[test]
fn received_payments_do_not_count() {
    let txs = vec![
        utxo("f1", &[("X", "S", "1")], 0),
        utxo("f2", &[("Y", "S", "1")], 60),
        utxo("f3", &[("Z", "S", "1")], 120),
    ];
    let mut wallets = batch(ChainType::Bitcoin, &["S", "X"], &txs);

    detector().analyze(&mut wallets);

    assert_eq!(find(&wallets, "S").analysis.fixed_amount, Some(false));
    assert_eq!(find(&wallets, "X").analysis.fixed_amount, Some(false));
}

#[test]
fn empty_wallet_is_set_false() {
    let mut wallets = vec![Wallet::new("empty", ChainType::Ethereum, Decimal::ZERO)];

    detector().analyze(&mut wallets);

    assert_eq!(wallets[0].analysis.fixed_amount, Some(false));
}
