//! Relayer detector: automated disbursers paying fresh addresses.
//!
//! RULES:
//!   - The transfer universe is every transfer of the batch's distinct
//!     transactions. Candidates are grouped by sender.
//!   - A window starts at each of a candidate's transfers and covers its
//!     transfers within `window_secs`. The window score is
//!     0.4·[count ≥ min_payouts] + 0.3·[max/min ≤ max_amount_ratio]
//!     + 0.2·(1 − CV of intervals) + 0.1·[every receiver is fresh].
//!   - A receiver is fresh when no transfer in the batch earlier than the
//!     window start touches it. Only the batch is consulted, not the chain.
//!   - Every wallet of the batch gets a verdict: true when its address is a
//!     flagged candidate.

use super::{
    stats::{clamp01, coefficient_of_variation, within_window},
    unique_transactions, Detector, DetectorKind,
};
use crate::{
    config::RelayerParams,
    ledger::{Transfer, Wallet},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

const W_COUNT: f64 = 0.4;
const W_UNIFORM: f64 = 0.3;
const W_REGULAR: f64 = 0.2;
const W_FRESH: f64 = 0.1;
/// Absorbs rounding in the weighted sum.
const SCORE_EPSILON: f64 = 1e-9;

type Payout<'a> = (DateTime<Utc>, &'a Transfer);

pub struct RelayerDetector {
    params: RelayerParams,
}

impl RelayerDetector {
    pub fn new(params: RelayerParams) -> Self {
        Self { params }
    }

    /// Score of the window `payouts`, given every timed transfer of the batch.
    fn score(&self, payouts: &[Payout<'_>], universe: &[Payout<'_>]) -> f64 {
        let Some(&(start, _)) = payouts.first() else {
            return 0.0;
        };
        let mut score = 0.0;

        if payouts.len() >= self.params.min_payouts {
            score += W_COUNT;
        }

        let min = payouts.iter().map(|(_, t)| t.amount).min().unwrap_or(Decimal::ZERO);
        let max = payouts.iter().map(|(_, t)| t.amount).max().unwrap_or(Decimal::ZERO);
        if min > Decimal::ZERO && max <= min * self.params.max_amount_ratio {
            score += W_UNIFORM;
        }

        let intervals: Vec<f64> = payouts
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).num_milliseconds() as f64 / 1000.0)
            .collect();
        // All-zero intervals are perfectly regular.
        let cv = coefficient_of_variation(&intervals).unwrap_or(0.0);
        score += W_REGULAR * (1.0 - clamp01(cv));

        let receivers: BTreeSet<&str> = payouts.iter().map(|(_, t)| t.receiver.as_str()).collect();
        let fresh = receivers.iter().all(|r| {
            !universe
                .iter()
                .any(|(at, t)| *at < start && t.touches(r))
        });
        if fresh {
            score += W_FRESH;
        }

        score
    }

    /// Addresses whose payouts score at or above the threshold in some window.
    fn flagged_senders(&self, wallets: &[Wallet]) -> BTreeSet<String> {
        let universe: Vec<Payout<'_>> = unique_transactions(wallets)
            .into_iter()
            .flat_map(|tx| tx.transfers.iter().map(move |t| (tx.timestamp, t)))
            .collect();

        let mut by_sender: BTreeMap<&str, Vec<Payout<'_>>> = BTreeMap::new();
        for &(at, t) in &universe {
            if t.sender != t.receiver {
                by_sender.entry(t.sender.as_str()).or_default().push((at, t));
            }
        }

        let mut flagged = BTreeSet::new();
        for (sender, mut payouts) in by_sender {
            payouts.sort_by_key(|(at, _)| *at);

            for i in 0..payouts.len() {
                let start = payouts[i].0;
                let end = payouts[i..]
                    .iter()
                    .take_while(|(at, _)| within_window(start, *at, self.params.window_secs))
                    .count();
                let score = self.score(&payouts[i..i + end], &universe);
                if score + SCORE_EPSILON >= self.params.threshold {
                    log::debug!("{sender}: relayer window of {end} payouts scored {score:.2}");
                    flagged.insert(sender.to_string());
                    break;
                }
            }
        }
        flagged
    }
}

impl Detector for RelayerDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Relayer
    }

    fn analyze(&self, wallets: &mut [Wallet]) {
        let flagged = self.flagged_senders(wallets);
        log::debug!("{} relayer candidates flagged", flagged.len());

        for wallet in wallets.iter_mut() {
            let detected = flagged.contains(&wallet.address);
            if wallet.analysis.record(self.kind().pattern(), detected) {
                log::info!("Relayer pattern on {}", wallet.address);
            }
        }
    }
}
