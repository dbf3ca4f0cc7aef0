//! Peel-chain detector: a balance shaved down by repeated small outputs.
//!
//! RULES:
//!   - A stage is a transaction in which the wallet pays exactly two
//!     distinct receivers (amounts summed per receiver) and the smaller
//!     side is at most `small_ratio` of the total.
//!   - Consecutive stages chain while their gap is at most `max_gap_secs`.
//!     The longest chain is kept, the earliest one on ties.
//!   - Chains shorter than `min_length` are ignored. Otherwise
//!     score = 0.5·min(len / norm_length, 1) + 0.25·(1 − CV of small
//!     amounts) + 0.25·(share of steps where the large amount does not
//!     grow), and the wallet is flagged at `threshold`.

use super::{
    sorted_history,
    stats::{clamp01, coefficient_of_variation},
    Detector, DetectorKind,
};
use crate::{
    config::PeelChainParams,
    ledger::{Transaction, Wallet},
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use std::collections::BTreeMap;

const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Stage {
    small: f64,
    large: f64,
    at:    DateTime<Utc>,
}

pub struct PeelChainDetector {
    params: PeelChainParams,
}

impl PeelChainDetector {
    pub fn new(params: PeelChainParams) -> Self {
        Self { params }
    }

    fn stage(&self, wallet: &Wallet, tx: &Transaction) -> Option<Stage> {
        let mut outputs: BTreeMap<&str, Decimal> = BTreeMap::new();
        for t in tx.transfers.iter().filter(|t| t.sender == wallet.address) {
            *outputs.entry(t.receiver.as_str()).or_insert(Decimal::ZERO) += t.amount;
        }
        if outputs.len() != 2 {
            return None;
        }

        let total: Decimal = outputs.values().copied().sum();
        if total <= Decimal::ZERO {
            return None;
        }
        let small = outputs.values().copied().min()?;
        let large = outputs.values().copied().max()?;
        let ratio = (small / total).to_f64()?;
        if ratio > self.params.small_ratio {
            return None;
        }

        Some(Stage {
            small: small.to_f64()?,
            large: large.to_f64()?,
            at:    tx.timestamp,
        })
    }

    fn longest_chain(&self, stages: Vec<Stage>) -> Vec<Stage> {
        let mut best: Vec<Stage> = Vec::new();
        let mut current: Vec<Stage> = Vec::new();

        for stage in stages {
            let linked = current
                .last()
                .map_or(true, |prev| (stage.at - prev.at).num_seconds() <= self.params.max_gap_secs);
            if !linked {
                if current.len() > best.len() {
                    best = std::mem::take(&mut current);
                } else {
                    current.clear();
                }
            }
            current.push(stage);
        }
        if current.len() > best.len() {
            best = current;
        }
        best
    }

    fn score(&self, chain: &[Stage]) -> f64 {
        let length = (chain.len() as f64 / self.params.norm_length as f64).min(1.0);

        let smalls: Vec<f64> = chain.iter().map(|s| s.small).collect();
        // A zero-mean series is treated as maximally unstable.
        let stability = 1.0 - clamp01(coefficient_of_variation(&smalls).unwrap_or(1.0));

        let decay = if chain.len() <= 1 {
            0.5
        } else {
            let non_increasing = chain.windows(2).filter(|w| w[1].large <= w[0].large).count();
            clamp01(non_increasing as f64 / (chain.len() - 1) as f64)
        };

        0.5 * length + 0.25 * stability + 0.25 * decay
    }

    fn detect(&self, wallet: &Wallet) -> bool {
        let stages: Vec<Stage> = sorted_history(wallet)
            .into_iter()
            .filter_map(|tx| self.stage(wallet, tx))
            .collect();
        let chain = self.longest_chain(stages);
        if chain.len() < self.params.min_length {
            return false;
        }

        let score = self.score(&chain);
        log::debug!("{}: peel chain of {} stages scored {score:.2}", wallet.address, chain.len());
        score + SCORE_EPSILON >= self.params.threshold
    }
}

impl Detector for PeelChainDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::PeelChain
    }

    fn analyze(&self, wallets: &mut [Wallet]) {
        for wallet in wallets.iter_mut() {
            let detected = !wallet.transactions.is_empty() && self.detect(wallet);
            if wallet.analysis.record(self.kind().pattern(), detected) {
                log::info!("Peel-chain pattern on {}", wallet.address);
            }
        }
    }
}
