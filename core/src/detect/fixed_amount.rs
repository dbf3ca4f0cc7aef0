//! Fixed-amount detector: repeated payments of one canonical size.
//!
//! RULE: a window starts at every transaction and covers all later
//! transactions within `window_secs`. Only transfers the wallet sends are
//! bucketed. The wallet is flagged when some window has a bucket of at
//! least `min_repeats` and its normalized entropy is at most `max_entropy`.

use super::{
    sorted_history,
    stats::{normalized_entropy, within_window},
    Detector, DetectorKind,
};
use crate::{config::FixedAmountParams, ledger::Wallet};
use rust_decimal::Decimal;

pub struct FixedAmountDetector {
    params: FixedAmountParams,
}

impl FixedAmountDetector {
    pub fn new(params: FixedAmountParams) -> Self {
        Self { params }
    }

    fn in_band(&self, amount: Decimal, denomination: Decimal) -> bool {
        let lo = denomination * (Decimal::ONE - self.params.tolerance);
        let hi = denomination * (Decimal::ONE + self.params.tolerance);
        amount >= lo && amount <= hi
    }

    fn detect(&self, wallet: &Wallet) -> bool {
        let txs = sorted_history(wallet);
        let denoms = &self.params.denominations;

        for (i, first) in txs.iter().enumerate() {
            let mut histogram = vec![0usize; denoms.len()];

            let window = txs[i..]
                .iter()
                .take_while(|tx| within_window(first.timestamp, tx.timestamp, self.params.window_secs));
            for tx in window {
                for transfer in tx.transfers.iter().filter(|t| t.sender == wallet.address) {
                    for (bucket, d) in denoms.iter().enumerate() {
                        if self.in_band(transfer.amount, *d) {
                            histogram[bucket] += 1;
                        }
                    }
                }
            }

            let max_bucket = histogram.iter().copied().max().unwrap_or(0);
            if max_bucket == 0 {
                continue;
            }
            let entropy = normalized_entropy(&histogram);
            if max_bucket >= self.params.min_repeats && entropy <= self.params.max_entropy {
                log::debug!(
                    "{}: {max_bucket} repeats from {} (entropy {entropy:.3})",
                    wallet.address,
                    first.id
                );
                return true;
            }
        }
        false
    }
}

impl Detector for FixedAmountDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FixedAmount
    }

    fn analyze(&self, wallets: &mut [Wallet]) {
        for wallet in wallets.iter_mut() {
            let detected = !wallet.transactions.is_empty() && self.detect(wallet);
            if wallet.analysis.record(self.kind().pattern(), detected) {
                log::info!("Fixed-amount pattern on {}", wallet.address);
            }
        }
    }
}
