//! Multi-IO detector: fan-in and fan-out around one wallet.
//!
//! RULES:
//!   - Windows are built as in the fixed-amount detector.
//!   - Senders and receivers are counted over the window's transfers,
//!     distinct by address, with the wallet itself left out of both sets.
//!   - With `max_output_cv` set, the amounts paid to the counted receivers
//!     must also be homogeneous.

use super::{
    sorted_history,
    stats::{coefficient_of_variation, within_window},
    Detector, DetectorKind,
};
use crate::{config::MultiIoParams, ledger::Wallet};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;

pub struct MultiIoDetector {
    params: MultiIoParams,
}

impl MultiIoDetector {
    pub fn new(params: MultiIoParams) -> Self {
        Self { params }
    }

    fn detect(&self, wallet: &Wallet) -> bool {
        let txs = sorted_history(wallet);
        let own = wallet.address.as_str();

        for (i, first) in txs.iter().enumerate() {
            let mut senders: HashSet<&str> = HashSet::new();
            let mut receivers: HashSet<&str> = HashSet::new();
            let mut outputs: Vec<f64> = Vec::new();

            let window = txs[i..]
                .iter()
                .take_while(|tx| within_window(first.timestamp, tx.timestamp, self.params.window_secs));
            for tx in window {
                for t in &tx.transfers {
                    if t.sender != own {
                        senders.insert(&t.sender);
                    }
                    if t.receiver != own {
                        receivers.insert(&t.receiver);
                        outputs.push(t.amount.to_f64().unwrap_or(0.0));
                    }
                }
            }

            if senders.len() < self.params.min_senders || receivers.len() < self.params.min_receivers {
                continue;
            }
            let homogeneous = match self.params.max_output_cv {
                // Zero-mean outputs have no usable spread.
                Some(bound) => coefficient_of_variation(&outputs).map_or(false, |cv| cv <= bound),
                None => true,
            };
            if homogeneous {
                log::debug!(
                    "{own}: {} senders, {} receivers from {}",
                    senders.len(),
                    receivers.len(),
                    first.id
                );
                return true;
            }
        }
        false
    }
}

impl Detector for MultiIoDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MultiIo
    }

    fn analyze(&self, wallets: &mut [Wallet]) {
        for wallet in wallets.iter_mut() {
            let detected = !wallet.transactions.is_empty() && self.detect(wallet);
            if wallet.analysis.record(self.kind().pattern(), detected) {
                log::info!("Multi-IO pattern on {}", wallet.address);
            }
        }
    }
}
