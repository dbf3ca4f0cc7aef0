//! Detector pipeline: heuristic mixing/laundering detectors.
//!
//! RULES:
//!   - Every detector implements `Detector` and is stateless between calls.
//!   - A detector writes only its own flag, through
//!     `PatternAnalysis::record`, for every wallet it is given.
//!   - A wallet without transactions gets its flag set to false; detectors
//!     never fail on empty input.
//!   - Transactions shared by several wallets of a batch are counted once,
//!     keyed by transaction id.

use crate::{
    ledger::{PatternKind, Transaction, Wallet},
    types::ChainType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod fixed_amount;
pub mod looping;
pub mod multi_io;
pub mod peel_chain;
pub mod relayer;
pub mod stats;

pub use fixed_amount::FixedAmountDetector;
pub use looping::{LoopOrdering, LoopingDetector};
pub use multi_io::MultiIoDetector;
pub use peel_chain::PeelChainDetector;
pub use relayer::RelayerDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    FixedAmount,
    MultiIo,
    Looping,
    CausalLooping,
    Relayer,
    PeelChain,
}

impl DetectorKind {
    /// Registration order used by the default dispatcher.
    pub const ALL: [DetectorKind; 6] = [
        DetectorKind::FixedAmount,
        DetectorKind::MultiIo,
        DetectorKind::Relayer,
        DetectorKind::PeelChain,
        DetectorKind::Looping,
        DetectorKind::CausalLooping,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::FixedAmount   => "fixed_amount",
            DetectorKind::MultiIo       => "multi_io",
            DetectorKind::Looping       => "looping",
            DetectorKind::CausalLooping => "causal_looping",
            DetectorKind::Relayer       => "relayer",
            DetectorKind::PeelChain     => "peel_chain",
        }
    }

    /// The wallet flag this detector owns.
    pub fn pattern(self) -> PatternKind {
        match self {
            DetectorKind::FixedAmount   => PatternKind::FixedAmount,
            DetectorKind::MultiIo       => PatternKind::MultiIo,
            DetectorKind::Looping
            | DetectorKind::CausalLooping => PatternKind::Looping,
            DetectorKind::Relayer       => PatternKind::Relayer,
            DetectorKind::PeelChain     => PatternKind::PeelChain,
        }
    }

    /// Compatibility table: which chains each detector is meaningful for.
    ///
    /// | detector       | bitcoin | ethereum |
    /// |----------------|---------|----------|
    /// | fixed_amount   | yes     | yes      |
    /// | multi_io       | yes     | yes      |
    /// | looping        | yes     | no       |
    /// | causal_looping | no      | yes      |
    /// | relayer        | no      | yes      |
    /// | peel_chain     | yes     | no       |
    pub fn applies_to(self, chain: ChainType) -> bool {
        matches!(
            (self, chain),
            (DetectorKind::FixedAmount, _)
                | (DetectorKind::MultiIo, _)
                | (DetectorKind::Looping, ChainType::Bitcoin)
                | (DetectorKind::PeelChain, ChainType::Bitcoin)
                | (DetectorKind::CausalLooping, ChainType::Ethereum)
                | (DetectorKind::Relayer, ChainType::Ethereum)
        )
    }
}

/// The contract every detector must fulfill.
pub trait Detector: Send {
    fn kind(&self) -> DetectorKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Analyse the batch and record a verdict on every wallet in it.
    fn analyze(&self, wallets: &mut [Wallet]);
}

/// Distinct transactions of a batch, oldest first.
pub(crate) fn unique_transactions(wallets: &[Wallet]) -> Vec<&Transaction> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut txs: Vec<&Transaction> = wallets
        .iter()
        .flat_map(|w| w.transactions.iter())
        .filter(|tx| seen.insert(tx.id.as_str()))
        .collect();
    txs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    txs
}

/// A wallet's transactions sorted oldest first, without mutating it.
pub(crate) fn sorted_history(wallet: &Wallet) -> Vec<&Transaction> {
    let mut txs: Vec<&Transaction> = wallet.transactions.iter().collect();
    txs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    txs
}
