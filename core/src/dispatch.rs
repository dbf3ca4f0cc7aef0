//! Detector dispatcher: runs the registered detectors over a wallet batch.
//!
//! RULES:
//!   - The batch is partitioned by chain, keeping the caller's order inside
//!     each partition. A detector only ever sees wallets of chains its
//!     compatibility entry allows.
//!   - Detectors run in registration order on each partition.
//!   - A `PatternDetected` event is emitted the first time a pattern is
//!     ever detected on a wallet, never on re-detection.
//!   - Running the dispatcher twice on an unchanged batch changes nothing.

use crate::{
    config::AnalysisConfig,
    detect::{
        Detector, DetectorKind, FixedAmountDetector, LoopOrdering, LoopingDetector,
        MultiIoDetector, PeelChainDetector, RelayerDetector,
    },
    event::AnalysisEvent,
    ledger::{PatternAnalysis, PatternKind, Wallet},
    types::ChainType,
};

pub struct DetectorDispatcher {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorDispatcher {
    /// An empty dispatcher; detectors are added with `register`.
    pub fn empty() -> Self {
        Self { detectors: Vec::new() }
    }

    /// Every detector, configured from `config`, in `DetectorKind::ALL` order.
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut dispatcher = Self::empty();
        for kind in DetectorKind::ALL {
            dispatcher.register(build_detector(kind, config));
        }
        dispatcher
    }

    pub fn register(&mut self, detector: Box<dyn Detector>) {
        log::debug!("Registered detector: {}", detector.name());
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every compatible detector on the batch.
    pub fn run_all(&self, wallets: &mut [Wallet]) -> Vec<AnalysisEvent> {
        self.run_filtered(wallets, |_| true)
    }

    /// Run only the detectors that own `pattern`. For looping this is both
    /// variants, each on the chains it applies to.
    pub fn run_only(&self, pattern: PatternKind, wallets: &mut [Wallet]) -> Vec<AnalysisEvent> {
        self.run_filtered(wallets, |kind| kind.pattern() == pattern)
    }

    /// Run the full pipeline unless every wallet already carries a verdict
    /// from every detector that applies to it.
    pub fn run_pending(&self, wallets: &mut [Wallet]) -> Vec<AnalysisEvent> {
        if wallets.iter().all(|w| self.is_analysed(w)) {
            log::debug!("All {} wallets already analysed", wallets.len());
            return Vec::new();
        }
        self.run_all(wallets)
    }

    /// Every registered detector that applies to the wallet's chain has
    /// produced a verdict on it.
    pub fn is_analysed(&self, wallet: &Wallet) -> bool {
        self.detectors
            .iter()
            .filter(|d| d.kind().applies_to(wallet.chain))
            .all(|d| wallet.analysis.flag(d.kind().pattern()).is_some())
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn run_filtered<F>(&self, wallets: &mut [Wallet], select: F) -> Vec<AnalysisEvent>
    where
        F: Fn(DetectorKind) -> bool,
    {
        let mut events = Vec::new();

        for chain in ChainType::ALL {
            let indices: Vec<usize> = (0..wallets.len())
                .filter(|&i| wallets[i].chain == chain)
                .collect();
            if indices.is_empty() {
                continue;
            }

            let mut partition: Vec<Wallet> = indices.iter().map(|&i| wallets[i].clone()).collect();
            let before: Vec<PatternAnalysis> = partition.iter().map(|w| w.analysis.clone()).collect();

            for detector in self
                .detectors
                .iter()
                .filter(|d| d.kind().applies_to(chain) && select(d.kind()))
            {
                log::debug!("Running {} on {} {chain} wallets", detector.name(), partition.len());
                detector.analyze(&mut partition);
            }

            for (wallet, prior) in partition.iter().zip(&before) {
                events.extend(first_detections(wallet, prior));
            }
            for (i, wallet) in indices.into_iter().zip(partition) {
                wallets[i] = wallet;
            }
        }

        if !events.is_empty() {
            log::info!("{} new pattern detections", events.len());
        }
        events
    }
}

fn build_detector(kind: DetectorKind, config: &AnalysisConfig) -> Box<dyn Detector> {
    match kind {
        DetectorKind::FixedAmount   => Box::new(FixedAmountDetector::new(config.fixed_amount.clone())),
        DetectorKind::MultiIo       => Box::new(MultiIoDetector::new(config.multi_io.clone())),
        DetectorKind::Looping       => {
            Box::new(LoopingDetector::new(config.looping.clone(), LoopOrdering::Unordered))
        }
        DetectorKind::CausalLooping => {
            Box::new(LoopingDetector::new(config.looping.clone(), LoopOrdering::Causal))
        }
        DetectorKind::Relayer       => Box::new(RelayerDetector::new(config.relayer.clone())),
        DetectorKind::PeelChain     => Box::new(PeelChainDetector::new(config.peel_chain.clone())),
    }
}

fn first_detections(wallet: &Wallet, prior: &PatternAnalysis) -> Vec<AnalysisEvent> {
    PatternKind::ALL
        .into_iter()
        .filter(|k| wallet.analysis.ever_detected(*k) && !prior.ever_detected(*k))
        .map(|pattern| AnalysisEvent::PatternDetected {
            address: wallet.address.clone(),
            chain: wallet.chain,
            pattern,
        })
        .collect()
}
