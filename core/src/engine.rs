//! The trace engine: entry point for tracing and pattern detection.
//!
//! RULES:
//!   - Every chain-specific call goes through the source registered for
//!     that chain; an unregistered chain is `UnsupportedChain`.
//!   - Detection always goes through the dispatcher, never a detector
//!     directly.
//!   - With a ledger store attached, every analysed wallet and every
//!     returned event is persisted before the call returns, and stored
//!     analysis is merged into wallets before they are re-analysed.

use crate::{
    config::AnalysisConfig,
    dispatch::DetectorDispatcher,
    error::{TraceError, TraceResult},
    event::{AnalysisEvent, TraceMode},
    ledger::{PatternAnalysis, PatternKind, Wallet},
    source::{ChainDataSource, SourceRegistry},
    store::LedgerStore,
    trace::{DepthMap, GraphTracer},
    types::{Address, ChainType, Depth},
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub struct TraceEngine {
    registry:   SourceRegistry,
    dispatcher: DetectorDispatcher,
    config:     AnalysisConfig,
    store:      Option<LedgerStore>,
}

impl TraceEngine {
    pub fn new(registry: SourceRegistry, config: AnalysisConfig) -> Self {
        Self {
            dispatcher: DetectorDispatcher::new(&config),
            registry,
            config,
            store: None,
        }
    }

    /// Persist analysis results and events to `store`.
    pub fn with_store(mut self, store: LedgerStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: DetectorDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&LedgerStore> {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &DetectorDispatcher {
        &self.dispatcher
    }

    // ── Tracing ─────────────────────────────────────────────────────────

    /// Every address reachable from `address` within `max_depth` hops.
    pub fn trace(
        &self,
        address: &str,
        chain: ChainType,
        depth: Depth,
        max_depth: Depth,
    ) -> TraceResult<BTreeSet<Address>> {
        let source = self.registry.get(chain)?;
        let mut visited = BTreeSet::new();
        GraphTracer::new(source, &self.config.trace).trace(address, depth, max_depth, &mut visited);

        self.trace_completed(address, chain, TraceMode::Flat, visited.len())?;
        Ok(visited)
    }

    pub fn trace_detailed(
        &self,
        address: &str,
        chain: ChainType,
        depth: Depth,
        max_depth: Depth,
    ) -> TraceResult<DepthMap> {
        let source = self.registry.get(chain)?;
        let mut visited = BTreeSet::new();
        let depth_map = GraphTracer::new(source, &self.config.trace)
            .trace_detailed(address, depth, max_depth, &mut visited);

        self.trace_completed(address, chain, TraceMode::Detailed, visited.len())?;
        Ok(depth_map)
    }

    pub fn trace_by_time_range(
        &self,
        address: &str,
        chain: ChainType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_depth: Depth,
        limit: usize,
    ) -> TraceResult<Vec<Wallet>> {
        let source = self.registry.get(chain)?;
        let mut visited = BTreeSet::new();
        let wallets = GraphTracer::new(source, &self.config.trace)
            .trace_by_time_range(address, start, end, max_depth, limit, &mut visited);

        self.trace_completed(address, chain, TraceMode::TimeRange, visited.len())?;
        Ok(wallets)
    }

    // ── Detection ───────────────────────────────────────────────────────

    /// Run every compatible detector over `wallets`.
    pub fn detect(&self, wallets: &mut [Wallet]) -> TraceResult<Vec<AnalysisEvent>> {
        let events = self.dispatcher.run_all(wallets);
        self.persist(wallets, &events)?;
        Ok(events)
    }

    /// Expand-then-detect around `address`.
    ///
    /// An unknown seed yields an empty batch. A seed that already carries
    /// every applicable verdict is returned on its own, unchanged.
    pub fn detect_address(&self, address: &str, chain: ChainType) -> TraceResult<Vec<Wallet>> {
        let source = self.registry.get(chain)?;
        let Some(seed) = self.recent_wallet(source, address)? else {
            log::warn!("No wallet found for {address} on {chain}");
            return Ok(Vec::new());
        };
        if self.dispatcher.is_analysed(&seed) {
            log::info!("{address} already analysed, skipping expansion");
            return Ok(vec![seed]);
        }

        let mut wallets = self.expand(source, seed);
        let events = self.dispatcher.run_pending(&mut wallets);
        self.persist(&wallets, &events)?;
        Ok(wallets)
    }

    /// Expand around `address` and re-run only the looping detectors.
    pub fn detect_looping_only(&self, address: &str, chain: ChainType) -> TraceResult<Vec<Wallet>> {
        let source = self.registry.get(chain)?;
        let Some(seed) = self.recent_wallet(source, address)? else {
            log::warn!("No wallet found for {address} on {chain}");
            return Ok(Vec::new());
        };

        let mut wallets = self.expand(source, seed);
        let events = self.dispatcher.run_only(PatternKind::Looping, &mut wallets);
        self.persist(&wallets, &events)?;
        Ok(wallets)
    }

    /// Run every compatible detector over every stored wallet and persist
    /// the results.
    pub fn detect_stored(&self) -> TraceResult<Vec<Wallet>> {
        let mut wallets = self.stored_wallets()?;
        log::info!("Running all detectors over {} stored wallets", wallets.len());
        let events = self.dispatcher.run_all(&mut wallets);
        self.persist(&wallets, &events)?;
        Ok(wallets)
    }

    /// Every stored wallet with its stored history, ordered by address.
    pub fn stored_wallets(&self) -> TraceResult<Vec<Wallet>> {
        let store = self.store.as_ref().ok_or(TraceError::NoStore)?;
        store.all_wallets()
    }

    /// Resolve one wallet and attach up to `limit` of its most recent
    /// transactions (all of them with `None`).
    pub fn search(
        &self,
        address: &str,
        chain: ChainType,
        limit: Option<usize>,
    ) -> TraceResult<Option<Wallet>> {
        let source = self.registry.get(chain)?;
        let Some(mut wallet) = source.find_address(address)? else {
            return Ok(None);
        };
        wallet.attach_transactions(source.get_transactions(address, limit)?);
        wallet.sort_transactions();
        Ok(Some(wallet))
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Resolve `address` with its recent history. With a store attached,
    /// the stored analysis is carried over so earlier verdicts survive.
    fn recent_wallet(&self, source: &dyn ChainDataSource, address: &str) -> TraceResult<Option<Wallet>> {
        let Some(mut wallet) = source.find_address(address)? else {
            return Ok(None);
        };
        if let Some(stored) = self.stored_analysis(address)? {
            wallet.analysis.absorb(&stored);
        }
        let limit = Some(self.config.trace.detect_history);
        wallet.attach_transactions(source.get_transactions(address, limit)?);
        wallet.sort_transactions();
        Ok(Some(wallet))
    }

    fn stored_analysis(&self, address: &str) -> TraceResult<Option<PatternAnalysis>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        Ok(store.find_wallet(address)?.map(|w| w.analysis))
    }

    /// The seed plus every wallet within `detect_depth` hops, each with its
    /// recent history attached. Addresses that fail to resolve are skipped.
    fn expand(&self, source: &dyn ChainDataSource, seed: Wallet) -> Vec<Wallet> {
        let limits = &self.config.trace;
        let seed_address = seed.address.clone();
        let mut visited = BTreeSet::new();
        GraphTracer::new(source, limits).trace(&seed_address, 0, limits.detect_depth, &mut visited);
        log::info!("Expanded {seed_address} to {} addresses", visited.len());

        let mut wallets = vec![seed];
        for address in visited.iter().filter(|a| **a != seed_address) {
            match self.recent_wallet(source, address) {
                Ok(Some(wallet)) => wallets.push(wallet),
                Ok(None) => log::debug!("{address} did not resolve"),
                Err(e) => log::warn!("Skipping {address}: {e}"),
            }
        }
        wallets
    }

    fn trace_completed(
        &self,
        seed: &str,
        chain: ChainType,
        mode: TraceMode,
        visited: usize,
    ) -> TraceResult<()> {
        log::info!("Trace {mode:?} from {seed} on {chain} visited {visited} addresses");
        let event = AnalysisEvent::TraceCompleted {
            seed: seed.to_string(),
            chain,
            mode,
            visited,
        };
        if let Some(store) = &self.store {
            store.append_event(&event)?;
        }
        Ok(())
    }

    fn persist(&self, wallets: &[Wallet], events: &[AnalysisEvent]) -> TraceResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        for wallet in wallets {
            store.save_analysis(wallet)?;
        }
        for event in events {
            store.append_event(event)?;
        }
        log::debug!("Persisted {} wallets and {} events", wallets.len(), events.len());
        Ok(())
    }
}
