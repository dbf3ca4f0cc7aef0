//! Graph trace engine: bounded-depth expansion outward from a seed address.
//!
//! RULES:
//!   - A branch ends when its depth exceeds `max_depth` or its address is
//!     already visited. An address is marked visited before its neighbours
//!     are expanded, so cyclic transfer graphs terminate.
//!   - The visited set is shared by every branch of one traversal. It is
//!     passed by `&mut` and never copied: siblings observe each other.
//!   - Expansion order is the depth-first order of the recursive
//!     formulation, with neighbours taken in sorted address order. An
//!     explicit stack replaces the call stack.
//!   - A retrieval failure contributes nothing to the trace. It never
//!     aborts sibling branches.

use crate::{
    config::TraceLimits,
    error::TraceResult,
    ledger::{Transaction, Wallet},
    source::ChainDataSource,
    types::{Address, Depth},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Wallets keyed by the hop count at which they were discovered.
pub type DepthMap = BTreeMap<Depth, Vec<Wallet>>;

pub struct GraphTracer<'a> {
    source: &'a dyn ChainDataSource,
    limits: &'a TraceLimits,
}

impl<'a> GraphTracer<'a> {
    pub fn new(source: &'a dyn ChainDataSource, limits: &'a TraceLimits) -> Self {
        Self { source, limits }
    }

    /// Flat trace: fills `visited` with every address reachable from `seed`
    /// within `max_depth` hops.
    pub fn trace(
        &self,
        seed: &str,
        depth: Depth,
        max_depth: Depth,
        visited: &mut BTreeSet<Address>,
    ) {
        let limit = Some(self.limits.full_history_limit);
        self.walk(seed, depth, max_depth, visited, |address, _| {
            self.fetch(address, limit)
        });
    }

    /// Depth-mapped trace over bounded recent history.
    ///
    /// Every visited address gets exactly one slot at the depth it was
    /// discovered. Addresses without data or transactions appear with an
    /// empty history and are not expanded.
    pub fn trace_detailed(
        &self,
        seed: &str,
        depth: Depth,
        max_depth: Depth,
        visited: &mut BTreeSet<Address>,
    ) -> DepthMap {
        let mut depth_map = DepthMap::new();
        let limit = Some(self.limits.detailed_limit);

        self.walk(seed, depth, max_depth, visited, |address, depth| {
            let Some(mut wallet) = self.resolve(address) else {
                depth_map
                    .entry(depth)
                    .or_default()
                    .push(Wallet::new(address, self.source.chain(), Decimal::ZERO));
                return Vec::new();
            };
            let txs = self.fetch(address, limit);
            wallet.attach_transactions(txs.iter().cloned());
            depth_map.entry(depth).or_default().push(wallet);
            txs
        });

        depth_map
    }

    /// Time-sliced trace: only transactions inside `[start, end]` are
    /// attached and followed. An address with nothing in range is visited
    /// but neither returned nor expanded.
    pub fn trace_by_time_range(
        &self,
        seed: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_depth: Depth,
        limit: usize,
        visited: &mut BTreeSet<Address>,
    ) -> Vec<Wallet> {
        let mut wallets = Vec::new();

        self.walk(seed, 0, max_depth, visited, |address, _| {
            let txs: Vec<Transaction> = match self
                .source
                .get_transactions_in_range(address, start, end, limit)
            {
                Ok(txs) => txs
                    .into_iter()
                    .filter(|tx| tx.timestamp >= start && tx.timestamp <= end)
                    .collect(),
                Err(e) => {
                    log::warn!("Range retrieval failed for {address}: {e}");
                    Vec::new()
                }
            };
            if txs.is_empty() {
                return txs;
            }

            let mut wallet = self
                .resolve(address)
                .unwrap_or_else(|| Wallet::new(address, self.source.chain(), Decimal::ZERO));
            wallet.attach_transactions(txs.iter().cloned());
            wallets.push(wallet);
            txs
        });

        wallets
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Depth-first expansion. `visit` is called once per newly visited
    /// address and returns the transactions whose counterparties form the
    /// next frontier.
    fn walk<F>(
        &self,
        seed: &str,
        depth: Depth,
        max_depth: Depth,
        visited: &mut BTreeSet<Address>,
        mut visit: F,
    ) where
        F: FnMut(&str, Depth) -> Vec<Transaction>,
    {
        let mut stack: Vec<(Address, Depth)> = vec![(seed.to_string(), depth)];

        while let Some((address, depth)) = stack.pop() {
            if depth > max_depth || visited.contains(&address) {
                continue;
            }
            if visited.len() >= self.limits.max_nodes {
                log::warn!(
                    "Trace from {seed} stopped at node budget {} ({} addresses pending)",
                    self.limits.max_nodes,
                    stack.len() + 1
                );
                break;
            }

            visited.insert(address.clone());
            let txs = visit(&address, depth);
            log::debug!("depth={depth} {address}: {} transactions", txs.len());

            let next: BTreeSet<&Address> = txs
                .iter()
                .flat_map(|tx| tx.counterparties())
                .filter(|a| !visited.contains(*a))
                .collect();

            // Reverse push: the smallest address is popped, and fully
            // expanded, before its siblings.
            for a in next.into_iter().rev() {
                stack.push((a.clone(), depth + 1));
            }
        }
    }

    fn fetch(&self, address: &str, limit: Option<usize>) -> Vec<Transaction> {
        match self.source.get_transactions(address, limit) {
            Ok(txs) => txs,
            Err(e) => {
                log::warn!("Retrieval failed for {address}: {e}");
                Vec::new()
            }
        }
    }

    fn resolve(&self, address: &str) -> Option<Wallet> {
        let found: TraceResult<Option<Wallet>> = self.source.find_address(address);
        match found {
            Ok(wallet) => wallet,
            Err(e) => {
                log::warn!("Wallet lookup failed for {address}: {e}");
                None
            }
        }
    }
}

/// Every address present in a depth map.
pub fn depth_map_addresses(depth_map: &DepthMap) -> BTreeSet<Address> {
    depth_map
        .values()
        .flatten()
        .map(|w| w.address.clone())
        .collect()
}
