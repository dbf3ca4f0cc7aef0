//! Looping detectors: funds that return to their origin.
//!
//! RULES:
//!   - The graph is built from every transfer of the batch, deduplicated
//!     by transaction id. Self-transfers are not edges.
//!   - The search from each wallet is a bounded DFS. Every branch gets its
//!     own copy of the visited set and path, so one branch never blocks an
//!     alternative route through the same address.
//!   - `Unordered`: a return to the start after at least one hop is a loop.
//!   - `Causal`: each edge must be strictly later than the edge used to
//!     reach the current node, and a return only counts once the path holds
//!     `causal_min_path` addresses.

use super::{unique_transactions, Detector, DetectorKind};
use crate::{config::LoopingParams, ledger::Wallet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOrdering {
    Unordered,
    Causal,
}

/// sender → (receiver, time of transfer), sorted.
type TransferGraph<'a> = BTreeMap<&'a str, BTreeSet<(&'a str, DateTime<Utc>)>>;

pub struct LoopingDetector {
    params:   LoopingParams,
    ordering: LoopOrdering,
}

struct Search<'g, 'a> {
    graph:     &'g TransferGraph<'a>,
    start:     &'a str,
    ordering:  LoopOrdering,
    max_depth: usize,
    min_path:  usize,
}

impl<'g, 'a> Search<'g, 'a> {
    fn run(&self) -> Option<Vec<&'a str>> {
        self.step(self.start, HashSet::new(), Vec::new(), None, 0)
    }

    fn step(
        &self,
        current: &'a str,
        mut visited: HashSet<&'a str>,
        mut path: Vec<&'a str>,
        reached_at: Option<DateTime<Utc>>,
        depth: usize,
    ) -> Option<Vec<&'a str>> {
        if depth > self.max_depth {
            return None;
        }
        visited.insert(current);
        path.push(current);

        let edges = self.graph.get(current)?;
        for &(next, at) in edges {
            if self.ordering == LoopOrdering::Causal && reached_at.map_or(false, |prev| at <= prev) {
                continue;
            }
            if next == self.start {
                if path.len() >= self.min_path {
                    let mut cycle = path.clone();
                    cycle.push(next);
                    return Some(cycle);
                }
                continue;
            }
            if visited.contains(next) {
                continue;
            }
            if let Some(found) = self.step(next, visited.clone(), path.clone(), Some(at), depth + 1) {
                return Some(found);
            }
        }
        None
    }
}

impl LoopingDetector {
    pub fn new(params: LoopingParams, ordering: LoopOrdering) -> Self {
        Self { params, ordering }
    }

    pub fn ordering(&self) -> LoopOrdering {
        self.ordering
    }

    fn build_graph(wallets: &[Wallet]) -> TransferGraph<'_> {
        let mut graph = TransferGraph::new();
        for tx in unique_transactions(wallets) {
            for t in tx.transfers.iter().filter(|t| t.sender != t.receiver) {
                graph
                    .entry(t.sender.as_str())
                    .or_default()
                    .insert((t.receiver.as_str(), tx.timestamp));
            }
        }
        graph
    }

    /// Loop paths keyed by start address, for every wallet that has one.
    fn find_loops(&self, wallets: &[Wallet]) -> BTreeMap<String, Vec<String>> {
        let graph = Self::build_graph(wallets);
        let (max_depth, min_path) = match self.ordering {
            LoopOrdering::Unordered => (self.params.max_depth, 2),
            LoopOrdering::Causal    => (self.params.causal_max_depth, self.params.causal_min_path),
        };

        wallets
            .iter()
            .filter(|w| !w.transactions.is_empty())
            .filter_map(|w| {
                let search = Search {
                    graph: &graph,
                    start: w.address.as_str(),
                    ordering: self.ordering,
                    max_depth,
                    min_path,
                };
                search.run().map(|path| {
                    let path: Vec<String> = path.into_iter().map(str::to_string).collect();
                    (w.address.clone(), path)
                })
            })
            .collect()
    }
}

impl Detector for LoopingDetector {
    fn kind(&self) -> DetectorKind {
        match self.ordering {
            LoopOrdering::Unordered => DetectorKind::Looping,
            LoopOrdering::Causal    => DetectorKind::CausalLooping,
        }
    }

    fn analyze(&self, wallets: &mut [Wallet]) {
        let loops = self.find_loops(wallets);

        for wallet in wallets.iter_mut() {
            let Some(path) = loops.get(&wallet.address) else {
                wallet.analysis.record(self.kind().pattern(), false);
                continue;
            };
            log::info!("Loop from {}: {}", wallet.address, path.join(" -> "));
            if wallet.analysis.record(self.kind().pattern(), true) {
                log::info!("Looping pattern on {}", wallet.address);
            }
            if let Some(n) = self.params.retain_on_loop {
                wallet.retain_recent(n);
            }
        }
    }
}
