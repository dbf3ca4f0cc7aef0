//! Tunable parameters for tracing and detection.
//!
//! Every section defaults to the production constants, so a config file
//! only needs to name the values it overrides.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub trace:        TraceLimits,
    pub fixed_amount: FixedAmountParams,
    pub multi_io:     MultiIoParams,
    pub looping:      LoopingParams,
    pub relayer:      RelayerParams,
    pub peel_chain:   PeelChainParams,
}

impl AnalysisConfig {
    /// Load a JSON config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        log::debug!("Loaded analysis config from {}", path.display());
        Ok(config)
    }
}

// ── Trace ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceLimits {
    /// History fetched per address by the flat trace.
    pub full_history_limit: usize,
    /// Recent history fetched per address by the depth-mapped trace.
    pub detailed_limit:     usize,
    /// Recent history attached to each wallet before detection.
    pub detect_history:     usize,
    /// Expansion depth used by the expand-then-detect flow.
    pub detect_depth:       u32,
    /// Hard cap on addresses visited by one trace.
    pub max_nodes:          usize,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            full_history_limit: 500,
            detailed_limit:     10,
            detect_history:     10,
            detect_depth:       2,
            max_nodes:          10_000,
        }
    }
}

// ── Detectors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedAmountParams {
    pub window_secs:      i64,
    /// Relative tolerance around each denomination.
    pub tolerance:        Decimal,
    pub min_repeats:      usize,
    pub max_entropy:      f64,
    pub denominations:    Vec<Decimal>,
}

impl Default for FixedAmountParams {
    fn default() -> Self {
        Self {
            window_secs:   300,
            tolerance:     dec!(0.02),
            min_repeats:   3,
            max_entropy:   0.45,
            denominations: vec![dec!(0.1), dec!(1), dec!(10)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiIoParams {
    pub window_secs:   i64,
    pub min_senders:   usize,
    pub min_receivers: usize,
    /// Output homogeneity bound. `None` disables the check.
    pub max_output_cv: Option<f64>,
}

impl Default for MultiIoParams {
    fn default() -> Self {
        Self {
            window_secs:   300,
            min_senders:   3,
            min_receivers: 3,
            max_output_cv: Some(0.30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopingParams {
    pub max_depth:         usize,
    pub causal_max_depth:  usize,
    /// Minimum path length (nodes) before a causal return counts as a loop.
    pub causal_min_path:   usize,
    /// Compact a looping wallet to its most recent N transactions.
    pub retain_on_loop:    Option<usize>,
}

impl Default for LoopingParams {
    fn default() -> Self {
        Self {
            max_depth:        5,
            causal_max_depth: 4,
            causal_min_path:  3,
            retain_on_loop:   None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayerParams {
    pub window_secs:      i64,
    pub min_payouts:      usize,
    /// Upper bound on max/min payout amount inside a window.
    pub max_amount_ratio: Decimal,
    pub threshold:        f64,
}

impl Default for RelayerParams {
    fn default() -> Self {
        Self {
            window_secs:      300,
            min_payouts:      3,
            max_amount_ratio: dec!(1.02),
            threshold:        0.70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeelChainParams {
    pub min_length:   usize,
    pub norm_length:  usize,
    pub small_ratio:  f64,
    pub max_gap_secs: i64,
    pub threshold:    f64,
}

impl Default for PeelChainParams {
    fn default() -> Self {
        Self {
            min_length:   4,
            norm_length:  8,
            small_ratio:  0.20,
            max_gap_secs: 24 * 3600,
            threshold:    0.70,
        }
    }
}
