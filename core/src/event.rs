//! Analysis events: the audit trail of traces and detections.
//!
//! RULE: events are appended, never rewritten. The engine persists every
//! event it returns when a ledger store is attached.

use crate::{
    ledger::PatternKind,
    types::{Address, ChainType},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    Flat,
    Detailed,
    TimeRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    TraceCompleted {
        seed:    Address,
        chain:   ChainType,
        mode:    TraceMode,
        visited: usize,
    },
    /// First time `pattern` was ever detected on `address`.
    PatternDetected {
        address: Address,
        chain:   ChainType,
        pattern: PatternKind,
    },
}

impl AnalysisEvent {
    /// Stable name for the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            AnalysisEvent::TraceCompleted { .. }  => "trace_completed",
            AnalysisEvent::PatternDetected { .. } => "pattern_detected",
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            AnalysisEvent::TraceCompleted { seed, .. }     => seed,
            AnalysisEvent::PatternDetected { address, .. } => address,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub address:    Address,
    pub event_type: String,
    pub payload:    String, // JSON-serialized AnalysisEvent
}
