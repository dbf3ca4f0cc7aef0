//! SQLite persistence layer for the ledger.
//!
//! RULE: Only the store talks to the database.
//! Sources and the engine call store methods; they never execute SQL directly.
//! Records accumulate; nothing in the crate deletes them.

use crate::{
    error::{TraceError, TraceResult},
    event::{AnalysisEvent, EventLogEntry},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::str::FromStr;

mod transaction;
mod wallet;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for a private in-memory ledger
}

impl LedgerStore {
    /// Open (or create) the ledger at `path`. `file:` URIs are accepted, so
    /// tests can share one in-memory ledger across connections.
    pub fn open(path: &str) -> TraceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // Memory-backed ledgers reject WAL; they keep the default journal.
        if let Err(e) = conn.execute_batch("PRAGMA journal_mode=WAL;") {
            log::debug!("Ledger {path} stays on the default journal: {e}");
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// A private ledger that lives as long as this connection.
    pub fn in_memory() -> TraceResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Another connection to this ledger, for a `StoredSource` running
    /// beside the engine. A private in-memory ledger cannot be shared, so
    /// its reopen is a new empty ledger.
    pub fn reopen(&self) -> TraceResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> TraceResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &AnalysisEvent) -> TraceResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (address, event_type, payload) VALUES (?1, ?2, ?3)",
            params![event.subject(), event.event_type(), serde_json::to_string(event)?],
        )?;
        Ok(())
    }

    pub fn events_for_address(&self, address: &str) -> TraceResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, address, event_type, payload
             FROM event_log WHERE address = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![address], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    address: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ── Column codecs ──────────────────────────────────────────────

fn parse_decimal(raw: &str) -> TraceResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| TraceError::InvalidAmount { value: raw.to_string() })
}

/// Timestamps are stored as epoch milliseconds.
fn encode_timestamp(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn parse_timestamp(millis: i64) -> TraceResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("timestamp {millis} ms out of range").into())
}
