use super::{encode_timestamp, parse_decimal, parse_timestamp, LedgerStore};
use crate::{
    error::TraceResult,
    ledger::{Transaction, Transfer},
    types::ChainType,
};
use rusqlite::params;

impl LedgerStore {
    // ── Transaction ───────────────────────────────────────────────

    /// Insert a transaction and its transfers. Idempotent by transaction id:
    /// returns false, writing nothing, when the id is already stored.
    pub fn insert_transaction(&self, chain: ChainType, tx: &Transaction) -> TraceResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO ledger_transaction (tx_id, chain, amount, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![tx.id, chain.as_str(), tx.amount.to_string(), encode_timestamp(&tx.timestamp)],
        )?;
        if inserted == 0 {
            return Ok(false);
        }

        for (position, t) in tx.transfers.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO transfer (tx_id, position, sender, receiver, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![tx.id, position as i64, t.sender, t.receiver, t.amount.to_string()],
            )?;
        }
        Ok(true)
    }

    /// Record that `tx_id` belongs to the history of `address`.
    pub fn link_wallet_transaction(&self, address: &str, tx_id: &str) -> TraceResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO wallet_transaction (address, tx_id) VALUES (?1, ?2)",
            params![address, tx_id],
        )?;
        Ok(())
    }

    /// Linked history of `address`, oldest first. With a limit, only the
    /// most recent `limit` transactions are returned.
    pub fn transactions_for_address(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> TraceResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.tx_id, t.amount, t.timestamp_ms
             FROM ledger_transaction t
             JOIN wallet_transaction w ON w.tx_id = t.tx_id
             WHERE w.address = ?1
             ORDER BY t.timestamp_ms DESC, t.tx_id DESC
             LIMIT ?2",
        )?;
        // SQLite treats a negative LIMIT as unbounded.
        let sql_limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![address, sql_limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut txs = Vec::with_capacity(rows.len());
        for (tx_id, amount, ts) in rows.into_iter().rev() {
            let mut tx = Transaction::new(tx_id, parse_decimal(&amount)?, parse_timestamp(ts)?);
            tx.transfers = self.transfers_for(&tx.id)?;
            txs.push(tx);
        }
        Ok(txs)
    }

    fn transfers_for(&self, tx_id: &str) -> TraceResult<Vec<Transfer>> {
        let mut stmt = self.conn.prepare(
            "SELECT sender, receiver, amount FROM transfer
             WHERE tx_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![tx_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(sender, receiver, amount)| -> TraceResult<Transfer> {
                Ok(Transfer::new(sender, receiver, parse_decimal(&amount)?))
            })
            .collect()
    }

    pub fn transaction_count(&self) -> TraceResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_transaction", [], |row| row.get(0))?;
        Ok(count)
    }
}
