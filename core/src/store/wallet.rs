use super::{parse_decimal, LedgerStore};
use crate::{
    error::TraceResult,
    ledger::{PatternAnalysis, Wallet},
    types::ChainType,
};
use rusqlite::{params, OptionalExtension};
use std::str::FromStr;

struct WalletRow {
    address:       String,
    chain:         String,
    balance:       String,
    flags:         [Option<bool>; 5],
    pattern_count: u32,
    counted_mask:  u8,
}

impl WalletRow {
    fn into_wallet(self) -> TraceResult<Wallet> {
        let mut wallet = Wallet::new(
            self.address,
            ChainType::from_str(&self.chain)?,
            parse_decimal(&self.balance)?,
        );
        wallet.analysis = PatternAnalysis::from_parts(self.flags, self.pattern_count, self.counted_mask);
        Ok(wallet)
    }
}

const WALLET_COLUMNS: &str = "address, chain, balance, fixed_amount, multi_io, looping,
                              relayer, peel_chain, pattern_count, counted_mask";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WalletRow> {
    Ok(WalletRow {
        address: row.get(0)?,
        chain:   row.get(1)?,
        balance: row.get(2)?,
        flags: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
        pattern_count: row.get::<_, i64>(8)? as u32,
        counted_mask:  row.get::<_, i64>(9)? as u8,
    })
}

impl LedgerStore {
    // ── Wallet ────────────────────────────────────────────────────

    /// Insert a wallet, or refresh chain and balance of an existing one.
    /// Stored analysis is left untouched on conflict.
    pub fn upsert_wallet(&self, wallet: &Wallet) -> TraceResult<()> {
        let a = &wallet.analysis;
        self.conn.execute(
            "INSERT INTO wallet (address, chain, balance, fixed_amount, multi_io, looping,
                                 relayer, peel_chain, pattern_count, counted_mask)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                chain = excluded.chain,
                balance = excluded.balance",
            params![
                wallet.address,
                wallet.chain.as_str(),
                wallet.balance.to_string(),
                a.fixed_amount,
                a.multi_io,
                a.looping,
                a.relayer,
                a.peel_chain,
                a.pattern_count as i64,
                a.counted_mask() as i64,
            ],
        )?;
        Ok(())
    }

    /// Persist the analysis record of `wallet`, creating the row if needed.
    ///
    /// Merges with what is stored: a flag the record leaves unset keeps its
    /// stored verdict, and detection history only ever grows.
    pub fn save_analysis(&self, wallet: &Wallet) -> TraceResult<()> {
        self.upsert_wallet(wallet)?;
        let a = &wallet.analysis;
        self.conn.execute(
            "UPDATE wallet SET
                fixed_amount  = COALESCE(?1, fixed_amount),
                multi_io      = COALESCE(?2, multi_io),
                looping       = COALESCE(?3, looping),
                relayer       = COALESCE(?4, relayer),
                peel_chain    = COALESCE(?5, peel_chain),
                pattern_count = MAX(pattern_count, ?6),
                counted_mask  = counted_mask | ?7
             WHERE address = ?8",
            params![
                a.fixed_amount,
                a.multi_io,
                a.looping,
                a.relayer,
                a.peel_chain,
                a.pattern_count as i64,
                a.counted_mask() as i64,
                wallet.address,
            ],
        )?;
        Ok(())
    }

    /// Wallet record without transactions.
    pub fn find_wallet(&self, address: &str) -> TraceResult<Option<Wallet>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {WALLET_COLUMNS} FROM wallet WHERE address = ?1"),
                params![address],
                read_row,
            )
            .optional()?;
        row.map(WalletRow::into_wallet).transpose()
    }

    /// Wallet record with every linked transaction attached.
    pub fn load_wallet(&self, address: &str) -> TraceResult<Option<Wallet>> {
        let Some(mut wallet) = self.find_wallet(address)? else {
            return Ok(None);
        };
        let txs = self.transactions_for_address(address, None)?;
        wallet.attach_transactions(txs);
        Ok(Some(wallet))
    }

    /// Every stored wallet with its transactions, ordered by address.
    pub fn all_wallets(&self) -> TraceResult<Vec<Wallet>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {WALLET_COLUMNS} FROM wallet ORDER BY address ASC"))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut wallets = Vec::with_capacity(rows.len());
        for row in rows {
            let mut wallet = row.into_wallet()?;
            let txs = self.transactions_for_address(&wallet.address, None)?;
            wallet.attach_transactions(txs);
            wallets.push(wallet);
        }
        Ok(wallets)
    }

    pub fn wallet_count(&self) -> TraceResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM wallet", [], |row| row.get(0))?;
        Ok(count)
    }
}
