use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported chain type: {chain}")]
    UnsupportedChain { chain: String },

    #[error("Transaction {tx_id} is inconsistent: {reason}")]
    InconsistentTransaction { tx_id: String, reason: String },

    #[error("Invalid amount: {value}")]
    InvalidAmount { value: String },

    #[error("Retrieval failed for {address}: {reason}")]
    Retrieval { address: String, reason: String },

    #[error("No ledger store attached")]
    NoStore,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TraceResult<T> = Result<T, TraceError>;
