//! mixtrace-core: address-graph tracing and mixing-pattern detection over
//! recorded blockchain ledgers.

pub mod config;
pub mod detect;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod source;
pub mod store;
pub mod trace;
pub mod types;
