//! trace-runner: headless tracing and detection over a recorded ledger.
//!
//! Usage:
//!   trace-runner trace          --ledger ledger.json --chain bitcoin --address A --max-depth 2
//!   trace-runner trace-detailed --ledger ledger.json --address A
//!   trace-runner trace-range    --ledger ledger.json --address A --start 2024-01-01T00:00:00Z --end 1704153600 --limit 25
//!   trace-runner detect         --ledger ledger.json --address A --db trace.db
//!   trace-runner detect         --ledger ledger.json --db trace.db        (every stored wallet)
//!   trace-runner detect-looping --ledger ledger.json --chain ethereum --address A
//!   trace-runner search         --ledger ledger.json --address A --limit 10
//!   trace-runner graph          --ledger ledger.json --address A --max-depth 2
//!   trace-runner graph          --ledger ledger.json --db trace.db        (every stored wallet)

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use mixtrace_core::{
    config::AnalysisConfig,
    engine::TraceEngine,
    ledger::Wallet,
    source::{ChainDataSource, LedgerSnapshot, MemorySource, SourceRegistry, StoredSource},
    store::LedgerStore,
    types::{ChainType, Depth},
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::env;

#[derive(Serialize)]
struct WalletReport {
    address:       String,
    chain:         ChainType,
    balance:       Decimal,
    patterns:      Vec<&'static str>,
    pattern_count: u32,
    transactions:  usize,
}

impl From<&Wallet> for WalletReport {
    fn from(w: &Wallet) -> Self {
        Self {
            address:       w.address.clone(),
            chain:         w.chain,
            balance:       w.balance,
            patterns:      w.analysis.labels(),
            pattern_count: w.analysis.pattern_count,
            transactions:  w.transactions.len(),
        }
    }
}

#[derive(Serialize)]
struct GraphNode {
    address:    String,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth:      Option<Depth>,
    neighbours: BTreeSet<String>,
}

#[derive(Serialize)]
struct GraphEdge {
    tx_id:     String,
    sender:    String,
    receiver:  String,
    amount:    Decimal,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct GraphReport {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1).filter(|c| !c.starts_with("--")) else {
        bail!("usage: trace-runner <search|trace|trace-detailed|trace-range|detect|detect-looping|graph> --ledger FILE [--address ADDR] [options]");
    };

    let ledger = arg_value(&args, "--ledger").ok_or_else(|| anyhow!("--ledger is required"))?;
    let address = arg_value(&args, "--address");
    let chain: ChainType = arg_value(&args, "--chain").unwrap_or("bitcoin").parse()?;
    let depth = parse_arg(&args, "--depth", 0 as Depth);
    let max_depth = parse_arg(&args, "--max-depth", 2 as Depth);
    let limit = parse_arg(&args, "--limit", 25usize);
    let db = arg_value(&args, "--db");

    let config = match arg_value(&args, "--config") {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let engine = build_engine(ledger, db, config)?;
    log::info!(
        "{command} {} on {chain} (db: {})",
        address.unwrap_or("stored wallets"),
        db.unwrap_or("none")
    );

    // Without an address, `detect` and `graph` work over the stored ledger.
    let Some(address) = address else {
        let output = match command.as_str() {
            "detect" => report(&engine.detect_stored()?)?,
            "graph" => {
                let wallets = engine.stored_wallets()?;
                serde_json::to_string_pretty(&graph(wallets.iter().map(|w| (None::<Depth>, w))))?
            }
            other => bail!("{other} requires --address"),
        };
        println!("{output}");
        return Ok(());
    };

    let output = match command.as_str() {
        "search" => {
            let wallet = engine.search(address, chain, Some(limit))?;
            serde_json::to_string_pretty(&wallet)?
        }
        "trace" => {
            let visited = engine.trace(address, chain, depth, max_depth)?;
            serde_json::to_string_pretty(&visited)?
        }
        "trace-detailed" => {
            let depth_map = engine.trace_detailed(address, chain, depth, max_depth)?;
            serde_json::to_string_pretty(&depth_map)?
        }
        "trace-range" => {
            let start = parse_time(arg_value(&args, "--start").ok_or_else(|| anyhow!("--start is required"))?)?;
            let end = parse_time(arg_value(&args, "--end").ok_or_else(|| anyhow!("--end is required"))?)?;
            if end < start {
                bail!("--end {end} is before --start {start}");
            }
            let wallets = engine.trace_by_time_range(address, chain, start, end, max_depth, limit)?;
            serde_json::to_string_pretty(&wallets)?
        }
        "detect" => {
            let wallets = engine.detect_address(address, chain)?;
            report(&wallets)?
        }
        "detect-looping" => {
            let wallets = engine.detect_looping_only(address, chain)?;
            report(&wallets)?
        }
        "graph" => {
            let depth_map = engine.trace_detailed(address, chain, depth, max_depth)?;
            let nodes = depth_map
                .iter()
                .flat_map(|(depth, wallets)| wallets.iter().map(move |w| (Some(*depth), w)));
            serde_json::to_string_pretty(&graph(nodes))?
        }
        other => bail!("unknown command: {other}"),
    };

    println!("{output}");
    Ok(())
}

/// One source per chain from the snapshot, memoized through `db` when given.
fn build_engine(ledger: &str, db: Option<&str>, config: AnalysisConfig) -> Result<TraceEngine> {
    let snapshot = LedgerSnapshot::load(ledger)?;
    let store = match db {
        Some(path) => {
            let store = LedgerStore::open(path)?;
            store.migrate()?;
            Some(store)
        }
        None => None,
    };

    let mut registry = SourceRegistry::new();
    for chain in ChainType::ALL {
        let source = MemorySource::from_snapshot(&snapshot, chain)?;
        let source: Box<dyn ChainDataSource> = match &store {
            Some(store) => Box::new(StoredSource::new(source, store.reopen()?)),
            None => Box::new(source),
        };
        registry.register(source);
    }

    let engine = TraceEngine::new(registry, config);
    Ok(match store {
        Some(store) => engine.with_store(store),
        None => engine,
    })
}

fn report(wallets: &[Wallet]) -> Result<String> {
    let reports: Vec<WalletReport> = wallets.iter().map(WalletReport::from).collect();
    Ok(serde_json::to_string_pretty(&reports)?)
}

fn graph<'a>(nodes: impl IntoIterator<Item = (Option<Depth>, &'a Wallet)>) -> GraphReport {
    let mut report = GraphReport { nodes: Vec::new(), edges: Vec::new() };
    let mut seen_tx = BTreeSet::new();

    for (depth, wallet) in nodes {
        report.nodes.push(GraphNode {
            address:    wallet.address.clone(),
            depth,
            neighbours: wallet.neighbours(),
        });
        for tx in wallet.transactions.iter().filter(|tx| seen_tx.insert(tx.id.clone())) {
            report.edges.extend(tx.transfers.iter().map(|t| GraphEdge {
                tx_id:     tx.id.clone(),
                sender:    t.sender.clone(),
                receiver:  t.receiver.clone(),
                amount:    t.amount,
                timestamp: tx.timestamp,
            }));
        }
    }
    report
}

/// RFC 3339 or epoch seconds.
fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    let secs: i64 = value
        .parse()
        .map_err(|_| anyhow!("not an RFC 3339 time or epoch seconds: {value}"))?;
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp out of range: {secs}"))
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
