//! Quote Client — subscribes to a list of symbols and logs every quote change.
//!
//! It reads symbols from a text file and/or the command line, starts a
//! `QuoteClient` against the configured backend, and keeps running until Ctrl+C.
//! The push socket is used while it is healthy; otherwise quotes arrive through
//! the HTTP polling fallback.
//!
//! Usage example (CLI):
//! ```bash
//! quote_client --api-url http://localhost:8080 --path ./symbols.txt --symbols TSLA,NVDA
//! ```
//!
//! The symbol file should contain symbols separated by commas, spaces, or new lines.
#![warn(missing_docs)]
mod args;

use crate::args::Args;
use clap::Parser;
use log::{error, info, warn};
use quote_client::{ClientConfig, Quote, QuoteClient, TransportStatus};
use quote_common::QuoteError;
use quote_common::Result;
use quote_common::symbols::{SymbolParser, Symbols, split_symbols};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

/// How often the main thread checks for Ctrl+C and transport state changes.
const STATUS_INTERVAL_MS: u64 = 500;

fn main() -> Result<(), QuoteError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down client...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| QuoteError::Config(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let mut config = match &args.api_url {
        Some(url) => ClientConfig::new(url)?,
        None => ClientConfig::from_env()?,
    };
    config.probe_interval = Duration::from_secs(args.probe_secs.max(1));

    let mut client = QuoteClient::start(config)?;

    if let Some(query) = &args.catalog {
        for info in client.fetch_symbols(Some(query.as_str()))? {
            info!(
                "{:<8} {} ({})",
                info.symbol,
                info.name,
                info.exchange.as_deref().unwrap_or("-")
            );
        }
        client.shutdown();
        return Ok(());
    }

    let symbols = collect_symbols(&args)?;
    if symbols.is_empty() {
        warn!("No symbols given; use --path or --symbols");
        client.shutdown();
        return Ok(());
    }
    info!("Symbols: {:?}", symbols);

    let printed: Mutex<HashMap<String, Quote>> = Mutex::new(HashMap::new());
    client.on_change(move |snapshot| {
        let mut printed = match printed.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Quote printer lock poisoned: {}", e);
                return;
            }
        };
        for quote in snapshot.values() {
            if printed.get(&quote.symbol) != Some(quote) {
                log_quote(quote);
                printed.insert(quote.symbol.clone(), quote.clone());
            }
        }
    });
    client.subscribe(&symbols);

    info!("Client is running. Press Ctrl+C to exit.");
    let mut last_status: Option<TransportStatus> = None;
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(STATUS_INTERVAL_MS));
        let status = client.status();
        if last_status.as_ref() != Some(&status) {
            info!("Transport: {:?}", status.state);
            last_status = Some(status);
        }
    }

    client.shutdown();
    Ok(())
}

fn log_quote(quote: &Quote) {
    let time = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(quote.observed_at)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| quote.observed_at.to_string());
    match quote.price {
        Some(price) => info!("QUOTE: {} Price={:.2} Time={}", quote.symbol, price, time),
        None => info!("QUOTE: {} no trade yet Time={}", quote.symbol, time),
    }
}

/// Gathers symbols from `--path` and `--symbols`, keeping first occurrences.
fn collect_symbols(args: &Args) -> Result<Vec<String>> {
    let mut symbols = Vec::new();

    if let Some(raw_path) = &args.path {
        let file_path = normalize_path(raw_path);
        if !is_file_exist(&file_path) {
            return Err(QuoteError::ParseSymbols(format!(
                "symbol file not found: {}",
                file_path.display()
            )));
        }
        let file = File::open(&file_path)?;
        symbols.extend(Symbols::parse_from_file(BufReader::new(file))?);
    }
    if let Some(list) = &args.symbols {
        for symbol in split_symbols(list)? {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }
    Ok(symbols)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}
