//! Command-line arguments for the quote client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Backend base URL (http or https). Defaults to `QUOTE_API_URL`, then
    /// `API_URL`, then `http://localhost:8080`.
    #[clap(long)]
    pub api_url: Option<String>,

    /// Path to a text file with symbols to subscribe to.
    /// Symbols may be separated by commas, spaces, or new lines.
    #[clap(long)]
    pub path: Option<String>,

    /// Comma-separated symbols to subscribe to, in addition to `--path`.
    #[clap(long)]
    pub symbols: Option<String>,

    /// Liveness probe interval in seconds.
    #[clap(long, default_value_t = 3)]
    pub probe_secs: u64,

    /// Print the symbol catalog (optionally filtered by this query) and exit.
    #[clap(long)]
    pub catalog: Option<String>,
}
