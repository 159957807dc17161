//! Endpoint paths and URL helpers for the market-data backend.
//!
//! Every URL is derived from one configured base URL. Paths are appended to the
//! base path, so a base such as `https://host/trading/` keeps its prefix.
use url::Url;

use crate::error::QuoteError;

/// Streaming socket that pushes quote patches for the `symbols` query parameter.
pub const WS_QUOTES_PATH: &str = "/ws/quotes";
/// Batched pull of quotes for a comma-separated `symbols` list.
pub const QUOTES_PATH: &str = "/api/market/quotes";
/// Single-symbol pull used when a detail view mounts.
pub const QUOTE_PATH: &str = "/api/market/quote";
/// Symbol catalog.
pub const SYMBOLS_PATH: &str = "/api/market/symbols";

/// Default backend when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Joins `symbols` into the comma-separated form both transports expect.
pub fn join_symbols(symbols: &[String]) -> String {
    symbols.join(",")
}

/// Returns `base` with `path` appended to its own path and the query cleared.
pub fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", prefix, path));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// URL of the streaming socket for the full wanted set.
///
/// The scheme is switched from `http`/`https` to `ws`/`wss`; a base already using
/// a socket scheme is kept as is.
pub fn push_url(base: &Url, symbols: &[String]) -> Result<Url, QuoteError> {
    let mut url = endpoint(base, WS_QUOTES_PATH);
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(QuoteError::Config(format!(
                "unsupported base URL scheme: {}",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| QuoteError::Config(format!("cannot switch {} to {}", base, scheme)))?;
    url.query_pairs_mut()
        .append_pair("symbols", &join_symbols(symbols));
    Ok(url)
}

/// URL of the batched pull request.
pub fn quotes_url(base: &Url, symbols: &[String]) -> Url {
    let mut url = endpoint(base, QUOTES_PATH);
    url.query_pairs_mut()
        .append_pair("symbols", &join_symbols(symbols));
    url
}

/// URL of the single-symbol pull request.
pub fn quote_url(base: &Url, symbol: &str) -> Url {
    let mut url = endpoint(base, QUOTE_PATH);
    url.query_pairs_mut().append_pair("symbol", symbol);
    url
}

/// URL of the symbol catalog, optionally filtered by a search `query`.
pub fn symbols_url(base: &Url, query: Option<&str>) -> Url {
    let mut url = endpoint(base, SYMBOLS_PATH);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.query_pairs_mut().append_pair("query", query);
    }
    url
}
