//! HTTP pull transport.
//!
//! Batched `/api/market/quotes` fetches feed both the first paint and the
//! degraded-mode polling; `/api/market/quote` and `/api/market/symbols` serve
//! one-off consumer requests.
use log::debug;
use quote_common::net::{quote_url, quotes_url, symbols_url};
use quote_common::quote::decode_patches;
use quote_common::{QuoteError, QuotePatch, Result, SymbolInfo};
use reqwest::blocking::{Client, Response};
use url::Url;

use crate::config::ClientConfig;
use crate::transport::PullTransport;

/// Blocking HTTP client for the quote endpoints.
pub struct HttpPullTransport {
    client: Client,
    base_url: Url,
}

impl HttpPullTransport {
    /// Builds the HTTP client with the configured request timeout.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| QuoteError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn get(&self, url: Url) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| QuoteError::Http(format!("GET {} failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn get_patches(&self, url: Url) -> Result<Vec<QuotePatch>> {
        let body = self
            .get(url)?
            .text()
            .map_err(|e| QuoteError::Http(format!("reading quote response failed: {}", e)))?;
        let batch = decode_patches(&body)?;
        if batch.dropped > 0 {
            debug!("Dropped {} malformed quote record(s) from pull response", batch.dropped);
        }
        Ok(batch.patches)
    }
}

impl PullTransport for HttpPullTransport {
    fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<QuotePatch>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        self.get_patches(quotes_url(&self.base_url, symbols))
    }

    fn fetch_quote(&self, symbol: &str) -> Result<QuotePatch> {
        self.get_patches(quote_url(&self.base_url, symbol))?
            .into_iter()
            .next()
            .ok_or_else(|| QuoteError::Format(format!("quote response for {} has no symbol", symbol)))
    }

    fn fetch_symbols(&self, query: Option<&str>) -> Result<Vec<SymbolInfo>> {
        self.get(symbols_url(&self.base_url, query))?
            .json::<Vec<SymbolInfo>>()
            .map_err(|e| QuoteError::Http(format!("symbol catalog parse failed: {}", e)))
    }
}
