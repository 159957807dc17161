//! Quote payloads exchanged with the market-data backend.
//!
//! Both transports speak the same per-symbol record: `{symbol, price?, ts?}` where
//! `ts` is epoch milliseconds. The push socket may send a single object or an array
//! of them; the pull endpoint always answers with an array. Records are decoded one
//! by one so that a malformed entry never takes its neighbours down with it.
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::QuoteError;

/// Latest known quote for one symbol.
///
/// `price == None` means the backend knows the symbol but has not observed a trade
/// yet, which is different from the symbol being absent from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Symbol identifier (case-sensitive, e.g. `AAPL`).
    pub symbol: String,
    /// Last traded price, if any.
    pub price: Option<f64>,
    /// Epoch milliseconds at which this price was observed.
    pub observed_at: i64,
}

/// One inbound record asserting the latest price for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePatch {
    /// Symbol identifier.
    pub symbol: String,
    /// Price carried by the record; `null` and absent both decode to `None`.
    pub price: Option<f64>,
    /// Server timestamp in epoch milliseconds, when the server supplied one.
    pub ts: Option<i64>,
}

impl QuotePatch {
    /// Creates a patch with an explicit server timestamp.
    pub fn new(symbol: impl Into<String>, price: Option<f64>, ts: Option<i64>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            ts,
        }
    }

    /// Turns the patch into a stored quote, stamping `received_at` when the
    /// server did not send a timestamp.
    pub fn into_quote(self, received_at: i64) -> Quote {
        Quote {
            symbol: self.symbol,
            price: self.price,
            observed_at: self.ts.unwrap_or(received_at),
        }
    }
}

/// Wire shape before validation. `ts` is accepted as any JSON number.
#[derive(Deserialize)]
struct RawPatch {
    symbol: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    ts: Option<f64>,
}

/// Result of decoding one inbound message.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedBatch {
    /// Well-formed records, in message order.
    pub patches: Vec<QuotePatch>,
    /// Number of records that were dropped as malformed.
    pub dropped: usize,
}

/// Decodes an inbound message holding either one record or an array of records.
///
/// Returns an error only when the payload as a whole is not usable JSON; records
/// without a non-empty `symbol` or with a non-numeric `price`/`ts` are counted in
/// `dropped` and skipped.
pub fn decode_patches(text: &str) -> Result<DecodedBatch, QuoteError> {
    let value: Value = serde_json::from_str(text)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(QuoteError::Format(format!(
                "expected a quote object or array, got {}",
                json_kind(&other)
            )));
        }
    };

    let mut batch = DecodedBatch::default();
    for item in items {
        match decode_record(item) {
            Some(patch) => batch.patches.push(patch),
            None => batch.dropped += 1,
        }
    }
    Ok(batch)
}

fn decode_record(item: Value) -> Option<QuotePatch> {
    let raw: RawPatch = serde_json::from_value(item).ok()?;
    let symbol = raw.symbol.filter(|s| !s.is_empty())?;
    Some(QuotePatch {
        symbol,
        price: raw.price,
        ts: raw.ts.filter(|t| t.is_finite()).map(|t| t as i64),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Entry of the `/api/market/symbols` catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolInfo {
    /// Ticker symbol.
    pub symbol: String,
    /// Company or instrument name.
    pub name: String,
    /// Listing exchange, when known.
    #[serde(default)]
    pub exchange: Option<String>,
}

/// Current wall-clock time in epoch milliseconds, used to stamp receipt time.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
