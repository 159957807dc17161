//! Transport seams used by the transport manager.
//!
//! The manager never touches a raw socket or HTTP client. It asks a
//! `PushConnector` for a `PushStream` bound to one wanted-set snapshot, and a
//! `PullTransport` for batched fetches. The production implementations live in
//! `push` (WebSocket) and `pull` (HTTP); tests substitute in-memory fakes.
use quote_common::{QuotePatch, Result, SymbolInfo};

pub mod pull;
pub mod push;

pub use pull::HttpPullTransport;
pub use push::WsConnector;

/// One step of reading from a push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A text payload holding one record or an array of records.
    Text(String),
    /// Nothing arrived within the stream's poll interval (or a control frame did).
    Idle,
    /// The peer closed the connection cleanly.
    Closed,
}

/// A live push connection.
///
/// `next_frame` must return within a bounded time (yielding `Frame::Idle`) so the
/// reading thread can notice that its connection was superseded.
pub trait PushStream: Send {
    /// Waits for the next frame. An error means the connection is broken.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Closes the connection. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens push connections encoding the complete wanted set.
pub trait PushConnector: Send + Sync {
    /// Opens a connection streaming patches for `symbols`. Blocks until the
    /// handshake completes or fails.
    fn open(&self, symbols: &[String]) -> Result<Box<dyn PushStream>>;
}

/// Request/response access to the quote endpoints.
pub trait PullTransport: Send + Sync {
    /// Fetches current quotes for `symbols` in one batched request.
    fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<QuotePatch>>;

    /// Fetches the quote of a single symbol.
    fn fetch_quote(&self, symbol: &str) -> Result<QuotePatch>;

    /// Fetches the symbol catalog, optionally filtered by `query`.
    fn fetch_symbols(&self, query: Option<&str>) -> Result<Vec<SymbolInfo>>;
}
