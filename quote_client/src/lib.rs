//! Quote distribution client.
//!
//! Keeps a shared, in-memory map of the latest known price per symbol fresh for
//! any number of consumers. A WebSocket push connection is the primary channel;
//! periodic HTTP pulls take over whenever no healthy socket is open.
//!
//! Building blocks, leaves first:
//! - `store` — `QuoteStore`, the copy-on-write snapshot map with change listeners.
//! - `registry` — `SubscriptionRegistry`, the wanted set of symbols.
//! - `manager` — the transport manager thread: connection lifecycle, probe,
//!   fallback polling and merging.
//! - `transport` — push/pull traits and their WebSocket/HTTP implementations.
//! - `client` — `QuoteClient`, the handle consumers hold.
#![warn(missing_docs)]
pub mod client;
pub mod config;
pub mod manager;
pub mod registry;
pub mod store;
pub mod transport;

pub use client::QuoteClient;
pub use config::{ClientConfig, ReconnectPolicy};
pub use manager::{TransportState, TransportStatus};
pub use quote_common::{Quote, QuoteError, QuotePatch, SymbolInfo};
pub use store::{ListenerId, QuoteStore, Snapshot};
