//!
//! Common types and utilities shared by the quote distribution client.
//!
//! This crate aggregates:
//! - `error` — unified error type `QuoteError` used across the workspace.
//! - `result` — handy `Result<T, QuoteError>` alias.
//! - `quote` — the stored `Quote`, the inbound `QuotePatch` and its tolerant decoder.
//! - `symbols` — symbol list parsing for files and command lines.
//! - `net` — endpoint paths and URL builders for both transports.
#![warn(missing_docs)]
pub mod error;
pub mod net;
pub mod quote;
pub mod result;
pub mod symbols;

pub use error::QuoteError;
pub use quote::{Quote, QuotePatch, SymbolInfo};
pub use result::Result;
