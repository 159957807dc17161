//! Symbol list parsing shared by the client binary and tests.
//!
//! Symbols are case-sensitive ticker identifiers. Lists may be separated by commas,
//! whitespace or new lines; duplicates are removed keeping the first occurrence.

use std::io::BufRead;

use crate::error::QuoteError;

/// Characters accepted inside a symbol besides ASCII letters and digits.
const EXTRA_SYMBOL_CHARS: &[char] = &['.', '-', '^', '=', ':', '/', '_'];

/// Trait providing file parsing for symbol lists.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Blank lines are skipped. Returns an error if any entry contains characters
    /// that cannot appear in a symbol.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<String>, QuoteError>;
}

/// Marker type for symbol list parsing.
pub struct Symbols;

impl SymbolParser for Symbols {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<String>, QuoteError> {
        let mut symbols = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(QuoteError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }
            for symbol in split_symbols(trimmed_line)? {
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
        }
        Ok(symbols)
    }
}

/// Splits a single comma/whitespace separated list into validated symbols.
pub fn split_symbols(raw: &str) -> Result<Vec<String>, QuoteError> {
    let mut symbols: Vec<String> = Vec::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        if !is_valid_symbol(part) {
            return Err(QuoteError::ParseSymbols(format!("invalid symbol: {:?}", part)));
        }
        if !symbols.iter().any(|s| s == part) {
            symbols.push(part.to_string());
        }
    }
    Ok(symbols)
}

/// Returns `true` for a non-empty symbol made of letters, digits and a few separators.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || EXTRA_SYMBOL_CHARS.contains(&c))
}
