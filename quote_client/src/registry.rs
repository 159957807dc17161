//! The set of symbols the client is asked to keep fresh.
//!
//! The registry owns the wanted set. Whenever a call actually changes it, a signal
//! is posted on a single-slot channel that the transport manager selects on; the
//! manager then reads the full current set. Several changes made before the
//! manager wakes up collapse into one signal, so a burst of subscriptions costs
//! one reconnect.
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, info};
use quote_common::Result;

/// Tracks the wanted set and signals changes to the transport manager.
pub struct SubscriptionRegistry {
    wanted: Mutex<BTreeSet<String>>,
    changed_tx: Sender<()>,
    changed_rx: Receiver<()>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (changed_tx, changed_rx) = bounded(1);
        Self {
            wanted: Mutex::new(BTreeSet::new()),
            changed_tx,
            changed_rx,
        }
    }

    /// Adds every symbol to the wanted set, exactly as given. Empty strings are
    /// skipped.
    ///
    /// Returns `true` and signals a change if at least one symbol was new. Never
    /// blocks beyond taking the registry lock.
    pub fn add_interest<I, S>(&self, symbols: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added: Vec<String> = {
            let mut wanted = self.wanted.lock()?;
            symbols
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .filter(|s| !s.is_empty())
                .filter(|s| wanted.insert(s.clone()))
                .collect()
        };
        if added.is_empty() {
            return Ok(false);
        }
        info!("Wanted set grew by {:?}", added);
        self.signal();
        Ok(true)
    }

    /// Removes every symbol from the wanted set.
    ///
    /// Returns `true` and signals a change if at least one symbol was present.
    pub fn remove_interest<I, S>(&self, symbols: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed: Vec<String> = {
            let mut wanted = self.wanted.lock()?;
            symbols
                .into_iter()
                .filter(|s| wanted.remove(s.as_ref()))
                .map(|s| s.as_ref().to_string())
                .collect()
        };
        if removed.is_empty() {
            return Ok(false);
        }
        info!("Wanted set shrank by {:?}", removed);
        self.signal();
        Ok(true)
    }

    /// Sorted copy of the current wanted set.
    pub fn snapshot(&self) -> Vec<String> {
        self.wanted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Returns `true` if `symbol` is wanted.
    pub fn contains(&self, symbol: &str) -> bool {
        self.wanted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(symbol)
    }

    /// Number of wanted symbols.
    pub fn len(&self) -> usize {
        self.wanted.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when nothing is wanted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receiver that yields one message per batch of changes.
    pub fn changes(&self) -> Receiver<()> {
        self.changed_rx.clone()
    }

    fn signal(&self) {
        match self.changed_tx.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => debug!("Wanted-set change already pending"),
            Err(TrySendError::Disconnected(())) => debug!("No one listens for wanted-set changes"),
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
