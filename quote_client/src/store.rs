//! Shared map of the latest known quote per symbol.
//!
//! The store is copy-on-write: readers get an `Arc` of the current snapshot and
//! never see a half-applied batch, because a merge builds the next map aside and
//! swaps it in with one pointer store. Merges are serialized by the write lock;
//! in a running client the transport manager thread does almost all of them.
//!
//! Every write goes through the monotonic-write guard: a patch is applied only if
//! the symbol is new or its `observed_at` is not older than the stored one, so a
//! slow pull response cannot regress a fresher pushed price.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::debug;
use quote_common::{Quote, QuotePatch};

/// Immutable view of the store at one instant.
pub type Snapshot = HashMap<String, Quote>;

type Listener = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

/// Handle returned by `QuoteStore::on_change`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Symbol → latest `Quote`, additive for the lifetime of the store.
pub struct QuoteStore {
    current: RwLock<Arc<Snapshot>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl QuoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new())),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Returns the current full mapping. Never touches the network.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Latest quote for `symbol`, if one was ever merged.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.snapshot().get(symbol).cloned()
    }

    /// Registers `listener` to be called with the new snapshot after every merge
    /// that changed something. Listeners run on the merging thread and must not
    /// block.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Applies `patches` as one batch and returns how many quotes changed.
    ///
    /// Patches without a server timestamp are stamped with `received_at`. Listeners
    /// are notified once per batch, and only if at least one quote changed.
    pub fn merge<I>(&self, patches: I, received_at: i64) -> usize
    where
        I: IntoIterator<Item = QuotePatch>,
    {
        let (applied, changed) = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let mut next: Option<Snapshot> = None;
            let mut applied = 0;

            for patch in patches {
                let quote = patch.into_quote(received_at);
                let map = next.as_ref().unwrap_or(&**current);
                match map.get(&quote.symbol) {
                    Some(stored) if stored.observed_at > quote.observed_at => {
                        debug!(
                            "Stale quote for {} ignored: {} < {}",
                            quote.symbol, quote.observed_at, stored.observed_at
                        );
                        continue;
                    }
                    Some(stored) if *stored == quote => continue,
                    _ => {}
                }
                next.get_or_insert_with(|| (**current).clone())
                    .insert(quote.symbol.clone(), quote);
                applied += 1;
            }

            match next {
                Some(map) => {
                    let snapshot = Arc::new(map);
                    *current = Arc::clone(&snapshot);
                    (applied, Some(snapshot))
                }
                None => (0, None),
            }
        };

        if let Some(snapshot) = changed {
            self.notify(&snapshot);
        }
        applied
    }

    fn notify(&self, snapshot: &Arc<Snapshot>) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl Default for QuoteStore {
    fn default() -> Self {
        Self::new()
    }
}
