//! Consumer-facing quote client.
//!
//! A `QuoteClient` is constructed explicitly at application start, handed to the
//! widgets that need quotes, and torn down with `shutdown` (or on drop). It owns
//! the quote store, the subscription registry and the transport manager thread.
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error, info, warn};
use quote_common::quote::now_millis;
use quote_common::{Quote, Result, SymbolInfo};

use crate::config::ClientConfig;
use crate::manager::{ManagerEvent, TransportManager, TransportStatus};
use crate::registry::SubscriptionRegistry;
use crate::store::{ListenerId, QuoteStore, Snapshot};
use crate::transport::{HttpPullTransport, PullTransport, PushConnector, WsConnector};

/// Handle to a running quote distribution client.
pub struct QuoteClient {
    store: Arc<QuoteStore>,
    registry: Arc<SubscriptionRegistry>,
    pull: Arc<dyn PullTransport>,
    events: Sender<ManagerEvent>,
    status: Arc<Mutex<TransportStatus>>,
    worker: Option<JoinHandle<()>>,
}

impl QuoteClient {
    /// Starts a client talking to `config.base_url` over WebSocket and HTTP.
    pub fn start(config: ClientConfig) -> Result<Self> {
        let push = Arc::new(WsConnector::new(&config));
        let pull = Arc::new(HttpPullTransport::new(&config)?);
        Self::with_transports(config, push, pull)
    }

    /// Starts a client on the given transports.
    pub fn with_transports(
        config: ClientConfig,
        push: Arc<dyn PushConnector>,
        pull: Arc<dyn PullTransport>,
    ) -> Result<Self> {
        let store = Arc::new(QuoteStore::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let (events_tx, events_rx) = unbounded();

        let manager = TransportManager::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&registry),
            push,
            Arc::clone(&pull),
            events_tx.clone(),
            events_rx,
        );
        let status = manager.status_handle();
        let worker = manager.spawn()?;
        info!("Quote client started for {}", config.base_url);

        Ok(Self {
            store,
            registry,
            pull,
            events: events_tx,
            status,
            worker: Some(worker),
        })
    }

    /// Declares interest in `symbols` and requests an immediate pull so the first
    /// values do not wait for the push handshake.
    ///
    /// Symbols already wanted are not re-subscribed; the pull happens anyway.
    pub fn subscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Err(e) = self.registry.add_interest(symbols) {
            error!("Failed to register interest: {}", e);
            return;
        }
        self.send(ManagerEvent::PullRequested);
    }

    /// Drops interest in `symbols`. The socket is reopened for the remaining set;
    /// quotes already in the store stay there.
    pub fn unsubscribe<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Err(e) = self.registry.remove_interest(symbols) {
            error!("Failed to remove interest: {}", e);
        }
    }

    /// Current full mapping of symbol to quote.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    /// Latest quote for `symbol`.
    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.store.get(symbol)
    }

    /// Calls `listener` with the full snapshot after every merge that changed it.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.store.on_change(listener)
    }

    /// Unregisters a change listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.store.remove_listener(id)
    }

    /// Symbols currently wanted, sorted.
    pub fn wanted(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    /// Transport state and the symbol list of the held connection.
    pub fn status(&self) -> TransportStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches one symbol over HTTP (detail-view mount) and merges the result.
    ///
    /// Returns the stored quote after the merge, so a response older than what
    /// the stream already delivered yields the fresher stored value. Blocks the
    /// caller for the duration of the request.
    pub fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let patch = self.pull.fetch_quote(symbol)?;
        let received_at = now_millis();
        let fetched = patch.clone().into_quote(received_at);
        self.store.merge([patch], received_at);
        Ok(self.store.get(&fetched.symbol).unwrap_or(fetched))
    }

    /// Fetches the symbol catalog. Not part of the merge pipeline.
    pub fn fetch_symbols(&self, query: Option<&str>) -> Result<Vec<SymbolInfo>> {
        self.pull.fetch_symbols(query)
    }

    /// Stops the transport manager and closes the push connection.
    pub fn shutdown(&mut self) {
        self.send(ManagerEvent::Shutdown);
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.join().is_err() {
            error!("Transport manager thread panicked");
        }
        info!("Quote client stopped");
    }

    fn send(&self, event: ManagerEvent) {
        if self.worker.is_none() {
            debug!("Quote client is shut down; event dropped");
            return;
        }
        if let Err(e) = self.events.send(event) {
            warn!("Transport manager is gone: {}", e);
        }
    }
}

impl Drop for QuoteClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
