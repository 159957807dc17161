//! Transport manager: connection lifecycle, polling fallback and merging.
//!
//! The manager is a single thread draining a crossbeam `select!` over four
//! sources:
//!
//! - manager events posted by connection threads, pull workers and the client;
//! - the registry's wanted-set change signal;
//! - the liveness probe ticker;
//! - an optional reconnect timer.
//!
//! Every state transition and every merge into the `QuoteStore` happens on this
//! thread, one event at a time. Blocking I/O (socket handshake and reads, HTTP
//! fetches) runs on short-lived worker threads that only post events back.
//!
//! At most one push connection is held. Each one gets a fresh `ConnectionId`, and
//! every event a connection thread posts carries that id; events from a
//! connection that is no longer held are ignored, which makes superseded
//! connections inert even if their callbacks still fire.
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, after, never, select, tick};
use log::{debug, error, info, warn};
use quote_common::quote::{decode_patches, now_millis};
use quote_common::{QuoteError, QuotePatch, Result};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::registry::SubscriptionRegistry;
use crate::store::QuoteStore;
use crate::transport::{Frame, PullTransport, PushConnector, PushStream};

/// Lifecycle of the push side of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Nothing wanted, no connection.
    Idle,
    /// A push connection is being opened.
    Connecting,
    /// A push connection is open and healthy; polling is paused.
    Streaming,
    /// No healthy push connection; the liveness probe carries the load.
    Degraded,
}

/// Diagnostic view of the transport manager.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportStatus {
    /// Current state.
    pub state: TransportState,
    /// Symbol list of the held connection, if any.
    pub connection: Option<Vec<String>>,
}

impl TransportStatus {
    fn idle() -> Self {
        Self {
            state: TransportState::Idle,
            connection: None,
        }
    }
}

/// Identifies one push connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionId(u64);

/// Whether a pull was asked for by a consumer or by the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PullOrigin {
    FirstPaint,
    Probe,
}

/// Work items for the manager thread.
pub(crate) enum ManagerEvent {
    /// Fetch the full wanted set once, regardless of push status.
    PullRequested,
    PushOpened {
        conn: ConnectionId,
    },
    PushFailed {
        conn: ConnectionId,
        reason: String,
    },
    PushMessage {
        conn: ConnectionId,
        text: String,
        received_at: i64,
    },
    PushClosed {
        conn: ConnectionId,
        reason: Option<String>,
    },
    PullFinished {
        origin: PullOrigin,
        result: Result<Vec<QuotePatch>>,
        received_at: i64,
    },
    Shutdown,
}

struct HeldConnection {
    id: ConnectionId,
    symbols: Vec<String>,
    cancel: Arc<AtomicBool>,
}

/// Owns the push connection and the polling fallback.
pub(crate) struct TransportManager {
    store: Arc<QuoteStore>,
    registry: Arc<SubscriptionRegistry>,
    push: Arc<dyn PushConnector>,
    pull: Arc<dyn PullTransport>,
    events_tx: Sender<ManagerEvent>,
    events_rx: Receiver<ManagerEvent>,
    status: Arc<Mutex<TransportStatus>>,
    probe_interval: Duration,
    reconnect: ReconnectPolicy,
    state: TransportState,
    held: Option<HeldConnection>,
    next_conn: u64,
    backoff: Duration,
    retry: Option<Receiver<Instant>>,
    probe_pull_in_flight: bool,
}

impl TransportManager {
    pub(crate) fn new(
        config: &ClientConfig,
        store: Arc<QuoteStore>,
        registry: Arc<SubscriptionRegistry>,
        push: Arc<dyn PushConnector>,
        pull: Arc<dyn PullTransport>,
        events_tx: Sender<ManagerEvent>,
        events_rx: Receiver<ManagerEvent>,
    ) -> Self {
        Self {
            store,
            registry,
            push,
            pull,
            events_tx,
            events_rx,
            status: Arc::new(Mutex::new(TransportStatus::idle())),
            probe_interval: config.probe_interval,
            reconnect: config.reconnect.clone(),
            state: TransportState::Idle,
            held: None,
            next_conn: 0,
            backoff: config.reconnect.initial_delay,
            retry: None,
            probe_pull_in_flight: false,
        }
    }

    /// Shared handle the client reads `TransportStatus` from.
    pub(crate) fn status_handle(&self) -> Arc<Mutex<TransportStatus>> {
        Arc::clone(&self.status)
    }

    /// Starts the event loop on its own thread.
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("quote-transport".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn run(mut self) {
        info!(
            "Transport manager running, probe every {:?}",
            self.probe_interval
        );
        let probe = tick(self.probe_interval);
        let wanted_changes = self.registry.changes();
        let events = self.events_rx.clone();

        loop {
            let retry = self.retry.clone().unwrap_or_else(never);
            select! {
                recv(events) -> msg => match msg {
                    Ok(ManagerEvent::Shutdown) | Err(_) => break,
                    Ok(event) => self.handle_event(event),
                },
                recv(wanted_changes) -> msg => match msg {
                    Ok(()) => self.on_wanted_changed(),
                    Err(_) => break,
                },
                recv(probe) -> _ => self.on_probe_tick(),
                recv(retry) -> _ => {
                    self.retry = None;
                    self.on_retry_due();
                },
            }
        }

        self.drop_connection();
        self.set_state(TransportState::Idle);
        info!("Transport manager stopped");
    }

    fn handle_event(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::PullRequested => self.start_pull(PullOrigin::FirstPaint),
            ManagerEvent::PushOpened { conn } => {
                if !self.is_held(conn) {
                    debug!("Ignoring open of superseded connection {:?}", conn);
                    return;
                }
                self.backoff = self.reconnect.initial_delay;
                self.set_state(TransportState::Streaming);
            }
            ManagerEvent::PushFailed { conn, reason } => {
                if !self.is_held(conn) {
                    debug!("Ignoring failure of superseded connection {:?}: {}", conn, reason);
                    return;
                }
                warn!("Quote stream could not be opened: {}", reason);
                self.on_connection_lost();
            }
            ManagerEvent::PushClosed { conn, reason } => {
                if !self.is_held(conn) {
                    debug!("Ignoring close of superseded connection {:?}", conn);
                    return;
                }
                match reason {
                    Some(reason) => warn!("Quote stream broke: {}", reason),
                    None => info!("Quote stream closed by server"),
                }
                self.on_connection_lost();
            }
            ManagerEvent::PushMessage {
                conn,
                text,
                received_at,
            } => {
                if !self.is_held(conn) {
                    debug!("Ignoring message from superseded connection {:?}", conn);
                    return;
                }
                self.merge_push_message(&text, received_at);
            }
            ManagerEvent::PullFinished {
                origin,
                result,
                received_at,
            } => {
                if origin == PullOrigin::Probe {
                    self.probe_pull_in_flight = false;
                }
                match result {
                    Ok(patches) => {
                        let applied = self.store.merge(patches, received_at);
                        debug!("Pull ({:?}) merged {} quote(s)", origin, applied);
                    }
                    Err(e) => debug!("Pull ({:?}) failed, next probe retries: {}", origin, e),
                }
            }
            ManagerEvent::Shutdown => {}
        }
    }

    fn merge_push_message(&self, text: &str, received_at: i64) {
        match decode_patches(text) {
            Ok(batch) => {
                if batch.dropped > 0 {
                    debug!("Dropped {} malformed record(s) from push message", batch.dropped);
                }
                if !batch.patches.is_empty() {
                    self.store.merge(batch.patches, received_at);
                }
            }
            Err(e) => warn!("Dropped unparseable push message: {}", e),
        }
    }

    fn on_wanted_changed(&mut self) {
        let wanted = self.registry.snapshot();
        self.retry = None;
        self.backoff = self.reconnect.initial_delay;

        if wanted.is_empty() {
            self.drop_connection();
            self.set_state(TransportState::Idle);
            return;
        }
        if let Some(held) = &self.held {
            if held.symbols == wanted {
                debug!("Held connection already covers {:?}", wanted);
                return;
            }
        }
        self.open_connection(wanted);
    }

    fn on_probe_tick(&mut self) {
        if self.state == TransportState::Streaming || self.probe_pull_in_flight {
            return;
        }
        self.start_pull(PullOrigin::Probe);
    }

    fn on_retry_due(&mut self) {
        if self.held.is_some() {
            return;
        }
        let wanted = self.registry.snapshot();
        if wanted.is_empty() {
            return;
        }
        info!("Retrying quote stream for {} symbol(s)", wanted.len());
        self.open_connection(wanted);
    }

    fn on_connection_lost(&mut self) {
        self.drop_connection();
        self.set_state(TransportState::Degraded);
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        if !self.reconnect.enabled || self.registry.is_empty() {
            return;
        }
        info!("Reconnecting quote stream in {:?}", self.backoff);
        self.retry = Some(after(self.backoff));
        self.backoff = self.reconnect.next_delay(self.backoff);
    }

    fn open_connection(&mut self, symbols: Vec<String>) {
        self.drop_connection();

        self.next_conn += 1;
        let id = ConnectionId(self.next_conn);
        let cancel = Arc::new(AtomicBool::new(false));

        let connector = Arc::clone(&self.push);
        let events = self.events_tx.clone();
        let thread_cancel = Arc::clone(&cancel);
        let thread_symbols = symbols.clone();
        let spawned = thread::Builder::new()
            .name(format!("quote-stream-{}", id.0))
            .spawn(move || {
                run_push_connection(connector, thread_symbols, id, thread_cancel, events)
            });

        match spawned {
            Ok(_) => {
                debug!("Opening connection {:?} for {:?}", id, symbols);
                self.held = Some(HeldConnection {
                    id,
                    symbols,
                    cancel,
                });
                self.set_state(TransportState::Connecting);
            }
            Err(e) => {
                error!("Failed to spawn quote stream thread: {}", e);
                self.set_state(TransportState::Degraded);
                self.schedule_retry();
            }
        }
    }

    fn drop_connection(&mut self) {
        if let Some(held) = self.held.take() {
            debug!("Releasing connection {:?}", held.id);
            held.cancel.store(true, Ordering::Release);
        }
    }

    fn start_pull(&mut self, origin: PullOrigin) {
        let symbols = self.registry.snapshot();
        if symbols.is_empty() {
            return;
        }

        let pull = Arc::clone(&self.pull);
        let events = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name("quote-pull".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| pull.fetch_quotes(&symbols)))
                    .unwrap_or_else(|_| Err(QuoteError::Http("pull transport panicked".to_string())));
                let event = ManagerEvent::PullFinished {
                    origin,
                    result,
                    received_at: now_millis(),
                };
                if events.send(event).is_err() {
                    debug!("Pull finished after transport manager stopped");
                }
            });

        match spawned {
            Ok(_) => {
                if origin == PullOrigin::Probe {
                    self.probe_pull_in_flight = true;
                }
            }
            Err(e) => error!("Failed to spawn pull worker: {}", e),
        }
    }

    fn is_held(&self, conn: ConnectionId) -> bool {
        self.held.as_ref().is_some_and(|held| held.id == conn)
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            info!("Transport state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.state = state;
        status.connection = self.held.as_ref().map(|held| held.symbols.clone());
    }
}

/// Body of a connection thread: open, then forward frames until the stream
/// ends or the connection is cancelled.
fn run_push_connection(
    connector: Arc<dyn PushConnector>,
    symbols: Vec<String>,
    conn: ConnectionId,
    cancel: Arc<AtomicBool>,
    events: Sender<ManagerEvent>,
) {
    let mut stream = match connector.open(&symbols) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(ManagerEvent::PushFailed {
                conn,
                reason: e.to_string(),
            });
            return;
        }
    };

    if cancel.load(Ordering::Acquire) || events.send(ManagerEvent::PushOpened { conn }).is_err() {
        stream.close();
        return;
    }

    let outcome = forward_frames(stream.as_mut(), conn, &cancel, &events);
    stream.close();
    if let Some(reason) = outcome {
        let _ = events.send(ManagerEvent::PushClosed { conn, reason });
    }
    debug!("Connection {:?} thread exiting", conn);
}

/// Returns `Some(reason)` when the stream ended on its own, `None` when it was
/// cancelled or nobody listens anymore.
fn forward_frames(
    stream: &mut dyn PushStream,
    conn: ConnectionId,
    cancel: &AtomicBool,
    events: &Sender<ManagerEvent>,
) -> Option<Option<String>> {
    loop {
        if cancel.load(Ordering::Acquire) {
            return None;
        }
        match stream.next_frame() {
            Ok(Frame::Text(text)) => {
                let event = ManagerEvent::PushMessage {
                    conn,
                    text,
                    received_at: now_millis(),
                };
                if events.send(event).is_err() {
                    return None;
                }
            }
            Ok(Frame::Idle) => {}
            Ok(Frame::Closed) => return Some(None),
            Err(e) => return Some(Some(e.to_string())),
        }
    }
}
