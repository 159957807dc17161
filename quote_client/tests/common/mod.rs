//! Shared helpers for the quote client integration tests.
//!
//! `FakePush` and `FakePull` stand in for the transports so the tests can count
//! connections and script failures; `MockHttpServer` and `MockWsServer` speak the
//! real protocols on a loopback port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use quote_client::transport::{Frame, PullTransport, PushConnector, PushStream};
use quote_client::{ClientConfig, QuoteClient, ReconnectPolicy, TransportState};
use quote_common::{QuoteError, QuotePatch, Result, SymbolInfo};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::protocol::Message;

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Config with a short probe and no automatic reconnects.
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::new("http://127.0.0.1:9")
        .unwrap()
        .with_probe_interval(Duration::from_millis(100))
        .with_reconnect(ReconnectPolicy::disabled());
    config.ws_poll_interval = Duration::from_millis(50);
    config
}

pub fn state_is(client: &QuoteClient, state: TransportState) -> bool {
    client.status().state == state
}

pub fn syms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Default)]
struct FakePushState {
    refuse: bool,
    opened: Vec<Vec<String>>,
    live: usize,
    feeds: Vec<Sender<Frame>>,
}

/// In-memory push connector recording every connection it opens.
#[derive(Default)]
pub struct FakePush {
    state: Arc<Mutex<FakePushState>>,
}

impl FakePush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connector whose every open attempt fails.
    pub fn refusing() -> Arc<Self> {
        let push = Self::default();
        push.state.lock().unwrap().refuse = true;
        Arc::new(push)
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    /// Connections currently open (opened and not yet closed).
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    /// Symbol lists of every successful open, in order.
    pub fn opened(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().opened.clone()
    }

    /// Delivers `text` on the most recently opened connection.
    pub fn send_latest(&self, text: &str) -> bool {
        let state = self.state.lock().unwrap();
        match state.feeds.last() {
            Some(feed) => feed.send(Frame::Text(text.to_string())).is_ok(),
            None => false,
        }
    }

    /// Makes the most recently opened connection report a server close.
    pub fn close_latest(&self) {
        let state = self.state.lock().unwrap();
        if let Some(feed) = state.feeds.last() {
            let _ = feed.send(Frame::Closed);
        }
    }
}

impl PushConnector for FakePush {
    fn open(&self, symbols: &[String]) -> Result<Box<dyn PushStream>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return Err(QuoteError::WebSocket("connection refused".to_string()));
        }
        let (tx, rx) = unbounded();
        state.opened.push(symbols.to_vec());
        state.live += 1;
        state.feeds.push(tx);
        Ok(Box::new(FakeStream {
            rx,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct FakeStream {
    rx: Receiver<Frame>,
    state: Arc<Mutex<FakePushState>>,
    closed: bool,
}

impl PushStream for FakeStream {
    fn next_frame(&mut self) -> Result<Frame> {
        match self.rx.recv_timeout(Duration::from_millis(20)) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Ok(Frame::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(Frame::Closed),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().unwrap().live -= 1;
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// In-memory pull transport serving a mutable quote table.
#[derive(Default)]
pub struct FakePull {
    quotes: Mutex<HashMap<String, QuotePatch>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakePull {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_quote(symbol: &str, price: Option<f64>, ts: Option<i64>) -> Arc<Self> {
        let pull = Self::new();
        pull.set_quote(symbol, price, ts);
        pull
    }

    pub fn set_quote(&self, symbol: &str, price: Option<f64>, ts: Option<i64>) {
        self.quotes
            .lock()
            .unwrap()
            .insert(symbol.to_string(), QuotePatch::new(symbol, price, ts));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of batched fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PullTransport for FakePull {
    fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<QuotePatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(QuoteError::HttpStatus {
                status: 503,
                url: "fake".to_string(),
            });
        }
        let quotes = self.quotes.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|symbol| quotes.get(symbol).cloned())
            .collect())
    }

    fn fetch_quote(&self, symbol: &str) -> Result<QuotePatch> {
        self.quotes
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| QuoteError::HttpStatus {
                status: 404,
                url: "fake".to_string(),
            })
    }

    fn fetch_symbols(&self, _query: Option<&str>) -> Result<Vec<SymbolInfo>> {
        Ok(self
            .quotes
            .lock()
            .unwrap()
            .keys()
            .map(|symbol| SymbolInfo {
                symbol: symbol.clone(),
                name: symbol.clone(),
                exchange: None,
            })
            .collect())
    }
}

type Responder = dyn Fn(&str) -> (u16, String) + Send + Sync;

/// Minimal HTTP/1.1 server answering every request through a closure.
pub struct MockHttpServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpServer {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let respond = Arc::clone(&respond);
                let log = Arc::clone(&log);
                thread::spawn(move || handle_http(stream, respond, log));
            }
        });

        Self { base_url, requests }
    }

    /// Request targets (path and query) received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle_http(mut stream: TcpStream, respond: Arc<Responder>, log: Arc<Mutex<Vec<String>>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&head);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap().push(target.clone());

    let (status, body) = respond(&target);
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// WebSocket server that plays a fixed script of text messages to every client
/// and then keeps the connection open until the client leaves.
pub struct MockWsServer {
    pub base_url: String,
    uris: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    pub fn start(script: Vec<(Duration, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let uris = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);

        let log = Arc::clone(&uris);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let script = Arc::clone(&script);
                let log = Arc::clone(&log);
                thread::spawn(move || serve_ws(stream, &script, log));
            }
        });

        Self { base_url, uris }
    }

    /// Request URIs of every completed handshake.
    pub fn handshakes(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }
}

fn serve_ws(stream: TcpStream, script: &[(Duration, String)], log: Arc<Mutex<Vec<String>>>) {
    let callback = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
        log.lock().unwrap().push(req.uri().to_string());
        Ok(resp)
    };
    // Plain HTTP pulls also land here; their handshake fails and they are dropped.
    let Ok(mut socket) = tungstenite::accept_hdr(stream, callback) else {
        return;
    };
    for (delay, text) in script {
        thread::sleep(*delay);
        if socket.send(Message::Text(text.clone())).is_err() {
            return;
        }
    }
    while socket.read().is_ok() {}
}
