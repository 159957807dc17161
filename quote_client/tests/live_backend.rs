//! Tests against real sockets on loopback: HTTP pulls through reqwest and the
//! WebSocket push through tungstenite.
mod common;

use std::time::Duration;

use common::{MockHttpServer, MockWsServer, state_is, wait_until};
use quote_client::{ClientConfig, QuoteClient, ReconnectPolicy, TransportState};

fn config_for(base_url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base_url)
        .unwrap()
        .with_probe_interval(Duration::from_millis(200))
        .with_reconnect(ReconnectPolicy::disabled());
    config.http_timeout = Duration::from_secs(2);
    config.ws_poll_interval = Duration::from_millis(50);
    config
}

fn market_backend() -> MockHttpServer {
    MockHttpServer::start(|target| {
        if target.starts_with("/api/market/quotes") {
            (
                200,
                serde_json::json!([
                    {"symbol": "MSFT", "price": 410.5, "change": null, "changePct": null, "ts": 1_700_000_000_000i64},
                    {"symbol": "ZZZ", "price": null, "change": null, "changePct": null, "ts": null}
                ])
                .to_string(),
            )
        } else if target.starts_with("/api/market/quote?") {
            (
                200,
                serde_json::json!({"symbol": "AAPL", "price": 182.3, "ts": 1_700_000_000_000i64})
                    .to_string(),
            )
        } else if target.starts_with("/api/market/symbols") {
            (
                200,
                serde_json::json!([
                    {"symbol": "AAPL", "name": "Apple Inc.", "exchange": "NASDAQ"},
                    {"symbol": "MSFT", "name": "Microsoft Corporation"}
                ])
                .to_string(),
            )
        } else {
            (404, r#"{"detail":"Not Found"}"#.to_string())
        }
    })
}

#[test]
fn http_fallback_when_socket_handshake_is_rejected() {
    let server = market_backend();
    let client = QuoteClient::start(config_for(&server.base_url)).unwrap();

    client.subscribe(["MSFT", "ZZZ"]);

    assert!(wait_until(Duration::from_secs(3), || {
        client.quote("MSFT").and_then(|q| q.price) == Some(410.5) && client.quote("ZZZ").is_some()
    }));
    assert_eq!(client.quote("ZZZ").unwrap().price, None);
    assert_eq!(client.quote("MSFT").unwrap().observed_at, 1_700_000_000_000);
    assert!(wait_until(Duration::from_secs(2), || state_is(&client, TransportState::Degraded)));

    let requests = server.requests();
    assert!(requests.iter().any(|r| r == "/ws/quotes?symbols=MSFT%2CZZZ"));
    assert!(requests.iter().any(|r| r == "/api/market/quotes?symbols=MSFT%2CZZZ"));
}

#[test]
fn single_quote_and_catalog_requests() {
    let server = market_backend();
    let client = QuoteClient::start(config_for(&server.base_url)).unwrap();

    let quote = client.fetch_quote("AAPL").unwrap();
    assert_eq!(quote.price, Some(182.3));
    assert!(wait_until(Duration::from_secs(1), || client.quote("AAPL").is_some()));

    let catalog = client.fetch_symbols(Some("a")).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].exchange.as_deref(), Some("NASDAQ"));
    assert_eq!(catalog[1].exchange, None);
    assert!(server.requests().iter().any(|r| r == "/api/market/symbols?query=a"));
}

#[test]
fn server_error_is_not_surfaced_to_consumers() {
    let server = MockHttpServer::start(|_| (500, "oops".to_string()));
    let client = QuoteClient::start(config_for(&server.base_url)).unwrap();

    client.subscribe(["AAPL"]);
    assert!(wait_until(Duration::from_secs(2), || {
        server.requests().iter().filter(|r| r.starts_with("/api/market/quotes")).count() >= 2
    }));
    assert!(client.snapshot().is_empty());
    assert!(client.fetch_quote("AAPL").is_err());
}

#[test]
fn stream_delivers_batches_and_survives_malformed_records() {
    let server = MockWsServer::start(vec![
        (
            Duration::from_millis(20),
            r#"[{"symbol":"AAPL","price":1},{"price":2}]"#.to_string(),
        ),
        (
            Duration::from_millis(50),
            r#"{"symbol":"AAPL","price":3,"ts":4102444800000}"#.to_string(),
        ),
    ]);
    let client = QuoteClient::start(config_for(&server.base_url)).unwrap();

    client.subscribe(["AAPL"]);

    assert!(wait_until(Duration::from_secs(3), || {
        client.quote("AAPL").and_then(|q| q.price) == Some(3.0)
    }));
    assert_eq!(client.snapshot().len(), 1);
    assert!(state_is(&client, TransportState::Streaming));
    assert_eq!(server.handshakes(), vec!["/ws/quotes?symbols=AAPL".to_string()]);
}
