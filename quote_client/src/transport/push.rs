//! WebSocket push transport.
//!
//! One connection per wanted-set snapshot: the symbol list travels in the
//! `symbols` query parameter of `/ws/quotes`, so there are no subscribe messages.
//! The socket gets a read timeout so a blocked read wakes up regularly and the
//! reading thread can observe cancellation.
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use log::{debug, info};
use quote_common::net::push_url;
use quote_common::{QuoteError, Result};
use tungstenite::protocol::Message;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, WebSocket};
use url::Url;

use crate::config::ClientConfig;
use crate::transport::{Frame, PushConnector, PushStream};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Opens `/ws/quotes` connections against the configured backend.
pub struct WsConnector {
    base_url: Url,
    poll_interval: Duration,
}

impl WsConnector {
    /// Creates a connector for `config.base_url`.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            poll_interval: config.ws_poll_interval,
        }
    }
}

impl PushConnector for WsConnector {
    fn open(&self, symbols: &[String]) -> Result<Box<dyn PushStream>> {
        let url = push_url(&self.base_url, symbols)?;
        info!("Opening quote stream: {}", url);

        let (socket, response) = tungstenite::connect(url.as_str())
            .map_err(|e| QuoteError::WebSocket(format!("connect to {} failed: {}", url, e)))?;
        debug!("Quote stream handshake answered {}", response.status());

        set_read_timeout(&socket, self.poll_interval)?;
        Ok(Box::new(WsStream {
            socket,
            url,
            closed: false,
        }))
    }
}

fn set_read_timeout(socket: &Socket, timeout: Duration) -> Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout))?,
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(Some(timeout))?,
        _ => debug!("Read timeout not supported for this stream; cancellation waits for traffic"),
    }
    Ok(())
}

/// Live `/ws/quotes` connection.
pub struct WsStream {
    socket: Socket,
    url: Url,
    closed: bool,
}

impl PushStream for WsStream {
    fn next_frame(&mut self) -> Result<Frame> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Frame::Text(text)),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Ok(Frame::Text(text)),
                Err(e) => {
                    debug!("Non UTF-8 binary frame dropped: {}", e);
                    Ok(Frame::Idle)
                }
            },
            Ok(Message::Close(frame)) => {
                debug!("Quote stream {} closed by server: {:?}", self.url, frame);
                Ok(Frame::Closed)
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => Ok(Frame::Idle),
            Err(WsError::Io(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(Frame::Idle)
            }
            Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(Frame::Closed),
            Err(e) => Err(QuoteError::WebSocket(e.to_string())),
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None) {
            debug!("Closing quote stream {}: {}", self.url, e);
        }
    }
}

impl Drop for WsStream {
    fn drop(&mut self) {
        self.close();
    }
}
