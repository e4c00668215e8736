//! WebSocket upgrade and the shared write half.
//!
//! This module dials the Socket.IO WebSocket transport using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{Sink, SinkExt};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::client::Request,
        http::{
            header::{ACCEPT, CACHE_CONTROL, COOKIE, PRAGMA},
            HeaderValue,
        },
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::negotiate::{Endpoint, Session};
use crate::traits::{DialError, FrameSink, TransportError};

/// A dialed Socket.IO WebSocket.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket dial configuration.
///
/// Compression is not negotiated: tokio-tungstenite 0.24 has no
/// permessage-deflate support, so frames travel uncompressed.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Upper bound for TCP connect, TLS and the upgrade exchange.
    pub handshake_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(45),
        }
    }
}

impl From<WsError> for DialError {
    fn from(err: WsError) -> Self {
        match err {
            WsError::Http(response) => DialError::Handshake {
                status: response.status().as_u16(),
            },
            other => DialError::Network(other.to_string()),
        }
    }
}

/// Build the upgrade request for `session`.
///
/// # Errors
///
/// Returns an error if the URL or the cookie header cannot be built.
pub fn upgrade_request(endpoint: &Endpoint, session: &Session) -> Result<Request, DialError> {
    let url = endpoint.websocket_url(&session.sid);

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| DialError::InvalidRequest(format!("{}: {}", url, e)))?;

    let cookie = HeaderValue::from_str(&format!("io={}", session.sid))
        .map_err(|e| DialError::InvalidRequest(format!("cookie: {}", e)))?;

    let headers = request.headers_mut();
    headers.insert(COOKIE, cookie);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    Ok(request)
}

/// Open the WebSocket transport bound to `session`.
///
/// An empty session id is not rejected here; the server refuses the upgrade.
///
/// # Errors
///
/// Returns [`DialError::Handshake`] if the server refuses the upgrade,
/// [`DialError::Timeout`] if the handshake deadline passes, and
/// [`DialError::Network`] for anything below HTTP.
pub async fn dial(
    endpoint: &Endpoint,
    session: &Session,
    config: &WebSocketConfig,
) -> Result<WsStream, DialError> {
    let request = upgrade_request(endpoint, session)?;

    debug!(uri = %request.uri(), "Dialing websocket");

    let (stream, response) = tokio::time::timeout(config.handshake_timeout, connect_async(request))
        .await
        .map_err(|_| DialError::Timeout(config.handshake_timeout))??;

    debug!(status = %response.status(), "Websocket upgrade accepted");

    Ok(stream)
}

/// Write half of a session, shared between the read loop (handshake replies)
/// and the heartbeat flow.
pub struct FrameWriter<W> {
    sink: Arc<Mutex<W>>,
    is_open: Arc<AtomicBool>,
}

impl<W> FrameWriter<W> {
    /// Wrap a sink.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            is_open: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            is_open: Arc::clone(&self.is_open),
        }
    }
}

#[async_trait]
impl<W> FrameSink for FrameWriter<W>
where
    W: Sink<Message, Error = WsError> + Unpin + Send + 'static,
{
    async fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed(""),
        };

        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(Some(frame))).await.map_err(|e| {
            warn!("Failed to send close frame: {}", e);
            TransportError::SendFailed(e.to_string())
        })
    }

    async fn finish(&self) -> Result<(), TransportError> {
        self.is_open.store(false, Ordering::SeqCst);

        let mut sink = self.sink.lock().await;
        match sink.flush().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e.to_string())),
        }
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}
