//! HTTP polling bootstrap.
//!
//! Before a WebSocket can be opened the server has to hand out a session id.
//! That happens over a plain polling request whose body is a length-prefixed
//! Engine.IO open packet, e.g.
//! `97:0{"sid":"...","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":60000}2:40`.

use lounge_protocol::version::{handshake_path, Transport};
use lounge_protocol::strip_wrapper;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::traits::NegotiationError;

/// Where the Socket.IO server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
}

impl Endpoint {
    /// An endpoint reached over `https` / `wss`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secure: true,
        }
    }

    /// An endpoint reached over plain `http` / `ws`.
    #[must_use]
    pub fn insecure(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secure: false,
        }
    }

    /// `host:port` of the server.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether TLS is used.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// URL of the polling bootstrap request.
    #[must_use]
    pub fn polling_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{}://{}{}",
            scheme,
            self.host,
            handshake_path(Transport::Polling, None)
        )
    }

    /// URL of the WebSocket upgrade bound to `sid`.
    #[must_use]
    pub fn websocket_url(&self, sid: &str) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let sid = urlencoding::encode(sid);
        format!(
            "{}://{}{}",
            scheme,
            self.host,
            handshake_path(Transport::Websocket, Some(&*sid))
        )
    }
}

/// Session parameters handed out by the polling bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Session {
    /// Session id; binds the WebSocket to this session.
    pub sid: String,
    /// Transports the server allows upgrading to.
    #[serde(default)]
    pub upgrades: BTreeSet<String>,
    /// Server's heartbeat interval in milliseconds.
    #[serde(default, rename = "pingInterval")]
    pub ping_interval_ms: u64,
    /// Server's heartbeat timeout in milliseconds.
    #[serde(default, rename = "pingTimeout")]
    pub ping_timeout_ms: u64,
}

impl Session {
    /// Create a session with only an id.
    #[must_use]
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            upgrades: BTreeSet::new(),
            ping_interval_ms: 0,
            ping_timeout_ms: 0,
        }
    }

    /// Parse a polling response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the stripped body is not a JSON object with a
    /// string `sid`.
    pub fn from_polling_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_wrapper(body))
    }

    /// Check if the server allows upgrading to `transport`.
    #[must_use]
    pub fn supports_upgrade(&self, transport: Transport) -> bool {
        self.upgrades.contains(transport.as_str())
    }

    /// Server's heartbeat interval.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Server's heartbeat timeout.
    #[must_use]
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Obtain a session id over HTTP polling.
///
/// A single attempt; retrying is up to the caller.
///
/// # Errors
///
/// Returns an error if the request fails, the body cannot be read, or the
/// body does not parse as a session.
pub async fn negotiate(
    client: &reqwest::Client,
    endpoint: &Endpoint,
) -> Result<Session, NegotiationError> {
    let url = endpoint.polling_url();
    debug!(url = %url, "Requesting session id");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(NegotiationError::Request)?;
    let status = response.status();
    let body = response.text().await.map_err(NegotiationError::Body)?;

    debug!(status = %status, body = %body, "Polling response");

    let session = Session::from_polling_body(&body)?;

    if !session.supports_upgrade(Transport::Websocket) {
        warn!(
            upgrades = ?session.upgrades,
            "Server does not advertise a websocket upgrade, trying anyway"
        );
    }

    info!(
        sid = %session.sid,
        ping_interval_ms = session.ping_interval_ms,
        ping_timeout_ms = session.ping_timeout_ms,
        "Negotiated session"
    );

    Ok(session)
}
