//! Transport seams and error types.
//!
//! The session drives any [`FrameSink`] for outbound frames and hands decoded
//! events to an [`EventHandler`], so the event router never touches the
//! socket directly.

use async_trait::async_trait;
use lounge_protocol::{Event, ProtocolError};
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Errors from the HTTP polling bootstrap.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The polling request could not be sent or answered.
    #[error("Polling request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The response body could not be read.
    #[error("Failed to read polling response: {0}")]
    Body(#[source] reqwest::Error),

    /// The stripped body is not a session object.
    #[error("Unparsable polling response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the WebSocket upgrade.
#[derive(Debug, Error)]
pub enum DialError {
    /// The server answered the upgrade with a non-101 status.
    #[error("Handshake failed with status {status}")]
    Handshake {
        /// HTTP status code of the rejection.
        status: u16,
    },

    /// The handshake did not finish in time.
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// TCP, TLS or WebSocket protocol failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The upgrade request could not be built.
    #[error("Invalid upgrade request: {0}")]
    InvalidRequest(String),
}

/// Receives decoded Socket.IO events in arrival order.
///
/// Called from the read loop; the next frame is not read until the returned
/// future completes.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one inbound event.
    async fn on_event(&self, event: Event);
}

/// The write half of a session.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one text frame.
    async fn send_text(&self, text: String) -> Result<(), TransportError>;

    /// Send a normal-closure close frame. Further sends fail.
    async fn close(&self) -> Result<(), TransportError>;

    /// Flush frames queued by the protocol layer after the peer closed.
    /// Further sends fail.
    async fn finish(&self) -> Result<(), TransportError>;

    /// Check if the sink still accepts frames.
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_error_reports_status() {
        let err = DialError::Handshake { status: 403 };
        assert_eq!(err.to_string(), "Handshake failed with status 403");
    }

    #[test]
    fn test_transport_error_from_protocol() {
        let err: TransportError = ProtocolError::Empty.into();
        assert!(matches!(err, TransportError::Protocol(ProtocolError::Empty)));
    }
}
