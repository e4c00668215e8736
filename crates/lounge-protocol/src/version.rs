//! Engine.IO protocol revision and handshake URLs.

use std::fmt;

/// Engine.IO revision spoken by the server (`EIO=3`).
pub const ENGINE_IO_VERSION: u8 = 3;

/// Request path shared by the polling and WebSocket transports.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Engine.IO transport names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// HTTP long-polling, used for the bootstrap request.
    Polling,
    /// WebSocket, the upgraded transport.
    Websocket,
}

impl Transport {
    /// Name used in the `transport` query parameter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Transport::Polling => "polling",
            Transport::Websocket => "websocket",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the `/socket.io/?EIO=3&transport=...` path and query.
///
/// `sid` is appended as-is; callers must percent-encode it.
#[must_use]
pub fn handshake_path(transport: Transport, sid: Option<&str>) -> String {
    let mut path = format!(
        "{}?EIO={}&transport={}",
        SOCKET_IO_PATH, ENGINE_IO_VERSION, transport
    );
    if let Some(sid) = sid {
        path.push_str("&sid=");
        path.push_str(sid);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_path() {
        assert_eq!(
            handshake_path(Transport::Polling, None),
            "/socket.io/?EIO=3&transport=polling"
        );
    }

    #[test]
    fn test_websocket_path() {
        assert_eq!(
            handshake_path(Transport::Websocket, Some("abc123")),
            "/socket.io/?EIO=3&transport=websocket&sid=abc123"
        );
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Websocket.to_string(), "websocket");
    }
}
