//! Frame types for the Engine.IO / Socket.IO hybrid wire format.
//!
//! Every WebSocket text message carries one frame. Control frames are bare
//! Engine.IO packet codes (`"2"`, `"3"`, `"3probe"`, `"5"`); event frames are
//! the message packet `4` followed by a Socket.IO payload such as
//! `2["msg",{...}]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outbound probe sent right after the WebSocket upgrade.
pub const PROBE: &str = "2probe";

/// Inbound answer to [`PROBE`].
pub const PROBE_ACK: &str = "3probe";

/// Outbound upgrade acknowledgement, sent once the probe is answered.
pub const UPGRADE: &str = "5";

/// Outbound heartbeat ping.
pub const PING: &str = "2";

/// Inbound heartbeat answer.
pub const PONG: &str = "3";

/// Engine.IO message packet + Socket.IO event packet.
pub const EVENT_PREFIX: &str = "42";

/// Engine.IO packet type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

impl From<PacketType> for u8 {
    fn from(pt: PacketType) -> u8 {
        pt as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Open),
            1 => Ok(PacketType::Close),
            2 => Ok(PacketType::Ping),
            3 => Ok(PacketType::Pong),
            4 => Ok(PacketType::Message),
            5 => Ok(PacketType::Upgrade),
            6 => Ok(PacketType::Noop),
            _ => Err("Invalid packet type"),
        }
    }
}

impl TryFrom<char> for PacketType {
    type Error = &'static str;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        let digit = value.to_digit(10).ok_or("Invalid packet type")?;
        Self::try_from(digit as u8)
    }
}

/// A Socket.IO event: `[name, arg0, arg1, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name, the first element of the array.
    pub name: String,
    /// Remaining array elements.
    pub args: Vec<Value>,
}

impl Event {
    /// Create a new event.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// The first argument, which carries the payload for every event this
    /// bridge cares about.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.args.first()
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `"3probe"`: the server answered our probe.
    ProbeAck,

    /// Bare `"3"`: heartbeat answer.
    Pong,

    /// `4...`: a Socket.IO event.
    Event(Event),

    /// Any other Engine.IO packet.
    Control {
        /// Packet type taken from the first character.
        packet: PacketType,
        /// Everything after the packet type.
        data: String,
    },
}

impl Frame {
    /// Get the Engine.IO packet type of this frame.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Frame::ProbeAck | Frame::Pong => PacketType::Pong,
            Frame::Event(_) => PacketType::Message,
            Frame::Control { packet, .. } => *packet,
        }
    }
}

/// Login credentials sent in the `auth` event.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    #[serde(rename = "user")]
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_packet_type_conversion() {
        assert_eq!(PacketType::try_from(4u8), Ok(PacketType::Message));
        assert_eq!(PacketType::try_from('3'), Ok(PacketType::Pong));
        assert_eq!(u8::from(PacketType::Upgrade), 5);
        assert!(PacketType::try_from(7u8).is_err());
        assert!(PacketType::try_from('x').is_err());
    }

    #[test]
    fn test_frame_packet_type() {
        assert_eq!(Frame::ProbeAck.packet_type(), PacketType::Pong);
        let event = Frame::Event(Event::new("msg", vec![]));
        assert_eq!(event.packet_type(), PacketType::Message);
    }

    #[test]
    fn test_event_body() {
        let event = Event::new("msg", vec![json!({"a": 1}), json!(2)]);
        assert_eq!(event.body(), Some(&json!({"a": 1})));
        assert!(Event::new("init", vec![]).body().is_none());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }
}
