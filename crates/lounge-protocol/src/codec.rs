//! Codec for the hybrid Engine.IO + Socket.IO text format.
//!
//! The server wraps otherwise valid JSON in framing characters (packet type
//! digits, length prefixes like `97:0`, trailing packets like `2:40`).
//! [`strip_wrapper`] cuts those away before any JSON parsing happens.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::frames::{Credentials, Event, Frame, PacketType, EVENT_PREFIX, PONG, PROBE_ACK};

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Empty text frame.
    #[error("Empty frame")]
    Empty,

    /// First character is not an Engine.IO packet type.
    #[error("Unknown packet type {0:?}")]
    UnknownPacketType(char),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event payload is not a JSON array.
    #[error("Event payload is not an array")]
    NotAnArray,

    /// The event array does not start with a string.
    #[error("Event array has no name")]
    MissingEventName,
}

fn is_open_bracket(c: char) -> bool {
    c == '[' || c == '{'
}

fn is_close_bracket(c: char) -> bool {
    c == ']' || c == '}'
}

/// Remove the leading run of characters that are not `[` or `{` and the
/// trailing run of characters that are not `]` or `}`.
///
/// Input without any bracket character is returned unchanged.
#[must_use]
pub fn strip_wrapper(raw: &str) -> &str {
    if !raw.contains(|c: char| is_open_bracket(c) || is_close_bracket(c)) {
        return raw;
    }

    let Some(start) = raw.find(is_open_bracket) else {
        return "";
    };
    let rest = &raw[start..];
    match rest.rfind(is_close_bracket) {
        // Brackets are ASCII, so `end + 1` is a char boundary.
        Some(end) => &rest[..=end],
        None => "",
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns an error if the frame is empty, has an unknown packet type, or is
/// a message packet whose payload is not a `[name, ...args]` array.
pub fn decode(raw: &str) -> Result<Frame, ProtocolError> {
    match raw {
        PROBE_ACK => return Ok(Frame::ProbeAck),
        PONG => return Ok(Frame::Pong),
        _ => {}
    }

    let mut chars = raw.chars();
    let first = chars.next().ok_or(ProtocolError::Empty)?;
    let packet =
        PacketType::try_from(first).map_err(|_| ProtocolError::UnknownPacketType(first))?;
    let rest = chars.as_str();

    match packet {
        PacketType::Message => decode_event(rest).map(Frame::Event),
        packet => Ok(Frame::Control {
            packet,
            data: rest.to_string(),
        }),
    }
}

/// Decode the Socket.IO part of a message packet.
///
/// The Socket.IO packet type digit (and namespace, if any) is dropped by
/// [`strip_wrapper`].
///
/// # Errors
///
/// Returns an error if the stripped payload is not a JSON array starting
/// with a string.
pub fn decode_event(payload: &str) -> Result<Event, ProtocolError> {
    let value: Value = serde_json::from_str(strip_wrapper(payload))?;

    let Value::Array(mut items) = value else {
        return Err(ProtocolError::NotAnArray);
    };

    if items.is_empty() {
        return Err(ProtocolError::MissingEventName);
    }

    match items.remove(0) {
        Value::String(name) => Ok(Event { name, args: items }),
        _ => Err(ProtocolError::MissingEventName),
    }
}

/// Encode an event as `42["name",arg0,...]`.
///
/// # Errors
///
/// Returns an error if an argument fails to serialize.
pub fn encode_event<T: Serialize>(name: &str, args: &[T]) -> Result<String, ProtocolError> {
    let mut out = String::from(EVENT_PREFIX);
    out.push('[');
    out.push_str(&serde_json::to_string(name)?);
    for arg in args {
        out.push(',');
        out.push_str(&serde_json::to_string(arg)?);
    }
    out.push(']');
    Ok(out)
}

/// Builds the login frame for one set of credentials.
#[derive(Debug, Clone)]
pub struct AuthEncoder {
    credentials: Credentials,
}

impl AuthEncoder {
    /// Name of the login event.
    pub const EVENT: &'static str = "auth";

    /// Create a new encoder.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Credentials this encoder logs in with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Encode the login frame: `42["auth",{"user":..,"password":..}]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials fail to serialize.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_event(Self::EVENT, std::slice::from_ref(&self.credentials))
    }
}
