//! # lounge-protocol
//!
//! Wire format for talking to a Socket.IO (Engine.IO revision 3) server.
//!
//! Frames travel as WebSocket text messages. A frame is either a bare
//! Engine.IO control code or the message packet `4` carrying a Socket.IO
//! event array:
//!
//! - `2probe` / `3probe` / `5` - transport upgrade handshake
//! - `2` / `3` - heartbeat ping and pong
//! - `42["name",{...}]` - Socket.IO event
//!
//! ## Example
//!
//! ```rust
//! use lounge_protocol::{codec, AuthEncoder, Credentials, Frame};
//!
//! let login = AuthEncoder::new(Credentials::new("user", "pass")).encode().unwrap();
//! assert_eq!(login, r#"42["auth",{"user":"user","password":"pass"}]"#);
//!
//! match codec::decode(&login).unwrap() {
//!     Frame::Event(event) => assert_eq!(event.name, "auth"),
//!     _ => unreachable!(),
//! }
//! ```

pub mod codec;
pub mod frames;
pub mod version;

pub use codec::{decode, encode_event, strip_wrapper, AuthEncoder, ProtocolError};
pub use frames::{Credentials, Event, Frame, PacketType};
pub use version::{Transport, ENGINE_IO_VERSION};
