//! # lounge-transport
//!
//! Session negotiation and the WebSocket transport for a Socket.IO server.
//!
//! Opening a session takes three steps:
//!
//! 1. [`negotiate`] - HTTP polling bootstrap, yields a [`Session`] id
//! 2. [`dial`] - WebSocket upgrade bound to that id
//! 3. [`TransportSession::run`] - probe handshake, login, heartbeat and the
//!    read loop feeding an [`EventHandler`]
//!
//! ```rust,ignore
//! use lounge_transport::{dial, negotiate, Endpoint, SessionConfig, TransportSession};
//!
//! let endpoint = Endpoint::new("irc.example.org:443");
//! let session = negotiate(&reqwest::Client::new(), &endpoint).await?;
//! let stream = dial(&endpoint, &session, &Default::default()).await?;
//! let end = TransportSession::new(session, stream, auth, SessionConfig::default())
//!     .run(handler, tokio::signal::ctrl_c().map(|_| ()))
//!     .await;
//! ```

pub mod negotiate;
pub mod session;
pub mod traits;
pub mod websocket;

pub use negotiate::{negotiate, Endpoint, Session};
pub use session::{ProbeHandshake, Reaction, SessionConfig, SessionEnd, SessionState, TransportSession};
pub use traits::{DialError, EventHandler, FrameSink, NegotiationError, TransportError};
pub use websocket::{dial, upgrade_request, FrameWriter, WebSocketConfig, WsStream};
