//! # lounge-core
//!
//! Event routing and notification delivery for the lounge bridge.
//!
//! - **Router** - classifies Socket.IO events, filters highlighted chat lines
//! - **Message** - chat payload and notification types
//! - **Notify** - the notifier capability and its Gotify implementation
//! - **Bridge** - wires negotiation, transport and router together
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Router    │────▶│  Notifier   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```

pub mod bridge;
pub mod message;
pub mod notify;
pub mod router;

pub use bridge::{Bridge, BridgeError, BridgeSettings, GotifySettings};
pub use message::{ChatEvent, ChatMessage, Notification, Sender};
pub use notify::{Delivery, DeliveryError, GotifyNotifier, Notifier};
pub use router::{EventRouter, Route, RouteError, RouterStats};
