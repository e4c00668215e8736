//! Event router for the lounge bridge.
//!
//! The router classifies inbound Socket.IO events and turns highlighted chat
//! lines into notifications.

use async_trait::async_trait;
use lounge_protocol::Event;
use lounge_transport::EventHandler;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::message::{ChatEvent, Notification};
use crate::notify::Notifier;

/// Name of the chat message event.
pub const CHAT_EVENT: &str = "msg";

/// Authentication challenge events.
pub const AUTH_CHALLENGE_EVENTS: [&str; 2] = ["auth", "auth:start"];

/// Successful login event.
pub const AUTH_SUCCESS_EVENT: &str = "auth:success";

/// Rejected login event.
pub const AUTH_FAILED_EVENT: &str = "auth:failed";

/// Errors turning an event into a typed payload.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The event has no arguments.
    #[error("Event {0:?} has no payload")]
    MissingPayload(String),

    /// The payload does not have the expected shape.
    #[error("Malformed {event:?} payload: {source}")]
    Malformed {
        /// Event name.
        event: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// What the router did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A notification was delivered.
    Notified,
    /// Delivery was attempted and failed.
    DeliveryFailed,
    /// A chat line without a highlight.
    Filtered,
    /// An authentication lifecycle event.
    Auth,
    /// The payload could not be decoded.
    Malformed,
    /// An event this bridge does not handle.
    Ignored,
}

#[derive(Debug, Default)]
struct Counters {
    events: AtomicU64,
    notifications: AtomicU64,
    delivery_failures: AtomicU64,
    malformed: AtomicU64,
}

/// Router statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    /// Events seen.
    pub events: u64,
    /// Notifications delivered.
    pub notifications: u64,
    /// Notifications that failed to deliver.
    pub delivery_failures: u64,
    /// Events whose payload could not be decoded.
    pub malformed: u64,
}

/// Routes events to the notifier.
pub struct EventRouter<N> {
    notifier: N,
    counters: Counters,
}

impl<N: Notifier> EventRouter<N> {
    /// Create a router delivering through `notifier`.
    #[must_use]
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            counters: Counters::default(),
        }
    }

    /// Get router statistics.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            events: self.counters.events.load(Ordering::Relaxed),
            notifications: self.counters.notifications.load(Ordering::Relaxed),
            delivery_failures: self.counters.delivery_failures.load(Ordering::Relaxed),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
        }
    }

    /// Route one event.
    ///
    /// Qualifying chat lines are delivered before this returns.
    pub async fn route(&self, event: &Event) -> Route {
        self.counters.events.fetch_add(1, Ordering::Relaxed);
        debug!(event = %event.name, "Received event");

        match event.name.as_str() {
            CHAT_EVENT => match parse_payload::<ChatEvent>(event) {
                Ok(chat) => self.route_chat(&chat).await,
                Err(e) => {
                    self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Dropping chat event");
                    Route::Malformed
                }
            },
            name if AUTH_CHALLENGE_EVENTS.contains(&name) => {
                info!(event = %name, "Server issued authentication challenge");
                Route::Auth
            }
            AUTH_SUCCESS_EVENT => {
                info!("Authenticated");
                Route::Auth
            }
            AUTH_FAILED_EVENT => {
                warn!("Authentication rejected, check username and password");
                Route::Auth
            }
            name => {
                debug!(event = %name, "Ignoring event");
                Route::Ignored
            }
        }
    }

    async fn route_chat(&self, chat: &ChatEvent) -> Route {
        if !chat.is_highlighted() {
            return Route::Filtered;
        }

        info!(
            from = %chat.message.from.nick,
            text = %chat.message.text,
            "Highlighted message"
        );

        let notification = Notification::from_chat(chat);
        match self.notifier.deliver(&notification).await {
            Ok(delivery) => {
                self.counters.notifications.fetch_add(1, Ordering::Relaxed);
                debug!(status = delivery.status, "Notification delivered");
                Route::Notified
            }
            Err(e) => {
                self.counters.delivery_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Notification delivery failed");
                Route::DeliveryFailed
            }
        }
    }
}

#[async_trait]
impl<N: Notifier> EventHandler for EventRouter<N> {
    async fn on_event(&self, event: Event) {
        self.route(&event).await;
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T, RouteError> {
    let body = event
        .body()
        .ok_or_else(|| RouteError::MissingPayload(event.name.clone()))?;

    T::deserialize(body).map_err(|source| RouteError::Malformed {
        event: event.name.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Delivery, DeliveryError};
    use lounge_protocol::{codec, Frame};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, notification: &Notification) -> Result<Delivery, DeliveryError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(DeliveryError::Rejected {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(Delivery {
                status: 200,
                body: String::new(),
            })
        }
    }

    fn event(raw: &str) -> Event {
        match codec::decode(raw).unwrap() {
            Frame::Event(event) => event,
            other => panic!("Expected event frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_highlight_produces_one_notification() {
        let router = EventRouter::new(RecordingNotifier::default());
        let raw = r#"4["msg",{"msg":{"from":{"nick":"alice"},"text":"hello","highlight":true},"highlight":1,"unread":1}]"#;

        assert_eq!(router.route(&event(raw)).await, Route::Notified);

        let sent = router.notifier.sent.lock().unwrap();
        assert_eq!(*sent, vec![Notification::new("Message from alice", "hello")]);
    }

    #[tokio::test]
    async fn test_no_highlight_no_notification() {
        let router = EventRouter::new(RecordingNotifier::default());
        let raw = r#"4["msg",{"msg":{"from":{"nick":"alice"},"text":"hello","highlight":false},"highlight":1,"unread":1}]"#;

        assert_eq!(router.route(&event(raw)).await, Route::Filtered);
        assert!(router.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_chat_payload() {
        let router = EventRouter::new(RecordingNotifier::default());

        let wrong_shape = Event::new("msg", vec![json!({"msg": "not an object"})]);
        assert_eq!(router.route(&wrong_shape).await, Route::Malformed);

        let no_payload = Event::new("msg", vec![]);
        assert_eq!(router.route(&no_payload).await, Route::Malformed);

        assert!(router.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(router.stats().malformed, 2);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let router = EventRouter::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let chat = Event::new(
            "msg",
            vec![json!({"msg": {"from": {"nick": "bob"}, "text": "ping", "highlight": true}})],
        );

        assert_eq!(router.route(&chat).await, Route::DeliveryFailed);

        let stats = router.stats();
        assert_eq!(stats.notifications, 0);
        assert_eq!(stats.delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_auth_and_unknown_events() {
        let router = EventRouter::new(RecordingNotifier::default());

        let challenge = Event::new("auth", vec![json!({"success": false})]);
        assert_eq!(router.route(&challenge).await, Route::Auth);
        assert_eq!(router.route(&Event::new("auth:failed", vec![])).await, Route::Auth);
        assert_eq!(router.route(&Event::new("init", vec![json!({})])).await, Route::Ignored);

        assert_eq!(router.stats().events, 3);
        assert!(router.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_handler_routes() {
        let router = EventRouter::new(RecordingNotifier::default());
        let chat = Event::new(
            "msg",
            vec![json!({"msg": {"from": {"nick": "carol"}, "text": "yo", "highlight": true}})],
        );

        router.on_event(chat).await;

        assert_eq!(router.stats().notifications, 1);
    }
}
