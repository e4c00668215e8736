//! Chat payloads and the notifications derived from them.

use serde::{Deserialize, Serialize};

/// Argument of the `msg` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatEvent {
    /// Channel id the message arrived in.
    #[serde(default)]
    pub chan: Option<i64>,
    /// The message itself.
    #[serde(rename = "msg")]
    pub message: ChatMessage,
    /// Highlight counter of the channel.
    #[serde(default, rename = "highlight")]
    pub highlight_count: i64,
    /// Unread counter of the channel.
    #[serde(default, rename = "unread")]
    pub unread_count: i64,
}

/// A single chat line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMessage {
    /// Who sent it.
    #[serde(default)]
    pub from: Sender,
    /// Server timestamp.
    #[serde(default)]
    pub time: Option<String>,
    /// Message kind (`message`, `action`, `notice`, ...).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: String,
    /// Whether the message mentions us.
    #[serde(default, rename = "highlight")]
    pub highlighted: bool,
}

/// Sender of a chat line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Sender {
    /// Channel mode prefix (`@`, `+`, ...).
    #[serde(default)]
    pub mode: String,
    /// Nickname.
    #[serde(default)]
    pub nick: String,
}

impl ChatEvent {
    /// Whether this event should produce a notification.
    ///
    /// Only the per-message flag counts; the channel counter stays positive
    /// after the highlighted line has scrolled by.
    #[must_use]
    pub fn is_highlighted(&self) -> bool {
        self.message.highlighted
    }
}

/// A notification to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Notification title.
    pub title: String,
    /// Notification text.
    #[serde(rename = "message")]
    pub body: String,
}

impl Notification {
    /// Create a new notification.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Build the notification for a chat line.
    #[must_use]
    pub fn from_chat(event: &ChatEvent) -> Self {
        Self::new(
            format!("Message from {}", event.message.from.nick),
            event.message.text.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_event_parse() {
        let value = json!({
            "chan": 4,
            "msg": {
                "from": {"mode": "@", "nick": "alice"},
                "time": "2024-01-01T12:00:00.000Z",
                "type": "message",
                "text": "hello",
                "highlight": true
            },
            "highlight": 2,
            "unread": 7
        });

        let event: ChatEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event.chan, Some(4));
        assert_eq!(event.message.from.nick, "alice");
        assert_eq!(event.message.kind.as_deref(), Some("message"));
        assert_eq!(event.highlight_count, 2);
        assert_eq!(event.unread_count, 7);
        assert!(event.is_highlighted());
    }

    #[test]
    fn test_counter_alone_is_not_a_highlight() {
        let value = json!({
            "msg": {"from": {"nick": "bob"}, "text": "hi", "highlight": false},
            "highlight": 1
        });
        let event: ChatEvent = serde_json::from_value(value).unwrap();
        assert!(!event.is_highlighted());
    }

    #[test]
    fn test_notification_from_chat() {
        let value = json!({"msg": {"from": {"nick": "alice"}, "text": "hello", "highlight": true}});
        let event: ChatEvent = serde_json::from_value(value).unwrap();

        let notification = Notification::from_chat(&event);
        assert_eq!(notification, Notification::new("Message from alice", "hello"));
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({"title": "Message from alice", "message": "hello"})
        );
    }
}
