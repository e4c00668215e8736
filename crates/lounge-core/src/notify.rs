//! Notification delivery.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::message::Notification;

/// Delivery errors. Never retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request could not be sent or the response not read.
    #[error("Delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sink answered with a non-success status.
    #[error("Delivery rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Something that can show a notification to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, DeliveryError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, DeliveryError> {
        (**self).deliver(notification).await
    }
}

/// Delivers notifications to a Gotify server.
#[derive(Debug, Clone)]
pub struct GotifyNotifier {
    client: reqwest::Client,
    url: String,
    key: String,
}

impl GotifyNotifier {
    /// Header carrying the application token.
    pub const KEY_HEADER: &'static str = "X-Gotify-Key";

    /// Create a notifier posting to `<base_url>/message`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, key: impl Into<String>) -> Self {
        Self {
            client,
            url: format!("{}/message", base_url.trim_end_matches('/')),
            key: key.into(),
        }
    }

    /// Full URL notifications are posted to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<Delivery, DeliveryError> {
        debug!(url = %self.url, title = %notification.title, "Sending notification");

        let response = self
            .client
            .post(&self.url)
            .header(Self::KEY_HEADER, &self.key)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        info!(status = %status, body = %body, "Notification server answered");

        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Delivery {
            status: status.as_u16(),
            body,
        })
    }
}
