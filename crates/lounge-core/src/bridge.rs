//! One bridge run: negotiate, dial, relay until the session ends.

use lounge_protocol::{AuthEncoder, Credentials};
use lounge_transport::{
    dial, negotiate, DialError, Endpoint, NegotiationError, SessionConfig, SessionEnd,
    TransportSession, WebSocketConfig,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::notify::{GotifyNotifier, Notifier};
use crate::router::EventRouter;

/// Errors that abort a bridge run.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The polling bootstrap failed.
    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    /// The WebSocket upgrade failed.
    #[error("Dial failed: {0}")]
    Dial(#[from] DialError),
}

/// Gotify connection settings.
#[derive(Debug, Clone)]
pub struct GotifySettings {
    /// Base URL of the Gotify server.
    pub url: String,
    /// Application token.
    pub key: String,
}

/// Everything a bridge run needs.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// The Socket.IO server.
    pub endpoint: Endpoint,
    /// Login credentials.
    pub credentials: Credentials,
    /// Notification sink.
    pub gotify: GotifySettings,
    /// Dial options.
    pub websocket: WebSocketConfig,
    /// Session timing.
    pub session: SessionConfig,
}

/// Relays highlighted chat lines from one server session to a notifier.
pub struct Bridge<N> {
    settings: BridgeSettings,
    client: reqwest::Client,
    notifier: N,
}

impl Bridge<GotifyNotifier> {
    /// Create a bridge delivering to the configured Gotify server.
    #[must_use]
    pub fn new(settings: BridgeSettings) -> Self {
        let client = reqwest::Client::new();
        let notifier = GotifyNotifier::new(client.clone(), &settings.gotify.url, &settings.gotify.key);
        Self {
            settings,
            client,
            notifier,
        }
    }
}

impl<N: Notifier + 'static> Bridge<N> {
    /// Create a bridge delivering through `notifier`.
    #[must_use]
    pub fn with_notifier(settings: BridgeSettings, notifier: N) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            notifier,
        }
    }

    /// Run one session until it ends or `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation or the WebSocket upgrade fails. A
    /// session that fails after the upgrade is reported as
    /// [`SessionEnd::Failed`], not as an error.
    pub async fn run<F>(self, shutdown: F) -> Result<SessionEnd, BridgeError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            settings,
            client,
            notifier,
        } = self;

        let session = negotiate(&client, &settings.endpoint).await?;
        let stream = dial(&settings.endpoint, &session, &settings.websocket).await?;

        info!(host = %settings.endpoint.host(), sid = %session.sid, "Connected");

        let router = Arc::new(EventRouter::new(notifier));
        let end = TransportSession::new(
            session,
            stream,
            AuthEncoder::new(settings.credentials),
            settings.session,
        )
        .run(Arc::clone(&router), shutdown)
        .await;

        let stats = router.stats();
        info!(
            events = stats.events,
            notifications = stats.notifications,
            delivery_failures = stats.delivery_failures,
            malformed = stats.malformed,
            "Session finished"
        );

        Ok(end)
    }
}
