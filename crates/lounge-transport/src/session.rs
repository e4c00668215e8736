//! Transport session: probe handshake, read loop and heartbeat.
//!
//! Two flows run per connection. A spawned read loop is the only reader; it
//! decodes frames, answers the probe handshake and hands events to the
//! [`EventHandler`]. The supervising flow owns the heartbeat timer and the
//! shutdown signal and waits on the read loop's `JoinHandle`, which is the
//! single completion signal between the two.
//!
//! ```text
//! Connecting ──2probe──▶ ProbeSent ──3probe / 5 + auth──▶ Active
//!                                                           │
//!                               shutdown: close frame ──▶ Closing ──▶ Closed
//!                               read error / peer close ─────────────▶ Closed
//! ```

use futures_util::{FutureExt, Sink, Stream, StreamExt};
use lounge_protocol::frames::{PING, PROBE, UPGRADE};
use lounge_protocol::{codec, AuthEncoder, Event, Frame, ProtocolError};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::negotiate::Session;
use crate::traits::{EventHandler, FrameSink, TransportError};
use crate::websocket::FrameWriter;

/// Connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Dialed, probe not sent yet.
    Connecting,
    /// `2probe` sent, waiting for `3probe`.
    ProbeSent,
    /// Upgraded and logged in.
    Active,
    /// Close frame sent, waiting for the peer.
    Closing,
    /// Terminal.
    Closed,
}

/// What the read loop should do with a decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Send these frames, in order.
    Reply(Vec<String>),
    /// Hand the event to the event handler.
    Forward(Event),
    /// Nothing to do.
    Ignore,
}

/// The probe/upgrade sub-handshake.
#[derive(Debug)]
pub struct ProbeHandshake {
    state: SessionState,
    auth: AuthEncoder,
}

impl ProbeHandshake {
    /// Create a handshake that logs in with `auth` once upgraded.
    #[must_use]
    pub fn new(auth: AuthEncoder) -> Self {
        Self {
            state: SessionState::Connecting,
            auth,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `ProbeSent` and return the probe frame to send.
    pub fn start(&mut self) -> &'static str {
        self.state = SessionState::ProbeSent;
        PROBE
    }

    /// React to one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the login frame cannot be encoded.
    pub fn on_frame(&mut self, frame: Frame) -> Result<Reaction, ProtocolError> {
        match frame {
            Frame::ProbeAck if self.state == SessionState::ProbeSent => {
                info!("Received 3probe, upgrading and logging in");
                let login = self.auth.encode()?;
                self.state = SessionState::Active;
                Ok(Reaction::Reply(vec![UPGRADE.to_string(), login]))
            }
            Frame::ProbeAck => {
                debug!(state = ?self.state, "Ignoring unexpected 3probe");
                Ok(Reaction::Ignore)
            }
            Frame::Pong => {
                debug!(state = ?self.state, "Heartbeat acknowledged");
                Ok(Reaction::Ignore)
            }
            Frame::Event(event) => Ok(Reaction::Forward(event)),
            Frame::Control { packet, data } => {
                debug!(packet = ?packet, data = %data, "Ignoring control frame");
                Ok(Reaction::Ignore)
            }
        }
    }
}

/// Session timing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between outbound `2` frames.
    pub heartbeat_interval: Duration,
    /// How long to wait for the peer after sending a close frame.
    pub close_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(25),
            close_grace: Duration::from_secs(1),
        }
    }
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The shutdown signal fired.
    Cancelled,
    /// The peer closed the stream.
    PeerClosed,
    /// The transport failed.
    Failed(TransportError),
}

impl SessionEnd {
    /// Whether the session ended without a transport failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self, SessionEnd::Failed(_))
    }
}

/// A live Socket.IO session over one WebSocket.
pub struct TransportSession<S> {
    session: Session,
    stream: S,
    handshake: ProbeHandshake,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
}

impl<S> TransportSession<S>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin + 'static,
{
    /// Create a session over a dialed stream.
    #[must_use]
    pub fn new(session: Session, stream: S, auth: AuthEncoder, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            session,
            stream,
            handshake: ProbeHandshake::new(auth),
            config,
            state: Arc::new(state),
        }
    }

    /// Session parameters this connection is bound to.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the session until the peer closes, the transport fails, or
    /// `shutdown` completes.
    pub async fn run<H, F>(self, handler: Arc<H>, shutdown: F) -> SessionEnd
    where
        H: EventHandler + ?Sized + 'static,
        F: Future<Output = ()> + Send,
    {
        let Self {
            session,
            stream,
            mut handshake,
            config,
            state,
        } = self;

        let (sink, stream) = stream.split();
        let writer = FrameWriter::new(sink);

        // Socket.IO wants a probe before it upgrades the transport.
        let probe = handshake.start();
        state.send_replace(handshake.state());
        if let Err(e) = writer.send_text(probe.to_string()).await {
            error!(sid = %session.sid, error = %e, "Failed to send probe");
            state.send_replace(SessionState::Closed);
            return SessionEnd::Failed(e);
        }

        let mut reader = tokio::spawn(read_loop(
            stream,
            writer.clone(),
            handshake,
            handler,
            Arc::clone(&state),
        ));

        let period = config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        let end = loop {
            tokio::select! {
                exit = &mut reader => break read_loop_result(exit),
                () = &mut shutdown => {
                    info!(sid = %session.sid, "Shutdown requested, closing session");
                    state.send_replace(SessionState::Closing);
                    break close_gracefully(&writer, &mut reader, config.close_grace).await;
                }
                _ = heartbeat.tick() => {
                    debug!(sid = %session.sid, "Sending heartbeat");
                    if let Err(e) = writer.send_text(PING.to_string()).await {
                        warn!(sid = %session.sid, error = %e, "Heartbeat send failed");
                    }
                }
            }
        };

        if !reader.is_finished() {
            reader.abort();
        }
        state.send_replace(SessionState::Closed);

        debug!(sid = %session.sid, end = ?end, "Session closed");
        end
    }
}

fn read_loop_result(exit: Result<SessionEnd, JoinError>) -> SessionEnd {
    match exit {
        Ok(end) => end,
        Err(e) => {
            error!(error = %e, "Read loop terminated abnormally");
            SessionEnd::Failed(TransportError::Other(format!("read loop aborted: {}", e)))
        }
    }
}

async fn close_gracefully<K: FrameSink>(
    writer: &K,
    reader: &mut JoinHandle<SessionEnd>,
    grace: Duration,
) -> SessionEnd {
    if let Err(e) = writer.close().await {
        warn!(error = %e, "write close failed");
        return SessionEnd::Cancelled;
    }

    match tokio::time::timeout(grace, reader).await {
        Ok(_) => debug!("Read loop observed close"),
        Err(_) => debug!(grace_ms = grace.as_millis() as u64, "Close grace period elapsed"),
    }

    SessionEnd::Cancelled
}

async fn read_loop<R, K, H>(
    mut stream: R,
    writer: K,
    mut handshake: ProbeHandshake,
    handler: Arc<H>,
    state: Arc<watch::Sender<SessionState>>,
) -> SessionEnd
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    K: FrameSink,
    H: EventHandler + ?Sized,
{
    loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(data))) => {
                debug!(len = data.len(), "Ignoring binary frame");
                continue;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!(frame = ?frame, "Received close frame");
                // Completes the closing handshake with the queued reply.
                if let Err(e) = writer.finish().await {
                    debug!(error = %e, "Failed to flush close reply");
                }
                return SessionEnd::PeerClosed;
            }
            Some(Err(WsError::ConnectionClosed)) | None => {
                debug!("WebSocket stream ended");
                return SessionEnd::PeerClosed;
            }
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                return SessionEnd::Failed(TransportError::ReceiveFailed(e.to_string()));
            }
        };

        // One bad frame must not take the read loop down with it.
        let processed = AssertUnwindSafe(process_frame(&text, &mut handshake, &writer, &*handler))
            .catch_unwind()
            .await;
        if processed.is_err() {
            error!(frame = %text, "Frame handler panicked, frame dropped");
        }

        // Once shutdown has begun the supervisor owns the state.
        state.send_if_modified(|current| {
            let next = handshake.state();
            if matches!(*current, SessionState::Closing | SessionState::Closed) || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn process_frame<K, H>(text: &str, handshake: &mut ProbeHandshake, writer: &K, handler: &H)
where
    K: FrameSink,
    H: EventHandler + ?Sized,
{
    let frame = match codec::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, frame = %text, "Dropping undecodable frame");
            return;
        }
    };

    match handshake.on_frame(frame) {
        Ok(Reaction::Reply(frames)) => {
            for reply in frames {
                if let Err(e) = writer.send_text(reply).await {
                    warn!(error = %e, "Failed to send handshake reply");
                    break;
                }
            }
        }
        Ok(Reaction::Forward(event)) => handler.on_event(event).await,
        Ok(Reaction::Ignore) => {}
        Err(e) => warn!(error = %e, "Failed to encode login frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lounge_protocol::Credentials;
    use serde_json::json;

    fn handshake() -> ProbeHandshake {
        ProbeHandshake::new(AuthEncoder::new(Credentials::new("bridge", "secret")))
    }

    const LOGIN: &str = r#"42["auth",{"user":"bridge","password":"secret"}]"#;

    #[test]
    fn test_start_sends_probe() {
        let mut hs = handshake();
        assert_eq!(hs.state(), SessionState::Connecting);
        assert_eq!(hs.start(), "2probe");
        assert_eq!(hs.state(), SessionState::ProbeSent);
    }

    #[test]
    fn test_probe_ack_upgrades_and_logs_in() {
        let mut hs = handshake();
        hs.start();

        let reaction = hs.on_frame(Frame::ProbeAck).unwrap();
        assert_eq!(
            reaction,
            Reaction::Reply(vec!["5".to_string(), LOGIN.to_string()])
        );
        assert_eq!(hs.state(), SessionState::Active);
    }

    #[test]
    fn test_pong_while_probing_changes_nothing() {
        let mut hs = handshake();
        hs.start();

        assert_eq!(hs.on_frame(Frame::Pong).unwrap(), Reaction::Ignore);
        assert_eq!(hs.state(), SessionState::ProbeSent);
    }

    #[test]
    fn test_login_sent_once() {
        let mut hs = handshake();
        hs.start();
        hs.on_frame(Frame::ProbeAck).unwrap();

        assert_eq!(hs.on_frame(Frame::ProbeAck).unwrap(), Reaction::Ignore);
        assert_eq!(hs.state(), SessionState::Active);
    }

    #[test]
    fn test_events_are_forwarded() {
        let mut hs = handshake();
        hs.start();

        let event = Event::new("msg", vec![json!({"x": 1})]);
        assert_eq!(
            hs.on_frame(Frame::Event(event.clone())).unwrap(),
            Reaction::Forward(event)
        );
    }

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(25));
        assert_eq!(config.close_grace, Duration::from_secs(1));
    }

    #[test]
    fn test_session_end_is_clean() {
        assert!(SessionEnd::Cancelled.is_clean());
        assert!(SessionEnd::PeerClosed.is_clean());
        assert!(!SessionEnd::Failed(TransportError::ConnectionClosed).is_clean());
    }
}
