//! # WebSocket Echo Transport
//!
//! Sends price messages to a WebSocket echo endpoint and reports whatever comes back.
//! Each `connect` spawns one session task that owns the socket and runs a `select!`
//! over outbound messages, inbound frames (behind a silence watchdog) and its
//! cancellation token. However a session ends, it reports exactly one `Disconnected`.

use std::sync::Mutex;
use std::time::Duration;

use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tokio_util::sync::CancellationToken;

use crate::error::FeedError;
use crate::ingestors::{EventSender, PriceSink, Transport, TransportEvent};
use crate::markets::message::PriceMessage;

/// Public echo service that returns every frame unchanged.
pub const DEFAULT_ECHO_URL: &str = "wss://ws.postman-echo.com/raw";

/// Configuration for the echo connection.
#[derive(Debug, Clone)]
pub struct EchoWssConfig {
    pub url: String,
    /// Longest silence tolerated on an open socket. `None` disables the watchdog.
    pub watchdog: Option<Duration>,
}

impl Default for EchoWssConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ECHO_URL.to_string(),
            watchdog: Some(Duration::from_secs(30)),
        }
    }
}

struct Session {
    outbound: mpsc::UnboundedSender<PriceMessage>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Session {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

pub struct EchoWssTransport {
    config: EchoWssConfig,
    events: Mutex<Option<EventSender>>,
    session: Mutex<Option<Session>>,
}

impl EchoWssTransport {
    pub fn new(config: EchoWssConfig) -> Self {
        Self {
            config,
            events: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn events(&self) -> Option<EventSender> {
        self.events.lock().expect("Transport lock poisoned").clone()
    }
}

impl PriceSink for EchoWssTransport {
    fn send(&self, message: PriceMessage) {
        let session = self.session.lock().expect("Transport lock poisoned");
        match session.as_ref().filter(|s| s.is_live()) {
            Some(session) => {
                if session.outbound.send(message).is_err() {
                    tracing::debug!("Session ended, outbound message discarded");
                }
            }
            None => tracing::debug!(symbol = %message.symbol, "Not connected, message discarded"),
        }
    }
}

impl Transport for EchoWssTransport {
    fn attach(&self, events: EventSender) {
        *self.events.lock().expect("Transport lock poisoned") = Some(events);
    }

    fn connect(&self) {
        let Some(events) = self.events() else {
            tracing::warn!("Connect requested before an event queue was attached");
            return;
        };

        let mut session = self.session.lock().expect("Transport lock poisoned");
        if session.as_ref().is_some_and(Session::is_live) {
            tracing::debug!("Connect ignored, session already running");
            return;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_session(
            self.config.clone(),
            events,
            outbound_rx,
            token.clone(),
        ));
        *session = Some(Session {
            outbound: outbound_tx,
            token,
            handle,
        });
    }

    fn disconnect(&self) {
        let session = self.session.lock().expect("Transport lock poisoned").take();
        match session {
            // The session reports its own Disconnected on the way out.
            Some(session) if session.is_live() => session.token.cancel(),
            _ => {
                if let Some(events) = self.events() {
                    let _ = events.send(TransportEvent::Disconnected { reason: None });
                }
            }
        }
    }
}

impl Drop for EchoWssTransport {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.lock() {
            if let Some(session) = session.take() {
                session.token.cancel();
            }
        }
    }
}

fn forward(events: &EventSender, decoded: Result<PriceMessage, FeedError>) {
    let event = match decoded {
        Ok(message) => TransportEvent::Price(message),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable frame");
            TransportEvent::Malformed(e.to_string())
        }
    };
    let _ = events.send(event);
}

async fn run_session(
    config: EchoWssConfig,
    events: EventSender,
    mut outbound: mpsc::UnboundedReceiver<PriceMessage>,
    token: CancellationToken,
) {
    tracing::info!(url = %config.url, "Connecting to echo endpoint");
    let connected = tokio::select! {
        _ = token.cancelled() => {
            let _ = events.send(TransportEvent::Disconnected { reason: None });
            return;
        }
        result = connect_async(config.url.as_str()) => result,
    };

    let (mut write, mut read) = match connected {
        Ok((ws_stream, _)) => ws_stream.split(),
        Err(e) => {
            let failure = FeedError::TransportFailure(format!("connect failed: {}", e));
            tracing::error!(error = %failure, "Echo connection failed");
            let _ = events.send(TransportEvent::Disconnected {
                reason: Some(failure.to_string()),
            });
            return;
        }
    };
    tracing::info!("Echo connection open");
    let _ = events.send(TransportEvent::Connected);

    let watchdog = config.watchdog.unwrap_or(Duration::MAX);
    let reason = loop {
        tokio::select! {
            _ = token.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                break None;
            }

            Some(message) = outbound.recv() => {
                let frame = match message.encode() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "Outbound message not encodable");
                        continue;
                    }
                };
                if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                    break Some(format!("send failed: {}", e));
                }
            }

            frame = timeout(watchdog, read.next()) => {
                match frame {
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        forward(&events, PriceMessage::decode_str(text.as_str()));
                    }
                    Ok(Some(Ok(WsMessage::Binary(bytes)))) => {
                        forward(&events, PriceMessage::decode(&bytes));
                    }
                    Ok(Some(Ok(WsMessage::Close(frame)))) => {
                        break Some(format!("closed by remote: {:?}", frame));
                    }
                    // Ping and pong are answered by tungstenite.
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => break Some(format!("read failed: {}", e)),
                    Ok(None) => break Some("stream ended".to_string()),
                    Err(_) => {
                        break Some(format!("no frames for {}s", watchdog.as_secs()));
                    }
                }
            }
        }
    };

    match &reason {
        Some(reason) => tracing::warn!(%reason, "Echo connection lost"),
        None => tracing::info!("Echo connection closed"),
    }
    let _ = events.send(TransportEvent::Disconnected { reason });
}
