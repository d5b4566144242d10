//! # Transports
//!
//! The boundary between the feed and whatever carries price frames. A transport
//! accepts connect/disconnect requests and outbound messages, and reports everything
//! that happens to it as [`TransportEvent`]s on a single ordered queue handed over
//! with [`Transport::attach`]. Keeping connection changes and prices on one queue
//! means a price can never overtake the `Connected` that preceded it.
//!
//! None of the methods block or fail: a transport that cannot send reports
//! `Disconnected` instead.
//!
//! ## Contained Modules:
//! - **`loopback`**: an in-process echo, used offline and in tests.
//! - **`echo_wss`**: a WebSocket client for echo endpoints (feature `ingestors`).

use tokio::sync::mpsc;

use crate::markets::message::PriceMessage;

/// In-process echo transport.
pub mod loopback;
/// WebSocket echo transport.
#[cfg(feature = "ingestors")]
pub mod echo_wss;

#[cfg(feature = "ingestors")]
pub use echo_wss::{EchoWssConfig, EchoWssTransport};
pub use loopback::LoopbackTransport;

/// Everything a transport reports back to the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open.
    Connected,
    /// The connection is gone, either on request or because it failed.
    Disconnected { reason: Option<String> },
    /// A decoded inbound price.
    Price(PriceMessage),
    /// An inbound frame that could not be decoded. The connection stays open.
    Malformed(String),
}

/// Sending half of the event queue.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Anything that accepts outbound price messages.
pub trait PriceSink: Send + Sync {
    fn send(&self, message: PriceMessage);
}

/// A connection to a price source.
pub trait Transport: PriceSink {
    /// Hands over the queue on which events are reported. Replaces any earlier queue.
    fn attach(&self, events: EventSender);
    /// Requests a connection; success is reported as [`TransportEvent::Connected`].
    fn connect(&self);
    /// Requests a disconnect; completion is reported as [`TransportEvent::Disconnected`].
    fn disconnect(&self);
}
