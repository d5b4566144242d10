//! # Loopback Transport
//!
//! An in-process stand-in for an echo server: every message sent while connected is
//! encoded, decoded again and reported back as an inbound price. It also lets a caller
//! push raw frames or drop the connection, which is how the feed's failure paths are
//! exercised without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::ingestors::{EventSender, PriceSink, Transport, TransportEvent};
use crate::markets::message::PriceMessage;

#[derive(Default)]
pub struct LoopbackTransport {
    events: Mutex<Option<EventSender>>,
    connected: AtomicBool,
    fail_sends: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    sent: Mutex<Vec<PriceMessage>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event: TransportEvent) {
        let guard = self.events.lock().expect("Loopback lock poisoned");
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    tracing::debug!("Loopback event dropped, receiver is gone");
                }
            }
            None => tracing::debug!("Loopback event dropped, nothing attached"),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Makes every following send fail until reset.
    pub fn set_send_failure(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Simulates the remote end closing the connection.
    pub fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit(TransportEvent::Disconnected {
            reason: Some(reason.to_string()),
        });
    }

    /// Delivers a raw inbound frame as if it came from the remote end.
    pub fn inject_frame(&self, frame: &str) {
        match PriceMessage::decode_str(frame) {
            Ok(message) => self.emit(TransportEvent::Price(message)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable loopback frame");
                self.emit(TransportEvent::Malformed(e.to_string()));
            }
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Every message accepted by `send`, in order.
    pub fn sent_messages(&self) -> Vec<PriceMessage> {
        self.sent.lock().expect("Loopback lock poisoned").clone()
    }
}

impl PriceSink for LoopbackTransport {
    fn send(&self, message: PriceMessage) {
        if !self.is_connected() {
            tracing::debug!(symbol = %message.symbol, "Loopback not connected, message discarded");
            return;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            tracing::warn!("Loopback send failed, reporting disconnect");
            self.drop_connection("send failed");
            return;
        }

        self.sent.lock().expect("Loopback lock poisoned").push(message.clone());
        match message.encode() {
            Ok(frame) => self.inject_frame(&frame),
            Err(e) => self.emit(TransportEvent::Malformed(e.to_string())),
        }
    }
}

impl Transport for LoopbackTransport {
    fn attach(&self, events: EventSender) {
        *self.events.lock().expect("Loopback lock poisoned") = Some(events);
    }

    fn connect(&self) {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        self.emit(TransportEvent::Connected);
    }

    fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        self.emit(TransportEvent::Disconnected { reason: None });
    }
}
