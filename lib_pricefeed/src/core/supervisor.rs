//! # Feed Supervisor
//!
//! Owns the [`FeedEngine`] and the connection lifecycle. A single tokio task consumes
//! control commands and transport events in arrival order; it is the only writer of
//! the engine, so no two updates can interleave.
//!
//! ```text
//!               start()                     Connected event
//! Disconnected ---------> Connecting ------------------------> Connected
//!      ^                      |                                    |
//!      +---- Disconnected ----+------------ Disconnected ----------+
//! ```
//!
//! `stop()` only asks the transport to disconnect; the state changes when the
//! transport confirms with a `Disconnected` event. A `Connected` event starts the
//! generator, a `Disconnected` event stops it. Reconnecting is left to the caller.
//!
//! Readers go through [`FeedHandle`], which takes a read lock for the duration of a
//! copy. The supervisor holds the write lock across each whole update, so a reader
//! never sees the ranking and the positions out of step.

use std::sync::{Arc, Mutex, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::engine::{AppliedUpdate, FeedEngine, FeedSnapshot, FeedStats};
use crate::core::generator::PriceGenerator;
use crate::core::rank_index::Reposition;
use crate::error::FeedError;
use crate::ingestors::{PriceSink, Transport, TransportEvent};
use crate::markets::deeplink::resolve_symbol_link;
use crate::markets::message::PriceMessage;
use crate::markets::symbol::{PriceDirection, Symbol};

const UPDATE_BUFFER: usize = 1024;

/// Connection state of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
}

/// Published after every update that changed a price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    pub symbol: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub direction: PriceDirection,
    /// Rank before the update.
    pub from: usize,
    /// Rank after the update.
    pub to: usize,
}

impl FeedUpdate {
    fn from_applied(applied: AppliedUpdate) -> Option<Self> {
        let (from, to) = match applied.reposition {
            Reposition::Unchanged => return None,
            Reposition::Stayed { index } => (index, index),
            Reposition::Moved { from, to } => (from, to),
        };
        let direction = if applied.new_price > applied.old_price {
            PriceDirection::Up
        } else {
            PriceDirection::Down
        };
        Some(Self {
            symbol: applied.symbol,
            old_price: applied.old_price,
            new_price: applied.new_price,
            direction,
            from,
            to,
        })
    }
}

enum SupervisorCommand {
    Start(oneshot::Sender<FeedState>),
    Stop(oneshot::Sender<FeedState>),
}

struct FeedSupervisor {
    engine: Arc<RwLock<FeedEngine>>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn PriceSink>,
    generator: Arc<dyn PriceGenerator>,
    state: watch::Sender<FeedState>,
    updates: broadcast::Sender<FeedUpdate>,
}

impl FeedSupervisor {
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<SupervisorCommand>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        token: CancellationToken,
    ) {
        tracing::info!("Feed supervisor started");
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(command) = commands.recv() => self.handle_command(command),
                Some(event) = events.recv() => self.handle_event(event),
                else => break,
            }
        }
        // Events queued behind the cancellation still land before the final state.
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
        }
        self.generator.stop_emitting();
        self.transition(FeedState::Disconnected, Some("shutdown"));
        tracing::info!("Feed supervisor stopped");
    }

    fn current(&self) -> FeedState {
        *self.state.borrow()
    }

    fn transition(&self, next: FeedState, reason: Option<&str>) {
        let previous = self.current();
        if previous != next {
            tracing::info!(?previous, ?next, reason, "Feed state changed");
            self.state.send_replace(next);
        }
    }

    fn handle_command(&self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Start(reply) => {
                if self.current() == FeedState::Disconnected {
                    self.transition(FeedState::Connecting, None);
                    self.transport.connect();
                } else {
                    tracing::debug!(state = ?self.current(), "Start ignored");
                }
                let _ = reply.send(self.current());
            }
            SupervisorCommand::Stop(reply) => {
                tracing::info!("Disconnect requested");
                self.transport.disconnect();
                let _ = reply.send(self.current());
            }
        }
    }

    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.transition(FeedState::Connected, None);
                self.generator.start_emitting(Arc::clone(&self.sink));
            }
            TransportEvent::Disconnected { reason } => {
                self.transition(FeedState::Disconnected, reason.as_deref());
                self.generator.stop_emitting();
            }
            TransportEvent::Price(message) => self.apply(&message),
            TransportEvent::Malformed(reason) => {
                tracing::debug!(%reason, "Dropping malformed frame");
                self.engine
                    .write()
                    .expect("Feed engine lock poisoned")
                    .record_malformed();
            }
        }
    }

    fn apply(&self, message: &PriceMessage) {
        let outcome = self
            .engine
            .write()
            .expect("Feed engine lock poisoned")
            .apply(message);

        match outcome {
            Ok(applied) => {
                tracing::trace!(symbol = %applied.symbol, price = %applied.new_price, "Price applied");
                if let Some(update) = FeedUpdate::from_applied(applied) {
                    // No subscribers is fine.
                    let _ = self.updates.send(update);
                }
            }
            Err(FeedError::UnknownSymbol(symbol)) => {
                tracing::debug!(%symbol, "Dropping update for unknown symbol");
            }
            Err(e) => tracing::warn!(error = %e, "Price update rejected"),
        }
    }
}

/// # Feed Handle
///
/// The public face of a running supervisor. Dropping the handle stops the task.
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    engine: Arc<RwLock<FeedEngine>>,
    state: watch::Receiver<FeedState>,
    updates: broadcast::Sender<FeedUpdate>,
    transport: Arc<dyn Transport>,
    generator: Arc<dyn PriceGenerator>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandle {
    /// Attaches to `transport` and spawns the supervisor task. Must be called from
    /// within a tokio runtime.
    pub fn spawn<T>(engine: FeedEngine, transport: Arc<T>, generator: Arc<dyn PriceGenerator>) -> Self
    where
        T: Transport + 'static,
    {
        let sink: Arc<dyn PriceSink> = transport.clone();
        let transport: Arc<dyn Transport> = transport;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        transport.attach(events_tx);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(FeedState::Disconnected);
        let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER);
        let engine = Arc::new(RwLock::new(engine));
        let token = CancellationToken::new();

        let supervisor = FeedSupervisor {
            engine: Arc::clone(&engine),
            transport: Arc::clone(&transport),
            sink,
            generator: Arc::clone(&generator),
            state: state_tx,
            updates: updates_tx.clone(),
        };
        let task = tokio::spawn(supervisor.run(commands_rx, events_rx, token.clone()));

        Self {
            commands: commands_tx,
            engine,
            state: state_rx,
            updates: updates_tx,
            transport,
            generator,
            token,
            task: Mutex::new(Some(task)),
        }
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<FeedState>) -> SupervisorCommand,
    ) -> Result<FeedState, FeedError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| FeedError::SupervisorClosed)?;
        rx.await.map_err(|_| FeedError::SupervisorClosed)
    }

    /// Requests a connection. Returns the state once the request has been handled,
    /// which is `Connecting` unless the feed was already past `Disconnected`.
    pub async fn start(&self) -> Result<FeedState, FeedError> {
        self.request(SupervisorCommand::Start).await
    }

    /// Requests a disconnect. The state turns `Disconnected` when the transport
    /// confirms, not when this returns.
    pub async fn stop(&self) -> Result<FeedState, FeedError> {
        self.request(SupervisorCommand::Stop).await
    }

    pub fn state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Resolves once the feed reaches `target`.
    pub async fn wait_for_state(&self, target: FeedState) -> Result<(), FeedError> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| FeedError::SupervisorClosed)
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<Symbol> {
        self.engine
            .read()
            .expect("Feed engine lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn ranking(&self) -> Vec<String> {
        self.engine
            .read()
            .expect("Feed engine lock poisoned")
            .ranking()
            .to_vec()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.engine.read().expect("Feed engine lock poisoned").snapshot()
    }

    pub fn stats(&self) -> FeedStats {
        self.engine.read().expect("Feed engine lock poisoned").stats()
    }

    /// Resolves a `stocks://symbol/<TICKER>` link against the tracked universe.
    pub fn resolve_link(&self, link: &str) -> Option<String> {
        let engine = self.engine.read().expect("Feed engine lock poisoned");
        resolve_symbol_link(link, |id| engine.contains(id))
    }

    /// Stops the generator, disconnects the transport and ends the supervisor task.
    pub async fn shutdown(&self) {
        self.generator.stop_emitting();
        self.transport.disconnect();
        self.token.cancel();

        let task = self.task.lock().expect("Feed handle lock poisoned").take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Feed supervisor task failed");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
