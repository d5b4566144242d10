//! # Synthetic Price Generator
//!
//! Stands in for a live feed. Every tick it nudges each tracked price by a uniform
//! random fraction of itself and sends one message per ticker to a [`PriceSink`].
//!
//! The generator keeps its own mirror of the prices it last emitted, so it never
//! reads the feed's store; the store only changes when a message comes back through
//! the supervisor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ingestors::PriceSink;
use crate::markets::message::PriceMessage;
use crate::markets::symbol::SymbolSpec;

/// Starts and stops a periodic price source.
pub trait PriceGenerator: Send + Sync {
    /// Begins emitting to `sink`. Does nothing if already running.
    fn start_emitting(&self, sink: Arc<dyn PriceSink>);
    /// Cancels the emission loop. Does nothing if not running.
    fn stop_emitting(&self);
    fn is_running(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    /// Pause between two emission rounds.
    pub interval: Duration,
    /// Largest relative move per tick, e.g. `0.05` for five percent.
    pub max_move: f64,
    /// Decimal places kept on generated prices.
    pub price_scale: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_move: 0.05,
            price_scale: 2,
        }
    }
}

struct RunningLoop {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

pub struct SyntheticGenerator {
    config: GeneratorConfig,
    // Bootstrap order, so each round emits in a stable order.
    prices: Arc<Mutex<Vec<(String, Decimal)>>>,
    running: Mutex<Option<RunningLoop>>,
}

impl SyntheticGenerator {
    pub fn new(universe: &[SymbolSpec], config: GeneratorConfig) -> Self {
        let prices = universe
            .iter()
            .map(|spec| (spec.id.clone(), spec.initial_price))
            .collect();
        Self {
            config,
            prices: Arc::new(Mutex::new(prices)),
            running: Mutex::new(None),
        }
    }

    /// The prices this generator last emitted.
    pub fn mirror(&self) -> Vec<(String, Decimal)> {
        self.prices.lock().expect("Generator lock poisoned").clone()
    }
}

impl PriceGenerator for SyntheticGenerator {
    fn start_emitting(&self, sink: Arc<dyn PriceSink>) {
        let mut running = self.running.lock().expect("Generator lock poisoned");
        if running.as_ref().is_some_and(|r| !r.token.is_cancelled()) {
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(emit_loop(
            Arc::clone(&self.prices),
            sink,
            self.config,
            token.clone(),
        ));
        tracing::info!(interval_ms = self.config.interval.as_millis() as u64, "Price generator started");
        *running = Some(RunningLoop {
            token,
            _handle: handle,
        });
    }

    fn stop_emitting(&self) {
        if let Some(running) = self.running.lock().expect("Generator lock poisoned").take() {
            running.token.cancel();
            tracing::info!("Price generator stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running
            .lock()
            .expect("Generator lock poisoned")
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled())
    }
}

impl Drop for SyntheticGenerator {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(running) = running.take() {
                running.token.cancel();
            }
        }
    }
}

async fn emit_loop(
    prices: Arc<Mutex<Vec<(String, Decimal)>>>,
    sink: Arc<dyn PriceSink>,
    config: GeneratorConfig,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let batch: Vec<PriceMessage> = {
            let mut prices = prices.lock().expect("Generator lock poisoned");
            let mut rng = rand::rng();
            prices
                .iter_mut()
                .map(|(symbol, price)| {
                    *price = next_price(&mut rng, *price, config.max_move, config.price_scale);
                    PriceMessage::new(symbol.clone(), *price)
                })
                .collect()
        };

        for message in batch {
            sink.send(message);
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
    tracing::debug!("Price generator loop exited");
}

/// `price + price * u` with `u` uniform in `[-max_move, max_move]`, rounded to `scale`.
pub(crate) fn next_price<R: Rng + ?Sized>(
    rng: &mut R,
    price: Decimal,
    max_move: f64,
    scale: u32,
) -> Decimal {
    let bound = max_move.abs();
    let fraction = if bound > 0.0 {
        rng.random_range(-bound..=bound)
    } else {
        0.0
    };
    let fraction = Decimal::try_from(fraction).unwrap_or(Decimal::ZERO);
    let next = (price + price * fraction).round_dp(scale);
    if next.is_sign_negative() {
        Decimal::ZERO
    } else {
        next
    }
}
