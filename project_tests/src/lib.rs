//! Shared fixtures for the end-to-end feed scenarios.

use std::sync::Arc;
use std::time::Duration;

use lib_pricefeed::core::{FeedEngine, FeedHandle, FeedSnapshot, GeneratorConfig, SyntheticGenerator};
use lib_pricefeed::ingestors::LoopbackTransport;
use lib_pricefeed::markets::SymbolSpec;
use rust_decimal::Decimal;

/// A running feed over the loopback transport.
pub struct LoopbackFeed {
    pub handle: FeedHandle,
    pub transport: Arc<LoopbackTransport>,
    pub generator: Arc<SyntheticGenerator>,
}

/// A = 300, B = 200, C = 100.
pub fn three_symbols() -> Vec<SymbolSpec> {
    vec![
        SymbolSpec::new("A", "Alpha Corp.", "", Decimal::from(300)),
        SymbolSpec::new("B", "Beta Corp.", "", Decimal::from(200)),
        SymbolSpec::new("C", "Gamma Corp.", "", Decimal::from(100)),
    ]
}

/// Spawns a supervisor over a fresh loopback transport and synthetic generator.
pub fn spawn_loopback(universe: &[SymbolSpec], interval: Duration) -> anyhow::Result<LoopbackFeed> {
    let transport = Arc::new(LoopbackTransport::new());
    let generator = Arc::new(SyntheticGenerator::new(
        universe,
        GeneratorConfig {
            interval,
            ..GeneratorConfig::default()
        },
    ));
    let handle = FeedHandle::spawn(
        FeedEngine::new(universe)?,
        Arc::clone(&transport),
        generator.clone(),
    );
    Ok(LoopbackFeed {
        handle,
        transport,
        generator,
    })
}

/// Yields to the runtime until `done` holds, panicking after a bounded number of polls.
pub async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

/// Prices in ranking order never increase.
pub fn is_descending(snapshot: &FeedSnapshot) -> bool {
    snapshot
        .symbols
        .windows(2)
        .all(|pair| pair[0].current_price() >= pair[1].current_price())
}
