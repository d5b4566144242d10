use lib_pricefeed::core::{FeedHandle, FeedSnapshot, FeedState};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{MissedTickBehavior, interval};

/// Exponential reconnect delay with jitter. Each attempt waits a random time between
/// half and all of `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, attempt: 0 }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Upper bound of the next delay.
    pub fn ceiling(&self) -> Duration {
        let factor = 1u32 << self.attempt.min(31);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn next_delay<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);
        ceiling / 2 + ceiling.mul_f64(rng.random_range(0.0..=0.5))
    }
}

/// Restarts the feed after every disconnect until shutdown. The supervisor itself
/// never reconnects.
///
/// `state` must be taken from the handle before the first `start`, so a disconnect
/// that lands before this task is first polled still counts as a change.
pub async fn run_reconnect(
    handle: Arc<FeedHandle>,
    mut state: watch::Receiver<FeedState>,
    mut backoff: Backoff,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Reconnect service received shutdown signal.");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                match current {
                    FeedState::Connected => backoff.reset(),
                    FeedState::Connecting => {}
                    FeedState::Disconnected => {
                        let delay = backoff.next_delay(&mut rand::rng());
                        tracing::warn!(delay_ms = delay.as_millis() as u64, "Feed disconnected, reconnecting");
                        tokio::select! {
                            _ = shutdown.recv() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        if let Err(e) = handle.start().await {
                            tracing::error!(error = %e, "Reconnect failed, supervisor is gone");
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Plain-text table of the `top` highest priced symbols.
pub fn format_ranking(snapshot: &FeedSnapshot, top: usize) -> String {
    snapshot
        .symbols
        .iter()
        .take(top)
        .enumerate()
        .map(|(rank, symbol)| {
            format!(
                "{:>3}. {:<6} {:>10} {}",
                rank + 1,
                symbol.id(),
                symbol.current_price().to_string(),
                symbol.direction().arrow()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Logs the ranking and counters every `every`, and each rank change at debug level.
pub async fn run_report(
    handle: Arc<FeedHandle>,
    every: Duration,
    top: usize,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut updates = handle.subscribe_updates();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Report service received shutdown signal.");
                break;
            }
            _ = ticker.tick() => {
                let stats = handle.stats();
                tracing::info!(
                    state = ?handle.state(),
                    applied = stats.applied,
                    reordered = stats.reordered,
                    unknown = stats.unknown_dropped,
                    invalid = stats.invalid_dropped,
                    malformed = stats.malformed_dropped,
                    self_heals = stats.self_heals,
                    "Ranking\n{}",
                    format_ranking(&handle.snapshot(), top)
                );
            }
            update = updates.recv() => match update {
                Ok(update) if update.from != update.to => {
                    tracing::debug!(
                        symbol = %update.symbol,
                        price = %update.new_price,
                        from = update.from + 1,
                        to = update.to + 1,
                        "{} rank changed",
                        update.direction.arrow()
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Report fell behind the update stream");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_pricefeed::core::{FeedEngine, GeneratorConfig, SyntheticGenerator};
    use lib_pricefeed::ingestors::LoopbackTransport;
    use lib_pricefeed::markets::{PriceMessage, SymbolSpec};
    use rust_decimal::Decimal;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
        let mut rng = StdRng::seed_from_u64(7);

        let expected = [100, 200, 400, 800, 1000, 1000];
        for ceiling_ms in expected {
            let ceiling = Duration::from_millis(ceiling_ms);
            assert_eq!(backoff.ceiling(), ceiling);
            let delay = backoff.next_delay(&mut rng);
            assert!(delay >= ceiling / 2 && delay <= ceiling, "{:?} vs {:?}", delay, ceiling);
        }

        backoff.reset();
        assert_eq!(backoff.ceiling(), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_survives_many_attempts() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(backoff.next_delay(&mut rng) <= Duration::from_secs(60));
        }
    }

    fn universe() -> Vec<SymbolSpec> {
        vec![
            SymbolSpec::new("AAA", "A Co.", "", Decimal::from(300)),
            SymbolSpec::new("BBB", "B Co.", "", Decimal::from(200)),
            SymbolSpec::new("CCC", "C Co.", "", Decimal::from(100)),
        ]
    }

    #[test]
    fn test_format_ranking_lists_top_symbols() {
        let mut engine = FeedEngine::new(&universe()).unwrap();
        engine.apply(&PriceMessage::new("CCC", Decimal::from(500))).unwrap();

        let report = format_ranking(&engine.snapshot(), 2);
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("CCC") && lines[0].contains("500") && lines[0].contains("↑"));
        assert!(lines[1].contains("AAA"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_drop() {
        let transport = Arc::new(LoopbackTransport::new());
        let generator = Arc::new(SyntheticGenerator::new(&universe(), GeneratorConfig::default()));
        let handle = Arc::new(FeedHandle::spawn(
            FeedEngine::new(&universe()).unwrap(),
            Arc::clone(&transport),
            generator,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);
        let reconnect = tokio::spawn(run_reconnect(
            Arc::clone(&handle),
            handle.watch_state(),
            Backoff::new(Duration::from_millis(100), Duration::from_secs(1)),
            shutdown_tx.subscribe(),
        ));

        handle.start().await.unwrap();
        handle.wait_for_state(FeedState::Connected).await.unwrap();

        transport.drop_connection("remote closed");
        handle.wait_for_state(FeedState::Disconnected).await.unwrap();
        handle.wait_for_state(FeedState::Connected).await.unwrap();
        assert_eq!(transport.connect_calls(), 2);

        shutdown_tx.send(()).unwrap();
        reconnect.await.unwrap();
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_drop_before_task_runs() {
        let transport = Arc::new(LoopbackTransport::new());
        let generator = Arc::new(SyntheticGenerator::new(&universe(), GeneratorConfig::default()));
        let handle = Arc::new(FeedHandle::spawn(
            FeedEngine::new(&universe()).unwrap(),
            Arc::clone(&transport),
            generator,
        ));
        let state = handle.watch_state();

        // The whole connect and drop cycle completes before the reconnect task exists.
        handle.start().await.unwrap();
        handle.wait_for_state(FeedState::Connected).await.unwrap();
        transport.drop_connection("refused");
        handle.wait_for_state(FeedState::Disconnected).await.unwrap();
        assert_eq!(transport.connect_calls(), 1);

        let (shutdown_tx, _) = broadcast::channel(1);
        let reconnect = tokio::spawn(run_reconnect(
            Arc::clone(&handle),
            state,
            Backoff::new(Duration::from_millis(100), Duration::from_secs(1)),
            shutdown_tx.subscribe(),
        ));

        handle.wait_for_state(FeedState::Connected).await.unwrap();
        assert_eq!(transport.connect_calls(), 2);

        shutdown_tx.send(()).unwrap();
        reconnect.await.unwrap();
        handle.shutdown().await;
    }
}
