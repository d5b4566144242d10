use anyhow::Result;
use lib_pricefeed::core::{FeedEngine, FeedHandle, PriceGenerator, SyntheticGenerator};
use lib_pricefeed::ingestors::{EchoWssTransport, LoopbackTransport};
use lib_pricefeed::markets::{default_universe, load_universe};
use std::sync::Arc;
use tokio::signal;

mod feed_logic;
use feed_logic::config::{self, TransportKind};
use feed_logic::{logger, monitor};

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("Ctrl-C received, initiating shutdown.");
            }
            _ = term_signal.recv() => {
                tracing::info!("SIGTERM received, initiating shutdown.");
            }
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        tracing::info!("Ctrl-C received, initiating shutdown.");
    }
    Ok(())
}

fn report_link(handle: &FeedHandle, link: &str) {
    match handle.resolve_link(link).and_then(|id| handle.get(&id)) {
        Some(symbol) => tracing::info!(
            symbol = symbol.id(),
            name = symbol.display_name(),
            price = %symbol.current_price(),
            "{}",
            symbol.description()
        ),
        None => tracing::warn!(%link, "Link does not name a tracked symbol"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config()?;
    let _guard = logger::setup_logging(&settings)?;

    let universe = match &settings.universe_path {
        Some(path) => load_universe(path)?,
        None => default_universe(),
    };
    let engine = FeedEngine::new(&universe)?;
    let generator: Arc<dyn PriceGenerator> =
        Arc::new(SyntheticGenerator::new(&universe, settings.generator_config()));

    let handle = Arc::new(match settings.transport {
        TransportKind::Wss => {
            tracing::info!(url = %settings.ws_url, "Using WebSocket echo transport");
            let transport = Arc::new(EchoWssTransport::new(settings.echo_config()));
            FeedHandle::spawn(engine, transport, generator)
        }
        TransportKind::Loopback => {
            tracing::info!("Using loopback transport");
            FeedHandle::spawn(engine, Arc::new(LoopbackTransport::new()), generator)
        }
    });

    if let Some(link) = &settings.open_link {
        report_link(&handle, link);
    }

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    // Subscribed before start so an early disconnect is not missed.
    let state = handle.watch_state();
    let reconnect_handle = tokio::spawn(monitor::run_reconnect(
        Arc::clone(&handle),
        state,
        settings.backoff(),
        shutdown_tx.subscribe(),
    ));

    let report_handle = tokio::spawn(monitor::run_report(
        Arc::clone(&handle),
        settings.report_interval,
        settings.report_top,
        shutdown_tx.subscribe(),
    ));

    handle.start().await?;

    // Wait for shutdown signal
    let signal_result = wait_for_signal().await;

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    // Wait for components to shut down
    let _ = tokio::try_join!(reconnect_handle, report_handle);
    handle.shutdown().await;

    let stats = handle.stats();
    tracing::info!(
        applied = stats.applied,
        reordered = stats.reordered,
        unknown = stats.unknown_dropped,
        invalid = stats.invalid_dropped,
        malformed = stats.malformed_dropped,
        self_heals = stats.self_heals,
        "Shutdown complete."
    );
    signal_result
}
