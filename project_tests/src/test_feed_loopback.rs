//! # Loopback Feed Run
//!
//! Runs the built-in universe over the in-process loopback for a few seconds and
//! prints the resulting ranking. No network needed.

use std::time::Duration;

use lib_pricefeed::core::FeedState;
use lib_pricefeed::markets::default_universe;
use project_tests::{is_descending, spawn_loopback};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let universe = default_universe();
    let feed = spawn_loopback(&universe, Duration::from_millis(200))?;

    println!("[*] Starting loopback feed with {} symbols...", universe.len());
    feed.handle.start().await?;
    feed.handle.wait_for_state(FeedState::Connected).await?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    feed.handle.shutdown().await;

    let snapshot = feed.handle.snapshot();
    println!("-----------------------------------------------");
    for (rank, symbol) in snapshot.symbols.iter().enumerate() {
        println!(
            "{:>3}. {:<6} {:>10} {}",
            rank + 1,
            symbol.id(),
            symbol.current_price().to_string(),
            symbol.direction().arrow()
        );
    }
    println!("-----------------------------------------------");
    println!("[INFO] Stats: {}", serde_json::to_string(&feed.handle.stats())?);
    println!("[INFO] Ranking descending: {}", is_descending(&snapshot));
    Ok(())
}
