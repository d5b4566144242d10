//! End-to-end scenarios: supervisor, loopback transport and synthetic generator
//! wired together the way the server wires them.

use std::time::Duration;

use lib_pricefeed::core::FeedState;
use lib_pricefeed::markets::{PriceDirection, PriceMessage, default_universe};
use lib_pricefeed::{FeedError, PriceGenerator, PriceSink};
use project_tests::{eventually, is_descending, spawn_loopback, three_symbols};
use rust_decimal::Decimal;

const TICK: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_price_above_all_moves_to_top() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    let mut updates = feed.handle.subscribe_updates();

    feed.transport.inject_frame(r#"{"symbol":"C","price":500}"#);
    let update = updates.recv().await.unwrap();

    assert_eq!((update.from, update.to), (2, 0));
    assert_eq!(feed.handle.ranking(), ["C", "A", "B"]);
    let snapshot = feed.handle.snapshot();
    assert!(is_descending(&snapshot));
    assert_eq!(feed.handle.stats().reordered, 1);
}

#[tokio::test]
async fn test_small_drop_keeps_rank_and_tracks_direction() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    let mut updates = feed.handle.subscribe_updates();

    feed.transport.inject_frame(r#"{"symbol":"A","price":299}"#);
    updates.recv().await.unwrap();

    assert_eq!(feed.handle.ranking(), ["A", "B", "C"]);
    let a = feed.handle.get("A").unwrap();
    assert_eq!(a.current_price(), Decimal::from(299));
    assert_eq!(a.previous_price(), Decimal::from(300));
    assert_eq!(a.direction(), PriceDirection::Down);
}

#[tokio::test]
async fn test_decimal_precision_survives_the_wire() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    let mut updates = feed.handle.subscribe_updates();

    feed.transport.inject_frame(r#"{"symbol":"B","price":178.72}"#);
    updates.recv().await.unwrap();

    let b = feed.handle.get("B").unwrap();
    assert_eq!(b.current_price(), Decimal::new(17872, 2));
    assert_eq!(b.current_price().to_string(), "178.72");
}

#[tokio::test]
async fn test_unknown_symbol_and_garbage_are_dropped() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    let before = feed.handle.snapshot();

    feed.transport.inject_frame(r#"{"symbol":"ZZZ","price":1}"#);
    feed.transport.inject_frame("not a price");
    feed.transport.inject_frame(r#"{"symbol":"A","price":-3}"#);
    eventually(|| {
        let stats = feed.handle.stats();
        stats.unknown_dropped == 1 && stats.malformed_dropped == 2
    })
    .await;

    assert_eq!(feed.handle.snapshot(), before);
    assert!(feed.handle.get("ZZZ").is_none());
    assert_eq!(feed.handle.resolve_link("stocks://symbol/ZZZ"), None);
    assert_eq!(feed.handle.resolve_link("stocks://symbol/A"), Some("A".to_string()));
}

#[tokio::test]
async fn test_malformed_frame_leaves_connection_open() {
    let feed = spawn_loopback(&three_symbols(), Duration::from_secs(3600)).unwrap();
    feed.handle.start().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();

    feed.transport.inject_frame("{broken");
    eventually(|| feed.handle.stats().malformed_dropped == 1).await;

    assert_eq!(feed.handle.state(), FeedState::Connected);
    assert!(feed.transport.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_drives_generator() {
    let feed = spawn_loopback(&default_universe(), TICK).unwrap();
    let mut state = feed.handle.watch_state();

    assert_eq!(feed.handle.start().await.unwrap(), FeedState::Connecting);
    state.changed().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();
    assert!(feed.generator.is_running());

    // A second start is ignored.
    assert_eq!(feed.handle.start().await.unwrap(), FeedState::Connected);
    assert_eq!(feed.transport.connect_calls(), 1);

    tokio::time::sleep(TICK * 5).await;
    let snapshot = feed.handle.snapshot();
    assert!(feed.handle.stats().applied >= 25);
    assert!(is_descending(&snapshot));

    feed.handle.stop().await.unwrap();
    feed.handle.wait_for_state(FeedState::Disconnected).await.unwrap();
    assert!(!feed.generator.is_running());

    // Nothing is emitted after the tick in which the disconnect landed.
    let applied = feed.handle.stats().applied;
    tokio::time::sleep(TICK * 5).await;
    assert_eq!(feed.handle.stats().applied, applied);
}

#[tokio::test(start_paused = true)]
async fn test_generator_mirror_matches_store_while_running() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    feed.handle.start().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();
    tokio::time::sleep(TICK * 3 + TICK / 2).await;
    feed.handle.stop().await.unwrap();
    feed.handle.wait_for_state(FeedState::Disconnected).await.unwrap();

    for (id, price) in feed.generator.mirror() {
        assert_eq!(feed.handle.get(&id).unwrap().current_price(), price, "{}", id);
    }
}

#[tokio::test]
async fn test_send_failure_becomes_disconnect() {
    let feed = spawn_loopback(&three_symbols(), Duration::from_secs(3600)).unwrap();
    feed.handle.start().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();

    feed.transport.set_send_failure(true);
    feed.transport.send(PriceMessage::new("A", Decimal::from(1)));

    feed.handle.wait_for_state(FeedState::Disconnected).await.unwrap();
    assert!(!feed.generator.is_running());

    // The feed can be started again once the fault clears.
    feed.transport.set_send_failure(false);
    assert_eq!(feed.handle.start().await.unwrap(), FeedState::Connecting);
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();
}

#[tokio::test]
async fn test_remote_drop_stops_generator() {
    let feed = spawn_loopback(&three_symbols(), Duration::from_secs(3600)).unwrap();
    feed.handle.start().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();

    feed.transport.drop_connection("peer reset");
    feed.handle.wait_for_state(FeedState::Disconnected).await.unwrap();
    assert!(!feed.generator.is_running());
}

#[tokio::test]
async fn test_shutdown_rejects_further_commands() {
    let feed = spawn_loopback(&three_symbols(), TICK).unwrap();
    feed.handle.start().await.unwrap();
    feed.handle.wait_for_state(FeedState::Connected).await.unwrap();
    feed.handle.shutdown().await;

    assert_eq!(feed.handle.state(), FeedState::Disconnected);
    assert!(!feed.generator.is_running());

    assert_eq!(feed.handle.start().await, Err(FeedError::SupervisorClosed));
    assert_eq!(feed.handle.stop().await, Err(FeedError::SupervisorClosed));
    // Readers keep working on the last state.
    assert_eq!(feed.handle.ranking(), ["A", "B", "C"]);
}
