//! Integration tests for the async location-watch loop.

use egyptour::discovery::{DiscoveryService, LocationWatcher};
use egyptour::geo::Coordinate;
use egyptour::storage::{Database, JourneyStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_walk_past_the_pyramids() {
    let store = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let service = Arc::new(DiscoveryService::with_builtin_catalog(store.clone()));
    let (tx, rx) = mpsc::channel(4);
    let (handle, events) = LocationWatcher::spawn(service, "walker", rx);

    // Approach from the north, linger at the wall, then visit the Sphinx.
    let path = [
        Coordinate::new(29.9900, 31.1342),
        Coordinate::new(29.9850, 31.1342),
        Coordinate::new(29.9796, 31.1342),
        Coordinate::new(29.9795, 31.1342),
        Coordinate::new(29.9753, 31.1376),
    ];
    for position in path {
        tx.send(position).await.unwrap();
    }
    drop(tx);
    handle.finished().await;

    let discovered: Vec<_> = events.try_iter().collect();
    assert_eq!(discovered.len(), 2);
    assert_eq!(discovered[0].secret_id, "secret_pyramids_inscription");
    assert_eq!(discovered[1].secret_id, "secret_sphinx_whisper");
    assert_eq!(discovered[1].totals.xp, 100);

    let stats = store.load_stats("walker").unwrap().unwrap();
    assert_eq!(stats.secrets_found, 2);
}

#[tokio::test]
async fn test_cancel_releases_stream() {
    let service = Arc::new(DiscoveryService::with_builtin_catalog(
        Database::open_in_memory().map(Mutex::new).unwrap(),
    ));
    let (tx, rx) = mpsc::channel::<Coordinate>(4);
    let (handle, events) = LocationWatcher::spawn(service, "walker", rx);

    handle.cancel();
    tokio::time::timeout(Duration::from_secs(1), tx.closed())
        .await
        .unwrap();
    assert!(tx.send(Coordinate::new(29.9795, 31.1342)).await.is_err());
    assert!(events.try_recv().is_err());
}
