//! Integration tests for geofenced secret discovery.

use egyptour::discovery::DiscoveryService;
use egyptour::geo::{distance_meters, Coordinate};
use egyptour::secrets::{Secret, SecretCatalog};
use egyptour::storage::{Database, JourneyStore, MemoryStore};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tempfile::TempDir;

const WALL: Coordinate = Coordinate::new(29.9795, 31.1342);

fn single_secret_catalog(radius: f64) -> Arc<SecretCatalog> {
    let secret = Secret {
        id: "s".to_string(),
        mission_id: "mission_pyramids".to_string(),
        title: "Wall inscription".to_string(),
        description: "Ancient text".to_string(),
        hint: None,
        location: WALL,
        location_name: None,
        radius_meters: radius,
        xp_reward: 50,
        gold_reward: 25,
        rarity_percent: Some(12),
    };
    Arc::new(SecretCatalog::new(vec![secret]).unwrap())
}

#[test]
fn test_geofence_scenario() {
    let service = DiscoveryService::new(MemoryStore::new(), single_secret_catalog(50.0));

    // ~1000 m north of the secret
    let away = Coordinate::new(29.9795 + 0.009, 31.1342);
    assert!(distance_meters(&WALL, &away) > 990.0);
    assert!(service.process_position("u1", &away).unwrap().is_empty());

    let events = service.process_position("u1", &WALL).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].secret_id, "s");
}

#[test]
fn test_radius_boundary_is_inclusive() {
    let observer = Coordinate::new(29.9795 + 0.0004, 31.1342);
    let exact = distance_meters(&observer, &WALL);

    let inside = DiscoveryService::new(MemoryStore::new(), single_secret_catalog(exact));
    assert_eq!(inside.process_position("u1", &observer).unwrap().len(), 1);

    let outside = DiscoveryService::new(MemoryStore::new(), single_secret_catalog(exact - 1e-6));
    assert!(outside.process_position("u1", &observer).unwrap().is_empty());
}

#[test]
fn test_discovery_is_idempotent_in_sqlite() {
    let service = DiscoveryService::new(Database::open_in_memory().unwrap(), single_secret_catalog(50.0));

    assert_eq!(service.process_position("u1", &WALL).unwrap().len(), 1);
    assert!(service.process_position("u1", &WALL).unwrap().is_empty());
    assert!(service.is_discovered("u1", "s").unwrap());

    let stats = service.store().load_stats("u1").unwrap().unwrap();
    assert_eq!(stats.xp, 50);
    assert_eq!(stats.gold, 125);
    assert_eq!(stats.secrets_found, 1);
}

#[test]
fn test_concurrent_evaluations_reward_once() {
    let store = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let service = Arc::new(DiscoveryService::new(store.clone(), single_secret_catalog(50.0)));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.process_position("u1", &WALL).unwrap().len()
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 1);

    let stats = store.load_stats("u1").unwrap().unwrap();
    assert_eq!(stats.xp, 50);
    assert_eq!(stats.secrets_found, 1);
}

#[test]
fn test_concurrent_memory_store_rewards_once() {
    let service = Arc::new(DiscoveryService::new(
        Arc::new(MemoryStore::new()),
        single_secret_catalog(50.0),
    ));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                service.process_position("u1", &WALL).unwrap().len()
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 1);
    assert_eq!(
        service.store().load_stats("u1").unwrap().unwrap().secrets_found,
        1
    );
}

#[test]
fn test_separate_connections_record_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("egyptour.db");

    // Open sequentially so only one connection runs the migration.
    let connections: Vec<Database> = (0..4).map(|_| Database::open(&path).unwrap()).collect();
    let barrier = Arc::new(Barrier::new(connections.len()));

    let handles: Vec<_> = connections
        .into_iter()
        .map(|db| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                db.record_discovery("u1", "s").unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|inserted| *inserted)
        .count();
    assert_eq!(created, 1);

    let db = Database::open(&path).unwrap();
    assert_eq!(db.discovered_secrets("u1").unwrap(), vec!["s".to_string()]);
    assert!(db.discovered_at("u1", "s").unwrap().is_some());
}

#[test]
fn test_builtin_catalog_tour() {
    let service = DiscoveryService::with_builtin_catalog(MemoryStore::new());
    let stops = [
        Coordinate::new(29.9795, 31.1342),
        Coordinate::new(29.9753, 31.1376),
        Coordinate::new(30.0475, 31.2623),
        Coordinate::new(29.9955, 31.1185),
        Coordinate::new(25.6994, 32.6392),
    ];

    let mut found = 0;
    for stop in &stops {
        found += service.process_position("u1", stop).unwrap().len();
    }
    assert_eq!(found, 5);
    assert!(service.nearest_undiscovered("u1", &stops[0]).unwrap().is_none());

    let stats = service.store().load_stats("u1").unwrap().unwrap();
    assert_eq!(stats.secrets_found, 5);
}
