//! Integration tests for real-time trip subscriptions.

use egyptour::journey::JourneyService;
use egyptour::missions::{default_trip, Trip, DEFAULT_TRIP_ID};
use egyptour::storage::{Database, JourneyStore, MemoryStore};
use std::sync::{Arc, Mutex};

#[test]
fn test_subscriber_receives_full_trip_after_each_save() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let subscription = service.subscribe_trip(
        "u1",
        Box::new(move |trip: &Trip| sink.lock().unwrap().push(trip.progress_percent)),
    );

    service.create_trip("u1", default_trip(3)).unwrap();
    for task in ["t1", "t2", "t3", "t4"] {
        service
            .set_task_completion("u1", DEFAULT_TRIP_ID, "mission_pyramids", task, true)
            .unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![0, 0, 0, 0, 33]);

    subscription.unsubscribe();
    service.start_mission("u1", DEFAULT_TRIP_ID, "mission_museum").unwrap();
    assert_eq!(seen.lock().unwrap().len(), 5);
}

#[test]
fn test_failed_updates_are_not_published() {
    let store = MemoryStore::new();
    store.save_trip("u1", &default_trip(3)).unwrap();
    let service = JourneyService::new(store);

    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let _subscription = service.subscribe_trip(
        "u1",
        Box::new(move |_: &Trip| *sink.lock().unwrap() += 1),
    );

    // Unknown ids and no-op updates do not save.
    service
        .set_task_completion("u1", DEFAULT_TRIP_ID, "mission_pyramids", "nope", true)
        .unwrap();
    service
        .start_mission("u1", DEFAULT_TRIP_ID, "mission_pyramids")
        .unwrap();
    assert_eq!(*count.lock().unwrap(), 0);

    service.store().set_available(false);
    assert!(service
        .set_task_completion("u1", DEFAULT_TRIP_ID, "mission_pyramids", "t1", true)
        .is_err());
    assert_eq!(*count.lock().unwrap(), 0);
}

#[test]
fn test_subscriptions_are_per_user() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    let hits = Arc::new(Mutex::new(Vec::new()));

    let sink = hits.clone();
    let _sub = service.subscribe_trip(
        "u2",
        Box::new(move |trip: &Trip| sink.lock().unwrap().push(trip.id.clone())),
    );

    service.create_trip("u1", default_trip(1)).unwrap();
    assert!(hits.lock().unwrap().is_empty());

    service.create_trip("u2", default_trip(1)).unwrap();
    assert_eq!(*hits.lock().unwrap(), vec![DEFAULT_TRIP_ID.to_string()]);
}

#[test]
fn test_dropping_handle_unsubscribes() {
    let db = Database::open_in_memory().unwrap();
    let count = Arc::new(Mutex::new(0));
    {
        let sink = count.clone();
        let _sub = db.subscribe_trip("u1", Box::new(move |_: &Trip| *sink.lock().unwrap() += 1));
        db.save_trip("u1", &default_trip(1)).unwrap();
    }
    db.save_trip("u1", &default_trip(1)).unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}
