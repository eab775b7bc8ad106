//! Integration tests for mission progression through the SQLite store.

use egyptour::geo::Coordinate;
use egyptour::journey::JourneyService;
use egyptour::missions::{Mission, MissionStatus, ProgressOutcome, Task, TaskKind, Trip};
use egyptour::storage::{Database, JourneyStore, RewardSettings};
use tempfile::TempDir;

fn mission(id: &str, day: u32, tasks: &[&str]) -> Mission {
    let mut m = Mission::new(id, day, id, Coordinate::new(29.98, 31.13)).with_rewards(100, 30);
    for task in tasks {
        m = m.with_task(Task::new(*task, TaskKind::Check, *task, 20));
    }
    m
}

fn three_mission_trip() -> Trip {
    Trip::with_id(
        "trip-1",
        "Test trip",
        2,
        vec![
            mission("m1", 1, &["a", "b"]),
            mission("m2", 1, &["c"]),
            mission("m3", 2, &["d"]),
        ],
    )
}

fn statuses(trip: &Trip) -> Vec<MissionStatus> {
    trip.missions.iter().map(|m| m.status).collect()
}

#[test]
fn test_end_to_end_progression() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    let trip = service.create_trip("u1", three_mission_trip()).unwrap();
    assert_eq!(
        statuses(&trip),
        vec![MissionStatus::Active, MissionStatus::Locked, MissionStatus::Locked]
    );
    assert_eq!(trip.progress_percent, 0);

    let first = service
        .set_task_completion("u1", "trip-1", "m1", "a", true)
        .unwrap();
    assert_eq!(first.trip.as_ref().unwrap().progress_percent, 0);
    assert_eq!(first.totals.map(|t| t.xp), Some(20));

    let update = service
        .set_task_completion("u1", "trip-1", "m1", "b", true)
        .unwrap();
    let trip = update.trip.unwrap();
    assert_eq!(
        statuses(&trip),
        vec![MissionStatus::Completed, MissionStatus::Active, MissionStatus::Locked]
    );
    assert_eq!(trip.progress_percent, 33);

    let update = service
        .set_task_completion("u1", "trip-1", "m2", "c", true)
        .unwrap();
    let trip = update.trip.unwrap();
    assert_eq!(
        statuses(&trip),
        vec![MissionStatus::Completed, MissionStatus::Completed, MissionStatus::Active]
    );
    assert_eq!(trip.progress_percent, 67);

    let update = service
        .set_task_completion("u1", "trip-1", "m3", "d", true)
        .unwrap();
    let change = update.outcome.change().unwrap();
    assert_eq!(change.completed_mission.as_deref(), Some("m3"));
    assert!(change.unlocked_mission.is_none());
    let trip = update.trip.unwrap();
    assert!(trip.is_finished());
    assert_eq!(trip.progress_percent, 100);

    let stats = service.stats("u1").unwrap().unwrap();
    assert_eq!(stats.missions_completed, 3);
    assert_eq!(stats.tasks_completed, 4);
    assert_eq!(stats.xp, 300 + 4 * 20);
    assert_eq!(stats.gold, 100 + 90);
    assert_eq!(stats.level, 4);
}

#[test]
fn test_progress_never_decreases_under_completions() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", three_mission_trip()).unwrap();

    let steps = [("m3", "d"), ("m1", "a"), ("m2", "c"), ("m1", "b"), ("m3", "d")];
    let mut last = 0;
    for (mission, task) in steps {
        service
            .set_task_completion("u1", "trip-1", mission, task, true)
            .unwrap();
        let progress = service.load_trip("u1").unwrap().unwrap().progress_percent;
        assert!(progress >= last);
        last = progress;
    }
    assert_eq!(last, 100);
}

#[test]
fn test_unknown_ids_leave_stored_trip_untouched() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", three_mission_trip()).unwrap();
    let before = service.load_trip("u1").unwrap();

    for (trip, mission, task) in [
        ("nope", "m1", "a"),
        ("trip-1", "nope", "a"),
        ("trip-1", "m1", "nope"),
    ] {
        let update = service
            .set_task_completion("u1", trip, mission, task, true)
            .unwrap();
        assert!(matches!(update.outcome, ProgressOutcome::NotFound(_)));
    }
    let update = service.start_mission("u1", "trip-1", "nope").unwrap();
    assert!(matches!(update.outcome, ProgressOutcome::NotFound(_)));

    assert_eq!(service.load_trip("u1").unwrap(), before);
}

#[test]
fn test_start_then_complete_out_of_order() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", three_mission_trip()).unwrap();

    let update = service.start_mission("u1", "trip-1", "m3").unwrap();
    assert_eq!(
        update.outcome.change().unwrap().started_mission.as_deref(),
        Some("m3")
    );

    // Completing m1 unlocks only its direct successor.
    service.set_task_completion("u1", "trip-1", "m1", "a", true).unwrap();
    let update = service
        .set_task_completion("u1", "trip-1", "m1", "b", true)
        .unwrap();
    assert_eq!(
        update.outcome.change().unwrap().unlocked_mission.as_deref(),
        Some("m2")
    );

    // Completing m2 finds m3 already active: nothing to unlock.
    let update = service
        .set_task_completion("u1", "trip-1", "m2", "c", true)
        .unwrap();
    assert!(update.outcome.change().unwrap().unlocked_mission.is_none());
}

#[test]
fn test_progress_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("egyptour.db");
    let settings = RewardSettings {
        starting_gold: 0,
        xp_per_level: 50,
    };

    {
        let db = Database::open(&path).unwrap().with_reward_settings(settings);
        let service = JourneyService::new(db);
        service.create_trip("u1", three_mission_trip()).unwrap();
        service.set_task_completion("u1", "trip-1", "m1", "a", true).unwrap();
        service.set_task_completion("u1", "trip-1", "m1", "b", true).unwrap();
    }

    let db = Database::open(&path).unwrap().with_reward_settings(settings);
    let trip = db.load_trip("u1").unwrap().unwrap();
    assert_eq!(trip.progress_percent, 33);
    assert_eq!(trip.missions[1].status, MissionStatus::Active);
    assert_eq!(trip.missions[0].tasks[1].id, "b");

    let stats = db.load_stats("u1").unwrap().unwrap();
    assert_eq!(stats.xp, 140);
    assert_eq!(stats.gold, 30);
    assert_eq!(stats.level, 3);
}

#[test]
fn test_reward_failure_rolls_back_completion() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", three_mission_trip()).unwrap();
    service.set_task_completion("u1", "trip-1", "m1", "a", true).unwrap();

    service
        .store()
        .connection()
        .execute_batch(
            "CREATE TRIGGER block_grants BEFORE UPDATE ON user_stats
             BEGIN SELECT RAISE(ABORT, 'grants offline'); END;",
        )
        .unwrap();
    assert!(service
        .set_task_completion("u1", "trip-1", "m1", "b", true)
        .is_err());

    let trip = service.load_trip("u1").unwrap().unwrap();
    assert_eq!(trip.missions[0].status, MissionStatus::Active);
    assert!(!trip.missions[0].tasks[1].completed);

    service
        .store()
        .connection()
        .execute_batch("DROP TRIGGER block_grants")
        .unwrap();
    let update = service
        .set_task_completion("u1", "trip-1", "m1", "b", true)
        .unwrap();
    assert_eq!(
        update.outcome.change().unwrap().completed_mission.as_deref(),
        Some("m1")
    );

    let stats = service.stats("u1").unwrap().unwrap();
    assert_eq!(stats.missions_completed, 1);
    assert_eq!(stats.xp, 20 + 20 + 100);
}
