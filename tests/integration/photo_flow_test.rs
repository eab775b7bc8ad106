//! Integration tests for photo verification feeding mission progress.

use egyptour::journey::{JourneyError, JourneyService};
use egyptour::missions::{default_trip, MissionStatus, DEFAULT_TRIP_ID};
use egyptour::storage::Database;
use egyptour::vision::{AnalysisRequest, PhotoAnalyzer, PhotoVerdict, RetryPolicy, VisionError};
use std::sync::Mutex;
use std::time::Duration;

/// Replays a scripted sequence of responses.
struct ScriptedAnalyzer {
    responses: Mutex<Vec<Result<PhotoVerdict, VisionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    fn new(mut responses: Vec<Result<PhotoVerdict, VisionError>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl PhotoAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PhotoVerdict, VisionError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(VisionError::ApiError("script exhausted".to_string())))
    }
}

fn accepted() -> Result<PhotoVerdict, VisionError> {
    Ok(PhotoVerdict {
        verified: true,
        confidence: 0.93,
        feedback: "All three pyramids are visible".to_string(),
    })
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        delay: Duration::from_millis(2),
        backoff_multiplier: 1.0,
    }
}

#[tokio::test]
async fn test_photo_verified_after_transient_failures() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", default_trip(3)).unwrap();

    let analyzer = ScriptedAnalyzer::new(vec![
        Err(VisionError::ServiceUnavailable),
        Err(VisionError::RateLimited),
        accepted(),
    ]);

    let submission = service
        .submit_photo(
            &analyzer,
            &policy(3),
            "u1",
            DEFAULT_TRIP_ID,
            "mission_pyramids",
            "t1",
            "aW1hZ2U=",
        )
        .await
        .unwrap();

    assert_eq!(analyzer.calls(), 3);
    assert!(analyzer.prompts.lock().unwrap()[0].contains("All three pyramids must be visible"));
    assert!(submission.verdict.unwrap().verified);

    let trip = service.load_trip("u1").unwrap().unwrap();
    assert!(trip.missions[0].task("t1").unwrap().completed);
}

#[tokio::test]
async fn test_retries_exhausted_leave_task_open() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", default_trip(3)).unwrap();

    let analyzer = ScriptedAnalyzer::new(vec![
        Err(VisionError::RateLimited),
        Err(VisionError::RateLimited),
        Err(VisionError::RateLimited),
        accepted(),
    ]);

    let result = service
        .submit_photo(
            &analyzer,
            &policy(2),
            "u1",
            DEFAULT_TRIP_ID,
            "mission_pyramids",
            "t1",
            "aW1hZ2U=",
        )
        .await;

    assert!(matches!(
        result,
        Err(JourneyError::Vision(VisionError::RateLimited))
    ));
    assert_eq!(analyzer.calls(), 3);

    let trip = service.load_trip("u1").unwrap().unwrap();
    assert!(!trip.missions[0].task("t1").unwrap().completed);
}

#[tokio::test]
async fn test_last_photo_completes_mission() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", default_trip(3)).unwrap();
    for task in ["t2", "t3", "t4"] {
        service
            .set_task_completion("u1", DEFAULT_TRIP_ID, "mission_pyramids", task, true)
            .unwrap();
    }

    let analyzer = ScriptedAnalyzer::new(vec![accepted()]);
    let submission = service
        .submit_photo(
            &analyzer,
            &RetryPolicy::none(),
            "u1",
            DEFAULT_TRIP_ID,
            "mission_pyramids",
            "t1",
            "aW1hZ2U=",
        )
        .await
        .unwrap();

    let update = submission.update;
    // Task XP for all four tasks plus the mission reward.
    assert_eq!(update.totals.unwrap().xp, 200);
    let trip = update.trip.unwrap();
    assert_eq!(trip.missions[0].status, MissionStatus::Completed);
    assert_eq!(trip.missions[1].status, MissionStatus::Active);
    assert_eq!(trip.progress_percent, 33);
}

#[tokio::test]
async fn test_non_photo_task_is_not_analyzed() {
    let service = JourneyService::new(Database::open_in_memory().unwrap());
    service.create_trip("u1", default_trip(3)).unwrap();

    let analyzer = ScriptedAnalyzer::new(vec![accepted()]);
    let submission = service
        .submit_photo(
            &analyzer,
            &RetryPolicy::none(),
            "u1",
            DEFAULT_TRIP_ID,
            "mission_pyramids",
            "t3",
            "aW1hZ2U=",
        )
        .await
        .unwrap();

    assert!(submission.verdict.is_none());
    assert_eq!(analyzer.calls(), 0);
}
