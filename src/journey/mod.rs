//! Journey orchestration: load the trip, run the progress engine, persist,
//! and pay out task and mission rewards.
//!
//! Every mutation works on a copy of the stored trip. The copy and its
//! rewards are written in one store call and returned only once it has
//! succeeded, so a failed write leaves the caller with nothing but the
//! error and the store with its previous state.

use crate::missions::{self, MissingEntity, ProgressOutcome, TaskKind, Trip};
use crate::rewards::{RewardGrant, RewardSource, UpdatedTotals, UserStats};
use crate::storage::{JourneyStore, StoreError, Subscription, TripCallback};
use crate::vision::{
    retry_with_backoff, AnalysisRequest, PhotoAnalyzer, PhotoVerdict, RetryPolicy, VisionError,
};
use thiserror::Error;

/// Journey service errors.
#[derive(Debug, Error)]
pub enum JourneyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),
}

/// Result of a progress operation.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyUpdate {
    pub outcome: ProgressOutcome,
    /// Trip after the operation; `None` when the user has no trip
    pub trip: Option<Trip>,
    /// Totals after the rewards this update paid, if any
    pub totals: Option<UpdatedTotals>,
}

/// Result of a photo submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoSubmission {
    /// Model verdict; `None` when no analysis ran
    pub verdict: Option<PhotoVerdict>,
    pub update: JourneyUpdate,
}

/// Drives a user's trip through a [`JourneyStore`].
pub struct JourneyService<S> {
    store: S,
}

impl<S: JourneyStore> JourneyService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The user's current trip.
    pub fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, JourneyError> {
        Ok(self.store.load_trip(user_id)?)
    }

    /// Save `trip` as the user's active trip, replacing any previous one.
    pub fn create_trip(&self, user_id: &str, trip: Trip) -> Result<Trip, JourneyError> {
        self.store.save_trip(user_id, &trip)?;
        tracing::info!(
            "Created trip {} for {} ({} missions)",
            trip.id,
            user_id,
            trip.missions.len()
        );
        Ok(trip)
    }

    /// The user's trip, creating the default itinerary if there is none.
    pub fn ensure_trip(&self, user_id: &str, day_count: u32) -> Result<Trip, JourneyError> {
        match self.store.load_trip(user_id)? {
            Some(trip) => Ok(trip),
            None => self.create_trip(user_id, missions::default_trip(day_count)),
        }
    }

    /// Set a task's completion flag and persist the result.
    pub fn set_task_completion(
        &self,
        user_id: &str,
        trip_id: &str,
        mission_id: &str,
        task_id: &str,
        completed: bool,
    ) -> Result<JourneyUpdate, JourneyError> {
        self.apply(user_id, trip_id, |trip| {
            missions::set_task_completion(trip, mission_id, task_id, completed)
        })
    }

    /// Start a mission and persist the result.
    pub fn start_mission(
        &self,
        user_id: &str,
        trip_id: &str,
        mission_id: &str,
    ) -> Result<JourneyUpdate, JourneyError> {
        self.apply(user_id, trip_id, |trip| {
            missions::start_mission(trip, mission_id)
        })
    }

    /// Verify a photo for a photo task and complete the task if accepted.
    ///
    /// Rate-limited and unavailable responses are retried per `policy`;
    /// any other vision failure is returned without touching the trip.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_photo<A: PhotoAnalyzer>(
        &self,
        analyzer: &A,
        policy: &RetryPolicy,
        user_id: &str,
        trip_id: &str,
        mission_id: &str,
        task_id: &str,
        image_base64: &str,
    ) -> Result<PhotoSubmission, JourneyError> {
        let trip = self.store.load_trip(user_id)?;
        let lookup = match trip.as_ref().filter(|t| t.id == trip_id) {
            None => Err(MissingEntity::Trip(trip_id.to_string())),
            Some(trip) => match trip.mission(mission_id) {
                None => Err(MissingEntity::Mission(mission_id.to_string())),
                Some(mission) => mission.task(task_id).cloned().ok_or(MissingEntity::Task {
                    mission_id: mission_id.to_string(),
                    task_id: task_id.to_string(),
                }),
            },
        };

        let task = match lookup {
            Ok(task) => task,
            Err(missing) => {
                tracing::warn!("Photo submitted for unknown {}", missing);
                return Ok(PhotoSubmission {
                    verdict: None,
                    update: JourneyUpdate {
                        outcome: ProgressOutcome::NotFound(missing),
                        trip,
                        totals: None,
                    },
                });
            }
        };

        if task.kind != TaskKind::Photo {
            tracing::warn!("Task {} is not a photo task", task.id);
            return Ok(PhotoSubmission {
                verdict: None,
                update: JourneyUpdate {
                    outcome: ProgressOutcome::Unchanged,
                    trip,
                    totals: None,
                },
            });
        }

        let request = AnalysisRequest::for_task(&task, image_base64);
        let request = &request;
        let verdict = retry_with_backoff(policy, move || analyzer.analyze(request)).await?;
        tracing::info!(
            "Photo for task {} verified={} (confidence {:.2})",
            task.id,
            verdict.verified,
            verdict.confidence
        );

        let update = if verdict.verified {
            self.set_task_completion(user_id, trip_id, mission_id, task_id, true)?
        } else {
            JourneyUpdate {
                outcome: ProgressOutcome::Unchanged,
                trip,
                totals: None,
            }
        };

        Ok(PhotoSubmission {
            verdict: Some(verdict),
            update,
        })
    }

    /// Current totals, or `None` for a user who never earned anything.
    pub fn stats(&self, user_id: &str) -> Result<Option<UserStats>, JourneyError> {
        Ok(self.store.load_stats(user_id)?)
    }

    /// Receive the user's full trip after every saved change.
    pub fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription {
        self.store.subscribe_trip(user_id, callback)
    }

    fn apply<F>(&self, user_id: &str, trip_id: &str, op: F) -> Result<JourneyUpdate, JourneyError>
    where
        F: FnOnce(&mut Trip) -> ProgressOutcome,
    {
        let stored = self.store.load_trip(user_id)?;
        let Some(before) = stored.as_ref().filter(|t| t.id == trip_id) else {
            let missing = MissingEntity::Trip(trip_id.to_string());
            tracing::warn!("Ignoring update for unknown {} (user {})", missing, user_id);
            return Ok(JourneyUpdate {
                outcome: ProgressOutcome::NotFound(missing),
                trip: stored,
                totals: None,
            });
        };

        let mut trip = before.clone();
        let outcome = op(&mut trip);
        let change = match &outcome {
            ProgressOutcome::Updated(change) => change.clone(),
            ProgressOutcome::NotFound(missing) => {
                tracing::warn!("Ignoring update for unknown {} (user {})", missing, user_id);
                return Ok(JourneyUpdate {
                    outcome,
                    trip: stored,
                    totals: None,
                });
            }
            ProgressOutcome::Unchanged => {
                return Ok(JourneyUpdate {
                    outcome,
                    trip: stored,
                    totals: None,
                });
            }
        };

        let grants = rewards_for(before, &trip, change.completed_mission.as_deref());
        let totals = self.store.save_trip_with_rewards(user_id, &trip, &grants)?;
        tracing::debug!(
            "Saved trip {} for {}: progress {}% -> {}%",
            trip.id,
            user_id,
            change.progress_before,
            change.progress_after
        );

        if let Some(totals) = &totals {
            tracing::info!(
                "{} rewarded: {} XP, {} gold, level {}",
                user_id,
                totals.xp,
                totals.gold,
                totals.level
            );
        }

        Ok(JourneyUpdate {
            outcome,
            trip: Some(trip),
            totals,
        })
    }
}

/// Rewards earned by moving from `before` to `after`: each task newly
/// ticked, plus the mission that just completed. Task rewards are claimed in
/// the store, so unticking and ticking again pays nothing.
fn rewards_for(before: &Trip, after: &Trip, completed_mission: Option<&str>) -> Vec<RewardGrant> {
    let mut grants = Vec::new();

    for mission in &after.missions {
        let previous = before.mission(&mission.id);
        for task in mission.tasks.iter().filter(|t| t.completed) {
            let was_completed = previous
                .and_then(|m| m.task(&task.id))
                .is_some_and(|t| t.completed);
            if was_completed {
                continue;
            }
            let grant = RewardGrant::new(
                task.reward_xp,
                0,
                RewardSource::TaskCompleted {
                    trip_id: after.id.clone(),
                    mission_id: mission.id.clone(),
                    task_id: task.id.clone(),
                },
            );
            if !grant.is_empty() {
                grants.push(grant);
            }
        }
    }

    if let Some(mission) = completed_mission.and_then(|id| after.mission(id)) {
        grants.push(RewardGrant::new(
            mission.reward_xp,
            mission.reward_gold,
            RewardSource::MissionCompleted(mission.id.clone()),
        ));
    }

    grants
}
