//! Mission/task progress engine.
//!
//! Pure state transitions over a [`Trip`]. Every operation recomputes
//! `progress_percent` before returning. Unknown mission or task ids leave
//! the trip untouched and are reported as [`ProgressOutcome::NotFound`]
//! rather than as errors.

use super::types::{MissionStatus, Trip};

/// Which referenced entity could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingEntity {
    Trip(String),
    Mission(String),
    Task { mission_id: String, task_id: String },
}

impl std::fmt::Display for MissingEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingEntity::Trip(id) => write!(f, "trip '{}'", id),
            MissingEntity::Mission(id) => write!(f, "mission '{}'", id),
            MissingEntity::Task {
                mission_id,
                task_id,
            } => write!(f, "task '{}' in mission '{}'", task_id, mission_id),
        }
    }
}

/// What a mutation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressChange {
    /// A task's completion flag flipped
    pub task_changed: bool,
    /// Mission that was started by this call
    pub started_mission: Option<String>,
    /// Mission that transitioned into `Completed`
    pub completed_mission: Option<String>,
    /// Following mission moved from `Locked` to `Active`
    pub unlocked_mission: Option<String>,
    pub progress_before: u8,
    pub progress_after: u8,
}

/// Result of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// Referenced entity does not exist; nothing was modified
    NotFound(MissingEntity),
    /// Entity found but the call had nothing to do
    Unchanged,
    /// State was modified
    Updated(ProgressChange),
}

impl ProgressOutcome {
    /// Whether the trip was modified.
    pub fn is_updated(&self) -> bool {
        matches!(self, ProgressOutcome::Updated(_))
    }

    /// The change, if any.
    pub fn change(&self) -> Option<&ProgressChange> {
        match self {
            ProgressOutcome::Updated(change) => Some(change),
            _ => None,
        }
    }
}

/// Set a task's completion flag.
///
/// Completing the last open task of a mission completes the mission and
/// unlocks the next one in sequence. This never starts a mission.
pub fn set_task_completion(
    trip: &mut Trip,
    mission_id: &str,
    task_id: &str,
    completed: bool,
) -> ProgressOutcome {
    let Some(index) = trip.mission_index(mission_id) else {
        return ProgressOutcome::NotFound(MissingEntity::Mission(mission_id.to_string()));
    };

    let progress_before = trip.progress_percent;
    let mission = &mut trip.missions[index];

    let Some(task) = mission.tasks.iter_mut().find(|t| t.id == task_id) else {
        return ProgressOutcome::NotFound(MissingEntity::Task {
            mission_id: mission_id.to_string(),
            task_id: task_id.to_string(),
        });
    };

    let task_changed = task.completed != completed;
    task.completed = completed;

    let mut change = ProgressChange {
        task_changed,
        progress_before,
        ..Default::default()
    };

    if completed && !mission.is_completed() && mission.all_tasks_completed() {
        mission.status = MissionStatus::Completed;
        tracing::info!("Mission {} completed", mission.id);
        change.completed_mission = Some(mission.id.clone());
        change.unlocked_mission = unlock_next(trip, index);
    }

    change.progress_after = trip.recompute_progress();
    finish(change)
}

/// Start a mission. Valid from `Locked`; a no-op when already `Active`.
///
/// A completed mission is never moved back.
pub fn start_mission(trip: &mut Trip, mission_id: &str) -> ProgressOutcome {
    let Some(index) = trip.mission_index(mission_id) else {
        return ProgressOutcome::NotFound(MissingEntity::Mission(mission_id.to_string()));
    };

    let mut change = ProgressChange {
        progress_before: trip.progress_percent,
        ..Default::default()
    };

    let mission = &mut trip.missions[index];
    match mission.status {
        MissionStatus::Locked => {
            mission.status = MissionStatus::Active;
            tracing::info!("Mission {} started", mission.id);
            change.started_mission = Some(mission.id.clone());
        }
        MissionStatus::Active => {}
        MissionStatus::Completed => {
            tracing::debug!("Mission {} already completed, not restarting", mission.id);
        }
    }

    change.progress_after = trip.recompute_progress();
    finish(change)
}

/// Activate the mission following `index` if it is locked.
///
/// "Next" is the next position in the trip's list, not the next day.
fn unlock_next(trip: &mut Trip, index: usize) -> Option<String> {
    let next = trip.missions.get_mut(index + 1)?;
    if next.status != MissionStatus::Locked {
        return None;
    }
    next.status = MissionStatus::Active;
    tracing::info!("Mission {} unlocked", next.id);
    Some(next.id.clone())
}

fn finish(change: ProgressChange) -> ProgressOutcome {
    let modified = change.task_changed
        || change.started_mission.is_some()
        || change.completed_mission.is_some()
        || change.progress_before != change.progress_after;
    if modified {
        ProgressOutcome::Updated(change)
    } else {
        ProgressOutcome::Unchanged
    }
}
