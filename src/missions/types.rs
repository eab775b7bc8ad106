//! Trip, mission and task type definitions.
//!
//! Field names follow the persisted document shape, so a [`Trip`] written
//! by one client round-trips through the store unchanged.

use crate::geo::Coordinate;
use crate::rewards::{MISSION_COMPLETE_XP, TASK_COMPLETE_XP};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the traveller has to do to complete a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Capture a photo verified by the vision model
    Photo,
    /// Answer a quiz
    Quiz,
    /// Augmented-reality collection
    #[serde(alias = "ar-check")]
    Ar,
    /// Tick a checklist item
    #[serde(alias = "checklist")]
    Check,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Photo => f.pad("Photo"),
            TaskKind::Quiz => f.pad("Quiz"),
            TaskKind::Ar => f.pad("AR"),
            TaskKind::Check => f.pad("Checklist"),
        }
    }
}

/// A sub-step of a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub label: String,
    /// XP granted the first time the task is completed
    #[serde(rename = "xp", default = "default_task_xp")]
    pub reward_xp: u32,
    pub completed: bool,
    /// What a photo must show, for photo tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
}

impl Task {
    /// Create an incomplete task.
    pub fn new(id: impl Into<String>, kind: TaskKind, label: impl Into<String>, reward_xp: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            reward_xp,
            completed: false,
            requirement: None,
        }
    }

    /// Attach a photo requirement.
    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirement = Some(requirement.into());
        self
    }
}

/// Mission lifecycle: `Locked -> Active -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    #[default]
    Locked,
    Active,
    Completed,
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissionStatus::Locked => f.pad("locked"),
            MissionStatus::Active => f.pad("active"),
            MissionStatus::Completed => f.pad("completed"),
        }
    }
}

/// Mission difficulty as shown to the traveller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Where a mission takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionLocation {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    #[serde(default)]
    pub name: String,
}

/// A location-based objective composed of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    /// 1-based trip day
    #[serde(rename = "day")]
    pub day_index: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: MissionStatus,
    #[serde(rename = "xpReward", default = "default_mission_xp")]
    pub reward_xp: u32,
    #[serde(rename = "goldReward", default)]
    pub reward_gold: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    pub location: MissionLocation,
    /// Ordered; order is significant and preserved through the store
    pub tasks: Vec<Task>,
}

impl Mission {
    /// Create a locked mission with no tasks.
    pub fn new(id: impl Into<String>, day_index: u32, title: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id: id.into(),
            day_index,
            title: title.into(),
            description: String::new(),
            status: MissionStatus::Locked,
            reward_xp: 0,
            reward_gold: 0,
            difficulty: Difficulty::default(),
            image_url: String::new(),
            location: MissionLocation {
                coordinate: location,
                name: String::new(),
            },
            tasks: Vec::new(),
        }
    }

    /// Set XP and gold rewards.
    pub fn with_rewards(mut self, xp: u32, gold: u32) -> Self {
        self.reward_xp = xp;
        self.reward_gold = gold;
        self
    }

    /// Append a task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: MissionStatus) -> Self {
        self.status = status;
        self
    }

    /// Find a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Whether every task is completed. False for a mission with no tasks.
    pub fn all_tasks_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.completed)
    }

    /// Number of completed tasks.
    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn is_completed(&self) -> bool {
        self.status == MissionStatus::Completed
    }
}

/// The ordered collection of a traveller's missions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "days")]
    pub day_count: u32,
    /// Insertion order is display and unlock order
    pub missions: Vec<Mission>,
    /// Derived from mission states; see [`Trip::recompute_progress`]
    #[serde(rename = "progress")]
    pub progress_percent: u8,
}

impl Trip {
    /// Create a trip from missions. The first mission is activated if it is
    /// locked, and progress is derived from the mission states.
    pub fn new(title: impl Into<String>, day_count: u32, missions: Vec<Mission>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, day_count, missions)
    }

    /// Same as [`Trip::new`] with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        day_count: u32,
        mut missions: Vec<Mission>,
    ) -> Self {
        if let Some(first) = missions.first_mut() {
            if first.status == MissionStatus::Locked {
                first.status = MissionStatus::Active;
            }
        }

        let mut trip = Self {
            id: id.into(),
            title: title.into(),
            day_count: day_count.max(1),
            missions,
            progress_percent: 0,
        };
        trip.recompute_progress();
        trip
    }

    /// Find a mission by id.
    pub fn mission(&self, mission_id: &str) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == mission_id)
    }

    /// Position of a mission in the trip's sequence.
    pub fn mission_index(&self, mission_id: &str) -> Option<usize> {
        self.missions.iter().position(|m| m.id == mission_id)
    }

    /// Number of completed missions.
    pub fn completed_mission_count(&self) -> usize {
        self.missions.iter().filter(|m| m.is_completed()).count()
    }

    /// First mission currently active, if any.
    pub fn current_mission(&self) -> Option<&Mission> {
        self.missions
            .iter()
            .find(|m| m.status == MissionStatus::Active)
    }

    /// Whether every mission is completed.
    pub fn is_finished(&self) -> bool {
        !self.missions.is_empty() && self.missions.iter().all(|m| m.is_completed())
    }

    /// Recompute `progress_percent` as `round(100 * completed / total)`,
    /// or 0 for a trip without missions.
    pub fn recompute_progress(&mut self) -> u8 {
        self.progress_percent =
            progress_percent(self.completed_mission_count(), self.missions.len());
        self.progress_percent
    }
}

fn default_task_xp() -> u32 {
    TASK_COMPLETE_XP
}

fn default_mission_xp() -> u32 {
    MISSION_COMPLETE_XP
}

/// `round(100 * completed / total)` with halves rounded up; 0 when `total` is 0.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((200 * completed + total) / (2 * total)) as u8
}
