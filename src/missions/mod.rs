//! Trips, missions and tasks.
//!
//! - `types`: the persisted Trip/Mission/Task aggregate
//! - `engine`: task completion, mission start/unlock, progress recomputation
//! - `templates`: built-in itinerary and generated-trip normalization

pub mod engine;
pub mod templates;
pub mod types;

pub use engine::{
    set_task_completion, start_mission, MissingEntity, ProgressChange, ProgressOutcome,
};
pub use templates::{default_trip, trip_from_generated, DEFAULT_TRIP_ID};
pub use types::{
    progress_percent, Difficulty, Mission, MissionLocation, MissionStatus, Task, TaskKind, Trip,
};
