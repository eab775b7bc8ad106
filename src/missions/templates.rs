//! Built-in itineraries and normalization of generated ones.

use super::types::{Difficulty, Mission, MissionStatus, Task, TaskKind, Trip};
use crate::geo::Coordinate;
use crate::rewards::MISSION_COMPLETE_XP;

/// Id used for the built-in itinerary.
pub const DEFAULT_TRIP_ID: &str = "default_trip";

/// The "Historic Cairo" itinerary used when no generated trip is available.
pub fn default_trip(day_count: u32) -> Trip {
    let mut pyramids = Mission::new(
        "mission_pyramids",
        1,
        "Pyramids of Giza",
        Coordinate::new(29.9792, 31.1342),
    )
    .with_rewards(MISSION_COMPLETE_XP, 30)
    .with_task(
        Task::new("t1", TaskKind::Photo, "Photograph the three pyramids", 30)
            .with_requirement("All three pyramids must be visible in the photo"),
    )
    .with_task(Task::new("t2", TaskKind::Ar, "Collect the hieroglyph symbols", 25))
    .with_task(Task::new("t3", TaskKind::Quiz, "Pyramid history quiz", 20))
    .with_task(Task::new("t4", TaskKind::Check, "Visit the Sphinx", 25));
    pyramids.description = "Explore the last standing wonder of the ancient world".to_string();
    pyramids.location.name = "Giza Plateau".to_string();

    let mut khan = Mission::new(
        "mission_khan",
        1,
        "Khan el-Khalili",
        Coordinate::new(30.0477, 31.2625),
    )
    .with_rewards(80, 25)
    .with_task(Task::new("t5", TaskKind::Photo, "Photograph Bab al-Ghuri", 20))
    .with_task(Task::new("t6", TaskKind::Check, "Drink coffee at El Fishawy", 30))
    .with_task(Task::new("t7", TaskKind::Quiz, "Bazaar history quiz", 30));
    khan.description = "Wander the oldest bazaar in the East".to_string();
    khan.difficulty = Difficulty::Easy;
    khan.location.name = "Khan el-Khalili".to_string();

    let mut museum = Mission::new(
        "mission_museum",
        2,
        "Grand Egyptian Museum",
        Coordinate::new(29.9958, 31.1181),
    )
    .with_rewards(120, 40)
    .with_task(Task::new("t8", TaskKind::Photo, "The mask of Tutankhamun", 40))
    .with_task(Task::new("t9", TaskKind::Ar, "Collect the symbols of the gods", 35))
    .with_task(Task::new("t10", TaskKind::Quiz, "Egyptian antiquities quiz", 25))
    .with_task(Task::new("t11", TaskKind::Check, "See the royal mummies", 20));
    museum.description = "Discover the treasures of Tutankhamun".to_string();
    museum.location.name = "Grand Egyptian Museum".to_string();

    Trip::with_id(
        DEFAULT_TRIP_ID,
        "Historic Cairo Adventure",
        day_count,
        vec![pyramids, khan, museum],
    )
}

/// Parse an itinerary produced by the trip planner into a fresh trip.
///
/// Generated documents cannot be trusted to start in a consistent state:
/// every task is reset, every mission is locked except the first, and
/// progress is recomputed.
pub fn trip_from_generated(json: &str) -> Result<Trip, serde_json::Error> {
    let generated: Trip = serde_json::from_str(json)?;

    let missions = generated
        .missions
        .into_iter()
        .map(|mut mission| {
            mission.status = MissionStatus::Locked;
            for task in &mut mission.tasks {
                task.completed = false;
            }
            mission
        })
        .collect();

    let id = if generated.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        generated.id
    };

    Ok(Trip::with_id(id, generated.title, generated.day_count, missions))
}
