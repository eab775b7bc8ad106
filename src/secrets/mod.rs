//! Hidden secrets: geofenced bonus points of interest tied to missions.
//!
//! The catalog is immutable once built. Whether a user has discovered a
//! secret lives in the discovery ledger (see [`crate::storage::JourneyStore`]),
//! never on the [`Secret`] itself.

pub mod catalog;

pub use catalog::{CatalogError, SecretCatalog};

use crate::geo::{distance_meters, Coordinate};
use crate::rewards::{HIDDEN_SECRET_GOLD, HIDDEN_SECRET_XP};
use serde::{Deserialize, Serialize};

/// A hidden secret at a historical site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    /// Unique identifier
    pub id: String,
    /// Mission this secret belongs to
    pub mission_id: String,
    /// Display title
    pub title: String,
    /// Text revealed on discovery
    pub description: String,
    /// Hint shown before discovery
    #[serde(default)]
    pub hint: Option<String>,
    /// Center of the discovery zone
    pub location: Coordinate,
    /// Human-readable place name
    #[serde(default)]
    pub location_name: Option<String>,
    /// Discovery radius in meters (> 0)
    pub radius_meters: f64,
    /// XP granted on first discovery
    #[serde(default = "default_secret_xp")]
    pub xp_reward: u32,
    /// Gold granted on first discovery
    #[serde(default = "default_secret_gold")]
    pub gold_reward: u32,
    /// Share of visitors who find it, in percent
    #[serde(default)]
    pub rarity_percent: Option<u8>,
}

fn default_secret_xp() -> u32 {
    HIDDEN_SECRET_XP
}

fn default_secret_gold() -> u32 {
    HIDDEN_SECRET_GOLD
}

impl Secret {
    /// Distance from `position` to the secret's center, in meters.
    pub fn distance_from(&self, position: &Coordinate) -> f64 {
        distance_meters(position, &self.location)
    }

    /// Whether `position` is inside the discovery radius (inclusive).
    pub fn is_near(&self, position: &Coordinate) -> bool {
        self.distance_from(position) <= self.radius_meters
    }
}

/// Secrets whose discovery radius contains `position`.
pub fn secrets_near<'a>(position: &Coordinate, catalog: &'a [Secret]) -> Vec<&'a Secret> {
    catalog.iter().filter(|s| s.is_near(position)).collect()
}

/// Secrets attached to the given mission. No geometry involved.
pub fn secrets_for_mission<'a>(mission_id: &str, catalog: &'a [Secret]) -> Vec<&'a Secret> {
    catalog.iter().filter(|s| s.mission_id == mission_id).collect()
}

/// Closest secret to `position` accepted by `filter`, with its distance.
pub fn nearest<'a, F>(
    position: &Coordinate,
    catalog: &'a [Secret],
    mut filter: F,
) -> Option<(&'a Secret, f64)>
where
    F: FnMut(&Secret) -> bool,
{
    catalog
        .iter()
        .filter(|s| filter(s))
        .map(|s| (s, s.distance_from(position)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
