//! Secret catalog: the built-in table of hidden secrets plus TOML overrides.

use super::{nearest, secrets_for_mission, secrets_near, Secret};
use crate::geo::Coordinate;
use crate::rewards::{HIDDEN_SECRET_GOLD, HIDDEN_SECRET_XP};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

static BUILTIN_CATALOG: OnceLock<SecretCatalog> = OnceLock::new();

/// Immutable registry of hidden secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretCatalog {
    secrets: Vec<Secret>,
}

impl SecretCatalog {
    /// Build a catalog, rejecting duplicate ids and non-positive radii.
    pub fn new(secrets: Vec<Secret>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for secret in &secrets {
            if !seen.insert(secret.id.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate secret id '{}'",
                    secret.id
                )));
            }
            if !(secret.radius_meters > 0.0) {
                return Err(CatalogError::Invalid(format!(
                    "secret '{}' has non-positive radius {}",
                    secret.id, secret.radius_meters
                )));
            }
        }
        Ok(Self { secrets })
    }

    /// The shared built-in catalog, initialized on first use.
    pub fn builtin() -> &'static SecretCatalog {
        BUILTIN_CATALOG.get_or_init(|| SecretCatalog {
            secrets: builtin_secrets(),
        })
    }

    /// Parse a catalog from TOML (`[[secrets]]` array of tables).
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let parsed: SecretCatalog =
            toml::from_str(content).map_err(|e| CatalogError::ParseError(e.to_string()))?;
        Self::new(parsed.secrets)
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CatalogError::IoError(e.to_string()))?;
        let catalog = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} secrets from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// All secrets in catalog order.
    pub fn all(&self) -> &[Secret] {
        &self.secrets
    }

    /// Look up a secret by id.
    pub fn get(&self, id: &str) -> Option<&Secret> {
        self.secrets.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Secrets whose discovery radius contains `position`.
    pub fn secrets_near(&self, position: &Coordinate) -> Vec<&Secret> {
        secrets_near(position, &self.secrets)
    }

    /// Secrets attached to a mission.
    pub fn secrets_for_mission(&self, mission_id: &str) -> Vec<&Secret> {
        secrets_for_mission(mission_id, &self.secrets)
    }

    /// Closest secret accepted by `filter`, with its distance in meters.
    pub fn nearest<F>(&self, position: &Coordinate, filter: F) -> Option<(&Secret, f64)>
    where
        F: FnMut(&Secret) -> bool,
    {
        nearest(position, &self.secrets, filter)
    }

    /// Closest secret whose id is not in `discovered`.
    pub fn nearest_undiscovered(
        &self,
        position: &Coordinate,
        discovered: &[String],
    ) -> Option<(&Secret, f64)> {
        self.nearest(position, |s| !discovered.iter().any(|id| *id == s.id))
    }
}

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

fn builtin_secrets() -> Vec<Secret> {
    vec![
        Secret {
            id: "secret_pyramids_inscription".to_string(),
            mission_id: "mission_pyramids".to_string(),
            title: "The Hidden Wall Inscription".to_string(),
            description: "A hieroglyphic inscription on the eastern wall of the pyramids, \
                          more than 4000 years old."
                .to_string(),
            hint: Some("Walk 20 meters north of the pyramids and look along the wall".to_string()),
            location: Coordinate::new(29.9795, 31.1342),
            location_name: Some("Eastern wall of the pyramids".to_string()),
            radius_meters: 50.0,
            xp_reward: HIDDEN_SECRET_XP,
            gold_reward: HIDDEN_SECRET_GOLD,
            rarity_percent: Some(2),
        },
        Secret {
            id: "secret_sphinx_whisper".to_string(),
            mission_id: "mission_pyramids".to_string(),
            title: "The Sphinx's Whisper".to_string(),
            description: "Stand in the right spot beside the Sphinx and your voice echoes back."
                .to_string(),
            hint: Some("Approach the Sphinx from the left side".to_string()),
            location: Coordinate::new(29.9753, 31.1376),
            location_name: Some("Beside the Sphinx".to_string()),
            radius_meters: 30.0,
            xp_reward: 50,
            gold_reward: 20,
            rarity_percent: Some(5),
        },
        Secret {
            id: "secret_khan_coffee".to_string(),
            mission_id: "mission_khan".to_string(),
            title: "El Fishawy's Secret Table".to_string(),
            description: "The table where Naguib Mahfouz wrote his famous novels.".to_string(),
            hint: Some("Enter El Fishawy cafe and look for the corner table".to_string()),
            location: Coordinate::new(30.0475, 31.2623),
            location_name: Some("El Fishawy Cafe".to_string()),
            radius_meters: 10.0,
            xp_reward: 50,
            gold_reward: 15,
            rarity_percent: Some(10),
        },
        Secret {
            id: "secret_museum_hidden_chamber".to_string(),
            mission_id: "mission_museum".to_string(),
            title: "The Hidden Chamber".to_string(),
            description: "A secret passage to a little-known gallery of rare artifacts."
                .to_string(),
            hint: Some("Second floor, behind the statue of Ramesses".to_string()),
            location: Coordinate::new(29.9955, 31.1185),
            location_name: Some("Grand Egyptian Museum".to_string()),
            radius_meters: 15.0,
            xp_reward: 75,
            gold_reward: 30,
            rarity_percent: Some(1),
        },
        Secret {
            id: "secret_luxor_temple_inscription".to_string(),
            mission_id: "mission_luxor".to_string(),
            title: "The Lost Royal Inscription".to_string(),
            description: "A rare royal inscription from the reign of Ramesses II on a column \
                          of Luxor Temple."
                .to_string(),
            hint: Some("In the main court, check the third column from the left".to_string()),
            location: Coordinate::new(25.6994, 32.6392),
            location_name: Some("Luxor Temple".to_string()),
            radius_meters: 20.0,
            xp_reward: 60,
            gold_reward: 25,
            rarity_percent: Some(3),
        },
    ]
}
