//! Secret discovery: proximity check, discovery ledger, one-time reward.

pub mod watcher;

pub use watcher::{LocationWatcher, WatchHandle};

use crate::geo::Coordinate;
use crate::rewards::{RewardGrant, RewardSource, UpdatedTotals};
use crate::secrets::{Secret, SecretCatalog};
use crate::storage::{JourneyStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A secret discovered for the first time by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub user_id: String,
    pub secret_id: String,
    pub mission_id: String,
    pub title: String,
    /// Text revealed on discovery
    pub description: String,
    /// Position that triggered the discovery
    pub position: Coordinate,
    pub xp: u32,
    pub gold: u32,
    /// User totals after the reward
    pub totals: UpdatedTotals,
}

/// Turns positions into discoveries and rewards.
pub struct DiscoveryService<S> {
    store: S,
    catalog: Arc<SecretCatalog>,
}

impl<S: JourneyStore> DiscoveryService<S> {
    pub fn new(store: S, catalog: Arc<SecretCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Service over the built-in catalog.
    pub fn with_builtin_catalog(store: S) -> Self {
        Self::new(store, Arc::new(SecretCatalog::builtin().clone()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &SecretCatalog {
        &self.catalog
    }

    /// Evaluate one position for `user_id`.
    ///
    /// Every secret in range is recorded in the ledger together with its
    /// reward in one store write. Only the call that created the record gets
    /// an event, so repeated or concurrent evaluations of the same position
    /// reward once, and a failed write leaves the secret undiscovered.
    pub fn process_position(
        &self,
        user_id: &str,
        position: &Coordinate,
    ) -> Result<Vec<DiscoveryEvent>, StoreError> {
        let in_range = self.catalog.secrets_near(position);
        tracing::debug!(
            "Position {} for {}: {} secret(s) in range",
            position,
            user_id,
            in_range.len()
        );

        let mut events = Vec::new();
        for secret in in_range {
            let grant = RewardGrant::new(
                secret.xp_reward,
                secret.gold_reward,
                RewardSource::SecretDiscovered(secret.id.clone()),
            );
            let Some(totals) = self
                .store
                .record_discovery_with_reward(user_id, &secret.id, &grant)?
            else {
                continue;
            };
            tracing::info!(
                "{} discovered secret {} (+{} XP, +{} gold)",
                user_id,
                secret.id,
                secret.xp_reward,
                secret.gold_reward
            );

            events.push(DiscoveryEvent {
                user_id: user_id.to_string(),
                secret_id: secret.id.clone(),
                mission_id: secret.mission_id.clone(),
                title: secret.title.clone(),
                description: secret.description.clone(),
                position: *position,
                xp: secret.xp_reward,
                gold: secret.gold_reward,
                totals,
            });
        }

        Ok(events)
    }

    /// Whether the user already found the secret.
    pub fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        self.store.is_discovered(user_id, secret_id)
    }

    /// Closest secret the user has not found yet, with its distance in meters.
    pub fn nearest_undiscovered(
        &self,
        user_id: &str,
        position: &Coordinate,
    ) -> Result<Option<(&Secret, f64)>, StoreError> {
        let found = self.store.discovered_secrets(user_id)?;
        Ok(self.catalog.nearest_undiscovered(position, &found))
    }
}
