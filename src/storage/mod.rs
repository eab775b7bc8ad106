//! Storage module for persistence, configuration and subscriptions.
//!
//! [`JourneyStore`] is the document-store contract the rest of the crate
//! depends on. [`Database`] backs it with SQLite; [`MemoryStore`] keeps
//! everything in process.

pub mod config;
pub mod database;
pub mod memory;
pub mod schema;
pub mod subscription;

pub use config::{AppConfig, ConfigError, RewardSettings, TrackingSettings, VisionSettings};
pub use database::Database;
pub use memory::MemoryStore;
pub use subscription::{SnapshotHub, Subscription};

use crate::missions::Trip;
use crate::rewards::{RewardGrant, UpdatedTotals, UserStats};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Callback receiving the full trip after each saved change.
pub type TripCallback = Box<dyn Fn(&Trip) + Send + Sync>;

/// Persistence contract for trips, the discovery ledger and reward totals.
pub trait JourneyStore {
    /// Current trip for the user, or `None` if none was saved.
    fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, StoreError>;

    /// Whole-document upsert of the user's trip. Subscribers are notified
    /// after the write succeeds.
    fn save_trip(&self, user_id: &str, trip: &Trip) -> Result<(), StoreError>;

    /// Save the trip and apply `grants` as one atomic write.
    ///
    /// A grant whose [`claim_key`](crate::rewards::RewardSource::claim_key)
    /// is already in the claim ledger is skipped. Returns the totals after
    /// the last applied grant, or `None` if none applied. Subscribers are
    /// notified only after the write commits.
    fn save_trip_with_rewards(
        &self,
        user_id: &str,
        trip: &Trip,
        grants: &[RewardGrant],
    ) -> Result<Option<UpdatedTotals>, StoreError>;

    /// Whether the user has discovered the secret.
    fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError>;

    /// Atomically record a discovery if absent.
    ///
    /// Returns `true` only for the call that created the record; every
    /// later or concurrent call for the same pair returns `false`.
    fn record_discovery(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError>;

    /// Record a discovery and pay its reward as one atomic write.
    ///
    /// Returns the new totals for the call that created the record and
    /// `None` when the secret was already discovered. On error neither the
    /// record nor the reward is kept.
    fn record_discovery_with_reward(
        &self,
        user_id: &str,
        secret_id: &str,
        grant: &RewardGrant,
    ) -> Result<Option<UpdatedTotals>, StoreError>;

    /// Ids of every secret the user has discovered.
    fn discovered_secrets(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Add a reward to the user's totals, creating them if needed.
    fn grant_reward(&self, user_id: &str, grant: &RewardGrant)
        -> Result<UpdatedTotals, StoreError>;

    /// Current totals, or `None` for a user who never earned anything.
    fn load_stats(&self, user_id: &str) -> Result<Option<UserStats>, StoreError>;

    /// Receive the user's trip after every successful save.
    ///
    /// Callbacks run synchronously inside `save_trip` and must not call back
    /// into the store.
    fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription;
}

impl<S: JourneyStore + ?Sized> JourneyStore for Arc<S> {
    fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, StoreError> {
        (**self).load_trip(user_id)
    }

    fn save_trip(&self, user_id: &str, trip: &Trip) -> Result<(), StoreError> {
        (**self).save_trip(user_id, trip)
    }

    fn save_trip_with_rewards(
        &self,
        user_id: &str,
        trip: &Trip,
        grants: &[RewardGrant],
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        (**self).save_trip_with_rewards(user_id, trip, grants)
    }

    fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        (**self).is_discovered(user_id, secret_id)
    }

    fn record_discovery(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        (**self).record_discovery(user_id, secret_id)
    }

    fn record_discovery_with_reward(
        &self,
        user_id: &str,
        secret_id: &str,
        grant: &RewardGrant,
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        (**self).record_discovery_with_reward(user_id, secret_id, grant)
    }

    fn discovered_secrets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        (**self).discovered_secrets(user_id)
    }

    fn grant_reward(
        &self,
        user_id: &str,
        grant: &RewardGrant,
    ) -> Result<UpdatedTotals, StoreError> {
        (**self).grant_reward(user_id, grant)
    }

    fn load_stats(&self, user_id: &str) -> Result<Option<UserStats>, StoreError> {
        (**self).load_stats(user_id)
    }

    fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription {
        (**self).subscribe_trip(user_id, callback)
    }
}

/// Serializes access to a store that is not itself `Sync`, such as a
/// single SQLite connection shared with the location watcher.
impl<S: JourneyStore> JourneyStore for Mutex<S> {
    fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, StoreError> {
        lock(self)?.load_trip(user_id)
    }

    fn save_trip(&self, user_id: &str, trip: &Trip) -> Result<(), StoreError> {
        lock(self)?.save_trip(user_id, trip)
    }

    fn save_trip_with_rewards(
        &self,
        user_id: &str,
        trip: &Trip,
        grants: &[RewardGrant],
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        lock(self)?.save_trip_with_rewards(user_id, trip, grants)
    }

    fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        lock(self)?.is_discovered(user_id, secret_id)
    }

    fn record_discovery(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        lock(self)?.record_discovery(user_id, secret_id)
    }

    fn record_discovery_with_reward(
        &self,
        user_id: &str,
        secret_id: &str,
        grant: &RewardGrant,
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        lock(self)?.record_discovery_with_reward(user_id, secret_id, grant)
    }

    fn discovered_secrets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        lock(self)?.discovered_secrets(user_id)
    }

    fn grant_reward(
        &self,
        user_id: &str,
        grant: &RewardGrant,
    ) -> Result<UpdatedTotals, StoreError> {
        lock(self)?.grant_reward(user_id, grant)
    }

    fn load_stats(&self, user_id: &str) -> Result<Option<UserStats>, StoreError> {
        lock(self)?.load_stats(user_id)
    }

    fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscribe_trip(user_id, callback)
    }
}

fn lock<S>(mutex: &Mutex<S>) -> Result<std::sync::MutexGuard<'_, S>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
