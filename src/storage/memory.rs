//! In-process [`JourneyStore`] for tests and ephemeral sessions.

use crate::missions::Trip;
use crate::rewards::{RewardGrant, UpdatedTotals, UserStats};
use crate::storage::config::RewardSettings;
use crate::storage::subscription::{SnapshotHub, Subscription};
use crate::storage::{JourneyStore, StoreError, TripCallback};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    trips: HashMap<String, Trip>,
    discoveries: HashMap<String, Vec<String>>,
    stats: HashMap<String, UserStats>,
    /// `(user_id, claim_key)`
    claims: HashSet<(String, String)>,
}

/// Store keeping every document in memory.
///
/// `set_available(false)` makes every call fail with
/// [`StoreError::Unavailable`]; `set_rewards_available(false)` fails only
/// writes that pay a reward. Both exercise error paths.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    rewards: RewardSettings,
    available: AtomicBool,
    rewards_available: AtomicBool,
    trip_feed: SnapshotHub<Trip>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_reward_settings(RewardSettings::default())
    }

    pub fn with_reward_settings(rewards: RewardSettings) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            rewards,
            available: AtomicBool::new(true),
            rewards_available: AtomicBool::new(true),
            trip_feed: SnapshotHub::new(),
        }
    }

    /// Simulate the backing service going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Simulate the reward ledger failing while everything else works.
    pub fn set_rewards_available(&self, available: bool) {
        self.rewards_available.store(available, Ordering::SeqCst);
    }

    fn check_rewards(&self) -> Result<(), StoreError> {
        if self.rewards_available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("reward ledger offline".to_string()))
        }
    }

    /// Copy of the user's totals, or fresh ones for a new user.
    fn current_stats(&self, state: &MemoryState, user_id: &str) -> UserStats {
        state
            .stats
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserStats::new(user_id, self.rewards.starting_gold))
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JourneyStore for MemoryStore {
    fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, StoreError> {
        let mut trip = self.state()?.trips.get(user_id).cloned();
        if let Some(trip) = trip.as_mut() {
            trip.recompute_progress();
        }
        Ok(trip)
    }

    fn save_trip(&self, user_id: &str, trip: &Trip) -> Result<(), StoreError> {
        self.state()?
            .trips
            .insert(user_id.to_string(), trip.clone());
        self.trip_feed.publish(user_id, trip);
        Ok(())
    }

    fn save_trip_with_rewards(
        &self,
        user_id: &str,
        trip: &Trip,
        grants: &[RewardGrant],
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        let totals = {
            let mut state = self.state()?;

            // Stage everything first so a failure leaves the state untouched.
            let mut claims = Vec::new();
            let mut stats: Option<UserStats> = None;
            for grant in grants {
                if let Some(key) = grant.source.claim_key() {
                    let claim = (user_id.to_string(), key);
                    if state.claims.contains(&claim) || claims.contains(&claim) {
                        continue;
                    }
                    claims.push(claim);
                }
                self.check_rewards()?;
                stats
                    .get_or_insert_with(|| self.current_stats(&state, user_id))
                    .apply(grant, self.rewards.xp_per_level);
            }

            state.trips.insert(user_id.to_string(), trip.clone());
            state.claims.extend(claims);
            stats.map(|stats| {
                let totals = stats.totals();
                state.stats.insert(user_id.to_string(), stats);
                totals
            })
        };

        self.trip_feed.publish(user_id, trip);
        Ok(totals)
    }

    fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .state()?
            .discoveries
            .get(user_id)
            .is_some_and(|ids| ids.iter().any(|id| id == secret_id)))
    }

    fn record_discovery(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        let ids = state.discoveries.entry(user_id.to_string()).or_default();
        if ids.iter().any(|id| id == secret_id) {
            return Ok(false);
        }
        ids.push(secret_id.to_string());
        Ok(true)
    }

    fn record_discovery_with_reward(
        &self,
        user_id: &str,
        secret_id: &str,
        grant: &RewardGrant,
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        let mut state = self.state()?;
        let known = state
            .discoveries
            .get(user_id)
            .is_some_and(|ids| ids.iter().any(|id| id == secret_id));
        if known {
            return Ok(None);
        }

        self.check_rewards()?;
        let mut stats = self.current_stats(&state, user_id);
        stats.apply(grant, self.rewards.xp_per_level);
        let totals = stats.totals();
        state
            .discoveries
            .entry(user_id.to_string())
            .or_default()
            .push(secret_id.to_string());
        state.stats.insert(user_id.to_string(), stats);
        Ok(Some(totals))
    }

    fn discovered_secrets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state()?
            .discoveries
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn grant_reward(
        &self,
        user_id: &str,
        grant: &RewardGrant,
    ) -> Result<UpdatedTotals, StoreError> {
        let mut state = self.state()?;
        self.check_rewards()?;
        let mut stats = self.current_stats(&state, user_id);
        stats.apply(grant, self.rewards.xp_per_level);
        let totals = stats.totals();
        state.stats.insert(user_id.to_string(), stats);
        Ok(totals)
    }

    fn load_stats(&self, user_id: &str) -> Result<Option<UserStats>, StoreError> {
        Ok(self.state()?.stats.get(user_id).cloned())
    }

    fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription {
        self.trip_feed.subscribe(user_id, callback)
    }
}
