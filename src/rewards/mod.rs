//! Experience, gold and levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// XP for completing a mission when the itinerary does not set one.
pub const MISSION_COMPLETE_XP: u32 = 100;
/// XP for a task when the itinerary does not set one.
pub const TASK_COMPLETE_XP: u32 = 30;
/// Default XP for a hidden secret.
pub const HIDDEN_SECRET_XP: u32 = 50;
/// Default gold for a hidden secret.
pub const HIDDEN_SECRET_GOLD: u32 = 25;

/// Default XP needed per level.
pub const DEFAULT_XP_PER_LEVEL: u64 = 100;
/// Gold a new traveller starts with.
pub const DEFAULT_STARTING_GOLD: u64 = 100;

/// Why a reward was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RewardSource {
    SecretDiscovered(String),
    MissionCompleted(String),
    TaskCompleted {
        trip_id: String,
        mission_id: String,
        task_id: String,
    },
}

impl RewardSource {
    /// Key under which the reward is recorded in the claim ledger.
    ///
    /// Only task rewards are claimed: a task can be unticked and ticked
    /// again, while secrets have their own ledger and missions never leave
    /// `Completed`.
    pub fn claim_key(&self) -> Option<String> {
        match self {
            RewardSource::TaskCompleted {
                trip_id,
                mission_id,
                task_id,
            } => Some(format!("task:{}:{}:{}", trip_id, mission_id, task_id)),
            _ => None,
        }
    }
}

impl std::fmt::Display for RewardSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardSource::SecretDiscovered(id) => write!(f, "secret {}", id),
            RewardSource::MissionCompleted(id) => write!(f, "mission {}", id),
            RewardSource::TaskCompleted {
                mission_id,
                task_id,
                ..
            } => write!(f, "task {}/{}", mission_id, task_id),
        }
    }
}

/// An additive reward to apply to a user's totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub xp: u32,
    pub gold: u32,
    pub source: RewardSource,
}

impl RewardGrant {
    pub fn new(xp: u32, gold: u32, source: RewardSource) -> Self {
        Self { xp, gold, source }
    }

    /// Whether the grant changes nothing.
    pub fn is_empty(&self) -> bool {
        self.xp == 0 && self.gold == 0
    }
}

/// Running totals for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub xp: u64,
    pub gold: u64,
    pub level: u32,
    pub missions_completed: u32,
    #[serde(default)]
    pub tasks_completed: u32,
    pub secrets_found: u32,
    pub updated_at: DateTime<Utc>,
}

impl UserStats {
    /// Fresh totals for a new user.
    pub fn new(user_id: impl Into<String>, starting_gold: u64) -> Self {
        Self {
            user_id: user_id.into(),
            xp: 0,
            gold: starting_gold,
            level: 1,
            missions_completed: 0,
            tasks_completed: 0,
            secrets_found: 0,
            updated_at: Utc::now(),
        }
    }

    /// Apply a grant in place and recompute the level.
    pub fn apply(&mut self, grant: &RewardGrant, xp_per_level: u64) {
        self.xp += u64::from(grant.xp);
        self.gold += u64::from(grant.gold);
        match grant.source {
            RewardSource::SecretDiscovered(_) => self.secrets_found += 1,
            RewardSource::MissionCompleted(_) => self.missions_completed += 1,
            RewardSource::TaskCompleted { .. } => self.tasks_completed += 1,
        }
        self.level = level_for_xp(self.xp, xp_per_level);
        self.updated_at = Utc::now();
    }

    /// XP still needed to reach the next level.
    pub fn xp_to_next_level(&self, xp_per_level: u64) -> u64 {
        let per_level = xp_per_level.max(1);
        per_level - self.xp % per_level
    }

    pub fn totals(&self) -> UpdatedTotals {
        UpdatedTotals {
            xp: self.xp,
            gold: self.gold,
            level: self.level,
        }
    }
}

/// Totals returned after a grant, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedTotals {
    pub xp: u64,
    pub gold: u64,
    pub level: u32,
}

/// `xp / xp_per_level + 1`.
pub fn level_for_xp(xp: u64, xp_per_level: u64) -> u32 {
    let level = xp / xp_per_level.max(1) + 1;
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// Title shown next to a level.
pub fn rank_title(level: u32) -> &'static str {
    match level {
        10.. => "Great Pharaoh",
        5..=9 => "Explorer Pharaoh",
        _ => "Apprentice Explorer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for_xp(0, 100), 1);
        assert_eq!(level_for_xp(99, 100), 1);
        assert_eq!(level_for_xp(100, 100), 2);
        assert_eq!(level_for_xp(1050, 100), 11);
        // Zero per-level is treated as one.
        assert_eq!(level_for_xp(5, 0), 6);
    }

    #[test]
    fn test_apply_grant() {
        let mut stats = UserStats::new("u1", DEFAULT_STARTING_GOLD);
        stats.apply(
            &RewardGrant::new(75, 30, RewardSource::SecretDiscovered("s".to_string())),
            DEFAULT_XP_PER_LEVEL,
        );
        stats.apply(
            &RewardGrant::new(100, 30, RewardSource::MissionCompleted("m".to_string())),
            DEFAULT_XP_PER_LEVEL,
        );
        assert_eq!(stats.xp, 175);
        assert_eq!(stats.gold, 160);
        assert_eq!(stats.level, 2);
        assert_eq!(stats.secrets_found, 1);
        assert_eq!(stats.missions_completed, 1);
        assert_eq!(stats.xp_to_next_level(DEFAULT_XP_PER_LEVEL), 25);
    }

    #[test]
    fn test_only_task_rewards_are_claimed() {
        let task = RewardSource::TaskCompleted {
            trip_id: "trip".to_string(),
            mission_id: "m1".to_string(),
            task_id: "t1".to_string(),
        };
        assert_eq!(task.claim_key().as_deref(), Some("task:trip:m1:t1"));
        assert_eq!(task.to_string(), "task m1/t1");
        assert!(RewardSource::MissionCompleted("m1".to_string())
            .claim_key()
            .is_none());

        let mut stats = UserStats::new("u1", 0);
        stats.apply(&RewardGrant::new(30, 0, task), DEFAULT_XP_PER_LEVEL);
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.missions_completed, 0);
        assert!(RewardGrant::new(0, 0, RewardSource::SecretDiscovered("s".to_string())).is_empty());
    }

    #[test]
    fn test_rank_titles() {
        assert_eq!(rank_title(1), "Apprentice Explorer");
        assert_eq!(rank_title(5), "Explorer Pharaoh");
        assert_eq!(rank_title(42), "Great Pharaoh");
    }
}
