//! SQLite-backed [`JourneyStore`] using rusqlite.

use crate::missions::Trip;
use crate::rewards::{level_for_xp, RewardGrant, RewardSource, UpdatedTotals, UserStats};
use crate::storage::config::RewardSettings;
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::storage::subscription::{SnapshotHub, Subscription};
use crate::storage::{JourneyStore, StoreError, TripCallback};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`JourneyStore`].
pub struct Database {
    conn: Connection,
    rewards: RewardSettings,
    trip_feed: SnapshotHub<Trip>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        // Other connections (another CLI process, a watcher) may hold the write lock.
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let db = Self::with_connection(conn);
        db.initialize()?;

        tracing::info!("Database ready at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let db = Self::with_connection(conn);
        db.initialize()?;

        Ok(db)
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            rewards: RewardSettings::default(),
            trip_feed: SnapshotHub::new(),
        }
    }

    /// Use the given reward settings for new users and level computation.
    pub fn with_reward_settings(mut self, rewards: RewardSettings) -> Self {
        self.rewards = rewards;
        self
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), StoreError> {
        // Create schema version table
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        // Check current version
        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, StoreError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(StoreError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), StoreError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// When the user discovered a secret.
    pub fn discovered_at(
        &self,
        user_id: &str,
        secret_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT discovered_at FROM discoveries WHERE user_id = ?1 AND secret_id = ?2",
                params![user_id, secret_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        raw.map(|s| parse_timestamp(&s)).transpose()
    }

    fn write_trip(conn: &Connection, user_id: &str, trip: &Trip) -> Result<(), StoreError> {
        let document = serde_json::to_string(trip)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        conn.execute(
            "INSERT INTO trips (user_id, trip_id, title, progress, document_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                trip_id = excluded.trip_id,
                title = excluded.title,
                progress = excluded.progress,
                document_json = excluded.document_json,
                updated_at = excluded.updated_at",
            params![
                user_id,
                trip.id,
                trip.title,
                trip.progress_percent,
                document,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn insert_discovery(
        conn: &Connection,
        user_id: &str,
        secret_id: &str,
    ) -> Result<bool, StoreError> {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO discoveries (user_id, secret_id, discovered_at)
                 VALUES (?1, ?2, ?3)",
                params![user_id, secret_id, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(inserted == 1)
    }

    /// Add `grant` to the user's totals on `conn`. The caller owns the transaction.
    fn apply_grant(
        &self,
        conn: &Connection,
        user_id: &str,
        grant: &RewardGrant,
    ) -> Result<UpdatedTotals, StoreError> {
        let (missions, tasks, secrets) = match grant.source {
            RewardSource::MissionCompleted(_) => (1, 0, 0),
            RewardSource::TaskCompleted { .. } => (0, 1, 0),
            RewardSource::SecretDiscovered(_) => (0, 0, 1),
        };
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT OR IGNORE INTO user_stats (user_id, xp, gold, level, updated_at)
             VALUES (?1, 0, ?2, 1, ?3)",
            params![user_id, self.rewards.starting_gold as i64, now],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        conn.execute(
            "UPDATE user_stats SET
                xp = xp + ?1,
                gold = gold + ?2,
                missions_completed = missions_completed + ?3,
                tasks_completed = tasks_completed + ?4,
                secrets_found = secrets_found + ?5,
                updated_at = ?6
             WHERE user_id = ?7",
            params![grant.xp, grant.gold, missions, tasks, secrets, now, user_id],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let (xp, gold): (i64, i64) = conn
            .query_row(
                "SELECT xp, gold FROM user_stats WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let level = level_for_xp(xp.max(0) as u64, self.rewards.xp_per_level);
        conn.execute(
            "UPDATE user_stats SET level = ?1 WHERE user_id = ?2",
            params![level, user_id],
        )
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        tracing::debug!(
            "Granted {} XP / {} gold to {} for {}",
            grant.xp,
            grant.gold,
            user_id,
            grant.source
        );

        Ok(UpdatedTotals {
            xp: xp.max(0) as u64,
            gold: gold.max(0) as u64,
            level,
        })
    }

    /// Insert the grant's claim if it has one. `false` means it was already claimed.
    fn claim(conn: &Connection, user_id: &str, grant: &RewardGrant) -> Result<bool, StoreError> {
        let Some(key) = grant.source.claim_key() else {
            return Ok(true);
        };
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO reward_claims (user_id, claim_key, claimed_at)
                 VALUES (?1, ?2, ?3)",
                params![user_id, key, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        Ok(inserted == 1)
    }
}

impl JourneyStore for Database {
    fn load_trip(&self, user_id: &str) -> Result<Option<Trip>, StoreError> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document_json FROM trips WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let Some(json) = document else {
            return Ok(None);
        };
        let mut trip: Trip = serde_json::from_str(&json)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        // Progress is derived; another client may have written a stale value.
        trip.recompute_progress();
        Ok(Some(trip))
    }

    fn save_trip(&self, user_id: &str, trip: &Trip) -> Result<(), StoreError> {
        Self::write_trip(&self.conn, user_id, trip)?;

        tracing::debug!(
            "Saved trip {} for {} ({}%)",
            trip.id,
            user_id,
            trip.progress_percent
        );
        self.trip_feed.publish(user_id, trip);
        Ok(())
    }

    fn save_trip_with_rewards(
        &self,
        user_id: &str,
        trip: &Trip,
        grants: &[RewardGrant],
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        Self::write_trip(&tx, user_id, trip)?;
        let mut totals = None;
        for grant in grants {
            if Self::claim(&tx, user_id, grant)? {
                totals = Some(self.apply_grant(&tx, user_id, grant)?);
            } else {
                tracing::debug!("Reward for {} already claimed by {}", grant.source, user_id);
            }
        }

        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        tracing::debug!(
            "Saved trip {} for {} ({}%) with {} grant(s)",
            trip.id,
            user_id,
            trip.progress_percent,
            grants.len()
        );
        self.trip_feed.publish(user_id, trip);
        Ok(totals)
    }

    fn is_discovered(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM discoveries WHERE user_id = ?1 AND secret_id = ?2",
                params![user_id, secret_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(count > 0)
    }

    fn record_discovery(&self, user_id: &str, secret_id: &str) -> Result<bool, StoreError> {
        Self::insert_discovery(&self.conn, user_id, secret_id)
    }

    fn record_discovery_with_reward(
        &self,
        user_id: &str,
        secret_id: &str,
        grant: &RewardGrant,
    ) -> Result<Option<UpdatedTotals>, StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        if !Self::insert_discovery(&tx, user_id, secret_id)? {
            return Ok(None);
        }
        let totals = self.apply_grant(&tx, user_id, grant)?;

        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;
        Ok(Some(totals))
    }

    fn discovered_secrets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT secret_id FROM discoveries WHERE user_id = ?1
                 ORDER BY discovered_at ASC, secret_id ASC",
            )
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id], |row| row.get(0))
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<String>>>()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))
    }

    fn grant_reward(
        &self,
        user_id: &str,
        grant: &RewardGrant,
    ) -> Result<UpdatedTotals, StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let totals = self.apply_grant(&tx, user_id, grant)?;

        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;
        Ok(totals)
    }

    fn load_stats(&self, user_id: &str) -> Result<Option<UserStats>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, xp, gold, level, missions_completed, tasks_completed,
                        secrets_found, updated_at
                 FROM user_stats WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserStatsRow {
                        user_id: row.get(0)?,
                        xp: row.get(1)?,
                        gold: row.get(2)?,
                        level: row.get(3)?,
                        missions_completed: row.get(4)?,
                        tasks_completed: row.get(5)?,
                        secrets_found: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        row.map(UserStatsRow::into_user_stats).transpose()
    }

    fn subscribe_trip(&self, user_id: &str, callback: TripCallback) -> Subscription {
        self.trip_feed.subscribe(user_id, callback)
    }
}

/// Intermediate struct for reading stats rows from database.
struct UserStatsRow {
    user_id: String,
    xp: i64,
    gold: i64,
    level: u32,
    missions_completed: u32,
    tasks_completed: u32,
    secrets_found: u32,
    updated_at: String,
}

impl UserStatsRow {
    fn into_user_stats(self) -> Result<UserStats, StoreError> {
        Ok(UserStats {
            user_id: self.user_id,
            xp: self.xp.max(0) as u64,
            gold: self.gold.max(0) as u64,
            level: self.level,
            missions_completed: self.missions_completed,
            tasks_completed: self.tasks_completed,
            secrets_found: self.secrets_found,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::DeserializationError(format!("Invalid timestamp: {}", e)))
}
