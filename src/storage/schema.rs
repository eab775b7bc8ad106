//! Database schema definitions for Egyptour.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Active trip per user, stored as a whole document
CREATE TABLE IF NOT EXISTS trips (
    user_id TEXT PRIMARY KEY,
    trip_id TEXT NOT NULL,
    title TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    document_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Discovery ledger: one row per (user, secret), never deleted
CREATE TABLE IF NOT EXISTS discoveries (
    user_id TEXT NOT NULL,
    secret_id TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (user_id, secret_id)
);

CREATE INDEX IF NOT EXISTS idx_discoveries_user_id ON discoveries(user_id);

-- Running reward totals
CREATE TABLE IF NOT EXISTS user_stats (
    user_id TEXT PRIMARY KEY,
    xp INTEGER NOT NULL DEFAULT 0,
    gold INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    missions_completed INTEGER NOT NULL DEFAULT 0,
    tasks_completed INTEGER NOT NULL DEFAULT 0,
    secrets_found INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Claimed one-time rewards, keyed by RewardSource::claim_key
CREATE TABLE IF NOT EXISTS reward_claims (
    user_id TEXT NOT NULL,
    claim_key TEXT NOT NULL,
    claimed_at TEXT NOT NULL,
    PRIMARY KEY (user_id, claim_key)
);
"#;

/// SQL for the schema version table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
