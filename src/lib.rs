//! Egyptour - gamified travel companion for Egyptian historical sites
//!
//! Travellers follow a trip of location-based missions, complete their tasks
//! (photos verified by a vision model, quizzes, checklists), and stumble on
//! geofenced hidden secrets along the way. Missions unlock in sequence,
//! trip progress is derived from completed missions, and every first
//! discovery or mission completion pays out XP and gold exactly once.

pub mod discovery;
pub mod geo;
pub mod journey;
pub mod missions;
pub mod rewards;
pub mod secrets;
pub mod storage;
pub mod vision;

// Re-export commonly used types
pub use discovery::{DiscoveryEvent, DiscoveryService, LocationWatcher, WatchHandle};
pub use geo::{distance_meters, Coordinate};
pub use journey::{JourneyError, JourneyService, JourneyUpdate};
pub use missions::{Mission, MissionStatus, ProgressOutcome, Task, TaskKind, Trip};
pub use rewards::{RewardGrant, UpdatedTotals, UserStats};
pub use secrets::{Secret, SecretCatalog};
pub use storage::{AppConfig, Database, JourneyStore, MemoryStore, StoreError};
pub use vision::{PhotoAnalyzer, RetryPolicy, VisionClient, VisionError};
