//! Integration test modules.

mod discovery_test;
mod mission_flow_test;
mod photo_flow_test;
mod subscription_test;
mod watcher_test;
