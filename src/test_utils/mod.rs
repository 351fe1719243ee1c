//! Shared test utilities for skillctl.

pub mod fixtures;
pub mod logging;

pub use fixtures::{UnitTestFixture, skill_manifest, skill_manifest_with};
pub use logging::{CapturedLogs, capture_logs};
