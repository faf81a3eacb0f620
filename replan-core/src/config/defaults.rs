//! Default configuration values for the planner
//!
//! This module centralizes all default values to make them easy to find and modify.

use std::time::Duration;

// Search defaults
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SEARCH_MAX_NODES: u64 = 1_000_000;

// Model defaults
pub const MIN_HORIZON: u64 = 1;

// Action durations, in planner time units (seconds by convention)
pub const DEFAULT_RUN_DURATION: u64 = 10;
pub const DEFAULT_STOP_DURATION: u64 = 5;
pub const DEFAULT_MIGRATION_BASE: u64 = 2;
pub const DEFAULT_MIGRATION_PER_GIB: u64 = 4;
pub const DEFAULT_SUSPEND_DURATION: u64 = 8;
pub const DEFAULT_LOCAL_RESUME_DURATION: u64 = 6;
pub const DEFAULT_REMOTE_RESUME_PER_GIB: u64 = 4;
pub const DEFAULT_STARTUP_DURATION: u64 = 60;
pub const DEFAULT_SHUTDOWN_DURATION: u64 = 20;

// Helper functions for Duration creation
pub const fn duration_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}
