//! Action duration configuration

use super::defaults::*;
use super::parse_from_env;
use crate::error::{ReplanError, ReplanResult};
use serde::{Deserialize, Serialize};

/// Durations used by [`crate::duration::ConfiguredDurations`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationConfig {
    pub run: u64,
    pub stop: u64,
    /// Fixed part of a migration
    pub migration_base: u64,
    /// Migration time per started GiB of VM memory
    pub migration_per_gib: u64,
    pub suspend: u64,
    pub local_resume: u64,
    /// Extra resume time per started GiB when the image has to move
    pub remote_resume_per_gib: u64,
    pub startup: u64,
    pub shutdown: u64,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            run: DEFAULT_RUN_DURATION,
            stop: DEFAULT_STOP_DURATION,
            migration_base: DEFAULT_MIGRATION_BASE,
            migration_per_gib: DEFAULT_MIGRATION_PER_GIB,
            suspend: DEFAULT_SUSPEND_DURATION,
            local_resume: DEFAULT_LOCAL_RESUME_DURATION,
            remote_resume_per_gib: DEFAULT_REMOTE_RESUME_PER_GIB,
            startup: DEFAULT_STARTUP_DURATION,
            shutdown: DEFAULT_SHUTDOWN_DURATION,
        }
    }
}

impl DurationConfig {
    pub fn from_env() -> ReplanResult<Self> {
        let d = Self::default();
        Ok(Self {
            run: parse_from_env("REPLAN_DURATION_RUN", d.run)?,
            stop: parse_from_env("REPLAN_DURATION_STOP", d.stop)?,
            migration_base: parse_from_env("REPLAN_DURATION_MIGRATION_BASE", d.migration_base)?,
            migration_per_gib: parse_from_env(
                "REPLAN_DURATION_MIGRATION_PER_GIB",
                d.migration_per_gib,
            )?,
            suspend: parse_from_env("REPLAN_DURATION_SUSPEND", d.suspend)?,
            local_resume: parse_from_env("REPLAN_DURATION_LOCAL_RESUME", d.local_resume)?,
            remote_resume_per_gib: parse_from_env(
                "REPLAN_DURATION_REMOTE_RESUME_PER_GIB",
                d.remote_resume_per_gib,
            )?,
            startup: parse_from_env("REPLAN_DURATION_STARTUP", d.startup)?,
            shutdown: parse_from_env("REPLAN_DURATION_SHUTDOWN", d.shutdown)?,
        })
    }

    pub fn validate(&self) -> ReplanResult<()> {
        if self.migration_base == 0 && self.migration_per_gib == 0 {
            return Err(ReplanError::config(
                "durations",
                "migrations must take some time",
            ));
        }
        Ok(())
    }
}
