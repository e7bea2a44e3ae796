//! Engine configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::time::Duration;

/// Engine configuration
///
/// Limits and timeouts for a pipeline run. Loaded from the environment with
/// `from_env`, or built with `Default` for embedded/test use.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of guideline sources requested per diagnostic step
    pub max_sources_per_step: usize,
    /// Maximum number of steps executed concurrently (batch size)
    pub max_parallel_steps: usize,
    /// Timeout for a single collaborator call (seconds)
    pub step_timeout_secs: u64,
    /// Deadline for executing a whole plan (seconds)
    pub plan_deadline_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sources_per_step: 10,
            max_parallel_steps: 5,
            step_timeout_secs: 30,
            plan_deadline_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// Unparseable values fall back to their defaults; a zero parallelism
    /// setting is floored at 1 so the executor always makes progress.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_sources_per_step: env::var("MAX_SOURCES_PER_STEP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_sources_per_step),
            max_parallel_steps: env::var("MAX_PARALLEL_PROCESSES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults.max_parallel_steps),
            step_timeout_secs: env::var("STEP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.step_timeout_secs),
            plan_deadline_secs: env::var("MAX_PROCESSING_TIME_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.plan_deadline_secs),
        }
    }

    /// Per-collaborator-call timeout as a `Duration`
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Whole-plan deadline as a `Duration`
    pub fn plan_deadline(&self) -> Duration {
        Duration::from_secs(self.plan_deadline_secs)
    }
}
