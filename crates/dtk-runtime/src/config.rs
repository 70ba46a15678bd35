#![forbid(unsafe_code)]

//! Scheduler tunables.

use std::env;

/// Environment variable overriding [`SchedulerConfig::max_passes`].
pub const MAX_PASSES_ENV: &str = "DTK_MAX_FLUSH_PASSES";

const DEFAULT_MAX_PASSES: usize = 32;

/// Configuration for the [`UpdateQueue`](crate::scheduler::UpdateQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Upper bound on propagate-then-run passes in one flush. Work that keeps
    /// re-enqueueing itself past this bound is dropped with an error.
    pub max_passes: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Defaults, overridden by `DTK_MAX_FLUSH_PASSES` when it holds a
    /// positive integer.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(env::var(MAX_PASSES_ENV).ok().as_deref())
    }

    fn from_env_value(raw: Option<&str>) -> Self {
        let max_passes = raw
            .map(str::trim)
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PASSES);
        Self { max_passes }
    }
}
