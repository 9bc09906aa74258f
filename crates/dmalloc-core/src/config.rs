//! Tracker configuration.
//!
//! Read once from the environment:
//! - `DMALLOC_ON_BUG`: what to do when a free fails validation.
//!   `abort` (default) prints the diagnostic and terminates the process,
//!   `panic` panics with it, `report` returns it to the caller.
//! - `DMALLOC_LOG_CAPACITY`: how many lifecycle records to retain
//!   (default 1024, `0` disables the log).

use std::sync::OnceLock;

/// Environment variable selecting the [`ViolationPolicy`].
pub const POLICY_ENV: &str = "DMALLOC_ON_BUG";

/// Environment variable bounding the lifecycle log.
pub const LOG_CAPACITY_ENV: &str = "DMALLOC_LOG_CAPACITY";

/// Lifecycle records kept when nothing else is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Terminal action for a memory bug detected at free time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationPolicy {
    /// Print the diagnostic to stderr and abort the process.
    #[default]
    Abort,
    /// Panic with the diagnostic.
    Panic,
    /// Hand the bug back to the caller. Nothing is released.
    Report,
}

impl ViolationPolicy {
    /// Parse from string (case-insensitive). Unknown values fall back to
    /// [`ViolationPolicy::Abort`].
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "default" | "fatal" => Self::Abort,
            "panic" | "unwind" => Self::Panic,
            "report" | "return" | "error" => Self::Report,
            _ => Self::Abort,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Panic => "panic",
            Self::Report => "report",
        }
    }
}

/// Knobs for a [`Tracker`](crate::Tracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub policy: ViolationPolicy,
    /// Maximum retained lifecycle records; oldest are dropped first.
    pub log_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            policy: ViolationPolicy::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl TrackerConfig {
    /// Configuration from the environment (read on first call, cached).
    #[must_use]
    pub fn from_env() -> Self {
        static FROM_ENV: OnceLock<TrackerConfig> = OnceLock::new();
        *FROM_ENV.get_or_init(|| {
            Self::from_vars(
                std::env::var(POLICY_ENV).ok().as_deref(),
                std::env::var(LOG_CAPACITY_ENV).ok().as_deref(),
            )
        })
    }

    /// Build from raw variable values; unparsable capacities keep the default.
    #[must_use]
    pub fn from_vars(policy: Option<&str>, log_capacity: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            policy: policy.map_or(defaults.policy, ViolationPolicy::from_str_loose),
            log_capacity: log_capacity
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.log_capacity),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: ViolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_policies() {
        assert_eq!(ViolationPolicy::from_str_loose("abort"), ViolationPolicy::Abort);
        assert_eq!(ViolationPolicy::from_str_loose("ABORT"), ViolationPolicy::Abort);
        assert_eq!(ViolationPolicy::from_str_loose("panic"), ViolationPolicy::Panic);
        assert_eq!(ViolationPolicy::from_str_loose(" Report "), ViolationPolicy::Report);
        assert_eq!(ViolationPolicy::from_str_loose("return"), ViolationPolicy::Report);
        assert_eq!(ViolationPolicy::from_str_loose("bogus"), ViolationPolicy::Abort);
    }

    #[test]
    fn default_aborts() {
        assert_eq!(TrackerConfig::default().policy, ViolationPolicy::Abort);
        assert_eq!(TrackerConfig::default().log_capacity, DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn from_vars_falls_back() {
        let cfg = TrackerConfig::from_vars(Some("report"), Some("16"));
        assert_eq!(cfg.policy, ViolationPolicy::Report);
        assert_eq!(cfg.log_capacity, 16);

        let cfg = TrackerConfig::from_vars(None, Some("lots"));
        assert_eq!(cfg, TrackerConfig::default());
    }

    #[test]
    fn builders() {
        let cfg = TrackerConfig::default()
            .with_policy(ViolationPolicy::Panic)
            .with_log_capacity(0);
        assert_eq!(cfg.policy, ViolationPolicy::Panic);
        assert_eq!(cfg.log_capacity, 0);
        assert_eq!(cfg.policy.as_str(), "panic");
    }
}
