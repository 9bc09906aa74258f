//! The process-wide tracker behind every export.

use std::sync::OnceLock;

use dmalloc_core::{SystemAllocator, Tracker, TrackerConfig};

static TRACKER: OnceLock<Tracker> = OnceLock::new();

/// Tracker over the C heap, configured from the environment on first use.
pub(crate) fn tracker() -> &'static Tracker {
    TRACKER.get_or_init(|| {
        let config = TrackerConfig::from_env();
        tracing::debug!(
            policy = config.policy.as_str(),
            log_capacity = config.log_capacity,
            "dmalloc tracker initialized"
        );
        Tracker::with_config(SystemAllocator, config)
    })
}
