//! Reconciliation and engine configuration.

use std::time::Duration;

use cohort_submissions::CheckerConfig;
use serde::{Deserialize, Serialize};

/// Configuration for reconciliation cascades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Offsets, measured from the trigger, at which re-verification runs.
    pub cascade_delays: Vec<Duration>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            cascade_delays: vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(500),
                Duration::from_millis(1500),
            ],
        }
    }
}

impl ReconcileConfig {
    pub fn with_cascade_delays(mut self, delays: Vec<Duration>) -> Self {
        self.cascade_delays = delays;
        self
    }

    /// Length of the settle window: the last cascade offset.
    pub fn settle_window(&self) -> Duration {
        self.cascade_delays.iter().copied().max().unwrap_or_default()
    }
}

/// Deployment profile for [`EngineConfig::for_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Long-lived dashboard views.
    Interactive,
    /// One-shot commands such as the CLI.
    Batch,
    /// Short timings for tests.
    Testing,
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub checker: CheckerConfig,
    pub reconcile: ReconcileConfig,
}

impl EngineConfig {
    /// Create config tuned for a deployment profile.
    pub fn for_profile(profile: Profile) -> Self {
        let mut config = Self::default();

        match profile {
            Profile::Interactive => {}
            Profile::Batch => {
                // A command runs once; a long TTL buys nothing
                config.checker.cache_ttl = Duration::from_secs(30);
                config.reconcile.cascade_delays = vec![
                    Duration::ZERO,
                    Duration::from_millis(500),
                    Duration::from_millis(1500),
                ];
            }
            Profile::Testing => {
                config.checker.cache_ttl = Duration::from_secs(5);
                config.reconcile.cascade_delays = vec![
                    Duration::ZERO,
                    Duration::from_millis(10),
                    Duration::from_millis(50),
                    Duration::from_millis(150),
                ];
            }
        }

        config
    }
}
