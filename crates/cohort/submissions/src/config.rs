//! Data-access configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the [`SubmissionChecker`](crate::SubmissionChecker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// How long a successful fetch stays fresh.
    pub cache_ttl: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl CheckerConfig {
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }
}

/// Configuration for the HTTP record-store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the record store API.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
