//! CLI configuration

use std::path::PathBuf;
use std::time::Duration;

use cohort_reconcile::{EngineConfig, Profile};
use cohort_submissions::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Record store used when neither flag, env nor file names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Record store API endpoint
    pub endpoint: Option<String>,

    /// Default team
    pub team: Option<String>,

    /// Engine profile (interactive, batch, testing)
    pub profile: Option<Profile>,

    /// Request timeout in seconds
    pub timeout_seconds: Option<u64>,

    /// Submission cache lifetime in seconds
    pub cache_ttl_seconds: Option<u64>,

    /// Reconciliation cascade offsets in milliseconds
    pub cascade_delays_ms: Option<Vec<u64>>,
}

impl CliConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Self::parse(&contents)
        } else {
            Ok(CliConfig::default())
        }
    }

    pub fn parse(contents: &str) -> CliResult<Self> {
        toml::from_str(contents).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("cohort").join("config.toml"))
    }

    /// Engine settings: the profile preset with file overrides applied.
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::for_profile(self.profile.unwrap_or(Profile::Batch));
        if let Some(ttl) = self.cache_ttl_seconds {
            engine.checker.cache_ttl = Duration::from_secs(ttl);
        }
        if let Some(delays) = &self.cascade_delays_ms {
            engine.reconcile.cascade_delays =
                delays.iter().map(|ms| Duration::from_millis(*ms)).collect();
        }
        engine
    }

    /// HTTP client settings for `endpoint`.
    pub fn client_config(&self, endpoint: &str) -> ClientConfig {
        let mut client = ClientConfig::new(endpoint);
        if let Some(secs) = self.timeout_seconds {
            client = client.with_timeout(Duration::from_secs(secs));
        }
        client
    }
}
