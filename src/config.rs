use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::DEFAULT_IDEMPOTENCY_WINDOW_SECS;
use crate::error::{CrmError, Result};

/// Prefix of environment overrides, e.g. `CRM_SAGA__STEP_TIMEOUT_MS=5000`
pub const ENV_PREFIX: &str = "CRM_SAGA";

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SagaConfig {
    pub idempotency_window_secs: u64,
    pub step_timeout_ms: u64,
    pub pending_saga_age_secs: u64,
    pub sweep_batch_limit: usize,
    pub sweep_concurrency: usize,
    pub completed_retention_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            idempotency_window_secs: DEFAULT_IDEMPOTENCY_WINDOW_SECS,
            step_timeout_ms: 30_000,
            pending_saga_age_secs: 300,
            sweep_batch_limit: 50,
            sweep_concurrency: 4,
            completed_retention_secs: 30 * 24 * 60 * 60,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl SagaConfig {
    /// Defaults overridden by `CRM_SAGA__*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Load from an optional file (format by extension) layered under the environment
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        Self::load_from_sources(path, None)
    }

    pub(crate) fn load_from_sources(
        path: Option<impl AsRef<Path>>,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.as_ref()).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: SagaConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("idempotency_window_secs", self.idempotency_window_secs as u128),
            ("step_timeout_ms", self.step_timeout_ms as u128),
            ("sweep_batch_limit", self.sweep_batch_limit as u128),
            ("sweep_concurrency", self.sweep_concurrency as u128),
            ("completed_retention_secs", self.completed_retention_secs as u128),
            ("event_channel_capacity", self.event_channel_capacity as u128),
        ];

        for (key, value) in checks {
            if value == 0 {
                return Err(CrmError::ConfigurationError(format!(
                    "{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    pub fn idempotency_window(&self) -> Duration {
        Duration::from_secs(self.idempotency_window_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn pending_saga_age(&self) -> Duration {
        Duration::from_secs(self.pending_saga_age_secs)
    }

    pub fn completed_retention(&self) -> Duration {
        Duration::from_secs(self.completed_retention_secs)
    }
}
