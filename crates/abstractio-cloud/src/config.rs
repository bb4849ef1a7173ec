//! Environment-driven settings for [`crate::CommonOperations`]

use crate::error::{CloudError, Result};
use crate::poller::{PollConfig, ReadinessPoller};
use std::time::Duration;

pub const TABLE_CLUSTERS_VAR: &str = "TABLE_CLUSTERS";
pub const CLOUD_RUN_RETRIES_VAR: &str = "CLOUD_RUN_RETRIES";
pub const STATIC_ADDRESS_RETRIES_VAR: &str = "STATIC_ADDRESS_RETRIES";
pub const POLL_INTERVAL_VAR: &str = "POLL_INTERVAL_SECONDS";

const DEFAULT_RETRIES: u32 = 60;
const DEFAULT_INTERVAL_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OperationsConfig {
    /// Table holding cluster records
    pub clusters_table: String,
    /// Polling of Cloud Run deployments
    pub cloud_run_poll: PollConfig,
    /// Polling of static address allocation
    pub static_address_poll: PollConfig,
}

impl OperationsConfig {
    pub fn new(clusters_table: impl Into<String>) -> Self {
        let interval = Duration::from_secs_f64(DEFAULT_INTERVAL_SECONDS);
        Self {
            clusters_table: clusters_table.into(),
            cloud_run_poll: PollConfig::fixed(DEFAULT_RETRIES, interval),
            static_address_poll: PollConfig::fixed(DEFAULT_RETRIES, interval),
        }
    }

    /// Read the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let clusters_table = std::env::var(TABLE_CLUSTERS_VAR)
            .map_err(|_| CloudError::MissingEnvVar(TABLE_CLUSTERS_VAR.to_string()))?;

        let interval = match env_parsed::<f64>(POLL_INTERVAL_VAR)? {
            Some(secs) => secs,
            None => DEFAULT_INTERVAL_SECONDS,
        };
        let cloud_run_retries = env_parsed(CLOUD_RUN_RETRIES_VAR)?.unwrap_or(DEFAULT_RETRIES);
        let static_address_retries =
            env_parsed(STATIC_ADDRESS_RETRIES_VAR)?.unwrap_or(DEFAULT_RETRIES);

        let config = Self {
            clusters_table,
            cloud_run_poll: PollConfig::from_secs(cloud_run_retries, interval)?,
            static_address_poll: PollConfig::from_secs(static_address_retries, interval)?,
        };
        tracing::debug!(
            table = %config.clusters_table,
            cloud_run_retries,
            static_address_retries,
            interval,
            "Loaded operations configuration"
        );
        Ok(config)
    }

    pub fn cloud_run_poller(&self) -> Result<ReadinessPoller> {
        ReadinessPoller::new(self.cloud_run_poll.clone())
    }

    pub fn static_address_poller(&self) -> Result<ReadinessPoller> {
        ReadinessPoller::new(self.static_address_poll.clone())
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            CloudError::InvalidConfig(format!("{name} must be a number, got '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}
