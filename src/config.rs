//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Instance name for identification.
    pub name: String,
    /// Dispatch loop tick interval.
    pub tick_interval: Duration,
    /// Concurrency limit applied to services that were never configured.
    pub default_max_concurrency: usize,
    /// Capacity of the event broadcast channel (WS fan-out).
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "autotask".to_string(),
            tick_interval: Duration::from_millis(50),
            default_max_concurrency: 1,
            event_buffer: 256,
        }
    }
}

impl SchedulerConfig {
    /// Build a config from `AUTOTASK_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(name) = std::env::var("AUTOTASK_NAME") {
            config.name = name;
        }
        if let Ok(raw) = std::env::var("AUTOTASK_TICK_MS") {
            config.tick_interval = Duration::from_millis(parse_number("AUTOTASK_TICK_MS", &raw)?);
        }
        if let Ok(raw) = std::env::var("AUTOTASK_DEFAULT_MAX_CONCURRENCY") {
            let limit = parse_number("AUTOTASK_DEFAULT_MAX_CONCURRENCY", &raw)?;
            config.default_max_concurrency = (limit as usize).max(1);
        }
        Ok(config)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a number, got {raw:?}"),
    })
}
