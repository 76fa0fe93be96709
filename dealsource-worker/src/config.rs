/// Worker configuration
///
/// Pipeline timing comes from `PIPELINE_*` environment variables layered over
/// defaults with the `config` crate:
///
/// - `PIPELINE_POLL_INTERVAL_SECS` (60)
/// - `PIPELINE_BATCH_SIZE` (25)
/// - `PIPELINE_FOLLOW_UP_AFTER_HOURS` (48)
/// - `PIPELINE_MAX_FOLLOW_UPS` (2)
/// - `PIPELINE_RETRY_DELAY_MINUTES` (30)
///
/// The database pool reads `DATABASE_*` and the SMS gateway `SMS_*`, both
/// through the shared crate.

use dealsource_shared::db::pool::{DatabaseConfig, DatabaseConfigError};
use dealsource_shared::notify::sms::SmsConfig;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "PIPELINE";

/// One year; longer quiet periods or retry delays are configuration mistakes
pub const MAX_FOLLOW_UP_AFTER_HOURS: i64 = 24 * 365;
pub const MAX_RETRY_DELAY_MINUTES: i64 = 60 * 24 * 365;
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum WorkerConfigError {
    #[error(transparent)]
    Database(#[from] DatabaseConfigError),

    #[error("Invalid pipeline configuration: {0}")]
    Pipeline(#[from] config::ConfigError),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{0} must be at most {1}")]
    TooLarge(&'static str, i64),

    #[error("{0} must not be negative")]
    Negative(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    pub poll_interval_secs: u64,

    /// Vendors claimed per step per tick
    pub batch_size: i64,

    /// Quiet period after a contact before the next follow-up (or giving up)
    pub follow_up_after_hours: i64,

    pub max_follow_ups: i32,

    /// Wait before retrying a first message the gateway refused
    pub retry_delay_minutes: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            batch_size: 25,
            follow_up_after_hours: 48,
            max_follow_ups: 2,
            retry_delay_minutes: 30,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, WorkerConfigError> {
        Self::load(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Builds the config from defaults overlaid with `env`
    pub fn load(env: config::Environment) -> Result<Self, WorkerConfigError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("poll_interval_secs", defaults.poll_interval_secs as i64)?
            .set_default("batch_size", defaults.batch_size)?
            .set_default("follow_up_after_hours", defaults.follow_up_after_hours)?
            .set_default("max_follow_ups", defaults.max_follow_ups as i64)?
            .set_default("retry_delay_minutes", defaults.retry_delay_minutes)?
            .add_source(env.try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WorkerConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(WorkerConfigError::NotPositive("poll_interval_secs"));
        }
        if self.batch_size <= 0 {
            return Err(WorkerConfigError::NotPositive("batch_size"));
        }
        if self.follow_up_after_hours <= 0 {
            return Err(WorkerConfigError::NotPositive("follow_up_after_hours"));
        }
        if self.retry_delay_minutes <= 0 {
            return Err(WorkerConfigError::NotPositive("retry_delay_minutes"));
        }
        if self.max_follow_ups < 0 {
            return Err(WorkerConfigError::Negative("max_follow_ups"));
        }

        if self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(WorkerConfigError::TooLarge(
                "poll_interval_secs",
                MAX_POLL_INTERVAL_SECS as i64,
            ));
        }
        if self.follow_up_after_hours > MAX_FOLLOW_UP_AFTER_HOURS {
            return Err(WorkerConfigError::TooLarge(
                "follow_up_after_hours",
                MAX_FOLLOW_UP_AFTER_HOURS,
            ));
        }
        if self.retry_delay_minutes > MAX_RETRY_DELAY_MINUTES {
            return Err(WorkerConfigError::TooLarge(
                "retry_delay_minutes",
                MAX_RETRY_DELAY_MINUTES,
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn follow_up_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.follow_up_after_hours)
    }

    pub fn retry_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retry_delay_minutes)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub sms: SmsConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, WorkerConfigError> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            sms: SmsConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = PipelineConfig::load(env(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.follow_up_after(), chrono::Duration::hours(48));
        assert_eq!(config.poll_interval(), std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_environment_overrides() {
        let config = PipelineConfig::load(env(&[
            ("PIPELINE_BATCH_SIZE", "5"),
            ("PIPELINE_MAX_FOLLOW_UPS", "0"),
            ("PIPELINE_RETRY_DELAY_MINUTES", "10"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_follow_ups, 0);
        assert_eq!(config.retry_delay(), chrono::Duration::minutes(10));
        assert_eq!(config.poll_interval_secs, 60);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = PipelineConfig::load(env(&[("PIPELINE_POLL_INTERVAL_SECS", "0")]));
        assert!(matches!(result, Err(WorkerConfigError::NotPositive("poll_interval_secs"))));
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let result = PipelineConfig::load(env(&[(
            "PIPELINE_FOLLOW_UP_AFTER_HOURS",
            "9223372036854775807",
        )]));
        assert!(matches!(
            result,
            Err(WorkerConfigError::TooLarge("follow_up_after_hours", MAX_FOLLOW_UP_AFTER_HOURS))
        ));

        let result = PipelineConfig::load(env(&[("PIPELINE_RETRY_DELAY_MINUTES", "9000000000000000")]));
        assert!(matches!(result, Err(WorkerConfigError::TooLarge("retry_delay_minutes", _))));

        let result = PipelineConfig::load(env(&[("PIPELINE_MAX_FOLLOW_UPS", "-1")]));
        assert!(matches!(result, Err(WorkerConfigError::Negative("max_follow_ups"))));

        let year = PipelineConfig::load(env(&[("PIPELINE_FOLLOW_UP_AFTER_HOURS", "8760")])).unwrap();
        assert_eq!(year.follow_up_after(), chrono::Duration::days(365));
    }

    #[test]
    fn test_rejects_garbage() {
        let result = PipelineConfig::load(env(&[("PIPELINE_BATCH_SIZE", "lots")]));
        assert!(matches!(result, Err(WorkerConfigError::Pipeline(_))));
    }
}
