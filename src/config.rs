use std::env;
use std::time::Duration;

use validator::Validate;

use crate::errors::AppResult;

#[derive(Clone, Debug, Validate)]
pub struct Config {
    pub mongo_conn_string: String,
    #[validate(length(min = 1))]
    pub mongo_db_name: String,
    #[validate(range(min = 1))]
    pub expiry_sweep_interval_secs: u64,
    #[validate(range(min = 1))]
    pub task_queue_capacity: usize,
    #[validate(range(min = 1))]
    pub task_max_attempts: usize,
    pub task_base_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME")
                .unwrap_or_else(|_| "eduquest-local".to_string()),
            expiry_sweep_interval_secs: env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            task_queue_capacity: env::var("TASK_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            task_max_attempts: env::var("TASK_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            task_base_backoff_ms: env::var("TASK_BASE_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }

    /// Rejects settings that would stall the worker loops.
    pub fn validated(self) -> AppResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }

    pub fn task_base_backoff(&self) -> Duration {
        Duration::from_millis(self.task_base_backoff_ms)
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "eduquest-test".to_string(),
            expiry_sweep_interval_secs: 1,
            task_queue_capacity: 16,
            task_max_attempts: 3,
            task_base_backoff_ms: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[test]
    fn test_config_from_env_with_defaults() {
        let config = Config::from_env();

        assert!(!config.mongo_conn_string.is_empty());
        assert!(!config.mongo_db_name.is_empty());
        assert!(config.task_queue_capacity > 0);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test_config();

        assert_eq!(config.mongo_db_name, "eduquest-test");
        assert_eq!(config.expiry_sweep_interval(), Duration::from_secs(1));
        assert_eq!(config.task_base_backoff(), Duration::from_millis(1));
        assert!(config.validated().is_ok());
    }

    #[test]
    fn zero_attempts_fail_validation() {
        let mut config = Config::test_config();
        config.task_max_attempts = 0;

        let result = config.validated();
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn zero_queue_capacity_fails_validation() {
        let mut config = Config::test_config();
        config.task_queue_capacity = 0;

        assert!(config.validated().is_err());
    }
}
