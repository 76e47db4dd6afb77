use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::tasks::RunnerConfig;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// Base URL of the remote course portal
    pub portal_base_url: String,
    /// Timeout for a single portal request in seconds
    pub portal_timeout_seconds: u64,
    /// File holding the last accepted cookie text
    pub session_config_path: PathBuf,
    /// Directory for the persisted log (`latest.log`)
    pub log_directory: PathBuf,
    /// Number of log entries kept in memory
    pub log_buffer_capacity: usize,
    /// How long `stop` waits for each worker before forcing a reset
    pub stop_join_timeout_seconds: u64,
    /// Number of steps a bounded-progress task performs
    pub bounded_task_steps: u64,
    /// Delay between two bounded-progress steps in milliseconds
    pub bounded_step_delay_ms: u64,
    /// Length of one duration-task tick in milliseconds
    pub duration_tick_ms: u64,
    /// CORS allowed origins (comma-separated in env var)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: "0.0.0.0".to_string(),
            portal_base_url: "https://welearn.sflep.com".to_string(),
            portal_timeout_seconds: 15,
            session_config_path: PathBuf::from("config.json"),
            log_directory: PathBuf::from("logs"),
            log_buffer_capacity: 5000,
            stop_join_timeout_seconds: 5,
            bounded_task_steps: 100,
            bounded_step_delay_ms: 100,
            duration_tick_ms: 1000,
            cors_origins: vec![
                "http://localhost:5000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: match env::var("COURSE_RUNNER_PORT") {
                Ok(v) => v.parse().map_err(|_| ConfigError::InvalidPort)?,
                Err(_) => defaults.port,
            },
            bind_addr: env::var("COURSE_RUNNER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            portal_base_url: env::var("PORTAL_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.portal_base_url),
            portal_timeout_seconds: parse_or("PORTAL_TIMEOUT_SECONDS", defaults.portal_timeout_seconds),
            session_config_path: env::var("SESSION_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_config_path),
            log_directory: env::var("LOG_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_directory),
            log_buffer_capacity: parse_or("LOG_BUFFER_CAPACITY", defaults.log_buffer_capacity),
            stop_join_timeout_seconds: parse_or(
                "STOP_JOIN_TIMEOUT_SECONDS",
                defaults.stop_join_timeout_seconds,
            ),
            bounded_task_steps: parse_or("BOUNDED_TASK_STEPS", defaults.bounded_task_steps),
            bounded_step_delay_ms: parse_or("BOUNDED_STEP_DELAY_MS", defaults.bounded_step_delay_ms),
            duration_tick_ms: parse_or("DURATION_TICK_MS", defaults.duration_tick_ms),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the task runner cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounded_task_steps == 0 {
            return Err(ConfigError::InvalidValue(
                "BOUNDED_TASK_STEPS must be at least 1".to_string(),
            ));
        }
        if self.duration_tick_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "DURATION_TICK_MS must be at least 1".to_string(),
            ));
        }
        if self.log_buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "LOG_BUFFER_CAPACITY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Path of the persisted log file
    pub fn log_file_path(&self) -> PathBuf {
        self.log_directory.join(crate::logs::LOG_FILE_NAME)
    }

    /// Task timing derived from this configuration
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            bounded_steps: self.bounded_task_steps,
            bounded_step_delay: Duration::from_millis(self.bounded_step_delay_ms),
            duration_tick: Duration::from_millis(self.duration_tick_ms),
            join_timeout: Duration::from_secs(self.stop_join_timeout_seconds),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.log_file_path(), PathBuf::from("logs/latest.log"));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let config = ServerConfig {
            bounded_task_steps: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_runner_config_conversion() {
        let config = ServerConfig {
            bounded_step_delay_ms: 20,
            duration_tick_ms: 250,
            stop_join_timeout_seconds: 3,
            ..ServerConfig::default()
        };
        let runner = config.runner_config();
        assert_eq!(runner.bounded_steps, 100);
        assert_eq!(runner.bounded_step_delay, Duration::from_millis(20));
        assert_eq!(runner.duration_tick, Duration::from_millis(250));
        assert_eq!(runner.join_timeout, Duration::from_secs(3));
    }
}
