//! Logger Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `CANLOG_*`
//! environment variables (`CANLOG_PIPELINE__QUEUE_CAPACITY=200`).

use can_bus::{InitPolicy, SimulatedConfig};
use pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "can-logger";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CANLOG";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub pipeline: PipelineSection,
    pub controller: ControllerSection,
    pub storage: StorageSection,
    pub status: StatusSection,
    pub logging: LoggingSection,
}

/// Queue, arena and task timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub arena_capacity: usize,
    pub flush_every: u64,
    pub swap_poll_ms: u64,
    pub writer_poll_ms: u64,
    pub capture_idle_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            enqueue_timeout_ms: 10,
            arena_capacity: 4096,
            flush_every: 400,
            swap_poll_ms: 1,
            writer_poll_ms: 1,
            capture_idle_ms: 1,
        }
    }
}

impl PipelineSection {
    /// Convert to the pipeline's own config
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.queue_capacity,
            enqueue_timeout: Duration::from_millis(self.enqueue_timeout_ms),
            arena_capacity: self.arena_capacity,
            flush_every: self.flush_every,
            swap_poll: Duration::from_millis(self.swap_poll_ms),
            writer_poll: Duration::from_millis(self.writer_poll_ms),
            capture_idle: Duration::from_millis(self.capture_idle_ms),
        }
    }
}

/// Bus controller bring-up
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub init_attempts: u8,
    pub init_retry_delay_ms: u64,
    pub init_rounds: u8,
    pub init_round_delay_ms: u64,
    pub bitrate: u32,
    pub simulated_rate_hz: f64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            init_attempts: 3,
            init_retry_delay_ms: 100,
            init_rounds: 2,
            init_round_delay_ms: 1000,
            bitrate: 500_000,
            simulated_rate_hz: 1000.0,
        }
    }
}

impl ControllerSection {
    /// Retry policy for initialization
    pub fn init_policy(&self) -> InitPolicy {
        InitPolicy {
            attempts: self.init_attempts,
            retry_delay: Duration::from_millis(self.init_retry_delay_ms),
            rounds: self.init_rounds,
            round_delay: Duration::from_millis(self.init_round_delay_ms),
        }
    }

    /// Settings for the simulated controller
    pub fn simulated(&self) -> SimulatedConfig {
        SimulatedConfig {
            rate_hz: self.simulated_rate_hz,
            bitrate: self.bitrate,
            ..Default::default()
        }
    }
}

/// Trace log destination
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub enabled: bool,
    pub directory: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("./logs"),
        }
    }
}

/// Status display cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub sample_interval_ms: u64,
    pub health_interval_ms: u64,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            health_interval_ms: 5000,
        }
    }
}

impl StatusSection {
    /// Throughput sampling interval
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    /// Health report interval
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }
}

/// Tracing output
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggerConfig {
    /// Load from `path` (required) or the default file (optional), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: LoggerConfig = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .to_pipeline_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.controller.simulated_rate_hz < 0.0 {
            return Err(ConfigError::Invalid(
                "controller.simulated_rate_hz must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
