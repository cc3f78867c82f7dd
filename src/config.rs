//! Configuration management for slidegate.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, SlidegateError};

/// Main configuration for slidegate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlidegateConfig {
    /// Limiter policy
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Demo driver settings
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Sliding-window policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Length of the trailing window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Admissions allowed per key inside one window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_window_secs() -> f64 {
    10.0
}

fn default_max_requests() -> usize {
    1
}

impl LimiterConfig {
    /// The window as a [`Duration`].
    ///
    /// Fails unless `window_secs` is finite and strictly positive.
    pub fn window(&self) -> Result<Duration> {
        let window = Duration::try_from_secs_f64(self.window_secs).map_err(|e| {
            SlidegateError::InvalidWindow(format!("window_secs = {}: {}", self.window_secs, e))
        })?;

        if window.is_zero() {
            return Err(SlidegateError::InvalidWindow(format!(
                "window_secs = {}: must be greater than zero",
                self.window_secs
            )));
        }

        Ok(window)
    }
}

/// Settings for the synthetic message stream replayed by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of rounds to replay
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Messages sent per round
    #[serde(default = "default_messages_per_round")]
    pub messages_per_round: u32,

    /// Distinct users the messages are spread across
    #[serde(default = "default_users")]
    pub users: u32,

    /// Lower bound of the random delay between messages
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the random delay between messages
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Pause between rounds in seconds
    #[serde(default = "default_pause_secs")]
    pub pause_secs: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            messages_per_round: default_messages_per_round(),
            users: default_users(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            pause_secs: default_pause_secs(),
        }
    }
}

fn default_rounds() -> u32 {
    2
}

fn default_messages_per_round() -> u32 {
    10
}

fn default_users() -> u32 {
    5
}

fn default_min_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_pause_secs() -> f64 {
    4.0
}

impl DemoConfig {
    /// The pause between rounds as a [`Duration`].
    pub fn pause(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.pause_secs).map_err(|e| {
            SlidegateError::Config(format!("pause_secs = {}: {}", self.pause_secs, e))
        })
    }

    /// Check that the stream can be generated.
    pub fn validate(&self) -> Result<()> {
        if self.users == 0 {
            return Err(SlidegateError::Config(
                "demo.users must be at least 1".to_string(),
            ));
        }

        if self.min_delay_ms > self.max_delay_ms {
            return Err(SlidegateError::Config(format!(
                "demo.min_delay_ms ({}) exceeds demo.max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }

        // Message ids run from 1 to rounds * messages_per_round.
        let last_id = self
            .rounds
            .checked_mul(self.messages_per_round)
            .and_then(|total| total.checked_add(1));
        if last_id.is_none() {
            return Err(SlidegateError::Config(format!(
                "demo.rounds ({}) * demo.messages_per_round ({}) is too large",
                self.rounds, self.messages_per_round
            )));
        }

        self.pause()?;
        Ok(())
    }
}

/// Values that replace what the configuration file says.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `limiter.window_secs`
    pub window_secs: Option<f64>,
    /// Replaces `limiter.max_requests`
    pub max_requests: Option<usize>,
    /// Replaces `demo.messages_per_round`
    pub messages_per_round: Option<u32>,
    /// Replaces `demo.users`
    pub users: Option<u32>,
}

impl SlidegateConfig {
    /// Load and validate configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Self::parse_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without validating its values.
    ///
    /// For callers that still apply overrides before calling
    /// [`validate`](Self::validate).
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::parse_yaml(&contents)
    }

    /// Parse a YAML string without validating its values.
    pub fn parse_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SlidegateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Replace every value that `overrides` sets.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(window_secs) = overrides.window_secs {
            self.limiter.window_secs = window_secs;
        }
        if let Some(max_requests) = overrides.max_requests {
            self.limiter.max_requests = max_requests;
        }
        if let Some(messages) = overrides.messages_per_round {
            self.demo.messages_per_round = messages;
        }
        if let Some(users) = overrides.users {
            self.demo.users = users;
        }
    }

    /// Check that every section holds usable values.
    pub fn validate(&self) -> Result<()> {
        self.limiter.window()?;
        self.demo.validate()
    }
}
