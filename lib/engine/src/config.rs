//! Engine configuration.
//!
//! Loaded via the `config` crate from `FLOWLINE__*` environment variables;
//! every field has a default so an empty environment is valid.

use chrono::TimeDelta;
use serde::Deserialize;
use std::time::Duration;

/// How `continue_workflow` picks an execution when several could match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Only executions of the event's own workflow are considered.
    #[default]
    Exact,
    /// Fall back to the recipient's most recently active execution of any
    /// workflow inside the resume window.
    RecipientRecency,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Maximum node transitions per `advance` before the execution fails.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Wait used by delay nodes without a configured duration, in seconds.
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: u64,

    /// Only `Running` executions active within this window are resumable.
    #[serde(default = "default_resume_window_minutes")]
    pub resume_window_minutes: i64,

    #[serde(default)]
    pub resume_policy: ResumePolicy,

    /// Age after which finished executions may be evicted, in minutes.
    #[serde(default = "default_finished_retention_minutes")]
    pub finished_retention_minutes: i64,

    /// Timeout for webhook node requests, in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

fn default_max_hops() -> usize {
    100
}

fn default_delay_secs() -> u64 {
    60
}

fn default_resume_window_minutes() -> i64 {
    30
}

fn default_finished_retention_minutes() -> i64 {
    24 * 60
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            default_delay_secs: default_delay_secs(),
            resume_window_minutes: default_resume_window_minutes(),
            resume_policy: ResumePolicy::default(),
            finished_retention_minutes: default_finished_retention_minutes(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// `FLOWLINE__MAX_HOPS=50` sets `max_hops`, and so on.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FLOWLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn default_delay(&self) -> Duration {
        Duration::from_secs(self.default_delay_secs)
    }

    #[must_use]
    pub fn resume_window(&self) -> TimeDelta {
        TimeDelta::minutes(self.resume_window_minutes)
    }

    #[must_use]
    pub fn finished_retention(&self) -> TimeDelta {
        TimeDelta::minutes(self.finished_retention_minutes)
    }

    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
