//! Configuration for the actrail agent.
//!
//! Settings live in `config.json` inside the data directory (see
//! [`DataStorage`]). A missing file is not an error: every value has a
//! default, so the agent runs with local persistence only until a server is
//! configured.
//!
//! ## Structure
//!
//! ```json
//! {
//!   "pipeline": { "debounce_ms": 50, "idle_timeout_secs": 300, ... },
//!   "server": { "api_url": "https://collector.example", "auth_token": "..." },
//!   "user": "jdoe"
//! }
//! ```
//!
//! - **pipeline**: thresholds for every pipeline stage. Omitted keys keep
//!   their defaults.
//! - **server**: remote collector. Without it the dispatcher is not started.
//! - **user**: identity stamped on records, defaulting to the login name.

use super::batcher::BatcherConfig;
use super::data_storage::DataStorage;
use super::dispatcher::DispatcherConfig;
use super::error::ConfigError;
use super::processor::ProcessorConfig;
use crate::libs::messages::Message;
use crate::msg_print;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Identity used when neither the config nor the environment names a user.
pub const UNKNOWN_USER: &str = "unknown";

/// Pipeline thresholds.
///
/// Durations are stored as integers with the unit in the key name so the
/// JSON stays hand-editable.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum spacing between processed input events.
    pub debounce_ms: u64,
    /// Inactivity after which the status becomes inactive.
    pub idle_timeout_secs: u64,
    /// Cadence of the idle check.
    pub idle_check_interval_secs: u64,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub batch_interval_secs: u64,
    /// Extra attempts for a batch that failed to commit.
    pub flush_retries: u32,
    /// Time each sink gets to drain at shutdown.
    pub shutdown_grace_secs: u64,
    pub submission_concurrency: usize,
    /// Total delivery attempts per record, the first one included.
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub max_pending_submissions: usize,
    pub focus_poll_interval_ms: u64,
    pub status_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            debounce_ms: 50,
            idle_timeout_secs: 300,
            idle_check_interval_secs: 30,
            queue_capacity: 200,
            batch_size: 50,
            batch_interval_secs: 10,
            flush_retries: 3,
            shutdown_grace_secs: 5,
            submission_concurrency: 3,
            retry_attempts: 3,
            retry_base_delay_ms: 5000,
            breaker_failure_threshold: 5,
            breaker_cooldown_secs: 60,
            max_pending_submissions: 1000,
            focus_poll_interval_ms: 1000,
            status_interval_secs: 5,
        }
    }
}

impl PipelineConfig {
    /// Rejects values that would stall or disable a stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero: [(&'static str, u64); 12] = [
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("idle_check_interval_secs", self.idle_check_interval_secs),
            ("queue_capacity", self.queue_capacity as u64),
            ("batch_size", self.batch_size as u64),
            ("batch_interval_secs", self.batch_interval_secs),
            ("submission_concurrency", self.submission_concurrency as u64),
            ("retry_attempts", self.retry_attempts as u64),
            ("breaker_failure_threshold", self.breaker_failure_threshold as u64),
            ("breaker_cooldown_secs", self.breaker_cooldown_secs),
            ("max_pending_submissions", self.max_pending_submissions as u64),
            ("focus_poll_interval_ms", self.focus_poll_interval_ms),
            ("status_interval_secs", self.status_interval_secs),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*field));
        }

        if self.idle_check_interval_secs > self.idle_timeout_secs {
            return Err(ConfigError::Exceeds {
                field: "idle_check_interval_secs",
                value: self.idle_check_interval_secs,
                limit_field: "idle_timeout_secs",
                limit: self.idle_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_interval_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn focus_poll_interval(&self) -> Duration {
        Duration::from_millis(self.focus_poll_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn processor_config(&self, user_identity: impl Into<String>) -> ProcessorConfig {
        ProcessorConfig {
            debounce: self.debounce(),
            idle_timeout: self.idle_timeout(),
            user_identity: user_identity.into(),
        }
    }

    pub fn batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            batch_size: self.batch_size,
            interval: self.batch_interval(),
            flush_retries: self.flush_retries,
            shutdown_grace: self.shutdown_grace(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            concurrency: self.submission_concurrency,
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            breaker_threshold: self.breaker_failure_threshold,
            breaker_cooldown: Duration::from_secs(self.breaker_cooldown_secs),
            max_pending: self.max_pending_submissions,
            shutdown_grace: self.shutdown_grace(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

/// Remote collector endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub api_url: String,
    /// Sent as a bearer token; empty means no authorization header.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Config {
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Removes the configuration file, if any.
    pub fn delete() -> Result<bool> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(false);
        }
        fs::remove_file(config_file_path)?;
        Ok(true)
    }

    /// Identity stamped on records: the configured user, then the login
    /// name from the environment.
    pub fn user_identity(&self) -> String {
        self.user
            .clone()
            .filter(|user| !user.trim().is_empty())
            .or_else(|| env::var("USER").ok())
            .or_else(|| env::var("USERNAME").ok())
            .filter(|user| !user.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    /// Interactive setup. Starts from the current configuration and lets the
    /// user pick which sections to edit.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();

        let sections = [Message::ConfigSectionPipeline, Message::ConfigSectionServer, Message::ConfigSectionUser];
        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptSelectSections.to_string())
            .items(&sections.iter().map(|section| section.to_string()).collect::<Vec<_>>())
            .interact()?;

        for index in selected {
            match index {
                0 => {
                    let default = config.pipeline.clone();
                    msg_print!(Message::ConfigSectionPipeline);
                    config.pipeline = PipelineConfig {
                        debounce_ms: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptDebounce.to_string())
                            .default(default.debounce_ms)
                            .interact_text()?,
                        idle_timeout_secs: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptIdleTimeout.to_string())
                            .default(default.idle_timeout_secs)
                            .interact_text()?,
                        batch_size: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptBatchSize.to_string())
                            .default(default.batch_size)
                            .interact_text()?,
                        batch_interval_secs: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptBatchInterval.to_string())
                            .default(default.batch_interval_secs)
                            .interact_text()?,
                        submission_concurrency: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptSubmissionConcurrency.to_string())
                            .default(default.submission_concurrency)
                            .interact_text()?,
                        ..default
                    };
                    config.pipeline.validate()?;
                }
                1 => {
                    let default = config.server.clone().unwrap_or(ServerConfig {
                        api_url: "".to_string(),
                        auth_token: "".to_string(),
                        request_timeout_secs: default_request_timeout(),
                    });
                    msg_print!(Message::ConfigSectionServer);
                    config.server = Some(ServerConfig {
                        api_url: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptServerApiUrl.to_string())
                            .default(default.api_url)
                            .interact_text()?,
                        auth_token: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptServerAuthToken.to_string())
                            .default(default.auth_token)
                            .allow_empty(true)
                            .interact_text()?,
                        ..default
                    });
                }
                2 => {
                    let user: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptUserIdentity.to_string())
                        .default(config.user_identity())
                        .interact_text()?;
                    config.user = Some(user);
                }
                _ => {}
            }
        }

        Ok(config)
    }
}
