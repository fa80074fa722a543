//! Error taxonomy for the activity pipeline.
//!
//! Only [`SourceError`] (wrapped in [`AgentError`]) is ever surfaced to the
//! caller of the agent. Every other error is recovered inside the stage that
//! produced it and shows up in telemetry instead.

use thiserror::Error;

/// Failure to register or run an event source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("event source '{0}' is already registered")]
    AlreadyRegistered(&'static str),
    #[error("failed to start event source '{name}': {reason}")]
    StartFailed { name: &'static str, reason: String },
}

/// Window metadata could not be resolved.
///
/// Distinct from "no focus", which resolvers report as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("window {0} is no longer in the foreground")]
    Stale(String),
    #[error("window lookup failed: {0}")]
    Lookup(String),
}

/// Failure to commit a batch to the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure to deliver a record to the remote collector.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector rejected record with status {0}")]
    Status(u16),
    #[error("collector unavailable: {0}")]
    Unavailable(String),
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' must be greater than zero")]
    Zero(&'static str),
    #[error("'{field}' ({value}) must not exceed '{limit_field}' ({limit})")]
    Exceeds {
        field: &'static str,
        value: u64,
        limit_field: &'static str,
        limit: u64,
    },
}

/// Fatal errors raised while starting the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to spawn processor thread: {0}")]
    Thread(#[from] std::io::Error),
}
