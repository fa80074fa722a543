//! Core library modules for actrail.
//!
//! The pipeline, leaf to root:
//!
//! ```text
//! source ──▶ queue ──▶ processor ──┬──▶ batcher ──▶ local store
//!                                  └──▶ dispatcher ──▶ remote collector
//! ```
//!
//! [`agent`] wires the stages together and owns their lifecycle.

pub mod activity;
pub mod agent;
pub mod batcher;
pub mod breaker;
pub mod config;
pub mod data_storage;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod logging;
pub mod messages;
pub mod platform;
pub mod processor;
pub mod queue;
pub mod source;
pub mod status;
pub mod view;
