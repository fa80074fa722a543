//! Remote collector integration.
//!
//! The dispatcher only depends on [`RemoteCollector`]; [`HttpCollector`] is
//! the shipped implementation that posts records to the configured server.

use crate::libs::activity::ActivityRecord;
use crate::libs::error::SubmitError;
use std::future::Future;

pub mod collector;

pub use collector::HttpCollector;

/// Delivers one activity record to the remote side.
///
/// Every `Err` is treated the same way by the dispatcher: it counts as a
/// failed attempt and is retried with backoff.
pub trait RemoteCollector: Send + Sync + 'static {
    fn submit(&self, record: &ActivityRecord) -> impl Future<Output = Result<(), SubmitError>> + Send;
}
