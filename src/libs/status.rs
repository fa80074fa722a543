//! Status snapshot of a running agent.
//!
//! The agent publishes its snapshot to `status.json` in the data directory on
//! a fixed cadence so `actrail status` can report on it from another process.

use super::activity::ActivityStatus;
use super::batcher::BatcherStats;
use super::data_storage::DataStorage;
use super::dispatcher::{DispatcherStats, SubmissionOutcome};
use super::processor::ProcessorStats;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const STATUS_FILE_NAME: &str = "status.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub activity_status: ActivityStatus,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub dropped_event_count: u64,
    pub last_flush_time: Option<DateTime<Utc>>,
    pub last_submission_outcome: Option<SubmissionOutcome>,
    pub last_successful_submission: Option<DateTime<Utc>>,
    pub processor: ProcessorStats,
    pub persistence: BatcherStats,
    /// Absent when no remote collector is configured.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub submission: Option<DispatcherStats>,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentStatus {
    /// Writes the snapshot, replacing the previous one in a single rename.
    pub fn publish(&self, storage: &DataStorage) -> Result<()> {
        let path = storage.get_path(STATUS_FILE_NAME)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Last published snapshot, if any.
    pub fn load(storage: &DataStorage) -> Result<Option<AgentStatus>> {
        let path = storage.get_path(STATUS_FILE_NAME)?;
        if !path.exists() {
            return Ok(None);
        }
        let status = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Some(status))
    }

    pub fn remove(storage: &DataStorage) -> Result<()> {
        let path = storage.get_path(STATUS_FILE_NAME)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// A snapshot is stale when it missed several publication rounds, which
    /// means the agent that wrote it is gone.
    pub fn is_stale(&self, now: DateTime<Utc>, publish_interval: Duration) -> bool {
        let allowance = ChronoDuration::from_std(publish_interval * 3).unwrap_or_else(|_| ChronoDuration::zero());
        now - self.updated_at > allowance
    }
}
