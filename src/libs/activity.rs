//! Activity timeline types produced by the event processor.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

/// Title reported when focus is on the desktop or no window at all.
pub const NO_FOCUS_TITLE: &str = "Desktop/No Active Window";
/// Process name reported when focus is on the desktop or no window at all.
pub const NO_FOCUS_PROCESS: &str = "Desktop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    #[default]
    Inactive,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ActivityStatus::Active),
            "inactive" => Ok(ActivityStatus::Inactive),
            other => Err(format!("unknown activity status '{}'", other)),
        }
    }
}

/// Why the processor emitted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTrigger {
    /// Inactive -> Active after input.
    Activated,
    /// Active -> Inactive after the idle timeout, or at shutdown.
    Deactivated,
    /// Significant change of the focused window.
    WindowChanged,
}

impl RecordTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTrigger::Activated => "activated",
            RecordTrigger::Deactivated => "deactivated",
            RecordTrigger::WindowChanged => "window_changed",
        }
    }
}

impl fmt::Display for RecordTrigger {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activated" => Ok(RecordTrigger::Activated),
            "deactivated" => Ok(RecordTrigger::Deactivated),
            "window_changed" => Ok(RecordTrigger::WindowChanged),
            other => Err(format!("unknown record trigger '{}'", other)),
        }
    }
}

/// Title and owning process of the focused window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub title: String,
    pub process_name: String,
}

impl WindowSnapshot {
    pub fn new(title: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            process_name: process_name.into(),
        }
    }

    pub fn no_focus() -> Self {
        Self::new(NO_FOCUS_TITLE, NO_FOCUS_PROCESS)
    }
}

/// Default significance predicate: a change matters only if the title or the
/// process name differs.
pub fn title_or_process_changed(previous: &WindowSnapshot, next: &WindowSnapshot) -> bool {
    previous.title != next.title || previous.process_name != next.process_name
}

/// One entry of the activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub window_title: String,
    pub process_name: String,
    pub user_identity: String,
    pub activity_status: ActivityStatus,
    pub trigger: RecordTrigger,
    /// Length of the idle period that an `Activated` record ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_seconds: Option<u64>,
}

impl ActivityRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        window: &WindowSnapshot,
        user_identity: &str,
        activity_status: ActivityStatus,
        trigger: RecordTrigger,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            window_title: window.title.clone(),
            process_name: window.process_name.clone(),
            user_identity: user_identity.to_string(),
            activity_status,
            trigger,
            idle_seconds: None,
        }
    }

    pub fn with_idle_seconds(mut self, idle_seconds: Option<u64>) -> Self {
        self.idle_seconds = idle_seconds;
        self
    }
}

/// Maps a monotonic instant to wall-clock time, anchored at `(now, now_wall)`.
pub fn wall_clock_at(instant: Instant, now: Instant, now_wall: DateTime<Utc>) -> DateTime<Utc> {
    if instant <= now {
        let behind = ChronoDuration::from_std(now - instant).unwrap_or_else(|_| ChronoDuration::zero());
        now_wall - behind
    } else {
        let ahead = ChronoDuration::from_std(instant - now).unwrap_or_else(|_| ChronoDuration::zero());
        now_wall + ahead
    }
}
