//! Event processor: debouncing, window-change coalescing and the
//! Active/Inactive state machine.
//!
//! The processor is the only place where activity state changes. It lives on
//! a single dedicated thread ([`run_processor`]) and publishes a read-only
//! [`ProcessorView`] for everybody else.
//!
//! ## State machine
//!
//! ```text
//!            input (not debounced)
//!   Inactive ─────────────────────▶ Active
//!      ▲                              │
//!      └──────── idle timeout ────────┘
//! ```
//!
//! Two thresholds are involved and they are independent:
//! - **debounce** drops input events arriving within a short spacing of the
//!   last *processed* input, so a burst of key presses costs one state check;
//! - **idle timeout** moves Active to Inactive once no input has been
//!   processed for that long. It is evaluated on idle ticks and again as of
//!   every event's timestamp, so input arriving before the next tick still
//!   closes the idle period it ends.

use super::activity::{title_or_process_changed, wall_clock_at, ActivityRecord, ActivityStatus, RecordTrigger, WindowSnapshot};
use super::event::{EventKind, RawEvent, WindowHandle};
use super::queue::{EventQueue, Popped};
use super::source::WindowResolver;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reference debounce spacing for input events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);
/// Reference idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Decides whether a new window snapshot differs enough from the last emitted
/// one to be recorded.
pub type SignificanceFn = fn(&WindowSnapshot, &WindowSnapshot) -> bool;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub debounce: Duration,
    pub idle_timeout: Duration,
    pub user_identity: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            user_identity: String::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorStats {
    pub inputs_processed: u64,
    pub inputs_debounced: u64,
    pub window_changes: u64,
    pub window_changes_suppressed: u64,
    pub resolution_failures: u64,
    pub records_emitted: u64,
}

/// What the processor thread publishes for status readers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorView {
    pub status: ActivityStatus,
    pub stats: ProcessorStats,
}

pub struct EventProcessor {
    config: ProcessorConfig,
    resolver: Box<dyn WindowResolver>,
    significance: SignificanceFn,
    status: ActivityStatus,
    last_input: Option<Instant>,
    inactive_since: Option<Instant>,
    last_window: Option<WindowSnapshot>,
    stats: ProcessorStats,
}

impl EventProcessor {
    pub fn new(config: ProcessorConfig, resolver: impl WindowResolver + 'static) -> Self {
        Self::with_boxed_resolver(config, Box::new(resolver))
    }

    pub fn with_boxed_resolver(config: ProcessorConfig, resolver: Box<dyn WindowResolver>) -> Self {
        Self {
            config,
            resolver,
            significance: title_or_process_changed,
            status: ActivityStatus::Inactive,
            last_input: None,
            inactive_since: None,
            last_window: None,
            stats: ProcessorStats::default(),
        }
    }

    /// Replaces the default title-or-process significance predicate.
    pub fn with_significance(mut self, significance: SignificanceFn) -> Self {
        self.significance = significance;
        self
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    pub fn view(&self) -> ProcessorView {
        ProcessorView {
            status: self.status,
            stats: self.stats,
        }
    }

    pub fn last_window(&self) -> Option<&WindowSnapshot> {
        self.last_window.as_ref()
    }

    /// Processes one dequeued event, returning the records it produced in
    /// decision order.
    ///
    /// An idle timeout that lapsed before the event is applied first, so an
    /// input ending an unnoticed idle period yields Deactivated then Activated.
    pub fn handle(&mut self, event: RawEvent) -> Vec<ActivityRecord> {
        let mut records: Vec<ActivityRecord> = self.check_idle(event.timestamp).into_iter().collect();
        let record = match event.kind {
            EventKind::Input => self.handle_input(event.timestamp),
            EventKind::WindowFocusChange(handle) => self.handle_focus(event.timestamp, handle),
        };
        if let Some(record) = record {
            self.stats.records_emitted += 1;
            records.push(record);
        }
        records
    }

    fn handle_input(&mut self, at: Instant) -> Option<ActivityRecord> {
        if let Some(last) = self.last_input {
            if at.saturating_duration_since(last) < self.config.debounce {
                self.stats.inputs_debounced += 1;
                return None;
            }
        }

        self.last_input = Some(at);
        self.stats.inputs_processed += 1;

        if self.status == ActivityStatus::Active {
            return None;
        }

        let idle_seconds = self.inactive_since.take().map(|since| at.saturating_duration_since(since).as_secs());
        self.status = ActivityStatus::Active;
        tracing::debug!(idle_seconds = ?idle_seconds, "activity status -> active");

        Some(self.record(at, RecordTrigger::Activated).with_idle_seconds(idle_seconds))
    }

    fn handle_focus(&mut self, at: Instant, handle: Option<WindowHandle>) -> Option<ActivityRecord> {
        let snapshot = match handle {
            None => WindowSnapshot::no_focus(),
            Some(handle) => match self.resolver.resolve(&handle) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => WindowSnapshot::no_focus(),
                Err(e) => {
                    self.stats.resolution_failures += 1;
                    tracing::warn!(window = %handle, error = %e, "window metadata unavailable, focus change dropped");
                    return None;
                }
            },
        };

        let significant = match &self.last_window {
            None => true,
            Some(previous) => (self.significance)(previous, &snapshot),
        };
        if !significant {
            self.stats.window_changes_suppressed += 1;
            return None;
        }

        tracing::debug!(process = %snapshot.process_name, title = %snapshot.title, "focused window changed");
        self.last_window = Some(snapshot);
        self.stats.window_changes += 1;

        Some(self.record(at, RecordTrigger::WindowChanged))
    }

    /// Applies the idle timeout as of `now`.
    ///
    /// The Inactive record is stamped at the idle boundary (last processed
    /// input plus the timeout), not at the moment the check ran.
    pub fn check_idle(&mut self, now: Instant) -> Option<ActivityRecord> {
        if self.status != ActivityStatus::Active {
            return None;
        }
        let boundary = self.last_input? + self.config.idle_timeout;
        if now < boundary {
            return None;
        }

        self.status = ActivityStatus::Inactive;
        self.inactive_since = Some(boundary);
        self.stats.records_emitted += 1;
        tracing::debug!(idle_timeout = ?self.config.idle_timeout, "activity status -> inactive");

        Some(self.record(boundary, RecordTrigger::Deactivated))
    }

    /// Closes an open active period when the stream ends.
    pub fn finish(&mut self, now: Instant) -> Option<ActivityRecord> {
        if self.status != ActivityStatus::Active {
            return None;
        }
        self.status = ActivityStatus::Inactive;
        self.inactive_since = Some(now);
        self.stats.records_emitted += 1;

        Some(self.record(now, RecordTrigger::Deactivated))
    }

    fn record(&self, at: Instant, trigger: RecordTrigger) -> ActivityRecord {
        let timestamp = wall_clock_at(at, Instant::now(), Utc::now());
        let unknown = WindowSnapshot::new("", "");
        let window = self.last_window.as_ref().unwrap_or(&unknown);
        ActivityRecord::new(timestamp, window, &self.config.user_identity, self.status, trigger)
    }
}

/// Consumes `queue` until it is shut down and drained.
///
/// Every produced record is handed to `emit` in decision order, after the new
/// state has been published to `view`.
pub fn run_processor<F>(queue: Arc<EventQueue>, mut processor: EventProcessor, view: Arc<RwLock<ProcessorView>>, mut emit: F) -> ProcessorStats
where
    F: FnMut(ActivityRecord),
{
    loop {
        let (records, closed) = match queue.pop_item() {
            Popped::Event(event) => (processor.handle(event), false),
            Popped::IdleTick => (processor.check_idle(Instant::now()).into_iter().collect(), false),
            Popped::Closed => (processor.finish(Instant::now()).into_iter().collect(), true),
        };

        *view.write() = processor.view();
        for record in records {
            emit(record);
        }
        if closed {
            break;
        }
    }

    processor.stats()
}
