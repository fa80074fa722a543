//! Text for every [`Message`] variant.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === CONFIGURATION ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigDeleted => "Configuration deleted".to_string(),
            Message::ConfigNotFound => "No configuration file found, nothing to delete".to_string(),
            Message::ConfigInvalid(e) => format!("Invalid configuration: {}", e),
            Message::ConfigSectionPipeline => "Pipeline".to_string(),
            Message::ConfigSectionServer => "Server".to_string(),
            Message::ConfigSectionUser => "User".to_string(),
            Message::PromptSelectSections => "Select sections to configure".to_string(),
            Message::PromptDebounce => "Input debounce (milliseconds)".to_string(),
            Message::PromptIdleTimeout => "Idle timeout (seconds)".to_string(),
            Message::PromptBatchSize => "Records per local batch".to_string(),
            Message::PromptBatchInterval => "Local flush interval (seconds)".to_string(),
            Message::PromptSubmissionConcurrency => "Concurrent submissions".to_string(),
            Message::PromptServerApiUrl => "Collector API URL".to_string(),
            Message::PromptServerAuthToken => "Collector auth token".to_string(),
            Message::PromptUserIdentity => "User identity".to_string(),
            Message::DataDirectory(path) => format!("Data directory: {}", path),

            // === AGENT LIFECYCLE ===
            Message::AgentStarted(source) => format!("Activity agent started ({} source)", source),
            Message::AgentStopping => "Stopping activity agent, draining pending records...".to_string(),
            Message::AgentStopped(committed, lost, dropped) => format!(
                "Activity agent stopped: {} records committed, {} lost, {} raw events dropped",
                committed, lost, dropped
            ),
            Message::AgentStartFailed(e) => format!("Failed to start activity agent: {}", e),
            Message::ProcessorPanicked => "Event processor thread panicked".to_string(),
            Message::WatchLocalOnly => "No server configured, records are stored locally only".to_string(),
            Message::WatchRemoteEnabled(endpoint) => format!("Submitting records to {}", endpoint),
            Message::WatchPressCtrlC => "Watching activity. Press Ctrl+C to stop.".to_string(),
            Message::SignalListenFailed(e) => format!("Failed to listen for Ctrl+C, stopping: {}", e),

            // === PERSISTENCE ===
            Message::BatchWriteFailed(records, failures, e) => {
                format!("Failed to store batch of {} records (attempt {}): {}", records, failures, e)
            }
            Message::BatchDiscarded(records, e) => format!("Discarded batch of {} records after repeated failures: {}", records, e),
            Message::BatcherDrainTimedOut(secs) => format!("Local store did not drain within {}s", secs),
            Message::BatcherDrained(committed, lost) => format!("Local store drained: {} committed, {} lost", committed, lost),
            Message::RecordsLostAtShutdown(count) => format!("{} records could not be stored before shutdown", count),
            Message::RecordRejectedAfterShutdown(id) => format!("Record {} arrived after shutdown and was not stored", id),
            Message::DatabaseOpenFailed(e) => format!("Failed to open activity database: {}", e),
            Message::MigrationFailed(version, e) => format!("Database migration {} failed: {}", version, e),

            // === SUBMISSION ===
            Message::CircuitBreakerOpened(secs) => {
                format!("Collector keeps failing, pausing submissions for {}s", secs)
            }
            Message::SubmissionDropped(id, timestamp, process, attempts, e) => format!(
                "Dropped record {} ({} at {}) after {} attempts: {}",
                id, process, timestamp, attempts, e
            ),
            Message::DispatcherGraceExpired(secs, pending) => {
                format!("Submission grace period of {}s expired with {} records pending", secs, pending)
            }
            Message::DispatcherStopped(delivered, dropped, abandoned) => format!(
                "Submissions stopped: {} delivered, {} dropped, {} abandoned",
                delivered, dropped, abandoned
            ),
            Message::CollectorInitFailed(e) => format!("Failed to set up collector client: {}", e),

            // === STATUS & RECORDS ===
            Message::AgentNotRunning => "Activity agent is not running".to_string(),
            Message::AgentStatusStale(updated) => {
                format!("Last status update was at {}; the agent is probably not running", updated)
            }
            Message::StatusHeader => "Activity agent status".to_string(),
            Message::RecordsNotFound => "No activity records found".to_string(),
            Message::RecordsHeader(shown, total) => format!("Latest {} of {} activity records", shown, total),
        };
        write!(f, "{}", text)
    }
}
