use super::activity::ActivityRecord;
use super::status::AgentStatus;
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use prettytable::{row, Table};

pub struct View {}

fn local_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn optional_time(timestamp: &Option<DateTime<Utc>>) -> String {
    timestamp.as_ref().map(local_time).unwrap_or_else(|| "-".to_string())
}

impl View {
    pub fn records(records: &[ActivityRecord]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["TIME", "STATUS", "TRIGGER", "PROCESS", "WINDOW", "IDLE (S)"]);
        for record in records {
            table.add_row(row![
                local_time(&record.timestamp),
                record.activity_status,
                record.trigger,
                record.process_name,
                record.window_title,
                record.idle_seconds.map(|secs| secs.to_string()).unwrap_or_default()
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn status(status: &AgentStatus) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["Activity status", status.activity_status]);
        table.add_row(row!["Started", local_time(&status.started_at)]);
        table.add_row(row!["Updated", local_time(&status.updated_at)]);
        table.add_row(row!["Queue depth", format!("{} / {}", status.queue_depth, status.queue_capacity)]);
        table.add_row(row!["Dropped events", status.dropped_event_count]);
        table.add_row(row!["Inputs processed", status.processor.inputs_processed]);
        table.add_row(row!["Inputs debounced", status.processor.inputs_debounced]);
        table.add_row(row!["Window changes", status.processor.window_changes]);
        table.add_row(row!["Resolution failures", status.processor.resolution_failures]);
        table.add_row(row!["Records committed", status.persistence.committed]);
        table.add_row(row!["Records pending", status.persistence.pending]);
        table.add_row(row!["Records lost", status.persistence.lost]);
        table.add_row(row!["Last flush", optional_time(&status.last_flush_time)]);

        match &status.submission {
            Some(submission) => {
                table.add_row(row!["Delivered", submission.delivered]);
                table.add_row(row!["Submissions pending", submission.pending]);
                table.add_row(row!["Submissions dropped", submission.dropped + submission.rejected]);
                table.add_row(row!["Circuit breaker", submission.breaker]);
                table.add_row(row![
                    "Last submission",
                    status
                        .last_submission_outcome
                        .map(|outcome| format!("{:?}", outcome).to_lowercase())
                        .unwrap_or_else(|| "-".to_string())
                ]);
                table.add_row(row!["Last success", optional_time(&status.last_successful_submission)]);
            }
            None => {
                table.add_row(row!["Remote submission", "disabled"]);
            }
        }
        table.printstd();

        Ok(())
    }
}
