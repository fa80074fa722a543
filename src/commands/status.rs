use crate::libs::config::Config;
use crate::libs::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::libs::status::AgentStatus;
use crate::libs::view::View;
use crate::{msg_info, msg_print, msg_warning};
use anyhow::Result;
use chrono::{Local, Utc};

pub fn cmd() -> Result<()> {
    let config = Config::read()?;
    let Some(status) = AgentStatus::load(&DataStorage::new())? else {
        msg_info!(Message::AgentNotRunning);
        return Ok(());
    };

    if status.is_stale(Utc::now(), config.pipeline.status_interval()) {
        let updated = status.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
        msg_warning!(Message::AgentStatusStale(updated));
    }

    msg_print!(Message::StatusHeader, true);
    View::status(&status)
}
