use crate::db::records::ActivityRecords;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_info, msg_print};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct RecordsArgs {
    #[arg(long, short, default_value_t = 20, help = "Number of records to show")]
    limit: usize,
}

pub fn cmd(args: RecordsArgs) -> Result<()> {
    let records = ActivityRecords::new()?;
    let total = records.count()?;
    let recent = records.fetch_recent(args.limit)?;

    if recent.is_empty() {
        msg_info!(Message::RecordsNotFound);
        return Ok(());
    }

    msg_print!(Message::RecordsHeader(recent.len(), total), true);
    View::records(&recent)
}
