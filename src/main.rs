use actrail::commands::Cli;
use actrail::libs::logging;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    Cli::menu().await
}
