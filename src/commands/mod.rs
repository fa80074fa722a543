pub mod init;
pub mod records;
pub mod status;
pub mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configure the agent interactively")]
    Init(init::InitArgs),
    #[command(about = "Watch activity and record it until interrupted")]
    Watch,
    #[command(about = "Show the status of the running agent")]
    Status,
    #[command(about = "Show the latest stored activity records")]
    Records(records::RecordsArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::Watch => watch::cmd().await,
            Commands::Status => status::cmd(),
            Commands::Records(args) => records::cmd(args),
        }
    }
}
