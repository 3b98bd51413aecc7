use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "birthday-notifier")]
#[command(about = "Daily birthday notifications for a team roster, delivered over Telegram")]
pub struct Cli {
    /// TOML configuration file; the environment is used when it does not exist
    #[arg(short, long, global = true, default_value = "notifier.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the daily scheduler until interrupted (default)
    Serve,
    /// Run one notification pass immediately and exit
    RunNow,
    /// List birthdays in the coming days
    Upcoming {
        #[arg(short, long, default_value = "7", value_parser = clap::value_parser!(u32).range(0..=366))]
        days: u32,
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every roster record in file order
    List,
    /// Print the greeting that would be sent for the given names
    Greet {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Validate configuration, roster and bot credentials
    Check {
        /// Skip the getMe call against the Bot API
        #[arg(long)]
        offline: bool,
    },
    /// Import records from a CSV export into the roster
    Import {
        file: PathBuf,
        #[arg(long)]
        name_column: Option<String>,
        #[arg(long)]
        birthday_column: Option<String>,
        /// Keep existing records and add the imported ones after them
        #[arg(long)]
        append: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
