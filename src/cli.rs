use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use gotw_dispatch::week::WeekSeed;

/// Game-of-the-week announcer for BonjourArcade
#[derive(Parser)]
#[command(name = "gotw", version)]
#[command(about = "Resolves the game of the week and sends its announcement", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ./gotw.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send the announcement to the mailing list and/or chat webhooks
    Send(SendArgs),
    /// Check the ConvertKit API secret with one authenticated request
    TestApi {
        /// Override the ConvertKit API base URL
        #[arg(long)]
        mail_api_url: Option<String>,
    },
    /// Report whether a week's announcement is ready to send
    Check {
        /// Week to check (YYYYWW); defaults to the current week
        #[arg(long, conflicts_with = "next_week")]
        week_seed: Option<WeekSeed>,
        /// Check next week instead of the current one
        #[arg(long)]
        next_week: bool,
    },
    /// Print whether the site should list a game as a past game of the week
    Status {
        game_id: String,
    },
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Compose and print everything, send nothing
    #[arg(long)]
    pub dry_run: bool,
    /// Send only the email
    #[arg(long, conflicts_with_all = ["webhook_only", "webhook_label", "all_channels"])]
    pub mail_only: bool,
    /// Send only to webhooks
    #[arg(long, conflicts_with = "all_channels")]
    pub webhook_only: bool,
    /// Send the email and every webhook in one pass
    #[arg(long)]
    pub all_channels: bool,
    /// Only send to this webhook label
    #[arg(long)]
    pub webhook_label: Option<String>,
    /// Channels to send to, each in its own pass; `email` selects the mailing list
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["mail_only", "webhook_only", "webhook_label", "all_channels"])]
    pub select: Vec<String>,
    /// Label -> {env, type} JSON map (defaults to the configured path)
    #[arg(long)]
    pub webhook_map: Option<PathBuf>,
    /// Announcement text to use instead of the record's announcement_message
    #[arg(long)]
    pub custom_message: Option<String>,
    /// Week to announce (YYYYWW); defaults to the current week
    #[arg(long)]
    pub week_seed: Option<WeekSeed>,
    /// Override the ConvertKit API base URL
    #[arg(long)]
    pub mail_api_url: Option<String>,
}
