use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "waypoints")]
#[command(about = "Loyalty point ledger - turns traveler actions into tier-aware point awards")]
#[command(version)]
struct Cli {
    /// Path to the ledger database (defaults to ~/.waypoints/ledger.db)
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Path to a loyalty config file (defaults to the built-in tables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit an action for point credit
    Submit {
        /// User identifier
        #[arg(long)]
        user: String,

        /// Action kind (booking, social_follow, review, app_download, content_share)
        #[arg(long)]
        action: String,

        /// Base points before the tier multiplier
        #[arg(long)]
        points: u32,

        /// Metadata entries as key=value (repeatable)
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Show whether a user can currently earn from an action
    Eligibility {
        #[arg(long)]
        user: String,

        #[arg(long)]
        action: String,
    },

    /// Show a user's tier, balance, and benefits
    Tier {
        #[arg(long)]
        user: String,
    },

    /// Show a user's most recent point awards
    History {
        #[arg(long)]
        user: String,

        /// Maximum number of records
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let ledger = cli::open_ledger(cli.db, cli.config.as_deref())?;

    match cli.command {
        Commands::Submit {
            user,
            action,
            points,
            meta,
        } => cli::submit_command(&ledger, &user, &action, points, &meta)?,
        Commands::Eligibility { user, action } => {
            cli::eligibility_command(&ledger, &user, &action)?
        }
        Commands::Tier { user } => cli::tier_command(&ledger, &user)?,
        Commands::History { user, limit } => cli::history_command(&ledger, &user, limit)?,
    }

    Ok(())
}
