use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use fxrates::core::log::init_logging;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the latest exchange rates
    Latest,
    /// Display exchange rates for a date (YYYY-MM-DD)
    Historic { date: NaiveDate },
    /// Display when the latest rates were retrieved
    Updated,
    /// Convert an amount between two currencies
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        /// Use the rates of this date instead of the latest
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Keep refreshing rates until interrupted
    Watch,
}

impl From<Commands> for fxrates::AppCommand {
    fn from(cmd: Commands) -> fxrates::AppCommand {
        match cmd {
            Commands::Latest => fxrates::AppCommand::Latest,
            Commands::Historic { date } => fxrates::AppCommand::Historic(date),
            Commands::Updated => fxrates::AppCommand::Updated,
            Commands::Convert {
                amount,
                from,
                to,
                date,
            } => fxrates::AppCommand::Convert {
                amount,
                from,
                to,
                date,
            },
            Commands::Watch => fxrates::AppCommand::Watch,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxrates::cli::setup::setup(),
        Some(cmd) => fxrates::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
