pub mod cli;
pub mod core;
pub mod providers;
pub mod service;
pub mod store;
pub mod transport;

use crate::core::config::AppConfig;
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service::RatesService;
use tracing::{debug, info};

pub enum AppCommand {
    Latest,
    Historic(NaiveDate),
    Updated,
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        date: Option<NaiveDate>,
    },
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxrates starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = RatesService::start(config).await?;

    let result = match command {
        AppCommand::Latest => cli::rates::show_latest(&service).await,
        AppCommand::Historic(date) => cli::rates::show_historic(&service, date).await,
        AppCommand::Updated => cli::rates::show_last_updated(&service).await,
        AppCommand::Convert {
            amount,
            from,
            to,
            date,
        } => cli::rates::show_conversion(&service, amount, &from, &to, date).await,
        AppCommand::Watch => cli::rates::watch(&service).await,
    };

    service.shutdown().await?;
    result
}
