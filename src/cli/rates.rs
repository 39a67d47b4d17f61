use super::ui;
use crate::core::convert::convert;
use crate::core::rates::RateSnapshot;
use crate::service::RatesService;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::Cell;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

pub fn snapshot_table(snapshot: &RateSnapshot) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Rate")]);

    for (code, rate) in snapshot.iter() {
        table.add_row(vec![Cell::new(code), ui::number_cell(rate.normalize().to_string())]);
    }
    table.to_string()
}

fn print_snapshot(title: &str, snapshot: &RateSnapshot) {
    println!("{}", ui::style_text(title, ui::StyleType::Title));
    if snapshot.is_empty() {
        println!(
            "{}",
            ui::style_text("Provider returned no rates", ui::StyleType::Subtle)
        );
    } else {
        println!("{}", snapshot_table(snapshot));
    }
}

fn latest_title(updated: DateTime<Utc>) -> String {
    format!(
        "Latest rates (updated {})",
        updated.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub async fn show_latest(service: &RatesService) -> Result<()> {
    let spinner = ui::new_spinner("Fetching latest rates...");
    let snapshot = service.latest_rates().await;
    spinner.finish_and_clear();

    let snapshot = snapshot?;
    let title = match service.last_updated().await {
        Ok(updated) => latest_title(updated),
        Err(_) => "Latest rates".to_string(),
    };
    print_snapshot(&title, &snapshot);
    Ok(())
}

pub async fn show_historic(service: &RatesService, date: NaiveDate) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Fetching rates for {date}..."));
    let snapshot = service.historic_rates(date).await;
    spinner.finish_and_clear();

    print_snapshot(&format!("Rates on {date}"), &snapshot?);
    Ok(())
}

pub async fn show_last_updated(service: &RatesService) -> Result<()> {
    // make sure the startup refresh has had its turn
    let _ = service.latest_rates().await;
    let updated = service.last_updated().await?;
    println!(
        "{} {}",
        ui::style_text("Last updated:", ui::StyleType::TotalLabel),
        updated.to_rfc3339()
    );
    Ok(())
}

pub async fn show_conversion(
    service: &RatesService,
    amount: Decimal,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let converted = convert(service, amount, from, to, date).await?;
    println!(
        "{} {} = {}",
        amount,
        from.to_uppercase(),
        ui::style_text(
            &format!("{} {}", converted.round_dp(6).normalize(), to.to_uppercase()),
            ui::StyleType::TotalValue
        )
    );
    Ok(())
}

/// Keeps the service running, printing the table whenever a refresh stores
/// new rates, until Ctrl-C.
pub async fn watch(service: &RatesService) -> Result<()> {
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Refreshing every {} seconds, press Ctrl-C to stop",
                service.config().refresh_interval().as_secs()
            ),
            ui::StyleType::Subtle
        )
    );
    let mut shown = None;
    let mut poll = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping watch");
                return Ok(());
            }
            _ = poll.tick() => {
                let Ok(updated) = service.last_updated().await else {
                    continue;
                };
                if shown == Some(updated) {
                    continue;
                }
                match service.latest_rates().await {
                    Ok(snapshot) => {
                        print_snapshot(&latest_title(updated), &snapshot);
                        shown = Some(updated);
                    }
                    Err(e) => println!(
                        "{}",
                        ui::style_text(&format!("Failed to read rates: {e}"), ui::StyleType::Error)
                    ),
                }
            }
        }
    }
}
