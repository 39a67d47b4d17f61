//! Currency conversion on top of the rate service

use crate::core::error::ConversionError;
use crate::core::rates::RateSnapshot;
use crate::service::RatesService;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Converts `amount` from one currency to another using the latest rates, or
/// the rates of `date` when given.
pub async fn convert(
    service: &RatesService,
    amount: Decimal,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<Decimal, ConversionError> {
    let rates = match date {
        Some(d) => service.historic_rates(d).await,
        None => service.latest_rates().await,
    }
    .map_err(|source| ConversionError::RatesUnavailable { date, source })?;

    convert_with(&rates, amount, from, to, date)
}

/// Converts with a snapshot whose rates are all relative to one base currency.
pub fn convert_with(
    rates: &RateSnapshot,
    amount: Decimal,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<Decimal, ConversionError> {
    let rate = |code: &str| {
        rates
            .get(code)
            .ok_or_else(|| ConversionError::UnknownCurrency {
                currency: code.trim().to_uppercase(),
                date,
            })
    };

    let from_rate = rate(from)?;
    let to_rate = rate(to)?;
    if from_rate.is_zero() {
        return Err(ConversionError::ZeroRate {
            currency: from.trim().to_uppercase(),
        });
    }
    amount
        .checked_div(from_rate)
        .and_then(|base| base.checked_mul(to_rate))
        .ok_or_else(|| ConversionError::Overflow {
            amount,
            from: from.trim().to_uppercase(),
            to: to.trim().to_uppercase(),
        })
}
