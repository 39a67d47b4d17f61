//! Error types surfaced by the rate service.
//!
//! Transport and decode failures are returned as data, never panics. A missing
//! cache record is not an error at all; it shows up as `None` from the store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RatesError {
    /// Invalid or missing configuration, raised once at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request could not be sent or the connection failed.
    #[error("Request error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The request exceeded the transport timeout.
    #[error("Request timed out for {url}")]
    Timeout { url: String },

    /// The provider answered with a status other than 2xx or 304.
    #[error("HTTP error: {status} for {url}")]
    Status { url: String, status: u16 },

    /// The provider body could not be turned into a rate table.
    #[error("Failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },

    /// The provider kept answering "not modified" while nothing is cached.
    #[error("{provider} reported no changes but no rates are cached")]
    NotModifiedWithoutData { provider: String },

    /// No latest-rates refresh has ever been stored.
    #[error("Latest rates have never been retrieved")]
    NeverUpdated,

    #[error("Rate store error: {0}")]
    Store(String),

    /// The service worker has stopped and can no longer answer.
    #[error("Exchange rate service is not running")]
    ServiceStopped,
}

impl RatesError {
    pub fn decode(provider: &str, message: impl Into<String>) -> Self {
        RatesError::Decode {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<fjall::Error> for RatesError {
    fn from(e: fjall::Error) -> Self {
        RatesError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for RatesError {
    fn from(e: serde_json::Error) -> Self {
        RatesError::Store(e.to_string())
    }
}

/// Errors reported to code converting an amount between currencies.
///
/// `UnknownCurrency` means rates were available but did not list the code;
/// `RatesUnavailable` means no rates could be obtained for the date.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("No exchange rate for {currency}{}", on_date(.date))]
    UnknownCurrency {
        currency: String,
        date: Option<NaiveDate>,
    },

    #[error("Exchange rates unavailable{}: {source}", on_date(.date))]
    RatesUnavailable {
        date: Option<NaiveDate>,
        source: RatesError,
    },

    #[error("Exchange rate for {currency} is zero")]
    ZeroRate { currency: String },

    /// The converted amount does not fit in a decimal.
    #[error("Converting {amount} {from} to {to} overflows")]
    Overflow {
        amount: Decimal,
        from: String,
        to: String,
    },
}

fn on_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| format!(" on {d}")).unwrap_or_default()
}
