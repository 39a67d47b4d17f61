//! Rate snapshots and the records a rate store holds

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// An immutable mapping of currency code to conversion rate.
///
/// An empty snapshot is a valid answer from a provider and is never the same
/// thing as having no snapshot at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Decimal>",
    into = "BTreeMap<String, Decimal>"
)]
pub struct RateSnapshot {
    rates: BTreeMap<String, Decimal>,
}

impl RateSnapshot {
    /// Builds a snapshot, uppercasing every currency code.
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        Self {
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.as_ref().trim().to_uppercase(), rate))
                .collect(),
        }
    }

    /// Builds a snapshot from untrusted input. Codes are uppercased and must
    /// be unique after that; rates must not be negative. A negative zero is
    /// stored as zero.
    pub fn try_new<I, S>(rates: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        for (code, rate) in rates {
            let code = code.as_ref().trim().to_uppercase();
            if code.is_empty() {
                return Err("empty currency code".to_string());
            }
            if rate.is_sign_negative() && !rate.is_zero() {
                return Err(format!("negative rate for {code}: {rate}"));
            }
            let rate = if rate.is_zero() { Decimal::ZERO } else { rate };
            if map.insert(code.clone(), rate).is_some() {
                return Err(format!("duplicate rate for {code}"));
            }
        }
        Ok(Self { rates: map })
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.rates.get(&code.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for RateSnapshot {
    type Error = String;

    fn try_from(rates: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        Self::try_new(rates)
    }
}

impl From<RateSnapshot> for BTreeMap<String, Decimal> {
    fn from(snapshot: RateSnapshot) -> Self {
        snapshot.rates
    }
}

impl<S: AsRef<str>> FromIterator<(S, Decimal)> for RateSnapshot {
    fn from_iter<T: IntoIterator<Item = (S, Decimal)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Record names within one store namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    LatestRates,
    LastUpdated,
    HistoricRates(NaiveDate),
}

impl CacheKey {
    /// The persisted record name: `latest_rates`, `last_updated` or the
    /// calendar date as `YYYY-MM-DD`.
    pub fn record_name(&self) -> String {
        match self {
            CacheKey::LatestRates => "latest_rates".to_string(),
            CacheKey::LastUpdated => "last_updated".to_string(),
            CacheKey::HistoricRates(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.record_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheValue {
    Rates(RateSnapshot),
    Timestamp(DateTime<Utc>),
}

impl CacheValue {
    pub fn into_rates(self) -> Option<RateSnapshot> {
        match self {
            CacheValue::Rates(snapshot) => Some(snapshot),
            CacheValue::Timestamp(_) => None,
        }
    }

    pub fn into_timestamp(self) -> Option<DateTime<Utc>> {
        match self {
            CacheValue::Timestamp(ts) => Some(ts),
            CacheValue::Rates(_) => None,
        }
    }
}
