//! Provider adapter abstractions

use crate::core::error::RatesError;
use crate::core::rates::RateSnapshot;
use async_trait::async_trait;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Rates(RateSnapshot),
    /// The provider confirmed the previously fetched table is still current.
    NotModified,
}

/// Translates rate requests into calls against one external rate source.
///
/// Adapters do not retry; a failed call is returned as is.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_latest(&self) -> Result<FetchOutcome, RatesError>;

    async fn get_historic(&self, date: NaiveDate) -> Result<FetchOutcome, RatesError>;

    /// Drops any conditional-request validators so the next call returns a
    /// full body.
    async fn forget_validators(&self) {}
}
