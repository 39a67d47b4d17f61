//! Rate store abstraction

use crate::core::error::RatesError;
use crate::core::rates::{CacheKey, CacheValue, RateSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Display;

/// Partition key isolating one service's records from another's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Namespace(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A name-partitioned key/value store for rate snapshots.
///
/// Implementations must allow concurrent readers and make every single-key
/// write atomic. `get` never fails: a missing or unreadable record is `None`.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn init(&self, namespace: &Namespace) -> Result<(), RatesError>;

    async fn get(&self, namespace: &Namespace, key: &CacheKey) -> Option<CacheValue>;

    async fn put(
        &self,
        namespace: &Namespace,
        key: CacheKey,
        value: CacheValue,
    ) -> Result<CacheValue, RatesError>;

    /// Writes `latest_rates` and `last_updated` in one step, so no reader sees
    /// one without the other.
    async fn put_latest(
        &self,
        namespace: &Namespace,
        snapshot: RateSnapshot,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RatesError>;

    async fn clear(&self, namespace: &Namespace) -> Result<(), RatesError>;

    async fn terminate(&self, namespace: &Namespace) -> Result<(), RatesError>;
}
