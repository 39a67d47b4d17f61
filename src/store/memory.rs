use crate::core::cache::{Namespace, RateStore};
use crate::core::error::RatesError;
use crate::core::rates::{CacheKey, CacheValue, RateSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

type Table = HashMap<CacheKey, CacheValue>;

/// Process-local rate store. Contents are lost when the process exits.
pub struct MemoryStore {
    inner: RwLock<HashMap<Namespace, Table>>,
}

impl MemoryStore {
    /// Creates a new MemoryStore instance
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn init(&self, namespace: &Namespace) -> Result<(), RatesError> {
        let mut tables = self.inner.write().await;
        tables.entry(namespace.clone()).or_default();
        debug!("Store INIT for namespace: {}", namespace);
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &CacheKey) -> Option<CacheValue> {
        let tables = self.inner.read().await;
        let value = tables.get(namespace).and_then(|t| t.get(key)).cloned();
        if value.is_some() {
            debug!("Cache HIT for key: {}/{}", namespace, key);
        } else {
            debug!("Cache MISS for key: {}/{}", namespace, key);
        }
        value
    }

    async fn put(
        &self,
        namespace: &Namespace,
        key: CacheKey,
        value: CacheValue,
    ) -> Result<CacheValue, RatesError> {
        let mut tables = self.inner.write().await;
        debug!("Cache PUT for key: {}/{}", namespace, key);
        tables
            .entry(namespace.clone())
            .or_default()
            .insert(key, value.clone());
        Ok(value)
    }

    async fn put_latest(
        &self,
        namespace: &Namespace,
        snapshot: RateSnapshot,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RatesError> {
        let mut tables = self.inner.write().await;
        let table = tables.entry(namespace.clone()).or_default();
        table.insert(CacheKey::LatestRates, CacheValue::Rates(snapshot));
        table.insert(CacheKey::LastUpdated, CacheValue::Timestamp(updated_at));
        debug!("Cache PUT latest rates for namespace: {}", namespace);
        Ok(())
    }

    async fn clear(&self, namespace: &Namespace) -> Result<(), RatesError> {
        let mut tables = self.inner.write().await;
        if let Some(table) = tables.get_mut(namespace) {
            table.clear();
        }
        debug!("Cache CLEAR for namespace: {}", namespace);
        Ok(())
    }

    async fn terminate(&self, namespace: &Namespace) -> Result<(), RatesError> {
        // Records outlive a single service so that a restarted service in the
        // same process, or a pool member in shared mode, still sees them.
        debug!("Store TERMINATE for namespace: {}", namespace);
        Ok(())
    }
}
