use crate::core::cache::{Namespace, RateStore};
use crate::core::error::RatesError;
use crate::core::rates::{CacheKey, CacheValue, RateSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

/// Durable rate store backed by a fjall keyspace, one partition per
/// namespace. Records are JSON encoded `CacheValue`s keyed by record name.
pub struct DiskStore {
    keyspace: Keyspace,
    partitions: RwLock<HashMap<Namespace, PartitionHandle>>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self, RatesError> {
        std::fs::create_dir_all(path).map_err(|e| RatesError::Store(e.to_string()))?;
        let keyspace = Config::new(path).open()?;
        debug!("Opened disk store at {}", path.display());

        Ok(Self {
            keyspace,
            partitions: RwLock::new(HashMap::new()),
        })
    }

    fn partition(&self, namespace: &Namespace) -> Result<PartitionHandle, RatesError> {
        if let Some(handle) = self
            .partitions
            .read()
            .map_err(|e| RatesError::Store(e.to_string()))?
            .get(namespace)
        {
            return Ok(handle.clone());
        }

        let mut partitions = self
            .partitions
            .write()
            .map_err(|e| RatesError::Store(e.to_string()))?;
        if let Some(handle) = partitions.get(namespace) {
            return Ok(handle.clone());
        }
        let handle = self
            .keyspace
            .open_partition(&partition_name(namespace)?, PartitionCreateOptions::default())?;
        partitions.insert(namespace.clone(), handle.clone());
        Ok(handle)
    }

    fn read(
        &self,
        namespace: &Namespace,
        key: &CacheKey,
    ) -> Result<Option<CacheValue>, RatesError> {
        let partition = self.partition(namespace)?;
        match partition.get(key.record_name())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Longest partition name fjall accepts.
const MAX_PARTITION_NAME: usize = 255;

/// Partition names only allow a restricted character set. Every byte outside
/// `[A-Za-z0-9-]` is written as `_xx` hex, so distinct namespaces never share
/// a partition.
fn partition_name(namespace: &Namespace) -> Result<String, RatesError> {
    let mut name = String::from("rates-");
    for byte in namespace.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("_{byte:02x}"));
        }
    }
    if name.len() > MAX_PARTITION_NAME {
        return Err(RatesError::Store(format!(
            "namespace {namespace} is too long for a disk partition"
        )));
    }
    Ok(name)
}

#[async_trait]
impl RateStore for DiskStore {
    async fn init(&self, namespace: &Namespace) -> Result<(), RatesError> {
        self.partition(namespace)?;
        debug!("Store INIT for namespace: {}", namespace);
        Ok(())
    }

    async fn get(&self, namespace: &Namespace, key: &CacheKey) -> Option<CacheValue> {
        match self.read(namespace, key) {
            Ok(Some(value)) => {
                debug!("Cache HIT for key: {}/{}", namespace, key);
                Some(value)
            }
            Ok(None) => {
                debug!("Cache MISS for key: {}/{}", namespace, key);
                None
            }
            Err(e) => {
                debug!("DiskStore get error for {}/{}: {}", namespace, key, e);
                None
            }
        }
    }

    async fn put(
        &self,
        namespace: &Namespace,
        key: CacheKey,
        value: CacheValue,
    ) -> Result<CacheValue, RatesError> {
        let partition = self.partition(namespace)?;
        partition.insert(key.record_name(), serde_json::to_vec(&value)?)?;
        debug!("Cache PUT for key: {}/{}", namespace, key);
        Ok(value)
    }

    async fn put_latest(
        &self,
        namespace: &Namespace,
        snapshot: RateSnapshot,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RatesError> {
        let partition = self.partition(namespace)?;
        let rates = serde_json::to_vec(&CacheValue::Rates(snapshot))?;
        let timestamp = serde_json::to_vec(&CacheValue::Timestamp(updated_at))?;

        let mut batch = self.keyspace.batch();
        batch.insert(&partition, CacheKey::LatestRates.record_name(), rates);
        batch.insert(&partition, CacheKey::LastUpdated.record_name(), timestamp);
        batch.commit()?;
        debug!("Cache PUT latest rates for namespace: {}", namespace);
        Ok(())
    }

    async fn clear(&self, namespace: &Namespace) -> Result<(), RatesError> {
        let partition = self.partition(namespace)?;
        let keys = partition.keys().collect::<Result<Vec<_>, _>>()?;
        for key in keys {
            partition.remove(key)?;
        }
        debug!("Cache CLEAR for namespace: {}", namespace);
        Ok(())
    }

    async fn terminate(&self, namespace: &Namespace) -> Result<(), RatesError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        self.partitions
            .write()
            .map_err(|e| RatesError::Store(e.to_string()))?
            .remove(namespace);
        debug!("Store TERMINATE for namespace: {}", namespace);
        Ok(())
    }
}
