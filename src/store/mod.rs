pub mod disk;
pub mod memory;

use crate::core::cache::RateStore;
use crate::core::config::AppConfig;
use crate::core::error::RatesError;
use disk::DiskStore;
use memory::MemoryStore;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock, Weak},
};

/// Hands out one store per backend location per process, so services in
/// shared mode write to the same underlying table instead of each opening
/// their own.
struct StoreRegistry {
    memory: Arc<MemoryStore>,
    disks: Mutex<HashMap<PathBuf, Weak<DiskStore>>>,
}

fn registry() -> &'static StoreRegistry {
    static REGISTRY: OnceLock<StoreRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| StoreRegistry {
        memory: Arc::new(MemoryStore::new()),
        disks: Mutex::new(HashMap::new()),
    })
}

/// Returns the store selected by `config.cache`.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn RateStore>, RatesError> {
    let path = config
        .cache_path()
        .map_err(|e| RatesError::Config(e.to_string()))?;

    let store: Arc<dyn RateStore> = match path {
        None => registry().memory.clone(),
        Some(path) => open_disk_store(path)?,
    };
    Ok(store)
}

fn open_disk_store(path: PathBuf) -> Result<Arc<DiskStore>, RatesError> {
    let mut disks = registry()
        .disks
        .lock()
        .map_err(|e| RatesError::Store(e.to_string()))?;

    if let Some(store) = disks.get(&path).and_then(Weak::upgrade) {
        return Ok(store);
    }
    let store = Arc::new(DiskStore::open(&path)?);
    disks.insert(path, Arc::downgrade(&store));
    Ok(store)
}
