use crate::core::cache::Namespace;
use crate::core::error::RatesError;
use crate::core::log::LogLevels;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Longest accepted `name` or `shared_name`, in bytes.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    /// Namespace derived from the instance name.
    #[default]
    Isolated,
    /// Namespace derived from `shared_name`, so a pool of services shares one
    /// set of records.
    Shared,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OpenExchangeRatesConfig {
    pub app_id: String,
    #[serde(default = "OpenExchangeRatesConfig::default_base_url")]
    pub base_url: String,
    pub base: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl OpenExchangeRatesConfig {
    fn default_base_url() -> String {
        "https://openexchangerates.org/api".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FrankfurterConfig {
    #[serde(default = "FrankfurterConfig::default_base_url")]
    pub base_url: String,
    pub base: Option<String>,
}

impl FrankfurterConfig {
    fn default_base_url() -> String {
        "https://api.frankfurter.app".to_string()
    }
}

impl Default for FrankfurterConfig {
    fn default() -> Self {
        FrankfurterConfig {
            base_url: Self::default_base_url(),
            base: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    OpenExchangeRates(OpenExchangeRatesConfig),
    Frankfurter(FrankfurterConfig),
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        match self {
            ProviderConfig::OpenExchangeRates(c) => &c.base_url,
            ProviderConfig::Frankfurter(c) => &c.base_url,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Frankfurter(FrankfurterConfig::default())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct DiskCacheConfig {
    pub path: Option<PathBuf>,
}

/// The memory backend takes no options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MemoryCacheConfig {}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    Memory(MemoryCacheConfig),
    Disk(DiskCacheConfig),
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory(MemoryCacheConfig::default())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReqwestConfig {
    #[serde(default = "ReqwestConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "ReqwestConfig::default_user_agent")]
    pub user_agent: String,
}

impl ReqwestConfig {
    fn default_timeout_ms() -> u64 {
        10_000
    }

    fn default_user_agent() -> String {
        concat!("fxrates/", env!("CARGO_PKG_VERSION")).to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        ReqwestConfig {
            timeout_ms: Self::default_timeout_ms(),
            user_agent: Self::default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Reqwest(ReqwestConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Reqwest(ReqwestConfig::default())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SingleDate {
    pub date: NaiveDate,
}

/// Historic rates to load at startup: `{ date }` or `{ from, to }`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum PreloadConfig {
    Range(DateRange),
    Date(SingleDate),
}

impl PreloadConfig {
    /// Every calendar date covered, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match *self {
            PreloadConfig::Date(SingleDate { date }) => vec![date],
            PreloadConfig::Range(DateRange { from, to }) => {
                from.iter_days().take_while(|d| *d <= to).collect()
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: RunningMode,
    #[serde(default = "AppConfig::default_name")]
    pub name: String,
    pub shared_name: Option<String>,
    #[serde(default = "AppConfig::default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    pub preload: Option<PreloadConfig>,
    #[serde(default)]
    pub log: LogLevels,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            mode: RunningMode::default(),
            name: Self::default_name(),
            shared_name: None,
            refresh_interval_ms: Self::default_refresh_interval_ms(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            transport: TransportConfig::default(),
            preload: None,
            log: LogLevels::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    fn default_name() -> String {
        "fxrates".to_string()
    }

    fn default_refresh_interval_ms() -> u64 {
        300_000
    }

    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxrates", "fxrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fxrates", "fxrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Directory of the durable cache, when the disk backend is selected.
    pub fn cache_path(&self) -> Result<Option<PathBuf>> {
        match &self.cache {
            CacheConfig::Memory(_) => Ok(None),
            CacheConfig::Disk(DiskCacheConfig { path: Some(path) }) => Ok(Some(path.clone())),
            CacheConfig::Disk(DiskCacheConfig { path: None }) => {
                Ok(Some(self.default_data_path()?.join("cache")))
            }
        }
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn namespace(&self) -> Namespace {
        match (self.mode, &self.shared_name) {
            (RunningMode::Shared, Some(shared)) => Namespace::new(shared.clone()),
            _ => Namespace::new(self.name.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), RatesError> {
        let invalid = |msg: &str| Err(RatesError::Config(msg.to_string()));

        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.refresh_interval_ms == 0 {
            return invalid("refresh_interval_ms must be greater than zero");
        }
        if self.mode == RunningMode::Shared
            && self
                .shared_name
                .as_deref()
                .is_none_or(|s| s.trim().is_empty())
        {
            return invalid("shared mode requires a shared_name");
        }
        if self.name.len() > MAX_NAME_LEN
            || self
                .shared_name
                .as_ref()
                .is_some_and(|s| s.len() > MAX_NAME_LEN)
        {
            return invalid("name and shared_name must be at most 64 bytes");
        }
        if self.provider.base_url().trim().is_empty() {
            return invalid("provider base_url must not be empty");
        }
        if Url::parse(self.provider.base_url()).is_err() {
            return invalid("provider base_url is not a valid URL");
        }
        if let ProviderConfig::OpenExchangeRates(oxr) = &self.provider
            && oxr.app_id.trim().is_empty()
        {
            return invalid("open_exchange_rates requires an app_id");
        }
        match &self.transport {
            TransportConfig::Reqwest(c) if c.timeout_ms == 0 => {
                return invalid("transport timeout_ms must be greater than zero");
            }
            TransportConfig::Reqwest(_) => {}
        }
        if let Some(PreloadConfig::Range(DateRange { from, to })) = self.preload
            && from > to
        {
            return invalid("preload range must not end before it starts");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::LogLevel;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
mode: shared
name: "worker-1"
shared_name: "pool"
refresh_interval_ms: 60000
provider:
  kind: open_exchange_rates
  app_id: "secret"
  symbols: ["EUR", "AUD"]
cache:
  kind: disk
  path: "/tmp/fxrates"
transport:
  kind: reqwest
  timeout_ms: 2500
preload:
  from: 2024-01-01
  to: 2024-01-03
log:
  success: info
  failure: error
  info: off
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        config.validate().unwrap();

        assert_eq!(config.mode, RunningMode::Shared);
        assert_eq!(config.namespace(), Namespace::new("pool"));
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        match &config.provider {
            ProviderConfig::OpenExchangeRates(oxr) => {
                assert_eq!(oxr.app_id, "secret");
                assert_eq!(oxr.base_url, "https://openexchangerates.org/api");
                assert_eq!(oxr.symbols, vec!["EUR", "AUD"]);
            }
            other => panic!("Expected open exchange rates provider, got {other:?}"),
        }
        assert_eq!(
            config.cache_path().unwrap(),
            Some(PathBuf::from("/tmp/fxrates"))
        );
        let TransportConfig::Reqwest(transport) = &config.transport;
        assert_eq!(transport.timeout(), Duration::from_millis(2500));
        assert_eq!(config.preload.unwrap().dates().len(), 3);
        assert_eq!(config.log.success, LogLevel::Info);
        assert_eq!(config.log.failure, LogLevel::Error);
        assert_eq!(config.log.info, LogLevel::Off);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("name: solo\n").unwrap();
        config.validate().unwrap();

        assert_eq!(config.namespace(), Namespace::new("solo"));
        assert_eq!(config.provider, ProviderConfig::Frankfurter(FrankfurterConfig::default()));
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.cache_path().unwrap(), None);
        assert!(config.preload.is_none());
        assert_eq!(config.log, LogLevels::default());
    }

    #[test]
    fn test_single_preload_date() {
        let config: AppConfig = serde_yaml::from_str("preload:\n  date: 2024-02-29\n").unwrap();
        assert_eq!(
            config.preload.unwrap().dates(),
            vec![NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()]
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(serde_yaml::from_str::<AppConfig>("refresh_every: 10\n").is_err());
        assert!(
            serde_yaml::from_str::<AppConfig>(
                "provider:\n  kind: frankfurter\n  api_key: nope\n"
            )
            .is_err()
        );
        assert!(serde_yaml::from_str::<AppConfig>("provider:\n  kind: ecb\n").is_err());
        assert!(
            serde_yaml::from_str::<AppConfig>("preload:\n  date: 2024-01-01\n  days: 3\n")
                .is_err()
        );
        assert!(
            serde_yaml::from_str::<AppConfig>("cache:\n  kind: memory\n  path: /tmp/x\n")
                .is_err()
        );
        assert_eq!(
            serde_yaml::from_str::<AppConfig>("cache:\n  kind: memory\n")
                .unwrap()
                .cache,
            CacheConfig::default()
        );
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("refresh_interval_ms: 0\n", "refresh_interval_ms"),
            ("mode: shared\n", "shared_name"),
            ("name: \"  \"\n", "name"),
            (
                "provider:\n  kind: open_exchange_rates\n  app_id: \"\"\n",
                "app_id",
            ),
            ("transport:\n  kind: reqwest\n  timeout_ms: 0\n", "timeout_ms"),
            (
                "provider:\n  kind: frankfurter\n  base_url: \"not a url\"\n",
                "not a valid URL",
            ),
            (
                "preload:\n  from: 2024-01-05\n  to: 2024-01-01\n",
                "preload range",
            ),
        ];

        for (yaml, expected) in cases {
            let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
            match config.validate() {
                Err(RatesError::Config(msg)) => {
                    assert!(msg.contains(expected), "{yaml:?} gave {msg:?}")
                }
                other => panic!("Expected config error for {yaml:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_overlong_names_are_rejected() {
        let long = "a".repeat(MAX_NAME_LEN + 1);

        let config = AppConfig {
            name: long.clone(),
            ..AppConfig::default()
        };
        match config.validate() {
            Err(RatesError::Config(msg)) => assert!(msg.contains("64 bytes"), "{msg}"),
            other => panic!("Expected config error, got {other:?}"),
        }

        let config = AppConfig {
            mode: RunningMode::Shared,
            shared_name: Some(long),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(RatesError::Config(_))));

        let config = AppConfig {
            name: "a".repeat(MAX_NAME_LEN),
            ..AppConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_path_validates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "refresh_interval_ms: 0\n").unwrap();

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().starts_with("Invalid config file"));
    }
}
