use crate::core::config::FrankfurterConfig;
use crate::core::error::RatesError;
use crate::core::provider::{FetchOutcome, RateProvider};
use crate::core::rates::RateSnapshot;
use crate::core::transport::Fetched;
use crate::providers::util::decode_rates;
use crate::transport::EtagTransport;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};

const NAME: &str = "frankfurter";

/// Adapter for the Frankfurter API, which republishes the ECB reference
/// rates. No credential is required.
pub struct FrankfurterProvider {
    config: FrankfurterConfig,
    transport: Arc<EtagTransport>,
}

impl FrankfurterProvider {
    pub fn new(config: FrankfurterConfig, transport: Arc<EtagTransport>) -> Self {
        Self { config, transport }
    }

    fn url(&self, endpoint: &str) -> Result<String, RatesError> {
        let raw = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let params: Vec<(&str, String)> = self
            .config
            .base
            .iter()
            .map(|b| ("from", b.to_uppercase()))
            .collect();
        let url = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, &params)
        };
        url.map(String::from)
            .map_err(|e| RatesError::Config(format!("Invalid provider URL {raw}: {e}")))
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, RatesError> {
        debug!("Requesting exchange rates from {}", url);
        match self.transport.get(url, &[]).await? {
            Fetched::NotModified => Ok(FetchOutcome::NotModified),
            Fetched::Fresh { body, .. } => {
                let (base, snapshot) = decode_rates(NAME, &body)?;
                Ok(FetchOutcome::Rates(with_base(base, snapshot)))
            }
        }
    }
}

/// Frankfurter leaves the base currency out of `rates`.
fn with_base(base: Option<String>, snapshot: RateSnapshot) -> RateSnapshot {
    match base {
        Some(base) if snapshot.get(&base).is_none() => snapshot
            .iter()
            .map(|(code, rate)| (code.to_string(), rate))
            .chain(std::iter::once((base, Decimal::ONE)))
            .collect(),
        _ => snapshot,
    }
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "FrankfurterLatest", skip(self))]
    async fn get_latest(&self) -> Result<FetchOutcome, RatesError> {
        let url = self.url("latest")?;
        self.fetch(&url).await
    }

    #[instrument(name = "FrankfurterHistoric", skip(self), fields(date = %date))]
    async fn get_historic(&self, date: NaiveDate) -> Result<FetchOutcome, RatesError> {
        let url = self.url(&date.format("%Y-%m-%d").to_string())?;
        self.fetch(&url).await
    }

    async fn forget_validators(&self) {
        self.transport.clear().await;
    }
}
