pub mod frankfurter;
pub mod open_exchange_rates;
pub mod util;

use crate::core::config::{AppConfig, ProviderConfig};
use crate::core::error::RatesError;
use crate::core::provider::RateProvider;
use crate::transport::EtagTransport;
use frankfurter::FrankfurterProvider;
use open_exchange_rates::OpenExchangeRatesProvider;
use std::sync::Arc;

/// Builds the configured provider on a transport of its own, so validators
/// are never shared with another service.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn RateProvider>, RatesError> {
    let transport = Arc::new(EtagTransport::from_config(&config.transport)?);
    let provider: Arc<dyn RateProvider> = match &config.provider {
        ProviderConfig::OpenExchangeRates(c) => {
            Arc::new(OpenExchangeRatesProvider::new(c.clone(), transport))
        }
        ProviderConfig::Frankfurter(c) => Arc::new(FrankfurterProvider::new(c.clone(), transport)),
    };
    Ok(provider)
}
