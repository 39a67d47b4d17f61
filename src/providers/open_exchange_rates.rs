use crate::core::config::OpenExchangeRatesConfig;
use crate::core::error::RatesError;
use crate::core::provider::{FetchOutcome, RateProvider};
use crate::core::transport::Fetched;
use crate::providers::util::decode_rates;
use crate::transport::EtagTransport;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, instrument};

const NAME: &str = "open_exchange_rates";

/// Adapter for the Open Exchange Rates API
/// (`/latest.json` and `/historical/YYYY-MM-DD.json`).
pub struct OpenExchangeRatesProvider {
    config: OpenExchangeRatesConfig,
    transport: Arc<EtagTransport>,
}

impl OpenExchangeRatesProvider {
    pub fn new(config: OpenExchangeRatesConfig, transport: Arc<EtagTransport>) -> Self {
        Self { config, transport }
    }

    fn url(&self, endpoint: &str) -> Result<String, RatesError> {
        let mut params = vec![("app_id", self.config.app_id.clone())];
        if let Some(base) = &self.config.base {
            params.push(("base", base.to_uppercase()));
        }
        if !self.config.symbols.is_empty() {
            params.push(("symbols", self.config.symbols.join(",").to_uppercase()));
        }

        let raw = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        Url::parse_with_params(&raw, &params)
            .map(String::from)
            .map_err(|e| RatesError::Config(format!("Invalid provider URL {raw}: {e}")))
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, RatesError> {
        debug!("Requesting exchange rates from {}", self.config.base_url);
        match self.transport.get(url, &[]).await? {
            Fetched::NotModified => Ok(FetchOutcome::NotModified),
            Fetched::Fresh { body, .. } => {
                let (_, snapshot) = decode_rates(NAME, &body)?;
                Ok(FetchOutcome::Rates(snapshot))
            }
        }
    }
}

#[async_trait]
impl RateProvider for OpenExchangeRatesProvider {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(name = "OxrLatest", skip(self))]
    async fn get_latest(&self) -> Result<FetchOutcome, RatesError> {
        let url = self.url("latest.json")?;
        self.fetch(&url).await
    }

    #[instrument(name = "OxrHistoric", skip(self), fields(date = %date))]
    async fn get_historic(&self, date: NaiveDate) -> Result<FetchOutcome, RatesError> {
        let url = self.url(&format!("historical/{}.json", date.format("%Y-%m-%d")))?;
        self.fetch(&url).await
    }

    async fn forget_validators(&self) {
        self.transport.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ReqwestConfig;
    use crate::transport::reqwest_adapter::ReqwestAdapter;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{
        "disclaimer": "Usage subject to terms",
        "license": "https://openexchangerates.org/license",
        "timestamp": 1704189600,
        "base": "USD",
        "rates": {"AUD": 0.70, "EUR": 1.20, "USD": 1}
    }"#;

    fn provider(base_url: &str, symbols: Vec<String>) -> OpenExchangeRatesProvider {
        let adapter = Arc::new(ReqwestAdapter::new(&ReqwestConfig::default()).unwrap());
        let config = OpenExchangeRatesConfig {
            app_id: "secret".to_string(),
            base_url: base_url.to_string(),
            base: None,
            symbols,
        };
        OpenExchangeRatesProvider::new(config, Arc::new(EtagTransport::new(adapter)))
    }

    async fn create_mock_server(request_path: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(request_path))
            .and(query_param("app_id", "secret"))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("ETag", "\"rates-v1\"")
                    .insert_header("Last-Modified", "Tue, 02 Jan 2024 10:00:00 GMT")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_successful_latest_fetch() {
        let mock_server = create_mock_server("/latest.json", 200, BODY).await;
        let provider = provider(&mock_server.uri(), vec![]);

        let outcome = provider.get_latest().await.unwrap();
        let FetchOutcome::Rates(snapshot) = outcome else {
            panic!("Expected rates, got {outcome:?}");
        };
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("AUD"), Some(dec!(0.70)));
        assert_eq!(snapshot.get("EUR"), Some(dec!(1.20)));
        assert_eq!(snapshot.get("USD"), Some(dec!(1)));
    }

    #[tokio::test]
    async fn test_successful_historic_fetch() {
        let mock_server = create_mock_server("/historical/2024-01-02.json", 200, BODY).await;
        let provider = provider(&mock_server.uri(), vec![]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        let outcome = provider.get_historic(date).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Rates(ref s) if s.len() == 3));
    }

    #[tokio::test]
    async fn test_symbols_are_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .and(query_param("symbols", "EUR,AUD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&mock_server)
            .await;
        let provider = provider(&mock_server.uri(), vec!["eur".into(), "aud".into()]);

        assert!(provider.get_latest().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_fetch_is_not_modified() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .and(wiremock::matchers::header("If-None-Match", "\"rates-v1\""))
            .respond_with(ResponseTemplate::new(304))
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"rates-v1\"")
                    .insert_header("Last-Modified", "Tue, 02 Jan 2024 10:00:00 GMT")
                    .set_body_string(BODY),
            )
            .mount(&mock_server)
            .await;
        let provider = provider(&mock_server.uri(), vec![]);

        assert!(matches!(
            provider.get_latest().await,
            Ok(FetchOutcome::Rates(_))
        ));
        assert_eq!(provider.get_latest().await, Ok(FetchOutcome::NotModified));

        provider.forget_validators().await;
        assert!(matches!(
            provider.get_latest().await,
            Ok(FetchOutcome::Rates(_))
        ));
    }

    #[tokio::test]
    async fn test_api_error_response() {
        let body = r#"{"error": true, "status": 401, "message": "invalid_app_id"}"#;
        let mock_server = create_mock_server("/latest.json", 401, body).await;
        let provider = provider(&mock_server.uri(), vec![]);

        let result = provider.get_latest().await;
        assert!(matches!(
            result,
            Err(RatesError::Status { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = create_mock_server("/latest.json", 200, r#"{"base": "USD"}"#).await;
        let provider = provider(&mock_server.uri(), vec![]);

        let err = provider.get_latest().await.unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to decode open_exchange_rates response")
        );
    }
}
