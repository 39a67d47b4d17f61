use chrono::NaiveDate;
use fxrates::core::config::AppConfig;
use fxrates::service::RatesService;
use rust_decimal_macros::dec;
use std::fs;
use std::time::Duration;
use tracing::info;

// Mock provider servers shared by the tests below
mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const LATEST: &str = r#"{
        "timestamp": 1704189600,
        "base": "USD",
        "rates": {"USD": 1, "EUR": 0.9, "GBP": 0.8, "JPY": 140.5}
    }"#;

    pub const HISTORIC: &str = r#"{
        "timestamp": 1704067200,
        "base": "USD",
        "rates": {"USD": 1, "EUR": "0.91", "GBP": "0.79"}
    }"#;

    pub async fn create_oxr_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .and(query_param("app_id", "test-app"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LATEST))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/historical/2024-01-01.json"))
            .and(query_param("app_id", "test-app"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HISTORIC))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_failing_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;
        mock_server
    }

    pub fn oxr_config(name: &str, base_url: &str, extra: &str) -> String {
        format!(
            r#"
name: "{name}"
refresh_interval_ms: 3600000
provider:
  kind: open_exchange_rates
  app_id: "test-app"
  base_url: "{base_url}"
{extra}
"#
        )
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    fs::write(config_file.path(), content).expect("Failed to write config file");
    config_file
}

#[test_log::test(tokio::test)]
async fn test_latest_and_historic_through_service() {
    let mock_server = test_utils::create_oxr_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-latest-historic",
        &mock_server.uri(),
        "",
    ));

    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let service = RatesService::start(config).await.unwrap();

    let latest = service.latest_rates().await.unwrap();
    info!(?latest, "Latest rates");
    assert_eq!(latest.get("EUR"), Some(dec!(0.9)));
    assert_eq!(latest.get("JPY"), Some(dec!(140.5)));
    assert!(service.last_updated().await.is_ok());

    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let historic = service.historic_rates(date).await.unwrap();
    assert_eq!(historic.get("EUR"), Some(dec!(0.91)));
    assert_eq!(historic.len(), 3);

    service.shutdown().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_preload_fetches_configured_dates() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_utils::LATEST))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/historical/2024-01-01.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_utils::HISTORIC))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config_file = write_config(&test_utils::oxr_config(
        "it-preload",
        &mock_server.uri(),
        "preload:\n  date: 2024-01-01",
    ));
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let service = RatesService::start(config).await.unwrap();

    // give the background preload a chance to land before querying
    tokio::time::sleep(Duration::from_millis(200)).await;

    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let historic = service.historic_rates(date).await.unwrap();
    assert_eq!(historic.get("GBP"), Some(dec!(0.79)));

    service.shutdown().await.unwrap();
    mock_server.verify().await;
}

#[test_log::test(tokio::test)]
async fn test_disk_cache_serves_rates_after_restart() {
    let cache_dir = tempfile::tempdir().unwrap();
    let cache_section = format!(
        "cache:\n  kind: disk\n  path: \"{}\"",
        cache_dir.path().display()
    );

    let mock_server = test_utils::create_oxr_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-disk",
        &mock_server.uri(),
        &cache_section,
    ));
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let service = RatesService::start(config).await.unwrap();
    let first = service.latest_rates().await.unwrap();
    let first_updated = service.last_updated().await.unwrap();
    service.shutdown().await.unwrap();
    drop(service);

    // the provider is down on the second run
    let failing_server = test_utils::create_failing_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-disk",
        &failing_server.uri(),
        &cache_section,
    ));
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let service = RatesService::start(config).await.unwrap();

    assert_eq!(service.latest_rates().await.unwrap(), first);
    assert_eq!(service.last_updated().await.unwrap(), first_updated);
    service.shutdown().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_provider_down_with_empty_cache_fails() {
    let failing_server = test_utils::create_failing_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-provider-down",
        &failing_server.uri(),
        "",
    ));
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let service = RatesService::start(config).await.unwrap();

    let result = service.latest_rates().await;
    assert!(result.is_err(), "Expected an error, got {result:?}");
    assert!(service.last_updated().await.is_err());

    service.shutdown().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = test_utils::create_oxr_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-app-flow",
        &mock_server.uri(),
        "",
    ));
    let config_path = config_file.path().to_str().unwrap();

    let result = fxrates::run_command(fxrates::AppCommand::Latest, Some(config_path)).await;
    assert!(result.is_ok(), "Latest failed with: {:?}", result.err());

    let result = fxrates::run_command(
        fxrates::AppCommand::Convert {
            amount: dec!(100),
            from: "eur".to_string(),
            to: "gbp".to_string(),
            date: None,
        },
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());

    let result = fxrates::run_command(
        fxrates::AppCommand::Historic(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        Some(config_path),
    )
    .await;
    assert!(result.is_ok(), "Historic failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_convert_unknown_currency_fails() {
    let mock_server = test_utils::create_oxr_mock_server().await;
    let config_file = write_config(&test_utils::oxr_config(
        "it-convert-unknown",
        &mock_server.uri(),
        "",
    ));

    let result = fxrates::run_command(
        fxrates::AppCommand::Convert {
            amount: dec!(1),
            from: "EUR".to_string(),
            to: "XXX".to_string(),
            date: None,
        },
        Some(config_path_str(&config_file)),
    )
    .await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("XXX"), "Unexpected error: {err}");
}

#[test_log::test(tokio::test)]
async fn test_invalid_config_is_rejected() {
    let config_file = write_config("refresh_interval_ms: 0\n");

    let result = fxrates::run_command(
        fxrates::AppCommand::Latest,
        Some(config_path_str(&config_file)),
    )
    .await;
    assert!(result.is_err());
}

fn config_path_str(file: &tempfile::NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}
