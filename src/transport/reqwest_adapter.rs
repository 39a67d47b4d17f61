use crate::core::config::ReqwestConfig;
use crate::core::error::RatesError;
use crate::core::transport::{HttpAdapter, HttpResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// `HttpAdapter` backed by a shared reqwest client.
pub struct ReqwestAdapter {
    client: reqwest::Client,
}

impl ReqwestAdapter {
    pub fn new(config: &ReqwestConfig) -> Result<Self, RatesError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| RatesError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, RatesError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                RatesError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RatesError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = request.send().await.map_err(map_err)?;
        debug!(status = %response.status(), "Received response from {}", url);

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(map_err)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
