//! Conditional HTTP GET on top of a pluggable `HttpAdapter`.
//!
//! For each URL the transport remembers the `ETag` and date validators of the
//! last fresh response and sends them back as `If-None-Match` and
//! `If-Modified-Since`. A `304 Not Modified` answer becomes
//! [`Fetched::NotModified`] instead of a repeated body.

pub mod reqwest_adapter;

use crate::core::config::TransportConfig;
use crate::core::error::RatesError;
use crate::core::transport::{Fetched, HttpAdapter, HttpResponse};
use reqwest_adapter::ReqwestAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Validators {
    etag: String,
    last_modified: String,
}

impl Validators {
    /// Both halves are required; a lone ETag or date is discarded.
    fn from_response(response: &HttpResponse) -> Option<Self> {
        let etag = response.header("etag")?;
        let last_modified = response
            .header("last-modified")
            .or_else(|| response.header("date"))?;
        Some(Validators {
            etag: etag.to_string(),
            last_modified: last_modified.to_string(),
        })
    }
}

pub struct EtagTransport {
    adapter: Arc<dyn HttpAdapter>,
    validators: Mutex<HashMap<String, Validators>>,
}

impl EtagTransport {
    pub fn new(adapter: Arc<dyn HttpAdapter>) -> Self {
        Self {
            adapter,
            validators: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self, RatesError> {
        let adapter: Arc<dyn HttpAdapter> = match config {
            TransportConfig::Reqwest(c) => Arc::new(ReqwestAdapter::new(c)?),
        };
        Ok(Self::new(adapter))
    }

    pub async fn get(
        &self,
        url: &str,
        extra_headers: &[(String, String)],
    ) -> Result<Fetched, RatesError> {
        let mut headers = extra_headers.to_vec();
        if let Some(v) = self.validators.lock().await.get(url) {
            headers.push(("If-None-Match".to_string(), v.etag.clone()));
            headers.push(("If-Modified-Since".to_string(), v.last_modified.clone()));
        }

        let response = self.adapter.get(url, &headers).await?;

        match response.status {
            304 => {
                if let Some(v) = Validators::from_response(&response) {
                    self.validators.lock().await.insert(url.to_string(), v);
                }
                debug!("Not modified: {}", url);
                Ok(Fetched::NotModified)
            }
            200..=299 => {
                let mut validators = self.validators.lock().await;
                match Validators::from_response(&response) {
                    Some(v) => {
                        validators.insert(url.to_string(), v);
                    }
                    None => {
                        validators.remove(url);
                    }
                }
                Ok(Fetched::Fresh {
                    headers: response.headers,
                    body: response.body,
                })
            }
            status => Err(RatesError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }

    /// Drops the remembered validators for `url`.
    pub async fn forget(&self, url: &str) {
        self.validators.lock().await.remove(url);
    }

    pub async fn clear(&self) {
        self.validators.lock().await.clear();
    }
}
