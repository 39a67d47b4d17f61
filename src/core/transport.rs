//! HTTP transport abstractions

use crate::core::error::RatesError;
use async_trait::async_trait;
use std::collections::HashMap;

/// A raw HTTP response. Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Low-level GET client the conditional transport delegates to.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// Performs one GET. Any status code is a successful call here; only
    /// connection failures and timeouts are errors.
    async fn get(&self, url: &str, headers: &[(String, String)])
    -> Result<HttpResponse, RatesError>;
}

/// Result of a conditional GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Fresh {
        headers: HashMap<String, String>,
        body: String,
    },
    NotModified,
}
