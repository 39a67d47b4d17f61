//! Core abstractions of the rate service

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod log;
pub mod provider;
pub mod rates;
pub mod transport;

// Re-export main types for cleaner imports
pub use cache::{Namespace, RateStore};
pub use error::{ConversionError, RatesError};
pub use provider::{FetchOutcome, RateProvider};
pub use rates::{CacheKey, CacheValue, RateSnapshot};
pub use transport::{Fetched, HttpAdapter, HttpResponse};
