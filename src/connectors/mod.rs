pub mod rest;

pub use rest::RestConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ProviderError;
use crate::model::Source;

/// Search parameters sent to every provider for one aggregation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub location: String,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub max_results: u32,
}

impl ListingQuery {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            min_price: None,
            max_price: None,
            max_results: 20,
        }
    }

    /// Canonical form of the query for cache keying: fixed field order,
    /// lowercased location, absent bounds spelled out.
    pub fn signature(&self) -> String {
        format!(
            "location={}&min_price={}&max_price={}&max_results={}",
            self.location.trim().to_lowercase(),
            self.min_price.map_or_else(|| "-".to_string(), |v| v.to_string()),
            self.max_price.map_or_else(|| "-".to_string(), |v| v.to_string()),
            self.max_results,
        )
    }
}

/// One listing provider. The pipeline only ever sees this surface: a name
/// for reporting/cache keying, a source tag, and a single fetch returning
/// the provider-native payload. Retries and backoff are the connector's own
/// concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique per connector instance; defaults to the source label.
    fn name(&self) -> String;

    fn source(&self) -> Source;

    async fn fetch(&self, query: &ListingQuery) -> Result<Value, ProviderError>;
}
