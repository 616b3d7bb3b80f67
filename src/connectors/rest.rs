use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{Connector, ListingQuery};
use crate::core::ProviderError;
use crate::model::Source;

/// Generic JSON-API connector: one instance per provider base URL. Every
/// provider this pipeline currently talks to exposes a listing search as a
/// GET with query parameters returning a JSON document.
pub struct RestConnector {
    source: Source,
    base_url: String,
    client: Client,
}

impl RestConnector {
    pub fn new(source: Source, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent(concat!("propscout/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Connector for RestConnector {
    fn name(&self) -> String {
        self.source.as_str().to_string()
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, query: &ListingQuery) -> Result<Value, ProviderError> {
        let url = format!("{}/listings", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("location", query.location.as_str())])
            .query(&[("limit", query.max_results)]);
        if let Some(min) = query.min_price {
            request = request.query(&[("min_price", min)]);
        }
        if let Some(max) = query.max_price {
            request = request.query(&[("max_price", max)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("{} returned {}: {}", self.source, status, body);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}
