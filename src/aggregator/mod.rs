use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::cache::{CacheKey, CacheLayer};
use crate::connectors::{Connector, ListingQuery};
use crate::core::config::{AggregatorConfig, CacheConfig};
use crate::model::Property;
use crate::normalize::{self, Provenance};

/// Terminal state of one connector in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SourceStatus {
    Succeeded,
    Failed { reason: String },
    TimedOut,
}

/// Per-connector entry in the cycle report. Present for every requested
/// connector, whatever happened to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    /// Records that survived normalization.
    pub listed: usize,
    /// Raw records dropped by schema validation.
    pub dropped: usize,
    pub cache_hit: bool,
    /// Expired cache data was served because the live fetch failed.
    pub served_stale: bool,
}

/// One aggregation cycle's output. `listings` is in completion order, which
/// is not stable across runs; identity is `listing_id`.
#[derive(Debug)]
pub struct CycleResult {
    pub listings: Vec<Property>,
    pub report: HashMap<String, SourceReport>,
}

/// Fans a query out to every connector through the cache layer, isolating
/// per-connector failures and bounding concurrent fetches.
pub struct Aggregator {
    cache: Arc<CacheLayer>,
    config: AggregatorConfig,
    cache_config: CacheConfig,
}

impl Aggregator {
    pub fn new(cache: Arc<CacheLayer>, config: AggregatorConfig, cache_config: CacheConfig) -> Self {
        Self {
            cache,
            config,
            cache_config,
        }
    }

    pub async fn collect(
        &self,
        connectors: &[Arc<dyn Connector>],
        query: &ListingQuery,
    ) -> CycleResult {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let per_timeout = self.config.per_connector_timeout();

        let mut tasks: FuturesUnordered<_> = connectors
            .iter()
            .map(|connector| {
                let connector = connector.clone();
                let cache = self.cache.clone();
                let semaphore = semaphore.clone();
                let query = query.clone();
                let ttl = self.cache_config.ttl_for(connector.source());
                async move {
                    // Closing the semaphore is not part of this design;
                    // acquire only fails on close.
                    let _permit = semaphore.acquire().await.expect("semaphore open");
                    let key = CacheKey::new(connector.name(), query.signature());

                    let fetched = timeout(
                        per_timeout,
                        cache.get_or_fetch(&key, ttl, || async {
                            connector.fetch(&query).await
                        }),
                    )
                    .await;

                    let (status, payload) = match fetched {
                        Ok(Ok((value, cache_hit))) => {
                            return finish(&connector, SourceStatus::Succeeded, value, cache_hit, false)
                        }
                        Ok(Err(e)) => (
                            SourceStatus::Failed {
                                reason: e.to_string(),
                            },
                            cache.get_stale(&key).await,
                        ),
                        Err(_) => (SourceStatus::TimedOut, cache.get_stale(&key).await),
                    };

                    match payload {
                        // Freshness traded for availability: expired cache
                        // data stands in for the failed fetch, flagged stale.
                        Some(value) => finish(&connector, status, value, true, true),
                        None => (
                            connector.name(),
                            SourceReport {
                                status,
                                listed: 0,
                                dropped: 0,
                                cache_hit: false,
                                served_stale: false,
                            },
                            Vec::new(),
                        ),
                    }
                }
            })
            .collect();

        let mut listings = Vec::new();
        let mut report = HashMap::with_capacity(connectors.len());
        while let Some((name, source_report, mut records)) = tasks.next().await {
            listings.append(&mut records);
            report.insert(name, source_report);
        }

        log_cycle_summary(&report, listings.len());
        CycleResult { listings, report }
    }
}

fn finish(
    connector: &Arc<dyn Connector>,
    status: SourceStatus,
    payload: serde_json::Value,
    cache_hit: bool,
    served_stale: bool,
) -> (String, SourceReport, Vec<Property>) {
    let outcome = normalize::normalize(
        connector.source(),
        &payload,
        Provenance {
            fetched_at: Utc::now(),
            cache_hit,
            is_stale: served_stale,
        },
    );
    (
        connector.name(),
        SourceReport {
            status,
            listed: outcome.listings.len(),
            dropped: outcome.dropped,
            cache_hit,
            served_stale,
        },
        outcome.listings,
    )
}

fn log_cycle_summary(report: &HashMap<String, SourceReport>, total: usize) {
    let succeeded = report
        .values()
        .filter(|r| r.status == SourceStatus::Succeeded)
        .count();
    let stale = report.values().filter(|r| r.served_stale).count();
    let dropped: usize = report.values().map(|r| r.dropped).sum();
    tracing::info!(
        "cycle complete: {} listings from {}/{} sources ({} stale, {} records dropped)",
        total,
        succeeded,
        report.len(),
        stale,
        dropped
    );
    for (name, entry) in report {
        match &entry.status {
            SourceStatus::Succeeded => tracing::debug!(
                "  {}: ok ({} listed, {} dropped, cache_hit={})",
                name,
                entry.listed,
                entry.dropped,
                entry.cache_hit
            ),
            SourceStatus::Failed { reason } => {
                tracing::warn!("  {}: failed ({reason}), stale={}", name, entry.served_stale)
            }
            SourceStatus::TimedOut => {
                tracing::warn!("  {}: timed out, stale={}", name, entry.served_stale)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::connectors::MockConnector;
    use crate::core::ProviderError;
    use crate::model::Source;
    use serde_json::json;

    fn zillow_payload(id: &str) -> serde_json::Value {
        json!([{
            "zpid": id,
            "streetAddress": format!("{id} Main St"),
            "price": 250000,
            "rentZestimate": 1900
        }])
    }

    fn mock(name: &str, source: Source) -> MockConnector {
        let mut connector = MockConnector::new();
        let name = name.to_string();
        connector.expect_name().returning(move || name.clone());
        connector.expect_source().return_const(source);
        connector
    }

    fn succeeding(name: &'static str) -> Arc<dyn Connector> {
        let mut connector = mock(name, Source::Zillow);
        connector
            .expect_fetch()
            .returning(move |_| Ok(zillow_payload(name)));
        Arc::new(connector)
    }

    fn failing(name: &'static str) -> Arc<dyn Connector> {
        let mut connector = mock(name, Source::LoopNet);
        connector
            .expect_fetch()
            .returning(|_| Err(ProviderError::Malformed("boom".to_string())));
        Arc::new(connector)
    }

    async fn aggregator() -> Aggregator {
        let cache = Arc::new(CacheLayer::new(CacheStore::in_memory().await.unwrap()));
        Aggregator::new(
            cache,
            AggregatorConfig {
                per_connector_timeout_secs: 5,
                max_concurrent_fetches: 4,
            },
            CacheConfig {
                database_path: String::new(),
                zillow_ttl_secs: 600,
                loopnet_ttl_secs: 600,
                realtoken_ttl_secs: 600,
            },
        )
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let connectors: Vec<Arc<dyn Connector>> = vec![
            succeeding("zillow-a"),
            succeeding("zillow-b"),
            succeeding("zillow-c"),
            failing("loopnet-a"),
            failing("loopnet-b"),
        ];
        let result = aggregator().await.collect(&connectors, &ListingQuery::new("austin")).await;

        assert_eq!(result.report.len(), 5);
        assert_eq!(result.listings.len(), 3);
        for name in ["zillow-a", "zillow-b", "zillow-c"] {
            assert_eq!(result.report[name].status, SourceStatus::Succeeded);
            assert_eq!(result.report[name].listed, 1);
        }
        for name in ["loopnet-a", "loopnet-b"] {
            assert!(matches!(
                result.report[name].status,
                SourceStatus::Failed { .. }
            ));
            assert_eq!(result.report[name].listed, 0);
        }
    }

    #[tokio::test]
    async fn test_second_cycle_hits_cache() {
        let agg = aggregator().await;
        let connector = {
            let mut c = mock("zillow", Source::Zillow);
            // The cache must absorb the second cycle: exactly one fetch.
            c.expect_fetch()
                .times(1)
                .returning(|_| Ok(zillow_payload("1")));
            Arc::new(c) as Arc<dyn Connector>
        };
        let connectors = vec![connector];
        let query = ListingQuery::new("austin");

        let first = agg.collect(&connectors, &query).await;
        assert!(!first.report["zillow"].cache_hit);

        let second = agg.collect(&connectors, &query).await;
        assert!(second.report["zillow"].cache_hit);
        assert!(!second.listings[0].is_stale);
        assert!(second.listings[0].cache_hit);
    }

    struct SlowConnector;

    #[async_trait::async_trait]
    impl Connector for SlowConnector {
        fn name(&self) -> String {
            "zillow".to_string()
        }

        fn source(&self) -> Source {
            Source::Zillow
        }

        async fn fetch(&self, _query: &ListingQuery) -> Result<serde_json::Value, ProviderError> {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(json!([]))
        }
    }

    #[tokio::test]
    async fn test_timeout_marks_connector_timed_out() {
        let connector: Arc<dyn Connector> = Arc::new(SlowConnector);
        let cache = Arc::new(CacheLayer::new(CacheStore::in_memory().await.unwrap()));
        let agg = Aggregator::new(
            cache,
            AggregatorConfig {
                per_connector_timeout_secs: 1,
                max_concurrent_fetches: 4,
            },
            CacheConfig {
                database_path: String::new(),
                zillow_ttl_secs: 600,
                loopnet_ttl_secs: 600,
                realtoken_ttl_secs: 600,
            },
        );

        let result = agg.collect(&vec![connector], &ListingQuery::new("austin")).await;
        assert_eq!(result.report["zillow"].status, SourceStatus::TimedOut);
        assert!(result.listings.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_serves_stale_from_cache() {
        let cache = Arc::new(CacheLayer::new(CacheStore::in_memory().await.unwrap()));
        let query = ListingQuery::new("austin");

        // Seed an already-expired entry for the connector's key.
        let key = CacheKey::new("zillow", query.signature());
        cache
            .get_or_fetch(&key, std::time::Duration::from_secs(0), || async {
                Ok(zillow_payload("7"))
            })
            .await
            .unwrap();

        let connector = {
            let mut c = mock("zillow", Source::Zillow);
            c.expect_fetch()
                .returning(|_| Err(ProviderError::Malformed("down".to_string())));
            Arc::new(c) as Arc<dyn Connector>
        };
        let agg = Aggregator::new(
            cache,
            AggregatorConfig {
                per_connector_timeout_secs: 5,
                max_concurrent_fetches: 4,
            },
            CacheConfig {
                database_path: String::new(),
                zillow_ttl_secs: 600,
                loopnet_ttl_secs: 600,
                realtoken_ttl_secs: 600,
            },
        );

        let result = agg.collect(&vec![connector], &ListingQuery::new("austin")).await;
        let entry = &result.report["zillow"];
        assert!(matches!(entry.status, SourceStatus::Failed { .. }));
        assert!(entry.served_stale);
        assert_eq!(entry.listed, 1);
        assert!(result.listings[0].is_stale);
    }
}
