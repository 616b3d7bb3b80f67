use anyhow::Result;
use std::env;
use std::sync::Arc;

use propscout::aggregator::Aggregator;
use propscout::cache::{CacheLayer, CacheStore};
use propscout::connectors::{Connector, ListingQuery, RestConnector};
use propscout::core::{logging, Config};
use propscout::model::Source;
use propscout::ranking::{self, RankedListing, SortDir, SortKey};
use propscout::underwriting;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 propscout starting (v{})", env!("CARGO_PKG_VERSION"));

    let store = CacheStore::new(&config.cache.database_path).await?;
    let cache = Arc::new(CacheLayer::new(store));

    let connectors: Vec<Arc<dyn Connector>> = Source::ALL
        .iter()
        .map(|&source| {
            Arc::new(RestConnector::new(source, config.providers.base_url(source)))
                as Arc<dyn Connector>
        })
        .collect();

    let location = env::args().nth(1).unwrap_or_else(|| "Austin, TX".to_string());
    let query = ListingQuery::new(&location);
    tracing::info!("Searching '{location}' across {} providers", connectors.len());

    let aggregator = Aggregator::new(
        cache,
        config.aggregator.clone(),
        config.cache.clone(),
    );
    let cycle = aggregator.collect(&connectors, &query).await;

    let mut ranked: Vec<RankedListing> = Vec::with_capacity(cycle.listings.len());
    for property in cycle.listings {
        match underwriting::evaluate(&property, &config.assumptions, &config.scoring) {
            Ok(result) => ranked.push(RankedListing {
                property,
                underwriting: result,
            }),
            Err(e) => tracing::warn!("{}: rejected by underwriting: {}", property.listing_id, e),
        }
    }
    ranking::rank(&mut ranked, SortKey::CompositeScore, SortDir::Descending);

    tracing::info!("✅ Underwrote {} listings", ranked.len());
    for entry in ranked.iter().take(20) {
        let u = &entry.underwriting;
        let stale = if entry.property.is_stale { " [stale]" } else { "" };
        println!(
            "{:>5.1}  {:<22} ${:>12.0}  yield {:>8}  coc {:>8}  risk {:<6}{}",
            u.composite_score,
            entry.property.listing_id,
            entry.property.price,
            u.rental_yield.to_string(),
            u.best_cash_on_cash.to_string(),
            u.risk_rating.to_string(),
            stale,
        );
    }

    Ok(())
}
