pub mod aggregator;
pub mod cache;
pub mod connectors;
pub mod core;
pub mod model;
pub mod normalize;
pub mod ranking;
pub mod underwriting;

pub use crate::aggregator::{Aggregator, CycleResult, SourceReport, SourceStatus};
pub use crate::cache::{CacheKey, CacheLayer, CacheStore};
pub use crate::connectors::{Connector, ListingQuery, RestConnector};
pub use crate::core::{Config, ProviderError, RateAssumptions, ValidationError};
pub use crate::model::{Property, PropertyType, Source};
pub use crate::ranking::{ListingFilter, RankedListing, SortDir, SortKey};
pub use crate::underwriting::{evaluate, Metric, RiskRating, UnderwritingResult};
