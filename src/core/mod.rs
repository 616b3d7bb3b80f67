pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, RateAssumptions, RiskBands, ScoreWeights, StressDeltas};
pub use error::{ProviderError, ValidationError};
