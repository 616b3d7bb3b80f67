pub mod engine;
pub mod irr;
pub mod metric;
pub mod risk;
pub mod scenarios;
pub mod stress;

pub use engine::{evaluate, ScenarioResult, UnderwritingResult};
pub use metric::Metric;
pub use risk::RiskRating;
pub use scenarios::FinancingScenario;
pub use stress::{StressOutcome, StressReport};
