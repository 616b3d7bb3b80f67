use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::model::Source;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub providers: ProviderConfig,
    pub cache: CacheConfig,
    pub aggregator: AggregatorConfig,
    pub assumptions: RateAssumptions,
    pub scoring: ScoringConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub zillow_base_url: String,
    pub loopnet_base_url: String,
    pub realtoken_base_url: String,
}

impl ProviderConfig {
    pub fn base_url(&self, source: Source) -> &str {
        match source {
            Source::Zillow => &self.zillow_base_url,
            Source::LoopNet => &self.loopnet_base_url,
            Source::RealToken => &self.realtoken_base_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub database_path: String,
    /// Per-provider TTLs in seconds. Tokenized registries change slowly so
    /// they default to a longer window.
    pub zillow_ttl_secs: u64,
    pub loopnet_ttl_secs: u64,
    pub realtoken_ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl_for(&self, source: Source) -> Duration {
        let secs = match source {
            Source::Zillow => self.zillow_ttl_secs,
            Source::LoopNet => self.loopnet_ttl_secs,
            Source::RealToken => self.realtoken_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub per_connector_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
}

impl AggregatorConfig {
    pub fn per_connector_timeout(&self) -> Duration {
        Duration::from_secs(self.per_connector_timeout_secs)
    }
}

/// Underwriting inputs. Every rate here is a decimal fraction (0.06 = 6%).
/// Expense defaults follow common underwriting rules of thumb: tax and
/// insurance as a share of price, vacancy/maintenance/management as a share
/// of collected rent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateAssumptions {
    pub interest_rate: f64,
    pub loan_term_months: u32,
    pub risk_free_rate: f64,
    pub down_payment_tiers: Vec<f64>,

    // Operating expense model
    pub property_tax_rate: f64,
    pub insurance_rate: f64,
    pub vacancy_rate: f64,
    pub maintenance_rate: f64,
    pub management_rate: f64,

    // Holding-period model for IRR
    pub holding_period_years: u32,
    pub appreciation_rate: f64,
    pub selling_cost_rate: f64,

    pub stress: StressDeltas,
}

impl Default for RateAssumptions {
    fn default() -> Self {
        Self {
            interest_rate: 0.055,
            loan_term_months: 360,
            risk_free_rate: 0.042,
            down_payment_tiers: vec![0.20, 0.25, 0.30],
            property_tax_rate: 0.011,
            insurance_rate: 0.005,
            vacancy_rate: 0.05,
            maintenance_rate: 0.05,
            management_rate: 0.10,
            holding_period_years: 5,
            appreciation_rate: 0.03,
            selling_cost_rate: 0.06,
            stress: StressDeltas::default(),
        }
    }
}

/// Additive perturbations applied one at a time by the stress tester.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StressDeltas {
    pub vacancy_up: f64,
    pub interest_rate_up: f64,
    pub expenses_up: f64,
}

impl Default for StressDeltas {
    fn default() -> Self {
        Self {
            vacancy_up: 0.05,
            interest_rate_up: 0.02,
            expenses_up: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    pub risk_bands: RiskBands,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            risk_bands: RiskBands::default(),
        }
    }
}

/// Composite-score weights. Scoring policy lives here, not in the metric
/// formulas; weights over undefined components are renormalized away at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreWeights {
    pub rental_yield: f64,
    pub cash_on_cash: f64,
    pub dscr: f64,
    pub cap_rate_spread: f64,
    pub inverse_risk: f64,
    pub growth: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rental_yield: 0.25,
            cash_on_cash: 0.20,
            dscr: 0.15,
            cap_rate_spread: 0.15,
            inverse_risk: 0.15,
            growth: 0.10,
        }
    }
}

/// Threshold bands that bucket the weighted risk factor sum into a rating.
/// A factor sum at or above `severe` rates Severe, and so on downward.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskBands {
    pub medium: f64,
    pub high: f64,
    pub severe: f64,
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            medium: 0.35,
            high: 0.60,
            severe: 0.80,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            providers: ProviderConfig {
                zillow_base_url: env::var("ZILLOW_BASE_URL")
                    .unwrap_or_else(|_| "https://api.zillow.com".to_string()),
                loopnet_base_url: env::var("LOOPNET_BASE_URL")
                    .unwrap_or_else(|_| "https://api.loopnet.com".to_string()),
                realtoken_base_url: env::var("REALTOKEN_BASE_URL")
                    .unwrap_or_else(|_| "https://api.realtoken.community".to_string()),
            },
            cache: CacheConfig {
                database_path: env::var("CACHE_DB_PATH")
                    .unwrap_or_else(|_| ".cache/propscout.db".to_string()),
                zillow_ttl_secs: env_parse("ZILLOW_TTL_SECS", 3600),
                loopnet_ttl_secs: env_parse("LOOPNET_TTL_SECS", 3600),
                realtoken_ttl_secs: env_parse("REALTOKEN_TTL_SECS", 21600),
            },
            aggregator: AggregatorConfig {
                per_connector_timeout_secs: env_parse("CONNECTOR_TIMEOUT_SECS", 30),
                max_concurrent_fetches: env_parse("MAX_CONCURRENT_FETCHES", 8),
            },
            assumptions: RateAssumptions {
                interest_rate: env_parse("MORTGAGE_RATE", 0.055),
                loan_term_months: env_parse("LOAN_TERM_MONTHS", 360),
                risk_free_rate: env_parse("RISK_FREE_RATE", 0.042),
                ..RateAssumptions::default()
            },
            scoring: ScoringConfig::default(),
            monitoring: MonitoringConfig {
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
