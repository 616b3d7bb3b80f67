use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ValidationError;

/// Listing platforms the pipeline aggregates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Zillow,
    LoopNet,
    RealToken,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Zillow, Source::LoopNet, Source::RealToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow",
            Source::LoopNet => "loopnet",
            Source::RealToken => "realtoken",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    Residential,
    Commercial,
    MultiFamily,
    Hospitality,
    Tokenized,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Fiat,
    /// On-chain settlement in the named token (e.g. "USDC", "XDAI").
    Token(String),
}

/// Present only on tokenized listings: where the asset's shares live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizationInfo {
    pub blockchain: String,
    pub token_contract: String,
    pub fractional: bool,
}

/// Canonical listing record. Every provider payload is normalized into this
/// shape before anything downstream sees it; once built it is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    // Identity
    pub listing_id: String,
    pub source: Source,
    pub url: String,

    // Location
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Classification
    pub property_type: PropertyType,

    // Economics
    pub price: f64,
    pub monthly_rent: Option<f64>,
    pub payment_methods: Vec<PaymentMethod>,

    // Physical characteristics
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub square_feet: Option<f64>,
    pub year_built: Option<u32>,

    // Growth/location indicators (engine modifiers, all optional)
    pub population_growth: Option<f64>,
    pub job_growth: Option<f64>,
    pub income_growth: Option<f64>,
    pub appreciation_trend: Option<f64>,

    // Tokenization (iff property_type == Tokenized)
    pub tokenization: Option<TokenizationInfo>,

    // Provenance
    pub fetched_at: DateTime<Utc>,
    pub cache_hit: bool,
    /// Set when the record was served from an expired cache entry because the
    /// live fetch failed or timed out.
    pub is_stale: bool,
}

impl Property {
    pub fn annual_rent(&self) -> Option<f64> {
        self.monthly_rent.map(|r| r * 12.0)
    }

    /// Schema invariants every canonical record must hold. Records failing
    /// this are dropped by the normalizer, never handed to the engine.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listing_id.is_empty() {
            return Err(ValidationError::MissingField("listing_id"));
        }
        if self.address.is_empty() {
            return Err(ValidationError::MissingField("address"));
        }
        if !(self.price > 0.0) {
            return Err(ValidationError::NonPositivePrice(self.price));
        }
        if let Some(rent) = self.monthly_rent {
            if rent < 0.0 {
                return Err(ValidationError::NegativeRent(rent));
            }
        }
        match (self.property_type, &self.tokenization) {
            (PropertyType::Tokenized, None) => {
                return Err(ValidationError::TokenizationMismatch("missing"))
            }
            (PropertyType::Tokenized, Some(_)) => {}
            (_, Some(_)) => return Err(ValidationError::TokenizationMismatch("unexpected")),
            (_, None) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
pub fn test_property(price: f64, monthly_rent: Option<f64>) -> Property {
    Property {
        listing_id: "zillow:test-1".to_string(),
        source: Source::Zillow,
        url: "https://example.com/listing/1".to_string(),
        address: "12 Elm St".to_string(),
        city: "Austin".to_string(),
        state: "TX".to_string(),
        zip_code: "78701".to_string(),
        latitude: None,
        longitude: None,
        property_type: PropertyType::Residential,
        price,
        monthly_rent,
        payment_methods: vec![PaymentMethod::Fiat],
        bedrooms: Some(3.0),
        bathrooms: Some(2.0),
        square_feet: Some(1650.0),
        year_built: Some(1994),
        population_growth: None,
        job_growth: None,
        income_growth: None,
        appreciation_trend: None,
        tokenization: None,
        fetched_at: Utc::now(),
        cache_hit: false,
        is_stale: false,
    }
}
