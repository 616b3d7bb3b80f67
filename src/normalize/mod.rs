use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::ValidationError;
use crate::model::{PaymentMethod, Property, PropertyType, Source, TokenizationInfo};

/// Normalization result for one raw payload: the canonical records that
/// passed validation plus the count of records that did not.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub listings: Vec<Property>,
    pub dropped: usize,
}

/// Provenance attached to every record produced from one payload.
#[derive(Debug, Clone, Copy)]
pub struct Provenance {
    pub fetched_at: DateTime<Utc>,
    pub cache_hit: bool,
    pub is_stale: bool,
}

/// Map a provider-native payload into canonical Property records. Adding a
/// provider means adding a mapping arm here; nothing downstream branches on
/// the source.
pub fn normalize(source: Source, payload: &Value, provenance: Provenance) -> NormalizeOutcome {
    let records = match payload.get("results").unwrap_or(payload) {
        Value::Array(items) => items.as_slice(),
        _ => {
            tracing::warn!("{}: payload is not a listing array, dropping", source);
            return NormalizeOutcome { listings: Vec::new(), dropped: 1 };
        }
    };

    let mut outcome = NormalizeOutcome::default();
    for record in records {
        let mapped = match source {
            Source::Zillow => map_zillow(record),
            Source::LoopNet => map_loopnet(record),
            Source::RealToken => map_realtoken(record),
        };
        match mapped.and_then(|p| p.validate().map(|_| p)) {
            Ok(mut property) => {
                property.fetched_at = provenance.fetched_at;
                property.cache_hit = provenance.cache_hit;
                property.is_stale = provenance.is_stale;
                outcome.listings.push(property);
            }
            Err(e) => {
                tracing::debug!("{}: dropped record: {}", source, e);
                outcome.dropped += 1;
            }
        }
    }
    outcome
}

fn str_field(record: &Value, key: &str) -> Option<String> {
    record.get(key)?.as_str().map(|s| s.to_string())
}

fn f64_field(record: &Value, key: &str) -> Option<f64> {
    let v = record.get(key)?;
    v.as_f64().or_else(|| v.as_str()?.parse().ok())
}

fn required_str(record: &Value, key: &'static str) -> Result<String, ValidationError> {
    str_field(record, key).ok_or(ValidationError::MissingField(key))
}

fn required_f64(record: &Value, key: &'static str) -> Result<f64, ValidationError> {
    f64_field(record, key).ok_or(ValidationError::MissingField(key))
}

fn base_property(listing_id: String, source: Source, property_type: PropertyType) -> Property {
    Property {
        listing_id,
        source,
        url: String::new(),
        address: String::new(),
        city: String::new(),
        state: String::new(),
        zip_code: String::new(),
        latitude: None,
        longitude: None,
        property_type,
        price: 0.0,
        monthly_rent: None,
        payment_methods: vec![PaymentMethod::Fiat],
        bedrooms: None,
        bathrooms: None,
        square_feet: None,
        year_built: None,
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

/// Residential search results: flat records keyed by `zpid`, monthly rent
/// estimate under `rentZestimate`.
fn map_zillow(record: &Value) -> Result<Property, ValidationError> {
    let zpid = required_str(record, "zpid")?;
    let property_type = match str_field(record, "homeType").as_deref() {
        Some("MULTI_FAMILY") => PropertyType::MultiFamily,
        _ => PropertyType::Residential,
    };

    let mut property = base_property(format!("zillow:{zpid}"), Source::Zillow, property_type);
    property.url = str_field(record, "detailUrl").unwrap_or_default();
    property.address = required_str(record, "streetAddress")?;
    property.city = str_field(record, "city").unwrap_or_default();
    property.state = str_field(record, "state").unwrap_or_default();
    property.zip_code = str_field(record, "zipcode").unwrap_or_default();
    property.latitude = f64_field(record, "latitude");
    property.longitude = f64_field(record, "longitude");
    property.price = required_f64(record, "price")?;
    property.monthly_rent = f64_field(record, "rentZestimate");
    property.bedrooms = f64_field(record, "bedrooms");
    property.bathrooms = f64_field(record, "bathrooms");
    property.square_feet = f64_field(record, "livingArea");
    property.year_built = f64_field(record, "yearBuilt").map(|y| y as u32);
    Ok(property)
}

/// Commercial listings: `askingPrice` plus an annual NOI standing in for
/// rent when the listing does not state one.
fn map_loopnet(record: &Value) -> Result<Property, ValidationError> {
    let id = required_str(record, "listingId")?;
    let property_type = match str_field(record, "propertyType").as_deref() {
        Some("multifamily") => PropertyType::MultiFamily,
        Some("hospitality") => PropertyType::Hospitality,
        _ => PropertyType::Commercial,
    };

    let mut property = base_property(format!("loopnet:{id}"), Source::LoopNet, property_type);
    property.url = str_field(record, "listingUrl").unwrap_or_default();
    property.address = required_str(record, "address")?;
    property.city = str_field(record, "city").unwrap_or_default();
    property.state = str_field(record, "state").unwrap_or_default();
    property.zip_code = str_field(record, "zip").unwrap_or_default();
    property.price = required_f64(record, "askingPrice")?;
    property.monthly_rent = f64_field(record, "annualRent")
        .or_else(|| f64_field(record, "noi"))
        .map(|annual| annual / 12.0);
    property.square_feet = f64_field(record, "buildingSize");
    property.year_built = f64_field(record, "yearBuilt").map(|y| y as u32);
    Ok(property)
}

/// Tokenized-asset registry: whole-asset price is token price times supply,
/// net rent is reported monthly, settlement happens in the listed tokens.
fn map_realtoken(record: &Value) -> Result<Property, ValidationError> {
    let uuid = required_str(record, "uuid")?;
    let token_price = required_f64(record, "tokenPrice")?;
    let total_tokens = required_f64(record, "totalTokens")?;

    let mut property = base_property(
        format!("realtoken:{uuid}"),
        Source::RealToken,
        PropertyType::Tokenized,
    );
    property.url = str_field(record, "marketplaceLink").unwrap_or_default();
    property.address = required_str(record, "fullName")?;
    property.city = str_field(record, "city").unwrap_or_default();
    property.state = str_field(record, "state").unwrap_or_default();
    property.zip_code = str_field(record, "zip").unwrap_or_default();
    property.price = token_price * total_tokens;
    property.monthly_rent = f64_field(record, "netRentMonth");
    property.bedrooms = f64_field(record, "bedrooms");
    property.bathrooms = f64_field(record, "bathrooms");
    property.square_feet = f64_field(record, "squareFeet");

    property.payment_methods = record
        .get("currencies")
        .and_then(Value::as_array)
        .map(|tokens| {
            tokens
                .iter()
                .filter_map(Value::as_str)
                .map(|t| PaymentMethod::Token(t.to_string()))
                .collect()
        })
        .unwrap_or_else(|| vec![PaymentMethod::Token("USDC".to_string())]);

    property.tokenization = Some(TokenizationInfo {
        blockchain: str_field(record, "blockchain").unwrap_or_else(|| "gnosis".to_string()),
        token_contract: required_str(record, "tokenContract")?,
        fractional: true,
    });
    Ok(property)
}
