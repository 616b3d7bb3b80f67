use std::cmp::Ordering;

use crate::model::{Property, PropertyType, Source};
use crate::underwriting::{Metric, RiskRating, UnderwritingResult};

/// A listing paired with its underwriting output, the unit the presentation
/// layer sorts and filters.
#[derive(Debug, Clone)]
pub struct RankedListing {
    pub property: Property,
    pub underwriting: UnderwritingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CompositeScore,
    RentalYield,
    PriceToRent,
    BestCashOnCash,
    BestIrr,
    CapRate,
    GrowthFactor,
    RiskRating,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Ascending,
    Descending,
}

fn metric_for(entry: &RankedListing, key: SortKey) -> Metric {
    let u = &entry.underwriting;
    match key {
        SortKey::CompositeScore => Metric::Value(u.composite_score),
        SortKey::RentalYield => u.rental_yield,
        SortKey::PriceToRent => u.price_to_rent,
        SortKey::BestCashOnCash => u.best_cash_on_cash,
        SortKey::BestIrr => u.best_irr,
        SortKey::CapRate => u.cap_rate,
        SortKey::GrowthFactor => Metric::Value(u.growth_factor),
        SortKey::RiskRating => Metric::Value(u.risk_rating.inverse_score()),
        SortKey::Price => Metric::Value(entry.property.price),
    }
}

/// Stable sort on any ranking key. Undefined metrics sort last in both
/// directions: flipping the direction reorders the defined values only.
pub fn rank(entries: &mut [RankedListing], key: SortKey, dir: SortDir) {
    entries.sort_by(|a, b| {
        let ma = metric_for(a, key);
        let mb = metric_for(b, key);
        match (ma.value(), mb.value()) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                match dir {
                    SortDir::Ascending => ord,
                    SortDir::Descending => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// Presentation-side filter. Every field is optional; an empty filter
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub sources: Option<Vec<Source>>,
    pub property_types: Option<Vec<PropertyType>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<f64>,
    pub min_rental_yield: Option<f64>,
    pub min_cap_rate: Option<f64>,
    pub max_risk: Option<RiskRating>,
    pub min_composite_score: Option<f64>,
    pub exclude_stale: bool,
}

impl ListingFilter {
    pub fn matches(&self, entry: &RankedListing) -> bool {
        let p = &entry.property;
        let u = &entry.underwriting;

        if let Some(sources) = &self.sources {
            if !sources.contains(&p.source) {
                return false;
            }
        }
        if let Some(types) = &self.property_types {
            if !types.contains(&p.property_type) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| p.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| p.price > max) {
            return false;
        }
        if let Some(min) = self.min_bedrooms {
            if p.bedrooms.map_or(true, |b| b < min) {
                return false;
            }
        }
        if let Some(min) = self.min_rental_yield {
            if u.rental_yield.value().map_or(true, |y| y < min) {
                return false;
            }
        }
        if let Some(min) = self.min_cap_rate {
            if u.cap_rate.value().map_or(true, |c| c < min) {
                return false;
            }
        }
        if self.max_risk.is_some_and(|max| u.risk_rating > max) {
            return false;
        }
        if self
            .min_composite_score
            .is_some_and(|min| u.composite_score < min)
        {
            return false;
        }
        if self.exclude_stale && p.is_stale {
            return false;
        }
        true
    }

    pub fn apply(&self, entries: Vec<RankedListing>) -> Vec<RankedListing> {
        entries.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ScoringConfig;
    use crate::core::RateAssumptions;
    use crate::model::test_property;
    use crate::underwriting::evaluate;

    fn entry(id: &str, price: f64, rent: Option<f64>) -> RankedListing {
        let mut property = test_property(price, rent);
        property.listing_id = id.to_string();
        let underwriting = evaluate(
            &property,
            &RateAssumptions::default(),
            &ScoringConfig::default(),
        )
        .unwrap();
        RankedListing {
            property,
            underwriting,
        }
    }

    fn ids(entries: &[RankedListing]) -> Vec<&str> {
        entries.iter().map(|e| e.property.listing_id.as_str()).collect()
    }

    #[test]
    fn test_na_sorts_last_both_directions() {
        let mut entries = vec![
            entry("no-rent", 500_000.0, None),
            entry("high-yield", 200_000.0, Some(2_200.0)),
            entry("low-yield", 400_000.0, Some(1_500.0)),
        ];

        rank(&mut entries, SortKey::RentalYield, SortDir::Descending);
        assert_eq!(ids(&entries), vec!["high-yield", "low-yield", "no-rent"]);

        rank(&mut entries, SortKey::RentalYield, SortDir::Ascending);
        assert_eq!(ids(&entries), vec!["low-yield", "high-yield", "no-rent"]);
    }

    #[test]
    fn test_sort_by_price() {
        let mut entries = vec![
            entry("b", 400_000.0, Some(2_000.0)),
            entry("a", 200_000.0, Some(2_000.0)),
        ];
        rank(&mut entries, SortKey::Price, SortDir::Ascending);
        assert_eq!(ids(&entries), vec!["a", "b"]);
    }

    #[test]
    fn test_stale_visible_unless_excluded() {
        let mut stale = entry("stale", 300_000.0, Some(2_000.0));
        stale.property.is_stale = true;
        let fresh = entry("fresh", 300_000.0, Some(2_000.0));

        // Stale-served records surface by default; hiding them is opt-in.
        let filter = ListingFilter::default();
        assert_eq!(filter.apply(vec![stale.clone(), fresh]).len(), 2);

        let filter = ListingFilter {
            exclude_stale: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(vec![stale])), Vec::<&str>::new());
    }

    #[test]
    fn test_filter_by_yield_treats_na_as_nonmatching() {
        let filter = ListingFilter {
            min_rental_yield: Some(0.05),
            ..Default::default()
        };
        assert!(!filter.matches(&entry("land", 500_000.0, None)));
        assert!(filter.matches(&entry("rented", 200_000.0, Some(1_500.0))));
    }

    #[test]
    fn test_filter_price_band() {
        let filter = ListingFilter {
            min_price: Some(250_000.0),
            max_price: Some(350_000.0),
            ..Default::default()
        };
        assert!(filter.matches(&entry("in", 300_000.0, Some(2_000.0))));
        assert!(!filter.matches(&entry("under", 200_000.0, Some(2_000.0))));
        assert!(!filter.matches(&entry("over", 400_000.0, Some(2_000.0))));
    }
}
