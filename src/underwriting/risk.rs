use serde::{Deserialize, Serialize};

use super::Metric;
use crate::core::RiskBands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskRating {
    Low,
    Medium,
    High,
    Severe,
}

impl RiskRating {
    /// Score contribution for the composite: Low is worth the most.
    pub fn inverse_score(&self) -> f64 {
        match self {
            RiskRating::Low => 1.0,
            RiskRating::Medium => 2.0 / 3.0,
            RiskRating::High => 1.0 / 3.0,
            RiskRating::Severe => 0.0,
        }
    }
}

impl std::fmt::Display for RiskRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskRating::Low => "low",
            RiskRating::Medium => "medium",
            RiskRating::High => "high",
            RiskRating::Severe => "severe",
        };
        f.write_str(s)
    }
}

// Factor weights. The bands that bucket the weighted sum are configuration
// (RiskBands); these relative weights are part of the rating definition.
const WEIGHT_BREAK_EVEN: f64 = 0.40;
const WEIGHT_DSCR_DEGRADATION: f64 = 0.35;
const WEIGHT_CAP_SPREAD: f64 = 0.25;

// A factor the property gives us no evidence for contributes a middling
// value instead of rewarding or punishing missing data.
const NEUTRAL_FACTOR: f64 = 0.5;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Break-even above ~0.85 of gross rent leaves little margin; above 1.0 the
/// property loses money at full occupancy.
fn break_even_factor(break_even_ratio: Metric) -> f64 {
    match break_even_ratio.value() {
        Some(ber) => clamp01((ber - 0.85) / 0.30),
        None => NEUTRAL_FACTOR,
    }
}

/// Relative DSCR loss between baseline and the worst stressed leg, with a
/// full penalty when the stressed DSCR drops below 1.0.
fn dscr_degradation_factor(baseline: Metric, worst_stressed: Metric) -> f64 {
    match (baseline.value(), worst_stressed.value()) {
        (Some(base), Some(stressed)) if base > 0.0 => {
            let degradation = clamp01((base - stressed) / base);
            if stressed < 1.0 {
                1.0
            } else {
                degradation
            }
        }
        _ => NEUTRAL_FACTOR,
    }
}

/// Cap-rate spread under zero means the asset yields less than the
/// risk-free alternative.
fn cap_spread_factor(spread: Metric) -> f64 {
    match spread.value() {
        Some(s) => clamp01((0.02 - s) / 0.04),
        None => NEUTRAL_FACTOR,
    }
}

/// Weighted risk factors bucketed into a rating by the configured bands.
pub fn rate(
    break_even_ratio: Metric,
    baseline_dscr: Metric,
    worst_stressed_dscr: Metric,
    cap_rate_spread: Metric,
    bands: &RiskBands,
) -> RiskRating {
    let score = WEIGHT_BREAK_EVEN * break_even_factor(break_even_ratio)
        + WEIGHT_DSCR_DEGRADATION * dscr_degradation_factor(baseline_dscr, worst_stressed_dscr)
        + WEIGHT_CAP_SPREAD * cap_spread_factor(cap_rate_spread);

    if score >= bands.severe {
        RiskRating::Severe
    } else if score >= bands.high {
        RiskRating::High
    } else if score >= bands.medium {
        RiskRating::Medium
    } else {
        RiskRating::Low
    }
}
