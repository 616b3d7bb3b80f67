use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A financial metric that may be undefined for a given property.
///
/// `NotApplicable` covers structural gaps (no rent, no debt service),
/// `NoSolution` covers numeric non-convergence (IRR root-finding). Neither
/// is an error: both flow through ranking as explicit sentinels and always
/// sort last regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Metric {
    Value(f64),
    NotApplicable,
    NoSolution,
}

impl Metric {
    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Metric::Value(_))
    }

    /// Wraps a division, mapping a zero (or non-finite) denominator to
    /// `NotApplicable` instead of inf/NaN.
    pub fn ratio(numerator: f64, denominator: f64) -> Metric {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            Metric::NotApplicable
        } else {
            Metric::Value(numerator / denominator)
        }
    }

    /// Ascending comparison with undefined values greater than everything,
    /// so they land at the tail of an ascending sort.
    pub fn cmp_na_last(&self, other: &Metric) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl From<Option<f64>> for Metric {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) if v.is_finite() => Metric::Value(v),
            _ => Metric::NotApplicable,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{:.4}", v),
            Metric::NotApplicable => f.write_str("n/a"),
            Metric::NoSolution => f.write_str("no solution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_guards_division_by_zero() {
        assert_eq!(Metric::ratio(24_000.0, 0.0), Metric::NotApplicable);
        assert_eq!(Metric::ratio(24_000.0, 300_000.0), Metric::Value(0.08));
    }

    #[test]
    fn test_undefined_sorts_last_ascending() {
        let mut metrics = vec![
            Metric::NotApplicable,
            Metric::Value(2.0),
            Metric::NoSolution,
            Metric::Value(1.0),
        ];
        metrics.sort_by(|a, b| a.cmp_na_last(b));
        assert_eq!(metrics[0], Metric::Value(1.0));
        assert_eq!(metrics[1], Metric::Value(2.0));
        assert!(!metrics[2].is_defined());
        assert!(!metrics[3].is_defined());
    }
}
