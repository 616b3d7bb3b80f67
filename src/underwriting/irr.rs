use super::Metric;

const MAX_NEWTON_ITERATIONS: u32 = 50;
const MAX_BISECTION_ITERATIONS: u32 = 100;
const CONVERGENCE_EPS: f64 = 1e-7;
// Monthly rate search window: -99% to +100% per month covers anything a
// real-estate cash-flow series can produce.
const RATE_LO: f64 = -0.99;
const RATE_HI: f64 = 1.0;

/// Net present value of a cash-flow series at a per-period discount rate.
/// `flows[0]` is the time-zero flow (undiscounted).
pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}

fn npv_derivative(rate: f64, flows: &[f64]) -> f64 {
    flows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(t, cf)| -(t as f64) * cf / (1.0 + rate).powi(t as i32 + 1))
        .sum()
}

/// Internal rate of return for a monthly cash-flow series, annualized.
///
/// Newton iteration from a neutral starting point, falling back to bisection
/// when Newton diverges or walks out of the valid rate window. A series whose
/// NPV never changes sign has no root in the window and reports
/// `Metric::NoSolution` rather than a misleading number.
pub fn annualized_irr(monthly_flows: &[f64]) -> Metric {
    if monthly_flows.len() < 2 {
        return Metric::NotApplicable;
    }
    let has_outflow = monthly_flows.iter().any(|cf| *cf < 0.0);
    let has_inflow = monthly_flows.iter().any(|cf| *cf > 0.0);
    if !has_outflow || !has_inflow {
        // Sign never changes, NPV is monotone in the flows and has no root.
        return Metric::NoSolution;
    }

    let monthly = newton(monthly_flows).or_else(|| bisect(monthly_flows));
    match monthly {
        Some(r) => Metric::Value((1.0 + r).powi(12) - 1.0),
        None => Metric::NoSolution,
    }
}

fn newton(flows: &[f64]) -> Option<f64> {
    let mut rate = 0.01;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let value = npv(rate, flows);
        if value.abs() < CONVERGENCE_EPS {
            return Some(rate);
        }
        let slope = npv_derivative(rate, flows);
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        let next = rate - value / slope;
        if !next.is_finite() || next <= RATE_LO || next >= RATE_HI {
            return None;
        }
        if (next - rate).abs() < CONVERGENCE_EPS {
            return Some(next);
        }
        rate = next;
    }
    None
}

fn bisect(flows: &[f64]) -> Option<f64> {
    let mut lo = RATE_LO;
    let mut hi = RATE_HI;
    let mut npv_lo = npv(lo, flows);
    if npv_lo == 0.0 {
        return Some(lo);
    }
    if npv_lo.signum() == npv(hi, flows).signum() {
        return None;
    }
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let npv_mid = npv(mid, flows);
        if npv_mid.abs() < CONVERGENCE_EPS || (hi - lo) / 2.0 < CONVERGENCE_EPS {
            return Some(mid);
        }
        if npv_mid.signum() == npv_lo.signum() {
            lo = mid;
            npv_lo = npv_mid;
        } else {
            hi = mid;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npv_at_zero_rate_is_sum() {
        let flows = [-100.0, 60.0, 60.0];
        assert!((npv(0.0, &flows) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_irr_known_series() {
        // -1000 now, 1120 in 12 months: monthly IRR makes the annualized
        // rate exactly 12%.
        let mut flows = vec![-1000.0];
        flows.extend(std::iter::repeat(0.0).take(11));
        flows.push(1120.0);
        match annualized_irr(&flows) {
            Metric::Value(irr) => assert!((irr - 0.12).abs() < 1e-4, "got {irr}"),
            other => panic!("expected value, got {other}"),
        }
    }

    #[test]
    fn test_irr_all_negative_has_no_solution() {
        let flows = [-1000.0, -50.0, -50.0];
        assert_eq!(annualized_irr(&flows), Metric::NoSolution);
    }

    #[test]
    fn test_irr_negative_return_series() {
        // Recover only 900 of 1000: IRR is defined and negative.
        let flows = [-1000.0, 0.0, 0.0, 900.0];
        match annualized_irr(&flows) {
            Metric::Value(irr) => assert!(irr < 0.0),
            other => panic!("expected value, got {other}"),
        }
    }
}
