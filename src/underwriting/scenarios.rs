use serde::{Deserialize, Serialize};

use crate::core::RateAssumptions;

/// One financing arrangement for a property: a down-payment tier plus the
/// loan it implies under the configured rate assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancingScenario {
    pub down_payment_pct: f64,
    pub down_payment: f64,
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub loan_term_months: u32,
    pub monthly_debt_service: f64,
}

impl FinancingScenario {
    pub fn new(price: f64, down_payment_pct: f64, assumptions: &RateAssumptions) -> Self {
        Self::with_rate(price, down_payment_pct, assumptions.interest_rate, assumptions)
    }

    /// Same tier under a different interest rate. Used by the rate-shock
    /// stress test.
    pub fn with_rate(
        price: f64,
        down_payment_pct: f64,
        interest_rate: f64,
        assumptions: &RateAssumptions,
    ) -> Self {
        let down_payment = price * down_payment_pct;
        let loan_amount = price - down_payment;
        Self {
            down_payment_pct,
            down_payment,
            loan_amount,
            interest_rate,
            loan_term_months: assumptions.loan_term_months,
            monthly_debt_service: monthly_payment(
                loan_amount,
                interest_rate,
                assumptions.loan_term_months,
            ),
        }
    }

    pub fn is_all_cash(&self) -> bool {
        self.loan_amount == 0.0
    }

    pub fn annual_debt_service(&self) -> f64 {
        self.monthly_debt_service * 12.0
    }

    /// Principal still owed after `months` of scheduled payments.
    pub fn remaining_balance(&self, months: u32) -> f64 {
        let c = self.interest_rate / 12.0;
        let n = self.loan_term_months.min(months);
        if c == 0.0 {
            return (self.loan_amount - self.monthly_debt_service * f64::from(n)).max(0.0);
        }
        let growth = (1.0 + c).powi(n as i32);
        let balance = self.loan_amount * growth - self.monthly_debt_service * (growth - 1.0) / c;
        balance.max(0.0)
    }
}

/// Standard amortization payment: L·c(1+c)^n / ((1+c)^n − 1), with the
/// zero-rate degenerate case falling back to straight-line principal.
pub fn monthly_payment(loan_amount: f64, annual_rate: f64, term_months: u32) -> f64 {
    if loan_amount <= 0.0 || term_months == 0 {
        return 0.0;
    }
    let c = annual_rate / 12.0;
    if c == 0.0 {
        return loan_amount / f64::from(term_months);
    }
    let growth = (1.0 + c).powi(term_months as i32);
    loan_amount * (c * growth) / (growth - 1.0)
}

/// One scenario per configured down-payment tier.
pub fn generate(price: f64, assumptions: &RateAssumptions) -> Vec<FinancingScenario> {
    assumptions
        .down_payment_tiers
        .iter()
        .map(|&pct| FinancingScenario::new(price, pct, assumptions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_payment_matches_closed_form() {
        // $240k at 6% over 30 years is a well-known ~$1,438.92/mo.
        let payment = monthly_payment(240_000.0, 0.06, 360);
        assert!((payment - 1438.92).abs() < 0.05, "got {payment}");
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        let payment = monthly_payment(120_000.0, 0.0, 120);
        assert!((payment - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_generation_per_tier() {
        let assumptions = RateAssumptions::default();
        let scenarios = generate(300_000.0, &assumptions);
        assert_eq!(scenarios.len(), 3);
        assert!((scenarios[0].down_payment - 60_000.0).abs() < 1e-9);
        assert!((scenarios[0].loan_amount - 240_000.0).abs() < 1e-9);
        // Larger down payment, smaller debt service.
        assert!(scenarios[2].monthly_debt_service < scenarios[0].monthly_debt_service);
    }

    #[test]
    fn test_remaining_balance_declines() {
        let assumptions = RateAssumptions::default();
        let scenario = FinancingScenario::new(300_000.0, 0.20, &assumptions);
        let at_5y = scenario.remaining_balance(60);
        let at_10y = scenario.remaining_balance(120);
        assert!(at_5y < scenario.loan_amount);
        assert!(at_10y < at_5y);
        assert!((scenario.remaining_balance(360)).abs() < 1.0);
    }
}
