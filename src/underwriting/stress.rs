use serde::{Deserialize, Serialize};

use super::engine::IncomeModel;
use super::scenarios::FinancingScenario;
use super::Metric;
use crate::core::RateAssumptions;

/// One perturbed re-computation of the cash-flow metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressOutcome {
    pub dscr: Metric,
    pub cash_on_cash: Metric,
    pub monthly_cash_flow: f64,
    pub still_profitable: bool,
}

/// Baseline-vs-stressed comparison for one financing scenario. Each leg
/// perturbs a single input; `passed_all` requires positive cash flow under
/// every leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub vacancy_up: StressOutcome,
    pub rate_up: StressOutcome,
    pub expenses_up: StressOutcome,
    pub passed_all: bool,
}

impl StressReport {
    /// Worst stressed DSCR across the three legs, for risk-rating input.
    pub fn worst_dscr(&self) -> Metric {
        [self.vacancy_up.dscr, self.rate_up.dscr, self.expenses_up.dscr]
            .into_iter()
            .reduce(|a, b| if a.cmp_na_last(&b).is_le() { a } else { b })
            .unwrap_or(Metric::NotApplicable)
    }
}

fn outcome(income: &IncomeModel, scenario: &FinancingScenario) -> StressOutcome {
    let cash_flow = income.monthly_cash_flow(scenario);
    StressOutcome {
        dscr: income.dscr(scenario),
        cash_on_cash: income.cash_on_cash(scenario),
        monthly_cash_flow: cash_flow,
        still_profitable: cash_flow > 0.0,
    }
}

/// Recompute DSCR and cash-on-cash under each configured perturbation.
/// Only meaningful for income properties; the caller skips income-less ones.
pub fn run(
    price: f64,
    monthly_rent: f64,
    scenario: &FinancingScenario,
    assumptions: &RateAssumptions,
) -> StressReport {
    let deltas = &assumptions.stress;

    let vacancy_model =
        IncomeModel::with_vacancy(price, monthly_rent, assumptions.vacancy_rate + deltas.vacancy_up, assumptions);
    let vacancy_up = outcome(&vacancy_model, scenario);

    let base_model = IncomeModel::new(price, monthly_rent, assumptions);
    let shocked = FinancingScenario::with_rate(
        price,
        scenario.down_payment_pct,
        scenario.interest_rate + deltas.interest_rate_up,
        assumptions,
    );
    let rate_up = outcome(&base_model, &shocked);

    let expense_model = base_model.with_expense_multiplier(1.0 + deltas.expenses_up);
    let expenses_up = outcome(&expense_model, scenario);

    StressReport {
        vacancy_up,
        rate_up,
        expenses_up,
        passed_all: vacancy_up.still_profitable
            && rate_up.still_profitable
            && expenses_up.still_profitable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(price: f64, assumptions: &RateAssumptions) -> FinancingScenario {
        FinancingScenario::new(price, 0.20, assumptions)
    }

    #[test]
    fn test_vacancy_stress_never_improves_dscr() {
        let assumptions = RateAssumptions::default();
        let price = 300_000.0;
        let rent = 3_000.0;
        let scenario = scenario(price, &assumptions);

        let baseline = IncomeModel::new(price, rent, &assumptions).dscr(&scenario);
        let report = run(price, rent, &scenario, &assumptions);

        let (base, stressed) = match (baseline, report.vacancy_up.dscr) {
            (Metric::Value(b), Metric::Value(s)) => (b, s),
            other => panic!("expected defined DSCRs, got {other:?}"),
        };
        assert!(stressed <= base, "stress must not improve DSCR: {stressed} > {base}");
    }

    #[test]
    fn test_rate_shock_raises_debt_service() {
        let assumptions = RateAssumptions::default();
        let price = 300_000.0;
        let scenario = scenario(price, &assumptions);
        let report = run(price, 3_000.0, &scenario, &assumptions);

        let base_cf = IncomeModel::new(price, 3_000.0, &assumptions).monthly_cash_flow(&scenario);
        assert!(report.rate_up.monthly_cash_flow < base_cf);
    }

    #[test]
    fn test_marginal_deal_fails_stress() {
        let assumptions = RateAssumptions::default();
        // Rent barely above carrying cost; any shock should sink it.
        let price = 400_000.0;
        let scenario = scenario(price, &assumptions);
        let report = run(price, 2_400.0, &scenario, &assumptions);
        assert!(!report.passed_all);
    }
}
