use serde::{Deserialize, Serialize};

use super::irr;
use super::risk::{self, RiskRating};
use super::scenarios::{self, FinancingScenario};
use super::stress::{self, StressReport};
use super::Metric;
use crate::core::config::ScoringConfig;
use crate::core::{RateAssumptions, ValidationError};
use crate::model::Property;

/// Per-scenario return metrics plus the stressed re-computations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: FinancingScenario,
    pub monthly_cash_flow: Metric,
    pub annual_cash_flow: Metric,
    pub cash_on_cash: Metric,
    pub dscr: Metric,
    pub irr: Metric,
    pub break_even_ratio: Metric,
    pub stress: Option<StressReport>,
}

/// Full underwriting output for one property. Owned by the engine, computed
/// fresh each cycle, never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingResult {
    pub listing_id: String,

    // Scenario-independent ratios
    pub rental_yield: Metric,
    pub price_to_rent: Metric,
    pub gross_rent_multiplier: Metric,
    pub cap_rate: Metric,
    pub cap_rate_spread: Metric,
    pub annual_noi: Metric,
    pub operating_expense_ratio: Metric,
    pub one_percent_rule_value: Metric,
    pub one_percent_rule_passed: Option<bool>,

    pub scenarios: Vec<ScenarioResult>,

    // Fields the presentation layer sorts on.
    pub best_cash_on_cash: Metric,
    pub best_irr: Metric,
    pub stress_passed: Option<bool>,
    pub growth_factor: f64,
    pub risk_rating: RiskRating,
    pub composite_score: f64,
}

/// Monthly income statement for a property under the expense model: taxes
/// and insurance scale with price, vacancy/maintenance/management scale with
/// rent. Perturbable for stress testing.
#[derive(Debug, Clone, Copy)]
pub struct IncomeModel {
    monthly_rent: f64,
    monthly_expenses: f64,
}

impl IncomeModel {
    pub fn new(price: f64, monthly_rent: f64, assumptions: &RateAssumptions) -> Self {
        Self::with_vacancy(price, monthly_rent, assumptions.vacancy_rate, assumptions)
    }

    pub fn with_vacancy(
        price: f64,
        monthly_rent: f64,
        vacancy_rate: f64,
        assumptions: &RateAssumptions,
    ) -> Self {
        let property_tax = price * assumptions.property_tax_rate / 12.0;
        let insurance = price * assumptions.insurance_rate / 12.0;
        let vacancy = monthly_rent * vacancy_rate;
        let maintenance = monthly_rent * assumptions.maintenance_rate;
        let management = monthly_rent * assumptions.management_rate;
        Self {
            monthly_rent,
            monthly_expenses: property_tax + insurance + vacancy + maintenance + management,
        }
    }

    pub fn with_expense_multiplier(&self, multiplier: f64) -> Self {
        Self {
            monthly_rent: self.monthly_rent,
            monthly_expenses: self.monthly_expenses * multiplier,
        }
    }

    pub fn monthly_noi(&self) -> f64 {
        self.monthly_rent - self.monthly_expenses
    }

    pub fn annual_noi(&self) -> f64 {
        self.monthly_noi() * 12.0
    }

    pub fn monthly_cash_flow(&self, scenario: &FinancingScenario) -> f64 {
        self.monthly_noi() - scenario.monthly_debt_service
    }

    /// DSCR is undefined for an all-cash scenario: there is no debt to cover.
    pub fn dscr(&self, scenario: &FinancingScenario) -> Metric {
        if scenario.is_all_cash() {
            return Metric::NotApplicable;
        }
        Metric::ratio(self.annual_noi(), scenario.annual_debt_service())
    }

    pub fn cash_on_cash(&self, scenario: &FinancingScenario) -> Metric {
        Metric::ratio(self.monthly_cash_flow(scenario) * 12.0, scenario.down_payment)
    }

    pub fn break_even_ratio(&self, scenario: &FinancingScenario) -> Metric {
        Metric::ratio(
            self.monthly_expenses + scenario.monthly_debt_service,
            self.monthly_rent,
        )
    }

    pub fn operating_expense_ratio(&self) -> Metric {
        Metric::ratio(self.monthly_expenses, self.monthly_rent)
    }
}

// Reference scales that squash raw metrics onto [0, 1] for the composite.
// A 12% yield or cash-on-cash saturates its component; DSCR saturates at
// 2.0; a spread of +4% over risk-free saturates; growth factors span the
// bounded window below.
const YIELD_SCALE: f64 = 0.12;
const COC_SCALE: f64 = 0.12;
const DSCR_FLOOR: f64 = 0.8;
const DSCR_CEIL: f64 = 2.0;
const SPREAD_FLOOR: f64 = -0.02;
const SPREAD_CEIL: f64 = 0.04;
const GROWTH_FLOOR: f64 = 0.85;
const GROWTH_CEIL: f64 = 1.25;
// Per-input contribution to the growth factor is clamped so one outlier
// series cannot dominate the score.
const GROWTH_INPUT_MIN: f64 = -0.05;
const GROWTH_INPUT_MAX: f64 = 0.10;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Multiplicative combination of whatever growth series the record carries,
/// bounded, neutral (1.0) when none are present.
pub fn growth_factor(property: &Property) -> f64 {
    let inputs = [
        property.population_growth,
        property.job_growth,
        property.income_growth,
        property.appreciation_trend,
    ];
    let mut factor = 1.0;
    for g in inputs.into_iter().flatten() {
        factor *= 1.0 + g.clamp(GROWTH_INPUT_MIN, GROWTH_INPUT_MAX);
    }
    factor.clamp(GROWTH_FLOOR, GROWTH_CEIL)
}

/// Monthly cash-flow series over the holding period: equity out at time
/// zero, net cash flow each month, terminal sale proceeds net of selling
/// costs and the remaining loan balance.
fn irr_series(
    price: f64,
    income: &IncomeModel,
    scenario: &FinancingScenario,
    assumptions: &RateAssumptions,
) -> Vec<f64> {
    let months = assumptions.holding_period_years * 12;
    let monthly_cf = income.monthly_cash_flow(scenario);

    let mut flows = Vec::with_capacity(months as usize + 1);
    flows.push(-scenario.down_payment);
    flows.extend(std::iter::repeat(monthly_cf).take(months as usize));

    let sale_price =
        price * (1.0 + assumptions.appreciation_rate).powi(assumptions.holding_period_years as i32);
    let net_proceeds =
        sale_price * (1.0 - assumptions.selling_cost_rate) - scenario.remaining_balance(months);
    if let Some(last) = flows.last_mut() {
        *last += net_proceeds;
    }
    flows
}

fn best_of(scenarios: &[ScenarioResult], pick: impl Fn(&ScenarioResult) -> Metric) -> Metric {
    scenarios
        .iter()
        .map(pick)
        .filter(Metric::is_defined)
        .reduce(|a, b| if a.cmp_na_last(&b).is_ge() { a } else { b })
        .unwrap_or(Metric::NotApplicable)
}

fn composite_score(
    rental_yield: Metric,
    best_coc: Metric,
    best_dscr: Metric,
    cap_rate_spread: Metric,
    risk_rating: RiskRating,
    growth: f64,
    scoring: &ScoringConfig,
) -> f64 {
    let w = &scoring.weights;
    // (normalized component, weight); undefined components drop out and the
    // remaining weights are renormalized so income-less properties still
    // score from risk and growth alone.
    let components = [
        (rental_yield.value().map(|v| clamp01(v / YIELD_SCALE)), w.rental_yield),
        (best_coc.value().map(|v| clamp01(v / COC_SCALE)), w.cash_on_cash),
        (
            best_dscr
                .value()
                .map(|v| clamp01((v - DSCR_FLOOR) / (DSCR_CEIL - DSCR_FLOOR))),
            w.dscr,
        ),
        (
            cap_rate_spread
                .value()
                .map(|v| clamp01((v - SPREAD_FLOOR) / (SPREAD_CEIL - SPREAD_FLOOR))),
            w.cap_rate_spread,
        ),
        (Some(risk_rating.inverse_score()), w.inverse_risk),
        (
            Some(clamp01((growth - GROWTH_FLOOR) / (GROWTH_CEIL - GROWTH_FLOOR))),
            w.growth,
        ),
    ];

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (value, weight) in components {
        if let Some(v) = value {
            weighted += v * weight;
            total_weight += weight;
        }
    }
    if total_weight == 0.0 {
        return 0.0;
    }
    (weighted / total_weight * 100.0).clamp(0.0, 100.0)
}

/// Underwrite a single property. Pure function of its inputs: identical
/// (property, assumptions, scoring) always produce an identical result.
pub fn evaluate(
    property: &Property,
    assumptions: &RateAssumptions,
    scoring: &ScoringConfig,
) -> Result<UnderwritingResult, ValidationError> {
    property.validate()?;

    let price = property.price;
    // A listed rent of zero carries no income signal; treat it like absent.
    let rent = property.monthly_rent.filter(|r| *r > 0.0);
    let financing = scenarios::generate(price, assumptions);

    let income = rent.map(|r| IncomeModel::new(price, r, assumptions));

    let annual_rent: Metric = rent.map(|r| r * 12.0).into();
    let rental_yield = match annual_rent {
        Metric::Value(ar) => Metric::ratio(ar, price),
        other => other,
    };
    let price_to_rent = match annual_rent {
        Metric::Value(ar) => Metric::ratio(price, ar),
        other => other,
    };
    let gross_rent_multiplier = price_to_rent;
    let annual_noi: Metric = income.map(|m| m.annual_noi()).into();
    let cap_rate = match annual_noi {
        Metric::Value(noi) => Metric::ratio(noi, price),
        other => other,
    };
    let cap_rate_spread = match cap_rate {
        Metric::Value(c) => Metric::Value(c - assumptions.risk_free_rate),
        other => other,
    };
    let operating_expense_ratio = income
        .map(|m| m.operating_expense_ratio())
        .unwrap_or(Metric::NotApplicable);
    let one_percent_rule_value = match rent {
        Some(r) => Metric::ratio(r, price),
        None => Metric::NotApplicable,
    };
    let one_percent_rule_passed = one_percent_rule_value.value().map(|v| v >= 0.01);

    let scenario_results: Vec<ScenarioResult> = financing
        .iter()
        .map(|scenario| match (&income, rent) {
            (Some(model), Some(r)) => ScenarioResult {
                scenario: *scenario,
                monthly_cash_flow: Metric::Value(model.monthly_cash_flow(scenario)),
                annual_cash_flow: Metric::Value(model.monthly_cash_flow(scenario) * 12.0),
                cash_on_cash: model.cash_on_cash(scenario),
                dscr: model.dscr(scenario),
                irr: irr::annualized_irr(&irr_series(price, model, scenario, assumptions)),
                break_even_ratio: model.break_even_ratio(scenario),
                stress: Some(stress::run(price, r, scenario, assumptions)),
            },
            // No income: every rent-dependent metric is not applicable, and
            // stressing a non-existent cash flow proves nothing.
            _ => ScenarioResult {
                scenario: *scenario,
                monthly_cash_flow: Metric::NotApplicable,
                annual_cash_flow: Metric::NotApplicable,
                cash_on_cash: Metric::NotApplicable,
                dscr: Metric::NotApplicable,
                irr: Metric::NotApplicable,
                break_even_ratio: Metric::NotApplicable,
                stress: None,
            },
        })
        .collect();

    let best_cash_on_cash = best_of(&scenario_results, |s| s.cash_on_cash);
    let best_irr = best_of(&scenario_results, |s| s.irr);
    let best_dscr = best_of(&scenario_results, |s| s.dscr);
    let stress_passed = scenario_results
        .iter()
        .filter_map(|s| s.stress.map(|st| st.passed_all))
        .reduce(|a, b| a && b);

    // Risk rating reads the most leveraged scenario: it is the one that
    // breaks first.
    let (break_even, baseline_dscr, worst_stressed_dscr) = scenario_results
        .first()
        .map(|s| {
            (
                s.break_even_ratio,
                s.dscr,
                s.stress.map(|st| st.worst_dscr()).unwrap_or(Metric::NotApplicable),
            )
        })
        .unwrap_or((Metric::NotApplicable, Metric::NotApplicable, Metric::NotApplicable));

    let risk_rating = risk::rate(
        break_even,
        baseline_dscr,
        worst_stressed_dscr,
        cap_rate_spread,
        &scoring.risk_bands,
    );
    let growth = growth_factor(property);

    let score = composite_score(
        rental_yield,
        best_cash_on_cash,
        best_dscr,
        cap_rate_spread,
        risk_rating,
        growth,
        scoring,
    );

    Ok(UnderwritingResult {
        listing_id: property.listing_id.clone(),
        rental_yield,
        price_to_rent,
        gross_rent_multiplier,
        cap_rate,
        cap_rate_spread,
        annual_noi,
        operating_expense_ratio,
        one_percent_rule_value,
        one_percent_rule_passed,
        scenarios: scenario_results,
        best_cash_on_cash,
        best_irr,
        stress_passed,
        growth_factor: growth,
        risk_rating,
        composite_score: score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_property;

    fn defaults() -> (RateAssumptions, ScoringConfig) {
        (RateAssumptions::default(), ScoringConfig::default())
    }

    #[test]
    fn test_worked_example_300k() {
        let (mut assumptions, scoring) = defaults();
        assumptions.interest_rate = 0.06;
        assumptions.loan_term_months = 360;
        let prop = test_property(300_000.0, Some(2_000.0));

        let result = evaluate(&prop, &assumptions, &scoring).unwrap();

        match result.rental_yield {
            Metric::Value(y) => assert!((y - 0.08).abs() < 1e-9, "yield {y}"),
            other => panic!("expected yield, got {other}"),
        }
        let twenty_down = &result.scenarios[0];
        assert!(twenty_down.cash_on_cash.is_defined());
        assert!(twenty_down.dscr.is_defined());
        assert!(twenty_down.stress.is_some());
        assert!((0.0..=100.0).contains(&result.composite_score));
    }

    #[test]
    fn test_no_rent_yields_not_applicable() {
        let (assumptions, scoring) = defaults();
        let prop = test_property(500_000.0, None);

        let result = evaluate(&prop, &assumptions, &scoring).unwrap();

        assert_eq!(result.rental_yield, Metric::NotApplicable);
        assert_eq!(result.cap_rate, Metric::NotApplicable);
        assert_eq!(result.gross_rent_multiplier, Metric::NotApplicable);
        for s in &result.scenarios {
            assert_eq!(s.dscr, Metric::NotApplicable);
            assert!(s.stress.is_none());
        }
        assert_eq!(result.stress_passed, None);
        // Still scored from risk and growth components.
        assert!((0.0..=100.0).contains(&result.composite_score));
        assert!(result.composite_score > 0.0);
    }

    #[test]
    fn test_zero_rent_treated_as_absent() {
        let (assumptions, scoring) = defaults();
        let prop = test_property(500_000.0, Some(0.0));
        let result = evaluate(&prop, &assumptions, &scoring).unwrap();
        assert_eq!(result.rental_yield, Metric::NotApplicable);
        assert_eq!(result.price_to_rent, Metric::NotApplicable);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let (assumptions, scoring) = defaults();
        let prop = test_property(300_000.0, Some(2_000.0));
        let a = evaluate(&prop, &assumptions, &scoring).unwrap();
        let b = evaluate(&prop, &assumptions, &scoring).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_property_rejected() {
        let (assumptions, scoring) = defaults();
        let mut prop = test_property(300_000.0, Some(2_000.0));
        prop.price = -1.0;
        assert!(evaluate(&prop, &assumptions, &scoring).is_err());
    }

    #[test]
    fn test_growth_factor_neutral_when_absent() {
        let prop = test_property(300_000.0, Some(2_000.0));
        assert_eq!(growth_factor(&prop), 1.0);
    }

    #[test]
    fn test_growth_factor_bounded() {
        let mut prop = test_property(300_000.0, Some(2_000.0));
        prop.population_growth = Some(0.50);
        prop.job_growth = Some(0.50);
        prop.income_growth = Some(0.50);
        prop.appreciation_trend = Some(0.50);
        assert!(growth_factor(&prop) <= GROWTH_CEIL);

        prop.population_growth = Some(-0.50);
        prop.job_growth = Some(-0.50);
        prop.income_growth = Some(-0.50);
        prop.appreciation_trend = Some(-0.50);
        assert!(growth_factor(&prop) >= GROWTH_FLOOR);
    }

    #[test]
    fn test_growth_lifts_score() {
        let (assumptions, scoring) = defaults();
        let flat = test_property(300_000.0, Some(2_000.0));
        let mut growing = flat.clone();
        growing.population_growth = Some(0.03);
        growing.job_growth = Some(0.04);

        let flat_score = evaluate(&flat, &assumptions, &scoring).unwrap().composite_score;
        let grow_score = evaluate(&growing, &assumptions, &scoring)
            .unwrap()
            .composite_score;
        assert!(grow_score > flat_score);
    }

    #[test]
    fn test_one_percent_rule() {
        let (assumptions, scoring) = defaults();
        let passing = test_property(190_000.0, Some(2_000.0));
        let failing = test_property(300_000.0, Some(2_000.0));
        assert_eq!(
            evaluate(&passing, &assumptions, &scoring)
                .unwrap()
                .one_percent_rule_passed,
            Some(true)
        );
        assert_eq!(
            evaluate(&failing, &assumptions, &scoring)
                .unwrap()
                .one_percent_rule_passed,
            Some(false)
        );
    }

    #[test]
    fn test_higher_rent_scores_higher() {
        let (assumptions, scoring) = defaults();
        let modest = test_property(300_000.0, Some(1_800.0));
        let strong = test_property(300_000.0, Some(3_200.0));
        let modest_score = evaluate(&modest, &assumptions, &scoring).unwrap().composite_score;
        let strong_score = evaluate(&strong, &assumptions, &scoring).unwrap().composite_score;
        assert!(strong_score > modest_score);
    }
}
