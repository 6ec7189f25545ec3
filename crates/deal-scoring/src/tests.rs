use approx::assert_relative_eq;
use valuation_core::{AnnualFinancials, FinancialsSnapshot, ValuationError};

use crate::deal_score::deal_score;
use crate::models::*;
use crate::piotroski::piotroski_grade;

fn snapshot(pe: f64, debt: Option<f64>, prior_revenue: f64) -> FinancialsSnapshot {
    FinancialsSnapshot {
        ticker: "ACME".to_string(),
        currency: "USD".to_string(),
        price: Some(pe * 2.0),
        shares_outstanding: Some(100),
        trailing_eps: Some(2.0),
        total_debt: debt,
        total_equity: Some(1_000.0),
        history: vec![
            AnnualFinancials {
                fiscal_year: 2022,
                revenue: Some(prior_revenue),
                ..Default::default()
            },
            AnnualFinancials {
                fiscal_year: 2023,
                revenue: Some(1_000.0),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

#[test]
fn test_best_case_scores_one_hundred() {
    // P/E of 5, no debt, 40% growth
    let result = deal_score(&snapshot(5.0, Some(0.0), 1_000.0 / 1.4), &DealScoreConfig::default()).unwrap();
    assert_eq!(result.score, 100);
    assert_eq!(result.grade, Grade::A);
}

#[test]
fn test_worst_case_is_floored_at_one() {
    // P/E of 60, D/E of 5, revenue halved
    let result = deal_score(&snapshot(60.0, Some(5_000.0), 2_000.0), &DealScoreConfig::default()).unwrap();
    assert_eq!(result.score, 1);
    assert_eq!(result.grade, Grade::D);
}

#[test]
fn test_mid_range_weighting() {
    // P/E 22.5 -> 50, D/E 1.5 -> 50, growth 10% -> 50
    let result = deal_score(&snapshot(22.5, Some(1_500.0), 1_000.0 / 1.1), &DealScoreConfig::default()).unwrap();
    assert_eq!(result.score, 50);
    assert_eq!(result.grade, Grade::C);
    for c in &result.components {
        assert_relative_eq!(c.score.unwrap(), 50.0, epsilon = 1e-9);
    }
}

#[test]
fn test_missing_solvency_renormalises_weights() {
    let result = deal_score(&snapshot(5.0, None, 1_000.0 / 1.4), &DealScoreConfig::default()).unwrap();
    assert_eq!(result.score, 100);

    let solvency = result
        .components
        .iter()
        .find(|c| c.component == ScoreComponent::Solvency)
        .unwrap();
    assert!(solvency.score.is_none());
    assert_eq!(solvency.effective_weight, 0.0);

    let total: f64 = result.components.iter().map(|c| c.effective_weight).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    let valuation = &result.components[0];
    assert_relative_eq!(valuation.effective_weight, 0.4 / 0.7, epsilon = 1e-12);
}

#[test]
fn test_missing_input_is_not_scored_as_zero() {
    // Cheap and unlevered, growth unknown: must not be dragged down by a phantom zero
    let mut s = snapshot(5.0, Some(0.0), 1_000.0);
    s.history.remove(0);
    let result = deal_score(&s, &DealScoreConfig::default()).unwrap();
    assert_eq!(result.score, 100);
}

#[test]
fn test_negative_equity_scores_zero_solvency() {
    let mut insolvent = snapshot(5.0, Some(5_000.0), 1_000.0 / 1.4);
    insolvent.total_equity = Some(-100.0);
    let mut solvent = insolvent.clone();
    solvent.total_equity = Some(5_000.0);

    let bad = deal_score(&insolvent, &DealScoreConfig::default()).unwrap();
    let good = deal_score(&solvent, &DealScoreConfig::default()).unwrap();

    // 0.4 x 100 + 0.3 x 0 + 0.3 x 100
    assert_eq!(bad.score, 70);
    assert_eq!(good.score, 90);
    assert!(bad.score < good.score);

    let solvency = bad
        .components
        .iter()
        .find(|c| c.component == ScoreComponent::Solvency)
        .unwrap();
    assert!(solvency.distressed);
    assert_eq!(solvency.score, Some(0.0));
    assert_relative_eq!(solvency.input.unwrap(), -50.0);
    assert_relative_eq!(solvency.effective_weight, 0.3, epsilon = 1e-12);
}

#[test]
fn test_loss_making_company_scores_zero_valuation() {
    let mut s = snapshot(5.0, Some(0.0), 1_000.0 / 1.4);
    s.trailing_eps = Some(-1.0);
    let result = deal_score(&s, &DealScoreConfig::default()).unwrap();

    // 0.4 x 0 + 0.3 x 100 + 0.3 x 100
    assert_eq!(result.score, 60);
    let valuation = &result.components[0];
    assert!(valuation.distressed);
    assert_relative_eq!(valuation.input.unwrap(), -10.0);
    assert_relative_eq!(valuation.effective_weight, 0.4, epsilon = 1e-12);

    s.trailing_eps = Some(0.0);
    let breakeven = deal_score(&s, &DealScoreConfig::default()).unwrap();
    assert_eq!(breakeven.score, 60);
    assert!(breakeven.components[0].input.is_none());
    assert!(breakeven.components[0].distressed);
}

#[test]
fn test_nothing_to_score_is_insufficient_data() {
    let mut s = snapshot(5.0, None, 1_000.0);
    s.trailing_eps = None;
    s.history.remove(0);
    assert!(matches!(
        deal_score(&s, &DealScoreConfig::default()),
        Err(ValuationError::InsufficientData(_))
    ));
}

#[test]
fn test_weights_must_sum_to_one() {
    let config = DealScoreConfig {
        valuation_weight: 0.5,
        ..Default::default()
    };
    assert!(matches!(
        deal_score(&snapshot(10.0, Some(0.0), 900.0), &config),
        Err(ValuationError::InvalidAssumptions(_))
    ));
}

#[test]
fn test_grade_thresholds() {
    assert_eq!(Grade::from_thresholds(80.0, 80.0, 60.0, 40.0), Grade::A);
    assert_eq!(Grade::from_thresholds(79.0, 80.0, 60.0, 40.0), Grade::B);
    assert_eq!(Grade::from_thresholds(40.0, 80.0, 60.0, 40.0), Grade::C);
    assert_eq!(Grade::from_thresholds(39.9, 80.0, 60.0, 40.0), Grade::D);
}

/// Helper: two years where every Piotroski test passes.
fn healthy_history() -> Vec<AnnualFinancials> {
    vec![
        AnnualFinancials {
            fiscal_year: 2022,
            revenue: Some(900.0),
            gross_profit: Some(360.0),
            net_income: Some(80.0),
            operating_cash_flow: Some(100.0),
            total_assets: Some(1_000.0),
            long_term_debt: Some(300.0),
            current_assets: Some(400.0),
            current_liabilities: Some(300.0),
            diluted_shares: Some(100.0),
            ..Default::default()
        },
        AnnualFinancials {
            fiscal_year: 2023,
            revenue: Some(1_100.0),
            gross_profit: Some(480.0),
            net_income: Some(110.0),
            operating_cash_flow: Some(150.0),
            total_assets: Some(1_050.0),
            long_term_debt: Some(250.0),
            current_assets: Some(450.0),
            current_liabilities: Some(300.0),
            diluted_shares: Some(98.0),
            ..Default::default()
        },
    ]
}

#[test]
fn test_piotroski_all_pass() {
    let mut s = FinancialsSnapshot::new("ACME", "USD");
    s.history = healthy_history();
    let grade = piotroski_grade(&s, &PiotroskiThresholds::default()).unwrap();
    assert_eq!(grade.score, 9);
    assert_eq!(grade.evaluated, 9);
    assert_eq!(grade.grade, Grade::A);
}

#[test]
fn test_piotroski_failures_lower_the_grade() {
    let mut s = FinancialsSnapshot::new("ACME", "USD");
    s.history = healthy_history();
    let latest = &mut s.history[1];
    latest.diluted_shares = Some(120.0);
    latest.long_term_debt = Some(500.0);
    latest.gross_profit = Some(300.0);
    latest.operating_cash_flow = Some(90.0);

    let grade = piotroski_grade(&s, &PiotroskiThresholds::default()).unwrap();
    assert_eq!(grade.outcome(PiotroskiCheck::NoShareDilution), TestOutcome::Fail);
    assert_eq!(grade.outcome(PiotroskiCheck::LeverageDecreasing), TestOutcome::Fail);
    assert_eq!(grade.outcome(PiotroskiCheck::GrossMarginImproving), TestOutcome::Fail);
    assert_eq!(grade.outcome(PiotroskiCheck::CashFlowExceedsNetIncome), TestOutcome::Fail);
    assert_eq!(grade.score, 5);
    assert_eq!(grade.grade, Grade::B);
}

#[test]
fn test_single_year_leaves_trend_tests_unavailable() {
    let mut s = FinancialsSnapshot::new("ACME", "USD");
    s.history = vec![healthy_history().remove(1)];
    let grade = piotroski_grade(&s, &PiotroskiThresholds::default()).unwrap();

    assert_eq!(grade.evaluated, 3);
    assert_eq!(grade.score, 3);
    assert_eq!(grade.grade, Grade::C);
    assert_eq!(grade.outcome(PiotroskiCheck::CurrentRatioImproving), TestOutcome::Unavailable);
}

#[test]
fn test_piotroski_needs_history() {
    let s = FinancialsSnapshot::new("ACME", "USD");
    assert!(matches!(
        piotroski_grade(&s, &PiotroskiThresholds::default()),
        Err(ValuationError::InsufficientData(_))
    ));
}
