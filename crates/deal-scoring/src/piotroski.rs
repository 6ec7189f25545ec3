use valuation_core::{AnnualFinancials, FinancialsSnapshot, ValuationError};

use crate::models::*;

fn outcome(test: Option<bool>) -> TestOutcome {
    match test {
        Some(true) => TestOutcome::Pass,
        Some(false) => TestOutcome::Fail,
        None => TestOutcome::Unavailable,
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

/// Operating cash flow, else free cash flow
fn cash_flow(year: &AnnualFinancials) -> Option<f64> {
    year.operating_cash_flow.or(year.free_cash_flow)
}

fn return_on_assets(y: &AnnualFinancials) -> Option<f64> {
    ratio(y.net_income, y.total_assets)
}

fn leverage(y: &AnnualFinancials) -> Option<f64> {
    ratio(y.long_term_debt, y.total_assets)
}

fn current_ratio(y: &AnnualFinancials) -> Option<f64> {
    ratio(y.current_assets, y.current_liabilities)
}

fn gross_margin(y: &AnnualFinancials) -> Option<f64> {
    ratio(y.gross_profit, y.revenue)
}

fn asset_turnover(y: &AnnualFinancials) -> Option<f64> {
    ratio(y.revenue, y.total_assets)
}

/// `Some(current > prior)` when both years carry the ratio.
fn improved(
    latest: &AnnualFinancials,
    prior: Option<&AnnualFinancials>,
    metric: fn(&AnnualFinancials) -> Option<f64>,
) -> Option<bool> {
    Some(metric(latest)? > metric(prior?)?)
}

fn run_check(check: PiotroskiCheck, latest: &AnnualFinancials, prior: Option<&AnnualFinancials>) -> Option<bool> {
    match check {
        PiotroskiCheck::PositiveNetIncome => latest.net_income.map(|ni| ni > 0.0),
        PiotroskiCheck::PositiveOperatingCashFlow => cash_flow(latest).map(|cf| cf > 0.0),
        PiotroskiCheck::ReturnOnAssetsImproving => improved(latest, prior, return_on_assets),
        PiotroskiCheck::CashFlowExceedsNetIncome => Some(cash_flow(latest)? > latest.net_income?),
        PiotroskiCheck::LeverageDecreasing => Some(leverage(latest)? < leverage(prior?)?),
        PiotroskiCheck::CurrentRatioImproving => improved(latest, prior, current_ratio),
        PiotroskiCheck::NoShareDilution => Some(latest.diluted_shares? <= prior?.diluted_shares?),
        PiotroskiCheck::GrossMarginImproving => improved(latest, prior, gross_margin),
        PiotroskiCheck::AssetTurnoverImproving => improved(latest, prior, asset_turnover),
    }
}

/// Piotroski-style F-score over the two most recent fiscal years.
///
/// Year-over-year tests are unavailable with a single year of history and
/// unavailable tests never count as passed.
pub fn piotroski_grade(
    snapshot: &FinancialsSnapshot,
    thresholds: &PiotroskiThresholds,
) -> Result<PiotroskiGrade, ValuationError> {
    snapshot.validate()?;
    let latest = snapshot.latest().ok_or_else(|| {
        ValuationError::InsufficientData(format!("{}: no annual history to grade", snapshot.ticker))
    })?;
    let prior = snapshot.previous();

    let tests: Vec<PiotroskiTest> = PiotroskiCheck::all()
        .into_iter()
        .map(|check| PiotroskiTest {
            check,
            outcome: outcome(run_check(check, latest, prior)),
        })
        .collect();

    let score = tests.iter().filter(|t| t.outcome == TestOutcome::Pass).count();
    let evaluated = tests.iter().filter(|t| t.outcome != TestOutcome::Unavailable).count();
    let grade = Grade::from_thresholds(
        score as f64,
        thresholds.a as f64,
        thresholds.b as f64,
        thresholds.c as f64,
    );

    tracing::debug!(
        "{}: Piotroski {}/9 ({} evaluated), grade {}",
        snapshot.ticker,
        score,
        evaluated,
        grade.as_str()
    );

    Ok(PiotroskiGrade {
        ticker: snapshot.ticker.clone(),
        score,
        evaluated,
        grade,
        tests,
    })
}
