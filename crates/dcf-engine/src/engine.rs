use valuation_core::{FinancialsSnapshot, ValuationError};

use crate::models::*;
use crate::monte_carlo::run_monte_carlo_with_inputs;
use crate::sensitivity::grid_for_inputs;

/// Figures that stay fixed while rates move (grid cells, Monte Carlo draws).
#[derive(Debug, Clone)]
pub(crate) struct ValuationInputs {
    pub base_fcf: f64,
    pub horizon_years: u32,
    pub total_debt: f64,
    pub cash: f64,
    pub shares: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Valuation {
    pub projections: Vec<ProjectedYear>,
    pub sum_pv_fcf: f64,
    pub terminal_value: f64,
    pub terminal_value_pv: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
    pub implied_share_price: f64,
}

/// Project, discount and bridge to a per-share value.
///
/// Rates are checked here as well as in `DcfAssumptions::validate` because the
/// sensitivity grid and Monte Carlo call this with shifted rates.
pub(crate) fn discount_cash_flows(
    inputs: &ValuationInputs,
    growth: &GrowthPath,
    discount_rate: f64,
    terminal_growth: f64,
) -> Result<Valuation, ValuationError> {
    if terminal_growth >= discount_rate {
        return Err(ValuationError::InvalidAssumptions(format!(
            "terminal growth ({:.4}) must be strictly below the discount rate ({:.4})",
            terminal_growth, discount_rate
        )));
    }
    if discount_rate <= -1.0 {
        return Err(ValuationError::InvalidAssumptions(format!(
            "discount rate {:.4} must exceed -100%",
            discount_rate
        )));
    }
    if inputs.shares <= 0.0 {
        return Err(ValuationError::DivisionByZero("shares outstanding is zero".to_string()));
    }

    let mut projections = Vec::with_capacity(inputs.horizon_years as usize);
    let mut fcf = inputs.base_fcf;
    for year in 1..=inputs.horizon_years {
        let growth_rate = growth.rate_for_year(year);
        if growth_rate <= -1.0 {
            return Err(ValuationError::InvalidAssumptions(format!(
                "growth rate {:.4} in year {} must exceed -100%",
                growth_rate, year
            )));
        }
        fcf *= 1.0 + growth_rate;
        let discount_factor = 1.0 / (1.0 + discount_rate).powi(year as i32);
        projections.push(ProjectedYear {
            year,
            growth_rate,
            free_cash_flow: fcf,
            discount_factor,
            present_value: fcf * discount_factor,
        });
    }

    let sum_pv_fcf: f64 = projections.iter().map(|p| p.present_value).sum();
    let final_fcf = projections.last().map(|p| p.free_cash_flow).unwrap_or(inputs.base_fcf);
    let final_factor = projections.last().map(|p| p.discount_factor).unwrap_or(1.0);

    // Gordon Growth on the final projected year
    let terminal_value = final_fcf * (1.0 + terminal_growth) / (discount_rate - terminal_growth);
    let terminal_value_pv = terminal_value * final_factor;

    let enterprise_value = sum_pv_fcf + terminal_value_pv;
    let equity_value = enterprise_value - inputs.total_debt + inputs.cash;
    let implied_share_price = equity_value / inputs.shares;

    if !implied_share_price.is_finite() {
        return Err(ValuationError::InvalidAssumptions(
            "valuation produced a non-finite share price".to_string(),
        ));
    }

    Ok(Valuation {
        projections,
        sum_pv_fcf,
        terminal_value,
        terminal_value_pv,
        enterprise_value,
        equity_value,
        implied_share_price,
    })
}

/// Pick the base-year FCF: the most recent reported figure, else
/// EBITDA x (1 - tax) - capex.
pub(crate) fn base_free_cash_flow(
    snapshot: &FinancialsSnapshot,
    assumptions: &DcfAssumptions,
) -> Result<(f64, FcfSource), ValuationError> {
    let reported = snapshot
        .history
        .iter()
        .rev()
        .find_map(|y| y.free_cash_flow.map(|fcf| (y.fiscal_year, fcf)));
    if let Some((fiscal_year, fcf)) = reported {
        return Ok((fcf, FcfSource::Reported { fiscal_year }));
    }

    // Every derivation input comes from one fiscal year.
    let year = snapshot
        .history
        .iter()
        .rev()
        .find(|y| y.ebitda.is_some() || (y.revenue.is_some() && assumptions.ebitda_margin.is_some()))
        .ok_or_else(|| {
            ValuationError::InsufficientData(format!(
                "{}: no reported FCF, EBITDA, or revenue with an EBITDA margin assumption",
                snapshot.ticker
            ))
        })?;

    let ebitda = match (year.ebitda, year.revenue, assumptions.ebitda_margin) {
        (Some(ebitda), _, _) => ebitda,
        (None, Some(revenue), Some(margin)) => revenue * margin,
        _ => {
            return Err(ValuationError::InsufficientData(format!(
                "{}: FY{} has neither EBITDA nor revenue with a margin assumption",
                snapshot.ticker, year.fiscal_year
            )))
        }
    };

    let capex = match (year.capital_expenditure, year.revenue) {
        (Some(capex), _) => capex.abs(),
        (None, Some(revenue)) => revenue * assumptions.capex_to_revenue,
        (None, None) => {
            return Err(ValuationError::InsufficientData(format!(
                "{}: cannot approximate FY{} capex without revenue",
                snapshot.ticker, year.fiscal_year
            )))
        }
    };

    let fcf = ebitda * (1.0 - assumptions.tax_rate) - capex;
    Ok((
        fcf,
        FcfSource::Derived {
            fiscal_year: year.fiscal_year,
            ebitda,
            capex,
        },
    ))
}

pub(crate) fn prepare_inputs(
    snapshot: &FinancialsSnapshot,
    assumptions: &DcfAssumptions,
) -> Result<(ValuationInputs, FcfSource, Vec<String>), ValuationError> {
    snapshot.validate()?;
    assumptions.validate()?;

    let shares = match snapshot.shares() {
        Some(s) if s > 0.0 => s,
        _ => {
            return Err(ValuationError::DivisionByZero(format!(
                "{}: shares outstanding is zero or unavailable",
                snapshot.ticker
            )))
        }
    };

    let (base_fcf, source) = base_free_cash_flow(snapshot, assumptions)?;
    let bridge = snapshot.net_debt_bridge();

    let mut warnings = bridge.warnings(&snapshot.ticker);
    if let FcfSource::Derived { fiscal_year, .. } = &source {
        warnings.push(format!(
            "{}: FCF not reported; derived from EBITDA and capex for FY{}",
            snapshot.ticker, fiscal_year
        ));
    }

    Ok((
        ValuationInputs {
            base_fcf,
            horizon_years: assumptions.horizon_years,
            total_debt: bridge.total_debt,
            cash: bridge.cash,
            shares,
        },
        source,
        warnings,
    ))
}

#[derive(Debug, Clone, Default)]
pub struct DcfEngine {
    sensitivity: SensitivityConfig,
    monte_carlo: Option<MonteCarloConfig>,
}

impl DcfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensitivity(mut self, config: SensitivityConfig) -> Self {
        self.sensitivity = config;
        self
    }

    /// Run a Monte Carlo simulation as part of every projection
    pub fn with_monte_carlo(mut self, config: MonteCarloConfig) -> Self {
        self.monte_carlo = Some(config);
        self
    }

    pub fn project(
        &self,
        snapshot: &FinancialsSnapshot,
        assumptions: &DcfAssumptions,
    ) -> Result<DcfResult, ValuationError> {
        let (inputs, fcf_source, warnings) = prepare_inputs(snapshot, assumptions)?;
        for w in &warnings {
            tracing::warn!("{}", w);
        }
        tracing::debug!(
            "DCF {}: base FCF {:.2} ({:?}), WACC {:.4}, terminal growth {:.4}",
            snapshot.ticker,
            inputs.base_fcf,
            fcf_source,
            assumptions.discount_rate,
            assumptions.terminal_growth
        );

        let valuation = discount_cash_flows(
            &inputs,
            &assumptions.revenue_growth,
            assumptions.discount_rate,
            assumptions.terminal_growth,
        )?;

        let sensitivity = grid_for_inputs(&inputs, assumptions, &self.sensitivity)?;

        let monte_carlo = match &self.monte_carlo {
            Some(config) => Some(run_monte_carlo_with_inputs(
                &inputs,
                assumptions,
                config,
                snapshot.price,
            )?),
            None => None,
        };

        let upside_pct = snapshot
            .price
            .map(|price| (valuation.implied_share_price / price - 1.0) * 100.0);
        let terminal_value_share_pct = if valuation.enterprise_value.abs() > f64::EPSILON {
            Some(valuation.terminal_value_pv / valuation.enterprise_value * 100.0)
        } else {
            None
        };

        Ok(DcfResult {
            ticker: snapshot.ticker.clone(),
            base_fcf: inputs.base_fcf,
            fcf_source,
            projections: valuation.projections,
            sum_pv_fcf: valuation.sum_pv_fcf,
            terminal_value: valuation.terminal_value,
            terminal_value_pv: valuation.terminal_value_pv,
            enterprise_value: valuation.enterprise_value,
            total_debt: inputs.total_debt,
            cash: inputs.cash,
            equity_value: valuation.equity_value,
            implied_share_price: valuation.implied_share_price,
            current_price: snapshot.price,
            upside_pct,
            terminal_value_share_pct,
            sensitivity,
            monte_carlo,
            warnings,
        })
    }
}

/// Project with the default 5x5 sensitivity grid and no Monte Carlo.
pub fn project(
    snapshot: &FinancialsSnapshot,
    assumptions: &DcfAssumptions,
) -> Result<DcfResult, ValuationError> {
    DcfEngine::new().project(snapshot, assumptions)
}
