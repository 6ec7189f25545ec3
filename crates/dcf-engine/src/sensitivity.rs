use valuation_core::{FinancialsSnapshot, ValuationError};

use crate::engine::{discount_cash_flows, prepare_inputs, ValuationInputs};
use crate::models::{DcfAssumptions, SensitivityConfig, SensitivityGrid};

fn offsets(steps_per_side: usize, step: f64) -> Vec<f64> {
    let k = steps_per_side as i64;
    (-k..=k).map(|i| i as f64 * step).collect()
}

/// Re-run the valuation over a square grid of growth and discount offsets.
///
/// Rows are growth ascending, columns discount ascending. The centre cell uses
/// the unshifted assumptions and therefore matches the headline price.
pub fn build_sensitivity_grid(
    snapshot: &FinancialsSnapshot,
    assumptions: &DcfAssumptions,
    config: &SensitivityConfig,
) -> Result<SensitivityGrid, ValuationError> {
    let (inputs, _, _) = prepare_inputs(snapshot, assumptions)?;
    grid_for_inputs(&inputs, assumptions, config)
}

pub(crate) fn grid_for_inputs(
    inputs: &ValuationInputs,
    assumptions: &DcfAssumptions,
    config: &SensitivityConfig,
) -> Result<SensitivityGrid, ValuationError> {
    if !(config.growth_step.is_finite() && config.growth_step > 0.0)
        || !(config.discount_step.is_finite() && config.discount_step > 0.0)
    {
        return Err(ValuationError::InvalidAssumptions(
            "sensitivity steps must be positive".to_string(),
        ));
    }

    let growth_offsets = offsets(config.steps_per_side, config.growth_step);
    let discount_offsets = offsets(config.steps_per_side, config.discount_step);

    let growth_rates: Vec<f64> = growth_offsets
        .iter()
        .map(|&dg| assumptions.revenue_growth.shifted(dg).first_rate())
        .collect();
    let discount_rates: Vec<f64> = discount_offsets
        .iter()
        .map(|&dr| assumptions.discount_rate + dr)
        .collect();

    let implied_prices = growth_offsets
        .iter()
        .map(|&dg| {
            let path = assumptions.revenue_growth.shifted(dg);
            discount_rates
                .iter()
                .map(|&rate| {
                    discount_cash_flows(inputs, &path, rate, assumptions.terminal_growth)
                        .ok()
                        .map(|v| v.implied_share_price)
                })
                .collect()
        })
        .collect();

    Ok(SensitivityGrid {
        growth_rates,
        discount_rates,
        implied_prices,
    })
}
