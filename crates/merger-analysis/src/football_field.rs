use comps_analysis::{compare, Multiple};
use dcf_engine::{build_sensitivity_grid, DcfAssumptions, SensitivityConfig};
use valuation_core::{FinancialsSnapshot, ValuationError};

use crate::models::{FootballField, FootballFieldBar};

/// Comps bars span the peer median multiple +/- this fraction.
const COMPS_BAND: f64 = 0.20;

/// Equity value ranges for the target under several methods, for a football
/// field chart. `offer_value` is the equity purchase price of the deal.
///
/// Methods lacking inputs are left out and noted in `warnings`; only a missing
/// share count fails the whole chart.
pub fn build_football_field(
    target: &FinancialsSnapshot,
    peers: &[FinancialsSnapshot],
    dcf: &DcfAssumptions,
    offer_value: f64,
) -> Result<FootballField, ValuationError> {
    let shares = match target.shares() {
        Some(s) if s > 0.0 => s,
        _ => {
            return Err(ValuationError::DivisionByZero(format!(
                "{}: shares outstanding is zero or unavailable",
                target.ticker
            )))
        }
    };

    let mut bars = Vec::new();
    let mut warnings = Vec::new();
    let mut bar = |method: &str, low: f64, high: f64| {
        bars.push(FootballFieldBar {
            method: method.to_string(),
            low: low.min(high),
            high: low.max(high),
        });
    };

    match (target.fifty_two_week_low, target.fifty_two_week_high) {
        (Some(low), Some(high)) => bar("52-Week Range", low * shares, high * shares),
        _ => warnings.push("52-week range unavailable".to_string()),
    }

    let net_debt = target.net_debt_bridge().net_debt();
    match compare(target, peers, &[Multiple::EvToEbitda, Multiple::PriceToEarnings]) {
        Ok(comps) => {
            let ebitda = target.latest_available(|y| y.ebitda).filter(|&e| e > 0.0);
            match (comps.median(Multiple::EvToEbitda), ebitda) {
                (Some(median), Some(ebitda)) => bar(
                    "EV/EBITDA Comps",
                    ebitda * median * (1.0 - COMPS_BAND) - net_debt,
                    ebitda * median * (1.0 + COMPS_BAND) - net_debt,
                ),
                _ => warnings.push("EV/EBITDA comps unavailable".to_string()),
            }

            let net_income = target.latest_available(|y| y.net_income).filter(|&n| n > 0.0);
            match (comps.median(Multiple::PriceToEarnings), net_income) {
                (Some(median), Some(ni)) => bar(
                    "P/E Comps",
                    ni * median * (1.0 - COMPS_BAND),
                    ni * median * (1.0 + COMPS_BAND),
                ),
                _ => warnings.push("P/E comps unavailable".to_string()),
            }
        }
        Err(e) => warnings.push(format!("comps unavailable: {}", e)),
    }

    match build_sensitivity_grid(target, dcf, &SensitivityConfig::default()) {
        Ok(grid) => match grid.price_range() {
            Some((low, high)) => bar("DCF Sensitivity", low * shares, high * shares),
            None => warnings.push("DCF sensitivity grid has no valid cells".to_string()),
        },
        Err(e) => warnings.push(format!("DCF unavailable: {}", e)),
    }

    for w in &warnings {
        tracing::debug!("Football field {}: {}", target.ticker, w);
    }

    Ok(FootballField {
        bars,
        offer_value,
        warnings,
    })
}
