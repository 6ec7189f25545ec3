use valuation_core::FinancialsSnapshot;

use crate::models::{DealStructure, SynergyEstimate};

/// Share of revenue used as the cost base when SG&A is not reported
const SGA_FALLBACK_SHARE_OF_REVENUE: f64 = 0.05;

/// Size run-rate synergies as a percentage of the target's SG&A (cost) and
/// revenue. Percentages are fractions (0.10 = 10%).
pub fn estimate_synergies(target: &FinancialsSnapshot, cost_pct: f64, revenue_pct: f64) -> SynergyEstimate {
    let revenue = target.latest_available(|y| y.revenue).unwrap_or(0.0);
    let mut warnings = Vec::new();

    let (cost_basis, basis_is_fallback) = match target.latest_available(|y| y.sga_expense) {
        Some(sga) if sga != 0.0 => (sga.abs(), false),
        _ => {
            let basis = revenue * SGA_FALLBACK_SHARE_OF_REVENUE;
            if basis > 0.0 {
                warnings.push(format!(
                    "SG&A not available for {}; using 5% of revenue as synergy basis",
                    target.ticker
                ));
            }
            (basis, true)
        }
    };

    SynergyEstimate {
        cost_synergies: cost_basis * cost_pct,
        revenue_synergies: revenue * revenue_pct,
        cost_basis,
        basis_is_fallback,
        warnings,
    }
}

/// Cumulative share of run-rate realized in 0-based period `period`.
pub fn realization_fraction(schedule: &[f64], period: usize) -> f64 {
    if schedule.is_empty() {
        return 1.0;
    }
    let end = (period + 1).min(schedule.len());
    schedule[..end].iter().sum::<f64>().min(1.0)
}

/// Present value of after-tax synergies: each schedule year discounted at the
/// synergy rate, then the last realized level held as a flat perpetuity.
pub fn synergy_npv(structure: &DealStructure) -> f64 {
    let run_rate = structure.total_synergies() * (1.0 - structure.tax_rate);
    let r = structure.synergy_discount_rate;
    if run_rate == 0.0 || r <= 0.0 {
        return 0.0;
    }

    let schedule = &structure.realization_schedule;
    if schedule.is_empty() {
        return run_rate / r;
    }

    let mut pv = 0.0;
    let mut last_level = 0.0;
    for idx in 0..schedule.len() {
        let t = (idx + 1) as i32;
        last_level = run_rate * realization_fraction(schedule, idx);
        pv += last_level / (1.0 + r).powi(t);
    }
    let horizon = schedule.len() as i32;
    pv + (last_level / r) / (1.0 + r).powi(horizon)
}
