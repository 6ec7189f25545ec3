use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::Normal;
use valuation_core::{stats, FinancialsSnapshot, ValuationError};

use crate::engine::{discount_cash_flows, prepare_inputs, ValuationInputs};
use crate::models::{DcfAssumptions, HistogramBin, MonteCarloConfig, MonteCarloSummary};

/// Run a Monte Carlo DCF simulation on its own, without the full projection.
///
/// Each draw perturbs every growth rate by a common normal shock and draws the
/// discount rate from a normal centred on the base WACC, then values the firm
/// with those rates. A fixed `seed` makes the summary reproducible.
pub fn run_monte_carlo(
    snapshot: &FinancialsSnapshot,
    assumptions: &DcfAssumptions,
    config: &MonteCarloConfig,
) -> Result<MonteCarloSummary, ValuationError> {
    let (inputs, _, _) = prepare_inputs(snapshot, assumptions)?;
    run_monte_carlo_with_inputs(&inputs, assumptions, config, snapshot.price)
}

fn normal(mean: f64, std_dev: f64, name: &str) -> Result<Option<Normal>, ValuationError> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(ValuationError::InvalidAssumptions(format!(
            "{} must be a non-negative finite number, got {}",
            name, std_dev
        )));
    }
    if std_dev == 0.0 {
        return Ok(None);
    }
    Normal::new(mean, std_dev)
        .map(Some)
        .map_err(|e| ValuationError::InvalidAssumptions(format!("{}: {}", name, e)))
}

pub(crate) fn run_monte_carlo_with_inputs(
    inputs: &ValuationInputs,
    assumptions: &DcfAssumptions,
    config: &MonteCarloConfig,
    current_price: Option<f64>,
) -> Result<MonteCarloSummary, ValuationError> {
    if config.iterations == 0 {
        return Err(ValuationError::InvalidAssumptions(
            "Monte Carlo needs at least one iteration".to_string(),
        ));
    }
    if config.histogram_bins == 0 {
        return Err(ValuationError::InvalidAssumptions(
            "Monte Carlo histogram needs at least one bin".to_string(),
        ));
    }

    let growth_shock = normal(0.0, config.growth_std_dev, "growth_std_dev")?;
    let discount_draw = normal(assumptions.discount_rate, config.discount_std_dev, "discount_std_dev")?;

    // Draw sequentially so the sample set depends only on the seed, then value in parallel.
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let samples: Vec<(f64, f64)> = (0..config.iterations)
        .map(|_| {
            let shock = growth_shock.as_ref().map_or(0.0, |d| d.sample(&mut rng));
            let rate = discount_draw
                .as_ref()
                .map_or(assumptions.discount_rate, |d| d.sample(&mut rng));
            (shock, rate)
        })
        .collect();

    let outcomes: Vec<Option<f64>> = samples
        .par_iter()
        .map(|&(shock, rate)| {
            let path = assumptions.revenue_growth.shifted(shock);
            discount_cash_flows(inputs, &path, rate, assumptions.terminal_growth)
                .ok()
                .map(|v| v.implied_share_price)
        })
        .collect();

    let prices: Vec<f64> = outcomes.iter().flatten().copied().collect();
    let rejected = config.iterations - prices.len();
    tracing::debug!(
        "Monte Carlo: {} iterations, {} valid, {} rejected",
        config.iterations,
        prices.len(),
        rejected
    );
    if prices.is_empty() {
        return Err(ValuationError::InsufficientData(
            "no Monte Carlo draw produced a valid valuation".to_string(),
        ));
    }

    let sorted = stats::sorted(&prices);
    let pct = |p: f64| stats::percentile_of_sorted(&sorted, p).unwrap_or(0.0);

    let probability_above_price = current_price.map(|price| {
        sorted.iter().filter(|&&v| v > price).count() as f64 / sorted.len() as f64 * 100.0
    });

    Ok(MonteCarloSummary {
        iterations: config.iterations,
        valid_samples: sorted.len(),
        rejected_samples: rejected,
        mean: stats::mean(&sorted).unwrap_or(0.0),
        std_dev: stats::std_dev(&sorted).unwrap_or(0.0),
        percentile_5: pct(5.0),
        percentile_25: pct(25.0),
        percentile_50: pct(50.0),
        percentile_75: pct(75.0),
        percentile_95: pct(95.0),
        probability_above_price,
        histogram: histogram(&sorted, config.histogram_bins),
    })
}

/// Equal-width bins over [min, max] of a sorted, non-empty sample.
fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => return Vec::new(),
    };
    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: sorted.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in sorted {
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + i as f64 * width,
            upper: min + (i + 1) as f64 * width,
            count,
        })
        .collect()
}
