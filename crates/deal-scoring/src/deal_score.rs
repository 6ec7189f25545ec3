use valuation_core::{stats, FinancialsSnapshot, ValuationError};

use crate::models::*;

/// What a snapshot says about one sub-score's ratio.
enum Reading {
    Missing,
    Ratio(f64),
    /// Denominator at or below zero; carries the raw ratio when it is defined
    Distressed(Option<f64>),
}

fn read_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Reading {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Reading::Ratio(n / d),
        (Some(n), Some(d)) => Reading::Distressed((d < 0.0).then(|| n / d)),
        _ => Reading::Missing,
    }
}

fn price_to_earnings(snapshot: &FinancialsSnapshot) -> Reading {
    read_ratio(snapshot.price, snapshot.eps())
}

fn debt_to_equity(snapshot: &FinancialsSnapshot) -> Reading {
    read_ratio(snapshot.total_debt, snapshot.total_equity)
}

/// Raw input, 0-100 score and distressed flag for one reading.
fn score_reading(reading: Reading, map: impl Fn(f64) -> Option<f64>) -> (Option<f64>, Option<f64>, bool) {
    match reading {
        Reading::Missing => (None, None, false),
        Reading::Ratio(v) => (Some(v), map(v), false),
        Reading::Distressed(raw) => (raw, Some(0.0), true),
    }
}

/// Weighted 1-100 score from valuation, solvency and growth sub-scores.
///
/// Sub-scores whose inputs are unavailable drop out and the remaining weights
/// are rescaled to sum to one. Reported but non-positive earnings or equity
/// score 0 and stay in the weighting. Fails only when none of the three is
/// available.
pub fn deal_score(snapshot: &FinancialsSnapshot, config: &DealScoreConfig) -> Result<DealScore, ValuationError> {
    snapshot.validate()?;
    config.validate()?;

    let growth = snapshot.revenue_growth();

    // Lower P/E and leverage are better, so those two are inverted.
    let inverse = |v: f64, low: f64, high: f64| stats::normalize_clamped(v, low, high).map(|n| (1.0 - n) * 100.0);
    let direct = |v: f64, low: f64, high: f64| stats::normalize_clamped(v, low, high).map(|n| n * 100.0);

    let (pe, pe_score, pe_distressed) =
        score_reading(price_to_earnings(snapshot), |v| inverse(v, config.pe_min, config.pe_max));
    let (de, de_score, de_distressed) =
        score_reading(debt_to_equity(snapshot), |v| inverse(v, config.de_min, config.de_max));

    let raw = [
        (ScoreComponent::Valuation, pe, pe_score, pe_distressed, config.valuation_weight),
        (ScoreComponent::Solvency, de, de_score, de_distressed, config.solvency_weight),
        (
            ScoreComponent::Growth,
            growth,
            growth.and_then(|v| direct(v, config.growth_min, config.growth_max)),
            false,
            config.growth_weight,
        ),
    ];

    let available_weight: f64 = raw.iter().filter(|r| r.2.is_some()).map(|r| r.4).sum();
    if raw.iter().all(|r| r.2.is_none()) {
        return Err(ValuationError::InsufficientData(format!(
            "{}: no P/E, debt/equity or revenue growth to score",
            snapshot.ticker
        )));
    }

    let components: Vec<SubScore> = raw
        .iter()
        .map(|&(component, input, score, distressed, weight)| SubScore {
            component,
            input,
            score,
            distressed,
            configured_weight: weight,
            effective_weight: match score {
                Some(_) if available_weight > 0.0 => weight / available_weight,
                _ => 0.0,
            },
        })
        .collect();

    let weighted: f64 = if available_weight > 0.0 {
        components
            .iter()
            .filter_map(|c| c.score.map(|s| s * c.effective_weight))
            .sum()
    } else {
        // Every available component carries zero weight; fall back to a plain average.
        let scores: Vec<f64> = components.iter().filter_map(|c| c.score).collect();
        stats::mean(&scores).unwrap_or(0.0)
    };

    let score = weighted.round().clamp(1.0, 100.0) as u8;
    let grade = Grade::from_thresholds(score as f64, config.grade_a, config.grade_b, config.grade_c);

    for c in &components {
        if c.distressed {
            tracing::warn!(
                "{}: {:?} ratio not meaningful (non-positive denominator), scored as 0",
                snapshot.ticker,
                c.component
            );
        } else if c.score.is_none() {
            tracing::debug!("{}: {:?} sub-score unavailable, weight renormalised", snapshot.ticker, c.component);
        }
    }

    Ok(DealScore {
        ticker: snapshot.ticker.clone(),
        score,
        grade,
        components,
    })
}
