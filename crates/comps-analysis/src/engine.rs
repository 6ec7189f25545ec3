use std::collections::BTreeMap;

use valuation_core::{stats, FinancialsSnapshot, ValuationError};

use crate::models::*;
use crate::multiples::{build_row, compute_multiple, valuation_base};

#[derive(Debug, Clone, Default)]
pub struct CompsEngine {
    options: CompsOptions,
}

impl CompsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: CompsOptions) -> Self {
        self.options = options;
        self
    }

    /// Compare `target` against `peers` on the requested multiples.
    ///
    /// An empty `multiples` list means every supported multiple. Peers that
    /// share the target's ticker or fail validation are dropped with a warning;
    /// if nothing is left the call fails with `EmptyPeerSet`.
    pub fn compare(
        &self,
        target: &FinancialsSnapshot,
        peers: &[FinancialsSnapshot],
        multiples: &[Multiple],
    ) -> Result<CompsResult, ValuationError> {
        target.validate()?;
        if peers.is_empty() {
            return Err(ValuationError::EmptyPeerSet(format!(
                "no peers supplied for {}",
                target.ticker
            )));
        }

        let mut warnings = Vec::new();
        let mut peer_set: Vec<&FinancialsSnapshot> = Vec::with_capacity(peers.len());
        for peer in peers {
            if peer.ticker.eq_ignore_ascii_case(&target.ticker) {
                warnings.push(format!("{} removed from its own peer list", target.ticker));
                continue;
            }
            if let Err(e) = peer.validate() {
                warnings.push(format!("peer {} excluded: {}", peer.ticker, e));
                continue;
            }
            if peer.currency != target.currency {
                warnings.push(format!(
                    "peer {} reports in {} while {} reports in {}",
                    peer.ticker, peer.currency, target.ticker, target.currency
                ));
            }
            peer_set.push(peer);
        }
        if peer_set.is_empty() {
            return Err(ValuationError::EmptyPeerSet(format!(
                "no usable peers left for {}",
                target.ticker
            )));
        }

        let mut requested: Vec<Multiple> = if multiples.is_empty() {
            Multiple::all()
        } else {
            multiples.to_vec()
        };
        requested.sort();
        requested.dedup();

        tracing::debug!(
            "Comps {}: {} peers, multiples {:?}",
            target.ticker,
            peer_set.len(),
            requested
        );

        let target_row = build_row(target);
        let peer_rows: Vec<CompsRow> = peer_set.iter().map(|p| build_row(p)).collect();

        let mut statistics = BTreeMap::new();
        let mut percentile_ranks = BTreeMap::new();
        let mut implied = Vec::new();

        for &multiple in &requested {
            let values: Vec<f64> = peer_rows.iter().filter_map(|r| r.multiple(multiple)).collect();
            let stats_for = peer_statistics(multiple, &values);
            if stats_for.median.is_none() {
                warnings.push(format!(
                    "{} unavailable: only {} peer(s) with a meaningful value",
                    multiple.label(),
                    values.len()
                ));
            }

            let target_value = compute_multiple(target, multiple);
            percentile_ranks.insert(
                multiple,
                PercentileRank {
                    multiple,
                    target_value,
                    rank: percentile_rank(target_value, &values),
                },
            );

            if let Some(median) = stats_for.median {
                if let Some(valuation) = implied_valuation(target, multiple, median) {
                    implied.push(valuation);
                }
            }
            statistics.insert(multiple, stats_for);
        }

        if implied.iter().any(|v| v.multiple.is_enterprise()) {
            let bridge = target.net_debt_bridge();
            for w in bridge.warnings(&target.ticker) {
                warnings.push(w);
            }
        }

        let prices: Vec<f64> = implied.iter().filter_map(|v| v.implied_share_price).collect();
        let implied_price_range = implied_range(&prices);

        let rule_of_40 = if self.options.saas {
            let score = rule_of_40(target, self.options.rule_of_40_basis);
            if score.is_none() {
                warnings.push(format!(
                    "{}: Rule of 40 needs revenue growth and a margin",
                    target.ticker
                ));
            }
            score
        } else {
            None
        };

        let peer_summary = OperatingMetric::all()
            .into_iter()
            .map(|metric| {
                let values: Vec<f64> = peer_rows.iter().filter_map(|r| r.metric(metric)).collect();
                (metric, metric_summary(metric, &values))
            })
            .collect();

        for w in &warnings {
            tracing::warn!("{}", w);
        }

        Ok(CompsResult {
            target: target_row,
            peers: peer_rows,
            multiples: requested,
            statistics,
            percentile_ranks,
            implied,
            implied_price_range,
            rule_of_40,
            peer_summary,
            warnings,
        })
    }
}

/// Compare with default options (no Rule of 40).
pub fn compare(
    target: &FinancialsSnapshot,
    peers: &[FinancialsSnapshot],
    multiples: &[Multiple],
) -> Result<CompsResult, ValuationError> {
    CompsEngine::new().compare(target, peers, multiples)
}

pub(crate) fn peer_statistics(multiple: Multiple, values: &[f64]) -> PeerStatistics {
    if values.len() < 2 {
        return PeerStatistics {
            multiple,
            count: values.len(),
            median: None,
            mean: None,
            min: None,
            max: None,
        };
    }
    let sorted = stats::sorted(values);
    PeerStatistics {
        multiple,
        count: values.len(),
        median: stats::median(&sorted),
        mean: stats::mean(&sorted),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
    }
}

/// Unlike multiple statistics, a single reporting peer is enough for a
/// summary row.
pub(crate) fn metric_summary(metric: OperatingMetric, values: &[f64]) -> MetricSummary {
    let sorted = stats::sorted(values);
    MetricSummary {
        metric,
        count: values.len(),
        median: stats::median(&sorted),
        mean: stats::mean(&sorted),
    }
}

/// Inclusive rank of the target among peers plus the target itself.
pub(crate) fn percentile_rank(target_value: Option<f64>, peer_values: &[f64]) -> Option<f64> {
    let value = target_value?;
    if peer_values.is_empty() {
        return None;
    }
    let mut population = peer_values.to_vec();
    population.push(value);
    stats::inclusive_percentile_rank(value, &population)
}

fn implied_valuation(
    target: &FinancialsSnapshot,
    multiple: Multiple,
    peer_median: f64,
) -> Option<ImpliedValuation> {
    let base = valuation_base(target, multiple)?;
    if base <= 0.0 {
        return None;
    }
    let shares = target.shares().filter(|&s| s > 0.0);
    let implied = peer_median * base;

    let (enterprise, equity, price) = if multiple.is_enterprise() {
        let equity = implied - target.net_debt_bridge().net_debt();
        (Some(implied), Some(equity), shares.map(|s| equity / s))
    } else if multiple.is_per_share() {
        (None, shares.map(|s| implied * s), Some(implied))
    } else {
        (None, Some(implied), shares.map(|s| implied / s))
    };

    Some(ImpliedValuation {
        multiple,
        peer_median,
        target_base: base,
        implied_enterprise_value: enterprise,
        implied_equity_value: equity,
        implied_share_price: price,
    })
}

fn implied_range(prices: &[f64]) -> Option<ImpliedRange> {
    let sorted = stats::sorted(prices);
    Some(ImpliedRange {
        low: *sorted.first()?,
        median: stats::median(&sorted)?,
        high: *sorted.last()?,
    })
}

/// Revenue growth % plus EBITDA or FCF margin %.
pub fn rule_of_40(snapshot: &FinancialsSnapshot, basis: MarginBasis) -> Option<RuleOf40> {
    let growth = snapshot.revenue_growth()?;
    let margin = match basis {
        MarginBasis::Ebitda => snapshot.ebitda_margin()?,
        MarginBasis::FreeCashFlow => snapshot.fcf_margin()?,
    };
    Some(RuleOf40 {
        revenue_growth_pct: growth * 100.0,
        margin_pct: margin * 100.0,
        basis,
        score: (growth + margin) * 100.0,
    })
}
