use valuation_core::FinancialsSnapshot;

use crate::models::PeerFilter;

/// Pick peers for `target` out of already-fetched candidates.
///
/// Drops the target itself and candidates without a market cap, keeps those
/// inside the market-cap band around the target, then takes the `max_peers`
/// closest in size. When the target has no market cap the band and the
/// proximity sort are skipped.
pub fn select_peers<'a>(
    target: &FinancialsSnapshot,
    candidates: &'a [FinancialsSnapshot],
    filter: &PeerFilter,
) -> Vec<&'a FinancialsSnapshot> {
    let target_cap = target.market_cap();

    let mut selected: Vec<(&FinancialsSnapshot, f64)> = candidates
        .iter()
        .filter(|c| !c.ticker.eq_ignore_ascii_case(&target.ticker))
        .filter(|c| !filter.same_sector || c.sector == target.sector)
        .filter_map(|c| c.market_cap().map(|cap| (c, cap)))
        .filter(|&(_, cap)| match target_cap {
            Some(t) => cap >= t * filter.min_market_cap_ratio && cap <= t * filter.max_market_cap_ratio,
            None => true,
        })
        .collect();

    if let Some(t) = target_cap {
        selected.sort_by(|a, b| {
            (a.1 - t)
                .abs()
                .partial_cmp(&(b.1 - t).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    selected.truncate(filter.max_peers);

    tracing::debug!(
        "{}: selected {} of {} candidate peers",
        target.ticker,
        selected.len(),
        candidates.len()
    );
    selected.into_iter().map(|(c, _)| c).collect()
}
