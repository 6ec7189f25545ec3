use std::collections::BTreeMap;

use valuation_core::FinancialsSnapshot;

use crate::engine::rule_of_40;
use crate::models::{CompsRow, MarginBasis, Multiple};

/// Ratio of two strictly positive figures. A non-positive side makes the
/// multiple meaningless for ranking, so it is unavailable.
fn positive_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if n > 0.0 && d > 0.0 => {
            let ratio = n / d;
            ratio.is_finite().then_some(ratio)
        }
        _ => None,
    }
}

/// Expected EPS growth as a fraction: forward over trailing EPS, else the
/// latest YoY net income growth.
pub fn earnings_growth(snapshot: &FinancialsSnapshot) -> Option<f64> {
    if let (Some(trailing), Some(forward)) = (snapshot.trailing_eps, snapshot.forward_eps) {
        if trailing > 0.0 {
            return Some(forward / trailing - 1.0);
        }
    }
    let current = snapshot.latest()?.net_income?;
    let prior = snapshot.previous()?.net_income?;
    if prior > 0.0 {
        Some((current - prior) / prior)
    } else {
        None
    }
}

/// Target figure a multiple is applied to: EBITDA, revenue, EPS, growth-adjusted
/// EPS or book value. The same figure is the multiple's denominator.
pub(crate) fn valuation_base(snapshot: &FinancialsSnapshot, multiple: Multiple) -> Option<f64> {
    match multiple {
        Multiple::EvToEbitda => snapshot.latest_available(|y| y.ebitda),
        Multiple::EvToRevenue | Multiple::PriceToSales => snapshot.latest_available(|y| y.revenue),
        Multiple::PriceToEarnings => snapshot.eps(),
        Multiple::Peg => {
            let growth_pct = earnings_growth(snapshot)? * 100.0;
            if growth_pct > 0.0 {
                snapshot.eps().map(|eps| eps * growth_pct)
            } else {
                None
            }
        }
        Multiple::PriceToBook => snapshot.book_value(),
    }
}

pub fn compute_multiple(snapshot: &FinancialsSnapshot, multiple: Multiple) -> Option<f64> {
    let numerator = if multiple.is_enterprise() {
        snapshot.enterprise_value()
    } else if multiple.is_per_share() {
        snapshot.price
    } else {
        snapshot.market_cap()
    };
    positive_ratio(numerator, valuation_base(snapshot, multiple))
}

/// Leverage column of the comps table. Zero debt is a real 0x.
fn debt_to_ebitda(snapshot: &FinancialsSnapshot) -> Option<f64> {
    let debt = snapshot.total_debt?;
    match snapshot.latest_available(|y| y.ebitda) {
        Some(ebitda) if ebitda > 0.0 && debt >= 0.0 => Some(debt / ebitda),
        _ => None,
    }
}

pub fn build_row(snapshot: &FinancialsSnapshot) -> CompsRow {
    let multiples: BTreeMap<Multiple, Option<f64>> = Multiple::all()
        .into_iter()
        .map(|m| (m, compute_multiple(snapshot, m)))
        .collect();

    CompsRow {
        ticker: snapshot.ticker.clone(),
        name: snapshot.display_name().to_string(),
        market_cap: snapshot.market_cap(),
        enterprise_value: snapshot.enterprise_value(),
        revenue: snapshot.latest_available(|y| y.revenue),
        ebitda: snapshot.latest_available(|y| y.ebitda),
        revenue_growth: snapshot.revenue_growth(),
        ebitda_margin: snapshot.ebitda_margin(),
        gross_margin: snapshot.gross_margin(),
        net_margin: snapshot.net_margin(),
        return_on_equity: snapshot.return_on_equity(),
        debt_to_ebitda: debt_to_ebitda(snapshot),
        rule_of_40: rule_of_40(snapshot, MarginBasis::Ebitda).map(|r| r.score),
        multiples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use valuation_core::AnnualFinancials;

    fn snapshot() -> FinancialsSnapshot {
        FinancialsSnapshot {
            ticker: "ACME".to_string(),
            price: Some(50.0),
            shares_outstanding: Some(100),
            trailing_eps: Some(2.5),
            forward_eps: Some(3.0),
            total_debt: Some(1_000.0),
            cash: Some(500.0),
            total_equity: Some(2_000.0),
            history: vec![AnnualFinancials {
                fiscal_year: 2023,
                revenue: Some(10_000.0),
                ebitda: Some(1_100.0),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_multiples_from_snapshot() {
        let s = snapshot();
        // EV = 5000 + 1000 - 500
        assert_relative_eq!(compute_multiple(&s, Multiple::EvToEbitda).unwrap(), 5.0);
        assert_relative_eq!(compute_multiple(&s, Multiple::EvToRevenue).unwrap(), 0.55);
        assert_relative_eq!(compute_multiple(&s, Multiple::PriceToEarnings).unwrap(), 20.0);
        assert_relative_eq!(compute_multiple(&s, Multiple::PriceToBook).unwrap(), 2.5);
        assert_relative_eq!(compute_multiple(&s, Multiple::PriceToSales).unwrap(), 0.5);
        // 20x P/E over 20% growth
        assert_relative_eq!(compute_multiple(&s, Multiple::Peg).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_positive_denominator_is_unavailable() {
        let mut s = snapshot();
        s.history[0].ebitda = Some(-50.0);
        s.trailing_eps = Some(0.0);
        assert!(compute_multiple(&s, Multiple::EvToEbitda).is_none());
        assert!(compute_multiple(&s, Multiple::PriceToEarnings).is_none());
        assert!(compute_multiple(&s, Multiple::Peg).is_none());
    }

    #[test]
    fn test_shrinking_earnings_have_no_peg() {
        let mut s = snapshot();
        s.forward_eps = Some(2.0);
        assert!(compute_multiple(&s, Multiple::Peg).is_none());
        assert!(compute_multiple(&s, Multiple::PriceToEarnings).is_some());
    }
}
