use approx::assert_relative_eq;
use valuation_core::{AnnualFinancials, FinancialsSnapshot, Sector, ValuationError};

use crate::engine::{compare, percentile_rank, peer_statistics, CompsEngine};
use crate::models::*;
use crate::peers::select_peers;

/// Helper: debt-free company with 100 shares and EBITDA of 100, so EV/EBITDA == price.
fn company(ticker: &str, price: f64) -> FinancialsSnapshot {
    FinancialsSnapshot {
        ticker: ticker.to_string(),
        currency: "USD".to_string(),
        price: Some(price),
        shares_outstanding: Some(100),
        trailing_eps: Some(price / 20.0),
        total_debt: Some(0.0),
        cash: Some(0.0),
        total_equity: Some(500.0),
        history: vec![
            AnnualFinancials {
                fiscal_year: 2022,
                revenue: Some(800.0),
                ebitda: Some(80.0),
                ..Default::default()
            },
            AnnualFinancials {
                fiscal_year: 2023,
                revenue: Some(1_000.0),
                ebitda: Some(100.0),
                free_cash_flow: Some(200.0),
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

fn peers() -> Vec<FinancialsSnapshot> {
    vec![company("AAA", 8.0), company("BBB", 10.0), company("CCC", 12.0)]
}

#[test]
fn test_tied_target_shares_inclusive_rank() {
    let result = compare(&company("TGT", 10.0), &peers(), &[Multiple::EvToEbitda]).unwrap();
    // {8, 10, 12} plus the target at 10: three of four at or below
    assert_relative_eq!(result.rank(Multiple::EvToEbitda).unwrap(), 75.0);
}

#[test]
fn test_percentile_rank_is_monotonic() {
    let mut last = 0.0;
    for price in [5.0, 8.0, 9.0, 10.0, 11.0, 12.0, 20.0] {
        let result = compare(&company("TGT", price), &peers(), &[Multiple::EvToEbitda]).unwrap();
        let rank = result.rank(Multiple::EvToEbitda).unwrap();
        assert!(rank >= last, "rank fell from {} to {} at {}", last, rank, price);
        last = rank;
    }
    assert_relative_eq!(last, 100.0);
}

#[test]
fn test_percentile_rank_helper() {
    assert_relative_eq!(percentile_rank(Some(5.0), &[8.0, 10.0, 12.0]).unwrap(), 25.0);
    assert!(percentile_rank(None, &[8.0]).is_none());
    assert!(percentile_rank(Some(5.0), &[]).is_none());
}

#[test]
fn test_empty_peer_set_fails() {
    assert!(matches!(
        compare(&company("TGT", 10.0), &[], &[]),
        Err(ValuationError::EmptyPeerSet(_))
    ));
}

#[test]
fn test_target_is_never_its_own_peer() {
    let mut set = peers();
    set.push(company("tgt", 10.0));
    let result = compare(&company("TGT", 10.0), &set, &[Multiple::EvToEbitda]).unwrap();
    assert_eq!(result.peers.len(), 3);
    assert!(result.warnings.iter().any(|w| w.contains("own peer list")));

    let only_self = vec![company("TGT", 10.0)];
    assert!(matches!(
        compare(&company("TGT", 10.0), &only_self, &[]),
        Err(ValuationError::EmptyPeerSet(_))
    ));
}

#[test]
fn test_negative_ebitda_peer_is_unavailable_not_fatal() {
    let mut set = peers();
    for y in set[0].history.iter_mut() {
        y.ebitda = Some(-20.0);
    }
    let result = compare(&company("TGT", 10.0), &set, &[Multiple::EvToEbitda]).unwrap();

    assert!(result.peers[0].multiple(Multiple::EvToEbitda).is_none());
    let stats = &result.statistics[&Multiple::EvToEbitda];
    assert_eq!(stats.count, 2);
    assert_relative_eq!(stats.median.unwrap(), 11.0);
}

#[test]
fn test_statistics_need_two_peers() {
    let stats = peer_statistics(Multiple::PriceToEarnings, &[14.0]);
    assert_eq!(stats.count, 1);
    assert!(stats.median.is_none());
    assert!(stats.mean.is_none());

    let result = compare(&company("TGT", 10.0), &[company("AAA", 8.0)], &[Multiple::EvToEbitda]).unwrap();
    assert!(result.median(Multiple::EvToEbitda).is_none());
    assert!(result.implied.is_empty());
    assert!(result.implied_price_range.is_none());
}

#[test]
fn test_peer_statistics_summary() {
    let stats = peer_statistics(Multiple::EvToRevenue, &[4.0, 1.0, 3.0, 2.0]);
    assert_relative_eq!(stats.median.unwrap(), 2.5);
    assert_relative_eq!(stats.mean.unwrap(), 2.5);
    assert_eq!(stats.min, Some(1.0));
    assert_eq!(stats.max, Some(4.0));
}

#[test]
fn test_implied_valuation_uses_debt_and_cash() {
    let mut target = company("TGT", 10.0);
    target.total_debt = Some(200.0);
    target.cash = Some(50.0);

    let result = compare(&target, &peers(), &[Multiple::EvToEbitda]).unwrap();
    let implied = result.implied_for(Multiple::EvToEbitda).unwrap();

    // 10x median on EBITDA of 100
    assert_relative_eq!(implied.implied_enterprise_value.unwrap(), 1_000.0);
    assert_relative_eq!(implied.implied_equity_value.unwrap(), 850.0);
    assert_relative_eq!(implied.implied_share_price.unwrap(), 8.5);
}

#[test]
fn test_implied_price_range_across_multiples() {
    let result = compare(
        &company("TGT", 10.0),
        &peers(),
        &[Multiple::EvToEbitda, Multiple::PriceToEarnings, Multiple::PriceToSales],
    )
    .unwrap();

    let range = result.implied_price_range.clone().unwrap();
    assert!(range.low <= range.median && range.median <= range.high);

    // Median P/E of 20x on EPS of 0.5
    let pe = result.implied_for(Multiple::PriceToEarnings).unwrap();
    assert_relative_eq!(pe.implied_share_price.unwrap(), 10.0, epsilon = 1e-9);
    assert_relative_eq!(pe.implied_equity_value.unwrap(), 1_000.0, epsilon = 1e-9);
}

#[test]
fn test_missing_cash_is_warned_for_enterprise_multiples() {
    let mut target = company("TGT", 10.0);
    target.cash = None;
    let result = compare(&target, &peers(), &[Multiple::EvToEbitda]).unwrap();
    assert!(result.warnings.iter().any(|w| w.contains("cash")));
}

#[test]
fn test_rule_of_40_only_for_saas() {
    let plain = compare(&company("TGT", 10.0), &peers(), &[]).unwrap();
    assert!(plain.rule_of_40.is_none());

    let engine = CompsEngine::new().with_options(CompsOptions {
        saas: true,
        rule_of_40_basis: MarginBasis::Ebitda,
    });
    let result = engine.compare(&company("TGT", 10.0), &peers(), &[]).unwrap();
    let r40 = result.rule_of_40.unwrap();
    // 25% growth + 10% EBITDA margin
    assert_relative_eq!(r40.score, 35.0, epsilon = 1e-9);
    assert!(!r40.passes());

    let fcf_engine = CompsEngine::new().with_options(CompsOptions {
        saas: true,
        rule_of_40_basis: MarginBasis::FreeCashFlow,
    });
    let fcf = fcf_engine.compare(&company("TGT", 10.0), &peers(), &[]).unwrap();
    assert!(fcf.rule_of_40.unwrap().passes());
}

#[test]
fn test_comps_table_rows_and_peer_summary() {
    let mut set = peers();
    set[2].total_debt = Some(300.0);
    set[2].history[1].net_income = Some(50.0);
    set[2].history[1].gross_profit = Some(600.0);

    let result = compare(&company("TGT", 10.0), &set, &[Multiple::EvToEbitda]).unwrap();

    let ccc = result.peers.iter().find(|r| r.ticker == "CCC").unwrap();
    assert_relative_eq!(ccc.debt_to_ebitda.unwrap(), 3.0, epsilon = 1e-9);
    assert_relative_eq!(ccc.gross_margin.unwrap(), 0.6, epsilon = 1e-9);
    assert_relative_eq!(ccc.net_margin.unwrap(), 0.05, epsilon = 1e-9);
    assert_relative_eq!(ccc.return_on_equity.unwrap(), 0.1, epsilon = 1e-9);
    // 25% growth + 10% EBITDA margin
    assert_relative_eq!(ccc.rule_of_40.unwrap(), 35.0, epsilon = 1e-9);

    let aaa = result.peers.iter().find(|r| r.ticker == "AAA").unwrap();
    assert_relative_eq!(aaa.debt_to_ebitda.unwrap(), 0.0);
    assert!(aaa.net_margin.is_none());

    // EVs of 800, 1000 and 1500
    assert_relative_eq!(result.peer_median(OperatingMetric::EnterpriseValue).unwrap(), 1_000.0, epsilon = 1e-9);
    assert_relative_eq!(result.peer_mean(OperatingMetric::EnterpriseValue).unwrap(), 1_100.0, epsilon = 1e-9);
    assert_relative_eq!(result.peer_median(OperatingMetric::RuleOf40).unwrap(), 35.0, epsilon = 1e-9);
    assert_eq!(result.peer_summary[&OperatingMetric::Revenue].count, 3);
    assert_eq!(result.peer_summary.len(), OperatingMetric::all().len());
}

#[test]
fn test_single_reporting_peer_still_summarised() {
    let mut set = peers();
    set[0].history[0].revenue = None;
    set[1].history[0].revenue = None;
    let result = compare(&company("TGT", 10.0), &set, &[Multiple::EvToEbitda]).unwrap();
    let growth = &result.peer_summary[&OperatingMetric::RevenueGrowth];
    assert_eq!(growth.count, 1);
    assert_relative_eq!(growth.median.unwrap(), 0.25, epsilon = 1e-9);
}

#[test]
fn test_empty_request_means_all_multiples() {
    let result = compare(&company("TGT", 10.0), &peers(), &[]).unwrap();
    assert_eq!(result.multiples, Multiple::all());
    assert_eq!(result.statistics.len(), Multiple::all().len());
}

#[test]
fn test_select_peers_band_and_proximity() {
    let target = company("TGT", 10.0); // market cap 1000
    let mut candidates = vec![
        company("TINY", 1.0),   // 100, below 0.2x
        company("HUGE", 60.0),  // 6000, above 5x
        company("NEAR", 11.0),  // 1100
        company("FAR", 40.0),   // 4000
        company("MID", 7.0),    // 700
        company("TGT", 10.0),
    ];
    candidates[2].sector = Sector::Technology;

    let picked = select_peers(&target, &candidates, &PeerFilter::default());
    let tickers: Vec<&str> = picked.iter().map(|p| p.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["NEAR", "MID", "FAR"]);

    let limited = select_peers(
        &target,
        &candidates,
        &PeerFilter {
            max_peers: 1,
            ..Default::default()
        },
    );
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].ticker, "NEAR");

    let same_sector = select_peers(
        &target,
        &candidates,
        &PeerFilter {
            same_sector: true,
            ..Default::default()
        },
    );
    assert_eq!(same_sector.len(), 2);
}
