use valuation_core::{AnnualFinancials, FinancialsSnapshot, NetDebtBridge, ValuationError};

use crate::models::*;
use crate::synergies::{realization_fraction, synergy_npv};

/// Pro-forma leverage above this multiple of EBITDA is flagged.
const HIGH_LEVERAGE: f64 = 5.0;

fn positive_ratio(numerator: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d > 0.0 => Some(numerator / d),
        _ => None,
    }
}

fn sum_both(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

fn accretion_pct(standalone: Option<f64>, pro_forma: Option<f64>) -> Option<f64> {
    match (standalone, pro_forma) {
        (Some(sa), Some(pf)) if sa != 0.0 => Some((pf - sa) / sa.abs() * 100.0),
        _ => None,
    }
}

/// Model an acquisition of `target` by `acquirer` under `structure`.
///
/// Both snapshots must carry the same number of annual records; period *k*
/// of the acquirer is combined with period *k* of the target.
pub fn model(
    acquirer: &FinancialsSnapshot,
    target: &FinancialsSnapshot,
    structure: &DealStructure,
) -> Result<MergerResult, ValuationError> {
    structure.validate()?;
    acquirer.validate()?;
    target.validate()?;

    if acquirer.history.len() != target.history.len() {
        return Err(ValuationError::IncompatiblePeriods {
            acquirer: acquirer.history.len(),
            target: target.history.len(),
        });
    }
    if acquirer.history.is_empty() {
        return Err(ValuationError::InsufficientData(format!(
            "{} and {} have no annual history to combine",
            acquirer.ticker, target.ticker
        )));
    }

    let mut warnings = Vec::new();
    let currency_mismatch = acquirer.currency != target.currency;
    if currency_mismatch {
        warnings.push(format!(
            "Currency mismatch: {} reports in {}, {} reports in {}; figures are combined without FX conversion",
            acquirer.ticker, acquirer.currency, target.ticker, target.currency
        ));
    }

    let target_price = target.price.ok_or_else(|| {
        ValuationError::InsufficientData(format!("{}: no market price to apply a premium to", target.ticker))
    })?;
    let target_shares = positive_shares(target)?;
    let acquirer_shares = positive_shares(acquirer)?;

    // Deal pricing
    let offer_price_per_share = target_price * (1.0 + structure.premium);
    let purchase_price = offer_price_per_share * target_shares;
    let transaction_fees = purchase_price * structure.fee_rate;
    let total_uses = purchase_price + transaction_fees;

    // Sources: cash from the balance sheet above the floor, stock at the acquirer's price, debt for the rest
    let acquirer_bridge = acquirer.net_debt_bridge();
    let target_bridge = target.net_debt_bridge();
    warnings.extend(acquirer_bridge.warnings(&acquirer.ticker));
    warnings.extend(target_bridge.warnings(&target.ticker));

    let cash_consideration = total_uses * structure.cash_fraction;
    let stock_consideration = total_uses * structure.stock_fraction;
    let available_cash = (acquirer_bridge.cash - structure.minimum_cash_balance).max(0.0);
    let cash_from_balance_sheet = cash_consideration.min(available_cash);

    let new_shares_issued = if stock_consideration > 0.0 {
        let acquirer_price = acquirer.price.ok_or_else(|| {
            ValuationError::InsufficientData(format!(
                "{}: no share price to issue stock consideration at",
                acquirer.ticker
            ))
        })?;
        stock_consideration / acquirer_price
    } else {
        0.0
    };
    let new_debt = total_uses - cash_from_balance_sheet - stock_consideration;

    let sources_and_uses = SourcesAndUses {
        purchase_price,
        transaction_fees,
        total_uses,
        cash_from_balance_sheet,
        new_debt,
        new_equity: stock_consideration,
        total_sources: cash_from_balance_sheet + new_debt + stock_consideration,
    };

    let pro_forma_shares =
        acquirer_shares + new_shares_issued + structure.convertible_shares - structure.share_buyback;
    if pro_forma_shares <= 0.0 {
        return Err(ValuationError::DivisionByZero(format!(
            "pro-forma share count is {:.0} after the buyback",
            pro_forma_shares
        )));
    }

    let terms = DealTerms {
        offer_price_per_share,
        purchase_price,
        cash_consideration,
        stock_consideration,
        new_shares_issued,
        acquirer_shares,
        pro_forma_shares,
    };

    let incremental_interest = new_debt * structure.cost_of_debt;
    let after_tax = 1.0 - structure.tax_rate;

    let pro_forma: Vec<ProFormaYear> = acquirer
        .history
        .iter()
        .zip(target.history.iter())
        .enumerate()
        .map(|(period, (acq, tgt))| {
            combine_year(period, acq, tgt, structure, incremental_interest, acquirer_shares, pro_forma_shares)
        })
        .collect();
    for (period, year) in pro_forma.iter().enumerate() {
        if year.acquirer_fiscal_year != year.target_fiscal_year {
            warnings.push(format!(
                "period {}: acquirer FY{} combined with target FY{}",
                period, year.acquirer_fiscal_year, year.target_fiscal_year
            ));
        }
    }

    // Headline figures come from the most recent period
    let latest = pro_forma.last();
    let standalone_eps = latest.and_then(|y| y.standalone_eps);
    let pro_forma_eps = latest.and_then(|y| y.pro_forma_eps);
    let accretion_dilution_pct = latest.and_then(|y| y.accretion_dilution_pct);
    if accretion_dilution_pct.is_none() {
        warnings.push(format!(
            "accretion/dilution unavailable: {} standalone EPS is missing or zero",
            acquirer.ticker
        ));
    }

    let implied_multiples = implied_multiples(target, purchase_price, target_bridge.net_debt());
    let goodwill = goodwill(target, purchase_price, &mut warnings)?;

    let npv = synergy_npv(structure);
    let target_market_value = target_price * target_shares;
    let premium_paid = purchase_price - target_market_value;
    let valuation_bridge = ValuationBridge {
        target_market_value,
        premium_paid,
        transaction_fees,
        synergy_npv: npv,
        value_created: npv - premium_paid - transaction_fees,
    };

    let credit = credit_metrics(
        acquirer,
        target,
        &acquirer_bridge,
        &target_bridge,
        cash_from_balance_sheet,
        new_debt,
        incremental_interest,
        latest.and_then(|y| y.ebitda),
    );
    if let Some(leverage) = credit.leverage {
        if leverage > HIGH_LEVERAGE {
            warnings.push(format!("Pro-forma leverage is {:.1}x EBITDA", leverage));
        }
    }

    let latest_realization = latest.map_or(1.0, |y| y.synergy_realization);
    let eps_bridge = eps_bridge(
        acquirer.latest().and_then(|y| y.net_income),
        target.latest().and_then(|y| y.net_income),
        structure.total_synergies() * latest_realization * after_tax,
        incremental_interest * after_tax,
        acquirer_shares,
        pro_forma_shares,
    );

    for w in &warnings {
        tracing::warn!("{}", w);
    }
    tracing::debug!(
        "Merger {} + {}: purchase price {:.0}, new debt {:.0}, new shares {:.0}, accretion {:?}",
        acquirer.ticker,
        target.ticker,
        purchase_price,
        new_debt,
        new_shares_issued,
        accretion_dilution_pct
    );

    Ok(MergerResult {
        acquirer: acquirer.ticker.clone(),
        target: target.ticker.clone(),
        terms,
        sources_and_uses,
        implied_multiples,
        pro_forma,
        standalone_eps,
        pro_forma_eps,
        accretion_dilution_pct,
        goodwill,
        credit,
        valuation_bridge,
        eps_bridge,
        currency_mismatch,
        warnings,
    })
}

fn positive_shares(snapshot: &FinancialsSnapshot) -> Result<f64, ValuationError> {
    match snapshot.shares() {
        Some(s) if s > 0.0 => Ok(s),
        _ => Err(ValuationError::DivisionByZero(format!(
            "{}: shares outstanding is zero or unavailable",
            snapshot.ticker
        ))),
    }
}

fn combine_year(
    period: usize,
    acq: &AnnualFinancials,
    tgt: &AnnualFinancials,
    structure: &DealStructure,
    incremental_interest: f64,
    acquirer_shares: f64,
    pro_forma_shares: f64,
) -> ProFormaYear {
    let realization = realization_fraction(&structure.realization_schedule, period);
    let cost = structure.cost_synergies * realization;
    let revenue_syn = structure.revenue_synergies * realization;
    let operating_uplift = cost + revenue_syn;
    let after_tax = 1.0 - structure.tax_rate;

    let net_income = sum_both(acq.net_income, tgt.net_income)
        .map(|ni| ni + (operating_uplift - incremental_interest) * after_tax);
    let standalone_eps = acq.net_income.map(|ni| ni / acquirer_shares);
    let pro_forma_eps = net_income.map(|ni| ni / pro_forma_shares);

    ProFormaYear {
        acquirer_fiscal_year: acq.fiscal_year,
        target_fiscal_year: tgt.fiscal_year,
        synergy_realization: realization,
        realized_cost_synergies: cost,
        realized_revenue_synergies: revenue_syn,
        revenue: sum_both(acq.revenue, tgt.revenue).map(|r| r + revenue_syn),
        ebitda: sum_both(acq.ebitda, tgt.ebitda).map(|e| e + operating_uplift),
        ebit: sum_both(acq.ebit, tgt.ebit).map(|e| e + operating_uplift),
        incremental_interest,
        net_income,
        standalone_eps,
        pro_forma_eps,
        accretion_dilution_pct: accretion_pct(standalone_eps, pro_forma_eps),
    }
}

fn implied_multiples(target: &FinancialsSnapshot, purchase_price: f64, target_net_debt: f64) -> ImpliedDealMultiples {
    let implied_ev = purchase_price + target_net_debt;
    ImpliedDealMultiples {
        implied_enterprise_value: implied_ev,
        ev_to_ebitda: positive_ratio(implied_ev, target.latest_available(|y| y.ebitda)),
        ev_to_revenue: positive_ratio(implied_ev, target.latest_available(|y| y.revenue)),
        price_to_earnings: positive_ratio(purchase_price, target.latest_available(|y| y.net_income)),
    }
}

/// Goodwill over net identifiable assets (assets - liabilities, else book equity).
fn goodwill(
    target: &FinancialsSnapshot,
    purchase_price: f64,
    warnings: &mut Vec<String>,
) -> Result<Goodwill, ValuationError> {
    let assets = target.total_assets.or_else(|| target.latest().and_then(|y| y.total_assets));
    let liabilities = target
        .total_liabilities
        .or_else(|| target.latest().and_then(|y| y.total_liabilities));

    let net_identifiable_assets = match (assets, liabilities, target.total_equity) {
        (Some(a), Some(l), _) => a - l,
        (_, _, Some(equity)) => {
            warnings.push(format!(
                "{}: assets or liabilities unavailable; goodwill measured against book equity",
                target.ticker
            ));
            equity
        }
        _ => {
            return Err(ValuationError::InsufficientData(format!(
                "{}: no balance sheet to measure goodwill against",
                target.ticker
            )))
        }
    };

    let excess = purchase_price - net_identifiable_assets;
    let bargain_purchase = excess < 0.0;
    if bargain_purchase {
        warnings.push(format!(
            "{}: purchase price is {:.0} below net identifiable assets (bargain purchase)",
            target.ticker, -excess
        ));
    }

    Ok(Goodwill {
        purchase_price,
        net_identifiable_assets,
        goodwill: excess.max(0.0),
        bargain_purchase,
        bargain_purchase_gain: if bargain_purchase { -excess } else { 0.0 },
    })
}

#[allow(clippy::too_many_arguments)]
fn credit_metrics(
    acquirer: &FinancialsSnapshot,
    target: &FinancialsSnapshot,
    acquirer_bridge: &NetDebtBridge,
    target_bridge: &NetDebtBridge,
    cash_used: f64,
    new_debt: f64,
    incremental_interest: f64,
    ebitda: Option<f64>,
) -> CreditMetrics {
    let total_debt = acquirer_bridge.total_debt + target_bridge.total_debt + new_debt;
    let cash = acquirer_bridge.cash - cash_used + target_bridge.cash;
    let existing_interest = |s: &FinancialsSnapshot| s.latest_available(|y| y.interest_expense).map_or(0.0, f64::abs);
    let interest_expense = existing_interest(acquirer) + existing_interest(target) + incremental_interest;

    CreditMetrics {
        total_debt,
        cash,
        net_debt: total_debt - cash,
        ebitda,
        interest_expense,
        leverage: ebitda.and_then(|e| positive_ratio(total_debt, Some(e))),
        interest_coverage: ebitda.and_then(|e| (interest_expense > 0.0).then(|| e / interest_expense)),
    }
}

/// Walk from standalone to pro-forma EPS. Relative steps always sum to the
/// difference between the first and last step.
fn eps_bridge(
    acquirer_net_income: Option<f64>,
    target_net_income: Option<f64>,
    after_tax_synergies: f64,
    after_tax_interest: f64,
    acquirer_shares: f64,
    pro_forma_shares: f64,
) -> Vec<EpsBridgeStep> {
    let (acq_ni, tgt_ni) = match (acquirer_net_income, target_net_income) {
        (Some(a), Some(t)) => (a, t),
        _ => return Vec::new(),
    };
    let step = |label: &str, value: f64, kind: BridgeStepKind| EpsBridgeStep {
        label: label.to_string(),
        value,
        kind,
    };
    let standalone = acq_ni / acquirer_shares;
    let pro_forma = (acq_ni + tgt_ni + after_tax_synergies - after_tax_interest) / pro_forma_shares;

    vec![
        step("Acquirer EPS", standalone, BridgeStepKind::Absolute),
        step("Target Earnings", tgt_ni / pro_forma_shares, BridgeStepKind::Relative),
        step("Synergies", after_tax_synergies / pro_forma_shares, BridgeStepKind::Relative),
        step("New Interest", -after_tax_interest / pro_forma_shares, BridgeStepKind::Relative),
        step(
            "Share Dilution",
            acq_ni / pro_forma_shares - standalone,
            BridgeStepKind::Relative,
        ),
        step("Pro Forma EPS", pro_forma, BridgeStepKind::Total),
    ]
}
