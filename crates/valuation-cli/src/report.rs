use chrono::{DateTime, Utc};
use comps_analysis::{CompsEngine, CompsResult};
use dcf_engine::{DcfEngine, DcfResult, MonteCarloConfig};
use deal_scoring::{DealScore, PiotroskiGrade};
use merger_analysis::{FootballField, MergerResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use valuation_core::ValuationError;

use crate::config::CliConfig;
use crate::input::ValuationInput;

/// Which engines a run should invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub dcf: bool,
    pub comps: bool,
    pub merger: bool,
    pub score: bool,
    pub monte_carlo: bool,
}

impl Selection {
    pub fn everything() -> Self {
        Self {
            dcf: true,
            comps: true,
            merger: true,
            score: true,
            monte_carlo: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.dcf || self.comps || self.merger || self.score)
    }
}

/// Monte Carlo settings given on the command line. They win over both the
/// input file's `monte_carlo` block and the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonteCarloOverrides {
    pub seed: Option<u64>,
    pub iterations: Option<usize>,
}

impl MonteCarloOverrides {
    pub fn apply(&self, mut config: MonteCarloConfig) -> MonteCarloConfig {
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dcf: Option<DcfResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comps: Option<CompsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merger: Option<MergerResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub football_field: Option<FootballField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_score: Option<DealScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piotroski: Option<PiotroskiGrade>,
    /// Engine name -> error message, for engines that failed
    pub errors: BTreeMap<String, String>,
}

impl Report {
    fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            generated_at: Utc::now(),
            dcf: None,
            comps: None,
            merger: None,
            football_field: None,
            deal_score: None,
            piotroski: None,
            errors: BTreeMap::new(),
        }
    }

    fn record<T>(&mut self, engine: &str, result: Result<T, ValuationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{} failed for {}: {}", engine, self.ticker, e);
                self.errors.insert(engine.to_string(), e.to_string());
                None
            }
        }
    }
}

/// Run the selected engines over one input. Engine failures are collected in
/// the report instead of aborting the remaining engines.
pub fn run(
    input: &ValuationInput,
    selection: Selection,
    config: &CliConfig,
    overrides: MonteCarloOverrides,
) -> Report {
    let target = &input.target;
    let mut report = Report::new(&target.ticker);

    let assumptions = input.dcf.clone().unwrap_or_else(|| config.dcf_assumptions());
    let peers = input.peer_set();

    if selection.dcf {
        let mut engine = DcfEngine::new().with_sensitivity(
            input.sensitivity.clone().unwrap_or_else(|| config.sensitivity()),
        );
        if selection.monte_carlo {
            let mut mc = input.monte_carlo.clone().unwrap_or_else(|| config.monte_carlo());
            if mc.seed.is_none() {
                mc.seed = config.mc_seed;
            }
            engine = engine.with_monte_carlo(overrides.apply(mc));
        }
        report.dcf = report.record("dcf", engine.project(target, &assumptions));
        if let Some(dcf) = &report.dcf {
            info!(
                "DCF {}: implied price {:.2}, EV {:.0}",
                target.ticker, dcf.implied_share_price, dcf.enterprise_value
            );
        }
    }

    if selection.comps {
        let engine = CompsEngine::new().with_options(input.comps.clone());
        report.comps = report.record("comps", engine.compare(target, &peers, &input.multiples));
        if let Some(comps) = &report.comps {
            info!("Comps {}: {} peers", target.ticker, comps.peers.len());
        }
    }

    if selection.merger {
        match &input.acquirer {
            Some(acquirer) => {
                report.merger = report.record("merger", merger_analysis::model(acquirer, target, &input.deal));
                let offer_value = report.merger.as_ref().map(|merger| {
                    info!(
                        "Merger {} -> {}: accretion/dilution {}",
                        acquirer.ticker,
                        target.ticker,
                        merger
                            .accretion_dilution_pct
                            .map_or_else(|| "n/a".to_string(), |pct| format!("{:+.2}%", pct))
                    );
                    merger.terms.purchase_price
                });
                if let Some(offer_value) = offer_value {
                    report.football_field = report.record(
                        "football_field",
                        merger_analysis::build_football_field(target, &peers, &assumptions, offer_value),
                    );
                }
            }
            None => {
                warn!("Merger analysis requested but the input has no acquirer");
                report
                    .errors
                    .insert("merger".to_string(), "no acquirer in input".to_string());
            }
        }
    }

    if selection.score {
        report.deal_score = report.record("deal_score", deal_scoring::deal_score(target, &input.deal_score));
        report.piotroski = report.record("piotroski", deal_scoring::piotroski_grade(target, &input.piotroski));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const INPUT: &str = r#"{
        "target": {
            "ticker": "TGT",
            "currency": "USD",
            "price": 10.0,
            "shares_outstanding": 20,
            "trailing_eps": 0.5,
            "total_debt": 50.0,
            "cash": 10.0,
            "total_equity": 150.0,
            "total_assets": 300.0,
            "total_liabilities": 150.0,
            "fifty_two_week_low": 8.0,
            "fifty_two_week_high": 12.0,
            "history": [
                {"fiscal_year": 2022, "revenue": 180.0, "ebitda": 18.0, "net_income": 8.0, "free_cash_flow": 9.0},
                {"fiscal_year": 2023, "revenue": 200.0, "ebitda": 20.0, "net_income": 10.0, "free_cash_flow": 12.0}
            ]
        },
        "peers": [
            {"ticker": "P1", "currency": "USD", "price": 10.0, "shares_outstanding": 10,
             "total_debt": 0.0, "cash": 0.0,
             "history": [{"fiscal_year": 2023, "revenue": 100.0, "ebitda": 10.0, "net_income": 5.0}]},
            {"ticker": "P2", "currency": "USD", "price": 12.0, "shares_outstanding": 10,
             "total_debt": 0.0, "cash": 0.0,
             "history": [{"fiscal_year": 2023, "revenue": 100.0, "ebitda": 10.0, "net_income": 5.0}]}
        ],
        "acquirer": {
            "ticker": "ACQ",
            "currency": "USD",
            "price": 20.0,
            "shares_outstanding": 100,
            "total_debt": 100.0,
            "cash": 300.0,
            "history": [
                {"fiscal_year": 2022, "revenue": 900.0, "ebitda": 180.0, "ebit": 140.0, "net_income": 90.0},
                {"fiscal_year": 2023, "revenue": 1000.0, "ebitda": 200.0, "ebit": 150.0, "net_income": 100.0}
            ]
        },
        "multiples": ["EvToEbitda"],
        "deal": {"premium": 0.2, "fee_rate": 0.0}
    }"#;

    fn config() -> CliConfig {
        CliConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_partial_blocks_fall_back_to_defaults() {
        let input = ValuationInput::from_json(INPUT).unwrap();
        assert_eq!(input.deal.premium, 0.2);
        assert_eq!(input.deal.cash_fraction, 0.5);
        assert!(input.dcf.is_none());
        assert_eq!(input.peer_filter.max_peers, 10);
    }

    #[test]
    fn test_full_run() {
        let input = ValuationInput::from_json(INPUT).unwrap();
        let report = run(&input, Selection::everything(), &config(), MonteCarloOverrides::default());

        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(report.dcf.is_some());
        assert!(report.comps.is_some());
        assert!(report.deal_score.is_some());
        assert!(report.piotroski.is_some());

        // Offer: 10 x 1.2 x 20 shares
        let merger = report.merger.as_ref().unwrap();
        assert_relative_eq!(merger.terms.purchase_price, 240.0, epsilon = 1e-9);
        let field = report.football_field.as_ref().unwrap();
        assert_relative_eq!(field.offer_value, 240.0, epsilon = 1e-9);
    }

    #[test]
    fn test_only_selected_engines_run() {
        let input = ValuationInput::from_json(INPUT).unwrap();
        let selection = Selection {
            score: true,
            ..Default::default()
        };
        let report = run(&input, selection, &config(), MonteCarloOverrides::default());
        assert!(report.dcf.is_none());
        assert!(report.merger.is_none());
        assert!(report.deal_score.is_some());
    }

    #[test]
    fn test_engine_failure_is_reported_not_fatal() {
        let mut input = ValuationInput::from_json(INPUT).unwrap();
        input.peers.clear();
        let report = run(&input, Selection::everything(), &config(), MonteCarloOverrides::default());

        assert!(report.errors.contains_key("comps"));
        assert!(report.dcf.is_some());
    }

    #[test]
    fn test_merger_without_acquirer() {
        let mut input = ValuationInput::from_json(INPUT).unwrap();
        input.acquirer = None;
        let selection = Selection {
            merger: true,
            ..Default::default()
        };
        let report = run(&input, selection, &config(), MonteCarloOverrides::default());
        assert!(report.errors.contains_key("merger"));
    }

    #[test]
    fn test_monte_carlo_uses_configured_seed() {
        let input = ValuationInput::from_json(INPUT).unwrap();
        let config = CliConfig {
            mc_iterations: 200,
            mc_seed: Some(7),
            ..config()
        };
        let selection = Selection {
            dcf: true,
            monte_carlo: true,
            ..Default::default()
        };
        let first = run(&input, selection, &config, MonteCarloOverrides::default());
        let second = run(&input, selection, &config, MonteCarloOverrides::default());
        assert_eq!(
            first.dcf.unwrap().monte_carlo,
            second.dcf.unwrap().monte_carlo
        );
    }

    #[test]
    fn test_command_line_beats_input_monte_carlo_block() {
        let mut input = ValuationInput::from_json(INPUT).unwrap();
        input.monte_carlo = Some(MonteCarloConfig {
            iterations: 50,
            seed: Some(1),
            ..Default::default()
        });
        let selection = Selection {
            dcf: true,
            monte_carlo: true,
            ..Default::default()
        };

        let from_file = run(&input, selection, &config(), MonteCarloOverrides::default());
        assert_eq!(from_file.dcf.unwrap().monte_carlo.unwrap().iterations, 50);

        let overrides = MonteCarloOverrides {
            seed: Some(9),
            iterations: Some(120),
        };
        let overridden = run(&input, selection, &config(), overrides);
        let summary = overridden.dcf.unwrap().monte_carlo.unwrap();
        assert_eq!(summary.iterations, 120);

        let mut reseeded = input.clone();
        reseeded.monte_carlo = Some(MonteCarloConfig {
            iterations: 120,
            seed: Some(9),
            ..Default::default()
        });
        let expected = run(&reseeded, selection, &config(), MonteCarloOverrides::default());
        assert_eq!(Some(summary), expected.dcf.unwrap().monte_carlo);
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = MonteCarloOverrides {
            seed: None,
            iterations: Some(7),
        };
        let applied = overrides.apply(MonteCarloConfig {
            seed: Some(3),
            ..Default::default()
        });
        assert_eq!(applied.iterations, 7);
        assert_eq!(applied.seed, Some(3));
    }
}
