//! Valuation CLI
//!
//! Runs the valuation engines over a JSON input file and prints a JSON report.
//!
//! Usage:
//!   valuation --input deal.json                 Run every engine
//!   valuation --input deal.json --dcf --comps   Run only the selected engines
//!
//! Engine defaults come from `VALUATION_*` environment variables (or `.env`).

mod config;
mod input;
mod report;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use config::CliConfig;
use input::ValuationInput;
use report::{MonteCarloOverrides, Selection};

#[derive(Debug, Clone, PartialEq)]
struct Options {
    input: PathBuf,
    output: Option<PathBuf>,
    selection: Selection,
    seed: Option<u64>,
    iterations: Option<usize>,
    compact: bool,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => match args.get(i + 1) {
            Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
            _ => bail!("{} expects a value", flag),
        },
        None => Ok(None),
    }
}

fn parse_args(args: &[String]) -> Result<Options> {
    let input = match flag_value(args, "--input")? {
        Some(path) => PathBuf::from(path),
        None => bail!("--input <file> is required"),
    };
    let output = flag_value(args, "--output")?.map(PathBuf::from);

    let seed = flag_value(args, "--seed")?
        .map(|v| v.parse::<u64>().context("--seed must be an unsigned integer"))
        .transpose()?;
    let iterations = flag_value(args, "--iterations")?
        .map(|v| v.parse::<usize>().context("--iterations must be a whole number"))
        .transpose()?;

    let has = |flag: &str| args.iter().any(|a| a == flag);
    let mut selection = Selection {
        dcf: has("--dcf"),
        comps: has("--comps"),
        merger: has("--merger"),
        score: has("--score"),
        monte_carlo: has("--monte-carlo") || seed.is_some() || iterations.is_some(),
    };
    if selection.is_empty() {
        selection = Selection {
            monte_carlo: selection.monte_carlo,
            ..Selection::everything()
        };
    }

    Ok(Options {
        input,
        output,
        selection,
        seed,
        iterations,
        compact: has("--compact"),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  valuation --input FILE [engines] [options]");
    eprintln!();
    eprintln!("Engines (default: all):");
    eprintln!("  --dcf              Discounted cash flow with sensitivity grid");
    eprintln!("  --comps            Comparable company multiples");
    eprintln!("  --merger           Accretion/dilution and football field (needs \"acquirer\")");
    eprintln!("  --score            Deal Score and Piotroski grade");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --monte-carlo      Add a Monte Carlo simulation to the DCF");
    eprintln!("  --seed N           Monte Carlo seed (implies --monte-carlo)");
    eprintln!("  --iterations N     Monte Carlo iterations (implies --monte-carlo)");
    eprintln!("  --output FILE      Write the report to FILE instead of stdout");
    eprintln!("  --compact          Single-line JSON");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            print_usage();
            return Err(e);
        }
    };

    let config = CliConfig::from_env()?;
    let overrides = MonteCarloOverrides {
        seed: options.seed,
        iterations: options.iterations,
    };

    let input = ValuationInput::load(&options.input)?;
    tracing::info!(
        "Valuing {} against {} peers ({} candidates)",
        input.target.ticker,
        input.peers.len(),
        input.candidates.len()
    );

    let report = report::run(&input, options.selection, &config, overrides);
    if !report.errors.is_empty() {
        tracing::warn!("{} engine(s) failed; see \"errors\" in the report", report.errors.len());
    }

    let json = if options.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    match &options.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
