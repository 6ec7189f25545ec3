use anyhow::{Context, Result};
use dcf_engine::{DcfAssumptions, GrowthPath, MonteCarloConfig, SensitivityConfig};
use std::env;

/// Defaults for the engines when the input file does not carry its own
/// assumptions. Read from `VALUATION_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub revenue_growth: f64,
    pub horizon_years: u32,
    pub tax_rate: f64,
    pub capex_to_revenue: f64,

    // Monte Carlo
    pub mc_iterations: usize,
    pub mc_seed: Option<u64>,

    // Sensitivity grid
    pub sensitivity_step: f64,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; absent keys take the default, unparsable
    /// values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            discount_rate: get("VALUATION_DISCOUNT_RATE", "0.10")
                .parse()
                .context("VALUATION_DISCOUNT_RATE must be a number")?,
            terminal_growth: get("VALUATION_TERMINAL_GROWTH", "0.025")
                .parse()
                .context("VALUATION_TERMINAL_GROWTH must be a number")?,
            revenue_growth: get("VALUATION_REVENUE_GROWTH", "0.05")
                .parse()
                .context("VALUATION_REVENUE_GROWTH must be a number")?,
            horizon_years: get("VALUATION_HORIZON_YEARS", "5")
                .parse()
                .context("VALUATION_HORIZON_YEARS must be a whole number")?,
            tax_rate: get("VALUATION_TAX_RATE", "0.21")
                .parse()
                .context("VALUATION_TAX_RATE must be a number")?,
            capex_to_revenue: get("VALUATION_CAPEX_PCT", "0.05")
                .parse()
                .context("VALUATION_CAPEX_PCT must be a number")?,

            mc_iterations: get("VALUATION_MC_ITERATIONS", "10000")
                .parse()
                .context("VALUATION_MC_ITERATIONS must be a whole number")?,
            mc_seed: match lookup("VALUATION_MC_SEED") {
                Some(seed) if !seed.trim().is_empty() => Some(
                    seed.trim()
                        .parse()
                        .context("VALUATION_MC_SEED must be an unsigned integer")?,
                ),
                _ => None,
            },

            sensitivity_step: get("VALUATION_SENSITIVITY_STEP", "0.01")
                .parse()
                .context("VALUATION_SENSITIVITY_STEP must be a number")?,
        };

        Ok(config)
    }

    pub fn dcf_assumptions(&self) -> DcfAssumptions {
        DcfAssumptions {
            revenue_growth: GrowthPath::Constant(self.revenue_growth),
            ebitda_margin: None,
            discount_rate: self.discount_rate,
            terminal_growth: self.terminal_growth,
            horizon_years: self.horizon_years,
            tax_rate: self.tax_rate,
            capex_to_revenue: self.capex_to_revenue,
        }
    }

    pub fn sensitivity(&self) -> SensitivityConfig {
        SensitivityConfig {
            growth_step: self.sensitivity_step,
            discount_step: self.sensitivity_step,
            ..Default::default()
        }
    }

    pub fn monte_carlo(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            iterations: self.mc_iterations,
            seed: self.mc_seed,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = CliConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.dcf_assumptions(), DcfAssumptions::default());
        assert_eq!(config.sensitivity(), SensitivityConfig::default());
        assert_eq!(config.monte_carlo(), MonteCarloConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = CliConfig::from_lookup(lookup(&[
            ("VALUATION_DISCOUNT_RATE", "0.09"),
            ("VALUATION_HORIZON_YEARS", "10"),
            ("VALUATION_MC_SEED", "42"),
            ("VALUATION_SENSITIVITY_STEP", "0.005"),
        ]))
        .unwrap();

        assert_eq!(config.discount_rate, 0.09);
        assert_eq!(config.horizon_years, 10);
        assert_eq!(config.monte_carlo().seed, Some(42));
        assert_eq!(config.sensitivity().discount_step, 0.005);
    }

    #[test]
    fn test_unparsable_value_is_an_error() {
        let result = CliConfig::from_lookup(lookup(&[("VALUATION_TAX_RATE", "a quarter")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_seed_means_entropy() {
        let config = CliConfig::from_lookup(lookup(&[("VALUATION_MC_SEED", "  ")])).unwrap();
        assert_eq!(config.mc_seed, None);
    }
}
