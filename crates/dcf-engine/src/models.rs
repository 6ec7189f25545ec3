use serde::{Deserialize, Serialize};
use valuation_core::ValuationError;

/// Growth applied to base-year FCF. FCF is assumed to scale with revenue, so
/// this is the revenue growth assumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthPath {
    Constant(f64),
    /// One rate per projection year, year 1 first
    PerYear(Vec<f64>),
}

impl GrowthPath {
    /// Growth rate for a 1-based projection year.
    pub fn rate_for_year(&self, year: u32) -> f64 {
        match self {
            GrowthPath::Constant(rate) => *rate,
            GrowthPath::PerYear(rates) => {
                let idx = (year.max(1) - 1) as usize;
                rates.get(idx).or(rates.last()).copied().unwrap_or(0.0)
            }
        }
    }

    /// Same path with every rate moved by `delta`.
    pub fn shifted(&self, delta: f64) -> GrowthPath {
        match self {
            GrowthPath::Constant(rate) => GrowthPath::Constant(rate + delta),
            GrowthPath::PerYear(rates) => GrowthPath::PerYear(rates.iter().map(|r| r + delta).collect()),
        }
    }

    pub fn first_rate(&self) -> f64 {
        self.rate_for_year(1)
    }

    fn rates(&self) -> Vec<f64> {
        match self {
            GrowthPath::Constant(rate) => vec![*rate],
            GrowthPath::PerYear(rates) => rates.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcfAssumptions {
    pub revenue_growth: GrowthPath,
    /// Used to estimate EBITDA from revenue when EBITDA is not reported
    #[serde(default)]
    pub ebitda_margin: Option<f64>,
    /// WACC
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub horizon_years: u32,
    pub tax_rate: f64,
    /// Capex approximation as a fraction of revenue, used when capex is not reported
    pub capex_to_revenue: f64,
}

impl Default for DcfAssumptions {
    fn default() -> Self {
        Self {
            revenue_growth: GrowthPath::Constant(0.05),
            ebitda_margin: None,
            discount_rate: 0.10,
            terminal_growth: 0.025,
            horizon_years: 5,
            tax_rate: 0.21,
            capex_to_revenue: 0.05,
        }
    }
}

impl DcfAssumptions {
    pub fn validate(&self) -> Result<(), ValuationError> {
        let invalid = |msg: String| Err(ValuationError::InvalidAssumptions(msg));

        let mut numbers = vec![
            ("discount_rate", self.discount_rate),
            ("terminal_growth", self.terminal_growth),
            ("tax_rate", self.tax_rate),
            ("capex_to_revenue", self.capex_to_revenue),
        ];
        if let Some(margin) = self.ebitda_margin {
            numbers.push(("ebitda_margin", margin));
        }
        for rate in self.revenue_growth.rates() {
            numbers.push(("revenue_growth", rate));
        }
        if let Some((name, value)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{} must be a finite number, got {}", name, value));
        }

        if self.horizon_years < 1 {
            return invalid("projection horizon must be at least one year".to_string());
        }
        if self.terminal_growth >= self.discount_rate {
            return invalid(format!(
                "terminal growth ({:.4}) must be strictly below the discount rate ({:.4})",
                self.terminal_growth, self.discount_rate
            ));
        }
        if self.discount_rate <= -1.0 {
            return invalid(format!("discount rate {:.4} must exceed -100%", self.discount_rate));
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return invalid(format!("tax rate {:.4} must be in [0, 1)", self.tax_rate));
        }
        if self.capex_to_revenue < 0.0 {
            return invalid("capex_to_revenue cannot be negative".to_string());
        }
        if let GrowthPath::PerYear(rates) = &self.revenue_growth {
            if rates.len() != self.horizon_years as usize {
                return invalid(format!(
                    "per-year growth path has {} rates for a {}-year horizon",
                    rates.len(),
                    self.horizon_years
                ));
            }
        }
        if self.revenue_growth.rates().iter().any(|&g| g <= -1.0) {
            return invalid("growth rates must exceed -100%".to_string());
        }
        Ok(())
    }
}

/// Offsets applied around the base assumptions for the sensitivity grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// Steps on each side of the base value; 2 gives a 5x5 grid
    pub steps_per_side: usize,
    pub growth_step: f64,
    pub discount_step: f64,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            steps_per_side: 2,
            growth_step: 0.01,
            discount_step: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub iterations: usize,
    /// Std-dev of the normal shock added to every growth rate
    pub growth_std_dev: f64,
    /// Std-dev of the normal draw around the base discount rate
    pub discount_std_dev: f64,
    pub histogram_bins: usize,
    /// Fixed seed for reproducible runs; `None` draws from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            growth_std_dev: 0.02,
            discount_std_dev: 0.01,
            histogram_bins: 20,
            seed: None,
        }
    }
}

/// Where the base-year FCF came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FcfSource {
    Reported { fiscal_year: i32 },
    /// EBITDA x (1 - tax) - capex
    Derived { fiscal_year: i32, ebitda: f64, capex: f64 },
}

impl FcfSource {
    pub fn is_derived(&self) -> bool {
        matches!(self, FcfSource::Derived { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedYear {
    pub year: u32,
    pub growth_rate: f64,
    pub free_cash_flow: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    /// Row keys, ascending (year-1 rate for per-year paths)
    pub growth_rates: Vec<f64>,
    /// Column keys, ascending
    pub discount_rates: Vec<f64>,
    /// `implied_prices[row][col]`; `None` where discount <= terminal growth
    pub implied_prices: Vec<Vec<Option<f64>>>,
}

impl SensitivityGrid {
    pub fn dimension(&self) -> usize {
        self.growth_rates.len()
    }

    pub fn cell(&self, growth_idx: usize, discount_idx: usize) -> Option<f64> {
        self.implied_prices.get(growth_idx)?.get(discount_idx).copied().flatten()
    }

    /// Cell at the unshifted base assumptions
    pub fn base_cell(&self) -> Option<f64> {
        let mid = self.dimension() / 2;
        self.cell(mid, mid)
    }

    /// Lowest and highest implied price across available cells
    pub fn price_range(&self) -> Option<(f64, f64)> {
        let values: Vec<f64> = self.implied_prices.iter().flatten().flatten().copied().collect();
        if values.is_empty() {
            return None;
        }
        let low = values.iter().copied().fold(f64::INFINITY, f64::min);
        let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((low, high))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub iterations: usize,
    pub valid_samples: usize,
    /// Draws where discount <= terminal growth or a rate fell below -100%
    pub rejected_samples: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    /// Share of valid samples (0-100) with an implied price above the market price
    pub probability_above_price: Option<f64>,
    pub histogram: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfResult {
    pub ticker: String,
    pub base_fcf: f64,
    pub fcf_source: FcfSource,
    pub projections: Vec<ProjectedYear>,
    pub sum_pv_fcf: f64,
    /// Undiscounted Gordon Growth terminal value
    pub terminal_value: f64,
    pub terminal_value_pv: f64,
    pub enterprise_value: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub equity_value: f64,
    pub implied_share_price: f64,
    pub current_price: Option<f64>,
    /// Implied price vs market price, percent
    pub upside_pct: Option<f64>,
    /// Share of enterprise value coming from the terminal value, percent
    pub terminal_value_share_pct: Option<f64>,
    pub sensitivity: SensitivityGrid,
    pub monte_carlo: Option<MonteCarloSummary>,
    pub warnings: Vec<String>,
}
