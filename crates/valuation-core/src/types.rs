use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ValuationError;

/// Sector classification used for peer selection and SaaS flags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Technology,
    FinancialServices,
    Healthcare,
    ConsumerCyclical,
    ConsumerDefensive,
    Industrials,
    Energy,
    CommunicationServices,
    RealEstate,
    Utilities,
    BasicMaterials,
    Other(String),
}

impl Sector {
    /// Parse the sector labels most data vendors emit ("Financial Services", "Basic Materials", ...).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "technology" | "information technology" => Sector::Technology,
            "financial services" | "financials" => Sector::FinancialServices,
            "healthcare" | "health care" => Sector::Healthcare,
            "consumer cyclical" | "consumer discretionary" => Sector::ConsumerCyclical,
            "consumer defensive" | "consumer staples" => Sector::ConsumerDefensive,
            "industrials" => Sector::Industrials,
            "energy" => Sector::Energy,
            "communication services" => Sector::CommunicationServices,
            "real estate" => Sector::RealEstate,
            "utilities" => Sector::Utilities,
            "basic materials" | "materials" => Sector::BasicMaterials,
            _ => Sector::Other(label.trim().to_string()),
        }
    }

    pub fn to_label(&self) -> &str {
        match self {
            Sector::Technology => "Technology",
            Sector::FinancialServices => "Financial Services",
            Sector::Healthcare => "Healthcare",
            Sector::ConsumerCyclical => "Consumer Cyclical",
            Sector::ConsumerDefensive => "Consumer Defensive",
            Sector::Industrials => "Industrials",
            Sector::Energy => "Energy",
            Sector::CommunicationServices => "Communication Services",
            Sector::RealEstate => "Real Estate",
            Sector::Utilities => "Utilities",
            Sector::BasicMaterials => "Basic Materials",
            Sector::Other(label) => label,
        }
    }
}

impl Default for Sector {
    fn default() -> Self {
        Sector::Other(String::new())
    }
}

/// One fiscal year of reported figures. `None` means the figure was not
/// reported; zero is a real value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnualFinancials {
    pub fiscal_year: i32,
    pub revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub ebit: Option<f64>,
    pub net_income: Option<f64>,
    pub free_cash_flow: Option<f64>,
    #[serde(default)]
    pub operating_cash_flow: Option<f64>,
    /// Stored as a positive outflow
    #[serde(default)]
    pub capital_expenditure: Option<f64>,
    #[serde(default)]
    pub gross_profit: Option<f64>,
    #[serde(default)]
    pub sga_expense: Option<f64>,
    #[serde(default)]
    pub interest_expense: Option<f64>,
    #[serde(default)]
    pub total_assets: Option<f64>,
    #[serde(default)]
    pub total_liabilities: Option<f64>,
    #[serde(default)]
    pub current_assets: Option<f64>,
    #[serde(default)]
    pub current_liabilities: Option<f64>,
    #[serde(default)]
    pub long_term_debt: Option<f64>,
    #[serde(default)]
    pub diluted_shares: Option<f64>,
}

impl AnnualFinancials {
    pub fn new(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            ..Default::default()
        }
    }

    fn fields(&self) -> [(&'static str, Option<f64>); 16] {
        [
            ("revenue", self.revenue),
            ("ebitda", self.ebitda),
            ("ebit", self.ebit),
            ("net_income", self.net_income),
            ("free_cash_flow", self.free_cash_flow),
            ("operating_cash_flow", self.operating_cash_flow),
            ("capital_expenditure", self.capital_expenditure),
            ("gross_profit", self.gross_profit),
            ("sga_expense", self.sga_expense),
            ("interest_expense", self.interest_expense),
            ("total_assets", self.total_assets),
            ("total_liabilities", self.total_liabilities),
            ("current_assets", self.current_assets),
            ("current_liabilities", self.current_liabilities),
            ("long_term_debt", self.long_term_debt),
            ("diluted_shares", self.diluted_shares),
        ]
    }
}

/// Debt and cash used to move between enterprise and equity value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetDebtBridge {
    pub total_debt: f64,
    pub cash: f64,
    /// Components that were unavailable and entered the bridge as zero
    pub assumed_zero: Vec<String>,
}

impl NetDebtBridge {
    pub fn net_debt(&self) -> f64 {
        self.total_debt - self.cash
    }

    pub fn warnings(&self, ticker: &str) -> Vec<String> {
        self.assumed_zero
            .iter()
            .map(|field| format!("{} unavailable for {}; treated as zero in the equity bridge", field, ticker))
            .collect()
    }
}

/// Point-in-time record of a company's fundamentals and market data.
///
/// Built once by whoever fetched the data and only ever read by the engines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialsSnapshot {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub sector: Sector,
    #[serde(default)]
    pub industry: Option<String>,

    pub price: Option<f64>,
    pub shares_outstanding: Option<u64>,
    #[serde(default)]
    pub trailing_eps: Option<f64>,
    #[serde(default)]
    pub forward_eps: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_low: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_high: Option<f64>,

    #[serde(default)]
    pub total_debt: Option<f64>,
    #[serde(default)]
    pub cash: Option<f64>,
    #[serde(default)]
    pub total_equity: Option<f64>,
    #[serde(default)]
    pub total_assets: Option<f64>,
    #[serde(default)]
    pub total_liabilities: Option<f64>,

    /// Annual records, oldest first
    #[serde(default)]
    pub history: Vec<AnnualFinancials>,
}

impl FinancialsSnapshot {
    pub fn new(ticker: &str, currency: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            currency: currency.to_string(),
            ..Default::default()
        }
    }

    /// Reject snapshots carrying non-finite figures or out-of-order fiscal years.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.ticker.trim().is_empty() {
            return Err(ValuationError::InvalidData("snapshot has an empty ticker".to_string()));
        }

        let scalars = [
            ("price", self.price),
            ("trailing_eps", self.trailing_eps),
            ("forward_eps", self.forward_eps),
            ("fifty_two_week_low", self.fifty_two_week_low),
            ("fifty_two_week_high", self.fifty_two_week_high),
            ("total_debt", self.total_debt),
            ("cash", self.cash),
            ("total_equity", self.total_equity),
            ("total_assets", self.total_assets),
            ("total_liabilities", self.total_liabilities),
        ];
        for (field, value) in scalars {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ValuationError::InvalidData(format!(
                        "{}: {} is not a finite number",
                        self.ticker, field
                    )));
                }
            }
        }

        if let Some(price) = self.price {
            if price <= 0.0 {
                return Err(ValuationError::InvalidData(format!(
                    "{}: market price must be positive, got {}",
                    self.ticker, price
                )));
            }
        }

        for window in self.history.windows(2) {
            if window[1].fiscal_year <= window[0].fiscal_year {
                return Err(ValuationError::InvalidData(format!(
                    "{}: annual history must be strictly chronological ({} followed by {})",
                    self.ticker, window[0].fiscal_year, window[1].fiscal_year
                )));
            }
        }

        for year in &self.history {
            for (field, value) in year.fields() {
                if let Some(v) = value {
                    if !v.is_finite() {
                        return Err(ValuationError::InvalidData(format!(
                            "{}: {} for FY{} is not a finite number",
                            self.ticker, field, year.fiscal_year
                        )));
                    }
                }
            }
            if let Some(shares) = year.diluted_shares {
                if shares < 0.0 {
                    return Err(ValuationError::InvalidData(format!(
                        "{}: negative diluted share count for FY{}",
                        self.ticker, year.fiscal_year
                    )));
                }
            }
        }

        Ok(())
    }

    /// Most recent annual record
    pub fn latest(&self) -> Option<&AnnualFinancials> {
        self.history.last()
    }

    /// Annual record before the most recent one
    pub fn previous(&self) -> Option<&AnnualFinancials> {
        if self.history.len() < 2 {
            return None;
        }
        self.history.get(self.history.len() - 2)
    }

    /// Collect one line item across all years, keeping the unavailable markers.
    pub fn series(&self, accessor: fn(&AnnualFinancials) -> Option<f64>) -> Vec<Option<f64>> {
        self.history.iter().map(accessor).collect()
    }

    /// Most recent year in which `accessor` is available.
    pub fn latest_available(&self, accessor: fn(&AnnualFinancials) -> Option<f64>) -> Option<f64> {
        self.history.iter().rev().find_map(accessor)
    }

    pub fn shares(&self) -> Option<f64> {
        self.shares_outstanding.map(|s| s as f64)
    }

    pub fn market_cap(&self) -> Option<f64> {
        match (self.price, self.shares()) {
            (Some(price), Some(shares)) if shares > 0.0 => Some(price * shares),
            _ => None,
        }
    }

    pub fn net_debt_bridge(&self) -> NetDebtBridge {
        let mut assumed_zero = Vec::new();
        let total_debt = self.total_debt.unwrap_or_else(|| {
            assumed_zero.push("total_debt".to_string());
            0.0
        });
        let cash = self.cash.unwrap_or_else(|| {
            assumed_zero.push("cash".to_string());
            0.0
        });
        NetDebtBridge {
            total_debt,
            cash,
            assumed_zero,
        }
    }

    /// Market cap + total debt - cash
    pub fn enterprise_value(&self) -> Option<f64> {
        self.market_cap().map(|mc| mc + self.net_debt_bridge().net_debt())
    }

    /// Year-over-year revenue growth of the latest year, as a fraction.
    pub fn revenue_growth(&self) -> Option<f64> {
        let current = self.latest()?.revenue?;
        let prior = self.previous()?.revenue?;
        if prior > 0.0 {
            Some((current - prior) / prior)
        } else {
            None
        }
    }

    /// Trailing EPS, else latest net income over shares outstanding.
    pub fn eps(&self) -> Option<f64> {
        if let Some(eps) = self.trailing_eps {
            return Some(eps);
        }
        let net_income = self.latest()?.net_income?;
        let shares = self.shares()?;
        if shares > 0.0 {
            Some(net_income / shares)
        } else {
            None
        }
    }

    /// Book value of equity, falling back to assets - liabilities.
    pub fn book_value(&self) -> Option<f64> {
        self.total_equity.or_else(|| match (self.total_assets, self.total_liabilities) {
            (Some(assets), Some(liabilities)) => Some(assets - liabilities),
            _ => None,
        })
    }

    pub fn ebitda_margin(&self) -> Option<f64> {
        let latest = self.latest()?;
        match (latest.ebitda, latest.revenue) {
            (Some(ebitda), Some(revenue)) if revenue > 0.0 => Some(ebitda / revenue),
            _ => None,
        }
    }

    pub fn fcf_margin(&self) -> Option<f64> {
        let latest = self.latest()?;
        match (latest.free_cash_flow, latest.revenue) {
            (Some(fcf), Some(revenue)) if revenue > 0.0 => Some(fcf / revenue),
            _ => None,
        }
    }

    pub fn gross_margin(&self) -> Option<f64> {
        let latest = self.latest()?;
        match (latest.gross_profit, latest.revenue) {
            (Some(gross), Some(revenue)) if revenue > 0.0 => Some(gross / revenue),
            _ => None,
        }
    }

    pub fn net_margin(&self) -> Option<f64> {
        let latest = self.latest()?;
        match (latest.net_income, latest.revenue) {
            (Some(ni), Some(revenue)) if revenue > 0.0 => Some(ni / revenue),
            _ => None,
        }
    }

    /// Latest net income over book value; `None` unless book value is positive.
    pub fn return_on_equity(&self) -> Option<f64> {
        let ni = self.latest()?.net_income?;
        match self.book_value() {
            Some(book) if book > 0.0 => Some(ni / book),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ticker)
    }
}
