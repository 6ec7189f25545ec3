use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Trading multiples the comps engine knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Multiple {
    EvToEbitda,
    EvToRevenue,
    PriceToEarnings,
    Peg,
    PriceToBook,
    PriceToSales,
}

impl Multiple {
    pub fn all() -> Vec<Multiple> {
        vec![
            Multiple::EvToEbitda,
            Multiple::EvToRevenue,
            Multiple::PriceToEarnings,
            Multiple::Peg,
            Multiple::PriceToBook,
            Multiple::PriceToSales,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Multiple::EvToEbitda => "EV/EBITDA",
            Multiple::EvToRevenue => "EV/Revenue",
            Multiple::PriceToEarnings => "P/E",
            Multiple::Peg => "PEG",
            Multiple::PriceToBook => "P/B",
            Multiple::PriceToSales => "P/S",
        }
    }

    /// Numerator is enterprise value rather than market value
    pub fn is_enterprise(&self) -> bool {
        matches!(self, Multiple::EvToEbitda | Multiple::EvToRevenue)
    }

    /// Multiple is quoted per share (price over a per-share figure)
    pub fn is_per_share(&self) -> bool {
        matches!(self, Multiple::PriceToEarnings | Multiple::Peg)
    }
}

/// Margin used for the Rule of 40
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBasis {
    Ebitda,
    FreeCashFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompsOptions {
    /// Target is a software/SaaS business; enables the Rule of 40
    pub saas: bool,
    pub rule_of_40_basis: MarginBasis,
}

impl Default for CompsOptions {
    fn default() -> Self {
        Self {
            saas: false,
            rule_of_40_basis: MarginBasis::Ebitda,
        }
    }
}

/// Market-cap band and size limit applied when picking peers from a candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerFilter {
    /// Lower bound as a multiple of the target's market cap
    pub min_market_cap_ratio: f64,
    /// Upper bound as a multiple of the target's market cap
    pub max_market_cap_ratio: f64,
    pub max_peers: usize,
    /// Keep only candidates in the target's sector
    pub same_sector: bool,
}

impl Default for PeerFilter {
    fn default() -> Self {
        Self {
            min_market_cap_ratio: 0.2,
            max_market_cap_ratio: 5.0,
            max_peers: 10,
            same_sector: false,
        }
    }
}

/// One line of the comps table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompsRow {
    pub ticker: String,
    pub name: String,
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub revenue: Option<f64>,
    pub ebitda: Option<f64>,
    /// YoY, fraction
    pub revenue_growth: Option<f64>,
    /// Fraction
    pub ebitda_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub net_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    /// Total debt over latest EBITDA; `None` when EBITDA is not positive
    pub debt_to_ebitda: Option<f64>,
    /// Revenue growth % plus EBITDA margin %
    pub rule_of_40: Option<f64>,
    /// `None` where the multiple is not meaningful for this company
    pub multiples: BTreeMap<Multiple, Option<f64>>,
}

impl CompsRow {
    pub fn multiple(&self, multiple: Multiple) -> Option<f64> {
        self.multiples.get(&multiple).copied().flatten()
    }

    pub fn metric(&self, metric: OperatingMetric) -> Option<f64> {
        match metric {
            OperatingMetric::MarketCap => self.market_cap,
            OperatingMetric::EnterpriseValue => self.enterprise_value,
            OperatingMetric::Revenue => self.revenue,
            OperatingMetric::Ebitda => self.ebitda,
            OperatingMetric::RevenueGrowth => self.revenue_growth,
            OperatingMetric::EbitdaMargin => self.ebitda_margin,
            OperatingMetric::RuleOf40 => self.rule_of_40,
        }
    }
}

/// Size and operating columns of the comps table summarised across peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperatingMetric {
    MarketCap,
    EnterpriseValue,
    Revenue,
    Ebitda,
    RevenueGrowth,
    EbitdaMargin,
    RuleOf40,
}

impl OperatingMetric {
    pub fn all() -> [OperatingMetric; 7] {
        [
            OperatingMetric::MarketCap,
            OperatingMetric::EnterpriseValue,
            OperatingMetric::Revenue,
            OperatingMetric::Ebitda,
            OperatingMetric::RevenueGrowth,
            OperatingMetric::EbitdaMargin,
            OperatingMetric::RuleOf40,
        ]
    }
}

/// Peer median and mean of one operating metric, over peers reporting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: OperatingMetric,
    pub count: usize,
    pub median: Option<f64>,
    pub mean: Option<f64>,
}

/// Peer statistics for one multiple. Figures are `None` when fewer than two
/// peers carry a valid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatistics {
    pub multiple: Multiple,
    /// Peers with a valid value
    pub count: usize,
    pub median: Option<f64>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileRank {
    pub multiple: Multiple,
    pub target_value: Option<f64>,
    /// 0-100, inclusive of ties
    pub rank: Option<f64>,
}

/// Target value implied by applying one peer median multiple to the target's own base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedValuation {
    pub multiple: Multiple,
    pub peer_median: f64,
    /// Target figure the median was applied to (EBITDA, revenue, EPS, ...)
    pub target_base: f64,
    pub implied_enterprise_value: Option<f64>,
    pub implied_equity_value: Option<f64>,
    pub implied_share_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedRange {
    pub low: f64,
    pub median: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOf40 {
    pub revenue_growth_pct: f64,
    pub margin_pct: f64,
    pub basis: MarginBasis,
    pub score: f64,
}

impl RuleOf40 {
    pub fn passes(&self) -> bool {
        self.score >= 40.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompsResult {
    pub target: CompsRow,
    pub peers: Vec<CompsRow>,
    pub multiples: Vec<Multiple>,
    pub statistics: BTreeMap<Multiple, PeerStatistics>,
    pub percentile_ranks: BTreeMap<Multiple, PercentileRank>,
    pub implied: Vec<ImpliedValuation>,
    /// Low / median / high across implied share prices
    pub implied_price_range: Option<ImpliedRange>,
    pub rule_of_40: Option<RuleOf40>,
    /// "Peer Median" / "Peer Mean" rows for the operating columns
    pub peer_summary: BTreeMap<OperatingMetric, MetricSummary>,
    pub warnings: Vec<String>,
}

impl CompsResult {
    pub fn median(&self, multiple: Multiple) -> Option<f64> {
        self.statistics.get(&multiple).and_then(|s| s.median)
    }

    pub fn rank(&self, multiple: Multiple) -> Option<f64> {
        self.percentile_ranks.get(&multiple).and_then(|r| r.rank)
    }

    pub fn peer_median(&self, metric: OperatingMetric) -> Option<f64> {
        self.peer_summary.get(&metric).and_then(|s| s.median)
    }

    pub fn peer_mean(&self, metric: OperatingMetric) -> Option<f64> {
        self.peer_summary.get(&metric).and_then(|s| s.mean)
    }

    pub fn implied_for(&self, multiple: Multiple) -> Option<&ImpliedValuation> {
        self.implied.iter().find(|v| v.multiple == multiple)
    }
}
