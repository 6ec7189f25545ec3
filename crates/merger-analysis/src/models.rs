use serde::{Deserialize, Serialize};
use valuation_core::ValuationError;

/// Tolerance on cash + stock consideration summing to one.
pub const CONSIDERATION_EPSILON: f64 = 1e-6;

/// Terms of a proposed acquisition. Rates and fractions are decimals (0.30 = 30%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealStructure {
    pub cash_fraction: f64,
    pub stock_fraction: f64,
    /// Offer premium over the target's current price
    pub premium: f64,
    /// Advisory and legal fees as a fraction of the purchase price
    pub fee_rate: f64,
    /// Annual run-rate cost synergies, currency units
    #[serde(default)]
    pub cost_synergies: f64,
    /// Annual run-rate revenue synergies, currency units
    #[serde(default)]
    pub revenue_synergies: f64,
    /// Fraction of run-rate newly realized in each year; empty means fully realized at close
    #[serde(default)]
    pub realization_schedule: Vec<f64>,
    pub synergy_discount_rate: f64,
    pub tax_rate: f64,
    /// Coupon on acquisition debt
    pub cost_of_debt: f64,
    /// Acquirer cash that must stay on the balance sheet
    #[serde(default)]
    pub minimum_cash_balance: f64,
    /// Extra diluted shares from convertible financing
    #[serde(default)]
    pub convertible_shares: f64,
    /// Acquirer shares repurchased alongside the deal
    #[serde(default)]
    pub share_buyback: f64,
}

impl Default for DealStructure {
    fn default() -> Self {
        Self {
            cash_fraction: 0.5,
            stock_fraction: 0.5,
            premium: 0.30,
            fee_rate: 0.02,
            cost_synergies: 0.0,
            revenue_synergies: 0.0,
            realization_schedule: Vec::new(),
            synergy_discount_rate: 0.10,
            tax_rate: 0.25,
            cost_of_debt: 0.05,
            minimum_cash_balance: 0.0,
            convertible_shares: 0.0,
            share_buyback: 0.0,
        }
    }
}

impl DealStructure {
    pub fn all_cash() -> Self {
        Self {
            cash_fraction: 1.0,
            stock_fraction: 0.0,
            ..Default::default()
        }
    }

    pub fn all_stock() -> Self {
        Self {
            cash_fraction: 0.0,
            stock_fraction: 1.0,
            ..Default::default()
        }
    }

    pub fn total_synergies(&self) -> f64 {
        self.cost_synergies + self.revenue_synergies
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        let invalid = |msg: String| Err(ValuationError::InvalidStructure(msg));

        let numbers = [
            ("cash_fraction", self.cash_fraction),
            ("stock_fraction", self.stock_fraction),
            ("premium", self.premium),
            ("fee_rate", self.fee_rate),
            ("cost_synergies", self.cost_synergies),
            ("revenue_synergies", self.revenue_synergies),
            ("synergy_discount_rate", self.synergy_discount_rate),
            ("tax_rate", self.tax_rate),
            ("cost_of_debt", self.cost_of_debt),
            ("minimum_cash_balance", self.minimum_cash_balance),
            ("convertible_shares", self.convertible_shares),
            ("share_buyback", self.share_buyback),
        ];
        if let Some((name, value)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{} must be a finite number, got {}", name, value));
        }

        if !(0.0..=1.0).contains(&self.cash_fraction) || !(0.0..=1.0).contains(&self.stock_fraction) {
            return invalid("consideration fractions must lie in [0, 1]".to_string());
        }
        let total = self.cash_fraction + self.stock_fraction;
        if (total - 1.0).abs() > CONSIDERATION_EPSILON {
            return invalid(format!(
                "cash ({:.4}) and stock ({:.4}) consideration must sum to 1, got {:.4}",
                self.cash_fraction, self.stock_fraction, total
            ));
        }

        if self.premium <= -1.0 {
            return invalid(format!("premium {:.4} must exceed -100%", self.premium));
        }
        if self.fee_rate < 0.0 || self.cost_of_debt < 0.0 {
            return invalid("fees and cost of debt cannot be negative".to_string());
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return invalid(format!("tax rate {:.4} must be in [0, 1)", self.tax_rate));
        }
        if self.synergy_discount_rate <= 0.0 {
            return invalid("synergy discount rate must be positive".to_string());
        }
        if self.minimum_cash_balance < 0.0 || self.convertible_shares < 0.0 || self.share_buyback < 0.0 {
            return invalid("cash floor, convertible shares and buyback cannot be negative".to_string());
        }

        if self
            .realization_schedule
            .iter()
            .any(|f| !f.is_finite() || !(0.0..=1.0).contains(f))
        {
            return invalid("each realization step must lie in [0, 1]".to_string());
        }
        let realized: f64 = self.realization_schedule.iter().sum();
        if realized > 1.0 + CONSIDERATION_EPSILON {
            return invalid(format!(
                "realization schedule sums to {:.4}, more than 100% of run-rate",
                realized
            ));
        }
        Ok(())
    }
}

/// Run-rate synergies sized from the target's own cost base and revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyEstimate {
    pub cost_synergies: f64,
    pub revenue_synergies: f64,
    /// Cost base the cost percentage was applied to
    pub cost_basis: f64,
    pub basis_is_fallback: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesAndUses {
    pub purchase_price: f64,
    pub transaction_fees: f64,
    pub total_uses: f64,
    /// Acquirer balance-sheet cash spent
    pub cash_from_balance_sheet: f64,
    pub new_debt: f64,
    /// Value of acquirer shares issued
    pub new_equity: f64,
    pub total_sources: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealTerms {
    pub offer_price_per_share: f64,
    pub purchase_price: f64,
    pub cash_consideration: f64,
    pub stock_consideration: f64,
    pub new_shares_issued: f64,
    pub acquirer_shares: f64,
    pub pro_forma_shares: f64,
}

/// What the offer implies the acquirer is paying for the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpliedDealMultiples {
    /// Purchase price + target net debt
    pub implied_enterprise_value: f64,
    pub ev_to_ebitda: Option<f64>,
    pub ev_to_revenue: Option<f64>,
    pub price_to_earnings: Option<f64>,
}

/// One period of the combined income statement. Combined lines are `None`
/// when either company lacks the figure for that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProFormaYear {
    pub acquirer_fiscal_year: i32,
    pub target_fiscal_year: i32,
    /// Cumulative share of run-rate synergies realized, 0-1
    pub synergy_realization: f64,
    pub realized_cost_synergies: f64,
    pub realized_revenue_synergies: f64,
    pub revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub ebit: Option<f64>,
    pub incremental_interest: f64,
    pub net_income: Option<f64>,
    pub standalone_eps: Option<f64>,
    pub pro_forma_eps: Option<f64>,
    pub accretion_dilution_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goodwill {
    pub purchase_price: f64,
    pub net_identifiable_assets: f64,
    /// Never negative
    pub goodwill: f64,
    pub bargain_purchase: bool,
    /// Net assets in excess of the purchase price; zero unless `bargain_purchase`
    pub bargain_purchase_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditMetrics {
    pub total_debt: f64,
    pub cash: f64,
    pub net_debt: f64,
    pub ebitda: Option<f64>,
    pub interest_expense: f64,
    /// Total debt / EBITDA
    pub leverage: Option<f64>,
    /// EBITDA / interest expense
    pub interest_coverage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationBridge {
    pub target_market_value: f64,
    pub premium_paid: f64,
    pub transaction_fees: f64,
    pub synergy_npv: f64,
    /// Synergy NPV less premium and fees
    pub value_created: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStepKind {
    Absolute,
    Relative,
    Total,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsBridgeStep {
    pub label: String,
    pub value: f64,
    pub kind: BridgeStepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergerResult {
    pub acquirer: String,
    pub target: String,
    pub terms: DealTerms,
    pub sources_and_uses: SourcesAndUses,
    pub implied_multiples: ImpliedDealMultiples,
    pub pro_forma: Vec<ProFormaYear>,
    /// Most recent period
    pub standalone_eps: Option<f64>,
    pub pro_forma_eps: Option<f64>,
    /// Positive is accretive
    pub accretion_dilution_pct: Option<f64>,
    pub goodwill: Goodwill,
    pub credit: CreditMetrics,
    pub valuation_bridge: ValuationBridge,
    pub eps_bridge: Vec<EpsBridgeStep>,
    pub currency_mismatch: bool,
    pub warnings: Vec<String>,
}

impl MergerResult {
    pub fn is_accretive(&self) -> Option<bool> {
        self.accretion_dilution_pct.map(|pct| pct > 0.0)
    }
}

/// Equity value range for one valuation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootballFieldBar {
    pub method: String,
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootballField {
    pub bars: Vec<FootballFieldBar>,
    /// Equity purchase price, drawn as a reference line
    pub offer_value: f64,
    /// Methods skipped for lack of data
    pub warnings: Vec<String>,
}
