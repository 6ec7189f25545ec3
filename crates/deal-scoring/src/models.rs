use serde::{Deserialize, Serialize};
use valuation_core::ValuationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Grade a value against descending A/B/C cut-offs; anything lower is D.
    pub fn from_thresholds(value: f64, a: f64, b: f64, c: f64) -> Self {
        match value {
            v if v >= a => Grade::A,
            v if v >= b => Grade::B,
            v if v >= c => Grade::C,
            _ => Grade::D,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

/// Reference ranges and weights for the Deal Score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealScoreConfig {
    /// P/E at or below `pe_min` scores 100, at or above `pe_max` scores 0
    pub pe_min: f64,
    pub pe_max: f64,
    /// Debt/equity at or below `de_min` scores 100
    pub de_min: f64,
    pub de_max: f64,
    /// YoY revenue growth (fraction) clipped to this range, then mapped directly
    pub growth_min: f64,
    pub growth_max: f64,
    pub valuation_weight: f64,
    pub solvency_weight: f64,
    pub growth_weight: f64,
    /// Score cut-offs for grades A, B and C
    pub grade_a: f64,
    pub grade_b: f64,
    pub grade_c: f64,
}

impl Default for DealScoreConfig {
    fn default() -> Self {
        Self {
            pe_min: 5.0,
            pe_max: 40.0,
            de_min: 0.0,
            de_max: 3.0,
            growth_min: -0.10,
            growth_max: 0.30,
            valuation_weight: 0.4,
            solvency_weight: 0.3,
            growth_weight: 0.3,
            grade_a: 80.0,
            grade_b: 60.0,
            grade_c: 40.0,
        }
    }
}

impl DealScoreConfig {
    pub fn validate(&self) -> Result<(), ValuationError> {
        let weights = [self.valuation_weight, self.solvency_weight, self.growth_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ValuationError::InvalidAssumptions(
                "Deal Score weights must be non-negative".to_string(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ValuationError::InvalidAssumptions(format!(
                "Deal Score weights must sum to 1, got {:.4}",
                total
            )));
        }
        for (name, low, high) in [
            ("P/E", self.pe_min, self.pe_max),
            ("debt/equity", self.de_min, self.de_max),
            ("growth", self.growth_min, self.growth_max),
        ] {
            if !(low.is_finite() && high.is_finite() && high > low) {
                return Err(ValuationError::InvalidAssumptions(format!(
                    "{} reference range [{}, {}] is empty",
                    name, low, high
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Valuation,
    Solvency,
    Growth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub component: ScoreComponent,
    /// Raw ratio the sub-score was mapped from (P/E, D/E or growth)
    pub input: Option<f64>,
    /// 0-100; `None` when the input is unavailable
    pub score: Option<f64>,
    /// Inputs were reported but the ratio has no meaningful reading
    /// (earnings or equity at or below zero); scored as 0, not dropped
    #[serde(default)]
    pub distressed: bool,
    pub configured_weight: f64,
    /// Weight after renormalising over available sub-scores
    pub effective_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealScore {
    pub ticker: String,
    /// 1-100
    pub score: u8,
    pub grade: Grade,
    pub components: Vec<SubScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Pass,
    Fail,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiotroskiCheck {
    PositiveNetIncome,
    PositiveOperatingCashFlow,
    ReturnOnAssetsImproving,
    CashFlowExceedsNetIncome,
    LeverageDecreasing,
    CurrentRatioImproving,
    NoShareDilution,
    GrossMarginImproving,
    AssetTurnoverImproving,
}

impl PiotroskiCheck {
    pub fn all() -> [PiotroskiCheck; 9] {
        [
            PiotroskiCheck::PositiveNetIncome,
            PiotroskiCheck::PositiveOperatingCashFlow,
            PiotroskiCheck::ReturnOnAssetsImproving,
            PiotroskiCheck::CashFlowExceedsNetIncome,
            PiotroskiCheck::LeverageDecreasing,
            PiotroskiCheck::CurrentRatioImproving,
            PiotroskiCheck::NoShareDilution,
            PiotroskiCheck::GrossMarginImproving,
            PiotroskiCheck::AssetTurnoverImproving,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiotroskiTest {
    pub check: PiotroskiCheck,
    pub outcome: TestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiotroskiThresholds {
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

impl Default for PiotroskiThresholds {
    fn default() -> Self {
        Self { a: 7, b: 5, c: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiotroskiGrade {
    pub ticker: String,
    /// Tests passed, out of nine
    pub score: usize,
    /// Tests with enough data to evaluate
    pub evaluated: usize,
    pub grade: Grade,
    pub tests: Vec<PiotroskiTest>,
}

impl PiotroskiGrade {
    pub fn outcome(&self, check: PiotroskiCheck) -> TestOutcome {
        self.tests
            .iter()
            .find(|t| t.check == check)
            .map_or(TestOutcome::Unavailable, |t| t.outcome)
    }
}
