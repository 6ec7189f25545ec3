use anyhow::{Context, Result};
use comps_analysis::{CompsOptions, Multiple, PeerFilter};
use dcf_engine::{DcfAssumptions, MonteCarloConfig, SensitivityConfig};
use deal_scoring::{DealScoreConfig, PiotroskiThresholds};
use merger_analysis::DealStructure;
use serde::{Deserialize, Serialize};
use std::path::Path;
use valuation_core::FinancialsSnapshot;

/// Everything one CLI run reads from its input file. Only `target` is
/// required; assumption blocks fall back to the environment defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationInput {
    pub target: FinancialsSnapshot,
    /// Explicit peer set for comps
    #[serde(default)]
    pub peers: Vec<FinancialsSnapshot>,
    /// Peer universe screened with `peer_filter` when `peers` is empty
    #[serde(default)]
    pub candidates: Vec<FinancialsSnapshot>,
    #[serde(default)]
    pub peer_filter: PeerFilter,
    #[serde(default)]
    pub acquirer: Option<FinancialsSnapshot>,

    #[serde(default)]
    pub dcf: Option<DcfAssumptions>,
    #[serde(default)]
    pub sensitivity: Option<SensitivityConfig>,
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloConfig>,

    /// Empty means every multiple
    #[serde(default)]
    pub multiples: Vec<Multiple>,
    #[serde(default)]
    pub comps: CompsOptions,

    #[serde(default)]
    pub deal: DealStructure,

    #[serde(default)]
    pub deal_score: DealScoreConfig,
    #[serde(default)]
    pub piotroski: PiotroskiThresholds,
}

impl ValuationInput {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let input: ValuationInput = serde_json::from_str(raw)?;
        Ok(input)
    }

    /// Peers for comps and the football field: the explicit list, else the
    /// screened candidate universe.
    pub fn peer_set(&self) -> Vec<FinancialsSnapshot> {
        if !self.peers.is_empty() || self.candidates.is_empty() {
            return self.peers.clone();
        }
        let selected = comps_analysis::select_peers(&self.target, &self.candidates, &self.peer_filter);
        tracing::info!(
            "Selected {} of {} candidate peers for {}",
            selected.len(),
            self.candidates.len(),
            self.target.ticker
        );
        selected.into_iter().cloned().collect()
    }
}
