use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::distributions::{FrequencyModel, SeverityModel};
use crate::error::Result;
use crate::quantify::Scenario;
use crate::register::{RegisterRow, RiskDefinition, from_rows};
use crate::types::RiskId;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_SIMS: usize = 50_000;

pub struct SimulationConfig {
    /// `None` draws a fresh master seed per run.
    pub seed: Option<u64>,
    pub n_sims: usize,
    pub register: Vec<RiskDefinition>,
    pub scenarios: Vec<Scenario>,
}

/// On-disk layout. Every field but `register` may be omitted; an explicit
/// `"seed": null` requests a random seed.
#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default = "default_seed")]
    seed: Option<u64>,
    #[serde(default = "default_n_sims")]
    n_sims: usize,
    register: Vec<RegisterRow>,
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

fn default_seed() -> Option<u64> {
    Some(DEFAULT_SEED)
}

fn default_n_sims() -> usize {
    DEFAULT_N_SIMS
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Ok(SimulationConfig {
            seed: file.seed,
            n_sims: file.n_sims,
            register: from_rows(file.register)?,
            scenarios: file.scenarios,
        })
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn canonical() -> Self {
        // ── Risk register ─────────────────────────────────────────────────────
        // Monetary values in currency units per event; frequencies per year.
        let risk = |id: &str, category: &str, description: &str, frequency, severity, ce, rf| {
            RiskDefinition {
                risk_id: RiskId::from(id),
                category: category.to_string(),
                description: description.to_string(),
                frequency,
                severity,
                control_effectiveness: ce,
                residual_factor: rf,
            }
        };

        SimulationConfig {
            seed: Some(DEFAULT_SEED),
            n_sims: DEFAULT_N_SIMS,
            register: vec![
                // Frequent, moderate: phishing-led account takeover.
                risk(
                    "R01",
                    "Cyber",
                    "Credential compromise",
                    FrequencyModel::Poisson { lambda: 2.0 },
                    SeverityModel::Lognormal { mu: 12.0, sigma: 0.8 },
                    0.3,
                    0.7,
                ),
                // Rare, severe: multi-day outage of a core platform.
                risk(
                    "R02",
                    "Operational",
                    "Critical system outage",
                    FrequencyModel::Poisson { lambda: 0.3 },
                    SeverityModel::Lognormal { mu: 13.5, sigma: 1.2 },
                    0.2,
                    0.9,
                ),
                // Overdispersed count: vendor failures cluster.
                risk(
                    "R03",
                    "Third Party",
                    "Supplier delivery failure",
                    FrequencyModel::NegativeBinomial { r: 3.0, p: 0.5 },
                    SeverityModel::Pert { min: 50_000.0, mode: 100_000.0, max: 300_000.0 },
                    0.0,
                    1.0,
                ),
                risk(
                    "R04",
                    "Compliance",
                    "Regulatory reporting breach",
                    FrequencyModel::Poisson { lambda: 0.5 },
                    SeverityModel::Normal { mu: 200_000.0, sigma: 50_000.0 },
                    0.5,
                    0.8,
                ),
                risk(
                    "R05",
                    "People",
                    "Key person departure",
                    FrequencyModel::Poisson { lambda: 1.0 },
                    SeverityModel::Pert { min: 20_000.0, mode: 60_000.0, max: 250_000.0 },
                    0.1,
                    1.0,
                ),
            ],
            // ── Scenarios ─────────────────────────────────────────────────────
            scenarios: Vec::new(),
        }
    }
}
