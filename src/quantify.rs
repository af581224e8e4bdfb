//! Quantified register: each risk definition alongside its simulated
//! statistics, exposure rankings, and what-if scenario comparison.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::distributions::{FrequencyModel, SeverityModel};
use crate::error::{Result, RiskError};
use crate::metrics::{MetricsSummary, summary};
use crate::register::RiskDefinition;
use crate::simulation::{PortfolioResult, simulate_portfolio};
use crate::types::RiskId;

/// Id of the synthetic aggregate row appended to every quantified register.
pub const PORTFOLIO_TOTAL: &str = "PORTFOLIO_TOTAL";
pub const PORTFOLIO_CATEGORY: &str = "Portfolio";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantifiedRow {
    pub risk_id: RiskId,
    pub category: String,
    /// `None` on the portfolio row.
    pub definition: Option<RiskDefinition>,
    pub stats: MetricsSummary,
}

impl QuantifiedRow {
    pub fn is_portfolio(&self) -> bool {
        self.definition.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantifiedRegister {
    pub seed: u64,
    pub n_sims: usize,
    /// Register order, portfolio row last.
    pub rows: Vec<QuantifiedRow>,
}

impl QuantifiedRegister {
    pub fn risks(&self) -> impl Iterator<Item = &QuantifiedRow> {
        self.rows.iter().filter(|r| !r.is_portfolio())
    }

    pub fn portfolio(&self) -> Option<&QuantifiedRow> {
        self.rows.iter().find(|r| r.is_portfolio())
    }
}

/// Simulate `register` and attach statistics to each row.
pub fn quantify_register(
    register: &[RiskDefinition],
    n_sims: usize,
    seed: Option<u64>,
) -> Result<QuantifiedRegister> {
    let result = simulate_portfolio(register, n_sims, seed)?;
    quantify_result(register, &result)
}

/// Build the quantified register from an existing simulation of `register`.
pub fn quantify_result(register: &[RiskDefinition], result: &PortfolioResult) -> Result<QuantifiedRegister> {
    let mut rows = Vec::with_capacity(register.len() + 1);
    for risk in register {
        let losses = result.get(&risk.risk_id).ok_or_else(|| {
            RiskError::parameter("result", "has no simulated losses for this risk").for_risk(&risk.risk_id)
        })?;
        rows.push(QuantifiedRow {
            risk_id: risk.risk_id.clone(),
            category: risk.category.clone(),
            definition: Some(risk.clone()),
            stats: summary(losses)?,
        });
    }
    rows.push(QuantifiedRow {
        risk_id: RiskId::from(PORTFOLIO_TOTAL),
        category: PORTFOLIO_CATEGORY.to_string(),
        definition: None,
        stats: summary(result.portfolio_loss())?,
    });
    Ok(QuantifiedRegister { seed: result.seed(), n_sims: result.n_sims(), rows })
}

/// Statistic used to rank exposures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureMetric {
    Mean,
    Median,
    P90,
    Var95,
    Var99,
    Tvar95,
    Tvar99,
}

impl ExposureMetric {
    pub fn value(self, stats: &MetricsSummary) -> f64 {
        match self {
            ExposureMetric::Mean => stats.mean,
            ExposureMetric::Median => stats.median,
            ExposureMetric::P90 => stats.p90,
            ExposureMetric::Var95 => stats.var_95,
            ExposureMetric::Var99 => stats.var_99,
            ExposureMetric::Tvar95 => stats.tvar_95,
            ExposureMetric::Tvar99 => stats.tvar_99,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExposureMetric::Mean => "SimMean",
            ExposureMetric::Median => "SimMedian",
            ExposureMetric::P90 => "SimP90",
            ExposureMetric::Var95 => "SimVaR95",
            ExposureMetric::Var99 => "SimVaR99",
            ExposureMetric::Tvar95 => "SimTVaR95",
            ExposureMetric::Tvar99 => "SimTVaR99",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposureRow {
    pub rank: usize,
    pub risk_id: RiskId,
    pub category: String,
    pub value: f64,
    /// `value` as a percentage of the portfolio row's value for the same metric.
    pub pct_of_total: f64,
}

/// Largest `top_n` risks by `metric`. Ties keep register order.
pub fn top_exposures(
    quantified: &QuantifiedRegister,
    metric: ExposureMetric,
    top_n: usize,
) -> Result<Vec<ExposureRow>> {
    let total = quantified
        .portfolio()
        .map(|p| metric.value(&p.stats))
        .ok_or(RiskError::EmptyData { what: "portfolio row" })?;

    let mut rows: Vec<ExposureRow> = quantified
        .risks()
        .map(|r| {
            let value = metric.value(&r.stats);
            ExposureRow {
                rank: 0,
                risk_id: r.risk_id.clone(),
                category: r.category.clone(),
                value,
                pct_of_total: if total > 0.0 { value / total * 100.0 } else { 0.0 },
            }
        })
        .collect();
    rows.sort_by(|a, b| b.value.total_cmp(&a.value));
    rows.truncate(top_n);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    Ok(rows)
}

/// Replacement parameters for one risk. Unset fields keep the register value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskOverride {
    pub risk_id: RiskId,
    #[serde(default)]
    pub frequency: Option<FrequencyModel>,
    #[serde(default)]
    pub severity: Option<SeverityModel>,
    #[serde(default)]
    pub control_effectiveness: Option<f64>,
    #[serde(default)]
    pub residual_factor: Option<f64>,
}

impl RiskOverride {
    pub fn new(risk_id: impl Into<RiskId>) -> Self {
        RiskOverride { risk_id: risk_id.into(), ..Default::default() }
    }

    pub fn frequency(mut self, model: FrequencyModel) -> Self {
        self.frequency = Some(model);
        self
    }

    pub fn severity(mut self, model: SeverityModel) -> Self {
        self.severity = Some(model);
        self
    }

    pub fn controls(mut self, control_effectiveness: f64, residual_factor: f64) -> Self {
        self.control_effectiveness = Some(control_effectiveness);
        self.residual_factor = Some(residual_factor);
        self
    }

    fn apply(&self, risk: &mut RiskDefinition) {
        if let Some(f) = self.frequency {
            risk.frequency = f;
        }
        if let Some(s) = self.severity {
            risk.severity = s;
        }
        if let Some(ce) = self.control_effectiveness {
            risk.control_effectiveness = ce;
        }
        if let Some(rf) = self.residual_factor {
            risk.residual_factor = rf;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub overrides: Vec<RiskOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub mean: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub tvar_95: f64,
    pub tvar_99: f64,
}

impl ScenarioResult {
    fn new(name: impl Into<String>, stats: &MetricsSummary) -> Self {
        ScenarioResult {
            name: name.into(),
            mean: stats.mean,
            var_95: stats.var_95,
            var_99: stats.var_99,
            tvar_95: stats.tvar_95,
            tvar_99: stats.tvar_99,
        }
    }
}

/// Portfolio metrics for the unmodified register ("Base") and for each
/// scenario, all simulated under the same master seed.
///
/// Every scenario's overrides are applied and validated before anything is
/// simulated. Because each risk draws from its own stream, a risk with no
/// override produces the same losses in every scenario.
pub fn compare_scenarios(
    register: &[RiskDefinition],
    scenarios: &[Scenario],
    n_sims: usize,
    seed: Option<u64>,
) -> Result<Vec<ScenarioResult>> {
    let mut variants = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let mut modified = register.to_vec();
        for o in &scenario.overrides {
            let risk = modified.iter_mut().find(|r| r.risk_id == o.risk_id).ok_or_else(|| {
                RiskError::parameter("RiskID", format!("has no match in the register (scenario {:?})", scenario.name))
                    .for_risk(&o.risk_id)
            })?;
            o.apply(risk);
            risk.validate()?;
        }
        variants.push((scenario.name.as_str(), modified));
    }

    let base = simulate_portfolio(register, n_sims, seed)?;
    let seed = base.seed();
    let mut out = Vec::with_capacity(scenarios.len() + 1);
    out.push(ScenarioResult::new("Base", &summary(base.portfolio_loss())?));
    for (name, modified) in variants {
        info!(scenario = name, seed, "simulating scenario");
        let result = simulate_portfolio(&modified, n_sims, Some(seed))?;
        out.push(ScenarioResult::new(name, &summary(result.portfolio_loss())?));
    }
    Ok(out)
}
