use serde::{Deserialize, Serialize};

use crate::distributions::{FrequencyModel, SeverityModel};
use crate::error::{Result, RiskError};
use crate::types::RiskId;

/// One row of a risk register: what can go wrong, how often, how badly, and
/// how much of it the controls take off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDefinition {
    pub risk_id: RiskId,
    /// Reporting label only; the engine never reads it.
    pub category: String,
    pub description: String,
    pub frequency: FrequencyModel,
    pub severity: SeverityModel,
    /// Fraction of loss removed by controls, in [0, 1].
    pub control_effectiveness: f64,
    /// Multiplier applied after the control discount, in [0, 1].
    pub residual_factor: f64,
}

impl RiskDefinition {
    /// Build and validate. Uncontrolled by default: control_effectiveness 0,
    /// residual_factor 1.
    pub fn new(
        risk_id: impl Into<RiskId>,
        category: impl Into<String>,
        frequency: FrequencyModel,
        severity: SeverityModel,
    ) -> Result<Self> {
        let risk = RiskDefinition {
            risk_id: risk_id.into(),
            category: category.into(),
            description: String::new(),
            frequency,
            severity,
            control_effectiveness: 0.0,
            residual_factor: 1.0,
        };
        risk.validate()?;
        Ok(risk)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_controls(mut self, control_effectiveness: f64, residual_factor: f64) -> Result<Self> {
        self.control_effectiveness = control_effectiveness;
        self.residual_factor = residual_factor;
        self.validate()?;
        Ok(self)
    }

    /// `residual_factor × (1 − control_effectiveness)`, always in [0, 1] for a
    /// validated risk.
    pub fn effective_multiplier(&self) -> f64 {
        self.residual_factor * (1.0 - self.control_effectiveness)
    }

    /// Check every parameter. Errors carry this risk's id.
    pub fn validate(&self) -> Result<()> {
        self.validate_inner().map_err(|e| e.for_risk(&self.risk_id))
    }

    fn validate_inner(&self) -> Result<()> {
        self.frequency.validate()?;
        self.severity.validate()?;
        let ce = self.control_effectiveness;
        if !(0.0..=1.0).contains(&ce) {
            return Err(RiskError::parameter(
                "ControlEffectiveness",
                format!("must be in [0, 1], got {ce}"),
            ));
        }
        let rf = self.residual_factor;
        if !(0.0..=1.0).contains(&rf) {
            return Err(RiskError::parameter(
                "ResidualFactor",
                format!("must be in [0, 1], got {rf}"),
            ));
        }
        Ok(())
    }
}

/// Tabular register row as the I/O layer hands it over, keyed by the
/// register's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRow {
    #[serde(rename = "RiskID")]
    pub risk_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub frequency_model: String,
    pub freq_param1: f64,
    #[serde(default)]
    pub freq_param2: Option<f64>,
    pub severity_model: String,
    pub sev_param1: f64,
    pub sev_param2: f64,
    #[serde(default)]
    pub sev_param3: Option<f64>,
    #[serde(default)]
    pub control_effectiveness: Option<f64>,
    #[serde(default)]
    pub residual_factor: Option<f64>,
}

impl TryFrom<RegisterRow> for RiskDefinition {
    type Error = RiskError;

    fn try_from(row: RegisterRow) -> Result<Self> {
        let risk_id = RiskId(row.risk_id);
        let parsed = (|| {
            let frequency =
                FrequencyModel::from_params(&row.frequency_model, row.freq_param1, row.freq_param2)?;
            let severity = SeverityModel::from_params(
                &row.severity_model,
                row.sev_param1,
                row.sev_param2,
                row.sev_param3,
            )?;
            Ok::<_, RiskError>((frequency, severity))
        })();
        let (frequency, severity) = parsed.map_err(|e| e.for_risk(&risk_id))?;

        let risk = RiskDefinition {
            risk_id,
            category: row.category,
            description: row.description,
            frequency,
            severity,
            control_effectiveness: row.control_effectiveness.unwrap_or(0.0),
            residual_factor: row.residual_factor.unwrap_or(1.0),
        };
        risk.validate()?;
        Ok(risk)
    }
}

impl From<&RiskDefinition> for RegisterRow {
    fn from(risk: &RiskDefinition) -> Self {
        let (freq_param1, freq_param2) = match risk.frequency {
            FrequencyModel::Poisson { lambda } => (lambda, None),
            FrequencyModel::NegativeBinomial { r, p } => (r, Some(p)),
        };
        let (sev_param1, sev_param2, sev_param3) = match risk.severity {
            SeverityModel::Lognormal { mu, sigma } | SeverityModel::Normal { mu, sigma } => {
                (mu, sigma, None)
            }
            SeverityModel::Pert { min, mode, max } => (min, mode, Some(max)),
        };
        RegisterRow {
            risk_id: risk.risk_id.0.clone(),
            category: risk.category.clone(),
            description: risk.description.clone(),
            frequency_model: risk.frequency.name().to_string(),
            freq_param1,
            freq_param2,
            severity_model: risk.severity.name().to_string(),
            sev_param1,
            sev_param2,
            sev_param3,
            control_effectiveness: Some(risk.control_effectiveness),
            residual_factor: Some(risk.residual_factor),
        }
    }
}

/// Convert a whole register, failing on the first bad row.
pub fn from_rows(rows: Vec<RegisterRow>) -> Result<Vec<RiskDefinition>> {
    rows.into_iter().map(RiskDefinition::try_from).collect()
}
