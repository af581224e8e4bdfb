//! Error taxonomy for the simulation engine.

use thiserror::Error;

use crate::types::RiskId;

pub type Result<T> = std::result::Result<T, RiskError>;

/// Which side of the frequency/severity pair a model name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Frequency,
    Severity,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Frequency => write!(f, "frequency"),
            ModelKind::Severity => write!(f, "severity"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RiskError {
    /// Out-of-domain numeric parameter. Raised at validation time, never mid-simulation.
    #[error("{}{param} {message}", risk_prefix(.risk_id))]
    Parameter {
        risk_id: Option<RiskId>,
        param: &'static str,
        message: String,
    },

    /// Unrecognised distribution name.
    #[error("{}unknown {kind} model {name:?}", risk_prefix(.risk_id))]
    Model {
        risk_id: Option<RiskId>,
        kind: ModelKind,
        name: String,
    },

    #[error("risk register is empty")]
    EmptyRegister,

    #[error("{what} is empty")]
    EmptyData { what: &'static str },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn risk_prefix(risk_id: &Option<RiskId>) -> String {
    match risk_id {
        Some(id) => format!("Risk {id}: "),
        None => String::new(),
    }
}

impl RiskError {
    pub fn parameter(param: &'static str, message: impl Into<String>) -> Self {
        RiskError::Parameter { risk_id: None, param, message: message.into() }
    }

    /// Attach the offending risk id to parameter and model errors that lack one.
    pub fn for_risk(self, id: &RiskId) -> Self {
        match self {
            RiskError::Parameter { risk_id: None, param, message } => {
                RiskError::Parameter { risk_id: Some(id.clone()), param, message }
            }
            RiskError::Model { risk_id: None, kind, name } => {
                RiskError::Model { risk_id: Some(id.clone()), kind, name }
            }
            other => other,
        }
    }
}
