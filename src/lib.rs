//! Monte Carlo loss simulation for enterprise risk registers.
//!
//! Each risk is a frequency/severity pair with a control discount. The engine
//! simulates annual loss per risk, sums risks trial by trial into a portfolio,
//! and reports tail metrics and loss exceedance curves over the result.

pub mod config;
pub mod distributions;
pub mod error;
pub mod lec;
pub mod metrics;
pub mod quantify;
pub mod register;
pub mod simulation;
pub mod types;

pub use error::{Result, RiskError};
pub use register::RiskDefinition;
pub use simulation::{PortfolioResult, simulate_annual_loss, simulate_portfolio, simulate_portfolio_par};
pub use types::{LossVector, RiskId};
