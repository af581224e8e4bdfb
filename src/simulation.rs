//! Frequency/severity Monte Carlo for single risks and whole registers.
//!
//! Seed discipline: a portfolio run has one master seed. Each risk draws from
//! `ChaCha20Rng::seed_from_u64(master)` on stream `fnv1a(risk_id)`, so a risk's
//! losses depend only on (master seed, risk id, its own parameters). Reordering
//! the register or running risks in parallel changes nothing. Within a risk,
//! trial `i` draws its count and then its severities before trial `i + 1`, so
//! raising `n_sims` leaves earlier trials untouched.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::Distribution;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::distributions::{FrequencySampler, SeveritySampler};
use crate::error::{Result, RiskError};
use crate::register::RiskDefinition;
use crate::types::{LossVector, RiskId};

/// Simulated annual losses for one risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLosses {
    pub risk_id: RiskId,
    pub losses: LossVector,
}

/// Per-risk loss vectors plus their trial-wise sum.
///
/// Every vector has the same length and index `i` is the same simulated year
/// everywhere: `portfolio_loss[i]` is the left-to-right sum over the register
/// of each risk's trial `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioResult {
    seed: u64,
    n_sims: usize,
    by_risk: Vec<RiskLosses>,
    portfolio_loss: LossVector,
}

impl PortfolioResult {
    /// Master seed the run used (drawn from entropy when none was supplied).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_sims(&self) -> usize {
        self.n_sims
    }

    /// Per-risk losses in register order.
    pub fn by_risk(&self) -> &[RiskLosses] {
        &self.by_risk
    }

    pub fn portfolio_loss(&self) -> &LossVector {
        &self.portfolio_loss
    }

    pub fn get(&self, risk_id: &RiskId) -> Option<&LossVector> {
        self.by_risk.iter().find(|r| &r.risk_id == risk_id).map(|r| &r.losses)
    }

    pub fn risk_ids(&self) -> impl Iterator<Item = &RiskId> {
        self.by_risk.iter().map(|r| &r.risk_id)
    }
}

/// Simulate `n_sims` years of loss for one risk.
///
/// `seed = Some(s)` is bit-for-bit reproducible; `None` draws a seed from the
/// thread RNG.
pub fn simulate_annual_loss(
    risk: &RiskDefinition,
    n_sims: usize,
    seed: Option<u64>,
) -> Result<LossVector> {
    check_n_sims(n_sims)?;
    let samplers = RiskSamplers::new(risk)?;
    let mut rng = ChaCha20Rng::seed_from_u64(resolve_seed(seed));
    Ok(samplers.run(n_sims, &mut rng))
}

/// Simulate one risk from a caller-supplied RNG.
pub fn simulate_annual_loss_with_rng(
    risk: &RiskDefinition,
    n_sims: usize,
    rng: &mut impl Rng,
) -> Result<LossVector> {
    check_n_sims(n_sims)?;
    let samplers = RiskSamplers::new(risk)?;
    Ok(samplers.run(n_sims, rng))
}

/// Simulate every risk in `register` and sum them trial by trial.
///
/// All risks are validated before any sampling starts; one bad risk fails the
/// whole call.
pub fn simulate_portfolio(
    register: &[RiskDefinition],
    n_sims: usize,
    seed: Option<u64>,
) -> Result<PortfolioResult> {
    run_portfolio(register, n_sims, seed, false)
}

/// As [`simulate_portfolio`], with one rayon task per risk. Results are
/// identical to the serial run for the same seed.
pub fn simulate_portfolio_par(
    register: &[RiskDefinition],
    n_sims: usize,
    seed: Option<u64>,
) -> Result<PortfolioResult> {
    run_portfolio(register, n_sims, seed, true)
}

/// RNG for `risk_id` under master seed `seed`.
pub fn risk_stream(seed: u64, risk_id: &RiskId) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(risk_id.stream_key());
    rng
}

fn run_portfolio(
    register: &[RiskDefinition],
    n_sims: usize,
    seed: Option<u64>,
    parallel: bool,
) -> Result<PortfolioResult> {
    if register.is_empty() {
        return Err(RiskError::EmptyRegister);
    }
    check_n_sims(n_sims)?;

    let mut seen = HashSet::with_capacity(register.len());
    let mut prepared = Vec::with_capacity(register.len());
    for risk in register {
        if !seen.insert(&risk.risk_id) {
            return Err(RiskError::parameter("RiskID", "is duplicated in the register")
                .for_risk(&risk.risk_id));
        }
        prepared.push((&risk.risk_id, RiskSamplers::new(risk)?));
    }

    let seed = resolve_seed(seed);
    info!(risks = register.len(), n_sims, seed, parallel, "simulating portfolio");

    let simulate = |(risk_id, samplers): &(&RiskId, RiskSamplers)| {
        debug!(risk_id = %risk_id, stream = risk_id.stream_key(), "simulating risk");
        let mut rng = risk_stream(seed, risk_id);
        RiskLosses { risk_id: (*risk_id).clone(), losses: samplers.run(n_sims, &mut rng) }
    };
    let by_risk: Vec<RiskLosses> = if parallel {
        prepared.par_iter().map(simulate).collect()
    } else {
        prepared.iter().map(simulate).collect()
    };

    let mut total = vec![0.0; n_sims];
    for risk in &by_risk {
        for (acc, x) in total.iter_mut().zip(risk.losses.iter()) {
            *acc += x;
        }
    }

    Ok(PortfolioResult { seed, n_sims, by_risk, portfolio_loss: total.into() })
}

/// Validated samplers plus the control multiplier for one risk.
#[derive(Debug, Clone, Copy)]
struct RiskSamplers {
    frequency: FrequencySampler,
    severity: SeveritySampler,
    multiplier: f64,
}

impl RiskSamplers {
    fn new(risk: &RiskDefinition) -> Result<Self> {
        risk.validate()?;
        let for_risk = |e: RiskError| e.for_risk(&risk.risk_id);
        Ok(RiskSamplers {
            frequency: risk.frequency.sampler().map_err(for_risk)?,
            severity: risk.severity.sampler().map_err(for_risk)?,
            multiplier: risk.effective_multiplier(),
        })
    }

    fn run(&self, n_sims: usize, rng: &mut impl Rng) -> LossVector {
        // Fully mitigated. Multiplying instead would turn an overflowed draw
        // (`inf × 0`) into NaN.
        if self.multiplier == 0.0 {
            return vec![0.0; n_sims].into();
        }
        (0..n_sims)
            .map(|_| {
                let k = self.frequency.sample(rng);
                if k == 0 {
                    return 0.0;
                }
                let raw: f64 = (0..k).map(|_| self.severity.sample(rng)).sum();
                raw * self.multiplier
            })
            .collect()
    }
}

fn check_n_sims(n_sims: usize) -> Result<()> {
    if n_sims == 0 {
        return Err(RiskError::parameter("n_sims", "must be > 0, got 0"));
    }
    Ok(())
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let drawn: u64 = rand::rng().random();
        debug!(seed = drawn, "no seed supplied, drew one from the thread rng");
        drawn
    })
}
