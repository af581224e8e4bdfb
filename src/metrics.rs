//! Summary statistics and tail-risk measures over simulated loss vectors.
//!
//! Percentiles use linear interpolation between order statistics
//! (`h = q·(n−1)`), so VaR at confidence `q` is exactly the `q` percentile.

use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::register::RiskDefinition;
use crate::simulation::{PortfolioResult, RiskLosses};
use crate::types::RiskId;

/// Snapshot of a loss distribution. `std` is the population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub tvar_95: f64,
    pub tvar_99: f64,
}

/// Sorted copy of a loss vector, reused across several percentile lookups.
struct Sorted(Vec<f64>);

impl Sorted {
    fn new(losses: &[f64]) -> Result<Self> {
        check_losses(losses)?;
        let mut v = losses.to_vec();
        v.sort_by(f64::total_cmp);
        Ok(Sorted(v))
    }

    fn percentile(&self, q: f64) -> f64 {
        let values = &self.0;
        let n = values.len();
        let h = q * (n - 1) as f64;
        let lo = (h.floor() as usize).min(n - 1);
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        let (a, b) = (values[lo], values[hi]);
        (a + (b - a) * frac).clamp(a, b)
    }

    /// Mean of every value at or above `threshold`.
    fn tail_mean(&self, threshold: f64) -> f64 {
        let values = &self.0;
        let start = values.partition_point(|&x| x < threshold);
        let tail = &values[start..];
        if tail.is_empty() {
            return threshold;
        }
        let mean = tail.iter().sum::<f64>() / tail.len() as f64;
        // Never below the threshold, even after rounding in the sum.
        mean.max(threshold)
    }

    fn var(&self, confidence: f64) -> f64 {
        self.percentile(confidence)
    }

    fn tvar(&self, confidence: f64) -> f64 {
        self.tail_mean(self.var(confidence))
    }
}

/// Non-empty and every element finite. A NaN or infinite loss is an upstream
/// fault and must not reach sorting or interpolation.
pub(crate) fn check_losses(losses: &[f64]) -> Result<()> {
    if losses.is_empty() {
        return Err(RiskError::EmptyData { what: "loss vector" });
    }
    if let Some((trial, x)) = losses.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        return Err(RiskError::parameter(
            "losses",
            format!("must be finite, got {x} at trial {trial}"),
        ));
    }
    Ok(())
}

fn check_confidence(confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(RiskError::parameter(
            "confidence",
            format!("must be in (0, 1), got {confidence}"),
        ));
    }
    Ok(())
}

fn check_probability(p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(RiskError::parameter("probability", format!("must be in [0, 1], got {p}")));
    }
    Ok(())
}

fn mean_of(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_of(xs: &[f64], mean: f64) -> f64 {
    (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// The `q` percentile, `q` in [0, 1].
pub fn percentile(losses: &[f64], q: f64) -> Result<f64> {
    check_probability(q)?;
    Ok(Sorted::new(losses)?.percentile(q))
}

/// Percentile at each requested probability, in request order.
pub fn percentiles(losses: &[f64], probs: &[f64]) -> Result<Vec<(f64, f64)>> {
    for &p in probs {
        check_probability(p)?;
    }
    let sorted = Sorted::new(losses)?;
    Ok(probs.iter().map(|&p| (p, sorted.percentile(p))).collect())
}

pub fn expected_loss(losses: &[f64]) -> Result<f64> {
    check_losses(losses)?;
    Ok(mean_of(losses))
}

/// Value at Risk: the `confidence` percentile of losses.
pub fn var(losses: &[f64], confidence: f64) -> Result<f64> {
    check_confidence(confidence)?;
    Ok(Sorted::new(losses)?.var(confidence))
}

/// Tail VaR (expected shortfall): mean of all losses at or above VaR.
pub fn tvar(losses: &[f64], confidence: f64) -> Result<f64> {
    check_confidence(confidence)?;
    Ok(Sorted::new(losses)?.tvar(confidence))
}

pub fn summary(losses: &[f64]) -> Result<MetricsSummary> {
    let sorted = Sorted::new(losses)?;
    let mean = mean_of(losses);
    let p95 = sorted.percentile(0.95);
    let p99 = sorted.percentile(0.99);
    Ok(MetricsSummary {
        n: losses.len(),
        mean,
        median: sorted.percentile(0.50),
        std: std_of(losses, mean),
        min: sorted.0[0],
        max: sorted.0[sorted.0.len() - 1],
        p50: sorted.percentile(0.50),
        p90: sorted.percentile(0.90),
        p95,
        p99,
        var_95: p95,
        var_99: p99,
        tvar_95: sorted.tail_mean(p95),
        tvar_99: sorted.tail_mean(p99),
    })
}

/// Summary for the portfolio (labelled "Portfolio") followed by each risk in
/// register order.
pub fn portfolio_summary(result: &PortfolioResult) -> Result<Vec<(String, MetricsSummary)>> {
    let mut out = Vec::with_capacity(result.by_risk().len() + 1);
    out.push(("Portfolio".to_string(), summary(result.portfolio_loss())?));
    for r in result.by_risk() {
        out.push((r.risk_id.to_string(), summary(&r.losses)?));
    }
    Ok(out)
}

/// Marginal VaR contribution (dVaR) per risk.
///
/// Trials where the portfolio loss is at or above its VaR at `confidence` form
/// the tail; each risk's contribution is its mean loss over those trials. This
/// is an attribution heuristic, not an exact decomposition: the contributions
/// need not sum to portfolio TVaR.
pub fn marginal_contribution_to_var(
    by_risk: &[RiskLosses],
    portfolio_losses: &[f64],
    confidence: f64,
) -> Result<Vec<(RiskId, f64)>> {
    check_confidence(confidence)?;
    let threshold = Sorted::new(portfolio_losses)?.var(confidence);
    let n = portfolio_losses.len();
    for r in by_risk {
        if r.losses.len() != n {
            return Err(RiskError::parameter(
                "by_risk",
                format!("has {} trials, portfolio has {n}", r.losses.len()),
            )
            .for_risk(&r.risk_id));
        }
    }

    let tail: Vec<usize> = (0..n).filter(|&i| portfolio_losses[i] >= threshold).collect();
    let count = tail.len() as f64;
    Ok(by_risk
        .iter()
        .map(|r| {
            let sum: f64 = tail.iter().map(|&i| r.losses[i]).sum();
            (r.risk_id.clone(), sum / count)
        })
        .collect())
}

/// Ranking key for [`tornado_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TornadoMetric {
    MeanLoss,
    DVaR,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TornadoRow {
    pub rank: usize,
    pub risk_id: RiskId,
    pub category: String,
    pub mean_loss: f64,
    pub dvar: f64,
}

/// Mean loss and dVaR per risk, ranked descending by `rank_by`, top `top_n`.
/// Ties keep register order.
pub fn tornado_data(
    register: &[RiskDefinition],
    portfolio_losses: &[f64],
    by_risk: &[RiskLosses],
    confidence: f64,
    top_n: usize,
    rank_by: TornadoMetric,
) -> Result<Vec<TornadoRow>> {
    let dvar = marginal_contribution_to_var(by_risk, portfolio_losses, confidence)?;

    let mut rows = Vec::with_capacity(register.len());
    for risk in register {
        let idx = by_risk
            .iter()
            .position(|r| r.risk_id == risk.risk_id)
            .ok_or_else(|| {
                RiskError::parameter("by_risk", "has no simulated losses for this risk")
                    .for_risk(&risk.risk_id)
            })?;
        rows.push(TornadoRow {
            rank: 0,
            risk_id: risk.risk_id.clone(),
            category: risk.category.clone(),
            mean_loss: expected_loss(&by_risk[idx].losses)?,
            dvar: dvar[idx].1,
        });
    }

    let key = |row: &TornadoRow| match rank_by {
        TornadoMetric::MeanLoss => row.mean_loss,
        TornadoMetric::DVaR => row.dvar,
    };
    rows.sort_by(|a, b| key(b).total_cmp(&key(a)));
    rows.truncate(top_n);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionRow {
    pub risk_id: RiskId,
    pub mean_loss: f64,
    pub std_loss: f64,
    pub var_95: f64,
    /// Share of portfolio mean loss, in percent.
    pub contribution_pct: f64,
}

/// Per-risk share of expected portfolio loss, largest first.
pub fn contribution_analysis(result: &PortfolioResult, top_n: usize) -> Result<Vec<ContributionRow>> {
    let portfolio_mean = expected_loss(result.portfolio_loss())?;
    let mut rows = result
        .by_risk()
        .iter()
        .map(|r| {
            let s = summary(&r.losses)?;
            let contribution_pct =
                if portfolio_mean > 0.0 { s.mean / portfolio_mean * 100.0 } else { 0.0 };
            Ok(ContributionRow {
                risk_id: r.risk_id.clone(),
                mean_loss: s.mean,
                std_loss: s.std,
                var_95: s.var_95,
                contribution_pct,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    rows.sort_by(|a, b| b.mean_loss.total_cmp(&a.mean_loss));
    rows.truncate(top_n);
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub risk_ids: Vec<RiskId>,
    /// Row-major; `values[i][j]` is corr(risk i, risk j).
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &RiskId, b: &RiskId) -> Option<f64> {
        let i = self.risk_ids.iter().position(|id| id == a)?;
        let j = self.risk_ids.iter().position(|id| id == b)?;
        Some(self.values[i][j])
    }
}

/// Pearson correlation between per-risk loss vectors. Risks are simulated
/// independently, so off-diagonal values should sit near zero. A constant
/// vector has no defined correlation and reports NaN off the diagonal.
pub fn correlation_matrix(result: &PortfolioResult) -> CorrelationMatrix {
    let stats: Vec<(f64, f64)> = result
        .by_risk()
        .iter()
        .map(|r| {
            let m = mean_of(&r.losses);
            (m, std_of(&r.losses, m))
        })
        .collect();
    let k = stats.len();
    let mut values = vec![vec![1.0; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            let (a, b) = (&result.by_risk()[i].losses, &result.by_risk()[j].losses);
            let cov = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - stats[i].0) * (y - stats[j].0))
                .sum::<f64>()
                / a.len() as f64;
            let denom = stats[i].1 * stats[j].1;
            let c = if denom > 0.0 { (cov / denom).clamp(-1.0, 1.0) } else { f64::NAN };
            values[i][j] = c;
            values[j][i] = c;
        }
    }
    CorrelationMatrix { risk_ids: result.risk_ids().cloned().collect(), values }
}
