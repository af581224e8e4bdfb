//! Loss exceedance curves and return periods.
//!
//! Exceedance is inclusive: the probability of a threshold is the fraction of
//! trials with loss `>=` it. A threshold above every simulated loss therefore
//! has probability exactly 0.0 and an infinite return period.

use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::metrics::{check_losses, percentiles};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExceedancePoint {
    /// Probability that annual loss is at or above `loss`.
    pub probability: f64,
    pub loss: f64,
}

/// Points ordered by probability descending; loss is non-decreasing along the
/// curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExceedanceCurve {
    points: Vec<ExceedancePoint>,
}

impl ExceedanceCurve {
    fn from_points(mut points: Vec<ExceedancePoint>) -> Self {
        points.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ExceedanceCurve { points }
    }

    pub fn points(&self) -> &[ExceedancePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExceedancePoint> {
        self.points.iter()
    }

    /// True if loss never falls as probability falls.
    pub fn is_monotone(&self) -> bool {
        self.points.windows(2).all(|w| w[1].loss >= w[0].loss)
    }
}

/// Loss threshold at each exceedance probability.
///
/// With `probs`, each `p` in [0, 1] maps to the `1 − p` percentile. Without,
/// `n_points` probabilities are spaced evenly over the open interval (0, 1):
/// `p_i = i / (n_points + 1)` for `i = 1..=n_points`.
pub fn lec_points(losses: &[f64], probs: Option<&[f64]>, n_points: usize) -> Result<ExceedanceCurve> {
    check_losses(losses)?;
    let probs: Vec<f64> = match probs {
        Some(ps) => ps.to_vec(),
        None => {
            if n_points == 0 {
                return Err(RiskError::parameter("n_points", "must be > 0, got 0"));
            }
            let denom = (n_points + 1) as f64;
            (1..=n_points).map(|i| i as f64 / denom).collect()
        }
    };
    for &p in &probs {
        if !(0.0..=1.0).contains(&p) {
            return Err(RiskError::parameter("probability", format!("must be in [0, 1], got {p}")));
        }
    }

    let quantiles: Vec<f64> = probs.iter().map(|p| 1.0 - p).collect();
    let points = percentiles(losses, &quantiles)?
        .into_iter()
        .zip(&probs)
        .map(|((_, loss), &probability)| ExceedancePoint { probability, loss })
        .collect();
    Ok(ExceedanceCurve::from_points(points))
}

/// Empirical curve over `n_points` loss thresholds spaced evenly from the
/// smallest to the largest simulated loss, each paired with its exceedance
/// probability. A constant loss vector collapses to `(1.0, c), (0.0, c)`.
pub fn lec_points_by_threshold(losses: &[f64], n_points: usize) -> Result<ExceedanceCurve> {
    check_losses(losses)?;
    if n_points < 2 {
        return Err(RiskError::parameter("n_points", format!("must be >= 2, got {n_points}")));
    }
    let mut sorted = losses.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    if min == max {
        return Ok(ExceedanceCurve::from_points(vec![
            ExceedancePoint { probability: 1.0, loss: min },
            ExceedancePoint { probability: 0.0, loss: min },
        ]));
    }

    let n = sorted.len() as f64;
    let step = (max - min) / (n_points - 1) as f64;
    let points = (0..n_points)
        .map(|i| {
            let loss = if i == n_points - 1 { max } else { min + step * i as f64 };
            let below = sorted.partition_point(|&x| x < loss);
            ExceedancePoint { probability: (sorted.len() - below) as f64 / n, loss }
        })
        .collect();
    Ok(ExceedanceCurve::from_points(points))
}

/// Fraction of trials with loss at or above `threshold`.
pub fn exceedance_prob(losses: &[f64], threshold: f64) -> Result<f64> {
    check_losses(losses)?;
    if threshold.is_nan() {
        return Err(RiskError::parameter("threshold", "must be a number, got NaN"));
    }
    let hits = losses.iter().filter(|&&x| x >= threshold).count();
    Ok(hits as f64 / losses.len() as f64)
}

/// Expected years between losses of at least `threshold`: `1 / exceedance_prob`.
///
/// A threshold never reached in the sample returns `f64::INFINITY`; one reached
/// every year returns exactly 1.0.
pub fn return_period(losses: &[f64], threshold: f64) -> Result<f64> {
    let p = exceedance_prob(losses, threshold)?;
    if p == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(1.0 / p)
}

/// Loss threshold for each return period in years (the 1-in-T loss is the
/// `1 − 1/T` percentile). Periods must be at least one year.
pub fn return_period_losses(losses: &[f64], periods: &[f64]) -> Result<Vec<(f64, f64)>> {
    check_losses(losses)?;
    let mut probs = Vec::with_capacity(periods.len());
    for &t in periods {
        if !(t >= 1.0) {
            return Err(RiskError::parameter("return_period", format!("must be >= 1, got {t}")));
        }
        probs.push(1.0 - 1.0 / t);
    }
    Ok(percentiles(losses, &probs)?
        .into_iter()
        .zip(periods)
        .map(|((_, loss), &t)| (t, loss))
        .collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::metrics::var;

    fn ramp() -> Vec<f64> {
        (1..=1_000).map(f64::from).collect()
    }

    #[test]
    fn default_curve_spans_open_unit_interval() {
        let curve = lec_points(&ramp(), None, 100).unwrap();
        assert_eq!(curve.len(), 100);
        let first = curve.points()[0];
        let last = curve.points()[99];
        assert_relative_eq!(first.probability, 100.0 / 101.0);
        assert_relative_eq!(last.probability, 1.0 / 101.0);
        assert!(curve.iter().all(|p| p.probability > 0.0 && p.probability < 1.0));
        assert!(curve.is_monotone());
    }

    #[test]
    fn explicit_probs_map_to_upper_tail_percentiles() {
        let xs = ramp();
        let curve = lec_points(&xs, Some(&[0.01, 0.5, 0.05]), 100).unwrap();
        let probs: Vec<f64> = curve.iter().map(|p| p.probability).collect();
        assert_eq!(probs, [0.5, 0.05, 0.01]);
        assert_relative_eq!(curve.points()[2].loss, var(&xs, 0.99).unwrap(), epsilon = 1e-9);
        assert!(curve.is_monotone());
    }

    #[test]
    fn explicit_probs_outside_unit_interval_are_rejected() {
        let err = lec_points(&ramp(), Some(&[0.5, 1.2]), 10).unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "probability", .. }));
    }

    #[test]
    fn empty_losses_are_rejected() {
        assert!(matches!(lec_points(&[], None, 10), Err(RiskError::EmptyData { .. })));
        assert!(matches!(exceedance_prob(&[], 1.0), Err(RiskError::EmptyData { .. })));
        assert!(matches!(return_period(&[], 1.0), Err(RiskError::EmptyData { .. })));
    }

    #[test]
    fn non_finite_losses_are_rejected() {
        let xs = [5.0, f64::NAN, 1.0];
        let is_losses_error = |r: Result<_>| matches!(r, Err(RiskError::Parameter { param: "losses", .. }));
        assert!(is_losses_error(lec_points(&xs, None, 10).map(|_| ())));
        assert!(is_losses_error(lec_points_by_threshold(&xs, 10).map(|_| ())));
        assert!(is_losses_error(exceedance_prob(&xs, 2.0).map(|_| ())));
        assert!(is_losses_error(return_period(&[f64::INFINITY], 2.0).map(|_| ())));
        assert!(is_losses_error(return_period_losses(&xs, &[10.0]).map(|_| ())));
    }

    #[test]
    fn constant_losses_collapse_to_one_threshold() {
        let xs = vec![42.0; 500];
        let curve = lec_points(&xs, None, 50).unwrap();
        assert!(curve.iter().all(|p| p.loss == 42.0));
        assert!(curve.is_monotone());

        let by_threshold = lec_points_by_threshold(&xs, 50).unwrap();
        assert_eq!(
            by_threshold.points(),
            &[
                ExceedancePoint { probability: 1.0, loss: 42.0 },
                ExceedancePoint { probability: 0.0, loss: 42.0 },
            ]
        );
    }

    #[test]
    fn threshold_curve_runs_min_to_max() {
        let curve = lec_points_by_threshold(&ramp(), 10).unwrap();
        assert_eq!(curve.len(), 10);
        assert_eq!(curve.points()[0], ExceedancePoint { probability: 1.0, loss: 1.0 });
        assert_eq!(curve.points()[9], ExceedancePoint { probability: 0.001, loss: 1_000.0 });
        assert!(curve.is_monotone());
    }

    #[test]
    fn exceedance_is_inclusive() {
        let xs = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(exceedance_prob(&xs, 20.0).unwrap(), 0.5);
        assert_eq!(exceedance_prob(&xs, -5.0).unwrap(), 1.0);
        assert_eq!(exceedance_prob(&xs, 30.0).unwrap(), 0.25);
        assert_eq!(exceedance_prob(&xs, 30.5).unwrap(), 0.0);
    }

    #[test]
    fn never_exceeded_threshold_has_infinite_return_period() {
        let rp = return_period(&ramp(), 1e12).unwrap();
        assert!(rp.is_infinite() && rp > 0.0);
    }

    #[test]
    fn always_exceeded_threshold_has_unit_return_period() {
        assert_eq!(return_period(&ramp(), 0.0).unwrap(), 1.0);
        assert_eq!(return_period(&[0.0; 100], 0.0).unwrap(), 1.0);
    }

    #[test]
    fn return_period_inverts_exceedance() {
        // 10 of 1000 trials are >= 991.
        assert_relative_eq!(return_period(&ramp(), 991.0).unwrap(), 100.0);
    }

    #[test]
    fn return_period_losses_match_var() {
        let xs = ramp();
        let table = return_period_losses(&xs, &[10.0, 100.0]).unwrap();
        assert_eq!(table[0].0, 10.0);
        assert_relative_eq!(table[0].1, var(&xs, 0.9).unwrap(), epsilon = 1e-9);
        assert_relative_eq!(table[1].1, var(&xs, 0.99).unwrap(), epsilon = 1e-9);
        assert!(return_period_losses(&xs, &[0.5]).is_err());
    }

    proptest! {
        #[test]
        fn curves_are_monotone(
            xs in prop::collection::vec(0.0..1e7f64, 1..300),
            n_points in 1usize..200,
        ) {
            prop_assert!(lec_points(&xs, None, n_points).unwrap().is_monotone());
            if n_points >= 2 {
                prop_assert!(lec_points_by_threshold(&xs, n_points).unwrap().is_monotone());
            }
        }

        #[test]
        fn explicit_curves_are_monotone(
            xs in prop::collection::vec(0.0..1e7f64, 1..300),
            probs in prop::collection::vec(0.0..=1.0f64, 1..50),
        ) {
            prop_assert!(lec_points(&xs, Some(&probs), 0).unwrap().is_monotone());
        }
    }
}
