//! Frequency and severity distributions.
//!
//! Each model is a closed enum; `validate` checks parameters once, and
//! `sampler` turns a validated model into a ready-to-draw `Distribution`.

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma, LogNormal, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::error::{ModelKind, Result, RiskError};

/// Events per year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum FrequencyModel {
    /// Poisson(λ). λ = 0 is valid and always yields zero events.
    Poisson { lambda: f64 },
    /// NegBin(r, p): number of failures before the r-th success.
    /// Mean r(1−p)/p, variance r(1−p)/p².
    NegativeBinomial { r: f64, p: f64 },
}

/// Loss per event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum SeverityModel {
    /// Log-space params.
    Lognormal { mu: f64, sigma: f64 },
    /// Draws below zero are clamped to zero, not redrawn.
    Normal { mu: f64, sigma: f64 },
    /// Beta(α, β) scaled into [min, max] with α = 1 + 4(mode−min)/(max−min),
    /// β = 1 + 4(max−mode)/(max−min).
    Pert { min: f64, mode: f64, max: f64 },
}

impl FrequencyModel {
    /// Build from a register row's model name and parameter columns.
    pub fn from_params(name: &str, param_1: f64, param_2: Option<f64>) -> Result<Self> {
        let model = match normalise(name).as_str() {
            "poisson" => FrequencyModel::Poisson { lambda: param_1 },
            "negbin" | "negativebinomial" => {
                let p = param_2.ok_or_else(|| {
                    RiskError::parameter("FreqParam2", "is required for NegBin (success probability p)")
                })?;
                FrequencyModel::NegativeBinomial { r: param_1, p }
            }
            _ => {
                return Err(RiskError::Model {
                    risk_id: None,
                    kind: ModelKind::Frequency,
                    name: name.to_string(),
                });
            }
        };
        model.validate()?;
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrequencyModel::Poisson { .. } => "Poisson",
            FrequencyModel::NegativeBinomial { .. } => "NegBin",
        }
    }

    /// Check parameters, including the limits of the underlying samplers, so a
    /// model that validates can always be sampled.
    pub fn validate(&self) -> Result<()> {
        self.sampler().map(|_| ())
    }

    fn check_ranges(&self) -> Result<()> {
        match *self {
            FrequencyModel::Poisson { lambda } => {
                if !(lambda >= 0.0 && lambda.is_finite()) {
                    return Err(RiskError::parameter(
                        "FreqParam1",
                        format!("must be >= 0, got {lambda}"),
                    ));
                }
            }
            FrequencyModel::NegativeBinomial { r, p } => {
                if !(r > 0.0 && r.is_finite()) {
                    return Err(RiskError::parameter("FreqParam1", format!("must be > 0, got {r}")));
                }
                if !(p > 0.0 && p <= 1.0) {
                    return Err(RiskError::parameter(
                        "FreqParam2",
                        format!("must be in (0, 1], got {p}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn mean(&self) -> f64 {
        match *self {
            FrequencyModel::Poisson { lambda } => lambda,
            FrequencyModel::NegativeBinomial { r, p } => r * (1.0 - p) / p,
        }
    }

    pub fn variance(&self) -> f64 {
        match *self {
            FrequencyModel::Poisson { lambda } => lambda,
            FrequencyModel::NegativeBinomial { r, p } => r * (1.0 - p) / (p * p),
        }
    }

    pub fn sampler(&self) -> Result<FrequencySampler> {
        self.check_ranges()?;
        let sampler = match *self {
            FrequencyModel::Poisson { lambda } if lambda == 0.0 => FrequencySampler::Zero,
            FrequencyModel::Poisson { lambda } => FrequencySampler::Poisson(
                Poisson::new(lambda)
                    .map_err(|e| RiskError::parameter("FreqParam1", format!("{e}, got {lambda}")))?,
            ),
            FrequencyModel::NegativeBinomial { p, .. } if p == 1.0 => FrequencySampler::Zero,
            // Gamma–Poisson mixture: λ ~ Gamma(r, (1−p)/p), k ~ Poisson(λ).
            FrequencyModel::NegativeBinomial { r, p } => FrequencySampler::NegativeBinomial(
                Gamma::new(r, (1.0 - p) / p)
                    .map_err(|e| RiskError::parameter("FreqParam1", format!("{e}, got {r}")))?,
            ),
        };
        Ok(sampler)
    }
}

impl SeverityModel {
    /// Build from a register row's model name and parameter columns.
    pub fn from_params(name: &str, param_1: f64, param_2: f64, param_3: Option<f64>) -> Result<Self> {
        let model = match normalise(name).as_str() {
            "lognormal" => SeverityModel::Lognormal { mu: param_1, sigma: param_2 },
            "normal" => SeverityModel::Normal { mu: param_1, sigma: param_2 },
            "pert" => {
                let max = param_3
                    .ok_or_else(|| RiskError::parameter("SevParam3", "is required for PERT (max)"))?;
                SeverityModel::Pert { min: param_1, mode: param_2, max }
            }
            _ => {
                return Err(RiskError::Model {
                    risk_id: None,
                    kind: ModelKind::Severity,
                    name: name.to_string(),
                });
            }
        };
        model.validate()?;
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SeverityModel::Lognormal { .. } => "Lognormal",
            SeverityModel::Normal { .. } => "Normal",
            SeverityModel::Pert { .. } => "PERT",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            SeverityModel::Lognormal { mu, sigma } | SeverityModel::Normal { mu, sigma } => {
                if !mu.is_finite() {
                    return Err(RiskError::parameter("SevParam1", format!("must be finite, got {mu}")));
                }
                if !(sigma > 0.0 && sigma.is_finite()) {
                    return Err(RiskError::parameter("SevParam2", format!("must be > 0, got {sigma}")));
                }
            }
            SeverityModel::Pert { min, mode, max } => {
                if !(min.is_finite() && mode.is_finite() && max.is_finite()) {
                    return Err(RiskError::parameter(
                        "SevParam1",
                        format!("PERT bounds must be finite, got ({min}, {mode}, {max})"),
                    ));
                }
                if !(min < max) {
                    return Err(RiskError::parameter(
                        "SevParam3",
                        format!("PERT max must exceed min, got min={min}, max={max}"),
                    ));
                }
                if !(min <= mode && mode <= max) {
                    return Err(RiskError::parameter(
                        "SevParam2",
                        format!("PERT requires min <= mode <= max, got ({min}, {mode}, {max})"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Untruncated theoretical mean. For `Normal` this ignores the clamp at zero.
    pub fn mean(&self) -> f64 {
        match *self {
            SeverityModel::Lognormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            SeverityModel::Normal { mu, .. } => mu,
            SeverityModel::Pert { min, mode, max } => (min + 4.0 * mode + max) / 6.0,
        }
    }

    pub fn sampler(&self) -> Result<SeveritySampler> {
        self.validate()?;
        let sampler = match *self {
            SeverityModel::Lognormal { mu, sigma } => SeveritySampler::Lognormal(
                LogNormal::new(mu, sigma)
                    .map_err(|e| RiskError::parameter("SevParam2", format!("{e}, got {sigma}")))?,
            ),
            SeverityModel::Normal { mu, sigma } => SeveritySampler::Normal(
                Normal::new(mu, sigma)
                    .map_err(|e| RiskError::parameter("SevParam2", format!("{e}, got {sigma}")))?,
            ),
            SeverityModel::Pert { min, mode, max } => {
                let range = max - min;
                let alpha = 1.0 + 4.0 * (mode - min) / range;
                let beta = 1.0 + 4.0 * (max - mode) / range;
                SeveritySampler::Pert {
                    beta: Beta::new(alpha, beta)
                        .map_err(|e| RiskError::parameter("SevParam2", format!("{e}")))?,
                    min,
                    max,
                }
            }
        };
        Ok(sampler)
    }
}

fn normalise(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-' && *c != ' ')
        .flat_map(char::to_lowercase)
        .collect()
}

/// A validated frequency model ready to draw event counts.
#[derive(Debug, Clone, Copy)]
pub enum FrequencySampler {
    Zero,
    Poisson(Poisson<f64>),
    NegativeBinomial(Gamma<f64>),
}

impl Distribution<u64> for FrequencySampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match self {
            FrequencySampler::Zero => 0,
            FrequencySampler::Poisson(d) => d.sample(rng) as u64,
            FrequencySampler::NegativeBinomial(gamma) => {
                let lambda = gamma.sample(rng);
                if lambda <= 0.0 {
                    return 0;
                }
                match Poisson::new(lambda) {
                    Ok(d) => d.sample(rng) as u64,
                    // Beyond Poisson's supported range the count is λ to any precision that matters.
                    Err(_) => lambda as u64,
                }
            }
        }
    }
}

/// A validated severity model ready to draw per-event losses.
#[derive(Debug, Clone, Copy)]
pub enum SeveritySampler {
    Lognormal(LogNormal<f64>),
    Normal(Normal<f64>),
    Pert { beta: Beta<f64>, min: f64, max: f64 },
}

impl Distribution<f64> for SeveritySampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            SeveritySampler::Lognormal(d) => d.sample(rng),
            SeveritySampler::Normal(d) => d.sample(rng).max(0.0),
            SeveritySampler::Pert { beta, min, max } => {
                let b: f64 = beta.sample(rng);
                (min + b * (max - min)).clamp(*min, *max)
            }
        }
    }
}

/// Draw `n` event counts.
pub fn sample_frequency(model: &FrequencyModel, n: usize, rng: &mut impl Rng) -> Result<Vec<u64>> {
    let sampler = model.sampler()?;
    Ok((0..n).map(|_| sampler.sample(rng)).collect())
}

/// Draw `n` per-event losses.
pub fn sample_severity(model: &SeverityModel, n: usize, rng: &mut impl Rng) -> Result<Vec<f64>> {
    let sampler = model.sampler()?;
    Ok((0..n).map(|_| sampler.sample(rng)).collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::metrics::percentile;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn mean_var(xs: &[f64]) -> (f64, f64) {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (mean, var)
    }

    // ── Frequency ──────────────────────────────────────────────────────────

    #[test]
    fn poisson_zero_lambda_yields_all_zeros() {
        let counts = sample_frequency(&FrequencyModel::Poisson { lambda: 0.0 }, 1_000, &mut rng()).unwrap();
        assert_eq!(counts.len(), 1_000);
        assert!(counts.iter().all(|&k| k == 0));
    }

    #[test]
    fn poisson_negative_lambda_is_parameter_error() {
        let err = sample_frequency(&FrequencyModel::Poisson { lambda: -1.5 }, 10, &mut rng()).unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "FreqParam1", .. }), "{err}");
    }

    #[test]
    fn poisson_lambda_beyond_sampler_range_fails_validation() {
        let model = FrequencyModel::Poisson { lambda: 1e20 };
        let err = model.validate().unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "FreqParam1", .. }), "{err}");
        assert!(FrequencyModel::from_params("Poisson", 1e20, None).is_err());
        assert!(FrequencyModel::Poisson { lambda: 1e6 }.validate().is_ok());
    }

    #[test]
    fn poisson_mean_matches_lambda() {
        let counts = sample_frequency(&FrequencyModel::Poisson { lambda: 3.0 }, 50_000, &mut rng()).unwrap();
        let xs: Vec<f64> = counts.iter().map(|&k| k as f64).collect();
        let (mean, var) = mean_var(&xs);
        assert_relative_eq!(mean, 3.0, max_relative = 0.03);
        assert_relative_eq!(var, 3.0, max_relative = 0.05);
    }

    /// r=5, p=0.3: mean = 11.667, variance = 38.889.
    #[test]
    fn negbin_moments_match_parameterisation() {
        let model = FrequencyModel::NegativeBinomial { r: 5.0, p: 0.3 };
        let counts = sample_frequency(&model, 50_000, &mut rng()).unwrap();
        let xs: Vec<f64> = counts.iter().map(|&k| k as f64).collect();
        let (mean, var) = mean_var(&xs);
        assert_relative_eq!(mean, model.mean(), max_relative = 0.05);
        assert_relative_eq!(var, model.variance(), max_relative = 0.05);
    }

    #[test]
    fn negbin_p_one_yields_zeros() {
        let model = FrequencyModel::NegativeBinomial { r: 2.0, p: 1.0 };
        let counts = sample_frequency(&model, 500, &mut rng()).unwrap();
        assert!(counts.iter().all(|&k| k == 0));
    }

    #[test]
    fn negbin_rejects_out_of_range_params() {
        for (r, p, param) in [
            (0.0, 0.5, "FreqParam1"),
            (-2.0, 0.5, "FreqParam1"),
            (2.0, 0.0, "FreqParam2"),
            (2.0, 1.5, "FreqParam2"),
            (2.0, f64::NAN, "FreqParam2"),
        ] {
            let err = FrequencyModel::NegativeBinomial { r, p }.validate().unwrap_err();
            match err {
                RiskError::Parameter { param: got, .. } => assert_eq!(got, param, "r={r} p={p}"),
                other => panic!("unexpected error {other}"),
            }
        }
    }

    // ── Severity ───────────────────────────────────────────────────────────

    #[test]
    fn lognormal_draws_strictly_positive() {
        let xs = sample_severity(&SeverityModel::Lognormal { mu: 0.0, sigma: 2.0 }, 10_000, &mut rng()).unwrap();
        assert!(xs.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn lognormal_rejects_non_positive_sigma() {
        for sigma in [0.0, -1.0] {
            let err = SeverityModel::Lognormal { mu: 10.0, sigma }.validate().unwrap_err();
            assert!(matches!(err, RiskError::Parameter { param: "SevParam2", .. }));
        }
    }

    #[test]
    fn lognormal_p99_increases_with_sigma() {
        let mut last = 0.0;
        for sigma in [0.5, 1.0, 1.5, 2.0] {
            let xs = sample_severity(&SeverityModel::Lognormal { mu: 10.0, sigma }, 10_000, &mut rng()).unwrap();
            let p99 = percentile(&xs, 0.99).unwrap();
            assert!(p99 > last, "sigma={sigma}: p99 {p99} not above {last}");
            last = p99;
        }
    }

    #[test]
    fn lognormal_mean_in_expected_range() {
        let model = SeverityModel::Lognormal { mu: 11.5, sigma: 1.2 };
        let xs = sample_severity(&model, 10_000, &mut rng()).unwrap();
        let (mean, _) = mean_var(&xs);
        assert_relative_eq!(mean, model.mean(), max_relative = 0.20);
    }

    #[test]
    fn wider_lognormal_has_heavier_tail() {
        let p99 = |sigma| {
            let model = SeverityModel::Lognormal { mu: 10.0, sigma };
            percentile(&sample_severity(&model, 20_000, &mut rng()).unwrap(), 0.99).unwrap()
        };
        let (narrow, mid, wide) = (p99(0.5), p99(1.0), p99(1.5));
        assert!(narrow < mid && mid < wide, "p99: {narrow} {mid} {wide}");
    }

    /// Normal(0, 1) clamped at zero: half the mass sits at exactly 0 and the
    /// mean is φ(0) = 1/√(2π) ≈ 0.3989 rather than 0.
    #[test]
    fn normal_negative_draws_are_clamped_to_zero() {
        let xs = sample_severity(&SeverityModel::Normal { mu: 0.0, sigma: 1.0 }, 50_000, &mut rng()).unwrap();
        assert!(xs.iter().all(|&x| x >= 0.0));
        let zeros = xs.iter().filter(|&&x| x == 0.0).count() as f64 / xs.len() as f64;
        assert_relative_eq!(zeros, 0.5, max_relative = 0.03);
        let (mean, _) = mean_var(&xs);
        assert_relative_eq!(mean, 1.0 / (2.0 * std::f64::consts::PI).sqrt(), max_relative = 0.03);
    }

    #[test]
    fn normal_rejects_non_positive_sigma() {
        let err = SeverityModel::Normal { mu: 100.0, sigma: 0.0 }.validate().unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "SevParam2", .. }));
    }

    #[test]
    fn pert_draws_within_bounds() {
        let model = SeverityModel::Pert { min: 50_000.0, mode: 100_000.0, max: 300_000.0 };
        let xs = sample_severity(&model, 10_000, &mut rng()).unwrap();
        assert!(xs.iter().all(|&x| (50_000.0..=300_000.0).contains(&x)));
        let (mean, _) = mean_var(&xs);
        assert_relative_eq!(mean, model.mean(), max_relative = 0.03);
    }

    #[test]
    fn pert_mode_at_bound_is_valid() {
        let model = SeverityModel::Pert { min: 10.0, mode: 10.0, max: 20.0 };
        let xs = sample_severity(&model, 1_000, &mut rng()).unwrap();
        assert!(xs.iter().all(|&x| (10.0..=20.0).contains(&x)));
    }

    #[test]
    fn pert_rejects_bad_ordering() {
        assert!(SeverityModel::Pert { min: 10.0, mode: 5.0, max: 20.0 }.validate().is_err());
        assert!(SeverityModel::Pert { min: 10.0, mode: 25.0, max: 20.0 }.validate().is_err());
        assert!(SeverityModel::Pert { min: 20.0, mode: 20.0, max: 10.0 }.validate().is_err());
        assert!(SeverityModel::Pert { min: 10.0, mode: 10.0, max: 10.0 }.validate().is_err());
    }

    // ── Name dispatch ──────────────────────────────────────────────────────

    #[test]
    fn model_names_parse_case_insensitively() {
        assert_eq!(
            FrequencyModel::from_params("POISSON", 2.0, None).unwrap(),
            FrequencyModel::Poisson { lambda: 2.0 }
        );
        assert_eq!(
            FrequencyModel::from_params("NegBin", 3.0, Some(0.4)).unwrap(),
            FrequencyModel::NegativeBinomial { r: 3.0, p: 0.4 }
        );
        assert_eq!(
            SeverityModel::from_params("pert", 1.0, 2.0, Some(3.0)).unwrap(),
            SeverityModel::Pert { min: 1.0, mode: 2.0, max: 3.0 }
        );
        assert_eq!(
            SeverityModel::from_params(" LogNormal ", 12.0, 0.8, None).unwrap(),
            SeverityModel::Lognormal { mu: 12.0, sigma: 0.8 }
        );
    }

    #[test]
    fn unknown_model_name_is_model_error() {
        let err = FrequencyModel::from_params("Binomial", 1.0, None).unwrap_err();
        assert!(matches!(err, RiskError::Model { kind: ModelKind::Frequency, .. }));
        let err = SeverityModel::from_params("Weibull", 1.0, 1.0, None).unwrap_err();
        assert!(matches!(err, RiskError::Model { kind: ModelKind::Severity, .. }));
    }

    #[test]
    fn missing_optional_params_are_parameter_errors() {
        let err = FrequencyModel::from_params("negbin", 3.0, None).unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "FreqParam2", .. }));
        let err = SeverityModel::from_params("PERT", 1.0, 2.0, None).unwrap_err();
        assert!(matches!(err, RiskError::Parameter { param: "SevParam3", .. }));
    }

    fn severity_strategy() -> impl Strategy<Value = SeverityModel> {
        prop_oneof![
            (-5.0..15.0f64, 0.05..2.5f64).prop_map(|(mu, sigma)| SeverityModel::Lognormal { mu, sigma }),
            (-1e5..1e6f64, 1.0..1e5f64).prop_map(|(mu, sigma)| SeverityModel::Normal { mu, sigma }),
            (0.0..1e5f64, 0.0..1.0f64, 1.0..1e6f64).prop_map(|(min, t, width)| {
                SeverityModel::Pert { min, mode: min + t * width, max: min + width }
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn severity_percentiles_are_ordered(model in severity_strategy(), seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let xs = sample_severity(&model, 10_000, &mut rng).unwrap();
            let p50 = percentile(&xs, 0.50).unwrap();
            let p90 = percentile(&xs, 0.90).unwrap();
            let p95 = percentile(&xs, 0.95).unwrap();
            let p99 = percentile(&xs, 0.99).unwrap();
            prop_assert!(p99 >= p95 && p95 >= p90 && p90 >= p50);
        }
    }
}
