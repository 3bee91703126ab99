//! Parameterised distribution samplers.
//!
//! Samplers are constructed complete from scenario inputs or not at all;
//! invalid parameters are scenario errors at load time. `NormalSample`
//! supports correlated sampling: one N(0,1) draw convertible to any normal
//! or log-normal target.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Gamma as GammaDist, LogNormal as LogNormalDist};

use malsim_data::scenario::SampledValue;

use crate::error::{Result, SimError};
use crate::util::rng::LocalRng;

/// A single N(0,1) draw, convertible to N(μ,σ) or lognormal(μ,σ).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalSample(f64);

impl NormalSample {
    pub fn generate(rng: &mut LocalRng) -> Self {
        NormalSample(rng.gauss(0.0, 1.0))
    }

    /// Generate a sample correlated with `base`.
    ///
    /// `factor` must equal sqrt(1 - correlation²); it may be cached by the
    /// caller. If this is used to sample a log-normal, the correlation is on
    /// the log scale.
    pub fn generate_correlated(
        base: NormalSample,
        correlation: f64,
        factor: f64,
        rng: &mut LocalRng,
    ) -> Self {
        NormalSample(correlation * base.0 + factor * rng.gauss(0.0, 1.0))
    }

    pub fn as_normal(self, mu: f64, sigma: f64) -> f64 {
        mu + sigma * self.0
    }

    pub fn as_lognormal(self, mu: f64, sigma: f64) -> f64 {
        (mu + sigma * self.0).exp()
    }
}

/// Sampler for normal values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalSampler {
    mu: f64,
    sigma: f64,
}

impl NormalSampler {
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        if !mu.is_finite() || !sigma.is_finite() || sigma < 0.0 {
            return Err(SimError::scenario(format!(
                "invalid normal parameters mu={mu} sigma={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        rng.gauss(self.mu, self.sigma)
    }

    pub fn sample_from(&self, sample: NormalSample) -> f64 {
        sample.as_normal(self.mu, self.sigma)
    }

    pub fn mean(&self) -> f64 {
        self.mu
    }
}

/// Sampler for log-normal values, configured from (mean, CV) or
/// (mean, variance). CV (or variance) zero degenerates to a point mass.
/// An optional `truncate` bound resamples draws above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LognormalSampler {
    mu: f64,
    sigma: f64,
    truncate: Option<f64>,
}

impl LognormalSampler {
    pub fn from_mean_cv(mean: f64, cv: f64, truncate: Option<f64>) -> Result<Self> {
        if mean < 0.0 || cv < 0.0 || !mean.is_finite() || !cv.is_finite() {
            return Err(SimError::scenario(format!(
                "log-normal requires mean >= 0 and CV >= 0 (got mean={mean}, CV={cv})"
            )));
        }
        if mean == 0.0 && cv != 0.0 {
            return Err(SimError::scenario("log-normal with mean 0 requires CV 0"));
        }
        if cv == 0.0 {
            // Point mass at the mean; mean == 0 maps to mu = -inf.
            return Ok(Self { mu: mean.ln(), sigma: 0.0, truncate });
        }
        let sigma_sq = cv.mul_add(cv, 1.0).ln();
        let mu = mean.ln() - 0.5 * sigma_sq;
        Ok(Self { mu, sigma: sigma_sq.sqrt(), truncate })
    }

    pub fn from_mean_variance(mean: f64, variance: f64, truncate: Option<f64>) -> Result<Self> {
        if mean <= 0.0 {
            return Err(SimError::scenario("log-normal from variance requires mean > 0"));
        }
        if variance < 0.0 {
            return Err(SimError::scenario("log-normal variance must be >= 0"));
        }
        Self::from_mean_cv(mean, variance.sqrt() / mean, truncate)
    }

    pub fn from_config(cfg: &SampledValue) -> Result<Self> {
        cfg.validate("sampled value").map_err(SimError::scenario)?;
        match (cfg.cv, cfg.variance) {
            (Some(cv), None) => Self::from_mean_cv(cfg.mean, cv, cfg.truncate),
            (None, Some(var)) => Self::from_mean_variance(cfg.mean, var, cfg.truncate),
            (None, None) => Self::from_mean_cv(cfg.mean, 0.0, cfg.truncate),
            (Some(_), Some(_)) => unreachable!("rejected by validate"),
        }
    }

    /// Multiply the mean by a scalar. Sigma is independent of the mean, so
    /// the CV is preserved.
    pub fn scale_mean(&mut self, scalar: f64) {
        self.mu += scalar.ln();
    }

    pub fn mean(&self) -> f64 {
        if self.sigma == 0.0 {
            self.mu.exp()
        } else {
            (self.mu + 0.5 * self.sigma * self.sigma).exp()
        }
    }

    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        let draw = |rng: &mut LocalRng| {
            if self.sigma == 0.0 {
                self.mu.exp()
            } else {
                rng.log_normal(self.mu, self.sigma)
            }
        };
        match self.truncate {
            None => draw(rng),
            Some(bound) => {
                // Proper upper truncation: resample above the bound. The
                // retry cap guards against bounds in the far lower tail.
                for _ in 0..1000 {
                    let x = draw(rng);
                    if x <= bound {
                        return x;
                    }
                }
                bound
            }
        }
    }

    pub fn sample_from(&self, sample: NormalSample) -> f64 {
        sample.as_lognormal(self.mu, self.sigma)
    }

    /// P(X <= x).
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if self.sigma == 0.0 {
            return if x.ln() >= self.mu { 1.0 } else { 0.0 };
        }
        LogNormalDist::new(self.mu, self.sigma).expect("valid log-normal").cdf(x)
    }
}

/// Sampler for gamma values, configured from (mean, CV) or (mean, variance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaSampler {
    mean: f64,
    k: f64,
    theta: f64,
    truncate: Option<f64>,
}

impl GammaSampler {
    pub fn from_mean_cv(mean: f64, cv: f64, truncate: Option<f64>) -> Result<Self> {
        if mean <= 0.0 || cv < 0.0 {
            return Err(SimError::scenario(format!(
                "gamma requires mean > 0 and CV >= 0 (got mean={mean}, CV={cv})"
            )));
        }
        if cv == 0.0 {
            return Ok(Self { mean, k: f64::NAN, theta: f64::NAN, truncate });
        }
        let k = 1.0 / (cv * cv);
        Ok(Self { mean, k, theta: mean / k, truncate })
    }

    pub fn from_mean_variance(mean: f64, variance: f64, truncate: Option<f64>) -> Result<Self> {
        if mean <= 0.0 || variance < 0.0 {
            return Err(SimError::scenario("gamma requires mean > 0, variance >= 0"));
        }
        Self::from_mean_cv(mean, variance.sqrt() / mean, truncate)
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    fn degenerate(&self) -> bool {
        self.k.is_nan()
    }

    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        if self.degenerate() {
            return self.mean;
        }
        match self.truncate {
            None => rng.gamma(self.k, self.theta),
            Some(bound) => {
                for _ in 0..1000 {
                    let x = rng.gamma(self.k, self.theta);
                    if x <= bound {
                        return x;
                    }
                }
                bound
            }
        }
    }

    /// P(X <= x).
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if self.degenerate() {
            return if x >= self.mean { 1.0 } else { 0.0 };
        }
        GammaDist::new(self.k, 1.0 / self.theta).expect("valid gamma").cdf(x)
    }
}

/// Sampler for the beta distribution.
///
/// When `b` is zero, `a` holds the mean and is returned without sampling
/// (the variance-zero special case).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BetaSampler {
    a: f64,
    b: f64,
}

impl BetaSampler {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if beta != 0.0 && (alpha <= 0.0 || beta < 0.0) {
            return Err(SimError::scenario(format!("invalid beta parameters ({alpha}, {beta})")));
        }
        Ok(Self { a: alpha, b: beta })
    }

    /// Parameters solved from mean and variance. Variance zero means the
    /// mean is returned directly.
    pub fn from_mean_variance(mean: f64, variance: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&mean) || variance < 0.0 {
            return Err(SimError::scenario(format!(
                "beta requires mean in [0,1] and variance >= 0 (got {mean}, {variance})"
            )));
        }
        if variance == 0.0 {
            return Ok(Self { a: mean, b: 0.0 });
        }
        let c = mean * (1.0 - mean) / variance - 1.0;
        if c <= 0.0 {
            return Err(SimError::scenario("beta variance too large for the mean"));
        }
        Ok(Self { a: mean * c, b: (1.0 - mean) * c })
    }

    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        if self.b == 0.0 {
            self.a
        } else {
            rng.beta(self.a, self.b)
        }
    }

    pub fn mean(&self) -> f64 {
        if self.b == 0.0 {
            self.a
        } else {
            self.a / (self.a + self.b)
        }
    }
}

/// Sampler for the Weibull distribution (scale λ, shape k).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeibullSampler {
    scale: f64,
    shape: f64,
}

impl WeibullSampler {
    pub fn new(lambda: f64, k: f64) -> Result<Self> {
        if lambda <= 0.0 || k <= 0.0 {
            return Err(SimError::scenario(format!("invalid weibull parameters ({lambda}, {k})")));
        }
        Ok(Self { scale: lambda, shape: k })
    }

    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        rng.weibull(self.scale, self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lognormal_point_mass() {
        let s = LognormalSampler::from_mean_cv(3.0, 0.0, None).unwrap();
        let mut rng = LocalRng::master(1);
        assert!((s.sample(&mut rng) - 3.0).abs() < 1e-12);
        assert_eq!(s.cdf(2.9), 0.0);
        assert_eq!(s.cdf(3.1), 1.0);
    }

    #[test]
    fn test_lognormal_zero_mean() {
        let s = LognormalSampler::from_mean_cv(0.0, 0.0, None).unwrap();
        let mut rng = LocalRng::master(1);
        assert_eq!(s.sample(&mut rng), 0.0);
        assert!(LognormalSampler::from_mean_cv(0.0, 0.5, None).is_err());
    }

    #[test]
    fn test_lognormal_mean_preserved() {
        let s = LognormalSampler::from_mean_cv(2.5, 0.8, None).unwrap();
        assert!((s.mean() - 2.5).abs() < 1e-9);
        let mut rng = LocalRng::master(2);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| s.sample(&mut rng)).sum();
        assert!((sum / n as f64 - 2.5).abs() < 0.1);
    }

    #[test]
    fn test_lognormal_scale_mean() {
        let mut s = LognormalSampler::from_mean_cv(2.0, 0.5, None).unwrap();
        s.scale_mean(3.0);
        assert!((s.mean() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_lognormal_truncation() {
        let s = LognormalSampler::from_mean_cv(1.0, 1.0, Some(2.0)).unwrap();
        let mut rng = LocalRng::master(3);
        for _ in 0..1000 {
            assert!(s.sample(&mut rng) <= 2.0);
        }
    }

    #[test]
    fn test_gamma_degenerate() {
        let s = GammaSampler::from_mean_cv(4.0, 0.0, None).unwrap();
        let mut rng = LocalRng::master(1);
        assert_eq!(s.sample(&mut rng), 4.0);
        assert_eq!(s.cdf(3.9), 0.0);
        assert_eq!(s.cdf(4.0), 1.0);
    }

    #[test]
    fn test_gamma_mean_preserved() {
        let s = GammaSampler::from_mean_variance(5.0, 2.0, None).unwrap();
        let mut rng = LocalRng::master(4);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| s.sample(&mut rng)).sum();
        assert!((sum / n as f64 - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_beta_zero_variance_returns_mean() {
        let s = BetaSampler::from_mean_variance(0.7, 0.0).unwrap();
        let mut rng = LocalRng::master(1);
        assert_eq!(s.sample(&mut rng), 0.7);
    }

    #[test]
    fn test_beta_moments() {
        let s = BetaSampler::from_mean_variance(0.3, 0.01).unwrap();
        assert!((s.mean() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_correlated_normal_samples() {
        let mut rng = LocalRng::master(11);
        let rho: f64 = 0.6;
        let factor = (1.0 - rho * rho).sqrt();
        let n = 40_000;
        let mut sum_xy = 0.0;
        let mut sum_y2 = 0.0;
        for _ in 0..n {
            let base = NormalSample::generate(&mut rng);
            let cor = NormalSample::generate_correlated(base, rho, factor, &mut rng);
            let (x, y) = (base.as_normal(0.0, 1.0), cor.as_normal(0.0, 1.0));
            sum_xy += x * y;
            sum_y2 += y * y;
        }
        // corr(x, y) = rho and var(y) = 1.
        assert!((sum_xy / n as f64 - rho).abs() < 0.02);
        assert!((sum_y2 / n as f64 - 1.0).abs() < 0.03);
    }
}
