//! The empirical (1-day) autoregressive infection model.
//!
//! Log densities follow a three-lag autoregressive process with
//! age-specific level and residual variance, tabulated per day of blood
//! stage. Sampling distinguishes sub-patent and patent regimes split at a
//! configured threshold, preserving continuity at the boundary, and each
//! draw is inflated by a per-step log-normal factor.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as NormalDist};

use crate::impl_checkpoint;
use crate::util::rng::LocalRng;
use crate::withinhost::infection::MAX_DENS;
use crate::withinhost::WithinHostParams;

/// Infections terminate after this many days of blood stage.
pub const MAX_DURATION_DAYS: i32 = 418;

// Autoregression coefficients on the last three log densities.
const AR: [f64; 3] = [0.45, 0.25, 0.12];

#[derive(Debug, Clone)]
pub struct EmpiricalParams {
    /// Age-specific process level, per blood-stage day (0..=418).
    intercept: Vec<f64>,
    /// Age-specific residual standard deviation.
    sigma: Vec<f64>,
    sub_patent_limit: f64,
    extinction_level: f64,
    inflation_mu: f64,
    inflation_sigma: f64,
}

impl EmpiricalParams {
    pub fn new(
        extinction_level: f64,
        sub_patent_limit: f64,
        peak_log_density: f64,
        density_rise_days: f64,
        inflation_mean: f64,
        inflation_cv: f64,
    ) -> Self {
        let n = MAX_DURATION_DAYS as usize + 1;
        let mut intercept = Vec::with_capacity(n);
        let mut sigma = Vec::with_capacity(n);
        let ar_sum: f64 = AR.iter().sum();
        for t in 0..n {
            let age = t as f64;
            let rise = 1.0 - (-age / density_rise_days).exp();
            let fall = 1.0 - age / MAX_DURATION_DAYS as f64;
            // Stationary level of the AR(3) process equals the target curve.
            intercept.push(peak_log_density * rise * fall * (1.0 - ar_sum));
            sigma.push(0.9 + 0.3 * (age / MAX_DURATION_DAYS as f64));
        }
        let inflation_sigma_sq = inflation_cv.mul_add(inflation_cv, 1.0).ln();
        Self {
            intercept,
            sigma,
            sub_patent_limit,
            extinction_level,
            inflation_mu: inflation_mean.max(f64::MIN_POSITIVE).ln() - 0.5 * inflation_sigma_sq,
            inflation_sigma: inflation_sigma_sq.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmpiricalState {
    /// Last three log densities, most recent first.
    lag: Vec<f64>,
}

impl_checkpoint!(EmpiricalState: lag);

impl EmpiricalState {
    pub fn new() -> Self {
        Self { lag: vec![0.0; 3] }
    }

    pub(crate) fn update(
        &mut self,
        rng: &mut LocalRng,
        blood_age_days: i32,
        survival_factor: f64,
        params: &WithinHostParams,
        density: &mut f64,
    ) -> bool {
        let ep = &params.empirical;
        if blood_age_days > MAX_DURATION_DAYS {
            return true;
        }
        let t = blood_age_days as usize;
        let mu = ep.intercept[t] + AR[0] * self.lag[0] + AR[1] * self.lag[1] + AR[2] * self.lag[2];
        let sigma = ep.sigma[t];

        // Split sampling at the sub-patent threshold; the two truncated
        // regimes share the boundary quantile, preserving continuity there.
        let unit = NormalDist::new(0.0, 1.0).expect("unit normal");
        let z_limit = (ep.sub_patent_limit.ln() - mu) / sigma;
        let p_sub = unit.cdf(z_limit);
        let u = if rng.bernoulli(p_sub) {
            rng.uniform_01() * p_sub
        } else {
            p_sub + rng.uniform_01() * (1.0 - p_sub)
        };
        let log_dens = mu + sigma * unit.inverse_cdf(u.clamp(1e-12, 1.0 - 1e-12));
        self.lag.rotate_right(1);
        self.lag[0] = log_dens;

        let inflation = rng.log_normal(ep.inflation_mu, ep.inflation_sigma);
        let new_density = (log_dens.exp() * inflation * survival_factor).min(MAX_DENS);
        *density = new_density;
        new_density < ep.extinction_level
    }
}

impl Default for EmpiricalState {
    fn default() -> Self {
        Self::new()
    }
}
