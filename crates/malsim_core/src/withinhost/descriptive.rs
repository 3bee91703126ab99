//! The descriptive (5-day) infection model.
//!
//! Each infection samples a total duration from a fitted log-normal
//! distribution, bounded by a hard maximum, and follows a precomputed mean
//! log-density surface indexed by infection age and duration. Pathogenesis
//! was calibrated on daily density maxima, so the step maximum is emulated
//! from five daily samples of the same curve.

use serde::{Deserialize, Serialize};

use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::rng::LocalRng;
use crate::withinhost::infection::MAX_DENS;
use crate::withinhost::WithinHostParams;

/// Maximum duration of density sample data, in time steps. Longer
/// infections repeat the final column until they terminate.
pub const MAX_DURATION_TS: usize = 83;
/// Above plus a category for zero.
pub const NUM_DURATIONS: usize = 84;

// Log-duration distribution of untreated infections (malariatherapy data).
const MEAN_LOG_DURATION: f64 = 5.13;
const SD_LOG_DURATION: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct DescriptiveParams {
    step_days: i32,
    sigma0_sq: f64,
    x_nu_star: f64,
    extinction_level: f64,
    /// Triangular matrix: `mean_log_density[age * NUM_DURATIONS + dur]` is
    /// the expected log density at age `age` (steps) of an infection lasting
    /// `dur` steps. Entries with age >= dur are unused.
    mean_log_density: Vec<f64>,
}

impl DescriptiveParams {
    pub fn new(
        step_days: i32,
        sigma0_sq: f64,
        x_nu_star: f64,
        extinction_level: f64,
        peak_log_density: f64,
        density_rise_days: f64,
    ) -> Self {
        let mut mean_log_density = vec![0.0; NUM_DURATIONS * NUM_DURATIONS];
        for dur in 1..NUM_DURATIONS {
            for age in 0..dur {
                let age_days = (age as f64 + 0.5) * step_days as f64;
                let rise = 1.0 - (-age_days / density_rise_days).exp();
                let fall = 1.0 - age as f64 / dur as f64;
                mean_log_density[age * NUM_DURATIONS + dur] = peak_log_density * rise * fall;
            }
        }
        Self { step_days, sigma0_sq, x_nu_star, extinction_level, mean_log_density }
    }

    fn mean_log(&self, age_ts: usize, dur_ts: usize) -> f64 {
        let dur = dur_ts.clamp(1, MAX_DURATION_TS);
        let age = age_ts.min(dur - 1).min(MAX_DURATION_TS);
        self.mean_log_density[age * NUM_DURATIONS + dur]
    }

    /// Sample an infection duration (log-normal, hard-capped).
    fn sample_duration(&self, rng: &mut LocalRng) -> SimTime {
        let days = rng.log_normal(MEAN_LOG_DURATION, SD_LOG_DURATION);
        let max_days = (MAX_DURATION_TS as i32) * self.step_days;
        SimTime::from_days((days as i32).min(max_days).max(self.step_days))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptiveState {
    /// Predetermined duration of the blood stage.
    duration: SimTime,
}

impl_checkpoint!(DescriptiveState: duration);

impl DescriptiveState {
    pub fn new(rng: &mut LocalRng, params: &DescriptiveParams) -> Self {
        Self { duration: params.sample_duration(rng) }
    }

    pub(crate) fn update(
        &mut self,
        rng: &mut LocalRng,
        blood_age_days: i32,
        survival_factor: f64,
        cumulative_h: f64,
        params: &WithinHostParams,
        density: &mut f64,
        ts_max_density: &mut f64,
    ) -> bool {
        let dp = &params.descriptive;
        if blood_age_days > self.duration.in_days() {
            return true;
        }
        let age_ts = (blood_age_days / dp.step_days) as usize;
        let dur_ts = (self.duration.in_days() / dp.step_days).max(1) as usize;
        let mu = dp.mean_log(age_ts, dur_ts);
        // Variance shrinks with exposure: sigma^2 = sigma0^2 / (1 + h/X*_nu).
        let sigma = (dp.sigma0_sq / (1.0 + cumulative_h / dp.x_nu_star)).sqrt();

        let sample = (mu + sigma * rng.gauss(0.0, 1.0)).exp();
        let new_density = (sample * survival_factor).min(MAX_DENS);

        // Daily maximum over the step, from the same mean curve.
        let daily_max = rng.max_multi_log_normal(sample, dp.step_days, mu, sigma);
        *ts_max_density = ts_max_density.max((daily_max * survival_factor).min(MAX_DENS));

        *density = new_density;
        new_density < dp.extinction_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::withinhost::test_params;

    #[test]
    fn test_density_surface_is_triangular() {
        let p = DescriptiveParams::new(5, 0.66, 0.92, 0.1, 9.4, 10.0);
        // Unused entries (age >= duration) stay zero.
        assert_eq!(p.mean_log_density[10 * NUM_DURATIONS + 5], 0.0);
        // Early density of a long infection is positive.
        assert!(p.mean_log(1, 60) > 0.0);
        // Density declines towards the end of the infection.
        assert!(p.mean_log(1, 60) > p.mean_log(59, 60));
    }

    #[test]
    fn test_duration_capped() {
        let p = DescriptiveParams::new(5, 0.66, 0.92, 0.1, 9.4, 10.0);
        let mut rng = LocalRng::master(9);
        for _ in 0..1000 {
            let d = p.sample_duration(&mut rng);
            assert!(d.in_days() >= 5);
            assert!(d.in_days() <= 83 * 5);
        }
    }

    #[test]
    fn test_expires_at_duration() {
        let params = test_params(malsim_data::scenario::WithinHostVariant::Descriptive, 1);
        let mut rng = LocalRng::master(3);
        let mut state = DescriptiveState { duration: SimTime::from_days(20) };
        let mut density = 0.0;
        let mut ts_max = 0.0;
        assert!(!state.update(&mut rng, 10, 1.0, 1.0, &params, &mut density, &mut ts_max));
        assert!(state.update(&mut rng, 25, 1.0, 1.0, &params, &mut density, &mut ts_max));
    }

    #[test]
    fn test_max_density_at_least_end_density() {
        let params = test_params(malsim_data::scenario::WithinHostVariant::Descriptive, 1);
        let mut rng = LocalRng::master(4);
        let mut state = DescriptiveState { duration: SimTime::from_days(100) };
        let mut density = 0.0;
        let mut ts_max = 0.0;
        state.update(&mut rng, 10, 1.0, 1.0, &params, &mut density, &mut ts_max);
        assert!(ts_max >= density);
        assert!(density <= MAX_DENS);
    }
}
