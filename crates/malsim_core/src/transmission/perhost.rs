//! Per-host, per-species vector parameters.
//!
//! Between a host and a mosquito species three baseline rates apply: the
//! availability rate α_i and the feeding-cycle survival probabilities P_B
//! (successful biting) and P_C·P_D (finding a resting site and surviving
//! the rest). Rates are sampled per host at birth; after the population is
//! built the availabilities are normalised so the population mean matches
//! the calibrated species-level value.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::SpeciesConfig;

use crate::error::Result;
use crate::impl_checkpoint;
use crate::util::rng::LocalRng;
use crate::util::sampler::{BetaSampler, GammaSampler, LognormalSampler};

/// Availability heterogeneity across hosts.
#[derive(Debug, Clone)]
pub enum AvailabilitySampler {
    Lognormal(LognormalSampler),
    Gamma(GammaSampler),
}

impl AvailabilitySampler {
    pub fn sample(&self, rng: &mut LocalRng) -> f64 {
        match self {
            AvailabilitySampler::Lognormal(s) => s.sample(rng),
            AvailabilitySampler::Gamma(s) => s.sample(rng),
        }
    }
}

/// Species-level distributions of the per-host rates.
#[derive(Debug, Clone)]
pub struct PerHostAnophParams {
    /// Availability rate α_i across hosts (mean 1 before normalisation).
    pub availability: AvailabilitySampler,
    /// P_B: probability of biting after finding the host.
    pub prob_biting: BetaSampler,
    /// P_C: probability of finding a resting site after feeding.
    pub prob_find_rest_site: BetaSampler,
    /// P_D: probability of surviving the resting period.
    pub prob_resting: BetaSampler,
}

impl PerHostAnophParams {
    pub fn from_config(cfg: &SpeciesConfig) -> Result<Self> {
        let availability = if cfg.availability_distr == "gamma" && cfg.availability_cv > 0.0 {
            AvailabilitySampler::Gamma(GammaSampler::from_mean_cv(1.0, cfg.availability_cv, None)?)
        } else {
            AvailabilitySampler::Lognormal(LognormalSampler::from_mean_cv(
                1.0,
                cfg.availability_cv,
                None,
            )?)
        };
        Ok(Self {
            availability,
            prob_biting: BetaSampler::from_mean_variance(
                cfg.prob_biting.mean,
                cfg.prob_biting.variance,
            )?,
            prob_find_rest_site: BetaSampler::from_mean_variance(
                cfg.prob_find_rest_site.mean,
                cfg.prob_find_rest_site.variance,
            )?,
            prob_resting: BetaSampler::from_mean_variance(
                cfg.prob_resting.mean,
                cfg.prob_resting.variance,
            )?,
        })
    }
}

/// Sampled per-host rates for one species, before interventions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerHostAnoph {
    /// Availability rate of this host to the species, including the
    /// heterogeneity factor but excluding age and intervention factors.
    pub availability: f64,
    /// P_B in the absence of interventions.
    pub prob_biting: f64,
    /// P_C * P_D in the absence of interventions.
    pub prob_rest: f64,
}

impl_checkpoint!(PerHostAnoph: availability, prob_biting, prob_rest);

impl PerHostAnoph {
    pub fn initialise(
        rng: &mut LocalRng,
        params: &PerHostAnophParams,
        availability_factor: f64,
    ) -> Self {
        Self {
            availability: params.availability.sample(rng) * availability_factor,
            prob_biting: params.prob_biting.sample(rng),
            prob_rest: params.prob_find_rest_site.sample(rng) * params.prob_resting.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::minimal_scenario;

    #[test]
    fn test_point_mass_rates() {
        let scenario = minimal_scenario();
        let params = PerHostAnophParams::from_config(&scenario.species[0]).unwrap();
        let mut rng = LocalRng::master(1);
        let ph = PerHostAnoph::initialise(&mut rng, &params, 1.0);
        assert!((ph.availability - 1.0).abs() < 1e-12);
        assert!((ph.prob_biting - 0.95).abs() < 1e-12);
        assert!((ph.prob_rest - 0.95 * 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_heterogeneous_availability_mean_one() {
        let mut scenario = minimal_scenario();
        scenario.species[0].availability_cv = 0.8;
        let params = PerHostAnophParams::from_config(&scenario.species[0]).unwrap();
        let mut rng = LocalRng::master(2);
        let n = 20_000;
        let sum: f64 =
            (0..n).map(|_| PerHostAnoph::initialise(&mut rng, &params, 1.0).availability).sum();
        assert!((sum / n as f64 - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_gamma_availability() {
        let mut scenario = minimal_scenario();
        scenario.species[0].availability_cv = 0.5;
        scenario.species[0].availability_distr = "gamma".into();
        let params = PerHostAnophParams::from_config(&scenario.species[0]).unwrap();
        assert!(matches!(params.availability, AvailabilitySampler::Gamma(_)));
    }
}
