//! Generic vector interventions.
//!
//! The catch-all vector intervention: three independent per-species
//! multipliers (deterrency, pre-prandial and post-prandial killing), each
//! applied as 1 - effect * decay(age).

use serde::{Deserialize, Serialize};

use malsim_data::scenario::GviConfig;

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::decay::{DecayFnHet, DecayFunction};
use crate::util::rng::LocalRng;

#[derive(Debug, Clone, Copy)]
pub struct GviSpecies {
    deterrency: f64,
    pre_prandial_killing: f64,
    post_prandial_killing: f64,
}

#[derive(Debug)]
pub struct GviComponent {
    decay: DecayFunction,
    species: Vec<GviSpecies>,
}

impl GviComponent {
    pub fn from_config(cfg: &GviConfig, species_order: &[String]) -> Result<Self> {
        let mut species = Vec::with_capacity(species_order.len());
        for name in species_order {
            let sp = cfg
                .species
                .iter()
                .find(|s| &s.species == name)
                .ok_or_else(|| SimError::scenario(format!("GVI: no parameters for species {name}")))?;
            for e in [sp.deterrency, sp.pre_prandial_killing, sp.post_prandial_killing] {
                if !(0.0..=1.0).contains(&e) {
                    return Err(SimError::scenario(format!(
                        "GVI {name}: effects must be in [0, 1]"
                    )));
                }
            }
            species.push(GviSpecies {
                deterrency: sp.deterrency,
                pre_prandial_killing: sp.pre_prandial_killing,
                post_prandial_killing: sp.post_prandial_killing,
            });
        }
        Ok(Self { decay: DecayFunction::from_config(&cfg.decay)?, species })
    }
}

/// The state of one deployment: only the heterogeneity sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumanGvi {
    deploy_time: SimTime,
    decay_het: DecayFnHet,
}

impl_checkpoint!(HumanGvi: deploy_time, decay_het);

impl HumanGvi {
    pub fn deploy(rng: &mut LocalRng, params: &GviComponent, now: SimTime) -> Self {
        Self { deploy_time: now, decay_het: params.decay.het_sample(rng) }
    }

    fn decay(&self, params: &GviComponent, now: SimTime) -> f64 {
        params.decay.eval((now - self.deploy_time).in_days() as f64, self.decay_het)
    }

    pub fn relative_attractiveness(&self, params: &GviComponent, species: usize, now: SimTime) -> f64 {
        1.0 - params.species[species].deterrency * self.decay(params, now)
    }

    pub fn pre_prandial_survival(&self, params: &GviComponent, species: usize, now: SimTime) -> f64 {
        1.0 - params.species[species].pre_prandial_killing * self.decay(params, now)
    }

    pub fn post_prandial_survival(&self, params: &GviComponent, species: usize, now: SimTime) -> f64 {
        1.0 - params.species[species].post_prandial_killing * self.decay(params, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::gvi_config;

    #[test]
    fn test_effects_decay() {
        let params = GviComponent::from_config(&gvi_config(), &["gambiae".to_string()]).unwrap();
        let mut rng = LocalRng::master(1);
        let gvi = HumanGvi::deploy(&mut rng, &params, SimTime::zero());
        let fresh = gvi.pre_prandial_survival(&params, 0, SimTime::zero());
        let aged = gvi.pre_prandial_survival(&params, 0, SimTime::from_years(10.0));
        assert!(fresh < 1.0);
        assert!(aged > fresh);
        assert!(gvi.relative_attractiveness(&params, 0, SimTime::zero()) < 1.0);
    }
}
