//! Indoor residual spraying.
//!
//! A deployment stores its sampled initial insecticide; the remaining
//! content decays from the deployment date. Per-species deterrency and
//! pre-/post-prandial killing are functions of the remaining content.
//! There are no hole or rip dynamics.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::{IrsConfig, IrsEffect as IrsEffectCfg};

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::decay::{DecayFnHet, DecayFunction};
use crate::util::rng::LocalRng;
use crate::util::sampler::NormalSampler;

/// Killing effect of sprayed walls, a function of insecticide content.
#[derive(Debug, Clone)]
pub struct IrsKillingEffect {
    base: f64,
    insecticide: f64,
    insecticide_scaling: f64,
    inv_base_survival: f64,
}

impl IrsKillingEffect {
    pub fn from_config(cfg: &IrsEffectCfg, what: &str) -> Result<Self> {
        if cfg.base_factor >= 1.0 || cfg.base_factor + cfg.insecticide_factor > 1.0 {
            return Err(SimError::scenario(format!(
                "{what}: killing factors must keep the survival factor in [0, 1]"
            )));
        }
        Ok(Self {
            base: cfg.base_factor,
            insecticide: cfg.insecticide_factor,
            insecticide_scaling: cfg.insecticide_scaling,
            inv_base_survival: 1.0 / (1.0 - cfg.base_factor),
        })
    }

    pub fn survival_factor(&self, insecticide: f64) -> f64 {
        let p = 1.0 - (-insecticide * self.insecticide_scaling).exp();
        ((1.0 - (self.base + self.insecticide * p)) * self.inv_base_survival).clamp(0.0, 1.0)
    }
}

/// Deterrency of sprayed walls; the factor is on the log scale.
#[derive(Debug, Clone)]
pub struct IrsDeterrency {
    l_insecticide: f64,
    insecticide_scaling: f64,
}

impl IrsDeterrency {
    pub fn from_config(cfg: &IrsEffectCfg) -> Self {
        Self { l_insecticide: cfg.insecticide_factor, insecticide_scaling: cfg.insecticide_scaling }
    }

    pub fn relative_attractiveness(&self, insecticide: f64) -> f64 {
        let p = 1.0 - (-insecticide * self.insecticide_scaling).exp();
        (self.l_insecticide * p).exp()
    }
}

#[derive(Debug, Clone)]
pub struct IrsSpecies {
    deterrency: IrsDeterrency,
    pre_prandial: IrsKillingEffect,
    post_prandial: IrsKillingEffect,
}

#[derive(Debug)]
pub struct IrsComponent {
    initial_insecticide: NormalSampler,
    max_insecticide: f64,
    insecticide_decay: DecayFunction,
    species: Vec<IrsSpecies>,
}

impl IrsComponent {
    pub fn from_config(cfg: &IrsConfig, species_order: &[String]) -> Result<Self> {
        let mut species = Vec::with_capacity(species_order.len());
        for name in species_order {
            let sp = cfg
                .species
                .iter()
                .find(|s| &s.species == name)
                .ok_or_else(|| SimError::scenario(format!("IRS: no parameters for species {name}")))?;
            species.push(IrsSpecies {
                deterrency: IrsDeterrency::from_config(&sp.deterrency),
                pre_prandial: IrsKillingEffect::from_config(&sp.pre_prandial, "IRS pre-prandial")?,
                post_prandial: IrsKillingEffect::from_config(&sp.post_prandial, "IRS post-prandial")?,
            });
        }
        Ok(Self {
            initial_insecticide: NormalSampler::new(
                cfg.initial_insecticide.mean,
                cfg.initial_insecticide.sd,
            )?,
            max_insecticide: cfg.max_insecticide,
            insecticide_decay: DecayFunction::from_config(&cfg.insecticide_decay)?,
            species,
        })
    }
}

/// The state of one spray round in one house.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumanIrs {
    deploy_time: SimTime,
    initial_insecticide: f64,
    insecticide_decay_het: DecayFnHet,
}

impl_checkpoint!(HumanIrs: deploy_time, initial_insecticide, insecticide_decay_het);

impl HumanIrs {
    pub fn deploy(rng: &mut LocalRng, params: &IrsComponent, now: SimTime) -> Self {
        Self {
            deploy_time: now,
            initial_insecticide: params
                .initial_insecticide
                .sample(rng)
                .clamp(0.0, params.max_insecticide),
            insecticide_decay_het: params.insecticide_decay.het_sample(rng),
        }
    }

    pub fn insecticide_content(&self, params: &IrsComponent, now: SimTime) -> f64 {
        let age = (now - self.deploy_time).in_days() as f64;
        self.initial_insecticide
            * params.insecticide_decay.eval(age, self.insecticide_decay_het)
    }

    pub fn relative_attractiveness(&self, params: &IrsComponent, species: usize, now: SimTime) -> f64 {
        params.species[species]
            .deterrency
            .relative_attractiveness(self.insecticide_content(params, now))
    }

    pub fn pre_prandial_survival(&self, params: &IrsComponent, species: usize, now: SimTime) -> f64 {
        params.species[species]
            .pre_prandial
            .survival_factor(self.insecticide_content(params, now))
    }

    pub fn post_prandial_survival(&self, params: &IrsComponent, species: usize, now: SimTime) -> f64 {
        params.species[species]
            .post_prandial
            .survival_factor(self.insecticide_content(params, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::irs_config;

    fn component() -> IrsComponent {
        IrsComponent::from_config(&irs_config(), &["gambiae".to_string()]).unwrap()
    }

    #[test]
    fn test_fresh_spray_effective() {
        let params = component();
        let mut rng = LocalRng::master(1);
        let irs = HumanIrs::deploy(&mut rng, &params, SimTime::zero());
        assert!(irs.relative_attractiveness(&params, 0, SimTime::zero()) < 1.0);
        assert!(irs.post_prandial_survival(&params, 0, SimTime::zero()) < 1.0);
    }

    #[test]
    fn test_effects_decay_to_nothing() {
        let params = component();
        let mut rng = LocalRng::master(2);
        let irs = HumanIrs::deploy(&mut rng, &params, SimTime::zero());
        let old = SimTime::from_years(30.0);
        assert!(irs.insecticide_content(&params, old) < 1e-3);
        assert!((irs.relative_attractiveness(&params, 0, old) - 1.0).abs() < 1e-2);
        assert!((irs.post_prandial_survival(&params, 0, old) - 1.0).abs() < 1e-2);
    }
}
