//! Insecticide-treated nets.
//!
//! Each deployed net carries sampled initial insecticide, hole and rip
//! rates and a disposal time drawn from the attrition function. Holes
//! accumulate by Poisson sampling; the hole index combines hole count and
//! rip-enlarged holes. Per-species effects (deterrency, pre- and
//! post-prandial killing) are functions of the hole index and the decayed
//! insecticide content.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::{ItnConfig, ItnEffect as ItnEffectCfg};

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::time::{SimTime, DAYS_PER_YEAR};
use crate::util::decay::{DecayFnHet, DecayFunction};
use crate::util::rng::LocalRng;
use crate::util::sampler::{LognormalSampler, NormalSampler};

/// Killing effect of a net on mosquitoes: base, hole, insecticide and
/// interaction factors with exponential scalings.
#[derive(Debug, Clone)]
pub struct SurvivalEffect {
    base: f64,
    hole: f64,
    insecticide: f64,
    interaction: f64,
    hole_scaling: f64,
    insecticide_scaling: f64,
    /// 1 / (1 - base); the survival factor is normalised so a pristine
    /// untreated net gives 1.
    inv_base_survival: f64,
}

impl SurvivalEffect {
    pub fn from_config(cfg: &ItnEffectCfg, what: &str) -> Result<Self> {
        let killing_max = cfg.base_factor + cfg.hole_factor + cfg.insecticide_factor + cfg.interaction_factor;
        if cfg.base_factor >= 1.0 || killing_max > 1.0 {
            return Err(SimError::scenario(format!(
                "{what}: killing factors must keep the survival factor in [0, 1]"
            )));
        }
        if cfg.hole_scaling < 0.0 || cfg.insecticide_scaling < 0.0 {
            return Err(SimError::scenario(format!("{what}: scaling factors must be >= 0")));
        }
        Ok(Self {
            base: cfg.base_factor,
            hole: cfg.hole_factor,
            insecticide: cfg.insecticide_factor,
            interaction: cfg.interaction_factor,
            hole_scaling: cfg.hole_scaling,
            insecticide_scaling: cfg.insecticide_scaling,
            inv_base_survival: 1.0 / (1.0 - cfg.base_factor),
        })
    }

    /// Additional survival factor imposed on feeding mosquitoes; tends to 1
    /// as the net ages.
    pub fn survival_factor(&self, hole_index: f64, insecticide: f64) -> f64 {
        let h = (-hole_index * self.hole_scaling).exp();
        let p = 1.0 - (-insecticide * self.insecticide_scaling).exp();
        let killing = self.base + self.hole * h + self.insecticide * p + self.interaction * h * p;
        ((1.0 - killing) * self.inv_base_survival).clamp(0.0, 1.0)
    }
}

/// Deterrency: relative attractiveness of a protected host. Factors are on
/// the log scale; negative values deter, 0 has no effect.
#[derive(Debug, Clone)]
pub struct DeterrencyEffect {
    l_hole: f64,
    l_insecticide: f64,
    l_interaction: f64,
    hole_scaling: f64,
    insecticide_scaling: f64,
}

impl DeterrencyEffect {
    pub fn from_config(cfg: &ItnEffectCfg) -> Self {
        Self {
            l_hole: cfg.hole_factor,
            l_insecticide: cfg.insecticide_factor,
            l_interaction: cfg.interaction_factor,
            hole_scaling: cfg.hole_scaling,
            insecticide_scaling: cfg.insecticide_scaling,
        }
    }

    /// Range: > 0, where values below 1 deter and 1 has no effect.
    pub fn relative_attractiveness(&self, hole_index: f64, insecticide: f64) -> f64 {
        let h = (-hole_index * self.hole_scaling).exp();
        let p = 1.0 - (-insecticide * self.insecticide_scaling).exp();
        (self.l_hole * h + self.l_insecticide * p + self.l_interaction * h * p).exp()
    }
}

/// Per-species effect parameters of one net type.
#[derive(Debug, Clone)]
pub struct ItnSpecies {
    proportion_protected: f64,
    deterrency: DeterrencyEffect,
    pre_prandial: SurvivalEffect,
    post_prandial: SurvivalEffect,
}

impl ItnSpecies {
    /// Mix a protected-host effect with the unprotected remainder.
    fn by_protection(&self, x: f64) -> f64 {
        x * self.proportion_protected + (1.0 - self.proportion_protected)
    }
}

/// The net type: sampling distributions and per-species effects.
/// `species` is indexed by the scenario's species order.
#[derive(Debug)]
pub struct ItnComponent {
    initial_insecticide: NormalSampler,
    max_insecticide: f64,
    /// Holes per year, sampled per net.
    hole_rate: LognormalSampler,
    /// Rips per hole per year, sampled per net.
    rip_rate: LognormalSampler,
    /// Weight of a rip relative to a hole in the hole index.
    rip_factor: f64,
    insecticide_decay: DecayFunction,
    attrition: DecayFunction,
    species: Vec<ItnSpecies>,
}

impl ItnComponent {
    pub fn from_config(cfg: &ItnConfig, species_order: &[String]) -> Result<Self> {
        let mut species = Vec::with_capacity(species_order.len());
        for name in species_order {
            let sp = cfg
                .species
                .iter()
                .find(|s| &s.species == name)
                .ok_or_else(|| SimError::scenario(format!("ITN: no parameters for species {name}")))?;
            species.push(ItnSpecies {
                proportion_protected: sp.proportion_use,
                deterrency: DeterrencyEffect::from_config(&sp.deterrency),
                pre_prandial: SurvivalEffect::from_config(&sp.pre_prandial, "ITN pre-prandial")?,
                post_prandial: SurvivalEffect::from_config(&sp.post_prandial, "ITN post-prandial")?,
            });
        }
        Ok(Self {
            initial_insecticide: NormalSampler::new(
                cfg.initial_insecticide.mean,
                cfg.initial_insecticide.sd,
            )?,
            max_insecticide: cfg.max_insecticide,
            hole_rate: LognormalSampler::from_config(&cfg.hole_rate)?,
            rip_rate: LognormalSampler::from_config(&cfg.rip_rate)?,
            rip_factor: cfg.rip_factor,
            insecticide_decay: DecayFunction::from_config(&cfg.insecticide_decay)?,
            attrition: DecayFunction::from_config(&cfg.attrition)?,
            species,
        })
    }
}

/// The state of one deployed net.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HumanItn {
    deploy_time: SimTime,
    /// The net is discarded at this time.
    disposal_time: SimTime,
    n_holes: u64,
    hole_index: f64,
    /// mg/m^2 at deployment.
    initial_insecticide: f64,
    /// Holes per step, fixed per net.
    hole_rate: f64,
    /// Rips per hole per step, fixed per net.
    rip_rate: f64,
    insecticide_decay_het: DecayFnHet,
}

impl_checkpoint!(HumanItn: deploy_time, disposal_time, n_holes, hole_index,
    initial_insecticide, hole_rate, rip_rate, insecticide_decay_het);

impl HumanItn {
    pub fn deploy(rng: &mut LocalRng, params: &ItnComponent, now: SimTime, step_days: i32) -> Self {
        let per_step = step_days as f64 / DAYS_PER_YEAR as f64;
        Self {
            deploy_time: now,
            disposal_time: now
                + SimTime::from_days(params.attrition.sample_decay_age(rng).min(1e9) as i32),
            n_holes: 0,
            hole_index: 0.0,
            initial_insecticide: params
                .initial_insecticide
                .sample(rng)
                .clamp(0.0, params.max_insecticide),
            hole_rate: params.hole_rate.sample(rng) * per_step,
            rip_rate: params.rip_rate.sample(rng) * per_step,
            insecticide_decay_het: params.insecticide_decay.het_sample(rng),
        }
    }

    /// Per-step hole and rip dynamics. Returns false once the net has been
    /// disposed of.
    pub fn update(&mut self, rng: &mut LocalRng, params: &ItnComponent, now: SimTime) -> Result<bool> {
        if now >= self.disposal_time {
            return Ok(false);
        }
        let new_holes = rng.poisson(self.hole_rate)?;
        let rips = rng.poisson(self.n_holes as f64 * self.rip_rate)?;
        self.n_holes += new_holes;
        self.hole_index += new_holes as f64 + rips as f64 * params.rip_factor;
        Ok(true)
    }

    pub fn insecticide_content(&self, params: &ItnComponent, now: SimTime) -> f64 {
        let age = (now - self.deploy_time).in_days() as f64;
        self.initial_insecticide
            * params.insecticide_decay.eval(age, self.insecticide_decay_het)
    }

    pub fn relative_attractiveness(
        &self,
        params: &ItnComponent,
        species: usize,
        now: SimTime,
    ) -> f64 {
        let sp = &params.species[species];
        let insecticide = self.insecticide_content(params, now);
        sp.by_protection(sp.deterrency.relative_attractiveness(self.hole_index, insecticide))
    }

    pub fn pre_prandial_survival(
        &self,
        params: &ItnComponent,
        species: usize,
        now: SimTime,
    ) -> f64 {
        let sp = &params.species[species];
        let insecticide = self.insecticide_content(params, now);
        sp.by_protection(sp.pre_prandial.survival_factor(self.hole_index, insecticide))
    }

    pub fn post_prandial_survival(
        &self,
        params: &ItnComponent,
        species: usize,
        now: SimTime,
    ) -> f64 {
        let sp = &params.species[species];
        let insecticide = self.insecticide_content(params, now);
        sp.by_protection(sp.post_prandial.survival_factor(self.hole_index, insecticide))
    }

    pub fn hole_index(&self) -> f64 {
        self.hole_index
    }
}
