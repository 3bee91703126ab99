//! Vaccines: pre-erythrocytic, blood-stage and transmission-blocking.
//!
//! Each deployment records doses administered, the time of the last dose
//! and a beta-sampled initial efficacy for that dose number; the current
//! efficacy decays from the last dose. PEV multiplies the probability an
//! inoculation becomes an infection, BSV multiplies blood-stage density
//! growth and TBV multiplies the host-to-mosquito transmission probability.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::{VaccineConfig, VaccineKind};

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;
use crate::util::decay::{DecayFnHet, DecayFunction};
use crate::util::rng::LocalRng;

pub const NUM_VACCINE_TYPES: usize = 3;

pub fn kind_index(kind: VaccineKind) -> usize {
    match kind {
        VaccineKind::Pev => 0,
        VaccineKind::Bsv => 1,
        VaccineKind::Tbv => 2,
    }
}

#[derive(Debug)]
pub struct VaccineComponent {
    pub kind: VaccineKind,
    decay: DecayFunction,
    /// Mean initial efficacy per dose number.
    initial_mean_efficacy: Vec<f64>,
    /// Beta b parameter of the per-host efficacy distribution; 0 means the
    /// mean is used directly.
    efficacy_b: f64,
}

impl VaccineComponent {
    pub fn from_config(cfg: &VaccineConfig) -> Result<Self> {
        if cfg.initial_efficacy.is_empty() {
            return Err(SimError::scenario("vaccine needs at least one dose efficacy"));
        }
        Ok(Self {
            kind: cfg.kind,
            decay: DecayFunction::from_config(&cfg.decay)?,
            initial_mean_efficacy: cfg.initial_efficacy.clone(),
            efficacy_b: cfg.efficacy_b,
        })
    }
}

/// Per-human state of one vaccine type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerTypeVaccine {
    n_doses: u64,
    time_last_dose: SimTime,
    /// Undecayed efficacy at the last dose.
    initial_efficacy: f64,
    het: DecayFnHet,
    /// A missed age-based dose blocks the rest of the sequence until a
    /// mass campaign re-enters the host.
    epi_blocked: bool,
}

impl_checkpoint!(PerTypeVaccine: n_doses, time_last_dose, initial_efficacy, het, epi_blocked);

/// Per-human vaccine state over all three types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerHumanVaccine {
    types: Vec<PerTypeVaccine>,
}

impl PerHumanVaccine {
    pub fn new() -> Self {
        Self { types: vec![PerTypeVaccine::default(); NUM_VACCINE_TYPES] }
    }

    pub fn n_doses(&self, kind: VaccineKind) -> u64 {
        self.types[kind_index(kind)].n_doses
    }

    /// Administer one dose.
    pub fn vaccinate(
        &mut self,
        rng: &mut LocalRng,
        params: &VaccineComponent,
        now: SimTime,
        mass_campaign: bool,
    ) {
        let state = &mut self.types[kind_index(params.kind)];
        if state.n_doses == 0 {
            state.het = params.decay.het_sample(rng);
        }
        let dose_idx = (state.n_doses as usize).min(params.initial_mean_efficacy.len() - 1);
        let mean = params.initial_mean_efficacy[dose_idx];
        state.initial_efficacy = if params.efficacy_b > 0.0 && mean > 0.0 && mean < 1.0 {
            rng.beta_with_mean(mean, params.efficacy_b)
        } else {
            mean
        };
        state.n_doses += 1;
        state.time_last_dose = now;
        if mass_campaign {
            state.epi_blocked = false;
        }
    }

    /// Record a missed age-based dose; later doses of the sequence are
    /// skipped.
    pub fn miss_epi_dose(&mut self, kind: VaccineKind) {
        self.types[kind_index(kind)].epi_blocked = true;
    }

    pub fn epi_blocked(&self, kind: VaccineKind) -> bool {
        self.types[kind_index(kind)].epi_blocked
    }

    /// The survival multiplier of this vaccine type: 1 when unvaccinated
    /// or fully decayed, towards 1 - efficacy when fresh.
    pub fn factor(&self, params: &VaccineComponent, now: SimTime) -> f64 {
        let state = &self.types[kind_index(params.kind)];
        if state.n_doses == 0 {
            return 1.0;
        }
        let age = (now - state.time_last_dose).in_days() as f64;
        1.0 - state.initial_efficacy * params.decay.eval(age, state.het)
    }
}

impl Checkpoint for PerHumanVaccine {
    fn write_ckpt(&self, w: &mut dyn std::io::Write) -> Result<()> {
        self.types.write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn std::io::Read) -> Result<()> {
        self.types.read_ckpt(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::vaccine_config;

    fn component() -> VaccineComponent {
        VaccineComponent::from_config(&vaccine_config(VaccineKind::Pev)).unwrap()
    }

    #[test]
    fn test_unvaccinated_factor_is_one() {
        let params = component();
        let v = PerHumanVaccine::new();
        assert_eq!(v.factor(&params, SimTime::zero()), 1.0);
    }

    #[test]
    fn test_fresh_dose_reduces_factor() {
        let params = component();
        let mut v = PerHumanVaccine::new();
        let mut rng = LocalRng::master(1);
        v.vaccinate(&mut rng, &params, SimTime::zero(), true);
        let f = v.factor(&params, SimTime::zero());
        assert!(f < 1.0);
        assert_eq!(v.n_doses(VaccineKind::Pev), 1);
    }

    #[test]
    fn test_efficacy_decays() {
        let params = component();
        let mut v = PerHumanVaccine::new();
        let mut rng = LocalRng::master(2);
        v.vaccinate(&mut rng, &params, SimTime::zero(), true);
        let fresh = v.factor(&params, SimTime::zero());
        let later = v.factor(&params, SimTime::from_years(5.0));
        assert!(later > fresh);
        assert!(later <= 1.0);
    }

    #[test]
    fn test_dose_ladder_uses_last_entry_beyond_table() {
        let params = component();
        let mut v = PerHumanVaccine::new();
        let mut rng = LocalRng::master(3);
        for _ in 0..5 {
            v.vaccinate(&mut rng, &params, SimTime::zero(), true);
        }
        assert_eq!(v.n_doses(VaccineKind::Pev), 5);
        assert!(v.factor(&params, SimTime::zero()) < 1.0);
    }

    #[test]
    fn test_epi_blocking_cleared_by_mass_campaign() {
        let params = component();
        let mut v = PerHumanVaccine::new();
        let mut rng = LocalRng::master(4);
        v.miss_epi_dose(VaccineKind::Pev);
        assert!(v.epi_blocked(VaccineKind::Pev));
        v.vaccinate(&mut rng, &params, SimTime::zero(), true);
        assert!(!v.epi_blocked(VaccineKind::Pev));
    }
}
