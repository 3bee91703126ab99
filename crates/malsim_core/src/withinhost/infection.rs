//! A single blood-stage infection.
//!
//! Infections are created by inoculation, updated every step and destroyed
//! when their density crosses the extinction threshold, when they outlive
//! their model-specific maximum duration, or when a treatment covering
//! their stage is applied. An infection is liver-stage for the configured
//! pre-patent latency and blood-stage afterwards.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;
use crate::withinhost::descriptive::DescriptiveState;
use crate::withinhost::empirical::EmpiricalState;
use crate::withinhost::molineaux::MolineauxState;
use crate::withinhost::WithinHostParams;

/// The maximum parasite density allowed per infection; higher values are
/// clamped rather than treated as errors.
pub const MAX_DENS: f64 = 2_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InfectionOrigin {
    /// Acquired from the local mosquito population.
    #[default]
    Indigenous = 0,
    /// Acquired locally but traceable to an imported case.
    Introduced = 1,
    /// Directly imported.
    Imported = 2,
}

impl InfectionOrigin {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => InfectionOrigin::Introduced,
            2 => InfectionOrigin::Imported,
            _ => InfectionOrigin::Indigenous,
        }
    }
}

/// Multiplicative density-survival factors applied on each update.
#[derive(Debug, Clone, Copy)]
pub struct SurvivalFactors {
    /// Acquired-immunity survival factor.
    pub immunity: f64,
    /// Innate immunity, sampled per host at birth.
    pub innate: f64,
    /// Blood-stage vaccine factor.
    pub bsv: f64,
    /// Drug-action survival factor from the PK/PD interface.
    pub drug: f64,
}

impl SurvivalFactors {
    pub fn combined(&self) -> f64 {
        self.immunity * self.innate * self.bsv * self.drug
    }
}

#[derive(Debug, Clone)]
pub enum InfectionKind {
    Descriptive(DescriptiveState),
    Empirical(EmpiricalState),
    Molineaux(MolineauxState),
}

#[derive(Debug, Clone)]
pub struct Infection {
    /// Day of inoculation (start of the liver stage).
    start_date: SimTime,
    genotype: usize,
    origin: InfectionOrigin,
    /// Current blood-stage density, parasites/microlitre.
    density: f64,
    /// Cumulative exposure since the start of this infection
    /// (sum of density x step length).
    cumulative_exposure_j: f64,
    kind: InfectionKind,
}

impl Infection {
    pub fn new(
        rng: &mut LocalRng,
        now: SimTime,
        genotype: usize,
        origin: InfectionOrigin,
        params: &WithinHostParams,
    ) -> Self {
        let kind = match params.variant {
            malsim_data::scenario::WithinHostVariant::Descriptive => {
                InfectionKind::Descriptive(DescriptiveState::new(rng, &params.descriptive))
            }
            malsim_data::scenario::WithinHostVariant::Empirical => {
                InfectionKind::Empirical(EmpiricalState::new())
            }
            malsim_data::scenario::WithinHostVariant::Molineaux => {
                InfectionKind::Molineaux(MolineauxState::new(rng, &params.molineaux))
            }
        };
        Self { start_date: now, genotype, origin, density: 0.0, cumulative_exposure_j: 0.0, kind }
    }

    pub fn genotype(&self) -> usize {
        self.genotype
    }

    pub fn origin(&self) -> InfectionOrigin {
        self.origin
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn cumulative_exposure_j(&self) -> f64 {
        self.cumulative_exposure_j
    }

    /// Age of the infection at the start of the current step.
    pub fn age(&self, now: SimTime) -> SimTime {
        now - self.start_date
    }

    /// True once the pre-patent (liver-stage) latency has passed.
    pub fn blood_stage(&self, now: SimTime, params: &WithinHostParams) -> bool {
        self.age(now) >= params.latent_p
    }

    /// Resets immunity state specific to this infection; only called along
    /// with the within-host model's `clear_immunity`.
    pub fn clear_immunity(&mut self) {
        self.cumulative_exposure_j = 0.0;
    }

    /// Advance the infection by one step. Returns true if the infection is
    /// extinct and should be removed. `ts_max_density` accumulates the
    /// maximum daily density over the step across infections.
    pub fn update(
        &mut self,
        rng: &mut LocalRng,
        now: SimTime,
        surv: SurvivalFactors,
        cumulative_h: f64,
        params: &WithinHostParams,
        ts_max_density: &mut f64,
    ) -> bool {
        if !self.blood_stage(now, params) {
            self.density = 0.0;
            return false;
        }
        let blood_age = (self.age(now) - params.latent_p).in_days();
        let factor = surv.combined();
        let extinct = match &mut self.kind {
            InfectionKind::Descriptive(state) => state.update(
                rng,
                blood_age,
                factor,
                cumulative_h,
                params,
                &mut self.density,
                ts_max_density,
            ),
            InfectionKind::Empirical(state) => {
                let e = state.update(rng, blood_age, factor, params, &mut self.density);
                *ts_max_density = ts_max_density.max(self.density);
                e
            }
            InfectionKind::Molineaux(state) => {
                let e = state.update(rng, blood_age, factor, params, &mut self.density);
                *ts_max_density = ts_max_density.max(self.density);
                e
            }
        };
        self.cumulative_exposure_j += self.density * params.step_days as f64;
        extinct
    }
}

impl Default for Infection {
    fn default() -> Self {
        Self {
            start_date: SimTime::zero(),
            genotype: 0,
            origin: InfectionOrigin::Indigenous,
            density: 0.0,
            cumulative_exposure_j: 0.0,
            kind: InfectionKind::Empirical(EmpiricalState::new()),
        }
    }
}

impl Checkpoint for Infection {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.start_date.write_ckpt(w)?;
        self.genotype.write_ckpt(w)?;
        (self.origin as u8).write_ckpt(w)?;
        self.density.write_ckpt(w)?;
        self.cumulative_exposure_j.write_ckpt(w)?;
        match &self.kind {
            InfectionKind::Descriptive(s) => {
                0u8.write_ckpt(w)?;
                s.write_ckpt(w)
            }
            InfectionKind::Empirical(s) => {
                1u8.write_ckpt(w)?;
                s.write_ckpt(w)
            }
            InfectionKind::Molineaux(s) => {
                2u8.write_ckpt(w)?;
                s.write_ckpt(w)
            }
        }
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.start_date.read_ckpt(r)?;
        self.genotype.read_ckpt(r)?;
        let mut origin = 0u8;
        origin.read_ckpt(r)?;
        self.origin = InfectionOrigin::from_u8(origin);
        self.density.read_ckpt(r)?;
        self.cumulative_exposure_j.read_ckpt(r)?;
        let mut tag = 0u8;
        tag.read_ckpt(r)?;
        self.kind = match tag {
            0 => {
                let mut s = DescriptiveState::default();
                s.read_ckpt(r)?;
                InfectionKind::Descriptive(s)
            }
            1 => {
                let mut s = EmpiricalState::new();
                s.read_ckpt(r)?;
                InfectionKind::Empirical(s)
            }
            _ => {
                let mut s = MolineauxState::default();
                s.read_ckpt(r)?;
                InfectionKind::Molineaux(s)
            }
        };
        Ok(())
    }
}
