//! Vector (mosquito) transmission.
//!
//! One `AnophelesModel` per species wraps the daily delay-difference core,
//! an emergence sub-model and the per-host parameter distributions. The
//! `VectorModel` coordinates the species and distributes the resulting
//! infectious bites over hosts.

use malsim_data::scenario::Scenario;

use crate::error::Result;
use crate::genotypes::Genotypes;
use crate::util::checkpoint::Checkpoint;

pub mod anopheles;
pub mod emergence;
pub mod fitter;
pub mod mosq;
pub mod perhost;

pub use anopheles::AnophelesModel;
pub use perhost::{PerHostAnoph, PerHostAnophParams};

/// All mosquito species of a scenario.
#[derive(Debug)]
pub struct VectorModel {
    pub species: Vec<AnophelesModel>,
    n_genotypes: usize,
}

impl VectorModel {
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        let n_genotypes = scenario.num_genotypes();
        let species = scenario
            .species
            .iter()
            .map(|cfg| AnophelesModel::from_config(cfg, n_genotypes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { species, n_genotypes })
    }

    pub fn num_species(&self) -> usize {
        self.species.len()
    }

    pub fn n_genotypes(&self) -> usize {
        self.n_genotypes
    }

    /// Slots of the stratified mosquito arrays and host EIR buffers:
    /// genotypes times transmission-chain origins.
    pub fn n_strata(&self) -> usize {
        self.n_genotypes * crate::withinhost::ORIGIN_STRATA
    }

    pub fn reset_step(&mut self) {
        for s in &mut self.species {
            s.reset_step();
        }
    }

    /// Seed all species' state buffers (start of the pre-init phase).
    pub fn init_state(&mut self, population_size: usize, genotypes: &Genotypes, start_day: i32) {
        for s in &mut self.species {
            s.init_state(population_size, genotypes, start_day);
        }
    }

    pub fn compute_ts_probs(&mut self, forced: bool, genotypes: &Genotypes) {
        for s in &mut self.species {
            s.compute_ts_probs(forced, genotypes);
        }
    }

    pub fn advance_step(&mut self, day0: i32, step_days: i32, is_dynamic: bool) {
        for s in &mut self.species {
            s.advance_step(day0, step_days, is_dynamic);
        }
    }

    /// One calibration iteration across species; true if any species needs
    /// another.
    pub fn init_iterate(&mut self, last_day: i32, tolerance: f64) -> Result<bool> {
        let mut more = false;
        for s in &mut self.species {
            more |= s.init_iterate(last_day, tolerance)?;
        }
        Ok(more)
    }
}

impl Checkpoint for VectorModel {
    fn write_ckpt(&self, w: &mut dyn std::io::Write) -> Result<()> {
        for s in &self.species {
            s.write_ckpt(w)?;
        }
        Ok(())
    }
    fn read_ckpt(&mut self, r: &mut dyn std::io::Read) -> Result<()> {
        for s in &mut self.species {
            s.read_ckpt(r)?;
        }
        Ok(())
    }
}
