//! Clinical status and case management.
//!
//! Two interchangeable health-system models: immediate outcomes (5-day
//! step) resolving each episode on the step it occurs, and the event
//! scheduler (1-day step) tracking bouts, treatment-seeking delays and
//! decision trees day by day. Both feed the host's episode record, which
//! flushes to monitoring after the health-system memory window.

use std::io::{Read, Write};

use malsim_data::scenario::{HealthSystemConfig, Scenario};

use crate::error::Result;
use crate::monitoring::Monitoring;
use crate::pathogenesis::StatePair;
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;
use crate::util::sampler::LognormalSampler;
use crate::withinhost::{Diagnostic, WithinHostModel, WithinHostParams};

pub mod drugs;
pub mod episode;
pub mod immediate;
pub mod scheduler;

pub use episode::Episode;
pub use immediate::{ImmediateOutcomes, ImmediateParams};
pub use scheduler::{EventScheduler, EventSchedulerParams};

/// Whether and how a host is due to die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Doom {
    #[default]
    None,
    /// Dies of indirect causes at the given time.
    Indirect(SimTime),
    /// Died of a clinical episode this step.
    Direct,
}

impl Checkpoint for Doom {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        match self {
            Doom::None => {
                0u8.write_ckpt(w)?;
                SimTime::never().write_ckpt(w)
            }
            Doom::Indirect(t) => {
                1u8.write_ckpt(w)?;
                t.write_ckpt(w)
            }
            Doom::Direct => {
                2u8.write_ckpt(w)?;
                SimTime::never().write_ckpt(w)
            }
        }
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut tag = 0u8;
        tag.read_ckpt(r)?;
        let mut t = SimTime::never();
        t.read_ckpt(r)?;
        *self = match tag {
            1 => Doom::Indirect(t),
            2 => Doom::Direct,
            _ => Doom::None,
        };
        Ok(())
    }
}

/// Health-system parameters shared by both models, fixed after load.
#[derive(Debug, Clone)]
pub struct ClinicalParams {
    pub memory: SimTime,
    pub indirect_death_delay: SimTime,
    pub treatment_seeking: Option<LognormalSampler>,
    pub comorbidity: Option<LognormalSampler>,
    pub variant: ClinicalVariantParams,
}

#[derive(Debug, Clone)]
pub enum ClinicalVariantParams {
    Immediate(ImmediateParams),
    Scheduler(EventSchedulerParams),
}

impl ClinicalParams {
    pub fn from_scenario(scenario: &Scenario, params: &malsim_data::Parameters) -> Result<Self> {
        let clinical = &scenario.clinical;
        let step_days = scenario.simulation.step_days;
        let variant = match &clinical.health_system {
            HealthSystemConfig::Immediate(cfg) => {
                ClinicalVariantParams::Immediate(ImmediateParams::new(cfg, step_days, params)?)
            }
            HealthSystemConfig::EventScheduler(cfg) => {
                ClinicalVariantParams::Scheduler(EventSchedulerParams::new(cfg, params)?)
            }
        };
        let het = |cv: f64| -> Result<Option<LognormalSampler>> {
            if cv > 0.0 {
                Ok(Some(LognormalSampler::from_mean_cv(1.0, cv, None)?))
            } else {
                Ok(None)
            }
        };
        Ok(Self {
            memory: SimTime::from_days(clinical.memory_steps * step_days),
            indirect_death_delay: SimTime::from_days(clinical.indirect_death_delay_days),
            treatment_seeking: het(clinical.treatment_seeking_cv)?,
            comorbidity: het(clinical.comorbidity_cv)?,
            variant,
        })
    }
}

/// Per-host clinical state: the model variant plus the episode memory.
#[derive(Debug, Clone)]
pub struct ClinicalModel {
    kind: ClinicalKind,
    pub episode: Episode,
}

#[derive(Debug, Clone)]
enum ClinicalKind {
    Immediate(ImmediateOutcomes),
    Scheduler(EventScheduler),
}

impl ClinicalModel {
    pub fn new(params: &ClinicalParams) -> Self {
        let kind = match &params.variant {
            ClinicalVariantParams::Immediate(_) => ClinicalKind::Immediate(ImmediateOutcomes::new()),
            ClinicalVariantParams::Scheduler(_) => ClinicalKind::Scheduler(EventScheduler::new()),
        };
        Self { kind, episode: Episode::new() }
    }

    /// Resolve this step's clinical update for one host.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        rng: &mut LocalRng,
        within_host: &mut WithinHostModel,
        wh_params: &WithinHostParams,
        diagnostic: &Diagnostic,
        morbidity: StatePair,
        now: SimTime,
        age_years: f64,
        treatment_seeking_factor: f64,
        mon: &mut Monitoring,
        age_group: u32,
        doom: &mut Doom,
        params: &ClinicalParams,
    ) -> Result<()> {
        match (&mut self.kind, &params.variant) {
            (ClinicalKind::Immediate(model), ClinicalVariantParams::Immediate(ip)) => model.update(
                rng,
                within_host,
                wh_params,
                morbidity,
                now,
                age_years,
                treatment_seeking_factor,
                params.indirect_death_delay,
                &mut self.episode,
                params.memory,
                mon,
                age_group,
                doom,
                ip,
            ),
            (ClinicalKind::Scheduler(model), ClinicalVariantParams::Scheduler(sp)) => model.update(
                rng,
                within_host,
                wh_params,
                diagnostic,
                morbidity,
                now,
                age_years,
                treatment_seeking_factor,
                params.indirect_death_delay,
                &mut self.episode,
                params.memory,
                mon,
                age_group,
                doom,
                sp,
            ),
            _ => unreachable!("clinical model variant matches its parameters"),
        }
    }

    /// Flush any open episode (death or removal from the population).
    pub fn flush(&mut self, mon: &mut Monitoring) {
        self.episode.flush(mon);
    }

    /// True when the host was treated within the episode memory window.
    pub fn treated_recently(&self) -> bool {
        self.episode.state_bits()
            & (episode::state::FIRST_LINE
                | episode::state::SECOND_LINE
                | episode::state::INPATIENT_TREATMENT)
            != 0
    }
}

impl Checkpoint for ClinicalModel {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        match &self.kind {
            ClinicalKind::Immediate(m) => {
                0u8.write_ckpt(w)?;
                m.write_ckpt(w)?;
            }
            ClinicalKind::Scheduler(m) => {
                1u8.write_ckpt(w)?;
                m.write_ckpt(w)?;
            }
        }
        self.episode.write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut tag = 0u8;
        tag.read_ckpt(r)?;
        self.kind = match tag {
            0 => {
                let mut m = ImmediateOutcomes::new();
                m.read_ckpt(r)?;
                ClinicalKind::Immediate(m)
            }
            _ => {
                let mut m = EventScheduler::new();
                m.read_ckpt(r)?;
                ClinicalKind::Scheduler(m)
            }
        };
        self.episode.read_ckpt(r)
    }
}
