//! The population and step scheduler.
//!
//! Binds vector transmission, within-host dynamics and case management on
//! the common time step, across the three simulation phases: pre-init
//! (mosquito warmup with forced transmission), init (coupled human warmup
//! with stable transmission, no interventions) and main (interventions
//! active, surveys recorded). Hosts are processed in stable id order and
//! every host owns its RNG stream, so results are independent of the
//! iteration order within a step.

use std::io::{Read, Write};

use tracing::{debug, info, warn};

use malsim_data::scenario::Scenario;
use malsim_data::Measure;

use crate::clinical::{ClinicalParams, Doom};
use crate::error::{Result, SimError};
use crate::genotypes::Genotypes;
use crate::host::{HostParams, Human};
use crate::imported::ImportedInfections;
use crate::incidence::IncidenceParams;
use crate::interventions::Components;
use crate::monitoring::Monitoring;
use crate::time::{Phase, SimTime, DAYS_PER_YEAR};
use crate::transmission::VectorModel;
use crate::util::checkpoint::{validate_list_len, Checkpoint};
use crate::util::rng::LocalRng;
use crate::withinhost::{Diagnostic, WithinHostParams};

/// A resolved timed (mass) deployment.
#[derive(Debug, Clone)]
struct TimedDeployment {
    time: SimTime,
    components: Vec<usize>,
    coverage: f64,
    min_age: SimTime,
    max_age: SimTime,
    cumulative: bool,
}

/// A resolved age-based continuous deployment.
#[derive(Debug, Clone)]
struct ContinuousDeployment {
    age: SimTime,
    components: Vec<usize>,
    coverage: f64,
    begin: SimTime,
    end: SimTime,
}

/// A resolved larviciding round.
#[derive(Debug, Clone, Copy)]
struct Larviciding {
    time: SimTime,
    effectiveness: f64,
    end: SimTime,
}

#[derive(Debug)]
pub struct Population {
    // Scenario constants.
    step_days: i32,
    target_size: usize,
    max_age: SimTime,
    mean_age_days: f64,
    availability_cv: f64,
    master_seed: u64,
    max_init_iterations: usize,
    init_tolerance: f64,
    pre_init_years: i32,
    main_start: SimTime,
    end_time: SimTime,
    params: HostParams,
    genotypes: Genotypes,
    components: Components,
    timed: Vec<TimedDeployment>,
    continuous: Vec<ContinuousDeployment>,
    larviciding: Vec<Larviciding>,

    // Mutable state.
    humans: Vec<Human>,
    next_id: u64,
    master_rng: LocalRng,
    vectors: VectorModel,
    imported: ImportedInfections,
    pub monitoring: Monitoring,
    now: SimTime,
    phase: Phase,
    next_timed: usize,
    next_larviciding: usize,
    init_iterations: usize,
    calibration_converged: bool,
}

impl Population {
    pub fn new(scenario: &Scenario, seed_override: Option<u64>) -> Result<Self> {
        scenario.validate().map_err(SimError::scenario)?;
        let parameters = malsim_data::Parameters::from_entries(&scenario.parameters)
            .map_err(SimError::scenario)?;
        let sim = &scenario.simulation;
        let master_seed = seed_override.unwrap_or(sim.master_seed);
        let step_days = sim.step_days;

        let params = HostParams {
            wh: WithinHostParams::from_scenario(scenario, &parameters)?,
            clinical: ClinicalParams::from_scenario(scenario, &parameters)?,
            incidence: IncidenceParams::new(scenario.incidence, step_days, &parameters)?,
            diagnostic: Diagnostic::new(
                scenario.diagnostic.dens_limit,
                scenario.diagnostic.uses_hrp2,
            ),
        };
        let genotypes = Genotypes::from_config(&scenario.genotypes)?;
        let components = Components::from_scenario(scenario)?;
        let vectors = VectorModel::from_scenario(scenario)?;

        let main_start =
            SimTime::from_days((sim.vector_warmup_years + sim.human_warmup_years) * DAYS_PER_YEAR);
        let end_time = main_start + SimTime::from_days(sim.main_years * DAYS_PER_YEAR);

        let mut timed: Vec<TimedDeployment> = scenario
            .interventions
            .timed
            .iter()
            .map(|t| {
                Ok(TimedDeployment {
                    time: main_start + SimTime::from_years(t.time_years),
                    components: t
                        .components
                        .iter()
                        .map(|n| components.id_by_name(n))
                        .collect::<Result<_>>()?,
                    coverage: t.coverage,
                    min_age: SimTime::from_years(t.min_age_years),
                    max_age: SimTime::from_years(t.max_age_years),
                    cumulative: t.cumulative,
                })
            })
            .collect::<Result<_>>()?;
        timed.sort_by_key(|t| t.time);
        let continuous = scenario
            .interventions
            .continuous
            .iter()
            .map(|c| {
                Ok(ContinuousDeployment {
                    age: SimTime::from_years(c.age_years),
                    components: c
                        .components
                        .iter()
                        .map(|n| components.id_by_name(n))
                        .collect::<Result<_>>()?,
                    coverage: c.coverage,
                    begin: main_start + SimTime::from_years(c.begin_years),
                    end: if c.end_years.is_finite() {
                        main_start + SimTime::from_years(c.end_years)
                    } else {
                        SimTime::future()
                    },
                })
            })
            .collect::<Result<_>>()?;
        let mut larviciding: Vec<Larviciding> = scenario
            .interventions
            .larviciding
            .iter()
            .map(|l| {
                let time = main_start + SimTime::from_years(l.time_years);
                Larviciding {
                    time,
                    effectiveness: l.effectiveness,
                    end: time + SimTime::from_days(l.duration_days),
                }
            })
            .collect();
        larviciding.sort_by_key(|l| l.time);

        let mut population = Self {
            step_days,
            target_size: sim.population_size,
            max_age: SimTime::from_years(sim.max_host_age_years),
            mean_age_days: sim.mean_host_age_years * DAYS_PER_YEAR as f64,
            availability_cv: scenario.availability_cv,
            master_seed,
            max_init_iterations: sim.max_init_iterations,
            init_tolerance: sim.init_tolerance,
            pre_init_years: sim.vector_warmup_years,
            main_start,
            end_time,
            params,
            genotypes,
            components,
            timed,
            continuous,
            larviciding,
            humans: Vec::with_capacity(sim.population_size),
            next_id: 0,
            master_rng: LocalRng::master(master_seed),
            vectors,
            imported: ImportedInfections::from_config(&scenario.importation, main_start),
            monitoring: Monitoring::new(scenario, main_start),
            now: SimTime::zero(),
            phase: Phase::PreInit,
            next_timed: 0,
            next_larviciding: 0,
            init_iterations: 0,
            calibration_converged: false,
        };

        // Warmup events stay out of the survey counters.
        population.monitoring.set_recording(false);
        population.build_initial_population();
        population.normalise_availability();
        population.seed_vector_state();
        info!(
            population = population.humans.len(),
            species = population.vectors.num_species(),
            step_days,
            "population initialised"
        );
        Ok(population)
    }

    fn build_initial_population(&mut self) {
        for _ in 0..self.target_size {
            // Truncated-exponential age structure.
            let age_days = loop {
                let age = -self.mean_age_days * self.master_rng.uniform_01().ln();
                if age < self.max_age.in_days() as f64 {
                    break age as i32;
                }
            };
            let dob = SimTime::from_days(-age_days);
            let human = Human::new(
                self.next_id,
                self.master_seed,
                dob,
                self.availability_cv,
                &self.vectors.species,
                &self.params,
                self.vectors.n_strata(),
            );
            self.next_id += 1;
            self.humans.push(human);
        }
    }

    /// Normalise per-host availabilities so the population mean matches
    /// the calibrated species-level availability rate.
    fn normalise_availability(&mut self) {
        for s in 0..self.vectors.num_species() {
            let total: f64 = self.humans.iter().map(|h| h.availability(s)).sum();
            if total > 0.0 {
                let target = self.vectors.species[s].params.ento_availability;
                let factor = self.humans.len() as f64 * target / total;
                for h in &mut self.humans {
                    h.scale_availability(s, factor);
                }
            }
        }
    }

    fn seed_vector_state(&mut self) {
        self.vectors.reset_step();
        let now = self.now;
        for h in &self.humans {
            h.contribute_to_vectors(
                &mut self.vectors.species,
                &self.components,
                now,
                h.age_years(now),
            );
        }
        self.vectors.init_state(self.humans.len(), &self.genotypes, now.in_days());
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn num_hosts(&self) -> usize {
        self.humans.len()
    }

    pub fn finished(&self) -> bool {
        self.now >= self.end_time
    }

    pub fn hosts(&self) -> &[Human] {
        &self.humans
    }

    /// Run the simulation to its configured end.
    pub fn run(&mut self) -> Result<()> {
        while !self.finished() {
            self.step()?;
        }
        Ok(())
    }

    /// Advance the simulation by one step.
    pub fn step(&mut self) -> Result<()> {
        let now = self.now;
        let step = SimTime::from_days(self.step_days);
        let main = self.phase == Phase::Main;

        // 1. Intervention deployment timelines (timed, then continuous).
        if main {
            self.process_timed_deployments(now)?;
            self.process_continuous_deployments(now, step)?;
            while self.next_larviciding < self.larviciding.len()
                && self.larviciding[self.next_larviciding].time <= now
            {
                let l = self.larviciding[self.next_larviciding];
                self.next_larviciding += 1;
                for sp in &mut self.vectors.species {
                    sp.emergence().start_larviciding(l.effectiveness, l.end);
                }
                info!(time = %now, effectiveness = l.effectiveness, "larviciding started");
            }
        }

        // 2. Per-host pre-mosquito updates: intervention state and the
        // infectiousness each host presents to biting mosquitoes.
        let pre_init = self.phase == Phase::PreInit;
        for h in &mut self.humans {
            h.update_interventions(&self.components, now)?;
            if !pre_init {
                h.update_kappa(now, &self.components, &self.params);
            }
        }

        // 3. Mosquito transmission, day by day, with inputs frozen for the
        // step.
        self.vectors.reset_step();
        for h in &self.humans {
            h.contribute_to_vectors(
                &mut self.vectors.species,
                &self.components,
                now,
                h.age_years(now),
            );
        }
        self.vectors.compute_ts_probs(pre_init, &self.genotypes);
        self.vectors.advance_step(now.in_days(), self.step_days, main);

        // 4. Inoculation, within-host, pathogenesis and clinical updates.
        if !pre_init {
            let import_rate = if main {
                self.imported.rate_per_host_step(now, self.step_days)
            } else {
                0.0
            };
            let day_of_year = now.day_of_year();
            for h in &mut self.humans {
                let age_years = h.age_years(now);
                if main {
                    h.collect_eir(&self.vectors.species, &self.components, now, age_years);
                } else {
                    h.collect_forced_eir(
                        &self.vectors.species,
                        day_of_year,
                        self.step_days,
                        &self.genotypes,
                    );
                }
                h.update_health(
                    now,
                    import_rate,
                    &self.genotypes,
                    &self.components,
                    &self.params,
                    &mut self.monitoring,
                )?;
            }
        }

        // 5. Death/birth reconciliation.
        self.reconcile_population(now);

        self.now = now + step;
        self.maybe_transition()?;

        // 6. Survey output, once the clock has crossed the survey time.
        if self.phase == Phase::Main && self.monitoring.survey_due(self.now) {
            self.record_survey(self.now);
        }
        Ok(())
    }

    fn process_timed_deployments(&mut self, now: SimTime) -> Result<()> {
        while self.next_timed < self.timed.len() && self.timed[self.next_timed].time <= now {
            let deployment = self.timed[self.next_timed].clone();
            self.next_timed += 1;
            for &component in &deployment.components {
                let coverage = if deployment.cumulative {
                    // Bring total coverage up to the target by deploying
                    // only to uncovered eligibles.
                    let mut eligible = 0usize;
                    let mut covered = 0usize;
                    for h in &self.humans {
                        let age = h.age(now);
                        if age >= deployment.min_age && age <= deployment.max_age {
                            eligible += 1;
                            if h.has_deployment(component) {
                                covered += 1;
                            }
                        }
                    }
                    if eligible == 0 {
                        continue;
                    }
                    let frac = covered as f64 / eligible as f64;
                    if frac >= deployment.coverage {
                        continue;
                    }
                    (deployment.coverage - frac) / (1.0 - frac)
                } else {
                    deployment.coverage
                };
                for h in &mut self.humans {
                    let age = h.age(now);
                    if age < deployment.min_age || age > deployment.max_age {
                        continue;
                    }
                    if deployment.cumulative && h.has_deployment(component) {
                        continue;
                    }
                    if !h.rng.bernoulli(coverage) {
                        continue;
                    }
                    let measure = h.deploy(
                        component,
                        &self.components,
                        now,
                        self.step_days,
                        true,
                        &self.params.wh,
                    );
                    if let Some(m) = measure {
                        let ctx = crate::monitoring::HostReportCtx {
                            age_group: self.monitoring.age_group(h.age_years(now)),
                            cohort: 0,
                        };
                        self.monitoring.report_host(m, ctx, 1.0);
                    }
                }
            }
            debug!(time = %now, "timed deployment executed");
        }
        Ok(())
    }

    fn process_continuous_deployments(&mut self, now: SimTime, step: SimTime) -> Result<()> {
        for cd in &self.continuous {
            if now < cd.begin || now >= cd.end {
                continue;
            }
            for h in &mut self.humans {
                let due = h.date_of_birth() + cd.age;
                if !(due > now - step && due <= now) {
                    continue;
                }
                for &component in &cd.components {
                    // A missed age-based vaccine dose blocks the rest of
                    // the sequence.
                    let vaccine_kind = match self.components.get(component) {
                        crate::interventions::Component::Vaccine(vc) => Some(vc.kind),
                        _ => None,
                    };
                    if let Some(kind) = vaccine_kind {
                        if h.vaccine.epi_blocked(kind) {
                            continue;
                        }
                    }
                    if h.rng.bernoulli(cd.coverage) {
                        let measure = h.deploy(
                            component,
                            &self.components,
                            now,
                            self.step_days,
                            false,
                            &self.params.wh,
                        );
                        if let Some(m) = measure {
                            let ctx = crate::monitoring::HostReportCtx {
                                age_group: self.monitoring.age_group(h.age_years(now)),
                                cohort: 0,
                            };
                            self.monitoring.report_host(m, ctx, 1.0);
                        }
                    } else if let Some(kind) = vaccine_kind {
                        h.vaccine.miss_epi_dose(kind);
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove hosts that died or aged out and replace them with newborns.
    fn reconcile_population(&mut self, now: SimTime) {
        let max_age = self.max_age;
        let monitoring = &mut self.monitoring;
        self.humans.retain_mut(|h| {
            let dead = match h.doom {
                Doom::Direct => true,
                Doom::Indirect(t) => now >= t,
                Doom::None => false,
            };
            let aged_out = h.age(now) > max_age;
            if dead || aged_out {
                h.clinical.flush(monitoring);
                return false;
            }
            true
        });
        while self.humans.len() < self.target_size {
            let human = Human::new(
                self.next_id,
                self.master_seed,
                now,
                self.availability_cv,
                &self.vectors.species,
                &self.params,
                self.vectors.n_strata(),
            );
            self.next_id += 1;
            self.humans.push(human);
        }
    }

    fn record_survey(&mut self, now: SimTime) {
        let steps_per_year = DAYS_PER_YEAR as f64 / self.step_days as f64;
        for h in &mut self.humans {
            h.summarize(&mut self.monitoring, now, &self.genotypes, &self.components, &self.params);
        }
        for (s, sp) in self.vectors.species.iter().enumerate() {
            sp.summarize(&mut self.monitoring, s);
            self.monitoring.report_species(Measure::InputEir, s, sp.params.annual_eir);
            self.monitoring.report_species(
                Measure::SimulatedEir,
                s,
                sp.step_population_eir(self.humans.len()) * steps_per_year,
            );
        }
        self.monitoring.conclude_survey();
        info!(time = %now, "survey recorded");
    }

    fn maybe_transition(&mut self) -> Result<()> {
        let at_year_boundary =
            self.now.in_days() % DAYS_PER_YEAR == 0 && self.now > SimTime::zero();
        match self.phase {
            Phase::PreInit => {
                if at_year_boundary {
                    let more =
                        self.vectors.init_iterate(self.now.in_days() - 1, self.init_tolerance)?;
                    self.init_iterations += 1;
                    if !more {
                        self.calibration_converged = true;
                    } else if self.init_iterations > self.max_init_iterations {
                        return Err(SimError::VectorWarmup(self.init_iterations));
                    }
                }
                let nominal_end = SimTime::from_days(self.pre_init_years * DAYS_PER_YEAR);
                if self.now >= nominal_end && self.calibration_converged {
                    info!(iterations = self.init_iterations, "mosquito warmup converged");
                    self.phase = Phase::Init;
                }
            }
            Phase::Init => {
                if at_year_boundary && self.now < self.main_start {
                    // Keep emergence matched to the target while human
                    // infectiousness settles; convergence is not required
                    // to enter the main phase.
                    if let Err(err) = self.vectors.init_iterate(self.now.in_days() - 1, self.init_tolerance) {
                        warn!(%err, "emergence recalibration skipped");
                    }
                }
                if self.now >= self.main_start {
                    info!(time = %self.now, "entering main phase");
                    self.phase = Phase::Main;
                    self.monitoring.set_recording(true);
                }
            }
            Phase::Main => {}
        }
        Ok(())
    }
}

impl Checkpoint for Population {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.now.write_ckpt(w)?;
        let phase_tag: u8 = match self.phase {
            Phase::PreInit => 0,
            Phase::Init => 1,
            Phase::Main => 2,
        };
        phase_tag.write_ckpt(w)?;
        self.next_timed.write_ckpt(w)?;
        self.next_larviciding.write_ckpt(w)?;
        self.init_iterations.write_ckpt(w)?;
        self.calibration_converged.write_ckpt(w)?;
        self.next_id.write_ckpt(w)?;
        self.master_rng.write_ckpt(w)?;
        self.vectors.write_ckpt(w)?;
        self.monitoring.write_ckpt(w)?;
        (self.humans.len() as u64).write_ckpt(w)?;
        for h in &self.humans {
            h.write_ckpt(w)?;
        }
        Ok(())
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.now.read_ckpt(r)?;
        let mut phase_tag = 0u8;
        phase_tag.read_ckpt(r)?;
        self.phase = match phase_tag {
            0 => Phase::PreInit,
            1 => Phase::Init,
            _ => Phase::Main,
        };
        self.next_timed.read_ckpt(r)?;
        self.next_larviciding.read_ckpt(r)?;
        self.init_iterations.read_ckpt(r)?;
        self.calibration_converged.read_ckpt(r)?;
        self.next_id.read_ckpt(r)?;
        self.master_rng.read_ckpt(r)?;
        self.vectors.read_ckpt(r)?;
        self.monitoring.read_ckpt(r)?;
        let mut len = 0u64;
        len.read_ckpt(r)?;
        validate_list_len(len)?;
        self.humans.clear();
        for _ in 0..len {
            let mut h = Human::new(
                0,
                self.master_seed,
                SimTime::zero(),
                self.availability_cv,
                &self.vectors.species,
                &self.params,
                self.vectors.n_strata(),
            );
            h.read_ckpt(r)?;
            self.humans.push(h);
        }
        Ok(())
    }
}

