//! A human host.
//!
//! Owns its within-host state, clinical state, per-species vector
//! parameters, intervention records and RNG stream. Hosts never hold
//! references to each other or to the population; everything they need for
//! one update is passed in, so per-host results are independent of
//! iteration order.

use std::io::{Read, Write};

use malsim_data::scenario::VaccineKind;
use malsim_data::Measure;

use crate::clinical::{ClinicalModel, ClinicalParams, Doom};
use crate::error::Result;
use crate::genotypes::Genotypes;
use crate::impl_checkpoint;
use crate::incidence::{IncidenceParams, InfectionIncidence};
use crate::interventions::{Component, Components, Deployment, PerHumanVaccine};
use crate::monitoring::{HostReportCtx, Monitoring};
use crate::time::SimTime;
use crate::transmission::{AnophelesModel, PerHostAnoph};
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;
use crate::withinhost::{Diagnostic, WithinHostModel, WithinHostParams, ORIGIN_STRATA};

/// Host availability to mosquitoes by age, relative to adults. Follows the
/// body-size curve: infants are much smaller targets.
fn age_availability_factor(age_years: f64) -> f64 {
    const ADULT_AGE: f64 = 20.0;
    const NEWBORN: f64 = 0.225;
    if age_years >= ADULT_AGE {
        1.0
    } else {
        NEWBORN + (1.0 - NEWBORN) * age_years / ADULT_AGE
    }
}

/// The three per-host heterogeneity factors, sampled at birth.
#[derive(Debug, Clone, Default)]
pub struct HumanHet {
    pub availability: f64,
    pub comorbidity: f64,
    pub treatment_seeking: f64,
}

impl_checkpoint!(HumanHet: availability, comorbidity, treatment_seeking);

/// Removal triggers a host can experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalEvent {
    FirstBout,
    FirstTreatment,
    FirstPatent,
}

/// Everything fixed at scenario load that a host update needs.
#[derive(Debug)]
pub struct HostParams {
    pub wh: WithinHostParams,
    pub clinical: ClinicalParams,
    pub incidence: IncidenceParams,
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone)]
pub struct Human {
    id: u64,
    pub rng: LocalRng,
    date_of_birth: SimTime,
    pub het: HumanHet,
    pub within_host: WithinHostModel,
    pub clinical: ClinicalModel,
    pub incidence: InfectionIncidence,
    /// Per-species baseline rates (indexed like the scenario species).
    per_host: Vec<PerHostAnoph>,
    pub vaccine: PerHumanVaccine,
    pub deployments: Vec<Deployment>,
    pub doom: Doom,
    /// Infectiousness to mosquitoes, cached for the step.
    kappa: f64,
    /// Transmitted parasite mix per genotype and chain stratum.
    kappa_weights: Vec<f64>,
    /// Infectious bites per genotype and chain stratum this step.
    eir: Vec<f64>,
}

impl Human {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        master_seed: u64,
        date_of_birth: SimTime,
        availability_cv: f64,
        species: &[AnophelesModel],
        params: &HostParams,
        n_strata: usize,
    ) -> Self {
        let mut rng = LocalRng::seed(master_seed, id);
        let availability_het = if availability_cv > 0.0 {
            crate::util::sampler::LognormalSampler::from_mean_cv(1.0, availability_cv, None)
                .expect("validated scenario")
                .sample(&mut rng)
        } else {
            1.0
        };
        let availability = params.incidence.availability_factor(&mut rng, availability_het);
        let comorbidity = match &params.clinical.comorbidity {
            Some(s) => s.sample(&mut rng),
            None => 1.0,
        };
        let treatment_seeking = match &params.clinical.treatment_seeking {
            Some(s) => s.sample(&mut rng),
            None => 1.0,
        };
        let per_host = species
            .iter()
            .map(|sp| PerHostAnoph::initialise(&mut rng, &sp.per_host, availability))
            .collect();
        let within_host = WithinHostModel::new(&mut rng, comorbidity, &params.wh);
        let clinical = ClinicalModel::new(&params.clinical);
        Self {
            id,
            rng,
            date_of_birth,
            het: HumanHet { availability, comorbidity, treatment_seeking },
            within_host,
            clinical,
            incidence: InfectionIncidence::new(),
            per_host,
            vaccine: PerHumanVaccine::new(),
            deployments: Vec::new(),
            doom: Doom::None,
            kappa: 0.0,
            kappa_weights: vec![0.0; n_strata],
            eir: vec![0.0; n_strata],
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn age(&self, now: SimTime) -> SimTime {
        now - self.date_of_birth
    }

    pub fn age_years(&self, now: SimTime) -> f64 {
        self.age(now).in_years()
    }

    pub fn date_of_birth(&self) -> SimTime {
        self.date_of_birth
    }

    /// Scale this host's availability (population normalisation).
    pub fn scale_availability(&mut self, species: usize, factor: f64) {
        self.per_host[species].availability *= factor;
    }

    pub fn availability(&self, species: usize) -> f64 {
        self.per_host[species].availability
    }

    /// Per-step intervention state update (net holes, disposal).
    pub fn update_interventions(&mut self, components: &Components, now: SimTime) -> Result<()> {
        let rng = &mut self.rng;
        let mut err = None;
        self.deployments.retain_mut(|d| {
            if err.is_some() {
                return true;
            }
            match d.update(rng, components.get(d.component), now) {
                Ok(keep) => keep,
                Err(e) => {
                    err = Some(e);
                    true
                }
            }
        });
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cache this host's infectiousness to mosquitoes for the step.
    pub fn update_kappa(&mut self, now: SimTime, components: &Components, params: &HostParams) {
        let tbv = match components.vaccine_component(VaccineKind::Tbv) {
            Some(vc) => self.vaccine.factor(vc, now),
            None => 1.0,
        };
        let (kappa, weights) = self.within_host.prob_transmission_to_mosquito(now, tbv, &params.wh);
        self.kappa = kappa;
        self.kappa_weights = weights;
    }

    /// Contribute this host's availability and feeding-cycle terms to each
    /// species' population sums.
    pub fn contribute_to_vectors(
        &self,
        species: &mut [AnophelesModel],
        components: &Components,
        now: SimTime,
        age_years: f64,
    ) {
        let age_factor = age_availability_factor(age_years);
        for (s, sp) in species.iter_mut().enumerate() {
            let base = &self.per_host[s];
            let mut deterrency = 1.0;
            let mut pre = 1.0;
            let mut post = 1.0;
            for d in &self.deployments {
                let c = components.get(d.component);
                deterrency *= d.relative_attractiveness(c, s, now);
                pre *= d.pre_prandial_survival(c, s, now);
                post *= d.post_prandial_survival(c, s, now);
            }
            let avail = base.availability * age_factor * deterrency;
            let cycle = avail * base.prob_biting * pre * base.prob_rest * post;
            sp.accumulate_host(avail, cycle, self.kappa, &self.kappa_weights);
        }
    }

    /// Gather this host's EIR from the species' step results.
    pub fn collect_eir(
        &mut self,
        species: &[AnophelesModel],
        components: &Components,
        now: SimTime,
        age_years: f64,
    ) {
        for v in self.eir.iter_mut() {
            *v = 0.0;
        }
        let age_factor = age_availability_factor(age_years);
        for (s, sp) in species.iter().enumerate() {
            let mut deterrency = 1.0;
            for d in &self.deployments {
                deterrency *=
                    d.relative_attractiveness(components.get(d.component), s, now);
            }
            let avail = self.per_host[s].availability * age_factor * deterrency;
            sp.host_eir(avail, &mut self.eir);
        }
    }

    /// Gather the forced EIR of the warmup phases.
    pub fn collect_forced_eir(
        &mut self,
        species: &[AnophelesModel],
        day_of_year: usize,
        step_days: i32,
        genotypes: &Genotypes,
    ) {
        for v in self.eir.iter_mut() {
            *v = 0.0;
        }
        for sp in species {
            sp.forced_host_eir(day_of_year, step_days, &mut self.eir, genotypes);
        }
    }

    /// The main health update of one step: inoculation, within-host
    /// dynamics, pathogenesis and case management.
    #[allow(clippy::too_many_arguments)]
    pub fn update_health(
        &mut self,
        now: SimTime,
        import_rate_per_step: f64,
        genotypes: &Genotypes,
        components: &Components,
        params: &HostParams,
        mon: &mut Monitoring,
    ) -> Result<()> {
        let age_years = self.age_years(now);
        let age_group = mon.age_group(age_years);
        let ctx = HostReportCtx { age_group, cohort: 0 };

        let effective_eir: f64 = self.eir.iter().sum();
        let pev = match components.vaccine_component(VaccineKind::Pev) {
            Some(vc) => self.vaccine.factor(vc, now),
            None => 1.0,
        };
        let expected = self.incidence.expected_new_infections(
            &mut self.rng,
            effective_eir,
            self.het.availability,
            pev,
            &params.incidence,
        )?;
        // Split the expectation between the two transmission chains in
        // proportion to their share of the bites, and realise each
        // independently. Mosquitoes infected from imported cases yield
        // introduced infections.
        let g_count = params.wh.n_genotypes;
        let mut weights_indigenous = vec![0.0; g_count];
        let mut weights_introduced = vec![0.0; g_count];
        let mut eir_local = 0.0;
        let mut eir_introduced = 0.0;
        for g in 0..g_count {
            weights_indigenous[g] = self.eir[g * ORIGIN_STRATA];
            weights_introduced[g] = self.eir[g * ORIGIN_STRATA + 1];
            eir_local += weights_indigenous[g];
            eir_introduced += weights_introduced[g];
        }
        let (expected_indigenous, expected_introduced) = if effective_eir > 0.0 {
            (
                expected * eir_local / effective_eir,
                expected * eir_introduced / effective_eir,
            )
        } else {
            (0.0, 0.0)
        };
        let n_indigenous =
            self.incidence.num_new_infections(&mut self.rng, expected_indigenous)?;
        let n_introduced =
            self.incidence.num_new_infections(&mut self.rng, expected_introduced)?;
        let n_imported = self.rng.poisson(import_rate_per_step)? as usize;

        if effective_eir > 0.0 {
            mon.report_host(Measure::Inoculations, ctx, effective_eir);
        }
        let n_new = n_indigenous + n_introduced + n_imported;
        if n_new > 0 {
            mon.report_host(Measure::NewInfections, ctx, n_new as f64);
            if n_indigenous > 0 {
                mon.report_host(Measure::NewInfectionsIndigenous, ctx, n_indigenous as f64);
            }
            if n_introduced > 0 {
                mon.report_host(Measure::NewInfectionsIntroduced, ctx, n_introduced as f64);
            }
            if n_imported > 0 {
                mon.report_host(Measure::ImportedInfections, ctx, n_imported as f64);
            }
        }

        let bsv = match components.vaccine_component(VaccineKind::Bsv) {
            Some(vc) => self.vaccine.factor(vc, now),
            None => 1.0,
        };
        self.within_host.update(
            &mut self.rng,
            now,
            age_years,
            n_indigenous,
            n_introduced,
            n_imported,
            &weights_indigenous,
            &weights_introduced,
            bsv,
            1.0,
            genotypes,
            &params.wh,
        )?;

        let morbidity = self.within_host.determine_morbidity(&mut self.rng, age_years, &params.wh);
        let had_bout = morbidity.state.is_malaria();
        self.clinical.update(
            &mut self.rng,
            &mut self.within_host,
            &params.wh,
            &params.diagnostic,
            morbidity,
            now,
            age_years,
            self.het.treatment_seeking,
            mon,
            age_group,
            &mut self.doom,
            &params.clinical,
        )?;

        if had_bout {
            self.apply_removal_trigger(components, RemovalEvent::FirstBout);
        }
        if self.clinical.treated_recently() {
            self.apply_removal_trigger(components, RemovalEvent::FirstTreatment);
        }
        Ok(())
    }

    /// Remove deployments whose component is configured to drop hosts on
    /// this trigger.
    pub fn apply_removal_trigger(&mut self, components: &Components, event: RemovalEvent) {
        self.deployments.retain(|d| {
            let triggers = components.removal(d.component);
            let remove = match event {
                RemovalEvent::FirstBout => triggers.on_first_bout,
                RemovalEvent::FirstTreatment => triggers.on_first_treatment,
                RemovalEvent::FirstPatent => triggers.on_first_patent,
            };
            !remove
        });
    }

    pub fn has_deployment(&self, component: usize) -> bool {
        self.deployments.iter().any(|d| d.component == component)
    }

    /// Deploy one component to this host. Returns the measure to report.
    pub fn deploy(
        &mut self,
        component: usize,
        components: &Components,
        now: SimTime,
        step_days: i32,
        mass_campaign: bool,
        wh_params: &WithinHostParams,
    ) -> Option<Measure> {
        match components.get(component) {
            Component::Vaccine(vc) => {
                self.vaccine.vaccinate(&mut self.rng, vc, now, mass_campaign);
                Some(if mass_campaign {
                    Measure::MassVaccinations
                } else {
                    Measure::EpiVaccinations
                })
            }
            Component::Mda(mda) => {
                self.within_host.treat_simple(
                    now,
                    wh_params,
                    mda.clear_liver,
                    mda.clear_blood,
                    mda.liver_days,
                    mda.blood_days,
                );
                Some(Measure::MassDrugAdministrations)
            }
            c => {
                let deployment =
                    Deployment::create(&mut self.rng, component, c, now, step_days)?;
                // Redeployment replaces the previous record.
                self.deployments.retain(|d| d.component != component);
                self.deployments.push(deployment);
                Some(match c {
                    Component::Itn(_) => {
                        if mass_campaign {
                            Measure::MassItns
                        } else {
                            Measure::EpiItns
                        }
                    }
                    Component::Irs(_) => Measure::MassIrs,
                    _ => Measure::MassGvi,
                })
            }
        }
    }

    /// Survey reporting for this host.
    pub fn summarize(
        &mut self,
        mon: &mut Monitoring,
        now: SimTime,
        genotypes: &Genotypes,
        components: &Components,
        params: &HostParams,
    ) {
        let age_years = self.age_years(now);
        let ctx = HostReportCtx { age_group: mon.age_group(age_years), cohort: 0 };
        mon.report_host(Measure::Hosts, ctx, 1.0);
        self.incidence.summarize(mon, ctx);
        let patent =
            self.within_host.summarize(mon, ctx, &params.diagnostic, genotypes);
        if patent {
            self.apply_removal_trigger(components, RemovalEvent::FirstPatent);
        }
    }
}

impl Checkpoint for Human {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.id.write_ckpt(w)?;
        self.rng.write_ckpt(w)?;
        self.date_of_birth.write_ckpt(w)?;
        self.het.write_ckpt(w)?;
        self.within_host.write_ckpt(w)?;
        self.clinical.write_ckpt(w)?;
        self.incidence.write_ckpt(w)?;
        self.per_host.write_ckpt(w)?;
        self.vaccine.write_ckpt(w)?;
        self.deployments.write_ckpt(w)?;
        self.doom.write_ckpt(w)?;
        self.kappa.write_ckpt(w)?;
        self.kappa_weights.write_ckpt(w)?;
        self.eir.write_ckpt(w)
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.id.read_ckpt(r)?;
        self.rng.read_ckpt(r)?;
        self.date_of_birth.read_ckpt(r)?;
        self.het.read_ckpt(r)?;
        self.within_host.read_ckpt(r)?;
        self.clinical.read_ckpt(r)?;
        self.incidence.read_ckpt(r)?;
        self.per_host.read_ckpt(r)?;
        self.vaccine.read_ckpt(r)?;
        self.deployments.read_ckpt(r)?;
        self.doom.read_ckpt(r)?;
        self.kappa.read_ckpt(r)?;
        self.kappa_weights.read_ckpt(r)?;
        self.eir.read_ckpt(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_availability_rises_to_adult() {
        assert!((age_availability_factor(0.0) - 0.225).abs() < 1e-12);
        assert!(age_availability_factor(10.0) < 1.0);
        assert_eq!(age_availability_factor(25.0), 1.0);
        assert!(age_availability_factor(5.0) < age_availability_factor(15.0));
    }
}
