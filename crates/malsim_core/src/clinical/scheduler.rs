//! The event-scheduler (1-day) case-management model.
//!
//! Tracks clinical status day by day: bout onset with a sampled
//! treatment-seeking delay, configured decision trees whose leaves
//! administer drug regimens, a daily in-bout death hazard for complicated
//! cases, recovery at the end of the bout, and the antibiotic logistic
//! model for non-malarial fevers.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::{DecisionNode, EventSchedulerConfig};
use malsim_data::Parameter;

use crate::clinical::drugs::{DrugModel, SimpleDrugModel};
use crate::clinical::episode::{state, Episode};
use crate::clinical::Doom;
use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::monitoring::Monitoring;
use crate::pathogenesis::{MorbidityState, StatePair};
use crate::time::SimTime;
use crate::util::age_group::AgeGroupInterpolator;
use crate::util::rng::LocalRng;
use crate::withinhost::{Diagnostic, WithinHostModel, WithinHostParams};

#[derive(Debug, Clone)]
pub struct EventSchedulerParams {
    uncomplicated_case: SimTime,
    complicated_case: SimTime,
    /// Extension (<= 0 shortens) of the at-risk window past the bout.
    extra_days_at_risk: SimTime,
    /// Cumulative daily probability of seeking treatment from bout onset.
    cum_daily_pr_seek: Vec<f64>,
    uncomplicated_tree: DecisionNode,
    complicated_tree: DecisionNode,
    pub drug_schedules: Vec<malsim_data::scenario::DrugScheduleConfig>,
    /// Antibiotic-prescription logistic coefficients:
    /// [base, negative test, positive test, needs antibiotic, informal].
    ab_logistic: [f64; 5],
    one_minus_efficacy_ab: f64,
    severe_nmf_mortality: AgeGroupInterpolator,
    p_need_antibiotic: AgeGroupInterpolator,
    /// Fraction of in-bout deaths falling on the first day.
    alpha: f64,
    /// Geometric spread of the remaining hazard over later days.
    v: f64,
}

impl EventSchedulerParams {
    pub fn new(cfg: &EventSchedulerConfig, params: &malsim_data::Parameters) -> Result<Self> {
        let get = |p: Parameter| -> Result<f64> {
            params
                .get(p)
                .ok_or_else(|| SimError::scenario(format!("missing model parameter {:?}", p)))
        };
        Ok(Self {
            uncomplicated_case: SimTime::from_days(cfg.uncomplicated_case_days),
            complicated_case: SimTime::from_days(cfg.complicated_case_days),
            extra_days_at_risk: SimTime::from_days(cfg.extra_days_at_risk),
            cum_daily_pr_seek: cfg.p_seek_uc_daily.clone(),
            uncomplicated_tree: cfg.uncomplicated_tree.clone(),
            complicated_tree: cfg.complicated_tree.clone(),
            drug_schedules: cfg.drug_schedules.clone(),
            ab_logistic: cfg.ab_logistic,
            one_minus_efficacy_ab: cfg.one_minus_efficacy_ab,
            severe_nmf_mortality: AgeGroupInterpolator::from_points(&cfg.severe_nmf_mortality)?,
            p_need_antibiotic: AgeGroupInterpolator::from_points(&cfg.p_need_antibiotic)?,
            alpha: (-get(Parameter::CfrNegLogAlpha)?).exp(),
            v: get(Parameter::CfrScaleFactor)?,
        })
    }
}

/// Outcome of a decision-tree walk.
#[derive(Debug, Clone, Copy, Default)]
struct TreeOutcome {
    treated: bool,
    screened: bool,
    hospital: bool,
}

/// Per-host event-scheduler state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventScheduler {
    pg_state: u32,
    /// When the host will act on the bout (treatment seeking delay).
    case_start_time: SimTime,
    /// Recovery time of the current bout.
    time_of_recovery: SimTime,
    time_last_treatment: SimTime,
    /// Parasite density on the previous day, for the death hazard.
    previous_density: f64,
    drugs: SimpleDrugModel,
}

impl_checkpoint!(EventScheduler: pg_state, case_start_time, time_of_recovery,
    time_last_treatment, previous_density, drugs);

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            pg_state: state::NONE,
            case_start_time: SimTime::never(),
            time_of_recovery: SimTime::never(),
            time_last_treatment: SimTime::never(),
            previous_density: 0.0,
            drugs: SimpleDrugModel::new(),
        }
    }

    /// True while the host is inside a clinical bout.
    pub fn is_existing_case(&self, now: SimTime) -> bool {
        self.pg_state & state::SICK != 0 && now < self.time_of_recovery
    }

    /// Daily update.
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
        indirect_death_delay: SimTime,
        episode: &mut Episode,
        memory: SimTime,
        mon: &mut Monitoring,
        age_group: u32,
        doom: &mut Doom,
        params: &EventSchedulerParams,
    ) -> Result<()> {
        // Attribute the episode before treatment can clear infections.
        let origin = within_host.infection_origin();
        let mut bits = state::NONE;

        if self.pg_state & state::SICK != 0 {
            // An existing case runs its course before new events register.
            if now >= self.time_of_recovery {
                if !matches!(doom, Doom::Direct) {
                    bits |= state::RECOVERY | (self.pg_state & state::IN_HOSPITAL);
                }
                self.pg_state = state::NONE;
            } else if self.pg_state & state::COMPLICATED != 0 {
                self.complicated_day(rng, within_host, now, age_years, &mut bits, doom, params);
            } else if now == self.case_start_time {
                // The host acts on the uncomplicated bout today.
                let second_line = self.recent_treatment(now);
                let out = self.exec_tree(
                    &params.uncomplicated_tree.clone(),
                    rng,
                    within_host,
                    wh_params,
                    diagnostic,
                    now,
                    age_years,
                    second_line,
                    params,
                )?;
                if out.treated {
                    self.time_last_treatment = now;
                    bits |= if second_line { state::SECOND_LINE } else { state::FIRST_LINE };
                }
            }
        } else {
            match morbidity.state {
                MorbidityState::None => {}
                MorbidityState::NonMalariaFever => {
                    bits |= state::SICK | state::NMF;
                    self.nmf_event(rng, within_host, diagnostic, age_years,
                        treatment_seeking_factor, now, indirect_death_delay, doom, params);
                }
                MorbidityState::Malaria | MorbidityState::Coinfection => {
                    bits |= state::SICK | state::MALARIA;
                    self.pg_state = state::SICK | state::MALARIA;
                    self.time_of_recovery = now + params.uncomplicated_case;
                    self.case_start_time =
                        now + sample_seek_delay(rng, treatment_seeking_factor, params);
                    if self.case_start_time == now {
                        let second_line = self.recent_treatment(now);
                        let out = self.exec_tree(
                            &params.uncomplicated_tree.clone(),
                            rng,
                            within_host,
                            wh_params,
                            diagnostic,
                            now,
                            age_years,
                            second_line,
                            params,
                        )?;
                        if out.treated {
                            self.time_last_treatment = now;
                            bits |= if second_line { state::SECOND_LINE } else { state::FIRST_LINE };
                        }
                    }
                }
                MorbidityState::Severe => {
                    bits |= state::SICK | state::MALARIA | state::COMPLICATED;
                    self.pg_state = state::SICK | state::MALARIA | state::COMPLICATED;
                    self.case_start_time = now;
                    self.time_of_recovery =
                        now + params.complicated_case + params.extra_days_at_risk;
                    let out = self.exec_tree(
                        &params.complicated_tree.clone(),
                        rng,
                        within_host,
                        wh_params,
                        diagnostic,
                        now,
                        age_years,
                        false,
                        params,
                    )?;
                    if out.hospital {
                        self.pg_state |= state::IN_HOSPITAL;
                        bits |= state::IN_HOSPITAL;
                    }
                    if out.treated {
                        self.time_last_treatment = now;
                        bits |= state::INPATIENT_TREATMENT;
                    }
                }
            }
            if morbidity.indirect_mortality && matches!(doom, Doom::None) {
                bits |= state::INDIRECT_DEATH;
                *doom = Doom::Indirect(now + indirect_death_delay);
            }
        }

        // Medications falling due today act on the within-host model.
        if let Some(action) = self.drugs.apply(now) {
            within_host.treat_simple(
                now,
                wh_params,
                false,
                action.clear_blood,
                0,
                action.prophylaxis_days,
            );
        }

        self.previous_density = within_host.total_density();
        episode.update(mon, now, memory, age_group, bits, origin);
        Ok(())
    }

    fn recent_treatment(&self, now: SimTime) -> bool {
        let days = (now - self.time_last_treatment).in_days();
        (1..=20).contains(&days)
    }

    /// Daily hazard of death in a complicated bout: the first-day fraction
    /// alpha spread geometrically, scaled up while densities are rising.
    fn complicated_day(
        &mut self,
        rng: &mut LocalRng,
        within_host: &WithinHostModel,
        now: SimTime,
        age_years: f64,
        bits: &mut u32,
        doom: &mut Doom,
        params: &EventSchedulerParams,
    ) {
        let t = (now - self.case_start_time).in_days().max(0);
        let density = within_host.total_density();
        let trajectory = if self.previous_density > 0.0 {
            (2.0 * density / (density + self.previous_density)).clamp(0.5, 2.0)
        } else {
            1.0
        };
        // Hospitalised cases face a lower hazard.
        let hospital_factor = if self.pg_state & state::IN_HOSPITAL != 0 { 0.5 } else { 1.0 };
        let _ = age_years;
        let p_death = (params.alpha * params.v.powi(t) * trajectory * hospital_factor).min(1.0);
        if rng.bernoulli(p_death) {
            *bits |= state::DIRECT_DEATH;
            if self.pg_state & state::IN_HOSPITAL != 0 {
                *bits |= state::IN_HOSPITAL;
            }
            *doom = Doom::Direct;
        }
    }

    /// Non-malarial fever treatment: the antibiotic prescription follows a
    /// logistic model; untreated fevers needing antibiotics carry a
    /// fatality risk.
    #[allow(clippy::too_many_arguments)]
    fn nmf_event(
        &mut self,
        rng: &mut LocalRng,
        within_host: &WithinHostModel,
        diagnostic: &Diagnostic,
        age_years: f64,
        treatment_seeking_factor: f64,
        now: SimTime,
        indirect_death_delay: SimTime,
        doom: &mut Doom,
        params: &EventSchedulerParams,
    ) {
        let needs_ab = params.p_need_antibiotic.is_set()
            && rng.bernoulli(params.p_need_antibiotic.eval(age_years));
        let positive_test =
            diagnostic.is_positive(within_host.total_density(), within_host.hrp2_density());
        let [b0, b_neg, b_pos, b_need, b_informal] = params.ab_logistic;
        let logit = b0
            + if positive_test { b_pos } else { b_neg }
            + if needs_ab { b_need } else { 0.0 }
            + b_informal * 0.0;
        let p_ab = (1.0 / (1.0 + (-logit).exp())) * treatment_seeking_factor.min(1.0);
        let treated = rng.bernoulli(p_ab.clamp(0.0, 1.0));

        if needs_ab && params.severe_nmf_mortality.is_set() {
            let mut cfr = params.severe_nmf_mortality.eval(age_years);
            if treated {
                cfr *= params.one_minus_efficacy_ab;
            }
            if rng.bernoulli(cfr.clamp(0.0, 1.0)) && matches!(doom, Doom::None) {
                *doom = Doom::Indirect(now + indirect_death_delay);
            }
        }
    }

    /// Walk a decision tree; leaves act on the drug model or the
    /// within-host model directly.
    #[allow(clippy::too_many_arguments)]
    fn exec_tree(
        &mut self,
        node: &DecisionNode,
        rng: &mut LocalRng,
        within_host: &mut WithinHostModel,
        wh_params: &WithinHostParams,
        diagnostic: &Diagnostic,
        now: SimTime,
        age_years: f64,
        second_line: bool,
        params: &EventSchedulerParams,
    ) -> Result<TreeOutcome> {
        match node {
            DecisionNode::NoTreatment => Ok(TreeOutcome::default()),
            DecisionNode::Treat { schedule, dosage, delay_days } => {
                let sched = SimpleDrugModel::resolve(&params.drug_schedules, *schedule)?;
                self.drugs.treat_pkpd(rng, sched, *dosage, age_years, *delay_days, now)?;
                Ok(TreeOutcome { treated: true, screened: false, hospital: false })
            }
            DecisionNode::TreatSimple { liver_days, blood_days } => {
                within_host.treat_simple(now, wh_params, true, true, *liver_days, *blood_days);
                Ok(TreeOutcome { treated: true, screened: false, hospital: false })
            }
            DecisionNode::Diagnostic { positive, negative } => {
                let is_positive = diagnostic
                    .is_positive(within_host.total_density(), within_host.hrp2_density());
                let branch = if is_positive { positive } else { negative };
                let mut out = self.exec_tree(branch, rng, within_host, wh_params, diagnostic,
                    now, age_years, second_line, params)?;
                out.screened = true;
                Ok(out)
            }
            DecisionNode::Random { p, yes, no } => {
                let branch = if rng.bernoulli(*p) { yes } else { no };
                self.exec_tree(branch, rng, within_host, wh_params, diagnostic, now, age_years,
                    second_line, params)
            }
            DecisionNode::CaseType { first_line, second_line: second } => {
                let branch = if second_line { second } else { first_line };
                self.exec_tree(branch, rng, within_host, wh_params, diagnostic, now, age_years,
                    second_line, params)
            }
            DecisionNode::Refer { tree } => {
                let mut out = self.exec_tree(tree, rng, within_host, wh_params, diagnostic, now,
                    age_years, second_line, params)?;
                out.hospital = true;
                Ok(out)
            }
        }
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Treatment-seeking delay in days, from the cumulative daily
/// probabilities. The last table entry is 1, so a delay always resolves;
/// stronger treatment seeking shortens the delay.
fn sample_seek_delay(
    rng: &mut LocalRng,
    treatment_seeking_factor: f64,
    params: &EventSchedulerParams,
) -> SimTime {
    let u = rng.uniform_01() / treatment_seeking_factor.max(1e-9);
    for (day, &p) in params.cum_daily_pr_seek.iter().enumerate() {
        if u <= p {
            return SimTime::from_days(day as i32);
        }
    }
    SimTime::from_days(params.cum_daily_pr_seek.len() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotypes::Genotypes;
    use crate::test_support::{event_scheduler_scenario, minimal_scenario};
    use crate::withinhost::test_params;
    use malsim_data::scenario::{HealthSystemConfig, WithinHostVariant};

    fn setup() -> (EventSchedulerParams, WithinHostParams) {
        let scenario = event_scheduler_scenario();
        let es = match &scenario.clinical.health_system {
            HealthSystemConfig::EventScheduler(es) => es.clone(),
            HealthSystemConfig::Immediate(_) => unreachable!(),
        };
        let params = EventSchedulerParams::new(&es, &malsim_data::Parameters::reference()).unwrap();
        (params, test_params(WithinHostVariant::Empirical, 0))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_day(
        model: &mut EventScheduler,
        rng: &mut LocalRng,
        wh: &mut WithinHostModel,
        wh_params: &WithinHostParams,
        morbidity: StatePair,
        now: SimTime,
        doom: &mut Doom,
        episode: &mut Episode,
        mon: &mut Monitoring,
        params: &EventSchedulerParams,
    ) {
        let diagnostic = Diagnostic::new(40.0, false);
        model
            .update(
                rng,
                wh,
                wh_params,
                &diagnostic,
                morbidity,
                now,
                20.0,
                1.0,
                SimTime::from_days(30),
                episode,
                SimTime::from_days(20),
                mon,
                2,
                doom,
                params,
            )
            .unwrap();
    }

    #[test]
    fn test_seek_delay_within_table() {
        let (params, _) = setup();
        let mut rng = LocalRng::master(1);
        for _ in 0..200 {
            let d = sample_seek_delay(&mut rng, 1.0, &params);
            assert!(d.in_days() >= 0);
            assert!((d.in_days() as usize) < params.cum_daily_pr_seek.len());
        }
    }

    #[test]
    fn test_uncomplicated_bout_treats_and_recovers() {
        let (params, wh_params) = setup();
        let mut rng = LocalRng::master(2);
        let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
        let genotypes = Genotypes::from_config(&[]).unwrap();
        let mut model = EventScheduler::new();
        let mut doom = Doom::None;
        let mut episode = Episode::new();
        let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());

        let mut now = SimTime::zero();
        wh.update(&mut rng, now, 20.0, 2, 0, 0, &[], &[], 1.0, 1.0, &genotypes, &wh_params).unwrap();
        run_day(
            &mut model,
            &mut rng,
            &mut wh,
            &wh_params,
            StatePair { state: MorbidityState::Malaria, indirect_mortality: false },
            now,
            &mut doom,
            &mut episode,
            &mut mon,
            &params,
        );
        assert!(model.is_existing_case(now));
        // Run forward; the bout ends and the drug eventually clears the
        // infections (the test tree treats with certainty).
        for _ in 0..10 {
            now += SimTime::from_days(1);
            wh.update(&mut rng, now, 20.0, 0, 0, 0, &[], &[], 1.0, 1.0, &genotypes, &wh_params).unwrap();
            run_day(
                &mut model,
                &mut rng,
                &mut wh,
                &wh_params,
                StatePair { state: MorbidityState::None, indirect_mortality: false },
                now,
                &mut doom,
                &mut episode,
                &mut mon,
                &params,
            );
        }
        assert!(!model.is_existing_case(now));
        assert!(matches!(doom, Doom::None));
        assert_eq!(wh.num_infections(), 0, "treatment should clear the infections");
    }

    #[test]
    fn test_complicated_bout_carries_death_risk() {
        let (params, wh_params) = setup();
        let mut deaths = 0;
        for seed in 0..200 {
            let mut rng = LocalRng::master(1000 + seed);
            let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
            let mut model = EventScheduler::new();
            let mut doom = Doom::None;
            let mut episode = Episode::new();
            let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());
            let mut now = SimTime::zero();
            run_day(
                &mut model,
                &mut rng,
                &mut wh,
                &wh_params,
                StatePair { state: MorbidityState::Severe, indirect_mortality: false },
                now,
                &mut doom,
                &mut episode,
                &mut mon,
                &params,
            );
            for _ in 0..8 {
                now += SimTime::from_days(1);
                run_day(
                    &mut model,
                    &mut rng,
                    &mut wh,
                    &wh_params,
                    StatePair { state: MorbidityState::None, indirect_mortality: false },
                    now,
                    &mut doom,
                    &mut episode,
                    &mut mon,
                    &params,
                );
                if matches!(doom, Doom::Direct) {
                    deaths += 1;
                    break;
                }
            }
        }
        // The hazard is substantial but not certain.
        assert!(deaths > 0, "some complicated bouts end in death");
        assert!(deaths < 200, "not every complicated bout ends in death");
    }

    #[test]
    fn test_refer_flags_hospital() {
        let (params, wh_params) = setup();
        let mut rng = LocalRng::master(3);
        let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
        let mut model = EventScheduler::new();
        let mut doom = Doom::None;
        let mut episode = Episode::new();
        let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());
        run_day(
            &mut model,
            &mut rng,
            &mut wh,
            &wh_params,
            StatePair { state: MorbidityState::Severe, indirect_mortality: false },
            SimTime::zero(),
            &mut doom,
            &mut episode,
            &mut mon,
            &params,
        );
        // The complicated test tree refers to hospital.
        assert_ne!(model.pg_state & state::IN_HOSPITAL, 0);
        assert_ne!(episode.state_bits() & state::IN_HOSPITAL, 0);
    }
}
