//! The immediate-outcomes (5-day) case-management model.
//!
//! Everything about a clinical episode resolves on the step it occurs:
//! treatment seeking, parasite clearance, hospital case fatality (with a
//! community rate derived through a log-odds ratio for untreated severe
//! cases) and sequelae. Regimens are first-line, second-line (within the
//! recent-treatment window) and severe.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::ImmediateOutcomesConfig;
use malsim_data::Parameter;

use crate::clinical::episode::{state, Episode};
use crate::clinical::Doom;
use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::monitoring::Monitoring;
use crate::pathogenesis::{MorbidityState, StatePair};
use crate::time::SimTime;
use crate::util::age_group::AgeGroupInterpolator;
use crate::util::rng::LocalRng;
use crate::withinhost::{WithinHostModel, WithinHostParams};

/// Regimen indices into the treatment probability tables.
const UC: usize = 0;
const UC2: usize = 1;
const SEVERE: usize = 2;

/// Age bound between the two sequelae groups, years.
const SEQUELAE_AGE_BOUND: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct ImmediateParams {
    p_treatment: [f64; 3],
    p_parasites_cleared: [f64; 3],
    case_fatality: AgeGroupInterpolator,
    /// Odds ratio of community vs hospital case fatality.
    community_odds_ratio: f64,
    p_sequelae_treated: [f64; 2],
    p_sequelae_untreated: [f64; 2],
    step_days: i32,
}

impl ImmediateParams {
    pub fn new(
        cfg: &ImmediateOutcomesConfig,
        step_days: i32,
        params: &malsim_data::Parameters,
    ) -> Result<Self> {
        let log_odds = params
            .get(Parameter::LogOddsRatioCfCommunity)
            .ok_or_else(|| SimError::scenario("missing LOG_ODDS_RATIO_CF_COMMUNITY"))?;
        Ok(Self {
            p_treatment: cfg.p_treatment,
            p_parasites_cleared: cfg.p_parasites_cleared,
            case_fatality: AgeGroupInterpolator::from_points(&cfg.case_fatality)?,
            community_odds_ratio: log_odds.exp(),
            p_sequelae_treated: cfg.p_sequelae_treated,
            p_sequelae_untreated: cfg.p_sequelae_untreated,
            step_days,
        })
    }

    fn hospital_cfr(&self, age_years: f64) -> f64 {
        self.case_fatality.eval(age_years).clamp(0.0, 1.0)
    }

    /// Community case fatality from the hospital rate via the log-odds
    /// ratio.
    fn community_cfr(&self, age_years: f64) -> f64 {
        let cfr = self.hospital_cfr(age_years);
        if cfr >= 1.0 {
            return 1.0;
        }
        let odds = self.community_odds_ratio * cfr / (1.0 - cfr);
        odds / (1.0 + odds)
    }

    fn sequelae(&self, table: &[f64; 2], age_years: f64) -> f64 {
        if age_years < SEQUELAE_AGE_BOUND {
            table[0]
        } else {
            table[1]
        }
    }
}

/// Per-host state of the immediate-outcomes model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateOutcomes {
    t_last_treatment: SimTime,
}

impl_checkpoint!(ImmediateOutcomes: t_last_treatment);

impl ImmediateOutcomes {
    pub fn new() -> Self {
        Self { t_last_treatment: SimTime::never() }
    }

    /// Second-line treatment applies within the refractory window after a
    /// recent treatment.
    fn recent_treatment(&self, now: SimTime, step_days: i32) -> bool {
        let steps = (now - self.t_last_treatment).in_days() / step_days;
        (1..=4).contains(&steps)
    }

    /// Resolve this step's clinical outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        rng: &mut LocalRng,
        within_host: &mut WithinHostModel,
        wh_params: &WithinHostParams,
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
        params: &ImmediateParams,
    ) -> Result<()> {
        // Attribute the episode before treatment can clear infections.
        let origin = within_host.infection_origin();
        let mut bits = state::NONE;
        match morbidity.state {
            MorbidityState::None => {}
            MorbidityState::NonMalariaFever => bits |= state::SICK | state::NMF,
            MorbidityState::Malaria | MorbidityState::Coinfection => {
                bits |= state::SICK | state::MALARIA;
                self.uncomplicated_event(rng, within_host, wh_params, now, age_years,
                    treatment_seeking_factor, &mut bits, params)?;
            }
            MorbidityState::Severe => {
                bits |= state::SICK | state::MALARIA | state::COMPLICATED;
                self.severe_event(rng, within_host, wh_params, now, age_years,
                    treatment_seeking_factor, &mut bits, doom, params)?;
            }
        }
        if morbidity.indirect_mortality && !matches!(doom, Doom::Direct) {
            bits |= state::INDIRECT_DEATH;
            if matches!(doom, Doom::None) {
                *doom = Doom::Indirect(now + indirect_death_delay);
            }
        }
        episode.update(mon, now, memory, age_group, bits, origin);
        Ok(())
    }

    fn uncomplicated_event(
        &mut self,
        rng: &mut LocalRng,
        within_host: &mut WithinHostModel,
        wh_params: &WithinHostParams,
        now: SimTime,
        _age_years: f64,
        treatment_seeking_factor: f64,
        bits: &mut u32,
        params: &ImmediateParams,
    ) -> Result<()> {
        let regimen = if self.recent_treatment(now, params.step_days) { UC2 } else { UC };
        let p_seek = params.p_treatment[regimen] * treatment_seeking_factor;
        if !rng.bernoulli(p_seek.min(1.0)) {
            return Ok(());
        }
        *bits |= if regimen == UC2 { state::SECOND_LINE } else { state::FIRST_LINE };
        self.t_last_treatment = now;
        if rng.bernoulli(params.p_parasites_cleared[regimen]) {
            within_host.treat_simple(now, wh_params, true, true, 0, 0);
        }
        Ok(())
    }

    fn severe_event(
        &mut self,
        rng: &mut LocalRng,
        within_host: &mut WithinHostModel,
        wh_params: &WithinHostParams,
        now: SimTime,
        age_years: f64,
        treatment_seeking_factor: f64,
        bits: &mut u32,
        doom: &mut Doom,
        params: &ImmediateParams,
    ) -> Result<()> {
        let p_seek = params.p_treatment[SEVERE] * treatment_seeking_factor;
        if rng.bernoulli(p_seek.min(1.0)) {
            // Hospital pathway.
            *bits |= state::IN_HOSPITAL | state::INPATIENT_TREATMENT;
            self.t_last_treatment = now;
            if rng.bernoulli(params.hospital_cfr(age_years)) {
                *bits |= state::DIRECT_DEATH;
                *doom = Doom::Direct;
                return Ok(());
            }
            if rng.bernoulli(params.sequelae(&params.p_sequelae_treated, age_years)) {
                *bits |= state::SEQUELAE;
            } else {
                *bits |= state::RECOVERY;
            }
            if rng.bernoulli(params.p_parasites_cleared[SEVERE]) {
                within_host.treat_simple(now, wh_params, true, true, 0, 0);
            }
        } else {
            // Community pathway.
            if rng.bernoulli(params.community_cfr(age_years)) {
                *bits |= state::DIRECT_DEATH;
                *doom = Doom::Direct;
                return Ok(());
            }
            if rng.bernoulli(params.sequelae(&params.p_sequelae_untreated, age_years)) {
                *bits |= state::SEQUELAE;
            } else {
                *bits |= state::RECOVERY;
            }
        }
        Ok(())
    }
}

impl Default for ImmediateOutcomes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotypes::Genotypes;
    use crate::test_support::minimal_scenario;
    use crate::withinhost::test_params;
    use malsim_data::scenario::{HealthSystemConfig, WithinHostVariant};

    fn setup() -> (ImmediateParams, WithinHostParams) {
        let scenario = minimal_scenario();
        let im = match &scenario.clinical.health_system {
            HealthSystemConfig::Immediate(im) => im.clone(),
            HealthSystemConfig::EventScheduler(_) => unreachable!(),
        };
        let params =
            ImmediateParams::new(&im, 5, &malsim_data::Parameters::reference()).unwrap();
        (params, test_params(WithinHostVariant::Descriptive, 0))
    }

    #[test]
    fn test_community_cfr_above_hospital() {
        let (params, _) = setup();
        // The log-odds ratio is positive: untreated severe cases fare worse.
        assert!(params.community_cfr(2.0) > params.hospital_cfr(2.0));
        assert!(params.community_cfr(2.0) <= 1.0);
    }

    #[test]
    fn test_guaranteed_treatment_clears_parasites() {
        let (mut params, wh_params) = setup();
        params.p_treatment = [1.0, 1.0, 1.0];
        params.p_parasites_cleared = [1.0, 1.0, 1.0];
        let mut rng = LocalRng::master(5);
        let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
        let genotypes = Genotypes::from_config(&[]).unwrap();
        let mut now = SimTime::zero();
        wh.update(&mut rng, now, 20.0, 3, 0, 0, &[], &[], 1.0, 1.0, &genotypes, &wh_params).unwrap();
        for _ in 0..6 {
            now += SimTime::from_days(5);
            wh.update(&mut rng, now, 20.0, 0, 0, 0, &[], &[], 1.0, 1.0, &genotypes, &wh_params).unwrap();
        }
        assert!(wh.num_infections() > 0);

        let mut model = ImmediateOutcomes::new();
        let mut episode = Episode::new();
        let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());
        let mut doom = Doom::None;
        let morbidity = StatePair {
            state: MorbidityState::Malaria,
            indirect_mortality: false,
        };
        model
            .update(
                &mut rng,
                &mut wh,
                &wh_params,
                morbidity,
                now,
                20.0,
                1.0,
                SimTime::from_days(30),
                &mut episode,
                SimTime::from_days(20),
                &mut mon,
                2,
                &mut doom,
                &params,
            )
            .unwrap();
        assert_eq!(wh.num_infections(), 0);
        assert!(matches!(doom, Doom::None));
        assert_ne!(episode.state_bits() & state::FIRST_LINE, 0);
    }

    #[test]
    fn test_second_line_within_window() {
        let (params, _) = setup();
        let mut model = ImmediateOutcomes::new();
        model.t_last_treatment = SimTime::from_days(100);
        assert!(model.recent_treatment(SimTime::from_days(105), params.step_days));
        assert!(model.recent_treatment(SimTime::from_days(120), params.step_days));
        assert!(!model.recent_treatment(SimTime::from_days(100), params.step_days));
        assert!(!model.recent_treatment(SimTime::from_days(130), params.step_days));
    }

    #[test]
    fn test_untreated_severe_can_kill() {
        let (mut params, wh_params) = setup();
        params.p_treatment = [0.0, 0.0, 0.0];
        // Certain community death.
        params.case_fatality = AgeGroupInterpolator::from_points(&[
            malsim_data::scenario::AgePoint { upper_age_years: 90.0, value: 1.0 },
        ])
        .unwrap();
        let mut rng = LocalRng::master(6);
        let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
        let mut model = ImmediateOutcomes::new();
        let mut episode = Episode::new();
        let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());
        let mut doom = Doom::None;
        let morbidity = StatePair { state: MorbidityState::Severe, indirect_mortality: false };
        model
            .update(
                &mut rng,
                &mut wh,
                &wh_params,
                morbidity,
                SimTime::zero(),
                2.0,
                1.0,
                SimTime::from_days(30),
                &mut episode,
                SimTime::from_days(20),
                &mut mon,
                1,
                &mut doom,
                &params,
            )
            .unwrap();
        assert!(matches!(doom, Doom::Direct));
    }

    #[test]
    fn test_indirect_mortality_delayed() {
        let (params, wh_params) = setup();
        let mut rng = LocalRng::master(7);
        let mut wh = WithinHostModel::new(&mut rng, 1.0, &wh_params);
        let mut model = ImmediateOutcomes::new();
        let mut episode = Episode::new();
        let mut mon = Monitoring::new(&minimal_scenario(), SimTime::zero());
        let mut doom = Doom::None;
        let morbidity = StatePair { state: MorbidityState::None, indirect_mortality: true };
        model
            .update(
                &mut rng,
                &mut wh,
                &wh_params,
                morbidity,
                SimTime::from_days(10),
                1.0,
                1.0,
                SimTime::from_days(30),
                &mut episode,
                SimTime::from_days(20),
                &mut mon,
                0,
                &mut doom,
                &params,
            )
            .unwrap();
        assert!(matches!(doom, Doom::Indirect(t) if t == SimTime::from_days(40)));
    }
}
