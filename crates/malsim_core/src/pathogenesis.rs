//! Pathogenesis: mapping parasite densities to clinical state.
//!
//! Three variants share one surrounding algorithm. The default (pyrogen)
//! model maintains a per-host pyrogenic threshold Y* driven by parasite
//! density; the probability of an acute episode saturates in the step's
//! maximum density relative to Y*. The Mueller model replaces the episode
//! probability with a density power law, and the predetermined variant
//! triggers episodes deterministically at threshold crossings.

use std::io::{Read, Write};

use malsim_data::scenario::{PathogenesisVariant, Scenario};
use malsim_data::Parameter;

use crate::error::{Result, SimError};
use crate::time::DAYS_PER_YEAR;
use crate::util::age_group::AgeGroupInterpolator;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;

/// Substep count of the historical numerical integration of the pyrogenic
/// threshold update. Part of the model definition, not a tunable.
const PYROGEN_SUBSTEPS: usize = 11;

/// Clinical state produced for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorbidityState {
    None,
    /// Non-malarial fever.
    NonMalariaFever,
    /// Uncomplicated malaria episode.
    Malaria,
    /// Uncomplicated malaria with a non-malarial co-infection.
    Coinfection,
    /// Severe malaria episode.
    Severe,
}

impl MorbidityState {
    pub fn is_malaria(self) -> bool {
        matches!(self, MorbidityState::Malaria | MorbidityState::Coinfection | MorbidityState::Severe)
    }

    pub fn is_sick(self) -> bool {
        self != MorbidityState::None
    }
}

/// Result of a morbidity decision: the state plus an independent
/// indirect-mortality flag.
#[derive(Debug, Clone, Copy)]
pub struct StatePair {
    pub state: MorbidityState,
    pub indirect_mortality: bool,
}

#[derive(Debug, Clone)]
pub struct PathogenesisParams {
    variant: PathogenesisVariant,
    init_pyro_thres: f64,
    /// Per-step decay rate of the pyrogenic threshold.
    smu_y: f64,
    ystar1: f64,
    ystar2: f64,
    alpha: f64,
    step_days: i32,
    years_per_step: f64,
    /// 1 - exp(-INDIRECT_RISK_COFACTOR)
    indir_risk_cofactor: f64,
    /// Critical density for severe malaria (Y*B1), offset by one.
    severe_threshold: f64,
    /// 1 - exp(-COMORBIDITY_INTERCEPT)
    comorb_intercept: f64,
    inv_crit_age: f64,
    mueller_rate: f64,
    mueller_exponent: f64,
    nmf_incidence: AgeGroupInterpolator,
}

impl PathogenesisParams {
    pub fn from_scenario(scenario: &Scenario, params: &malsim_data::Parameters) -> Result<Self> {
        let get = |p: Parameter| -> Result<f64> {
            params
                .get(p)
                .ok_or_else(|| SimError::scenario(format!("missing model parameter {:?}", p)))
        };
        let step_days = scenario.simulation.step_days;
        let steps_per_year = DAYS_PER_YEAR as f64 / step_days as f64;
        let half_life = get(Parameter::YStarHalfLife)?;
        Ok(Self {
            variant: scenario.pathogenesis.variant,
            init_pyro_thres: get(Parameter::YStar0)?,
            smu_y: -(0.5f64.ln()) / (steps_per_year * half_life),
            ystar1: get(Parameter::YStar1)?,
            ystar2: get(Parameter::YStarSq)?,
            alpha: get(Parameter::Alpha)?,
            step_days,
            years_per_step: 1.0 / steps_per_year,
            indir_risk_cofactor: 1.0 - (-get(Parameter::IndirectRiskCofactor)?).exp(),
            severe_threshold: get(Parameter::SevereMalariaThreshold)? + 1.0,
            comorb_intercept: 1.0 - (-get(Parameter::ComorbidityIntercept)?).exp(),
            inv_crit_age: 1.0 / get(Parameter::CriticalAgeForComorbidity)?,
            mueller_rate: get(Parameter::MuellerRateMultiplier)?,
            mueller_exponent: get(Parameter::MuellerDensityExponent)?,
            nmf_incidence: AgeGroupInterpolator::from_points(&scenario.pathogenesis.nmf_incidence)?,
        })
    }
}

/// Per-host pathogenesis state.
#[derive(Debug, Clone)]
pub struct PathogenesisModel {
    comorbidity_factor: f64,
    pyrogen_threshold: f64,
    variant: PathogenesisVariant,
}

impl PathogenesisModel {
    pub fn new(comorbidity_factor: f64, params: &PathogenesisParams) -> Self {
        Self {
            comorbidity_factor,
            pyrogen_threshold: params.init_pyro_thres,
            variant: params.variant,
        }
    }

    pub fn pyrogen_threshold(&self) -> f64 {
        self.pyrogen_threshold
    }

    /// Probability of an acute malaria episode this step, updating the
    /// pyrogenic threshold where the variant maintains one.
    fn p_episode(&mut self, ts_max_density: f64, total_density: f64, p: &PathogenesisParams) -> f64 {
        match self.variant {
            PathogenesisVariant::Pyrogen => {
                self.update_pyrogen_threshold(total_density, p);
                ts_max_density / (ts_max_density + self.pyrogen_threshold)
            }
            PathogenesisVariant::Mueller => {
                let incidence =
                    p.mueller_rate * total_density.powf(p.mueller_exponent) * p.years_per_step;
                1.0 - (-incidence).exp()
            }
            PathogenesisVariant::Predetermined => {
                self.update_pyrogen_threshold(total_density, p);
                if ts_max_density > self.pyrogen_threshold {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Numerical approximation of the threshold ODE (AJTMH 75(2) eq. 2),
    /// integrated in the historical eleven substeps.
    fn update_pyrogen_threshold(&mut self, density: f64, p: &PathogenesisParams) {
        let delt = 1.0 / PYROGEN_SUBSTEPS as f64;
        let mut y_star = self.pyrogen_threshold;
        for _ in 0..PYROGEN_SUBSTEPS {
            y_star += density * p.alpha * p.step_days as f64 * delt
                / ((p.ystar1 + density) * (p.ystar2 + y_star))
                - p.smu_y * y_star * delt;
        }
        self.pyrogen_threshold = y_star;
    }

    /// Decide the clinical outcome of this step.
    pub fn determine_state(
        &mut self,
        rng: &mut LocalRng,
        age_years: f64,
        ts_max_density: f64,
        total_density: f64,
        params: &PathogenesisParams,
    ) -> StatePair {
        let p_fever = self.p_episode(ts_max_density, total_density, params);
        let mut result = StatePair { state: MorbidityState::None, indirect_mortality: false };
        if rng.bernoulli(p_fever) {
            let p_severe = ts_max_density / (ts_max_density + params.severe_threshold);
            let comorb_factor =
                self.comorbidity_factor / (1.0 + age_years * params.inv_crit_age);
            if rng.bernoulli(p_severe) {
                result.state = MorbidityState::Severe;
            } else if rng.bernoulli(params.comorb_intercept * comorb_factor) {
                result.state = MorbidityState::Coinfection;
            } else {
                result.state = MorbidityState::Malaria;
            }
            // Probability of dying from indirect effects of malaria,
            // conditional on not having an acute attack.
            if rng.bernoulli(params.indir_risk_cofactor * comorb_factor) {
                result.indirect_mortality = true;
            }
        } else {
            result.state = self.sample_nmf(rng, age_years, params);
        }
        result
    }

    fn sample_nmf(
        &self,
        rng: &mut LocalRng,
        age_years: f64,
        params: &PathogenesisParams,
    ) -> MorbidityState {
        if params.nmf_incidence.is_set() {
            let rate = params.nmf_incidence.eval(age_years);
            let p = 1.0 - (-rate * params.years_per_step).exp();
            if rng.bernoulli(p) {
                return MorbidityState::NonMalariaFever;
            }
        }
        MorbidityState::None
    }
}

impl Checkpoint for PathogenesisModel {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.comorbidity_factor.write_ckpt(w)?;
        self.pyrogen_threshold.write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.comorbidity_factor.read_ckpt(r)?;
        self.pyrogen_threshold.read_ckpt(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::minimal_scenario;
    use malsim_data::scenario::AgePoint;

    fn params(variant: PathogenesisVariant) -> PathogenesisParams {
        let mut scenario = minimal_scenario();
        scenario.pathogenesis.variant = variant;
        scenario.pathogenesis.nmf_incidence =
            vec![AgePoint { upper_age_years: 90.0, value: 1.0 }];
        PathogenesisParams::from_scenario(&scenario, &malsim_data::Parameters::reference()).unwrap()
    }

    #[test]
    fn test_threshold_rises_with_density_and_decays() {
        let p = params(PathogenesisVariant::Pyrogen);
        let mut model = PathogenesisModel::new(1.0, &p);
        let initial = model.pyrogen_threshold();
        model.update_pyrogen_threshold(1e5, &p);
        let raised = model.pyrogen_threshold();
        assert!(raised > initial);
        // Density zero: pure exponential decay.
        model.update_pyrogen_threshold(0.0, &p);
        assert!(model.pyrogen_threshold() < raised);
    }

    #[test]
    fn test_high_density_likely_fever() {
        let p = params(PathogenesisVariant::Pyrogen);
        let mut model = PathogenesisModel::new(1.0, &p);
        let p_low = model.p_episode(1.0, 1.0, &p);
        let mut model2 = PathogenesisModel::new(1.0, &p);
        let p_high = model2.p_episode(1e6, 1e6, &p);
        assert!(p_high > p_low);
        assert!(p_high > 0.5);
    }

    #[test]
    fn test_predetermined_is_deterministic() {
        let p = params(PathogenesisVariant::Predetermined);
        let mut model = PathogenesisModel::new(1.0, &p);
        let thres = model.pyrogen_threshold();
        assert_eq!(model.p_episode(thres * 2.0, 0.0, &p), 1.0);
        let mut model2 = PathogenesisModel::new(1.0, &p);
        let thres2 = model2.pyrogen_threshold();
        assert_eq!(model2.p_episode(thres2 * 0.1, 0.0, &p), 0.0);
    }

    #[test]
    fn test_mueller_monotone_in_density() {
        let p = params(PathogenesisVariant::Mueller);
        let mut model = PathogenesisModel::new(1.0, &p);
        let lo = model.p_episode(0.0, 10.0, &p);
        let hi = model.p_episode(0.0, 1e5, &p);
        assert!(hi > lo);
        assert!((0.0..=1.0).contains(&hi));
    }

    #[test]
    fn test_healthy_host_can_have_nmf() {
        let p = params(PathogenesisVariant::Pyrogen);
        let mut model = PathogenesisModel::new(1.0, &p);
        let mut rng = LocalRng::master(77);
        let mut nmf = 0;
        for _ in 0..2000 {
            let out = model.determine_state(&mut rng, 20.0, 0.0, 0.0, &p);
            assert!(!out.state.is_malaria());
            if out.state == MorbidityState::NonMalariaFever {
                nmf += 1;
            }
        }
        assert!(nmf > 0);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let p = params(PathogenesisVariant::Pyrogen);
        let mut model = PathogenesisModel::new(0.8, &p);
        model.update_pyrogen_threshold(5e4, &p);
        let mut buf = Vec::new();
        model.write_ckpt(&mut buf).unwrap();
        let mut restored = PathogenesisModel::new(1.0, &p);
        restored.read_ckpt(&mut &buf[..]).unwrap();
        assert_eq!(restored.pyrogen_threshold(), model.pyrogen_threshold());
        assert_eq!(restored.comorbidity_factor, 0.8);
    }
}
