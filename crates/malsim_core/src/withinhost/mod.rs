//! Within-host parasite dynamics.
//!
//! A host's within-host model owns its infections (never referenced
//! elsewhere), aggregates their densities, applies immunity decay and
//! treatment, maintains the 20-day infectiousness lag buffer and answers
//! patency and morbidity queries.

use std::io::{Read, Write};

use malsim_data::scenario::{Scenario, WithinHostVariant};
use malsim_data::Parameter;

use crate::error::{Result, SimError};
use crate::genotypes::Genotypes;
use crate::monitoring::{HostReportCtx, Monitoring};
use crate::pathogenesis::{PathogenesisModel, PathogenesisParams, StatePair};
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;

pub mod descriptive;
pub mod empirical;
pub mod infection;
pub mod molineaux;

pub use infection::{Infection, InfectionOrigin, SurvivalFactors, MAX_DENS};

use descriptive::DescriptiveParams;
use empirical::EmpiricalParams;
use malsim_data::Measure;
use molineaux::MolineauxParams;

/// Hard bound on concurrent infections per host.
pub const MAX_INFECTIONS: usize = 21;

/// Transmission-chain strata carried through the mosquito arrays for each
/// genotype: parasites circulating in local chains versus parasites from
/// imported cases. Stratum index = genotype * ORIGIN_STRATA + chain, with
/// chain 0 = local and chain 1 = imported. A mosquito infected from the
/// imported chain produces `Introduced` infections in the next host.
pub const ORIGIN_STRATA: usize = 2;

// Weights of the 10/15/20-day density lags in the infectiousness model.
const LAG_WEIGHTS: [f64; 3] = [1.0, 0.46, 0.17];
const LAG_DAYS: [i32; 3] = [10, 15, 20];
// Saturation of host-to-mosquito transmission (fitted constants): the
// probability is bounded by the maximum infectiousness and follows a
// log-probit curve in the weighted lagged density.
const TRANSMIT_MAX: f64 = 0.912;
const TRANSMIT_MU: f64 = 9.2;
const TRANSMIT_SIGMA: f64 = 3.8;

/// The monitoring diagnostic: densities above the limit are patent.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    dens_limit: f64,
    uses_hrp2: bool,
}

impl Diagnostic {
    pub fn new(dens_limit: f64, uses_hrp2: bool) -> Self {
        Self { dens_limit, uses_hrp2 }
    }

    pub fn is_positive(&self, total_density: f64, hrp2_density: f64) -> bool {
        let observed = if self.uses_hrp2 { hrp2_density } else { total_density };
        observed > self.dens_limit
    }
}

/// Process-wide within-host parameters, fixed after scenario load.
#[derive(Debug, Clone)]
pub struct WithinHostParams {
    pub variant: WithinHostVariant,
    pub step_days: i32,
    pub latent_p: SimTime,
    pub extinction_level: f64,
    /// Length of the infectiousness lag ring, in steps (20 days).
    pub y_lag_len: usize,
    pub n_genotypes: usize,
    // Immunity
    inv_cumulative_y_star: f64,
    inv_cumulative_h_star: f64,
    alpha_m: f64,
    decay_m: f64,
    sigma_i: f64,
    imm_effector_remain: f64,
    asex_imm_remain: f64,
    pub descriptive: DescriptiveParams,
    pub empirical: EmpiricalParams,
    pub molineaux: MolineauxParams,
    pub pathogenesis: PathogenesisParams,
}

fn required(params: &malsim_data::Parameters, p: Parameter) -> Result<f64> {
    params
        .get(p)
        .ok_or_else(|| SimError::scenario(format!("missing model parameter {:?} ({})", p, p.id())))
}

impl WithinHostParams {
    pub fn from_scenario(scenario: &Scenario, params: &malsim_data::Parameters) -> Result<Self> {
        let wh = &scenario.within_host;
        let step_days = scenario.simulation.step_days;
        let sigma0_sq = required(params, Parameter::Sigma0Sq)?;
        let x_nu_star = required(params, Parameter::XNuStar)?;
        let inflation_mean = wh.inflation.mean;
        let inflation_cv = wh.inflation.cv.unwrap_or(0.0);
        Ok(Self {
            variant: wh.variant,
            step_days,
            latent_p: SimTime::from_days(wh.latent_p_days),
            extinction_level: wh.extinction_level,
            y_lag_len: (20 / step_days).max(1) as usize,
            n_genotypes: scenario.num_genotypes(),
            inv_cumulative_y_star: 1.0 / required(params, Parameter::CumulativeYStar)?,
            inv_cumulative_h_star: 1.0 / required(params, Parameter::CumulativeHStar)?,
            alpha_m: 1.0 - (-required(params, Parameter::NegLogOneMinusAlphaM)?).exp(),
            decay_m: required(params, Parameter::DecayM)?,
            sigma_i: required(params, Parameter::SigmaISq)?.sqrt(),
            imm_effector_remain: (-required(params, Parameter::ImmuneEffectorDecay)?).exp(),
            asex_imm_remain: (-required(params, Parameter::AsexualImmunityDecay)?).exp(),
            descriptive: DescriptiveParams::new(
                step_days,
                sigma0_sq,
                x_nu_star,
                wh.extinction_level,
                wh.peak_log_density,
                wh.density_rise_days,
            ),
            empirical: EmpiricalParams::new(
                wh.extinction_level,
                wh.sub_patent_limit,
                wh.peak_log_density,
                wh.density_rise_days,
                inflation_mean,
                inflation_cv,
            ),
            molineaux: MolineauxParams::new(
                wh.extinction_level,
                required(params, Parameter::MeanLocalMaxDensity)?,
                required(params, Parameter::SdLocalMaxDensity)?,
                required(params, Parameter::MeanDiffPosDays)?,
                required(params, Parameter::SdDiffPosDays)?,
            ),
            pathogenesis: PathogenesisParams::from_scenario(scenario, params)?,
        })
    }
}

/// Per-host within-host state.
#[derive(Debug, Clone)]
pub struct WithinHostModel {
    infections: Vec<Infection>,
    pathogenesis: PathogenesisModel,
    /// Innate ability to control parasite densities, sampled at birth.
    innate_imm_surv_fact: f64,
    /// Number of infections received since birth.
    cumulative_h: f64,
    /// Cumulative parasite density since birth (density x days).
    cumulative_y: f64,
    /// `cumulative_y` as of the previous step.
    cumulative_y_lag: f64,
    total_density: f64,
    /// Density excluding HRP2-deficient infections.
    hrp2_density: f64,
    /// Maximum daily density over the last step.
    timestep_max_density: f64,
    /// Per-step, per-genotype lagged densities over the last 20 days,
    /// split by indigenous/introduced vs imported origin.
    /// Layout: `slot * n_genotypes + genotype`.
    y_lag_local: Vec<f64>,
    y_lag_imported: Vec<f64>,
    /// Start of the first step after treatment protection ends.
    treat_expiry_liver: SimTime,
    treat_expiry_blood: SimTime,
}

impl WithinHostModel {
    pub fn new(rng: &mut LocalRng, comorbidity_factor: f64, params: &WithinHostParams) -> Self {
        let len = params.y_lag_len * params.n_genotypes;
        Self {
            infections: Vec::new(),
            pathogenesis: PathogenesisModel::new(comorbidity_factor, &params.pathogenesis),
            innate_imm_surv_fact: (-params.sigma_i * rng.gauss(0.0, 1.0)).exp().min(1.0),
            cumulative_h: 0.0,
            cumulative_y: 0.0,
            cumulative_y_lag: 0.0,
            total_density: 0.0,
            hrp2_density: 0.0,
            timestep_max_density: 0.0,
            y_lag_local: vec![0.0; len],
            y_lag_imported: vec![0.0; len],
            treat_expiry_liver: SimTime::never(),
            treat_expiry_blood: SimTime::never(),
        }
    }

    pub fn total_density(&self) -> f64 {
        self.total_density
    }

    pub fn hrp2_density(&self) -> f64 {
        self.hrp2_density
    }

    pub fn timestep_max_density(&self) -> f64 {
        self.timestep_max_density
    }

    pub fn cumulative_h(&self) -> f64 {
        self.cumulative_h
    }

    pub fn cumulative_y(&self) -> f64 {
        self.cumulative_y
    }

    pub fn num_infections(&self) -> usize {
        self.infections.len()
    }

    /// Import one infection directly (importation hook); genotypes are
    /// sampled from the initial frequencies.
    pub fn import_infection(
        &mut self,
        rng: &mut LocalRng,
        now: SimTime,
        genotypes: &Genotypes,
        params: &WithinHostParams,
    ) {
        if self.infections.len() < MAX_INFECTIONS {
            self.cumulative_h += 1.0;
            let genotype = genotypes.sample(rng, &[]);
            self.infections.push(Infection::new(
                rng,
                now,
                genotype,
                InfectionOrigin::Imported,
                params,
            ));
        }
    }

    /// Step update: add new infections, update densities, remove extinct
    /// and treated infections, refresh immunity and the lag buffer.
    ///
    /// Indigenous inoculations come from local transmission chains and
    /// introduced ones from mosquitoes infected by imported cases; each
    /// class samples genotypes from its own weights. Imported infections
    /// (direct importation) use the initial genotype frequencies.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        rng: &mut LocalRng,
        now: SimTime,
        age_years: f64,
        n_new_indigenous: usize,
        n_new_introduced: usize,
        n_new_imported: usize,
        weights_indigenous: &[f64],
        weights_introduced: &[f64],
        bsv_factor: f64,
        drug_factor: f64,
        genotypes: &Genotypes,
        params: &WithinHostParams,
    ) -> Result<()> {
        // Silently clamp to the infection bound, indigenous inoculations
        // first, then introduced, then imported.
        let n_indigenous = n_new_indigenous.min(MAX_INFECTIONS - self.infections.len());
        let n_introduced =
            n_new_introduced.min(MAX_INFECTIONS - self.infections.len() - n_indigenous);
        let n_imported = n_new_imported
            .min(MAX_INFECTIONS - self.infections.len() - n_indigenous - n_introduced);
        for _ in 0..n_indigenous {
            let genotype = genotypes.sample(rng, weights_indigenous);
            self.infections.push(Infection::new(
                rng,
                now,
                genotype,
                InfectionOrigin::Indigenous,
                params,
            ));
        }
        for _ in 0..n_introduced {
            let genotype = genotypes.sample(rng, weights_introduced);
            self.infections.push(Infection::new(
                rng,
                now,
                genotype,
                InfectionOrigin::Introduced,
                params,
            ));
        }
        for _ in 0..n_imported {
            let genotype = genotypes.sample(rng, &[]);
            self.infections.push(Infection::new(
                rng,
                now,
                genotype,
                InfectionOrigin::Imported,
                params,
            ));
        }

        self.update_immune_status(params);
        let surv = SurvivalFactors {
            immunity: self.immunity_survival_factor(age_years, params),
            innate: self.innate_imm_surv_fact,
            bsv: bsv_factor,
            drug: drug_factor,
        };

        let treatment_liver = self.treat_expiry_liver > now;
        let treatment_blood = self.treat_expiry_blood > now;

        self.total_density = 0.0;
        self.hrp2_density = 0.0;
        self.timestep_max_density = 0.0;
        let cumulative_h = self.cumulative_h;
        let mut total = 0.0;
        let mut hrp2 = 0.0;
        let mut ts_max = 0.0;
        self.infections.retain_mut(|inf| {
            let covered = if inf.blood_stage(now, params) { treatment_blood } else { treatment_liver };
            if covered {
                return false;
            }
            let extinct = inf.update(rng, now, surv, cumulative_h, params, &mut ts_max);
            if extinct {
                return false;
            }
            total += inf.density();
            if !genotypes.is_hrp2_deficient(inf.genotype()) {
                hrp2 += inf.density();
            }
            true
        });
        self.total_density = total;
        self.hrp2_density = hrp2;
        self.timestep_max_density = ts_max;

        if !self.total_density.is_finite() {
            return Err(SimError::Numeric(format!(
                "total parasite density is not finite: {}",
                self.total_density
            )));
        }

        // Past densities only: new infections counted after the update.
        self.cumulative_h += (n_indigenous + n_introduced + n_imported) as f64;
        self.cumulative_y_lag = self.cumulative_y;
        self.cumulative_y += self.total_density * params.step_days as f64;

        // Record this step's densities in the infectiousness lag ring.
        let slot = (now.in_days() / params.step_days).rem_euclid(params.y_lag_len as i32) as usize;
        let base = slot * params.n_genotypes;
        for g in 0..params.n_genotypes {
            self.y_lag_local[base + g] = 0.0;
            self.y_lag_imported[base + g] = 0.0;
        }
        for inf in &self.infections {
            let idx = base + inf.genotype();
            if inf.origin() == InfectionOrigin::Imported {
                self.y_lag_imported[idx] += inf.density();
            } else {
                self.y_lag_local[idx] += inf.density();
            }
        }
        Ok(())
    }

    /// Decay of the immunity effectors, applied once per step.
    fn update_immune_status(&mut self, params: &WithinHostParams) {
        if params.imm_effector_remain < 1.0 {
            self.cumulative_h *= params.imm_effector_remain;
            self.cumulative_y *= params.imm_effector_remain;
        }
        if params.asex_imm_remain < 1.0 {
            self.cumulative_h *= params.asex_imm_remain
                / (1.0
                    + self.cumulative_h * (1.0 - params.asex_imm_remain)
                        * params.inv_cumulative_h_star);
            self.cumulative_y *= params.asex_imm_remain
                / (1.0
                    + self.cumulative_y * (1.0 - params.asex_imm_remain)
                        * params.inv_cumulative_y_star);
        }
    }

    /// Proportion of parasites surviving acquired immunity this step.
    fn immunity_survival_factor(&self, age_years: f64, params: &WithinHostParams) -> f64 {
        let x = self.cumulative_h * params.inv_cumulative_h_star
            + self.cumulative_y_lag * params.inv_cumulative_y_star
            + params.alpha_m * (-age_years / params.decay_m).exp();
        (-x).exp()
    }

    /// Probability this host infects a biting mosquito, with the weights of
    /// the transmitted parasites per genotype and transmission-chain
    /// stratum (see `ORIGIN_STRATA`). Uses the densities from 10, 15 and
    /// 20 days ago; the TBV factor multiplies the result.
    pub fn prob_transmission_to_mosquito(
        &self,
        now: SimTime,
        tbv_factor: f64,
        params: &WithinHostParams,
    ) -> (f64, Vec<f64>) {
        let step_index = now.in_days() / params.step_days;
        let mut x = 0.0;
        let mut weights = vec![0.0; params.n_genotypes * ORIGIN_STRATA];
        for (lag_days, beta) in LAG_DAYS.iter().zip(LAG_WEIGHTS) {
            let lag_steps = lag_days / params.step_days;
            let slot =
                (step_index - lag_steps).rem_euclid(params.y_lag_len as i32) as usize;
            let base = slot * params.n_genotypes;
            for g in 0..params.n_genotypes {
                let local = self.y_lag_local[base + g];
                let imported = self.y_lag_imported[base + g];
                x += beta * (local + imported);
                weights[g * ORIGIN_STRATA] += beta * local;
                weights[g * ORIGIN_STRATA + 1] += beta * imported;
            }
        }
        if x < 0.001 {
            return (0.0, weights);
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        }
        let z = (x.ln() - TRANSMIT_MU) / TRANSMIT_SIGMA;
        let p = TRANSMIT_MAX * normal_cdf(z) * tbv_factor;
        (p.clamp(0.0, 1.0), weights)
    }

    /// Apply a simple treatment: optionally clear liver/blood stages now and
    /// protect those stages for the given number of days.
    pub fn treat_simple(
        &mut self,
        now: SimTime,
        params: &WithinHostParams,
        clear_liver: bool,
        clear_blood: bool,
        liver_days: i32,
        blood_days: i32,
    ) {
        if clear_liver || clear_blood {
            let latent_p = params.latent_p;
            self.infections.retain(|inf| {
                let blood = inf.age(now) >= latent_p;
                !(blood && clear_blood || !blood && clear_liver)
            });
            if clear_blood {
                self.total_density = 0.0;
                self.hrp2_density = 0.0;
            }
        }
        if liver_days > 0 {
            self.treat_expiry_liver =
                self.treat_expiry_liver.max(now + SimTime::from_days(liver_days));
        }
        if blood_days > 0 {
            self.treat_expiry_blood =
                self.treat_expiry_blood.max(now + SimTime::from_days(blood_days));
        }
    }

    /// Zero all immunity accumulators, including per-infection exposure.
    pub fn clear_immunity(&mut self) {
        for inf in &mut self.infections {
            inf.clear_immunity();
        }
        self.cumulative_h = 0.0;
        self.cumulative_y_lag = 0.0;
    }

    /// Aggregate origin of the host's infection burden: indigenous if any
    /// infection is, else introduced if any is, else imported. Hosts
    /// without infections default to indigenous.
    pub fn infection_origin(&self) -> InfectionOrigin {
        let mut any_introduced = false;
        let mut any_imported = false;
        for inf in &self.infections {
            match inf.origin() {
                InfectionOrigin::Indigenous => return InfectionOrigin::Indigenous,
                InfectionOrigin::Introduced => any_introduced = true,
                InfectionOrigin::Imported => any_imported = true,
            }
        }
        if any_introduced {
            InfectionOrigin::Introduced
        } else if any_imported {
            InfectionOrigin::Imported
        } else {
            InfectionOrigin::Indigenous
        }
    }

    /// Map current densities to a clinical state.
    pub fn determine_morbidity(
        &mut self,
        rng: &mut LocalRng,
        age_years: f64,
        params: &WithinHostParams,
    ) -> StatePair {
        self.pathogenesis.determine_state(
            rng,
            age_years,
            self.timestep_max_density,
            self.total_density,
            &params.pathogenesis,
        )
    }

    /// Report survey statistics for this host, including the breakdowns by
    /// transmission-chain origin. Returns whether the host is patent under
    /// the monitoring diagnostic.
    pub fn summarize(
        &self,
        mon: &mut Monitoring,
        ctx: HostReportCtx,
        diagnostic: &Diagnostic,
        genotypes: &Genotypes,
    ) -> bool {
        let origin = self.infection_origin();
        if !self.infections.is_empty() {
            mon.report_host(Measure::InfectedHosts, ctx, 1.0);
            let host_measure = match origin {
                InfectionOrigin::Indigenous => Measure::InfectedHostsIndigenous,
                InfectionOrigin::Introduced => Measure::InfectedHostsIntroduced,
                InfectionOrigin::Imported => Measure::InfectedHostsImported,
            };
            mon.report_host(host_measure, ctx, 1.0);

            let mut counts = [0usize; 3];
            let mut patent = [0usize; 3];
            for inf in &self.infections {
                let o = inf.origin() as usize;
                counts[o] += 1;
                let hrp2 = if genotypes.is_hrp2_deficient(inf.genotype()) {
                    0.0
                } else {
                    inf.density()
                };
                if diagnostic.is_positive(inf.density(), hrp2) {
                    patent[o] += 1;
                }
            }
            mon.report_host(Measure::Infections, ctx, self.infections.len() as f64);
            let by_origin = [
                (counts[0], Measure::InfectionsIndigenous),
                (counts[1], Measure::InfectionsIntroduced),
                (counts[2], Measure::InfectionsImported),
            ];
            for (n, measure) in by_origin {
                if n > 0 {
                    mon.report_host(measure, ctx, n as f64);
                }
            }
            let patent_total = patent.iter().sum::<usize>();
            if patent_total > 0 {
                mon.report_host(Measure::PatentInfections, ctx, patent_total as f64);
            }
            let patent_by_origin = [
                (patent[0], Measure::PatentInfectionsIndigenous),
                (patent[1], Measure::PatentInfectionsIntroduced),
                (patent[2], Measure::PatentInfectionsImported),
            ];
            for (n, measure) in patent_by_origin {
                if n > 0 {
                    mon.report_host(measure, ctx, n as f64);
                }
            }
        }
        // Some treatments clear infections immediately, so the infection
        // list may be empty while the last computed density is positive.
        if diagnostic.is_positive(self.total_density, self.hrp2_density) {
            mon.report_host(Measure::PatentHosts, ctx, 1.0);
            let patent_measure = match origin {
                InfectionOrigin::Indigenous => Measure::PatentHostsIndigenous,
                InfectionOrigin::Introduced => Measure::PatentHostsIntroduced,
                InfectionOrigin::Imported => Measure::PatentHostsImported,
            };
            mon.report_host(patent_measure, ctx, 1.0);
            if self.total_density > 1e-10 {
                mon.report_host(Measure::SumLogDensity, ctx, self.total_density.ln());
            }
            return true;
        }
        false
    }
}

fn normal_cdf(z: f64) -> f64 {
    use statrs::distribution::{ContinuousCDF, Normal};
    Normal::new(0.0, 1.0).expect("unit normal").cdf(z)
}

impl Checkpoint for WithinHostModel {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.infections.write_ckpt(w)?;
        self.pathogenesis.write_ckpt(w)?;
        self.innate_imm_surv_fact.write_ckpt(w)?;
        self.cumulative_h.write_ckpt(w)?;
        self.cumulative_y.write_ckpt(w)?;
        self.cumulative_y_lag.write_ckpt(w)?;
        self.total_density.write_ckpt(w)?;
        self.hrp2_density.write_ckpt(w)?;
        self.timestep_max_density.write_ckpt(w)?;
        self.y_lag_local.write_ckpt(w)?;
        self.y_lag_imported.write_ckpt(w)?;
        self.treat_expiry_liver.write_ckpt(w)?;
        self.treat_expiry_blood.write_ckpt(w)
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.infections.read_ckpt(r)?;
        self.pathogenesis.read_ckpt(r)?;
        self.innate_imm_surv_fact.read_ckpt(r)?;
        self.cumulative_h.read_ckpt(r)?;
        self.cumulative_y.read_ckpt(r)?;
        self.cumulative_y_lag.read_ckpt(r)?;
        self.total_density.read_ckpt(r)?;
        self.hrp2_density.read_ckpt(r)?;
        self.timestep_max_density.read_ckpt(r)?;
        self.y_lag_local.read_ckpt(r)?;
        self.y_lag_imported.read_ckpt(r)?;
        self.treat_expiry_liver.read_ckpt(r)?;
        self.treat_expiry_blood.read_ckpt(r)
    }
}

#[cfg(test)]
pub(crate) fn test_params(variant: WithinHostVariant, seed: u64) -> WithinHostParams {
    let _ = seed;
    let mut scenario_params = malsim_data::Parameters::reference();
    scenario_params = scenario_params.with_overrides(&[]).unwrap();
    let mut scenario = crate::test_support::minimal_scenario();
    scenario.within_host.variant = variant;
    scenario.simulation.step_days = match variant {
        WithinHostVariant::Descriptive => 5,
        _ => 1,
    };
    WithinHostParams::from_scenario(&scenario, &scenario_params).unwrap()
}
