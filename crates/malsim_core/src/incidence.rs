//! Infection incidence: from effective EIR to new infections.
//!
//! The expected number of infections saturates at high exposure and is
//! reduced by acquired pre-erythrocytic immunity (driven by cumulative
//! EIR). Negative-binomial and log-normal mass-action variants replace the
//! saturation with heterogeneous infection rates. Realised counts are
//! Poisson draws clamped to the within-host infection bound.

use malsim_data::scenario::IncidenceVariant;
use malsim_data::Parameter;

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::monitoring::{HostReportCtx, Monitoring};
use crate::util::rng::LocalRng;
use crate::withinhost::MAX_INFECTIONS;

// Variance constraint constant for the heterogeneous mass-action variants,
// chosen so the equivalent log-normal r-square is 0.5.
const R_SQUARE_GAMMA: f64 = 0.649;

#[derive(Debug, Clone)]
pub struct IncidenceParams {
    variant: IncidenceVariant,
    sinf: f64,
    simm: f64,
    estar_inv: f64,
    xstar_p_inv: f64,
    gamma_p: f64,
    baseline_avail_shape: f64,
    inf_rate_shape: f64,
    inf_rate_offset: f64,
    step_days: f64,
}

impl IncidenceParams {
    pub fn new(
        variant: IncidenceVariant,
        step_days: i32,
        params: &malsim_data::Parameters,
    ) -> Result<Self> {
        let get = |p: Parameter| -> Result<f64> {
            params
                .get(p)
                .ok_or_else(|| SimError::scenario(format!("missing model parameter {:?}", p)))
        };
        let baseline_avail_shape = get(Parameter::BaselineAvailabilityShape)?;
        let mut inf_rate_shape = 0.0;
        let mut inf_rate_offset = 0.0;
        match variant {
            IncidenceVariant::NegativeBinomial => {
                inf_rate_shape = ((baseline_avail_shape + 1.0)
                    / (R_SQUARE_GAMMA * baseline_avail_shape - 1.0))
                    .max(0.0);
            }
            IncidenceVariant::LogNormal => {
                let r_square_log_normal = (1.0 + R_SQUARE_GAMMA).ln();
                let shape_sq = r_square_log_normal - 1.86 * baseline_avail_shape.powi(2);
                if shape_sq.is_nan() {
                    return Err(SimError::scenario("bad BASELINE_AVAILABILITY_SHAPE parameter"));
                }
                inf_rate_shape = shape_sq.max(0.0).sqrt();
                inf_rate_offset = 0.5 * inf_rate_shape.powi(2);
            }
            IncidenceVariant::Base | IncidenceVariant::Heterogeneity => {}
        }
        Ok(Self {
            variant,
            sinf: 1.0 - (-get(Parameter::NegLogOneMinusSinf)?).exp(),
            simm: get(Parameter::Simm)?,
            estar_inv: 1.0 / get(Parameter::EStar)?,
            xstar_p_inv: 1.0 / get(Parameter::XStarP)?,
            gamma_p: get(Parameter::GammaP)?,
            baseline_avail_shape,
            inf_rate_shape,
            inf_rate_offset,
            step_days: step_days as f64,
        })
    }

    /// Per-host availability multiplier drawn at birth (heterogeneous
    /// mass-action variants only).
    pub fn availability_factor(&self, rng: &mut LocalRng, base: f64) -> f64 {
        match self.variant {
            IncidenceVariant::NegativeBinomial => {
                rng.gamma(self.baseline_avail_shape, base / self.baseline_avail_shape)
            }
            IncidenceVariant::LogNormal => rng.log_normal(
                base.ln() - 0.5 * self.baseline_avail_shape.powi(2),
                self.baseline_avail_shape,
            ),
            _ => base,
        }
    }
}

/// Per-host incidence state.
#[derive(Debug, Clone, Default)]
pub struct InfectionIncidence {
    /// Probability the host became infected, tracked for reporting.
    p_infected: f64,
    /// Cumulative EIR driving pre-erythrocytic immunity.
    cumulative_eir: f64,
}

impl_checkpoint!(InfectionIncidence: p_infected, cumulative_eir);

impl InfectionIncidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquired pre-erythrocytic susceptibility.
    fn susceptibility(&self, p: &IncidenceParams) -> f64 {
        p.simm
            + (1.0 - p.simm)
                / (1.0 + (self.cumulative_eir * p.xstar_p_inv).powf(p.gamma_p))
    }

    /// Expected number of infections given the effective EIR for this step.
    /// The PEV factor scales expectations without affecting cumulative EIR.
    pub fn expected_new_infections(
        &mut self,
        rng: &mut LocalRng,
        effective_eir: f64,
        rel_availability_het: f64,
        pev_factor: f64,
        p: &IncidenceParams,
    ) -> Result<f64> {
        if !effective_eir.is_finite() {
            return Err(SimError::EffectiveEir(effective_eir));
        }
        let susceptibility = self.susceptibility(p);
        let mut expected = match p.variant {
            IncidenceVariant::Base => {
                (p.sinf
                    + (1.0 - p.sinf)
                        / (1.0 + effective_eir / p.step_days * p.estar_inv))
                    * susceptibility
                    * effective_eir
            }
            IncidenceVariant::Heterogeneity => {
                (p.sinf
                    + (1.0 - p.sinf)
                        / (1.0
                            + effective_eir / (p.step_days * rel_availability_het)
                                * p.estar_inv))
                    * susceptibility
                    * effective_eir
            }
            IncidenceVariant::NegativeBinomial => rng.gamma(
                p.inf_rate_shape,
                effective_eir * susceptibility / p.inf_rate_shape,
            ),
            IncidenceVariant::LogNormal => rng.log_normal(
                (effective_eir * susceptibility).ln() - p.inf_rate_offset,
                p.inf_rate_shape,
            ),
        };
        expected *= pev_factor;

        self.cumulative_eir += effective_eir;
        self.p_infected = (1.0 - (-expected).exp() * (1.0 - self.p_infected)).clamp(0.0, 1.0);
        Ok(expected)
    }

    /// Realise the expectation as a Poisson count.
    pub fn num_new_infections(&self, rng: &mut LocalRng, expected: f64) -> Result<usize> {
        if expected.is_nan() {
            return Err(SimError::NumNewInfections);
        }
        if expected > 1e-7 {
            let n = rng.poisson(expected)? as usize;
            return Ok(n.min(MAX_INFECTIONS));
        }
        Ok(0)
    }

    pub fn summarize(&self, mon: &mut Monitoring, ctx: HostReportCtx) {
        mon.report_host(malsim_data::Measure::ExpectedInfected, ctx, self.p_infected);
    }
}
