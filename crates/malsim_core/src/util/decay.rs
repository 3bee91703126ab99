//! Decay functions: age in days → survival factor in [0, 1].
//!
//! Used by interventions (insecticide decay, net attrition, vaccine
//! efficacy). Each function carries per-host heterogeneity: a multiplicative
//! time-scale factor sampled once per deployment. The default heterogeneity
//! value is +∞, the convention for "never deployed", and every function
//! evaluates to 0 there.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::DecayFnDesc;

use crate::error::{Result, SimError};
use crate::time::DAYS_PER_YEAR;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;
use crate::util::sampler::LognormalSampler;

/// The per-host heterogeneity sample of a decay function: a multiplier
/// applied to the age before evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayFnHet {
    factor: f64,
}

impl DecayFnHet {
    pub fn factor(self) -> f64 {
        self.factor
    }

    pub fn from_factor(factor: f64) -> Self {
        Self { factor }
    }
}

impl Default for DecayFnHet {
    /// The "never deployed" value.
    fn default() -> Self {
        Self { factor: f64::INFINITY }
    }
}

impl Checkpoint for DecayFnHet {
    fn write_ckpt(&self, w: &mut dyn std::io::Write) -> Result<()> {
        self.factor.write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn std::io::Read) -> Result<()> {
        self.factor.read_ckpt(r)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Shape {
    Constant,
    Step { inv_l: f64 },
    Linear { inv_l: f64 },
    Exponential { inv_l: f64 },
    Weibull { const_over_lambda: f64, k: f64 },
    Hill { inv_l: f64, k: f64 },
    SmoothCompact { inv_l: f64, k: f64 },
    Plus(Box<DecayFunction>, Box<DecayFunction>),
    Minus(Box<DecayFunction>, Box<DecayFunction>),
    Multiplies(Box<DecayFunction>, Box<DecayFunction>),
    Divides(Box<DecayFunction>, Box<DecayFunction>),
}

impl Shape {
    /// Evaluate at the raw deployment age; leaf shapes apply the
    /// heterogeneity time-scale factor, operators forward it to children.
    fn compute(&self, raw_age: f64, het: DecayFnHet) -> f64 {
        let age = raw_age * het.factor;
        match self {
            Shape::Constant => 1.0,
            Shape::Step { inv_l } => {
                if age * inv_l < 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Shape::Linear { inv_l } => {
                if age * inv_l < 1.0 {
                    1.0 - age * inv_l
                } else {
                    0.0
                }
            }
            Shape::Exponential { inv_l } => (-age * inv_l).exp(),
            Shape::Weibull { const_over_lambda, k } => {
                let p = -(age * const_over_lambda).powf(*k);
                if p < -700.0 {
                    0.0
                } else {
                    p.exp()
                }
            }
            Shape::Hill { inv_l, k } => 1.0 / (1.0 + (age * inv_l).powf(*k)),
            Shape::SmoothCompact { inv_l, k } => {
                if age * inv_l < 1.0 {
                    (k - k / (1.0 - (age * inv_l).powi(2))).exp()
                } else {
                    0.0
                }
            }
            Shape::Plus(f1, f2) => f1.eval(raw_age, het) + f2.eval(raw_age, het),
            Shape::Minus(f1, f2) => f1.eval(raw_age, het) - f2.eval(raw_age, het),
            Shape::Multiplies(f1, f2) => f1.eval(raw_age, het) * f2.eval(raw_age, het),
            Shape::Divides(f1, f2) => f1.eval(raw_age, het) / f2.eval(raw_age, het),
        }
    }

    fn is_operator(&self) -> bool {
        matches!(
            self,
            Shape::Plus(..) | Shape::Minus(..) | Shape::Multiplies(..) | Shape::Divides(..)
        )
    }

    fn sample_decay_age(&self, rng: &mut LocalRng) -> f64 {
        match self {
            // Decay occurs "in the future".
            Shape::Constant => f64::INFINITY,
            Shape::Step { inv_l } => 1.0 / inv_l,
            Shape::Linear { inv_l } => rng.uniform_01() / inv_l,
            Shape::Exponential { inv_l } => -rng.uniform_01().ln() / inv_l,
            Shape::Weibull { const_over_lambda, k } => {
                (-rng.uniform_01().ln()).powf(1.0 / k) / const_over_lambda
            }
            Shape::Hill { inv_l, k } => (1.0 / rng.uniform_01() - 1.0).powf(1.0 / k) / inv_l,
            Shape::SmoothCompact { inv_l, k } => {
                (1.0 - k / (k - rng.uniform_01().ln())).sqrt() / inv_l
            }
            Shape::Plus(f1, f2)
            | Shape::Minus(f1, f2)
            | Shape::Multiplies(f1, f2)
            | Shape::Divides(f1, f2) => {
                f1.sample_decay_age(rng).max(f2.sample_decay_age(rng))
            }
        }
    }
}

/// A decay function with scaling, inversion and heterogeneity description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayFunction {
    shape: Shape,
    increasing: bool,
    initial_efficacy: f64,
    het: Option<LognormalSampler>,
}

impl DecayFunction {
    /// A constant function with full efficacy (survival 1 forever).
    pub fn constant() -> Self {
        Self { shape: Shape::Constant, increasing: false, initial_efficacy: 1.0, het: None }
    }

    pub fn from_config(desc: &DecayFnDesc) -> Result<Self> {
        let l_days = || -> Result<f64> {
            let l = desc
                .l_years
                .ok_or_else(|| SimError::scenario(format!("decay {}: L required", desc.function)))?;
            if l <= 0.0 {
                return Err(SimError::scenario("decay function: L must be positive"));
            }
            Ok(l * DAYS_PER_YEAR as f64)
        };
        let k = || -> Result<f64> {
            let k = desc
                .k
                .ok_or_else(|| SimError::scenario(format!("decay {}: k required", desc.function)))?;
            if k <= 0.0 {
                return Err(SimError::scenario("decay function: k must be positive"));
            }
            Ok(k)
        };
        let children = || -> Result<(Box<DecayFunction>, Box<DecayFunction>)> {
            if desc.decay.len() != 2 {
                return Err(SimError::scenario(format!(
                    "operator decay function expects two children, {} were given",
                    desc.decay.len()
                )));
            }
            Ok((
                Box::new(Self::from_config(&desc.decay[0])?),
                Box::new(Self::from_config(&desc.decay[1])?),
            ))
        };
        let shape = match desc.function.as_str() {
            "constant" => Shape::Constant,
            "step" => Shape::Step { inv_l: 1.0 / l_days()? },
            "linear" => Shape::Linear { inv_l: 1.0 / l_days()? },
            "exponential" => Shape::Exponential { inv_l: std::f64::consts::LN_2 / l_days()? },
            "weibull" => Shape::Weibull {
                const_over_lambda: std::f64::consts::LN_2.powf(1.0 / k()?) / l_days()?,
                k: k()?,
            },
            "hill" => Shape::Hill { inv_l: 1.0 / l_days()?, k: k()? },
            "smooth-compact" => Shape::SmoothCompact { inv_l: 1.0 / l_days()?, k: k()? },
            "plus" => {
                let (f1, f2) = children()?;
                Shape::Plus(f1, f2)
            }
            "minus" => {
                let (f1, f2) = children()?;
                Shape::Minus(f1, f2)
            }
            "multiplies" => {
                let (f1, f2) = children()?;
                Shape::Multiplies(f1, f2)
            }
            "divides" => {
                let (f1, f2) = children()?;
                Shape::Divides(f1, f2)
            }
            other => {
                return Err(SimError::scenario(format!("decay function type {other} unrecognized")))
            }
        };
        let het = match desc.cv {
            Some(cv) if cv > 0.0 => Some(LognormalSampler::from_mean_cv(1.0, cv, None)?),
            _ => None,
        };
        if !(0.0..=1.0).contains(&desc.initial_efficacy) {
            return Err(SimError::scenario("decay function: initial efficacy must be in [0, 1]"));
        }
        Ok(Self { shape, increasing: desc.increasing, initial_efficacy: desc.initial_efficacy, het })
    }

    /// Sample the per-host time-scale factor for one deployment.
    pub fn het_sample(&self, rng: &mut LocalRng) -> DecayFnHet {
        let factor = match &self.het {
            Some(sampler) => sampler.sample(rng),
            None => 1.0,
        };
        DecayFnHet { factor }
    }

    /// Evaluate at the given age, using the deployment's heterogeneity
    /// sample. Ages before deployment should be evaluated with the default
    /// (infinite) sample, which yields 0.
    pub fn eval(&self, age_days: f64, het: DecayFnHet) -> f64 {
        if !het.factor.is_finite() {
            return 0.0;
        }
        let value = self.shape.compute(age_days, het);
        let value = if self.shape.is_operator() { value.clamp(0.0, 1.0) } else { value };
        let value = if self.increasing { 1.0 - value } else { value };
        value * self.initial_efficacy
    }

    /// Sample the age at which the function decays, in days. Used for
    /// attrition-style decisions (e.g. net disposal).
    pub fn sample_decay_age(&self, rng: &mut LocalRng) -> f64 {
        let base = self.shape.sample_decay_age(rng);
        let het = self.het_sample(rng);
        base / het.factor
    }
}
