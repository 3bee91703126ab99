//! Mosquito emergence models.
//!
//! Forced emergence expands an annual profile from log-scale Fourier
//! coefficients and replays it every year; the simple mosquito-population-
//! dynamics (MPD) variant adds density-dependent survival of larval cohorts
//! against fitted larval resources, so that adult-population perturbations
//! (e.g. from interventions) feed back into emergence. Larviciding scales
//! emergence multiplicatively for a limited window.

use std::f64::consts::TAU as TWO_PI;
use std::io::{Read, Write};

use crate::error::Result;
use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;

/// Expand log-scale Fourier coefficients [a0, a1, b1, a2, b2, ...] into a
/// 365-day profile, with a phase rotation in days.
pub fn expand_log_fourier(coeffs: &[f64], rotate_days: f64, out: &mut [f64]) {
    debug_assert_eq!(out.len(), 365);
    debug_assert!(coeffs.len() % 2 == 1);
    for (day, value) in out.iter_mut().enumerate() {
        let t = TWO_PI * (day as f64 + rotate_days) / 365.0;
        let mut sum = coeffs[0];
        for (j, pair) in coeffs[1..].chunks(2).enumerate() {
            let w = (j + 1) as f64 * t;
            sum += pair[0] * w.cos() + pair[1] * w.sin();
        }
        *value = sum.exp();
    }
}

#[derive(Debug, Clone)]
pub struct FixedEmergence {
    /// Annual emergence rate N_v0, animals per day, indexed by day of year.
    mosq_emerge_rate: Vec<f64>,
    /// Daily S_v over the last five years (for calibration).
    quinquennial_s_v: Vec<f64>,
    larviciding_factor: f64,
    larviciding_end: SimTime,
}

impl_checkpoint!(FixedEmergence: mosq_emerge_rate, quinquennial_s_v, larviciding_factor, larviciding_end);

impl FixedEmergence {
    pub fn from_rate(mosq_emerge_rate: Vec<f64>) -> Self {
        assert_eq!(mosq_emerge_rate.len(), 365);
        Self {
            mosq_emerge_rate,
            quinquennial_s_v: vec![0.0; 365 * 5],
            larviciding_factor: 1.0,
            larviciding_end: SimTime::never(),
        }
    }

    fn larviciding(&self, d: i32) -> f64 {
        if SimTime::from_days(d) < self.larviciding_end {
            self.larviciding_factor
        } else {
            1.0
        }
    }

    fn get(&self, d: i32, day_of_year: usize) -> f64 {
        self.mosq_emerge_rate[day_of_year] * self.larviciding(d)
    }

    fn record(&mut self, d: i32, s_v: f64) {
        self.quinquennial_s_v[d.rem_euclid(365 * 5) as usize] = s_v;
    }

    /// Annual sum of S_v over the most recent recorded year. Calibration
    /// compares one fully-rescaled year at a time; averaging further back
    /// would mix in pre-rescale state and destabilise the iteration.
    fn annual_s_v(&self, d: i32) -> f64 {
        (0..365)
            .map(|back| self.quinquennial_s_v[(d - back).rem_euclid(365 * 5) as usize])
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct SimpleMpdEmergence {
    fixed: FixedEmergence,
    /// Egg-to-emergence development duration, days.
    development_duration: i32,
    /// Survival from egg to emergence absent density dependence.
    prob_preadult_survival: f64,
    /// Female eggs laid per ovipositing adult.
    eggs_laid_by_oviposit: f64,
    /// 1 / K(day of year): zero disables density dependence, infinity
    /// forces zero emergence.
    inv_larval_resources: Vec<f64>,
    /// Ovipositing counts of the last `development_duration` days.
    n_ovipositing_delayed: Vec<f64>,
    /// Daily ovipositing over the last five years (for resource fitting).
    quinquennial_ovipositing: Vec<f64>,
    /// False until the resource fitter has run; before that the forced
    /// profile drives emergence.
    resources_fitted: bool,
}

impl Checkpoint for SimpleMpdEmergence {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.fixed.write_ckpt(w)?;
        self.inv_larval_resources.write_ckpt(w)?;
        self.n_ovipositing_delayed.write_ckpt(w)?;
        self.quinquennial_ovipositing.write_ckpt(w)?;
        self.resources_fitted.write_ckpt(w)
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.fixed.read_ckpt(r)?;
        self.inv_larval_resources.read_ckpt(r)?;
        self.n_ovipositing_delayed.read_ckpt(r)?;
        self.quinquennial_ovipositing.read_ckpt(r)?;
        self.resources_fitted.read_ckpt(r)
    }
}

impl SimpleMpdEmergence {
    pub fn new(
        mosq_emerge_rate: Vec<f64>,
        development_duration: i32,
        prob_preadult_survival: f64,
        eggs_laid_by_oviposit: f64,
    ) -> Self {
        Self {
            fixed: FixedEmergence::from_rate(mosq_emerge_rate),
            development_duration,
            prob_preadult_survival,
            eggs_laid_by_oviposit,
            inv_larval_resources: vec![0.0; 365],
            n_ovipositing_delayed: vec![0.0; development_duration as usize],
            quinquennial_ovipositing: vec![0.0; 365 * 5],
            resources_fitted: false,
        }
    }

    /// Density-dependent survival of the cohort laid `development_duration`
    /// days ago (Beverton-Holt form).
    pub fn cohort_emergence(&self, cohort_ovipositing: f64, day_of_year: usize) -> f64 {
        let eggs = self.eggs_laid_by_oviposit * cohort_ovipositing;
        let gamma = self.inv_larval_resources[day_of_year];
        if gamma.is_infinite() {
            return 0.0;
        }
        self.prob_preadult_survival * eggs / (1.0 + eggs * gamma)
    }

    fn get(&mut self, d: i32, day_of_year: usize, n_ovipositing: f64) -> f64 {
        let slot = d.rem_euclid(self.development_duration) as usize;
        let emergence = if self.resources_fitted {
            self.cohort_emergence(self.n_ovipositing_delayed[slot], day_of_year)
        } else {
            self.fixed.mosq_emerge_rate[day_of_year]
        };
        self.n_ovipositing_delayed[slot] = n_ovipositing;
        emergence * self.fixed.larviciding(d)
    }

    /// Mean ovipositing count for each day of year over the recorded years.
    pub fn mean_annual_ovipositing(&self, d: i32) -> Vec<f64> {
        let years = ((d + 1) / 365).clamp(1, 5);
        let mut out = vec![0.0; 365];
        for (day_of_year, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for y in 0..years {
                let day = d - (d.rem_euclid(365) - day_of_year as i32) - y * 365;
                sum += self.quinquennial_ovipositing[day.rem_euclid(365 * 5) as usize];
            }
            *value = sum / years as f64;
        }
        out
    }

    /// Solve the resources so that the density-dependent emergence would
    /// reproduce the fitted forced profile at the observed ovipositing
    /// levels: gamma_d = (p F O_d / E_d - 1) / (F O_d).
    pub fn fit_resources_from_observed(&mut self, d: i32) {
        let ovipositing = self.mean_annual_ovipositing(d);
        for day in 0..365 {
            let target = self.fixed.mosq_emerge_rate[day];
            let eggs = self.eggs_laid_by_oviposit * ovipositing[day];
            self.inv_larval_resources[day] = if target <= 0.0 {
                f64::INFINITY
            } else if eggs <= 0.0 {
                0.0
            } else {
                ((self.prob_preadult_survival * eggs / target - 1.0) / eggs).max(0.0)
            };
        }
        self.resources_fitted = true;
    }

    pub fn resources_fitted(&self) -> bool {
        self.resources_fitted
    }

    pub fn inv_larval_resources(&self) -> &[f64] {
        &self.inv_larval_resources
    }

    pub fn set_inv_larval_resources(&mut self, resources: Vec<f64>) {
        assert_eq!(resources.len(), 365);
        self.inv_larval_resources = resources;
        self.resources_fitted = true;
    }

    pub fn development_duration(&self) -> i32 {
        self.development_duration
    }

    pub fn eggs_laid_by_oviposit(&self) -> f64 {
        self.eggs_laid_by_oviposit
    }

    pub fn prob_preadult_survival(&self) -> f64 {
        self.prob_preadult_survival
    }
}

/// Emergence sub-model of one species.
#[derive(Debug, Clone)]
pub enum Emergence {
    Fixed(FixedEmergence),
    SimpleMpd(SimpleMpdEmergence),
}

impl Emergence {
    /// Emergence for day `d`, taking larviciding into account.
    /// `n_ovipositing` is today's count of adults completing oviposition,
    /// pushed into the delayed buffer of the MPD model.
    pub fn get(&mut self, d: i32, day_of_year: usize, n_ovipositing: f64) -> f64 {
        match self {
            Emergence::Fixed(fixed) => fixed.get(d, day_of_year),
            Emergence::SimpleMpd(mpd) => mpd.get(d, day_of_year, n_ovipositing),
        }
    }

    /// Record the day's outputs used during calibration.
    pub fn update_stats(&mut self, d: i32, s_v: f64, n_ovipositing: f64) {
        match self {
            Emergence::Fixed(fixed) => fixed.record(d, s_v),
            Emergence::SimpleMpd(mpd) => {
                mpd.fixed.record(d, s_v);
                mpd.quinquennial_ovipositing[d.rem_euclid(365 * 5) as usize] = n_ovipositing;
            }
        }
    }

    /// Scale the annual emergence profile (calibration).
    pub fn scale(&mut self, factor: f64) {
        let rate = match self {
            Emergence::Fixed(fixed) => &mut fixed.mosq_emerge_rate,
            Emergence::SimpleMpd(mpd) => &mut mpd.fixed.mosq_emerge_rate,
        };
        for v in rate.iter_mut() {
            *v *= factor;
        }
    }

    /// Replace the annual emergence profile (initialisation).
    pub fn set_emerge_rate(&mut self, rate: &[f64]) {
        assert_eq!(rate.len(), 365);
        let target = match self {
            Emergence::Fixed(fixed) => &mut fixed.mosq_emerge_rate,
            Emergence::SimpleMpd(mpd) => &mut mpd.fixed.mosq_emerge_rate,
        };
        target.copy_from_slice(rate);
    }

    pub fn emerge_rate(&self) -> &[f64] {
        match self {
            Emergence::Fixed(fixed) => &fixed.mosq_emerge_rate,
            Emergence::SimpleMpd(mpd) => &mpd.fixed.mosq_emerge_rate,
        }
    }

    /// Mean annual S_v over the recorded years ending at day `d`.
    pub fn annual_s_v(&self, d: i32) -> f64 {
        match self {
            Emergence::Fixed(fixed) => fixed.annual_s_v(d),
            Emergence::SimpleMpd(mpd) => mpd.fixed.annual_s_v(d),
        }
    }

    /// Start a larviciding intervention: emergence is multiplied by
    /// `1 - effectiveness` until `end`.
    pub fn start_larviciding(&mut self, effectiveness: f64, end: SimTime) {
        let fixed = match self {
            Emergence::Fixed(fixed) => fixed,
            Emergence::SimpleMpd(mpd) => &mut mpd.fixed,
        };
        fixed.larviciding_factor = 1.0 - effectiveness;
        fixed.larviciding_end = end;
    }
}

impl Checkpoint for Emergence {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        match self {
            Emergence::Fixed(fixed) => {
                0u8.write_ckpt(w)?;
                fixed.write_ckpt(w)
            }
            Emergence::SimpleMpd(mpd) => {
                1u8.write_ckpt(w)?;
                mpd.write_ckpt(w)
            }
        }
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        let mut tag = 0u8;
        tag.read_ckpt(r)?;
        match (tag, &mut *self) {
            (0, Emergence::Fixed(fixed)) => fixed.read_ckpt(r),
            (1, Emergence::SimpleMpd(mpd)) => mpd.read_ckpt(r),
            _ => Err(crate::error::SimError::checkpoint("emergence model mismatch")),
        }
    }
}
