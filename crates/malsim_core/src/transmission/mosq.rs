//! The delay-difference core of vector transmission.
//!
//! Per species and simulated day, circular buffers of length τ + θ_s hold
//! the daily probabilities (P_A, P_df, P_dif, P_dff) and mosquito
//! populations (N_v host-seeking, O_v infected, S_v infectious). The
//! infected and infectious populations are stratified: one slot per
//! parasite genotype and transmission-chain origin. Every buffer advances
//! by exactly one position per day. If the infectious population falls
//! below a threshold the species' transmission is clamped to zero until
//! re-seeded.

use std::io::{Read, Write};

use crate::error::Result;
use crate::transmission::emergence::Emergence;
use crate::util::checkpoint::Checkpoint;

/// Per-step vector statistics, reported as means over the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecStat {
    PA,
    PDf,
    PDif,
    Nv,
    Ov,
    Sv,
}

#[derive(Debug, Clone)]
pub struct MosqTransmission {
    /// Feeding/resting cycle duration τ, days.
    tau: i32,
    /// Extrinsic incubation period θ_s, days.
    eip: i32,
    /// Ring length: τ + θ_s.
    n_v_length: i32,
    n_strata: usize,
    /// Below this many infectious mosquitoes transmission is extinguished.
    min_infected_threshold: f64,

    // Ring buffers of length n_v_length (stratified ones store
    // day * n_strata + stratum).
    p_a: Vec<f64>,
    p_df: Vec<f64>,
    p_dff: Vec<f64>,
    p_dif: Vec<f64>,
    n_v: Vec<f64>,
    o_v: Vec<f64>,
    s_v: Vec<f64>,

    /// Working memory for the S_v inflow, refreshed in place each day:
    /// products of P_A terms over the incubation period (length
    /// θ_s - τ + 1), and the corresponding τ-lagged products (length θ_s).
    /// Recomputed from the P_A ring before use, so never checkpointed.
    f_array: Vec<f64>,
    ftau_array: Vec<f64>,

    /// Emergence total over the current step (for reporting).
    timestep_n_v0: f64,
    // Per-step sums of the reported statistics.
    stat_days: i32,
    sum_p_a: f64,
    sum_p_df: f64,
    sum_p_dif: f64,
    sum_n_v: f64,
    sum_o_v: f64,
    sum_s_v: f64,
}

impl MosqTransmission {
    pub fn new(tau: i32, eip: i32, n_strata: usize, min_infected_threshold: f64) -> Self {
        assert!(tau >= 1 && eip > tau);
        let n_v_length = tau + eip;
        let n = n_v_length as usize;
        Self {
            tau,
            eip,
            n_v_length,
            n_strata,
            min_infected_threshold,
            p_a: vec![0.0; n],
            p_df: vec![0.0; n],
            p_dff: vec![0.0; n],
            p_dif: vec![0.0; n * n_strata],
            n_v: vec![0.0; n],
            o_v: vec![0.0; n * n_strata],
            s_v: vec![0.0; n * n_strata],
            f_array: vec![0.0; (eip - tau + 1) as usize],
            ftau_array: vec![0.0; eip as usize],
            timestep_n_v0: 0.0,
            stat_days: 0,
            sum_p_a: 0.0,
            sum_p_df: 0.0,
            sum_p_dif: 0.0,
            sum_n_v: 0.0,
            sum_o_v: 0.0,
            sum_s_v: 0.0,
        }
    }

    pub fn tau(&self) -> i32 {
        self.tau
    }

    pub fn eip(&self) -> i32 {
        self.eip
    }

    fn idx(&self, d: i32) -> usize {
        d.rem_euclid(self.n_v_length) as usize
    }

    /// Seed the state buffers before the model is run: constant daily
    /// probabilities and populations derived from the forced S_v profile,
    /// with the infected populations spread over strata by `seed_weights`
    /// (must sum to one).
    #[allow(clippy::too_many_arguments)]
    pub fn init_state(
        &mut self,
        ts_p_a: f64,
        ts_p_df: f64,
        ts_p_dif: &[f64],
        ts_p_dff: f64,
        init_nv_from_sv: f64,
        init_ov_from_sv: f64,
        seed_weights: &[f64],
        forced_s_v: &[f64],
        start_day: i32,
    ) {
        debug_assert_eq!(forced_s_v.len(), 365);
        debug_assert_eq!(seed_weights.len(), self.n_strata);
        for i in 0..self.n_v_length {
            let day = start_day - self.n_v_length + i;
            let t = self.idx(day);
            let sv = forced_s_v[day.rem_euclid(365) as usize];
            self.p_a[t] = ts_p_a;
            self.p_df[t] = ts_p_df;
            self.p_dff[t] = ts_p_dff;
            self.n_v[t] = sv * init_nv_from_sv;
            for g in 0..self.n_strata {
                let gi = t * self.n_strata + g;
                self.p_dif[gi] = ts_p_dif[g];
                self.o_v[gi] = sv * init_ov_from_sv * seed_weights[g];
                self.s_v[gi] = sv * seed_weights[g];
            }
        }
    }

    /// Rescale the mosquito populations during emergence calibration.
    pub fn init_iterate_scale(&mut self, factor: f64) {
        for v in self.n_v.iter_mut().chain(&mut self.o_v).chain(&mut self.s_v) {
            *v *= factor;
        }
    }

    /// Zero the infected and infectious populations (used by interventions
    /// and the extinction clamp).
    pub fn uninfect_vectors(&mut self) {
        for v in self.o_v.iter_mut().chain(&mut self.s_v) {
            *v = 0.0;
        }
    }

    /// Advance one day. The same time-step inputs are used for every day of
    /// a step. Returns the day's total infectious population.
    pub fn update(
        &mut self,
        d: i32,
        ts_p_a: f64,
        ts_p_df: f64,
        ts_p_dif: &[f64],
        ts_p_dff: f64,
        is_dynamic: bool,
        emergence: &mut Emergence,
    ) -> f64 {
        debug_assert_eq!(ts_p_dif.len(), self.n_strata);
        let t = self.idx(d);
        let t1 = self.idx(d - 1);
        let ttau = self.idx(d - self.tau);
        let teip = self.idx(d - self.eip);

        self.p_a[t] = ts_p_a;
        self.p_df[t] = ts_p_df;
        self.p_dff[t] = ts_p_dff;
        for g in 0..self.n_strata {
            self.p_dif[t * self.n_strata + g] = ts_p_dif[g];
        }

        // Adults ovipositing today fed a full cycle ago; they drive the
        // emergence feedback.
        let n_ovipositing = self.p_dff[ttau] * self.n_v[ttau];
        let day_of_year = d.rem_euclid(365) as usize;
        let emerged = emergence.get(d, day_of_year, n_ovipositing);
        self.timestep_n_v0 += emerged;

        self.n_v[t] = emerged + self.p_a[t1] * self.n_v[t1] + self.p_df[ttau] * self.n_v[ttau];

        // Survival products over the incubation period, refreshed from the
        // P_A ring each day.
        self.f_array[0] = 1.0;
        for k in 1..self.f_array.len() {
            self.f_array[k] = self.f_array[k - 1] * self.p_a[self.idx(d - k as i32)];
        }
        self.ftau_array[0] = 1.0;
        for k in 1..self.ftau_array.len() {
            self.ftau_array[k] =
                self.ftau_array[k - 1] * self.p_a[self.idx(d - self.tau - k as i32)];
        }

        let mut total_s_v = 0.0;
        for g in 0..self.n_strata {
            let gt = t * self.n_strata + g;
            let gt1 = t1 * self.n_strata + g;
            let gttau = ttau * self.n_strata + g;
            self.o_v[gt] = self.p_dif[gttau] * self.n_v[ttau]
                + self.p_a[t1] * self.o_v[gt1]
                + self.p_df[ttau] * self.o_v[gttau];
            // Mosquitoes becoming infectious today were infected over the
            // days d - θ_s .. d - θ_s - τ + 1 and survived the incubation
            // period: continuously seeking for the most recent cohort,
            // with one extra resting cycle for the τ - 1 older cohorts.
            let mut inflow = self.f_array[(self.eip - self.tau) as usize]
                * self.p_dif[teip * self.n_strata + g]
                * self.n_v[teip];
            for l in 1..self.tau {
                let tl = self.idx(d - self.eip - l);
                inflow += self.ftau_array[(self.eip - self.tau + l) as usize]
                    * self.p_dif[tl * self.n_strata + g]
                    * self.n_v[tl];
            }
            self.s_v[gt] = inflow + self.p_a[t1] * self.s_v[gt1] + self.p_df[ttau] * self.s_v[gttau];
            total_s_v += self.s_v[gt];
        }

        // Extinction clamp: below the threshold the species transmits
        // nothing until re-seeded by importation.
        if is_dynamic && total_s_v < self.min_infected_threshold {
            for g in 0..self.n_strata {
                let gt = t * self.n_strata + g;
                self.s_v[gt] = 0.0;
                self.o_v[gt] = 0.0;
            }
            total_s_v = 0.0;
        }

        emergence.update_stats(d, total_s_v, n_ovipositing);

        self.stat_days += 1;
        self.sum_p_a += ts_p_a;
        self.sum_p_df += ts_p_df;
        self.sum_p_dif += ts_p_dif.iter().sum::<f64>();
        self.sum_n_v += self.n_v[t];
        self.sum_o_v += (0..self.n_strata)
            .map(|g| self.o_v[t * self.n_strata + g])
            .sum::<f64>();
        self.sum_s_v += total_s_v;
        total_s_v
    }

    /// Infectious population of stratum `g` on day `d`.
    pub fn s_v(&self, d: i32, g: usize) -> f64 {
        self.s_v[self.idx(d) * self.n_strata + g]
    }

    pub fn n_v(&self, d: i32) -> f64 {
        self.n_v[self.idx(d)]
    }

    pub fn o_v(&self, d: i32, g: usize) -> f64 {
        self.o_v[self.idx(d) * self.n_strata + g]
    }

    /// Reset the per-step statistics before a step's daily updates.
    pub fn reset_ts_stats(&mut self) {
        self.timestep_n_v0 = 0.0;
        self.stat_days = 0;
        self.sum_p_a = 0.0;
        self.sum_p_df = 0.0;
        self.sum_p_dif = 0.0;
        self.sum_n_v = 0.0;
        self.sum_o_v = 0.0;
        self.sum_s_v = 0.0;
    }

    /// Mean emergence per day over the last step.
    pub fn last_n_v0(&self) -> f64 {
        if self.stat_days == 0 {
            return 0.0;
        }
        self.timestep_n_v0 / self.stat_days as f64
    }

    /// Mean of a statistic over the last step's days.
    pub fn last_stat(&self, stat: VecStat) -> f64 {
        if self.stat_days == 0 {
            return 0.0;
        }
        let days = self.stat_days as f64;
        match stat {
            VecStat::PA => self.sum_p_a / days,
            VecStat::PDf => self.sum_p_df / days,
            VecStat::PDif => self.sum_p_dif / days,
            VecStat::Nv => self.sum_n_v / days,
            VecStat::Ov => self.sum_o_v / days,
            VecStat::Sv => self.sum_s_v / days,
        }
    }
}

impl Checkpoint for MosqTransmission {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.p_a.write_ckpt(w)?;
        self.p_df.write_ckpt(w)?;
        self.p_dff.write_ckpt(w)?;
        self.p_dif.write_ckpt(w)?;
        self.n_v.write_ckpt(w)?;
        self.o_v.write_ckpt(w)?;
        self.s_v.write_ckpt(w)?;
        self.timestep_n_v0.write_ckpt(w)
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.p_a.read_ckpt(r)?;
        self.p_df.read_ckpt(r)?;
        self.p_dff.read_ckpt(r)?;
        self.p_dif.read_ckpt(r)?;
        self.n_v.read_ckpt(r)?;
        self.o_v.read_ckpt(r)?;
        self.s_v.read_ckpt(r)?;
        self.timestep_n_v0.read_ckpt(r)
    }
}
