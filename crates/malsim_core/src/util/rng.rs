//! The simulation random-number generator and distribution wrappers.
//!
//! Each host owns a `LocalRng` stream derived from the master seed and the
//! host's stable id, so results are independent of host update order.
//! The generator must be portable across machines; its state is exposed for
//! checkpointing.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, Gamma, LogNormal, Normal, Poisson, Weibull};
use statrs::distribution::{ContinuousCDF, Normal as NormalDist};

use crate::error::{Result, SimError};

/// A seeded RNG stream with the distribution draws used by the models.
#[derive(Debug, Clone)]
pub struct LocalRng(ChaCha8Rng);

impl LocalRng {
    /// Master stream (stream id 0).
    pub fn master(seed: u64) -> Self {
        Self::seed(seed, 0)
    }

    /// Derive the stream for a given id from the master seed. Streams with
    /// distinct ids never overlap.
    pub fn seed(master_seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(master_seed);
        rng.set_stream(stream);
        Self(rng)
    }

    /// Uniform draw in [0, 1).
    pub fn uniform_01(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    /// Uniform integer in [0, n).
    pub fn uniform_int(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n)
    }

    /// True with probability `p`. `p` must be finite.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        debug_assert!(p.is_finite());
        self.uniform_01() < p
    }

    /// Normal draw with the given mean and standard deviation.
    pub fn gauss(&mut self, mean: f64, std: f64) -> f64 {
        if std <= 0.0 {
            return mean;
        }
        Normal::new(mean, std).expect("finite normal parameters").sample(&mut self.0)
    }

    /// Log-normal draw with log-space parameters.
    pub fn log_normal(&mut self, mean_log: f64, std_log: f64) -> f64 {
        if std_log <= 0.0 {
            return mean_log.exp();
        }
        LogNormal::new(mean_log, std_log)
            .expect("finite log-normal parameters")
            .sample(&mut self.0)
    }

    /// Gamma draw with shape `k` and scale `theta`.
    pub fn gamma(&mut self, k: f64, theta: f64) -> f64 {
        Gamma::new(k, theta).expect("valid gamma parameters").sample(&mut self.0)
    }

    /// Beta draw with parameters `a`, `b`.
    pub fn beta(&mut self, a: f64, b: f64) -> f64 {
        Beta::new(a, b).expect("valid beta parameters").sample(&mut self.0)
    }

    /// Beta draw parameterised by mean and the `b` parameter.
    pub fn beta_with_mean(&mut self, mean: f64, b: f64) -> f64 {
        let a = mean * b / (1.0 - mean);
        self.beta(a, b)
    }

    /// Weibull draw with scale λ and shape k.
    pub fn weibull(&mut self, lambda: f64, k: f64) -> f64 {
        Weibull::new(lambda, k).expect("valid weibull parameters").sample(&mut self.0)
    }

    /// Poisson draw. A non-finite rate is a fatal error (it would otherwise
    /// hang the sampler); negative or zero rates yield zero.
    pub fn poisson(&mut self, lambda: f64) -> Result<u64> {
        if !lambda.is_finite() {
            return Err(SimError::InfLambda);
        }
        if lambda <= 0.0 {
            return Ok(0);
        }
        let dist = Poisson::new(lambda).map_err(|e| SimError::Numeric(e.to_string()))?;
        Ok(dist.sample(&mut self.0) as u64)
    }

    /// max(start, X₁, …, Xₙ) for i.i.d. Xᵢ ~ lognormal(μ, σ), drawn with a
    /// single uniform sample:
    ///
    /// For Mₙ = max(X₁, .., Xₙ), F_Mₙ(x) = F_X(x)ⁿ, so with u = F_Mₙ(x),
    /// u^(1/n) = F_X(x) and the quantile transform gives one draw of Mₙ.
    pub fn max_multi_log_normal(&mut self, start: f64, n: i32, mean_log: f64, std_log: f64) -> f64 {
        debug_assert!(n >= 1);
        let norm_p = self.uniform_01().powf(1.0 / n as f64);
        let z = NormalDist::new(0.0, 1.0).expect("unit normal").inverse_cdf(norm_p);
        start.max((mean_log + std_log * z).exp())
    }

    /// Checkpointable generator state: (seed, stream, word position).
    pub fn state(&self) -> ([u8; 32], u64, u128) {
        (self.0.get_seed(), self.0.get_stream(), self.0.get_word_pos())
    }

    /// Restore a generator from checkpointed state.
    pub fn from_state(seed: [u8; 32], stream: u64, word_pos: u128) -> Self {
        let mut rng = ChaCha8Rng::from_seed(seed);
        rng.set_stream(stream);
        rng.set_word_pos(word_pos);
        Self(rng)
    }
}
