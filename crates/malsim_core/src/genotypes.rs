//! The parasite genotype registry.
//!
//! A static catalogue of genotypes with initial frequencies, diagnostic
//! deficiency flags and sampling support. Set once during scenario load and
//! read-only for the duration of the run. Scenarios without an explicit
//! genotype table run with one wild-type genotype.

use malsim_data::scenario::GenotypeConfig;

use crate::error::{Result, SimError};
use crate::util::rng::LocalRng;

#[derive(Debug, Clone)]
pub struct Genotypes {
    initial_frequency: Vec<f64>,
    hrp2_deficient: Vec<bool>,
}

impl Genotypes {
    pub fn from_config(configs: &[GenotypeConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Ok(Self { initial_frequency: vec![1.0], hrp2_deficient: vec![false] });
        }
        let total: f64 = configs.iter().map(|g| g.initial_frequency).sum();
        if !(total > 0.0) {
            return Err(SimError::scenario("genotype frequencies must not all be zero"));
        }
        Ok(Self {
            initial_frequency: configs.iter().map(|g| g.initial_frequency / total).collect(),
            hrp2_deficient: configs.iter().map(|g| g.hrp2_deficient).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.initial_frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn initial_frequency(&self, genotype: usize) -> f64 {
        self.initial_frequency[genotype]
    }

    pub fn is_hrp2_deficient(&self, genotype: usize) -> bool {
        self.hrp2_deficient[genotype]
    }

    /// Sample a genotype with the supplied weights. A zero-length slice
    /// means "sample from the initial frequencies" (used for imported
    /// infections).
    pub fn sample(&self, rng: &mut LocalRng, weights: &[f64]) -> usize {
        let weights = if weights.is_empty() { &self.initial_frequency[..] } else { weights };
        debug_assert_eq!(weights.len(), self.len());
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            // Degenerate weights: every genotype equally likely.
            return rng.uniform_int(self.len());
        }
        let mut u = rng.uniform_01() * total;
        for (g, &w) in weights.iter().enumerate() {
            u -= w;
            if u < 0.0 {
                return g;
            }
        }
        self.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_single_genotype() {
        let g = Genotypes::from_config(&[]).unwrap();
        assert_eq!(g.len(), 1);
        assert!(!g.is_hrp2_deficient(0));
        let mut rng = LocalRng::master(1);
        assert_eq!(g.sample(&mut rng, &[]), 0);
    }

    #[test]
    fn test_frequencies_normalised() {
        let cfg = vec![
            GenotypeConfig { name: "wt".into(), initial_frequency: 3.0, hrp2_deficient: false },
            GenotypeConfig { name: "hrp2-".into(), initial_frequency: 1.0, hrp2_deficient: true },
        ];
        let g = Genotypes::from_config(&cfg).unwrap();
        assert!((g.initial_frequency(0) - 0.75).abs() < 1e-12);
        assert!(g.is_hrp2_deficient(1));
    }

    #[test]
    fn test_sampling_follows_weights() {
        let cfg = vec![
            GenotypeConfig { name: "a".into(), initial_frequency: 0.5, hrp2_deficient: false },
            GenotypeConfig { name: "b".into(), initial_frequency: 0.5, hrp2_deficient: false },
        ];
        let g = Genotypes::from_config(&cfg).unwrap();
        let mut rng = LocalRng::master(2);
        let n = 10_000;
        let weights = [0.9, 0.1];
        let ones = (0..n).filter(|_| g.sample(&mut rng, &weights) == 1).count();
        let frac = ones as f64 / n as f64;
        assert!((frac - 0.1).abs() < 0.02, "fraction {frac}");
    }

    #[test]
    fn test_zero_frequencies_rejected() {
        let cfg = vec![GenotypeConfig {
            name: "a".into(),
            initial_frequency: 0.0,
            hrp2_deficient: false,
        }];
        assert!(Genotypes::from_config(&cfg).is_err());
    }
}
