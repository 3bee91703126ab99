//! Error taxonomy for the simulation engine.
//!
//! The engine is strict: no error is silently recovered. Each error kind
//! maps to a stable process exit code so that batch infrastructure can
//! categorise failures; codes start at 64 and never exceed 113.

use thiserror::Error;

/// Main error type for simulation operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Inconsistent or out-of-range scenario input.
    #[error("scenario error: {0}")]
    Scenario(String),

    /// Checkpoint header mismatch, oversized collection or short read.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The effective EIR seen by a host is not finite (bad scenario input).
    #[error("effective EIR is not finite: {0}")]
    EffectiveEir(f64),

    /// The expected number of new infections is not a number.
    #[error("expected number of new infections is NaN")]
    NumNewInfections,

    /// A Poisson rate was non-finite; sampling would not terminate.
    #[error("Poisson rate is not finite")]
    InfLambda,

    /// Human infectiousness was zero when calibrating transmission.
    #[error("initial kappa is zero; transmission cannot be calibrated")]
    InitialKappa,

    /// Emergence calibration failed to converge within the iteration cap.
    #[error("vector warmup did not converge after {0} iterations")]
    VectorWarmup(usize),

    /// The larval-resource fitter failed.
    #[error("larval resource fitting failed: {0}")]
    VectorFitting(String),

    /// A numerical routine produced an invalid result.
    #[error("numerical error: {0}")]
    Numeric(String),

    /// Underlying file I/O failure.
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),
}

impl SimError {
    /// Creates a scenario error from anything displayable.
    #[must_use]
    pub fn scenario<S: ToString>(msg: S) -> Self {
        Self::Scenario(msg.to_string())
    }

    /// Creates a checkpoint error.
    #[must_use]
    pub fn checkpoint<S: ToString>(msg: S) -> Self {
        Self::Checkpoint(msg.to_string())
    }

    /// Stable process exit code for this error kind.
    ///
    /// 0 means success and 64 is the default failure; the remaining codes
    /// categorise errors without diagnosing them.
    pub fn exit_code(&self) -> i32 {
        match self {
            SimError::Checkpoint(_) => 67,
            SimError::Scenario(_) => 68,
            SimError::EffectiveEir(_) => 70,
            SimError::NumNewInfections => 71,
            SimError::InitialKappa => 72,
            SimError::VectorWarmup(_) => 73,
            SimError::Numeric(_) => 75,
            SimError::VectorFitting(_) => 76,
            SimError::FileIo(_) => 77,
            SimError::InfLambda => 79,
        }
    }
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_in_range() {
        let errors = [
            SimError::scenario("x"),
            SimError::checkpoint("x"),
            SimError::EffectiveEir(f64::NAN),
            SimError::NumNewInfections,
            SimError::InfLambda,
            SimError::InitialKappa,
            SimError::VectorWarmup(10),
            SimError::VectorFitting("no convergence".into()),
            SimError::Numeric("overflow".into()),
        ];
        for e in &errors {
            let code = e.exit_code();
            assert!((64..=113).contains(&code), "{e}: code {code}");
        }
    }

    #[test]
    fn test_stable_codes() {
        assert_eq!(SimError::checkpoint("x").exit_code(), 67);
        assert_eq!(SimError::scenario("x").exit_code(), 68);
        assert_eq!(SimError::Numeric("gsl".into()).exit_code(), 75);
        assert_eq!(
            SimError::FileIo(std::io::Error::new(std::io::ErrorKind::Other, "x")).exit_code(),
            77
        );
    }
}
