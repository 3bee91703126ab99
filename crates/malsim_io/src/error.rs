//! Error types for malsim_io.

use thiserror::Error;

/// Main error type for I/O operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File system errors
    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// Scenario file parsing or validation errors
    #[error("scenario error: {0}")]
    Scenario(String),

    /// Checkpoint stream errors
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Errors surfaced from the simulation engine
    #[error(transparent)]
    Sim(#[from] malsim_core::SimError),
}

/// Result type alias for malsim_io operations.
pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    /// Creates a new scenario error.
    #[must_use]
    pub fn scenario<S: Into<String>>(msg: S) -> Self {
        Self::Scenario(msg.into())
    }

    /// The stable process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            IoError::FileSystem(_) => 77,
            IoError::Scenario(_) => 68,
            IoError::Checkpoint(_) => 67,
            IoError::Sim(e) => e.exit_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(IoError::scenario("bad").exit_code(), 68);
        assert_eq!(IoError::Checkpoint("short".into()).exit_code(), 67);
        assert_eq!(IoError::Sim(malsim_core::SimError::InfLambda).exit_code(), 79);
    }
}
