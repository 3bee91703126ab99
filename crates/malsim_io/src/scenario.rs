//! Scenario file loading.

use std::path::Path;

use malsim_data::Scenario;

use crate::error::{IoError, Result};

/// Load and validate a scenario document from a TOML file.
pub fn load(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)?;
    Scenario::from_toml(&content).map_err(|e| IoError::scenario(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(matches!(err, IoError::FileSystem(_)));
    }

    #[test]
    fn test_invalid_toml_is_scenario_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "not = [valid").unwrap();
        let err = load(f.path()).unwrap_err();
        assert!(matches!(err, IoError::Scenario(_)));
    }
}
