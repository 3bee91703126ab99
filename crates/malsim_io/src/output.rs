//! Survey output.
//!
//! The monitoring sink serialises to a tab-separated file: one row per
//! (survey period, age group or species, measure code, value). Row order
//! is deterministic, so two runs with the same scenario and seed produce
//! byte-identical files; `diff` compares a run against a reference for the
//! deterministic-playback debugging mode.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use malsim_core::monitoring::Monitoring;

use crate::error::Result;

/// Render the survey rows as the tab-separated output text.
pub fn render(monitoring: &Monitoring) -> String {
    let mut out = String::new();
    for (survey, group, measure, value) in monitoring.rows() {
        // Integral counters print without a fractional part.
        if value.fract() == 0.0 && value.abs() < 1e15 {
            out.push_str(&format!("{survey}\t{group}\t{measure}\t{value:.0}\n"));
        } else {
            out.push_str(&format!("{survey}\t{group}\t{measure}\t{value}\n"));
        }
    }
    out
}

/// Write the survey output file.
pub fn write(monitoring: &Monitoring, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(render(monitoring).as_bytes())?;
    w.flush()?;
    tracing::info!(path = %path.display(), "survey output written");
    Ok(())
}

/// Compare an output text against a reference; returns the first
/// differing line, if any.
pub fn diff(actual: &str, reference: &str) -> Option<(usize, String, String)> {
    for (i, (a, b)) in actual.lines().zip(reference.lines()).enumerate() {
        if a != b {
            return Some((i + 1, a.to_string(), b.to_string()));
        }
    }
    let (na, nb) = (actual.lines().count(), reference.lines().count());
    if na != nb {
        return Some((na.min(nb) + 1, format!("{na} lines"), format!("{nb} lines")));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_detects_mismatch() {
        let a = "1\t1\t14\t3\n1\t2\t14\t5\n";
        let b = "1\t1\t14\t3\n1\t2\t14\t6\n";
        let (line, left, right) = diff(a, b).unwrap();
        assert_eq!(line, 2);
        assert!(left.ends_with('5'));
        assert!(right.ends_with('6'));
        assert!(diff(a, a).is_none());
    }

    #[test]
    fn test_diff_detects_length_mismatch() {
        let a = "1\t1\t14\t3\n";
        let b = "1\t1\t14\t3\n1\t2\t14\t6\n";
        assert!(diff(a, b).is_some());
    }
}
