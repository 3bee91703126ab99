//! Piecewise-linear interpolation over age-indexed data tables.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::AgePoint;

use crate::error::{Result, SimError};

/// Interpolates values over ages. Each input point gives the value at the
/// midpoint of its age group; evaluation interpolates linearly between
/// midpoints and extends flat beyond the first and last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgeGroupInterpolator {
    /// (age midpoint, value), ascending by age; empty means "not set".
    points: Vec<(f64, f64)>,
}

impl AgeGroupInterpolator {
    pub fn from_points(table: &[AgePoint]) -> Result<Self> {
        let mut points = Vec::with_capacity(table.len());
        let mut lower = 0.0;
        for p in table {
            if p.upper_age_years <= lower {
                return Err(SimError::scenario("age group bounds must be ascending"));
            }
            points.push((0.5 * (lower + p.upper_age_years), p.value));
            lower = p.upper_age_years;
        }
        Ok(Self { points })
    }

    pub fn is_set(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn eval(&self, age_years: f64) -> f64 {
        assert!(self.is_set(), "age-interpolated table used before being set");
        let first = self.points[0];
        if age_years <= first.0 {
            return first.1;
        }
        for window in self.points.windows(2) {
            let (a0, v0) = window[0];
            let (a1, v1) = window[1];
            if age_years <= a1 {
                let t = (age_years - a0) / (a1 - a0);
                return v0 + t * (v1 - v0);
            }
        }
        self.points[self.points.len() - 1].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<AgePoint> {
        vec![
            AgePoint { upper_age_years: 2.0, value: 10.0 },
            AgePoint { upper_age_years: 10.0, value: 4.0 },
            AgePoint { upper_age_years: 90.0, value: 1.0 },
        ]
    }

    #[test]
    fn test_flat_extension() {
        let interp = AgeGroupInterpolator::from_points(&table()).unwrap();
        assert_eq!(interp.eval(0.0), 10.0);
        assert_eq!(interp.eval(80.0), 1.0);
    }

    #[test]
    fn test_linear_between_midpoints() {
        let interp = AgeGroupInterpolator::from_points(&table()).unwrap();
        // Midpoints are 1.0 and 6.0; halfway between them:
        let v = interp.eval(3.5);
        assert!((v - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_descending_bounds_rejected() {
        let bad = vec![
            AgePoint { upper_age_years: 5.0, value: 1.0 },
            AgePoint { upper_age_years: 2.0, value: 1.0 },
        ];
        assert!(AgeGroupInterpolator::from_points(&bad).is_err());
    }
}
