//! Imported infections: a piecewise-constant timeline of case importation.
//!
//! Rates are given per 1000 hosts per year and realised as independent
//! per-host Poisson draws each step, so outcomes stay independent of host
//! iteration order.

use malsim_data::scenario::ImportationRate;

use crate::time::{SimTime, DAYS_PER_YEAR};

#[derive(Debug, Clone, Default)]
pub struct ImportedInfections {
    /// (start time, rate per host per day), ascending by time.
    timeline: Vec<(SimTime, f64)>,
}

impl ImportedInfections {
    pub fn from_config(rates: &[ImportationRate], main_start: SimTime) -> Self {
        let mut timeline: Vec<(SimTime, f64)> = rates
            .iter()
            .map(|r| {
                let start = main_start + SimTime::from_years(r.time_years);
                let per_host_day = r.per_thousand_per_year / 1000.0 / DAYS_PER_YEAR as f64;
                (start, per_host_day)
            })
            .collect();
        timeline.sort_by_key(|&(t, _)| t);
        Self { timeline }
    }

    /// Expected imported infections per host for a step starting at `now`.
    pub fn rate_per_host_step(&self, now: SimTime, step_days: i32) -> f64 {
        let mut rate = 0.0;
        for &(start, r) in &self.timeline {
            if start <= now {
                rate = r;
            } else {
                break;
            }
        }
        rate * step_days as f64
    }

    pub fn is_active(&self) -> bool {
        self.timeline.iter().any(|&(_, r)| r > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_timeline() {
        let rates = vec![
            ImportationRate { time_years: 0.0, per_thousand_per_year: 5.0 },
            ImportationRate { time_years: 2.0, per_thousand_per_year: 0.0 },
        ];
        let imp = ImportedInfections::from_config(&rates, SimTime::zero());
        let per_step = imp.rate_per_host_step(SimTime::from_years(1.0), 5);
        let expected = 5.0 / 1000.0 / 365.0 * 5.0;
        assert!((per_step - expected).abs() < 1e-15);
        // Before the first entry no importation happens.
        assert_eq!(imp.rate_per_host_step(SimTime::from_days(-10), 5), 0.0);
        // After year two the rate drops to zero.
        assert_eq!(imp.rate_per_host_step(SimTime::from_years(3.0), 5), 0.0);
    }

    #[test]
    fn test_empty_timeline_inactive() {
        let imp = ImportedInfections::from_config(&[], SimTime::zero());
        assert!(!imp.is_active());
        assert_eq!(imp.rate_per_host_step(SimTime::zero(), 1), 0.0);
    }
}
