//! Monitoring: counter sink for survey output.
//!
//! The engine increments counters keyed by (survey period, age group or
//! species, measure); it never reads them back. Events occurring between
//! surveys accumulate into the upcoming survey period; point-time statistics
//! are recorded when a survey concludes. The sink serialises to rows of
//! (survey, group, measure code, value) elsewhere.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use malsim_data::scenario::Scenario;
use malsim_data::Measure;

use crate::error::Result;
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;

/// Reporting context of a host: its survey age group and cohort.
#[derive(Debug, Clone, Copy)]
pub struct HostReportCtx {
    pub age_group: u32,
    pub cohort: u32,
}

#[derive(Debug, Clone)]
pub struct Monitoring {
    /// Absolute survey times, ascending.
    survey_times: Vec<SimTime>,
    /// Upper bounds of the reporting age groups, years.
    age_bounds: Vec<f64>,
    /// Index of the upcoming survey.
    current_survey: usize,
    /// Counters only accumulate while recording (the main phase).
    recording: bool,
    /// (survey number, group, measure code) -> value. Group is the
    /// 1-based age group for host measures and the 1-based species index
    /// for vector measures.
    counts: BTreeMap<(u32, u32, u16), f64>,
}

impl Monitoring {
    pub fn new(scenario: &Scenario, main_start: SimTime) -> Self {
        let survey_times = scenario
            .monitoring
            .survey_times_years
            .iter()
            .map(|&y| main_start + SimTime::from_years(y))
            .collect();
        Self {
            survey_times,
            age_bounds: scenario.monitoring.age_group_upper_bounds.clone(),
            current_survey: 0,
            recording: true,
            counts: BTreeMap::new(),
        }
    }

    /// Pause or resume counter accumulation. The scheduler pauses
    /// recording until the main phase starts, so warmup events never leak
    /// into the first survey period.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// The survey age group of a host (0-based).
    pub fn age_group(&self, age_years: f64) -> u32 {
        for (i, &bound) in self.age_bounds.iter().enumerate() {
            if age_years < bound {
                return i as u32;
            }
        }
        self.age_bounds.len().saturating_sub(1) as u32
    }

    pub fn num_age_groups(&self) -> usize {
        self.age_bounds.len()
    }

    /// True when a survey is due at or before `now`.
    pub fn survey_due(&self, now: SimTime) -> bool {
        self.current_survey < self.survey_times.len()
            && now >= self.survey_times[self.current_survey]
    }

    /// Conclude the due survey; subsequent events accumulate into the next.
    pub fn conclude_survey(&mut self) {
        self.current_survey += 1;
    }

    pub fn surveys_remaining(&self) -> bool {
        self.current_survey < self.survey_times.len()
    }

    fn add(&mut self, group: u32, measure: Measure, value: f64) {
        if !self.recording || self.current_survey >= self.survey_times.len() {
            return;
        }
        let key = (self.current_survey as u32 + 1, group, measure.code());
        *self.counts.entry(key).or_insert(0.0) += value;
    }

    /// Increment a host-keyed counter (by age group).
    pub fn report_host(&mut self, measure: Measure, ctx: HostReportCtx, value: f64) {
        self.add(ctx.age_group + 1, measure, value);
    }

    /// Increment a species-keyed counter.
    pub fn report_species(&mut self, measure: Measure, species: usize, value: f64) {
        self.add(species as u32 + 1, measure, value);
    }

    /// Rows for the output writer: (survey, group, measure code, value).
    pub fn rows(&self) -> impl Iterator<Item = (u32, u32, u16, f64)> + '_ {
        self.counts.iter().map(|(&(survey, group, measure), &value)| {
            (survey, group, measure, value)
        })
    }
}

impl Checkpoint for Monitoring {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.current_survey.write_ckpt(w)?;
        self.recording.write_ckpt(w)?;
        (self.counts.len() as u64).write_ckpt(w)?;
        for (&(survey, group, measure), &value) in &self.counts {
            survey.write_ckpt(w)?;
            group.write_ckpt(w)?;
            (measure as u32).write_ckpt(w)?;
            value.write_ckpt(w)?;
        }
        Ok(())
    }

    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.current_survey.read_ckpt(r)?;
        self.recording.read_ckpt(r)?;
        let mut len = 0u64;
        len.read_ckpt(r)?;
        crate::util::checkpoint::validate_list_len(len)?;
        self.counts.clear();
        for _ in 0..len {
            let mut survey = 0u32;
            let mut group = 0u32;
            let mut measure = 0u32;
            let mut value = 0.0f64;
            survey.read_ckpt(r)?;
            group.read_ckpt(r)?;
            measure.read_ckpt(r)?;
            value.read_ckpt(r)?;
            self.counts.insert((survey, group, measure as u16), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::minimal_scenario;

    fn monitoring() -> Monitoring {
        Monitoring::new(&minimal_scenario(), SimTime::zero())
    }

    #[test]
    fn test_age_groups() {
        let mon = monitoring();
        // Bounds 1, 5, 15, 90.
        assert_eq!(mon.age_group(0.5), 0);
        assert_eq!(mon.age_group(3.0), 1);
        assert_eq!(mon.age_group(10.0), 2);
        assert_eq!(mon.age_group(40.0), 3);
        assert_eq!(mon.age_group(200.0), 3);
    }

    #[test]
    fn test_counters_accumulate() {
        let mut mon = monitoring();
        let ctx = HostReportCtx { age_group: 1, cohort: 0 };
        mon.report_host(Measure::UncomplicatedEpisodes, ctx, 1.0);
        mon.report_host(Measure::UncomplicatedEpisodes, ctx, 1.0);
        let rows: Vec<_> = mon.rows().collect();
        assert_eq!(rows, vec![(1, 2, Measure::UncomplicatedEpisodes.code(), 2.0)]);
    }

    #[test]
    fn test_reports_after_last_survey_dropped() {
        let mut mon = monitoring();
        mon.conclude_survey();
        assert!(!mon.surveys_remaining());
        mon.report_host(Measure::Hosts, HostReportCtx { age_group: 0, cohort: 0 }, 1.0);
        assert_eq!(mon.rows().count(), 0);
    }

    #[test]
    fn test_survey_due() {
        let mon = monitoring();
        // The minimal scenario surveys at year one of the main phase.
        assert!(!mon.survey_due(SimTime::from_days(300)));
        assert!(mon.survey_due(SimTime::from_years(1.0)));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let mut mon = monitoring();
        mon.report_species(Measure::VectorSv, 0, 123.5);
        mon.report_host(Measure::Hosts, HostReportCtx { age_group: 2, cohort: 0 }, 7.0);
        let mut buf = Vec::new();
        mon.write_ckpt(&mut buf).unwrap();
        let mut restored = monitoring();
        restored.read_ckpt(&mut &buf[..]).unwrap();
        assert_eq!(
            mon.rows().collect::<Vec<_>>(),
            restored.rows().collect::<Vec<_>>()
        );
    }
}
