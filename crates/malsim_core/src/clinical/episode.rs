//! Clinical episode records.
//!
//! Clinical events within the health-system memory window belong to one
//! episode; an episode is reported to monitoring only once its window has
//! passed, with the union of everything that happened during it.

use serde::{Deserialize, Serialize};

use malsim_data::Measure;

use crate::impl_checkpoint;
use crate::monitoring::{HostReportCtx, Monitoring};
use crate::time::SimTime;
use crate::withinhost::InfectionOrigin;

/// Episode state bits.
pub mod state {
    pub const NONE: u32 = 0;
    pub const SICK: u32 = 1;
    pub const MALARIA: u32 = 2;
    pub const COMPLICATED: u32 = 1 << 2;
    pub const NMF: u32 = 1 << 3;
    pub const IN_HOSPITAL: u32 = 1 << 4;
    pub const DIRECT_DEATH: u32 = 1 << 5;
    pub const INDIRECT_DEATH: u32 = 1 << 6;
    pub const SEQUELAE: u32 = 1 << 7;
    pub const RECOVERY: u32 = 1 << 8;
    pub const FIRST_LINE: u32 = 1 << 9;
    pub const SECOND_LINE: u32 = 1 << 10;
    pub const INPATIENT_TREATMENT: u32 = 1 << 11;
}

/// The clinical-episode memory of one host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Episode {
    /// Start of the open episode; `never` when none is open.
    start: SimTime,
    open: bool,
    state_bits: u32,
    /// Age group at the start of the episode (reporting key).
    age_group: u32,
    /// Transmission-chain origin of the infection burden at episode start.
    origin: u8,
}

impl_checkpoint!(Episode: start, open, state_bits, age_group, origin);

impl Episode {
    pub fn new() -> Self {
        Self {
            start: SimTime::never(),
            open: false,
            state_bits: state::NONE,
            age_group: 0,
            origin: InfectionOrigin::Indigenous as u8,
        }
    }

    pub fn state_bits(&self) -> u32 {
        self.state_bits
    }

    /// Record a clinical event. Events within `memory` of the episode start
    /// merge into it; later events flush the previous episode first. The
    /// origin observed at the first event attributes the whole episode.
    pub fn update(
        &mut self,
        mon: &mut Monitoring,
        now: SimTime,
        memory: SimTime,
        age_group: u32,
        new_state: u32,
        origin: InfectionOrigin,
    ) {
        if self.open && now >= self.start + memory {
            self.flush(mon);
        }
        if new_state == state::NONE {
            return;
        }
        if self.open {
            self.state_bits |= new_state;
        } else {
            self.open = true;
            self.start = now;
            self.state_bits = new_state;
            self.age_group = age_group;
            self.origin = origin as u8;
        }
    }

    /// Report and clear the open episode, if any. Also called when the host
    /// dies or leaves the population.
    pub fn flush(&mut self, mon: &mut Monitoring) {
        if !self.open {
            return;
        }
        let bits = self.state_bits;
        let ctx = HostReportCtx { age_group: self.age_group, cohort: 0 };
        let has = |b: u32| bits & b != 0;

        if has(state::MALARIA) {
            if has(state::COMPLICATED) {
                mon.report_host(Measure::SevereEpisodes, ctx, 1.0);
            } else {
                mon.report_host(Measure::UncomplicatedEpisodes, ctx, 1.0);
                if self.origin == InfectionOrigin::Introduced as u8 {
                    mon.report_host(Measure::UncomplicatedEpisodesIntroduced, ctx, 1.0);
                }
            }
        } else if has(state::NMF) {
            mon.report_host(Measure::NonMalariaFevers, ctx, 1.0);
        }

        if has(state::FIRST_LINE) {
            mon.report_host(Measure::Treatments1, ctx, 1.0);
        }
        if has(state::SECOND_LINE) {
            mon.report_host(Measure::Treatments2, ctx, 1.0);
        }
        if has(state::INPATIENT_TREATMENT) {
            mon.report_host(Measure::Treatments3, ctx, 1.0);
        }

        if has(state::SEQUELAE) {
            mon.report_host(Measure::Sequelae, ctx, 1.0);
            if has(state::IN_HOSPITAL) {
                mon.report_host(Measure::HospitalSequelae, ctx, 1.0);
            }
        }
        if has(state::DIRECT_DEATH) {
            mon.report_host(Measure::DirectDeaths, ctx, 1.0);
            if has(state::IN_HOSPITAL) {
                mon.report_host(Measure::HospitalDeaths, ctx, 1.0);
            }
        } else if has(state::IN_HOSPITAL) && has(state::RECOVERY) {
            mon.report_host(Measure::HospitalRecoveries, ctx, 1.0);
        }
        if has(state::INDIRECT_DEATH) {
            mon.report_host(Measure::IndirectDeaths, ctx, 1.0);
        }

        self.open = false;
        self.state_bits = state::NONE;
        self.start = SimTime::never();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::minimal_scenario;

    fn mon() -> Monitoring {
        Monitoring::new(&minimal_scenario(), SimTime::zero())
    }

    fn count(mon: &Monitoring, measure: Measure) -> f64 {
        mon.rows().filter(|&(_, _, m, _)| m == measure.code()).map(|(_, _, _, v)| v).sum()
    }

    #[test]
    fn test_events_within_memory_merge() {
        let mut mon = mon();
        let mut ep = Episode::new();
        let memory = SimTime::from_days(20);
        ep.update(&mut mon, SimTime::from_days(0), memory, 1, state::SICK | state::MALARIA, InfectionOrigin::Indigenous);
        ep.update(&mut mon, SimTime::from_days(10), memory, 1, state::SICK | state::MALARIA, InfectionOrigin::Indigenous);
        ep.flush(&mut mon);
        assert_eq!(count(&mon, Measure::UncomplicatedEpisodes), 1.0);
    }

    #[test]
    fn test_introduced_episode_attributed() {
        let mut mon = mon();
        let mut ep = Episode::new();
        let memory = SimTime::from_days(20);
        ep.update(
            &mut mon,
            SimTime::zero(),
            memory,
            1,
            state::SICK | state::MALARIA,
            InfectionOrigin::Introduced,
        );
        ep.flush(&mut mon);
        assert_eq!(count(&mon, Measure::UncomplicatedEpisodes), 1.0);
        assert_eq!(count(&mon, Measure::UncomplicatedEpisodesIntroduced), 1.0);
    }

    #[test]
    fn test_later_event_starts_new_episode() {
        let mut mon = mon();
        let mut ep = Episode::new();
        let memory = SimTime::from_days(20);
        ep.update(&mut mon, SimTime::from_days(0), memory, 0, state::SICK | state::MALARIA, InfectionOrigin::Indigenous);
        ep.update(&mut mon, SimTime::from_days(40), memory, 0, state::SICK | state::MALARIA, InfectionOrigin::Indigenous);
        ep.flush(&mut mon);
        assert_eq!(count(&mon, Measure::UncomplicatedEpisodes), 2.0);
    }

    #[test]
    fn test_severe_episode_reported_once() {
        let mut mon = mon();
        let mut ep = Episode::new();
        let memory = SimTime::from_days(20);
        ep.update(&mut mon, SimTime::zero(), memory, 2, state::SICK | state::MALARIA, InfectionOrigin::Indigenous);
        ep.update(
            &mut mon,
            SimTime::from_days(5),
            memory,
            2,
            state::SICK | state::MALARIA | state::COMPLICATED | state::IN_HOSPITAL,
            InfectionOrigin::Indigenous,
        );
        ep.update(&mut mon, SimTime::from_days(10), memory, 2, state::RECOVERY, InfectionOrigin::Indigenous);
        ep.flush(&mut mon);
        assert_eq!(count(&mon, Measure::SevereEpisodes), 1.0);
        assert_eq!(count(&mon, Measure::UncomplicatedEpisodes), 0.0);
        assert_eq!(count(&mon, Measure::HospitalRecoveries), 1.0);
    }

    #[test]
    fn test_hospital_death_counted() {
        let mut mon = mon();
        let mut ep = Episode::new();
        let memory = SimTime::from_days(20);
        ep.update(
            &mut mon,
            SimTime::zero(),
            memory,
            0,
            state::SICK | state::MALARIA | state::COMPLICATED | state::IN_HOSPITAL
                | state::DIRECT_DEATH,
            InfectionOrigin::Indigenous,
        );
        ep.flush(&mut mon);
        assert_eq!(count(&mon, Measure::DirectDeaths), 1.0);
        assert_eq!(count(&mon, Measure::HospitalDeaths), 1.0);
        assert_eq!(count(&mon, Measure::HospitalRecoveries), 0.0);
    }
}
