//! Stable survey-measure codes.
//!
//! Counters emitted by the engine are identified by these integer codes in
//! the monitoring output. Don't ever change the numbers: they are used in
//! results files and downstream databases.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Measure {
    /// Number of hosts in the age group at survey time
    Hosts = 0,
    /// Number of infected hosts
    InfectedHosts = 1,
    /// Expected number of infected hosts (sum of per-host probabilities)
    ExpectedInfected = 2,
    /// Number of patent hosts (under the monitoring diagnostic)
    PatentHosts = 3,
    /// Sum of the log of parasite density over patent hosts
    SumLogDensity = 5,
    /// Total number of infections
    Infections = 6,
    /// Total number of patent infections
    PatentInfections = 8,
    /// First-line treatments
    Treatments1 = 11,
    /// Second-line treatments
    Treatments2 = 12,
    /// Inpatient treatments
    Treatments3 = 13,
    /// Uncomplicated malaria episodes
    UncomplicatedEpisodes = 14,
    /// Severe malaria episodes
    SevereEpisodes = 15,
    /// Episodes with sequelae
    Sequelae = 16,
    /// Deaths in hospital
    HospitalDeaths = 17,
    /// Indirect malaria deaths
    IndirectDeaths = 18,
    /// Direct malaria deaths
    DirectDeaths = 19,
    /// Vaccine doses given via age-based (EPI) deployment
    EpiVaccinations = 20,
    /// All-cause infant mortality rate (deaths per 1000 births)
    AllCauseImr = 21,
    /// Vaccine doses given via mass campaigns
    MassVaccinations = 22,
    /// Recoveries in hospital
    HospitalRecoveries = 23,
    /// Sequelae in hospital
    HospitalSequelae = 24,
    /// Non-malaria fever episodes
    NonMalariaFevers = 27,
    /// Inoculations per age group over the reporting period
    Inoculations = 30,
    /// Mosquito emergence rate (per species, point-time)
    VectorNv0 = 31,
    /// Host-seeking mosquito population (per species, point-time)
    VectorNv = 32,
    /// Infected host-seeking mosquitoes (per species, point-time)
    VectorOv = 33,
    /// Infectious host-seeking mosquitoes (per species, point-time)
    VectorSv = 34,
    /// Input (target) EIR over the survey period
    InputEir = 35,
    /// Simulated EIR over the survey period
    SimulatedEir = 36,
    /// New infections over the survey period
    NewInfections = 43,
    /// ITNs delivered via mass campaigns
    MassItns = 44,
    /// ITNs delivered via age-based deployment
    EpiItns = 45,
    /// IRS deployments via mass campaigns
    MassIrs = 46,
    /// Mass drug administrations
    MassDrugAdministrations = 52,
    /// GVI deployments via mass campaigns
    MassGvi = 58,
    /// Infected hosts with all infections imported
    InfectedHostsImported = 60,
    /// New infections arising from importation
    ImportedInfections = 61,
    /// Infected hosts carrying an indigenous transmission chain
    InfectedHostsIndigenous = 62,
    /// Infected hosts whose infections trace back to imported cases
    InfectedHostsIntroduced = 63,
    /// New locally-transmitted infections from indigenous chains
    NewInfectionsIndigenous = 64,
    /// New locally-transmitted infections traced to imported cases
    NewInfectionsIntroduced = 65,
    /// Patent hosts by transmission-chain origin
    PatentHostsIndigenous = 66,
    PatentHostsIntroduced = 67,
    PatentHostsImported = 68,
    /// Infection counts by origin
    InfectionsIndigenous = 69,
    InfectionsIntroduced = 70,
    InfectionsImported = 71,
    /// Patent infection counts by origin
    PatentInfectionsIndigenous = 72,
    PatentInfectionsIntroduced = 73,
    PatentInfectionsImported = 74,
    /// Uncomplicated episodes attributed to an introduced chain
    UncomplicatedEpisodesIntroduced = 75,
}

impl Measure {
    pub fn code(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Measure::Hosts.code(), 0);
        assert_eq!(Measure::HospitalRecoveries.code(), 23);
        assert_eq!(Measure::VectorSv.code(), 34);
        assert_eq!(Measure::NewInfections.code(), 43);
        assert_eq!(Measure::InfectedHostsIntroduced.code(), 63);
        assert_eq!(Measure::UncomplicatedEpisodesIntroduced.code(), 75);
    }
}
