//! Intervention components and their per-host deployment records.
//!
//! All interventions share a common shape: the component (type-level
//! parameters, resolved from the scenario once) and per-host deployment
//! records holding the deployment date and the sampled per-host values.
//! Deployment itself (timed campaigns and age-based continuous schedules)
//! is driven by the population scheduler.

use std::io::{Read, Write};

use malsim_data::scenario::{ComponentDesc, MdaConfig, Scenario, VaccineKind};

use crate::error::{Result, SimError};
use crate::time::SimTime;
use crate::util::checkpoint::Checkpoint;
use crate::util::rng::LocalRng;

pub mod gvi;
pub mod irs;
pub mod itn;
pub mod vaccine;

pub use gvi::{GviComponent, HumanGvi};
pub use irs::{HumanIrs, IrsComponent};
pub use itn::{HumanItn, ItnComponent};
pub use vaccine::{PerHumanVaccine, VaccineComponent};

/// A registered intervention component.
#[derive(Debug)]
pub enum Component {
    Itn(ItnComponent),
    Irs(IrsComponent),
    Gvi(GviComponent),
    Vaccine(VaccineComponent),
    Mda(MdaConfig),
}

/// Sub-population removal triggers of a component.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemovalTriggers {
    pub on_first_bout: bool,
    pub on_first_treatment: bool,
    pub on_first_patent: bool,
}

/// The component registry, fixed after scenario load.
#[derive(Debug, Default)]
pub struct Components {
    names: Vec<String>,
    components: Vec<Component>,
    removal: Vec<RemovalTriggers>,
    /// Component index per vaccine type, where configured.
    vaccine_of_kind: [Option<usize>; vaccine::NUM_VACCINE_TYPES],
}

impl Components {
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        let species_order: Vec<String> =
            scenario.species.iter().map(|s| s.name.clone()).collect();
        let mut registry = Self::default();
        for cfg in &scenario.interventions.components {
            let component = match &cfg.desc {
                ComponentDesc::Itn(c) => Component::Itn(ItnComponent::from_config(c, &species_order)?),
                ComponentDesc::Irs(c) => Component::Irs(IrsComponent::from_config(c, &species_order)?),
                ComponentDesc::Gvi(c) => Component::Gvi(GviComponent::from_config(c, &species_order)?),
                ComponentDesc::Vaccine(c) => {
                    let vc = VaccineComponent::from_config(c)?;
                    let slot = vaccine::kind_index(vc.kind);
                    if registry.vaccine_of_kind[slot].is_some() {
                        return Err(SimError::scenario(format!(
                            "duplicate vaccine component of kind {:?}",
                            vc.kind
                        )));
                    }
                    registry.vaccine_of_kind[slot] = Some(registry.components.len());
                    Component::Vaccine(vc)
                }
                ComponentDesc::Mda(c) => Component::Mda(c.clone()),
            };
            registry.names.push(cfg.name.clone());
            registry.components.push(component);
            registry.removal.push(RemovalTriggers {
                on_first_bout: cfg.remove_on_first_bout,
                on_first_treatment: cfg.remove_on_first_treatment,
                on_first_patent: cfg.remove_on_first_patent,
            });
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, id: usize) -> &Component {
        &self.components[id]
    }

    pub fn removal(&self, id: usize) -> RemovalTriggers {
        self.removal[id]
    }

    pub fn id_by_name(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| SimError::scenario(format!("unknown intervention component {name}")))
    }

    pub fn vaccine_component(&self, kind: VaccineKind) -> Option<&VaccineComponent> {
        self.vaccine_of_kind[vaccine::kind_index(kind)].map(|id| match &self.components[id] {
            Component::Vaccine(v) => v,
            _ => unreachable!("vaccine index points at a vaccine"),
        })
    }
}

/// Per-host state of one deployed vector intervention.
#[derive(Debug, Clone)]
pub enum HumanIntervention {
    Itn(HumanItn),
    Irs(HumanIrs),
    Gvi(HumanGvi),
}

/// One deployment record of a vector intervention on a host. A redeploy of
/// the same component replaces the record.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub component: usize,
    pub data: HumanIntervention,
}

impl Default for Deployment {
    fn default() -> Self {
        Self { component: 0, data: HumanIntervention::Gvi(HumanGvi::default()) }
    }
}

impl Checkpoint for Deployment {
    fn write_ckpt(&self, w: &mut dyn Write) -> Result<()> {
        self.component.write_ckpt(w)?;
        match &self.data {
            HumanIntervention::Itn(d) => {
                0u8.write_ckpt(w)?;
                d.write_ckpt(w)
            }
            HumanIntervention::Irs(d) => {
                1u8.write_ckpt(w)?;
                d.write_ckpt(w)
            }
            HumanIntervention::Gvi(d) => {
                2u8.write_ckpt(w)?;
                d.write_ckpt(w)
            }
        }
    }
    fn read_ckpt(&mut self, r: &mut dyn Read) -> Result<()> {
        self.component.read_ckpt(r)?;
        let mut tag = 0u8;
        tag.read_ckpt(r)?;
        self.data = match tag {
            0 => {
                let mut d = HumanItn::default();
                d.read_ckpt(r)?;
                HumanIntervention::Itn(d)
            }
            1 => {
                let mut d = HumanIrs::default();
                d.read_ckpt(r)?;
                HumanIntervention::Irs(d)
            }
            2 => {
                let mut d = HumanGvi::default();
                d.read_ckpt(r)?;
                HumanIntervention::Gvi(d)
            }
            other => {
                return Err(SimError::checkpoint(format!("unknown deployment tag {other}")))
            }
        };
        Ok(())
    }
}

impl Deployment {
    /// Create the per-host record for a component deployment.
    pub fn create(
        rng: &mut LocalRng,
        component: usize,
        params: &Component,
        now: SimTime,
        step_days: i32,
    ) -> Option<Self> {
        let data = match params {
            Component::Itn(c) => HumanIntervention::Itn(HumanItn::deploy(rng, c, now, step_days)),
            Component::Irs(c) => HumanIntervention::Irs(HumanIrs::deploy(rng, c, now)),
            Component::Gvi(c) => HumanIntervention::Gvi(HumanGvi::deploy(rng, c, now)),
            // Vaccines and MDA keep no vector-side deployment record.
            Component::Vaccine(_) | Component::Mda(_) => return None,
        };
        Some(Self { component, data })
    }

    /// Per-step state update. Returns false when the deployment is spent
    /// (e.g. net disposed of) and should be removed.
    pub fn update(&mut self, rng: &mut LocalRng, params: &Component, now: SimTime) -> Result<bool> {
        match (&mut self.data, params) {
            (HumanIntervention::Itn(net), Component::Itn(c)) => net.update(rng, c, now),
            _ => Ok(true),
        }
    }

    /// Multiplier on host availability for the given species.
    pub fn relative_attractiveness(&self, params: &Component, species: usize, now: SimTime) -> f64 {
        match (&self.data, params) {
            (HumanIntervention::Itn(d), Component::Itn(c)) => {
                d.relative_attractiveness(c, species, now)
            }
            (HumanIntervention::Irs(d), Component::Irs(c)) => {
                d.relative_attractiveness(c, species, now)
            }
            (HumanIntervention::Gvi(d), Component::Gvi(c)) => {
                d.relative_attractiveness(c, species, now)
            }
            _ => 1.0,
        }
    }

    /// Mosquito survival multiplier before feeding.
    pub fn pre_prandial_survival(&self, params: &Component, species: usize, now: SimTime) -> f64 {
        match (&self.data, params) {
            (HumanIntervention::Itn(d), Component::Itn(c)) => {
                d.pre_prandial_survival(c, species, now)
            }
            (HumanIntervention::Irs(d), Component::Irs(c)) => {
                d.pre_prandial_survival(c, species, now)
            }
            (HumanIntervention::Gvi(d), Component::Gvi(c)) => {
                d.pre_prandial_survival(c, species, now)
            }
            _ => 1.0,
        }
    }

    /// Mosquito survival multiplier after feeding.
    pub fn post_prandial_survival(&self, params: &Component, species: usize, now: SimTime) -> f64 {
        match (&self.data, params) {
            (HumanIntervention::Itn(d), Component::Itn(c)) => {
                d.post_prandial_survival(c, species, now)
            }
            (HumanIntervention::Irs(d), Component::Irs(c)) => {
                d.post_prandial_survival(c, species, now)
            }
            (HumanIntervention::Gvi(d), Component::Gvi(c)) => {
                d.post_prandial_survival(c, species, now)
            }
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{itn_component_config, minimal_scenario};

    #[test]
    fn test_registry_resolves_names() {
        let mut scenario = minimal_scenario();
        scenario.interventions.components.push(itn_component_config("nets"));
        let components = Components::from_scenario(&scenario).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components.id_by_name("nets").unwrap(), 0);
        assert!(components.id_by_name("spray").is_err());
    }

    #[test]
    fn test_itn_deployment_round_trip() {
        let mut scenario = minimal_scenario();
        scenario.interventions.components.push(itn_component_config("nets"));
        let components = Components::from_scenario(&scenario).unwrap();
        let mut rng = LocalRng::master(1);
        let deployment =
            Deployment::create(&mut rng, 0, components.get(0), SimTime::zero(), 5).unwrap();
        let mut buf = Vec::new();
        deployment.write_ckpt(&mut buf).unwrap();
        let mut restored = Deployment::default();
        restored.read_ckpt(&mut &buf[..]).unwrap();
        assert_eq!(restored.component, 0);
        let a = deployment.relative_attractiveness(components.get(0), 0, SimTime::zero());
        let b = restored.relative_attractiveness(components.get(0), 0, SimTime::zero());
        assert_eq!(a, b);
    }
}
