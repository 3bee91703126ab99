//! # Malsim Core
//!
//! The simulation engine of malsim: an individual-based stochastic model of
//! *P. falciparum* transmission between a human population and one or more
//! *Anopheles* populations.
//!
//! The engine couples three sub-models on a common (1- or 5-day) step:
//! - **Vector transmission**: a delay-difference model of host-seeking,
//!   infected and infectious mosquitoes per species, with forced-Fourier or
//!   density-dependent emergence.
//! - **Within-host dynamics**: per-infection parasite-density trajectories
//!   (descriptive, empirical or Molineaux variant-switching), immunity
//!   accumulators and treatment.
//! - **Clinical outcomes**: pathogenesis from densities to episodes, and
//!   case management through the immediate-outcomes or event-scheduler
//!   health system.
//!
//! The `Population` scheduler binds the three across the pre-init, init and
//! main phases. All model selection happens once at scenario load; per-step
//! calls are monomorphic. Runs are deterministic: one RNG stream per host,
//! derived from the master seed and the stable host id.

/// Clinical status and case management
pub mod clinical;
/// Error taxonomy and process exit codes
pub mod error;
/// Parasite genotype registry
pub mod genotypes;
/// The human host aggregate
pub mod host;
/// Imported-infection timelines
pub mod imported;
/// From effective EIR to new infections
pub mod incidence;
/// Intervention components and deployment records
pub mod interventions;
/// Survey counter sink
pub mod monitoring;
/// Density-to-illness models
pub mod pathogenesis;
/// The population and step scheduler
pub mod population;
/// Simulation time and phases
pub mod time;
/// Vector (mosquito) transmission
pub mod transmission;
/// RNG, samplers, decay functions, checkpoint contract
pub mod util;
/// Within-host parasite dynamics
pub mod withinhost;

pub use error::{Result, SimError};
pub use population::Population;
pub use time::{Phase, SimTime};

#[cfg(test)]
pub(crate) mod test_support;
