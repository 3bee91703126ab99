//! # Malsim
//!
//! An individual-based stochastic simulator of *P. falciparum* malaria
//! epidemiology: a human population interacting with one or more
//! *Anopheles* mosquito populations, used to evaluate interventions (bed
//! nets, indoor residual spraying, vaccines, case management, mass drug
//! administration) against clinical outcomes over decades.
//!
//! This crate is the application shell: scenario loading, the run loop
//! with checkpointing, and output writing. The simulation engine lives in
//! `malsim_core`.

/// The run driver: scenario in, survey output out
pub mod app;
