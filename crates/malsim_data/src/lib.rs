//! # Malsim Data
//!
//! Plain data types shared across the malsim workspace: the parsed scenario
//! document, the indexed parameter table and the stable survey-measure codes.
//!
//! This crate contains no simulation logic. The simulation engine
//! (`malsim_core`) consumes these types read-only after scenario load.

/// Stable survey-measure codes for monitoring output
pub mod measures;
/// Indexed model-parameter table
pub mod parameters;
/// Scenario document: model selection, entomology, interventions, health system
pub mod scenario;

pub use measures::Measure;
pub use parameters::{Parameter, Parameters};
pub use scenario::Scenario;
