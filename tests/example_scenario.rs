//! The shipped example scenario must load, validate and initialise.

use std::path::Path;

#[test]
fn test_example_scenario_loads_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/example.toml");
    let scenario = malsim_io::scenario::load(&path).unwrap();
    assert_eq!(scenario.name, "eir50-itn");
    assert_eq!(scenario.simulation.step_days, 5);
    assert_eq!(scenario.species.len(), 1);
    assert_eq!(scenario.interventions.components.len(), 1);
    assert_eq!(scenario.interventions.timed.len(), 1);

    // The population builds from it without touching the run loop.
    let population = malsim_core::Population::new(&scenario, None).unwrap();
    assert_eq!(population.num_hosts(), 10_000);
}
