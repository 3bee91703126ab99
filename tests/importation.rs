//! With zero transmission and a fixed importation rate, the number of
//! imported infections over the run must be Poisson-consistent with
//! population size x rate x time.

mod common;

use malsim_core::Population;
use malsim_data::scenario::ImportationRate;
use malsim_data::Measure;

#[test]
fn test_importation_matches_expected_rate() {
    let mut scenario = common::base_scenario();
    // No local transmission at all.
    scenario.species[0].annual_eir = 0.0;
    scenario.simulation.population_size = 1000;
    scenario.simulation.main_years = 4;
    scenario.monitoring.survey_times_years = vec![1.0, 2.0, 3.0, 4.0];
    let rate_per_thousand = 50.0;
    scenario.importation = vec![ImportationRate {
        time_years: 0.0,
        per_thousand_per_year: rate_per_thousand,
    }];

    let mut population = Population::new(&scenario, None).unwrap();
    population.run().unwrap();

    let imported = common::total(&population.monitoring, Measure::ImportedInfections);
    let years = scenario.simulation.main_years as f64;
    let expected =
        scenario.simulation.population_size as f64 * rate_per_thousand / 1000.0 * years;
    // Poisson: 5 sigma around the mean.
    let sigma = expected.sqrt();
    assert!(
        (imported - expected).abs() < 5.0 * sigma,
        "imported {imported}, expected {expected} +/- {sigma}"
    );

    // Without importation and without transmission nothing is infected.
    let mut silent = common::base_scenario();
    silent.species[0].annual_eir = 0.0;
    let mut quiet = Population::new(&silent, None).unwrap();
    quiet.run().unwrap();
    assert_eq!(common::total(&quiet.monitoring, Measure::NewInfections), 0.0);
    assert_eq!(common::total(&quiet.monitoring, Measure::InfectedHosts), 0.0);
}
