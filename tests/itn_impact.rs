//! A mass ITN campaign at the start of the main phase must cut the
//! entomological inoculation rate substantially in its first year.

mod common;

use malsim_core::Population;
use malsim_data::Measure;

#[test]
fn test_mass_itn_campaign_reduces_eir() {
    let baseline_scenario = common::base_scenario();
    let mut baseline = Population::new(&baseline_scenario, None).unwrap();
    baseline.run().unwrap();
    let eir_baseline = common::survey_total(&baseline.monitoring, 1, Measure::SimulatedEir);
    assert!(eir_baseline > 0.0);

    let mut itn_scenario = common::base_scenario();
    common::add_itn_campaign(&mut itn_scenario);
    let mut with_itn = Population::new(&itn_scenario, None).unwrap();
    with_itn.run().unwrap();

    // The campaign reached roughly 80% of the population.
    let nets = common::total(&with_itn.monitoring, Measure::MassItns);
    let pop = itn_scenario.simulation.population_size as f64;
    assert!(nets > 0.6 * pop && nets < 0.95 * pop, "nets deployed: {nets}");

    // Year-one EIR drops well below baseline.
    let eir_itn = common::survey_total(&with_itn.monitoring, 1, Measure::SimulatedEir);
    let reduction = 1.0 - eir_itn / eir_baseline;
    assert!(
        reduction > 0.2,
        "EIR reduction {reduction:.2} (baseline {eir_baseline:.2}, ITN {eir_itn:.2})"
    );
}
