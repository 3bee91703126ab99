//! The simple mosquito-population-dynamics emergence model, once its
//! larval resources are fitted, must hold the calibrated equilibrium: the
//! annual infectious-mosquito profile stays essentially unchanged from
//! year to year of the main phase.

mod common;

use malsim_core::time::Phase;
use malsim_core::Population;
use malsim_data::scenario::{EmergenceVariant, MpdConfig};
use malsim_data::Measure;

#[test]
fn test_mpd_holds_equilibrium() {
    let mut scenario = common::base_scenario();
    scenario.species[0].emergence = EmergenceVariant::SimpleMpd;
    scenario.species[0].mpd = Some(MpdConfig {
        development_duration_days: 11,
        prob_preadult_survival: 0.25,
        eggs_laid_by_oviposit: 20.0,
    });
    scenario.simulation.main_years = 5;
    scenario.monitoring.survey_times_years = vec![1.0, 2.0, 3.0, 4.0, 5.0];

    let mut population = Population::new(&scenario, None).unwrap();
    population.run().unwrap();
    assert_eq!(population.phase(), Phase::Main);

    let s_v_year1 = common::survey_total(&population.monitoring, 1, Measure::VectorSv);
    let s_v_year5 = common::survey_total(&population.monitoring, 5, Measure::VectorSv);
    assert!(s_v_year1 > 0.0, "transmission must persist under MPD emergence");
    let drift = (s_v_year5 - s_v_year1).abs() / s_v_year1;
    assert!(drift < 0.25, "S_v drifted {:.1}% between year 1 and 5", drift * 100.0);

    let n_v_year5 = common::survey_total(&population.monitoring, 5, Measure::VectorNv);
    assert!(n_v_year5 > 0.0);
}
