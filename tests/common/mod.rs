//! Shared scenario builders for the integration tests.
#![allow(dead_code)] // each test binary uses its own subset

use malsim_data::scenario::*;
use malsim_data::{Measure, Parameters};

/// A small, fast scenario: one species, 5-day step, forced-Fourier
/// emergence, immediate-outcomes health system, no interventions.
pub fn base_scenario() -> Scenario {
    Scenario {
        name: "integration".into(),
        simulation: SimulationConfig {
            step_days: 5,
            master_seed: 42,
            population_size: 200,
            mean_host_age_years: 22.5,
            max_host_age_years: 90.0,
            vector_warmup_years: 2,
            human_warmup_years: 2,
            main_years: 2,
            max_init_iterations: 15,
            init_tolerance: 0.02,
        },
        parameters: Parameters::reference_entries(),
        within_host: WithinHostConfig::default(),
        pathogenesis: PathogenesisConfig::default(),
        incidence: IncidenceVariant::Base,
        diagnostic: DiagnosticConfig::default(),
        genotypes: Vec::new(),
        species: vec![SpeciesConfig {
            name: "gambiae".into(),
            annual_eir: 50.0,
            seasonality_fourier: vec![0.0, 0.3, 0.1],
            seasonality_rotate_days: 0.0,
            mosq_rest_duration_days: 3,
            extrinsic_incubation_days: 11,
            seeking_death_rate: 1.6,
            seeking_duration_days: 0.33,
            ento_availability: 0.0072,
            prob_biting: BetaValue { mean: 0.95, variance: 0.0 },
            prob_find_rest_site: BetaValue { mean: 0.95, variance: 0.0 },
            prob_resting: BetaValue { mean: 0.99, variance: 0.0 },
            prob_ovipositing: 0.88,
            availability_distr: "lognormal".into(),
            availability_cv: 0.0,
            min_infected_threshold: 0.001,
            prop_infected: 0.078,
            prop_infectious: 0.021,
            init_kappa: 0.03,
            emergence: EmergenceVariant::Fixed,
            mpd: None,
        }],
        availability_cv: 0.0,
        importation: Vec::new(),
        interventions: InterventionsConfig::default(),
        clinical: ClinicalConfig {
            health_system: HealthSystemConfig::Immediate(ImmediateOutcomesConfig {
                p_treatment: [0.6, 0.75, 0.48],
                p_parasites_cleared: [0.85, 0.9, 0.95],
                case_fatality: vec![
                    AgePoint { upper_age_years: 5.0, value: 0.09 },
                    AgePoint { upper_age_years: 90.0, value: 0.03 },
                ],
                p_sequelae_treated: [0.012, 0.005],
                p_sequelae_untreated: [0.012, 0.005],
            }),
            memory_steps: 4,
            indirect_death_delay_days: 30,
            treatment_seeking_cv: 0.0,
            comorbidity_cv: 0.0,
        },
        monitoring: MonitoringConfig {
            survey_times_years: vec![1.0, 2.0],
            age_group_upper_bounds: vec![1.0, 5.0, 15.0, 90.0],
        },
    }
}

/// The mass-ITN campaign used by the intervention tests: 80% coverage at
/// the start of the main phase, Weibull insecticide decay (L = 3 years,
/// k = 1.5).
pub fn add_itn_campaign(scenario: &mut Scenario) {
    scenario.interventions.components.push(ComponentConfig {
        name: "llin".into(),
        desc: ComponentDesc::Itn(ItnConfig {
            initial_insecticide: NormalValue { mean: 70.0, sd: 20.0 },
            max_insecticide: 100.0,
            hole_rate: SampledValue { mean: 1.8, cv: Some(0.8), ..SampledValue::point(0.0) },
            rip_rate: SampledValue { mean: 1.8, cv: Some(0.8), ..SampledValue::point(0.0) },
            rip_factor: 0.3,
            insecticide_decay: DecayFnDesc {
                function: "weibull".into(),
                l_years: Some(3.0),
                k: Some(1.5),
                cv: Some(0.2),
                initial_efficacy: 1.0,
                increasing: false,
                decay: Vec::new(),
            },
            attrition: DecayFnDesc {
                function: "smooth-compact".into(),
                l_years: Some(12.0),
                k: Some(2.0),
                cv: None,
                initial_efficacy: 1.0,
                increasing: false,
                decay: Vec::new(),
            },
            species: vec![ItnSpeciesConfig {
                species: "gambiae".into(),
                proportion_use: 1.0,
                deterrency: ItnEffect {
                    base_factor: 0.0,
                    hole_factor: 0.3,
                    insecticide_factor: -1.2,
                    interaction_factor: -0.3,
                    hole_scaling: 0.1,
                    insecticide_scaling: 0.1,
                },
                pre_prandial: ItnEffect {
                    base_factor: 0.09,
                    hole_factor: 0.57,
                    insecticide_factor: 0.3,
                    interaction_factor: -0.3,
                    hole_scaling: 0.1,
                    insecticide_scaling: 0.1,
                },
                post_prandial: ItnEffect {
                    base_factor: 0.1,
                    hole_factor: 0.4,
                    insecticide_factor: 0.4,
                    interaction_factor: -0.2,
                    hole_scaling: 0.1,
                    insecticide_scaling: 0.1,
                },
            }],
        }),
        remove_on_first_bout: false,
        remove_on_first_treatment: false,
        remove_on_first_patent: false,
    });
    scenario.interventions.timed.push(TimedDeploymentConfig {
        time_years: 0.0,
        components: vec!["llin".into()],
        coverage: 0.8,
        min_age_years: 0.0,
        max_age_years: 90.0,
        cumulative: false,
    });
}

/// Sum a measure over all groups for the given survey (1-based).
pub fn survey_total(
    mon: &malsim_core::monitoring::Monitoring,
    survey: u32,
    measure: Measure,
) -> f64 {
    mon.rows()
        .filter(|&(s, _, m, _)| s == survey && m == measure.code())
        .map(|(_, _, _, v)| v)
        .sum()
}

/// Sum a measure over all surveys and groups.
pub fn total(mon: &malsim_core::monitoring::Monitoring, measure: Measure) -> f64 {
    mon.rows().filter(|&(_, _, m, _)| m == measure.code()).map(|(_, _, _, v)| v).sum()
}
