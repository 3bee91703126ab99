//! Shared builders for unit tests.

use malsim_data::scenario::*;

/// A small validating scenario: one species, 5-day step, immediate
/// outcomes, no interventions.
pub fn minimal_scenario() -> Scenario {
    Scenario {
        name: "test".into(),
        simulation: SimulationConfig {
            step_days: 5,
            master_seed: 1,
            population_size: 100,
            mean_host_age_years: 22.5,
            max_host_age_years: 90.0,
            vector_warmup_years: 5,
            human_warmup_years: 2,
            main_years: 1,
            max_init_iterations: 10,
            init_tolerance: 0.01,
        },
        parameters: Vec::new(),
        within_host: WithinHostConfig::default(),
        pathogenesis: PathogenesisConfig::default(),
        incidence: IncidenceVariant::Base,
        diagnostic: DiagnosticConfig::default(),
        genotypes: Vec::new(),
        species: vec![SpeciesConfig {
            name: "gambiae".into(),
            annual_eir: 20.0,
            seasonality_fourier: vec![0.0],
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
        monitoring: MonitoringConfig::default(),
    }
}

/// A 1-day-step scenario using the empirical within-host model and the
/// event-scheduler health system, with always-treating decision trees.
pub fn event_scheduler_scenario() -> Scenario {
    let mut scenario = minimal_scenario();
    scenario.simulation.step_days = 1;
    scenario.within_host.variant = WithinHostVariant::Empirical;
    // A clinical episode spans its whole bout on the 1-day step.
    scenario.clinical.memory_steps = 28;
    scenario.clinical.health_system = HealthSystemConfig::EventScheduler(EventSchedulerConfig {
        uncomplicated_case_days: 6,
        complicated_case_days: 9,
        extra_days_at_risk: -1,
        p_seek_uc_daily: vec![0.8, 1.0],
        uncomplicated_tree: DecisionNode::TreatSimple { liver_days: 30, blood_days: 30 },
        complicated_tree: DecisionNode::Refer {
            tree: Box::new(DecisionNode::Treat { schedule: 0, dosage: 0, delay_days: 0 }),
        },
        drug_schedules: vec![DrugScheduleConfig {
            name: "act".into(),
            p_clearance: 0.95,
            prophylaxis_days: 20,
        }],
        ab_logistic: [-1.0, 0.0, 0.5, 1.5, 0.0],
        one_minus_efficacy_ab: 0.2,
        severe_nmf_mortality: vec![AgePoint { upper_age_years: 90.0, value: 0.05 }],
        p_need_antibiotic: vec![AgePoint { upper_age_years: 90.0, value: 0.1 }],
    });
    scenario
}

pub fn itn_config() -> ItnConfig {
    ItnConfig {
        initial_insecticide: NormalValue { mean: 70.0, sd: 20.0 },
        max_insecticide: 100.0,
        hole_rate: SampledValue { mean: 1.8, cv: Some(0.8), ..SampledValue::point(1.8) },
        rip_rate: SampledValue { mean: 1.8, cv: Some(0.8), ..SampledValue::point(1.8) },
        rip_factor: 0.3,
        insecticide_decay: DecayFnDesc {
            function: "exponential".into(),
            l_years: Some(1.5),
            k: None,
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
                insecticide_factor: -1.0,
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
    }
}

pub fn irs_config() -> IrsConfig {
    IrsConfig {
        initial_insecticide: NormalValue { mean: 118.0, sd: 30.0 },
        max_insecticide: 1000.0,
        insecticide_decay: DecayFnDesc {
            function: "exponential".into(),
            l_years: Some(0.5),
            k: None,
            cv: None,
            initial_efficacy: 1.0,
            increasing: false,
            decay: Vec::new(),
        },
        species: vec![IrsSpeciesConfig {
            species: "gambiae".into(),
            deterrency: IrsEffect {
                base_factor: 0.0,
                insecticide_factor: -0.5,
                insecticide_scaling: 0.02,
            },
            pre_prandial: IrsEffect {
                base_factor: 0.0,
                insecticide_factor: 0.3,
                insecticide_scaling: 0.02,
            },
            post_prandial: IrsEffect {
                base_factor: 0.0,
                insecticide_factor: 0.5,
                insecticide_scaling: 0.02,
            },
        }],
    }
}

pub fn gvi_config() -> GviConfig {
    GviConfig {
        decay: DecayFnDesc {
            function: "exponential".into(),
            l_years: Some(1.0),
            k: None,
            cv: None,
            initial_efficacy: 1.0,
            increasing: false,
            decay: Vec::new(),
        },
        species: vec![GviSpeciesConfig {
            species: "gambiae".into(),
            deterrency: 0.2,
            pre_prandial_killing: 0.3,
            post_prandial_killing: 0.3,
        }],
    }
}

pub fn vaccine_config(kind: VaccineKind) -> VaccineConfig {
    VaccineConfig {
        kind,
        decay: DecayFnDesc {
            function: "exponential".into(),
            l_years: Some(1.0),
            k: None,
            cv: None,
            initial_efficacy: 1.0,
            increasing: false,
            decay: Vec::new(),
        },
        initial_efficacy: vec![0.5, 0.7, 0.9],
        efficacy_b: 10.0,
    }
}

pub fn itn_component_config(name: &str) -> ComponentConfig {
    ComponentConfig {
        name: name.into(),
        desc: ComponentDesc::Itn(itn_config()),
        remove_on_first_bout: false,
        remove_on_first_treatment: false,
        remove_on_first_patent: false,
    }
}
