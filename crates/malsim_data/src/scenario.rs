//! The scenario document.
//!
//! Strongly-typed structures that map to the scenario TOML file: model
//! selection, simulation phases, entomology (one block per mosquito
//! species), parasite genotypes, interventions with their deployment
//! schedules, the health system and monitoring configuration.
//!
//! Parsing from XML-based legacy formats is out of scope; the engine
//! consumes this already-parsed structure. All structures validate
//! themselves on load; an invalid scenario is a fatal error.

use serde::{Deserialize, Serialize};

use crate::parameters::ParameterEntry;

/// A sampled value given as mean plus coefficient of variation or variance.
/// Exactly one of `cv`/`variance` may be given; both absent means a point
/// mass at the mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledValue {
    pub mean: f64,
    #[serde(default)]
    pub cv: Option<f64>,
    #[serde(default)]
    pub variance: Option<f64>,
    /// "lognormal" (default) or "gamma"
    #[serde(default)]
    pub distr: Option<String>,
    /// Optional upper truncation point
    #[serde(default)]
    pub truncate: Option<f64>,
}

impl SampledValue {
    pub fn point(mean: f64) -> Self {
        Self { mean, cv: None, variance: None, distr: None, truncate: None }
    }

    pub fn validate(&self, what: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.mean.is_finite(), "{what}: mean must be finite");
        anyhow::ensure!(
            !(self.cv.is_some() && self.variance.is_some()),
            "{what}: give at most one of cv and variance"
        );
        if let Some(cv) = self.cv {
            anyhow::ensure!(cv >= 0.0, "{what}: cv must be non-negative");
        }
        if let Some(v) = self.variance {
            anyhow::ensure!(v >= 0.0, "{what}: variance must be non-negative");
        }
        Ok(())
    }
}

/// A normal sample description (mean and standard deviation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalValue {
    pub mean: f64,
    pub sd: f64,
}

/// A beta-distributed probability given as mean and variance.
/// Variance zero means the mean is used directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaValue {
    pub mean: f64,
    #[serde(default)]
    pub variance: f64,
}

impl BetaValue {
    pub fn validate(&self, what: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.mean > 0.0 && self.mean < 1.0 || (self.variance == 0.0 && (0.0..=1.0).contains(&self.mean)),
            "{what}: mean must be a probability"
        );
        anyhow::ensure!(self.variance >= 0.0, "{what}: variance must be non-negative");
        Ok(())
    }
}

/// Description of a decay function, matching the decay shapes of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayFnDesc {
    /// constant | step | linear | exponential | weibull | hill |
    /// smooth-compact | plus | minus | multiplies | divides
    pub function: String,
    /// Half-life-equivalent scale, in years (required for all but constant
    /// and the operator forms)
    #[serde(default)]
    pub l_years: Option<f64>,
    /// Shape parameter (weibull, hill, smooth-compact)
    #[serde(default)]
    pub k: Option<f64>,
    /// CV of the per-host log-normal time-scale heterogeneity
    #[serde(default)]
    pub cv: Option<f64>,
    #[serde(default = "one")]
    pub initial_efficacy: f64,
    /// Invert the output (1 - f)
    #[serde(default)]
    pub increasing: bool,
    /// Child functions for the operator forms (exactly two)
    #[serde(default)]
    pub decay: Vec<DecayFnDesc>,
}

fn one() -> f64 {
    1.0
}

impl DecayFnDesc {
    pub fn constant() -> Self {
        Self {
            function: "constant".into(),
            l_years: None,
            k: None,
            cv: None,
            initial_efficacy: 1.0,
            increasing: false,
            decay: Vec::new(),
        }
    }
}

/// An age-indexed value table for piecewise-linear interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgePoint {
    pub upper_age_years: f64,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Simulation-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Length of one time step in days: 1 or 5, fixed for the scenario.
    pub step_days: i32,
    pub master_seed: u64,
    pub population_size: usize,
    /// Mean of the (truncated-exponential) initial age distribution.
    #[serde(default = "default_mean_age")]
    pub mean_host_age_years: f64,
    /// Hosts are removed when they exceed this age.
    #[serde(default = "default_max_age")]
    pub max_host_age_years: f64,
    /// Mosquito-only warmup before humans are simulated.
    #[serde(default = "default_vector_warmup")]
    pub vector_warmup_years: i32,
    /// Human warmup with stable transmission, no interventions.
    #[serde(default = "default_human_warmup")]
    pub human_warmup_years: i32,
    /// Intervention period with surveys.
    pub main_years: i32,
    /// Cap on emergence-calibration iterations during warmup.
    #[serde(default = "default_init_iterations")]
    pub max_init_iterations: usize,
    /// Relative tolerance on annual S_v for emergence calibration.
    #[serde(default = "default_init_tolerance")]
    pub init_tolerance: f64,
}

fn default_mean_age() -> f64 {
    22.5
}
fn default_max_age() -> f64 {
    90.0
}
fn default_vector_warmup() -> i32 {
    5
}
fn default_human_warmup() -> i32 {
    25
}
fn default_init_iterations() -> usize {
    10
}
fn default_init_tolerance() -> f64 {
    0.01
}

// ---------------------------------------------------------------------------
// Model selection and within-host configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WithinHostVariant {
    /// 5-day descriptive model (AJTMH 75(2))
    #[default]
    Descriptive,
    /// 1-day empirical autoregressive model
    Empirical,
    /// 1-day Molineaux variant-switching model
    Molineaux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathogenesisVariant {
    #[default]
    Pyrogen,
    Mueller,
    Predetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceVariant {
    #[default]
    Base,
    NegativeBinomial,
    LogNormal,
    Heterogeneity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithinHostConfig {
    #[serde(default)]
    pub variant: WithinHostVariant,
    /// Pre-patent (liver-stage) latency in days.
    #[serde(default = "default_latent_p")]
    pub latent_p_days: i32,
    /// Densities below this are treated as extinct (parasites/microlitre).
    #[serde(default = "default_extinction")]
    pub extinction_level: f64,
    /// Peak of the generated mean-log-density surface (descriptive model).
    #[serde(default = "default_peak_log_density")]
    pub peak_log_density: f64,
    /// Days over which densities rise to their peak (descriptive model).
    #[serde(default = "default_rise_days")]
    pub density_rise_days: f64,
    /// Sub-patent sampling threshold (empirical model).
    #[serde(default = "default_sub_patent")]
    pub sub_patent_limit: f64,
    /// Inflation factor distribution (empirical model).
    #[serde(default = "default_inflation")]
    pub inflation: SampledValue,
}

fn default_latent_p() -> i32 {
    15
}
fn default_extinction() -> f64 {
    0.1
}
fn default_peak_log_density() -> f64 {
    9.4
}
fn default_rise_days() -> f64 {
    10.0
}
fn default_sub_patent() -> f64 {
    10.0
}
fn default_inflation() -> SampledValue {
    SampledValue::point(1.0)
}

impl Default for WithinHostConfig {
    fn default() -> Self {
        Self {
            variant: WithinHostVariant::Descriptive,
            latent_p_days: default_latent_p(),
            extinction_level: default_extinction(),
            peak_log_density: default_peak_log_density(),
            density_rise_days: default_rise_days(),
            sub_patent_limit: default_sub_patent(),
            inflation: default_inflation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathogenesisConfig {
    #[serde(default)]
    pub variant: PathogenesisVariant,
    /// Non-malaria fever incidence by age (per person per year); empty
    /// disables NMF sampling.
    #[serde(default)]
    pub nmf_incidence: Vec<AgePoint>,
}

impl Default for PathogenesisConfig {
    fn default() -> Self {
        Self { variant: PathogenesisVariant::Pyrogen, nmf_incidence: Vec::new() }
    }
}

/// The monitoring diagnostic used for patency decisions and surveys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// Detection threshold, parasites/microlitre.
    pub dens_limit: f64,
    /// If true the diagnostic misses HRP2-deficient infections (RDT).
    #[serde(default)]
    pub uses_hrp2: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self { dens_limit: 40.0, uses_hrp2: false }
    }
}

// ---------------------------------------------------------------------------
// Genotypes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenotypeConfig {
    pub name: String,
    pub initial_frequency: f64,
    #[serde(default)]
    pub hrp2_deficient: bool,
}

// ---------------------------------------------------------------------------
// Entomology
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmergenceVariant {
    /// Fourier-forced annual emergence
    #[default]
    Fixed,
    /// Simple mosquito-population-dynamics model with larval resources
    SimpleMpd,
}

/// Simple mosquito-population-dynamics (larval stage) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpdConfig {
    /// Egg-to-emergence development duration, days.
    pub development_duration_days: i32,
    /// Survival from egg to emergence absent density-dependent mortality.
    pub prob_preadult_survival: f64,
    /// Mean female eggs laid per oviposition.
    pub eggs_laid_by_oviposit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    /// Target annual EIR (infectious bites per adult per year) for this species.
    pub annual_eir: f64,
    /// Log-scale Fourier coefficients of the seasonal EIR profile:
    /// [a0, a1, b1, a2, b2, ...].
    pub seasonality_fourier: Vec<f64>,
    /// Phase rotation of the seasonal profile, days.
    #[serde(default)]
    pub seasonality_rotate_days: f64,
    /// Feeding/resting cycle duration τ, days.
    pub mosq_rest_duration_days: i32,
    /// Extrinsic incubation period θ_s, days.
    pub extrinsic_incubation_days: i32,
    /// Host-seeking mosquito death rate μ_vA, per day.
    pub seeking_death_rate: f64,
    /// Maximum time spent host-seeking per day τ1, days.
    pub seeking_duration_days: f64,
    /// Calibrated availability rate of one adult host to this species
    /// (α_i, per day); per-host samples are normalised to this mean.
    #[serde(default = "default_ento_availability")]
    pub ento_availability: f64,
    /// P_B: probability of biting the host after finding it.
    pub prob_biting: BetaValue,
    /// P_C: probability of finding a resting site after feeding.
    pub prob_find_rest_site: BetaValue,
    /// P_D: probability of surviving the resting period.
    pub prob_resting: BetaValue,
    /// P_E: probability of surviving the ovipositing flight.
    pub prob_ovipositing: f64,
    /// "lognormal" or "gamma" availability heterogeneity across hosts.
    #[serde(default = "default_avail_distr")]
    pub availability_distr: String,
    /// CV of per-host availability (0 disables heterogeneity).
    #[serde(default)]
    pub availability_cv: f64,
    /// Below this many infectious mosquitoes transmission is clamped to zero.
    #[serde(default = "default_min_infected")]
    pub min_infected_threshold: f64,
    /// Initial O_v/N_v ratio used to seed state from forced S_v.
    #[serde(default = "default_prop_infected")]
    pub prop_infected: f64,
    /// Initial S_v/N_v ratio used to seed state from forced S_v.
    #[serde(default = "default_prop_infectious")]
    pub prop_infectious: f64,
    /// Human infectiousness (kappa) assumed during forced transmission.
    #[serde(default = "default_init_kappa")]
    pub init_kappa: f64,
    #[serde(default)]
    pub emergence: EmergenceVariant,
    #[serde(default)]
    pub mpd: Option<MpdConfig>,
}

fn default_avail_distr() -> String {
    "lognormal".into()
}
fn default_ento_availability() -> f64 {
    0.0072
}
fn default_min_infected() -> f64 {
    0.001
}
fn default_prop_infected() -> f64 {
    0.078
}
fn default_prop_infectious() -> f64 {
    0.021
}
fn default_init_kappa() -> f64 {
    0.03
}

// ---------------------------------------------------------------------------
// Importation
// ---------------------------------------------------------------------------

/// Piecewise-constant timeline of imported-infection rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportationRate {
    /// Start of this rate, in years from the beginning of the main phase.
    pub time_years: f64,
    /// Imported infections per 1000 hosts per year.
    pub per_thousand_per_year: f64,
}

// ---------------------------------------------------------------------------
// Interventions
// ---------------------------------------------------------------------------

/// ITN factor set against one mosquito species: base, hole, insecticide and
/// interaction factors plus the two exponential scaling constants.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ItnEffect {
    #[serde(default)]
    pub base_factor: f64,
    pub hole_factor: f64,
    pub insecticide_factor: f64,
    #[serde(default)]
    pub interaction_factor: f64,
    pub hole_scaling: f64,
    pub insecticide_scaling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItnSpeciesConfig {
    pub species: String,
    /// Proportion of bites which occur while the net is in use.
    #[serde(default = "one")]
    pub proportion_use: f64,
    pub deterrency: ItnEffect,
    pub pre_prandial: ItnEffect,
    pub post_prandial: ItnEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItnConfig {
    pub initial_insecticide: NormalValue,
    pub max_insecticide: f64,
    /// Holes per year (sampled log-normal per net).
    pub hole_rate: SampledValue,
    /// Rips per hole per year (sampled log-normal per net).
    pub rip_rate: SampledValue,
    /// Weight of a rip relative to a new hole in the hole index.
    pub rip_factor: f64,
    pub insecticide_decay: DecayFnDesc,
    /// Attrition of nets; sampled per net to give a disposal time.
    pub attrition: DecayFnDesc,
    pub species: Vec<ItnSpeciesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IrsEffect {
    #[serde(default)]
    pub base_factor: f64,
    pub insecticide_factor: f64,
    pub insecticide_scaling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrsSpeciesConfig {
    pub species: String,
    pub deterrency: IrsEffect,
    pub pre_prandial: IrsEffect,
    pub post_prandial: IrsEffect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrsConfig {
    pub initial_insecticide: NormalValue,
    pub max_insecticide: f64,
    pub insecticide_decay: DecayFnDesc,
    pub species: Vec<IrsSpeciesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GviSpeciesConfig {
    pub species: String,
    /// Each effect is applied as 1 - effect * decay(age).
    pub deterrency: f64,
    pub pre_prandial_killing: f64,
    pub post_prandial_killing: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GviConfig {
    pub decay: DecayFnDesc,
    pub species: Vec<GviSpeciesConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaccineKind {
    Pev,
    Bsv,
    Tbv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineConfig {
    pub kind: VaccineKind,
    pub decay: DecayFnDesc,
    /// Mean initial efficacy per dose number (index 0 = first dose).
    pub initial_efficacy: Vec<f64>,
    /// Beta-distribution b parameter for per-host efficacy sampling; 0 means
    /// the mean is used directly.
    #[serde(default)]
    pub efficacy_b: f64,
}

/// Mass-drug-administration treatment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdaConfig {
    /// Days of liver-stage prophylaxis (0 = clear immediately, only).
    #[serde(default)]
    pub liver_days: i32,
    /// Days of blood-stage prophylaxis.
    #[serde(default)]
    pub blood_days: i32,
    #[serde(default = "default_true")]
    pub clear_liver: bool,
    #[serde(default = "default_true")]
    pub clear_blood: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentDesc {
    Itn(ItnConfig),
    Irs(IrsConfig),
    Gvi(GviConfig),
    Vaccine(VaccineConfig),
    Mda(MdaConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(flatten)]
    pub desc: ComponentDesc,
    /// Remove the host from this component's sub-population on the first
    /// clinical bout / treatment / patent survey.
    #[serde(default)]
    pub remove_on_first_bout: bool,
    #[serde(default)]
    pub remove_on_first_treatment: bool,
    #[serde(default)]
    pub remove_on_first_patent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedDeploymentConfig {
    /// Deployment time in years from the start of the main phase.
    pub time_years: f64,
    /// Component names deployed together.
    pub components: Vec<String>,
    pub coverage: f64,
    #[serde(default)]
    pub min_age_years: f64,
    #[serde(default = "default_max_age")]
    pub max_age_years: f64,
    /// Bring total coverage up to the target rather than re-sampling everyone.
    #[serde(default)]
    pub cumulative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousDeploymentConfig {
    /// Target age for deployment.
    pub age_years: f64,
    pub components: Vec<String>,
    pub coverage: f64,
    /// Deployment active from this time (years from main start).
    #[serde(default)]
    pub begin_years: f64,
    #[serde(default = "default_forever")]
    pub end_years: f64,
}

fn default_forever() -> f64 {
    f64::INFINITY
}

/// Larviciding: emergence is scaled by 1 - effectiveness for the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LarvicidingConfig {
    /// Start, in years from the beginning of the main phase.
    pub time_years: f64,
    pub effectiveness: f64,
    pub duration_days: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InterventionsConfig {
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub timed: Vec<TimedDeploymentConfig>,
    #[serde(default)]
    pub continuous: Vec<ContinuousDeploymentConfig>,
    #[serde(default)]
    pub larviciding: Vec<LarvicidingConfig>,
}

// ---------------------------------------------------------------------------
// Health system
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmediateOutcomesConfig {
    /// Access probability per regimen [UC, UC2, SEVERE].
    pub p_treatment: [f64; 3],
    /// Probability parasites are cleared given treatment, per regimen.
    pub p_parasites_cleared: [f64; 3],
    /// Hospital case-fatality rate by age.
    pub case_fatality: Vec<AgePoint>,
    /// Probability of sequelae after severe disease, [age < 5, age >= 5],
    /// given hospital treatment.
    pub p_sequelae_treated: [f64; 2],
    /// As above, without hospital treatment.
    pub p_sequelae_untreated: [f64; 2],
}

/// A leaf or decision of the case-management decision tree
/// (event-scheduler health system).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionNode {
    NoTreatment,
    /// Administer a drug schedule through the PK/PD interface.
    Treat {
        schedule: usize,
        dosage: usize,
        #[serde(default)]
        delay_days: i32,
    },
    /// Clear stages directly and/or set prophylaxis windows.
    TreatSimple {
        #[serde(default)]
        liver_days: i32,
        #[serde(default)]
        blood_days: i32,
    },
    /// Use the diagnostic and branch on the outcome.
    Diagnostic {
        positive: Box<DecisionNode>,
        negative: Box<DecisionNode>,
    },
    /// Random branch.
    Random {
        p: f64,
        yes: Box<DecisionNode>,
        no: Box<DecisionNode>,
    },
    /// First-line vs second-line branch (UC1 / UC2).
    CaseType {
        first_line: Box<DecisionNode>,
        second_line: Box<DecisionNode>,
    },
    /// Refer to hospital: executes the inner tree and flags hospitalisation.
    Refer { tree: Box<DecisionNode> },
}

/// One drug schedule known to the (simple, built-in) PK/PD backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugScheduleConfig {
    pub name: String,
    /// Probability the regimen clears blood-stage parasites.
    pub p_clearance: f64,
    /// Days of residual blood-stage prophylaxis.
    #[serde(default)]
    pub prophylaxis_days: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSchedulerConfig {
    pub uncomplicated_case_days: i32,
    pub complicated_case_days: i32,
    /// Extension of the at-risk window beyond the complicated case (<= 0
    /// shortens it).
    #[serde(default)]
    pub extra_days_at_risk: i32,
    /// Cumulative daily probability of seeking treatment from bout onset;
    /// last value must be 1.
    pub p_seek_uc_daily: Vec<f64>,
    pub uncomplicated_tree: DecisionNode,
    pub complicated_tree: DecisionNode,
    pub drug_schedules: Vec<DrugScheduleConfig>,
    /// β coefficients of the antibiotic-prescription logistic model:
    /// [base, negative test, positive test, needs antibiotic, informal].
    #[serde(default)]
    pub ab_logistic: [f64; 5],
    /// 1 - efficacy of antibiotic treatment on NMF fatality.
    #[serde(default = "one")]
    pub one_minus_efficacy_ab: f64,
    /// Fatality rate of NMFs needing antibiotics, by age, if untreated.
    #[serde(default)]
    pub severe_nmf_mortality: Vec<AgePoint>,
    /// Probability an NMF needs antibiotics, by age.
    #[serde(default)]
    pub p_need_antibiotic: Vec<AgePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum HealthSystemConfig {
    Immediate(ImmediateOutcomesConfig),
    EventScheduler(EventSchedulerConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalConfig {
    #[serde(flatten)]
    pub health_system: HealthSystemConfig,
    /// Clinical-episode grace period in steps: events within this window
    /// belong to one episode.
    #[serde(default = "default_hs_memory")]
    pub memory_steps: i32,
    /// Delay between an indirect-mortality flag and death, days.
    #[serde(default = "default_indirect_delay")]
    pub indirect_death_delay_days: i32,
    /// Heterogeneity of treatment seeking across hosts (CV, log-normal).
    #[serde(default)]
    pub treatment_seeking_cv: f64,
    /// Heterogeneity of comorbidity across hosts (CV, log-normal).
    #[serde(default)]
    pub comorbidity_cv: f64,
}

fn default_hs_memory() -> i32 {
    4
}
fn default_indirect_delay() -> i32 {
    30
}

// ---------------------------------------------------------------------------
// Monitoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Survey times in years from the start of the main phase.
    pub survey_times_years: Vec<f64>,
    /// Upper bounds of reporting age groups, years (ascending).
    pub age_group_upper_bounds: Vec<f64>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            survey_times_years: vec![1.0],
            age_group_upper_bounds: vec![1.0, 5.0, 15.0, 90.0],
        }
    }
}

// ---------------------------------------------------------------------------
// The scenario document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    #[serde(default)]
    pub within_host: WithinHostConfig,
    #[serde(default)]
    pub pathogenesis: PathogenesisConfig,
    #[serde(default)]
    pub incidence: IncidenceVariant,
    #[serde(default)]
    pub diagnostic: DiagnosticConfig,
    #[serde(default)]
    pub genotypes: Vec<GenotypeConfig>,
    pub species: Vec<SpeciesConfig>,
    /// Baseline heterogeneity of host availability (CV, log-normal).
    #[serde(default)]
    pub availability_cv: f64,
    #[serde(default)]
    pub importation: Vec<ImportationRate>,
    #[serde(default)]
    pub interventions: InterventionsConfig,
    pub clinical: ClinicalConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Scenario {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let scenario: Self = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Validates the scenario. Returns the first violation found.
    pub fn validate(&self) -> anyhow::Result<()> {
        let sim = &self.simulation;
        anyhow::ensure!(
            sim.step_days == 1 || sim.step_days == 5,
            "step_days must be 1 or 5"
        );
        anyhow::ensure!(sim.population_size > 0, "population_size must be positive");
        anyhow::ensure!(
            sim.population_size <= 10_000_000,
            "population_size too large"
        );
        anyhow::ensure!(sim.main_years > 0, "main_years must be positive");
        anyhow::ensure!(sim.vector_warmup_years >= 1, "vector_warmup_years must be >= 1");
        anyhow::ensure!(sim.human_warmup_years >= 1, "human_warmup_years must be >= 1");
        anyhow::ensure!(sim.init_tolerance > 0.0, "init_tolerance must be positive");
        anyhow::ensure!(
            sim.mean_host_age_years > 0.0 && sim.mean_host_age_years < sim.max_host_age_years,
            "mean_host_age_years must lie below max_host_age_years"
        );

        match self.within_host.variant {
            WithinHostVariant::Descriptive => anyhow::ensure!(
                sim.step_days == 5,
                "the descriptive within-host model requires a 5-day step"
            ),
            WithinHostVariant::Empirical | WithinHostVariant::Molineaux => anyhow::ensure!(
                sim.step_days == 1,
                "1-day within-host models require a 1-day step"
            ),
        }
        match &self.clinical.health_system {
            HealthSystemConfig::EventScheduler(es) => {
                anyhow::ensure!(
                    sim.step_days == 1,
                    "the event-scheduler health system requires a 1-day step"
                );
                anyhow::ensure!(
                    !es.p_seek_uc_daily.is_empty()
                        && (es.p_seek_uc_daily.last().copied().unwrap() - 1.0).abs() < 1e-9,
                    "p_seek_uc_daily must end at 1.0"
                );
                let mut prev = 0.0;
                for &p in &es.p_seek_uc_daily {
                    anyhow::ensure!(p >= prev && p <= 1.0, "p_seek_uc_daily must be cumulative");
                    prev = p;
                }
                anyhow::ensure!(
                    es.complicated_case_days + es.extra_days_at_risk >= 1,
                    "at-risk window of a complicated case must cover at least one day"
                );
            }
            HealthSystemConfig::Immediate(im) => {
                anyhow::ensure!(
                    sim.step_days == 5,
                    "the immediate-outcomes health system requires a 5-day step"
                );
                for p in im.p_treatment.iter().chain(&im.p_parasites_cleared) {
                    anyhow::ensure!((0.0..=1.0).contains(p), "probabilities must be in [0, 1]");
                }
                anyhow::ensure!(
                    !im.case_fatality.is_empty(),
                    "case_fatality table must not be empty"
                );
            }
        }
        anyhow::ensure!(self.clinical.memory_steps >= 1, "memory_steps must be >= 1");

        anyhow::ensure!(!self.species.is_empty(), "at least one mosquito species required");
        for sp in &self.species {
            anyhow::ensure!(sp.annual_eir >= 0.0, "{}: annual_eir must be >= 0", sp.name);
            anyhow::ensure!(
                !sp.seasonality_fourier.is_empty() && sp.seasonality_fourier.len() % 2 == 1,
                "{}: seasonality_fourier needs a0 plus (a, b) pairs",
                sp.name
            );
            anyhow::ensure!(
                sp.mosq_rest_duration_days >= 1,
                "{}: mosq_rest_duration_days must be >= 1",
                sp.name
            );
            anyhow::ensure!(
                sp.extrinsic_incubation_days > sp.mosq_rest_duration_days,
                "{}: extrinsic incubation must exceed the resting duration",
                sp.name
            );
            anyhow::ensure!(
                sp.seeking_death_rate > 0.0 && sp.seeking_duration_days > 0.0,
                "{}: seeking parameters must be positive",
                sp.name
            );
            anyhow::ensure!(
                sp.ento_availability > 0.0,
                "{}: ento_availability must be positive",
                sp.name
            );
            anyhow::ensure!(
                (0.0..=1.0).contains(&sp.prob_ovipositing),
                "{}: prob_ovipositing must be a probability",
                sp.name
            );
            sp.prob_biting.validate(&sp.name)?;
            sp.prob_find_rest_site.validate(&sp.name)?;
            sp.prob_resting.validate(&sp.name)?;
            anyhow::ensure!(
                sp.availability_distr == "lognormal" || sp.availability_distr == "gamma",
                "{}: availability_distr must be lognormal or gamma",
                sp.name
            );
            if sp.emergence == EmergenceVariant::SimpleMpd {
                let mpd = sp
                    .mpd
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("{}: simple_mpd requires [species.mpd]", sp.name))?;
                anyhow::ensure!(
                    mpd.development_duration_days >= 1,
                    "{}: development duration must be >= 1 day",
                    sp.name
                );
                anyhow::ensure!(
                    mpd.prob_preadult_survival > 0.0 && mpd.prob_preadult_survival <= 1.0,
                    "{}: prob_preadult_survival must be in (0, 1]",
                    sp.name
                );
                anyhow::ensure!(
                    mpd.eggs_laid_by_oviposit > 0.0,
                    "{}: eggs_laid_by_oviposit must be positive",
                    sp.name
                );
            }
        }

        if !self.genotypes.is_empty() {
            let total: f64 = self.genotypes.iter().map(|g| g.initial_frequency).sum();
            anyhow::ensure!(
                total > 0.0,
                "genotype initial frequencies must not all be zero"
            );
            for g in &self.genotypes {
                anyhow::ensure!(
                    g.initial_frequency >= 0.0,
                    "{}: initial_frequency must be >= 0",
                    g.name
                );
            }
        }

        for imp in &self.importation {
            anyhow::ensure!(
                imp.per_thousand_per_year >= 0.0,
                "importation rates must be >= 0"
            );
        }

        let component_names: Vec<&str> =
            self.interventions.components.iter().map(|c| c.name.as_str()).collect();
        for c in &self.interventions.components {
            anyhow::ensure!(
                component_names.iter().filter(|n| **n == c.name).count() == 1,
                "duplicate intervention component name {}",
                c.name
            );
            if let ComponentDesc::Vaccine(v) = &c.desc {
                anyhow::ensure!(
                    !v.initial_efficacy.is_empty(),
                    "{}: vaccine needs at least one dose efficacy",
                    c.name
                );
                for e in &v.initial_efficacy {
                    anyhow::ensure!((0.0..=1.0).contains(e), "{}: efficacy in [0,1]", c.name);
                }
            }
        }
        for t in &self.interventions.timed {
            anyhow::ensure!(
                (0.0..=1.0).contains(&t.coverage),
                "timed deployment coverage must be a probability"
            );
            for name in &t.components {
                anyhow::ensure!(
                    component_names.contains(&name.as_str()),
                    "timed deployment references unknown component {name}"
                );
            }
        }
        for l in &self.interventions.larviciding {
            anyhow::ensure!(
                (0.0..=1.0).contains(&l.effectiveness) && l.duration_days > 0,
                "larviciding needs effectiveness in [0, 1] and a positive duration"
            );
        }
        for c in &self.interventions.continuous {
            anyhow::ensure!(
                (0.0..=1.0).contains(&c.coverage),
                "continuous deployment coverage must be a probability"
            );
            for name in &c.components {
                anyhow::ensure!(
                    component_names.contains(&name.as_str()),
                    "continuous deployment references unknown component {name}"
                );
            }
        }

        anyhow::ensure!(
            !self.monitoring.survey_times_years.is_empty(),
            "at least one survey required"
        );
        let mut prev = f64::NEG_INFINITY;
        for &t in &self.monitoring.survey_times_years {
            anyhow::ensure!(t >= 0.0 && t > prev, "survey times must be ascending");
            prev = t;
        }
        prev = 0.0;
        for &b in &self.monitoring.age_group_upper_bounds {
            anyhow::ensure!(b > prev, "age group bounds must be ascending");
            prev = b;
        }
        anyhow::ensure!(self.diagnostic.dens_limit >= 0.0, "dens_limit must be >= 0");
        Ok(())
    }

    /// Number of parasite genotypes; scenarios without an explicit genotype
    /// table run with a single wild-type genotype.
    pub fn num_genotypes(&self) -> usize {
        self.genotypes.len().max(1)
    }

    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        let canonical = serde_json::to_string(self).unwrap_or_default();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_scenario() -> Scenario {
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

    #[test]
    fn test_minimal_scenario_validates() {
        assert!(minimal_scenario().validate().is_ok());
    }

    #[test]
    fn test_bad_step_length_rejected() {
        let mut s = minimal_scenario();
        s.simulation.step_days = 3;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_descriptive_model_needs_five_day_step() {
        let mut s = minimal_scenario();
        s.simulation.step_days = 1;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_unknown_component_reference_rejected() {
        let mut s = minimal_scenario();
        s.interventions.timed.push(TimedDeploymentConfig {
            time_years: 0.0,
            components: vec!["nets".into()],
            coverage: 0.8,
            min_age_years: 0.0,
            max_age_years: 90.0,
            cumulative: false,
        });
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_eip_must_exceed_resting() {
        let mut s = minimal_scenario();
        s.species[0].extrinsic_incubation_days = 2;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = minimal_scenario();
        let b = minimal_scenario();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_toml_round_trip() {
        let s = minimal_scenario();
        let text = toml::to_string(&s).unwrap();
        let back = Scenario::from_toml(&text).unwrap();
        assert_eq!(back.name, "test");
        assert_eq!(back.species.len(), 1);
    }
}
