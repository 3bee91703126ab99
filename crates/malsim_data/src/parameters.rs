//! The indexed model-parameter table.
//!
//! Each fitted model parameter has a stable integer id used in scenario
//! documents and results databases. Ids are never renumbered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable parameter ids.
///
/// Don't ever change these numbers: scenario files reference them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum Parameter {
    // Infection incidence model
    NegLogOneMinusSinf = 1,
    EStar = 2,
    Simm = 3,
    XStarP = 4,
    GammaP = 5,
    // Immunity, mostly on infections
    SigmaISq = 6,
    CumulativeYStar = 7,
    CumulativeHStar = 8,
    NegLogOneMinusAlphaM = 9,
    DecayM = 10,
    Sigma0Sq = 11,
    XNuStar = 12,
    // Pathogenesis
    YStarSq = 13,
    Alpha = 14,
    DensityBiasNonGarki = 15,
    BaselineAvailabilityShape = 16,
    LogOddsRatioCfCommunity = 17,
    IndirectRiskCofactor = 18,
    NonMalariaInfantMortality = 19,
    DensityBiasGarki = 20,
    SevereMalariaThreshold = 21,
    ImmunityPenalty = 22,
    ImmuneEffectorDecay = 23,
    ComorbidityIntercept = 24,
    YStarHalfLife = 25,
    YStar1 = 26,
    AsexualImmunityDecay = 27,
    YStar0 = 28,
    CriticalAgeForComorbidity = 30,
    MuellerRateMultiplier = 31,
    MuellerDensityExponent = 32,
    CfrScaleFactor = 33,
    // Molineaux within-host model
    MeanLocalMaxDensity = 34,
    SdLocalMaxDensity = 35,
    MeanDiffPosDays = 36,
    SdDiffPosDays = 37,
    /// exp(-CFR_NEG_LOG_ALPHA) is the proportion of deaths occurring on the
    /// first day of a complicated bout (event-scheduler model).
    CfrNegLogAlpha = 38,
}

impl Parameter {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        use Parameter::*;
        let p = match id {
            1 => NegLogOneMinusSinf,
            2 => EStar,
            3 => Simm,
            4 => XStarP,
            5 => GammaP,
            6 => SigmaISq,
            7 => CumulativeYStar,
            8 => CumulativeHStar,
            9 => NegLogOneMinusAlphaM,
            10 => DecayM,
            11 => Sigma0Sq,
            12 => XNuStar,
            13 => YStarSq,
            14 => Alpha,
            15 => DensityBiasNonGarki,
            16 => BaselineAvailabilityShape,
            17 => LogOddsRatioCfCommunity,
            18 => IndirectRiskCofactor,
            19 => NonMalariaInfantMortality,
            20 => DensityBiasGarki,
            21 => SevereMalariaThreshold,
            22 => ImmunityPenalty,
            23 => ImmuneEffectorDecay,
            24 => ComorbidityIntercept,
            25 => YStarHalfLife,
            26 => YStar1,
            27 => AsexualImmunityDecay,
            28 => YStar0,
            30 => CriticalAgeForComorbidity,
            31 => MuellerRateMultiplier,
            32 => MuellerDensityExponent,
            33 => CfrScaleFactor,
            34 => MeanLocalMaxDensity,
            35 => SdLocalMaxDensity,
            36 => MeanDiffPosDays,
            37 => SdDiffPosDays,
            38 => CfrNegLogAlpha,
            _ => return None,
        };
        Some(p)
    }
}

/// One scenario-file entry of the parameter table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub id: u16,
    pub value: f64,
    /// Optional human-readable name; ignored by lookups.
    #[serde(default)]
    pub name: Option<String>,
}

/// The loaded parameter table. Missing lookups are fatal scenario errors;
/// the error itself is raised by the caller, which knows the exit-code taxonomy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    values: BTreeMap<u16, f64>,
}

impl Parameters {
    pub fn from_entries(entries: &[ParameterEntry]) -> anyhow::Result<Self> {
        let mut values = BTreeMap::new();
        for e in entries {
            anyhow::ensure!(
                Parameter::from_id(e.id).is_some(),
                "unknown parameter id {}",
                e.id
            );
            anyhow::ensure!(
                values.insert(e.id, e.value).is_none(),
                "duplicate parameter id {}",
                e.id
            );
        }
        Ok(Self { values })
    }

    /// Look up a parameter value. `None` means the scenario did not supply it.
    pub fn get(&self, p: Parameter) -> Option<f64> {
        self.values.get(&p.id()).copied()
    }

    /// A complete table with the reference parameterisation. Used by tests
    /// and as the base that scenario entries override.
    pub fn reference() -> Self {
        use Parameter::*;
        let table: &[(Parameter, f64)] = &[
            (NegLogOneMinusSinf, 0.050736),
            (EStar, 0.032715),
            (Simm, 0.138161),
            (XStarP, 1514.385853),
            (GammaP, 2.03692),
            (SigmaISq, 10.173598),
            (CumulativeYStar, 35158523.31),
            (CumulativeHStar, 97.334652),
            (NegLogOneMinusAlphaM, 2.33031),
            (DecayM, 2.53106),
            (Sigma0Sq, 0.655747),
            (XNuStar, 0.916181),
            (YStarSq, 6502.26335),
            (Alpha, 142601.912),
            (DensityBiasNonGarki, 0.177378),
            (BaselineAvailabilityShape, 1.80918),
            (LogOddsRatioCfCommunity, 0.736202),
            (IndirectRiskCofactor, 0.018777),
            (NonMalariaInfantMortality, 49.539046),
            (DensityBiasGarki, 4.79610772546704),
            (SevereMalariaThreshold, 784455.599961),
            (ImmunityPenalty, 1.0),
            (ImmuneEffectorDecay, 0.0),
            (ComorbidityIntercept, 0.0968),
            (YStarHalfLife, 0.275437402),
            (YStar1, 0.596539864),
            (AsexualImmunityDecay, 0.0),
            (YStar0, 296.302437899999),
            (CriticalAgeForComorbidity, 0.117383),
            (MuellerRateMultiplier, 0.697686),
            (MuellerDensityExponent, 0.273836),
            (CfrScaleFactor, 0.510558),
            (MeanLocalMaxDensity, 4.7601),
            (SdLocalMaxDensity, 0.5008),
            (MeanDiffPosDays, 2.2736),
            (SdDiffPosDays, 0.2315),
            (CfrNegLogAlpha, 1.157),
        ];
        let values = table.iter().map(|&(p, v)| (p.id(), v)).collect();
        Self { values }
    }

    /// The reference table as scenario-file entries (for scenario builders).
    pub fn reference_entries() -> Vec<ParameterEntry> {
        Self::reference()
            .values
            .into_iter()
            .map(|(id, value)| ParameterEntry { id, value, name: None })
            .collect()
    }

    /// Overlay `entries` on top of this table.
    pub fn with_overrides(mut self, entries: &[ParameterEntry]) -> anyhow::Result<Self> {
        for e in entries {
            anyhow::ensure!(
                Parameter::from_id(e.id).is_some(),
                "unknown parameter id {}",
                e.id
            );
            self.values.insert(e.id, e.value);
        }
        Ok(self)
    }
}
