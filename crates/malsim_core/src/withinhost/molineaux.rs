//! The Molineaux (1-day step, 2-day cycle) variant-switching model.
//!
//! Each infection carries 50 antigenic variants. Variant densities project
//! forward per two-day erythrocytic cycle under a sampled growth multiplier,
//! attenuated by a variant-specific and a variant-transcending immune
//! response, each a saturating function of lagged densities. Two
//! host-specific critical densities are sampled at infection creation.

use serde::{Deserialize, Serialize};

use crate::impl_checkpoint;
use crate::util::rng::LocalRng;
use crate::withinhost::infection::MAX_DENS;
use crate::withinhost::WithinHostParams;

/// Number of antigenic variants per infection.
pub const NUM_VARIANTS: usize = 50;
/// Slots of the lagged-density rings: 4 two-day cycles = 8 days.
pub const TAUS: usize = 4;
/// Hard cap on infection length, days.
pub const MAX_DURATION_DAYS: i32 = 730;

// Growth multiplier per two-day cycle: log-normal around the published
// mean multiplication rate of ~16, floored at 1 (no shrinking variants).
const GROWTH_MEAN_LOG: f64 = 2.77;
const GROWTH_SD_LOG: f64 = 0.5;
// Geometric seeding ratio across variants; later variants start from
// smaller inocula and therefore express later.
const VARIANT_SEED_RATIO: f64 = 0.7;
// Total inoculum density at the start of the blood stage.
const INOCULUM_DENSITY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct MolineauxParams {
    extinction_level: f64,
    /// log10 mean/sd of the first-local-maximum critical density (P*_c).
    mean_local_max_density: f64,
    sd_local_max_density: f64,
    /// log10 mean/sd of the variant-transcending critical density (P*_m).
    mean_diff_pos_days: f64,
    sd_diff_pos_days: f64,
}

impl MolineauxParams {
    pub fn new(
        extinction_level: f64,
        mean_local_max_density: f64,
        sd_local_max_density: f64,
        mean_diff_pos_days: f64,
        sd_diff_pos_days: f64,
    ) -> Self {
        Self {
            extinction_level,
            mean_local_max_density,
            sd_local_max_density,
            mean_diff_pos_days,
            sd_diff_pos_days,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    /// Current density of this variant, parasites/microlitre.
    density: f64,
    /// Growth multiplier per two-day cycle.
    mult: f64,
    /// Lagged densities for the variant-specific immune response.
    lagged: Vec<f64>,
}

impl_checkpoint!(Variant: density, mult, lagged);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MolineauxState {
    variants: Vec<Variant>,
    /// Lagged total densities for the variant-transcending response.
    lagged_total: Vec<f64>,
    /// Host-specific critical density of the variant-specific response.
    pc_star: f64,
    /// Host-specific critical density of the variant-transcending response.
    pm_star: f64,
}

impl_checkpoint!(MolineauxState: variants, lagged_total, pc_star, pm_star);

impl MolineauxState {
    pub fn new(rng: &mut LocalRng, params: &MolineauxParams) -> Self {
        let mut variants = Vec::with_capacity(NUM_VARIANTS);
        let norm = (1.0 - VARIANT_SEED_RATIO) / (1.0 - VARIANT_SEED_RATIO.powi(NUM_VARIANTS as i32));
        let mut seed_frac = norm;
        for _ in 0..NUM_VARIANTS {
            variants.push(Variant {
                density: INOCULUM_DENSITY * seed_frac,
                mult: rng.log_normal(GROWTH_MEAN_LOG, GROWTH_SD_LOG).max(1.0),
                lagged: vec![0.0; TAUS],
            });
            seed_frac *= VARIANT_SEED_RATIO;
        }
        let pc_star =
            10f64.powf(rng.gauss(params.mean_local_max_density, params.sd_local_max_density));
        let pm_star = 10f64.powf(rng.gauss(params.mean_diff_pos_days, params.sd_diff_pos_days));
        Self { variants, lagged_total: vec![0.0; TAUS], pc_star, pm_star }
    }

    pub(crate) fn update(
        &mut self,
        _rng: &mut LocalRng,
        blood_age_days: i32,
        survival_factor: f64,
        params: &WithinHostParams,
        density: &mut f64,
    ) -> bool {
        let mp = &params.molineaux;
        if blood_age_days > MAX_DURATION_DAYS {
            return true;
        }
        // Densities project on the two-day cycle; odd days carry the
        // previous value forward.
        if blood_age_days % 2 != 0 {
            return false;
        }
        let slot = ((blood_age_days / 2) as usize) % TAUS;
        let transcending: f64 = self.lagged_total.iter().sum();
        let s_c = 1.0 / (1.0 + transcending / self.pm_star);

        let mut total = 0.0;
        for variant in &mut self.variants {
            let specific: f64 = variant.lagged.iter().sum();
            let s_i = 1.0 / (1.0 + specific / self.pc_star);
            variant.density =
                (variant.density * variant.mult * s_i * s_c * survival_factor).min(MAX_DENS);
            variant.lagged[slot] = variant.density;
            total += variant.density;
        }
        self.lagged_total[slot] = total;
        *density = total.min(MAX_DENS);
        *density < mp.extinction_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::withinhost::test_params;
    use malsim_data::scenario::WithinHostVariant;

    fn new_state() -> (MolineauxState, WithinHostParams) {
        let params = test_params(WithinHostVariant::Molineaux, 1);
        let mut rng = LocalRng::master(11);
        (MolineauxState::new(&mut rng, &params.molineaux), params)
    }

    #[test]
    fn test_densities_grow_then_are_controlled() {
        let (mut state, params) = new_state();
        let mut rng = LocalRng::master(12);
        let mut density = 0.0;
        let mut peak = 0.0;
        for day in 0..120 {
            if state.update(&mut rng, day, 1.0, &params, &mut density) {
                break;
            }
            peak = f64::max(peak, density);
        }
        // The infection must rise well above the inoculum and stay capped.
        assert!(peak > 10.0);
        assert!(peak <= MAX_DENS);
        // Immune control: the final density is below the peak.
        assert!(density < peak);
    }

    #[test]
    fn test_variant_count_and_criticals() {
        let (state, _) = new_state();
        assert_eq!(state.variants.len(), NUM_VARIANTS);
        assert!(state.pc_star > 0.0);
        assert!(state.pm_star > 0.0);
        // Later variants are seeded below earlier ones.
        assert!(state.variants[0].density > state.variants[NUM_VARIANTS - 1].density);
    }

    #[test]
    fn test_odd_days_carry_density() {
        let (mut state, params) = new_state();
        let mut rng = LocalRng::master(13);
        let mut density = 0.0;
        state.update(&mut rng, 0, 1.0, &params, &mut density);
        let before = density;
        let extinct = state.update(&mut rng, 1, 1.0, &params, &mut density);
        assert!(!extinct);
        assert_eq!(density, before);
    }

    #[test]
    fn test_hard_duration_cap() {
        let (mut state, params) = new_state();
        let mut rng = LocalRng::master(14);
        let mut density = 0.0;
        assert!(state.update(&mut rng, MAX_DURATION_DAYS + 2, 1.0, &params, &mut density));
    }
}
