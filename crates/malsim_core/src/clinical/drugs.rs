//! The PK/PD drug interface.
//!
//! The full pharmacokinetic ODE solver is an external collaborator; the
//! engine relies only on this interface: administering a scheduled regimen
//! (`treat_pkpd`) and the resulting per-step action on the within-host
//! model. The built-in implementation models each schedule as a clearance
//! probability applied after the dose delay plus a residual prophylaxis
//! window, with deterministic dose timing.

use serde::{Deserialize, Serialize};

use malsim_data::scenario::DrugScheduleConfig;

use crate::error::{Result, SimError};
use crate::impl_checkpoint;
use crate::time::SimTime;
use crate::util::rng::LocalRng;

/// The per-step effect a drug regimen has on the within-host model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrugAction {
    /// Clear blood-stage infections this step.
    pub clear_blood: bool,
    /// Days of blood-stage prophylaxis starting now.
    pub prophylaxis_days: i32,
}

/// Administers drug regimens and yields their actions. Implementations
/// must keep dose timing deterministic, sample per-host parameters at the
/// first dose and apply the survival effect on the step it falls due.
pub trait DrugModel {
    fn treat_pkpd(
        &mut self,
        rng: &mut LocalRng,
        schedule: &DrugScheduleConfig,
        dosage: usize,
        age_years: f64,
        delay_days: i32,
        now: SimTime,
    ) -> Result<()>;

    /// The action falling due this step, if any.
    fn apply(&mut self, now: SimTime) -> Option<DrugAction>;
}

/// Built-in regimen model backing the event-scheduler decision trees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleDrugModel {
    /// Pending clearance time; `never` when none.
    clear_time: SimTime,
    pending: bool,
    effective: bool,
    prophylaxis_days: i32,
}

impl_checkpoint!(SimpleDrugModel: clear_time, pending, effective, prophylaxis_days);

impl SimpleDrugModel {
    pub fn new() -> Self {
        Self {
            clear_time: SimTime::never(),
            pending: false,
            effective: false,
            prophylaxis_days: 0,
        }
    }

    /// Schedule lookup shared by all hosts.
    pub fn resolve<'a>(
        schedules: &'a [DrugScheduleConfig],
        schedule: usize,
    ) -> Result<&'a DrugScheduleConfig> {
        schedules.get(schedule).ok_or_else(|| {
            SimError::scenario(format!("treatment references unknown drug schedule {schedule}"))
        })
    }

    /// Administer a regimen. Dosage tables scale with age in the full
    /// model; the built-in model takes the schedule's parameters as-is.
    pub fn administer(
        &mut self,
        rng: &mut LocalRng,
        schedule: &DrugScheduleConfig,
        _dosage: usize,
        _age_years: f64,
        delay_days: i32,
        now: SimTime,
    ) {
        self.pending = true;
        self.effective = rng.bernoulli(schedule.p_clearance);
        self.clear_time = now + SimTime::from_days(delay_days.max(0));
        self.prophylaxis_days = schedule.prophylaxis_days;
    }

    pub fn apply_pending(&mut self, now: SimTime) -> Option<DrugAction> {
        if !self.pending || now < self.clear_time {
            return None;
        }
        self.pending = false;
        if !self.effective {
            return None;
        }
        Some(DrugAction { clear_blood: true, prophylaxis_days: self.prophylaxis_days })
    }
}

impl DrugModel for SimpleDrugModel {
    fn treat_pkpd(
        &mut self,
        rng: &mut LocalRng,
        schedule: &DrugScheduleConfig,
        dosage: usize,
        age_years: f64,
        delay_days: i32,
        now: SimTime,
    ) -> Result<()> {
        self.administer(rng, schedule, dosage, age_years, delay_days, now);
        Ok(())
    }

    fn apply(&mut self, now: SimTime) -> Option<DrugAction> {
        self.apply_pending(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(p_clearance: f64, prophylaxis_days: i32) -> DrugScheduleConfig {
        DrugScheduleConfig { name: "act".into(), p_clearance, prophylaxis_days }
    }

    #[test]
    fn test_effective_dose_clears_after_delay() {
        let mut model = SimpleDrugModel::new();
        let mut rng = LocalRng::master(1);
        model.administer(&mut rng, &schedule(1.0, 10), 0, 20.0, 2, SimTime::zero());
        assert!(model.apply_pending(SimTime::from_days(1)).is_none());
        let action = model.apply_pending(SimTime::from_days(2)).unwrap();
        assert!(action.clear_blood);
        assert_eq!(action.prophylaxis_days, 10);
        // Applied once only.
        assert!(model.apply_pending(SimTime::from_days(3)).is_none());
    }

    #[test]
    fn test_failed_dose_has_no_action() {
        let mut model = SimpleDrugModel::new();
        let mut rng = LocalRng::master(2);
        model.administer(&mut rng, &schedule(0.0, 10), 0, 20.0, 0, SimTime::zero());
        assert!(model.apply_pending(SimTime::zero()).is_none());
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let schedules = vec![schedule(1.0, 0)];
        assert!(SimpleDrugModel::resolve(&schedules, 0).is_ok());
        assert!(SimpleDrugModel::resolve(&schedules, 3).is_err());
    }
}
