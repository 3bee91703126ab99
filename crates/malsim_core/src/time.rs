//! Simulation time: an integer count of days.
//!
//! A time step is 1 or 5 days, fixed per scenario. Phases are pre-init
//! (mosquito warmup), init (human warmup) and main (interventions active).

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

pub const DAYS_PER_YEAR: i32 = 365;

/// A point in simulation time, counted in days from the simulation start.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(i32);

impl SimTime {
    pub const fn zero() -> Self {
        SimTime(0)
    }

    pub const fn from_days(days: i32) -> Self {
        SimTime(days)
    }

    pub fn from_years(years: f64) -> Self {
        SimTime((years * DAYS_PER_YEAR as f64).round() as i32)
    }

    /// A time earlier than any event of the simulation.
    pub const fn never() -> Self {
        SimTime(i32::MIN / 2)
    }

    /// A time later than any event of the simulation.
    pub const fn future() -> Self {
        SimTime(i32::MAX / 2)
    }

    pub const fn in_days(self) -> i32 {
        self.0
    }

    pub fn in_years(self) -> f64 {
        self.0 as f64 / DAYS_PER_YEAR as f64
    }

    /// Steps since time zero, given the scenario step length.
    pub fn in_steps(self, step_days: i32) -> i32 {
        self.0 / step_days
    }

    /// Day of the (365-day) year, in 0..365.
    pub fn day_of_year(self) -> usize {
        self.0.rem_euclid(DAYS_PER_YEAR) as usize
    }
}

impl Add for SimTime {
    type Output = SimTime;
    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub for SimTime {
    type Output = SimTime;
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        self.0 += rhs.0;
    }
}

impl SubAssign for SimTime {
    fn sub_assign(&mut self, rhs: SimTime) {
        self.0 -= rhs.0;
    }
}

impl Mul<i32> for SimTime {
    type Output = SimTime;
    fn mul(self, rhs: i32) -> SimTime {
        SimTime(self.0 * rhs)
    }
}

impl Neg for SimTime {
    type Output = SimTime;
    fn neg(self) -> SimTime {
        SimTime(-self.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

/// The phase of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Mosquito warmup with forced emergence; no human dynamics.
    PreInit,
    /// Coupled human warmup without interventions.
    Init,
    /// Interventions active, surveys recorded.
    Main,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_year_wraps() {
        assert_eq!(SimTime::from_days(0).day_of_year(), 0);
        assert_eq!(SimTime::from_days(365).day_of_year(), 0);
        assert_eq!(SimTime::from_days(366).day_of_year(), 1);
        assert_eq!(SimTime::from_days(730).day_of_year(), 0);
    }

    #[test]
    fn test_arithmetic() {
        let a = SimTime::from_days(10);
        let b = SimTime::from_days(4);
        assert_eq!((a - b).in_days(), 6);
        assert_eq!((a + b).in_days(), 14);
        assert_eq!((b * 3).in_days(), 12);
    }

    #[test]
    fn test_years_round_trip() {
        assert_eq!(SimTime::from_years(1.0).in_days(), 365);
        assert!((SimTime::from_days(365).in_years() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_never_before_future() {
        assert!(SimTime::never() < SimTime::zero());
        assert!(SimTime::future() > SimTime::from_years(1000.0));
    }
}
