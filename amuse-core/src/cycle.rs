//! Period of the combined rotor/hand motion.

use std::f64::consts::TAU;

use amuse_types::Configuration;

/// Velocities at or below this magnitude are treated as stopped.
pub const ACTIVE_RPM_EPSILON: f64 = 0.0001;
/// Velocities are compared at this fixed-point resolution.
pub const RPM_SCALE: u64 = 1000;
/// A combined period beyond this many unit turns counts as unbounded.
pub const MAX_PERIOD: u64 = 5000;

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Angular extent (radians of a 1-rpm clock) after which motion at all the
/// given velocities repeats, or `None` when there is no bounded period.
///
/// Signs are ignored. Zero velocities drop out; if none remain the motion
/// is unbounded.
pub fn calculate_cycle(velocities: &[f64]) -> Option<f64> {
    let periods = velocities
        .iter()
        .filter(|v| v.abs() > ACTIVE_RPM_EPSILON)
        .map(|v| (v.abs() * RPM_SCALE as f64).round() as u64)
        .map(|scaled| RPM_SCALE / gcd(scaled, RPM_SCALE));
    combined_period(periods).map(|turns| turns as f64 * TAU)
}

/// Least common multiple of the per-velocity periods, built up one at a
/// time and abandoned as soon as it passes `MAX_PERIOD`.
fn combined_period(mut periods: impl Iterator<Item = u64>) -> Option<u64> {
    let mut cycle = periods.next()?;
    for period in periods {
        cycle = cycle / gcd(cycle, period) * period;
        if cycle > MAX_PERIOD {
            return None;
        }
    }
    Some(cycle)
}

/// Cycle target for a configuration's rotor and hand velocities.
pub fn cycle_target(config: &Configuration) -> Option<f64> {
    calculate_cycle(&[config.rotor_rpm, config.lrpm, config.rrpm])
}
