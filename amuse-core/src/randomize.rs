use amuse_types::rng;
use amuse_types::{Configuration, Symmetry};

/// Symmetry treatment of a randomized configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomKind {
    /// Six-fold symmetry
    Symmetric,
    /// No symmetry
    Chaos,
    /// Keep the current fold count
    Keep,
}

const RPM_MIN: f64 = 0.01;
const RPM_MAX: f64 = 50.0;

fn random_rpm(state: &mut u64) -> f64 {
    let sign = if rng::next_unit(state) > 0.5 { 1.0 } else { -1.0 };
    sign * rng::range(state, RPM_MIN, RPM_MAX)
}

/// A new configuration with random velocities and geometry. Everything
/// else (style, flags, synth) is carried over from `config`.
pub fn randomize(config: &Configuration, kind: RandomKind, state: &mut u64) -> Configuration {
    let symmetry = match kind {
        RandomKind::Symmetric => Symmetry::new(6).unwrap_or_default(),
        RandomKind::Chaos => Symmetry::default(),
        RandomKind::Keep => config.symmetry,
    };

    Configuration {
        symmetry,
        rotor_rpm: random_rpm(state) / 4.0,
        lrpm: random_rpm(state),
        rrpm: random_rpm(state),
        baseoffsx: rng::range(state, -200.0, 200.0),
        baseoffsy: rng::range(state, -500.0, -100.0),
        handdist: rng::range(state, 50.0, 500.0),
        larm1: rng::range(state, 20.0, 200.0),
        rarm1: rng::range(state, 20.0, 200.0),
        larm2: rng::range(state, 100.0, 400.0),
        rarm2: rng::range(state, 100.0, 400.0),
        rarmext: rng::range(state, 0.0, 150.0),
        larma: rng::range(state, 0.0, 360.0),
        ..config.clone()
    }
}
