//! Per-tick stepping of the linkage.
//!
//! All cross-tick memory lives in [`EngineState`]; [`tick`] borrows it
//! exclusively together with a configuration snapshot and returns everything
//! the presentation surface and the audio sink need for that tick.

use amuse_audio::{map_step, HarmonicInput, VoiceState};
use amuse_types::rng;
use amuse_types::{
    Configuration, DrawnSegment, LinkagePose, MelodyRamp, NoteReadout, Particle, Point, Segment,
    DEFAULT_RAMP_MS,
};

use crate::autostop::ClosureProbe;
use crate::cycle::cycle_target;
use crate::kinematics::{attract, solve, Linkage, Rotation, AM};
use crate::segments::{SegmentBuffer, DEFAULT_SEGMENT_CAPACITY};
use crate::style;

/// Degrees a 1-rpm part turns per sub-step.
pub const ROT_STEP: f64 = 0.01666666 * 6.0;
/// Progress of the normalized 1-rpm clock per sub-step, in radians.
pub const PROGRESS_STEP: f64 = ROT_STEP * AM;
/// Evolution offset added per sub-step while auto-evolve is on.
pub const EVOLUTION_STEP: f64 = 0.0001;
/// Chance that a drawn copy sheds a particle.
pub const PARTICLE_CHANCE: f64 = 0.1;
/// Slack allowed when deciding a run has covered its whole cycle.
pub const FINISH_TOLERANCE: f64 = 0.1;

pub const DEFAULT_MAX_SUBSTEPS: u32 = 500;
pub const DEFAULT_MAX_FRAMES: u64 = 1_000_000;

/// Hard bounds on engine work and memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineLimits {
    pub max_substeps: u32,
    pub max_frames: u64,
    pub max_segments: usize,
    pub ramp_ms: f64,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            max_frames: DEFAULT_MAX_FRAMES,
            max_segments: DEFAULT_SEGMENT_CAPACITY,
            ramp_ms: DEFAULT_RAMP_MS,
        }
    }
}

/// Drawing surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(2400.0, 1800.0)
    }
}

/// Engine-owned state carried from tick to tick.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub rotation: Rotation,
    /// Last pen position, `None` at run start or after a clear
    pub cursor: Option<Point>,
    pub probe: ClosureProbe,
    pub segments: SegmentBuffer,
    /// Radians of the 1-rpm clock per full period, `None` if unbounded
    pub cycle_target: Option<f64>,
    /// Radians of the 1-rpm clock covered by the current run
    pub progress: f64,
    /// Ticks executed since the last clear
    pub frame: u64,
    pub evolution: f64,
    pub voice: VoiceState,
    pub running: bool,
    particle_rng: u64,
    limits: EngineLimits,
}

impl EngineState {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            rotation: Rotation::default(),
            cursor: None,
            probe: ClosureProbe::new(),
            segments: SegmentBuffer::new(limits.max_segments),
            cycle_target: None,
            progress: 0.0,
            frame: 0,
            evolution: 0.0,
            voice: VoiceState::default(),
            running: false,
            particle_rng: 0x0DDB_1A5E_5BAD_5EED,
            limits,
        }
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Seed the particle and chord RNG streams.
    pub fn seed(&mut self, seed: u64) {
        self.particle_rng = seed;
        self.voice.rng = seed ^ 0x9E37_79B9_7F4A_7C15;
    }

    /// Arm a new run from the current drawing position.
    pub fn begin_run(&mut self, config: &Configuration) {
        self.progress = 0.0;
        self.probe.clear();
        self.cycle_target = cycle_target(config);
        self.running = true;
    }

    /// Forget the drawing: accumulators, cursor, probe, stored segments and
    /// frame count. Stops the run.
    pub fn clear(&mut self) {
        self.rotation = Rotation::default();
        self.cursor = None;
        self.probe.clear();
        self.segments.clear();
        self.frame = 0;
        self.running = false;
    }

    /// `clear` plus evolution, arpeggiator and key.
    pub fn reset(&mut self) {
        self.clear();
        self.evolution = 0.0;
        self.progress = 0.0;
        self.cycle_target = None;
        self.voice.reset();
    }

    /// Percentage of the cycle covered, capped at 100, or `None` when the
    /// motion has no bounded period.
    pub fn cycle_progress(&self) -> Option<f64> {
        self.cycle_target
            .filter(|t| *t > 0.0)
            .map(|t| (self.progress.abs() / t * 100.0).min(100.0))
    }

    /// The run has covered its whole cycle and should restart rather than
    /// resume.
    pub fn is_finished(&self, config: &Configuration) -> bool {
        config.auto_stop
            && matches!(self.cycle_target, Some(t) if t.is_finite() && t > 0.0
                && self.progress.abs() >= t - FINISH_TOLERANCE)
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

/// Per-tick inputs besides the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Wall-clock seconds, used by the chord timer
    pub timestamp: f64,
    pub pointer: Option<Point>,
    pub canvas: Canvas,
}

/// Everything produced by one tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub segments: Vec<DrawnSegment>,
    pub particles: Vec<Particle>,
    pub ramps: Vec<MelodyRamp>,
    /// Joint positions of the last sub-step when arm inspection is on
    pub pose: Option<LinkagePose>,
    /// Note of the last melody step
    pub note: Option<NoteReadout>,
    /// Sub-steps actually executed
    pub steps: u32,
    /// Auto-stop detected closure during this tick
    pub run_complete: bool,
    /// The frame ceiling forced the run to stop
    pub frame_limit_reached: bool,
}

/// Advance the simulation by one scheduler tick.
///
/// Does nothing unless the state is running. Executes
/// `min(acceleration, max_substeps)` sub-steps (at least one); stops early if
/// auto-stop fires.
pub fn tick(state: &mut EngineState, config: &Configuration, input: &TickInput) -> TickOutput {
    let mut out = TickOutput::default();
    if !state.running {
        return out;
    }

    state.frame += 1;
    if state.frame > state.limits.max_frames {
        log::warn!(
            target: "engine",
            "frame limit {} reached, stopping run",
            state.limits.max_frames
        );
        state.running = false;
        out.frame_limit_reached = true;
        return out;
    }
    if state.voice.key != config.key {
        state.voice.key = config.key.clone();
    }

    let center = input.canvas.center();
    let steps = config.acceleration.max(1).min(state.limits.max_substeps.max(1));
    let folds = config.symmetry.folds();
    let base = Linkage::from_config(config);
    let pointer = input.pointer.filter(|_| config.mouse_interaction);

    for i in 0..steps {
        let linkage = if config.auto_evolve {
            state.evolution += EVOLUTION_STEP;
            base.evolved(state.evolution)
        } else {
            base
        };

        let pose = solve(&linkage, &state.rotation, center);
        let pen = match pointer {
            Some(p) => attract(pose.pen, p),
            None => pose.pen,
        };
        if i + 1 == steps && config.show_arms {
            out.pose = Some(LinkagePose { pen, ..pose });
        }

        let travel = state.cursor.map_or(0.0, |c| 2.0 * pen.dist(c));
        let sample = style::evaluate(
            &state.rotation,
            travel,
            config.pen_style,
            config.brightness,
            config.line_width,
        );

        if config.sound_enabled {
            let note = map_step(
                &mut state.voice,
                &HarmonicInput {
                    color: sample.color,
                    radius: pose.radius,
                    point: pen,
                    previous: state.cursor,
                    canvas_width: input.canvas.width,
                    center_x: center.x,
                    visible: sample.visible,
                },
                &config.synth,
                state.limits.ramp_ms,
            );
            out.ramps.push(note.ramp);
            out.note = Some(note.readout());
        }

        if let (Some(prev), true) = (state.cursor, sample.visible) {
            for k in 0..folds {
                let angle = config.symmetry.angle(k);
                out.segments.push(DrawnSegment {
                    from: prev.rotate_about(center, angle),
                    to: pen.rotate_about(center, angle),
                    color: sample.color,
                    width: sample.width,
                    symmetry_index: k,
                });
                if config.particles_enabled && rng::next_unit(&mut state.particle_rng) < PARTICLE_CHANCE {
                    out.particles.push(Particle {
                        x: pen.x - center.x,
                        y: pen.y - center.y,
                        vx: (rng::next_unit(&mut state.particle_rng) - 0.5) * 2.0,
                        vy: (rng::next_unit(&mut state.particle_rng) - 0.5) * 2.0,
                        max_age: rng::range(&mut state.particle_rng, 50.0, 100.0),
                        color: sample.color.with_alpha(0.5),
                        angle,
                    });
                }
            }
            state.segments.push(Segment {
                x1: prev.x,
                y1: prev.y,
                x2: pen.x,
                y2: pen.y,
                color: sample.color,
                width: sample.width,
                symmetry: folds,
            });
        }

        state.cursor = Some(pen);
        state.rotation.rotor += config.rotor_rpm * ROT_STEP;
        state.rotation.left += config.lrpm * ROT_STEP;
        state.rotation.right += config.rrpm * ROT_STEP;
        state.progress += PROGRESS_STEP;
        out.steps += 1;

        if config.auto_stop && state.probe.observe(pen, state.frame) {
            log::info!(
                target: "engine",
                "pattern closed at frame {}, run complete",
                state.frame
            );
            state.running = false;
            out.run_complete = true;
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use amuse_types::{Key, MusicalKey, PenStyle, Scale, Symmetry};

    fn running(config: &Configuration) -> EngineState {
        let mut state = EngineState::default();
        state.begin_run(config);
        state
    }

    fn one_step() -> Configuration {
        Configuration {
            acceleration: 1,
            ..Configuration::default()
        }
    }

    #[test]
    fn stopped_state_does_nothing() {
        let mut state = EngineState::default();
        let out = tick(&mut state, &Configuration::default(), &TickInput::default());
        assert_eq!(out.steps, 0);
        assert_eq!(state.frame, 0);
    }

    #[test]
    fn first_step_sets_cursor_without_drawing() {
        let config = one_step();
        let mut state = running(&config);
        let out = tick(&mut state, &config, &TickInput::default());
        assert_eq!(out.steps, 1);
        assert!(out.segments.is_empty());
        assert!(state.cursor.map_or(false, |c| c.is_finite()));

        let out = tick(&mut state, &config, &TickInput::default());
        assert_eq!(out.segments.len(), 1);
        assert_eq!(state.segments.len(), 1);
    }

    #[test]
    fn substeps_are_capped() {
        let config = Configuration {
            acceleration: 10_000,
            auto_stop: false,
            ..Configuration::default()
        };
        let mut state = running(&config);
        let out = tick(&mut state, &config, &TickInput::default());
        assert_eq!(out.steps, DEFAULT_MAX_SUBSTEPS);
    }

    #[test]
    fn zero_acceleration_still_steps_once() {
        let config = Configuration {
            acceleration: 0,
            ..Configuration::default()
        };
        let mut state = running(&config);
        assert_eq!(tick(&mut state, &config, &TickInput::default()).steps, 1);
    }

    #[test]
    fn symmetry_replicates_but_stores_one() {
        let config = Configuration {
            acceleration: 5,
            symmetry: Symmetry::new(6).unwrap(),
            auto_stop: false,
            ..Configuration::default()
        };
        let mut state = running(&config);
        let out = tick(&mut state, &config, &TickInput::default());
        // first sub-step has no cursor
        assert_eq!(out.segments.len(), 4 * 6);
        assert_eq!(state.segments.len(), 4);
        assert!(state.segments.iter().all(|s| s.symmetry == 6));

        let center = Canvas::default().center();
        let copies: Vec<&DrawnSegment> = out.segments.iter().take(6).collect();
        for (k, copy) in copies.iter().enumerate() {
            assert_eq!(copy.symmetry_index as usize, k);
            let r0 = copies[0].to.dist(center);
            assert!((copy.to.dist(center) - r0).abs() < 1e-9);
        }
    }

    #[test]
    fn rotation_advances_by_rpm() {
        let config = one_step();
        let mut state = running(&config);
        tick(&mut state, &config, &TickInput::default());
        assert_eq!(state.rotation.rotor, 4.0 * ROT_STEP);
        assert_eq!(state.rotation.left, 2.0 * ROT_STEP);
        assert_eq!(state.rotation.right, -3.0 * ROT_STEP);
        assert_eq!(state.progress, PROGRESS_STEP);
    }

    #[test]
    fn frame_ceiling_forces_stop() {
        let config = one_step();
        let mut state = EngineState::new(EngineLimits {
            max_frames: 3,
            ..EngineLimits::default()
        });
        state.begin_run(&config);
        for _ in 0..3 {
            assert_eq!(tick(&mut state, &config, &TickInput::default()).steps, 1);
        }
        let out = tick(&mut state, &config, &TickInput::default());
        assert!(out.frame_limit_reached);
        assert!(!state.running);
    }

    #[test]
    fn hidden_fragments_draw_nothing_and_mute() {
        let config = Configuration {
            acceleration: 400,
            pen_style: PenStyle::Fragmented,
            sound_enabled: true,
            auto_stop: false,
            ..Configuration::default()
        };
        let mut state = running(&config);
        let out = tick(&mut state, &config, &TickInput::default());
        assert_eq!(out.ramps.len(), 400);
        let muted = out.ramps.iter().filter(|r| r.gain == 0.0).count();
        assert!(muted > 0);
        // each visible step after the first draws exactly one segment
        assert_eq!(out.segments.len(), state.segments.len());
        assert!(out.segments.len() < 399);
    }

    #[test]
    fn voice_follows_the_snapshot_key() {
        let minor = MusicalKey::new(Key::A, Scale::Minor);
        let config = Configuration {
            sound_enabled: true,
            key: minor.clone(),
            ..one_step()
        };
        let mut state = running(&config);
        assert_eq!(state.voice.key, MusicalKey::default());
        tick(&mut state, &config, &TickInput::default());
        assert_eq!(state.voice.key, minor);

        tick(&mut state, &one_step(), &TickInput::default());
        assert_eq!(state.voice.key, MusicalKey::default());
    }

    #[test]
    fn arm_pose_reported_on_request() {
        let mut config = one_step();
        let mut state = running(&config);
        assert!(tick(&mut state, &config, &TickInput::default()).pose.is_none());
        config.show_arms = true;
        let pose = tick(&mut state, &config, &TickInput::default()).pose;
        assert_eq!(pose.map(|p| p.pen), state.cursor);
    }

    #[test]
    fn pointer_only_matters_with_mouse_interaction() {
        let config = one_step();
        let input = TickInput {
            pointer: Some(Point::new(0.0, 0.0)),
            ..TickInput::default()
        };
        let mut plain = running(&config);
        let mut with_pointer = running(&config);
        tick(&mut plain, &config, &TickInput::default());
        tick(&mut with_pointer, &config, &input);
        assert_eq!(plain.cursor, with_pointer.cursor);
    }

    #[test]
    fn auto_evolve_leaves_config_untouched() {
        let config = Configuration {
            acceleration: 10,
            auto_evolve: true,
            ..Configuration::default()
        };
        let snapshot = config.clone();
        let mut state = running(&config);
        tick(&mut state, &config, &TickInput::default());
        assert_eq!(config, snapshot);
        assert!((state.evolution - 10.0 * EVOLUTION_STEP).abs() < 1e-12);
    }

    #[test]
    fn particles_are_seeded_and_optional() {
        let mut config = Configuration {
            acceleration: 200,
            symmetry: Symmetry::new(4).unwrap(),
            auto_stop: false,
            ..Configuration::default()
        };
        let mut state = running(&config);
        assert!(tick(&mut state, &config, &TickInput::default()).particles.is_empty());

        config.particles_enabled = true;
        let mut a = running(&config);
        let mut b = running(&config);
        a.seed(7);
        b.seed(7);
        let pa = tick(&mut a, &config, &TickInput::default()).particles;
        let pb = tick(&mut b, &config, &TickInput::default()).particles;
        assert!(!pa.is_empty());
        assert_eq!(pa, pb);
        assert!(pa.iter().all(|p| (50.0..100.0).contains(&p.max_age) && p.color.a == 0.5));
    }

    #[test]
    fn progress_and_finish() {
        let config = Configuration::default();
        let mut state = running(&config);
        assert_eq!(state.cycle_progress(), Some(0.0));
        state.progress = std::f64::consts::TAU - 0.05;
        assert!(state.is_finished(&config));
        state.progress = std::f64::consts::PI;
        assert!((state.cycle_progress().unwrap() - 50.0).abs() < 1e-9);
        assert!(!state.is_finished(&config));

        let unbounded = Configuration {
            rotor_rpm: 0.0,
            lrpm: 0.0,
            rrpm: 0.0,
            ..Configuration::default()
        };
        state.begin_run(&unbounded);
        assert_eq!(state.cycle_progress(), None);
        assert!(!state.is_finished(&unbounded));
    }
}
