//! Color and position to melody mapping.
//!
//! One call per sub-step: the traced color picks a pitch class, the key
//! snaps it into the scale, distance from center picks octave and voice role,
//! and the step's speed and alpha shape the gain.

use amuse_types::{Key, MelodyRamp, NoteReadout, Point, Rgba, SynthParams, VoiceRole};

use crate::voice_state::VoiceState;

/// Distances at or beyond this many units map to the outer edge.
pub const MAX_NOTE_DISTANCE: f64 = 1200.0;
/// Normalized closeness above which a point plays the solo melody.
pub const SOLO_THRESHOLD: f64 = 0.6;
/// Harmony tones: root, major third, fifth.
pub const HARMONY_INTERVALS: [i32; 3] = [0, 4, 7];
/// Gain for a step with no previous point to measure speed from.
pub const RESTING_VOLUME: f64 = 0.03;
/// Cap on the speed-driven gain.
pub const MAX_SPEED_VOLUME: f64 = 0.25;

/// Per-sub-step inputs to the mapper.
#[derive(Debug, Clone, Copy)]
pub struct HarmonicInput {
    /// Stroke color with final alpha
    pub color: Rgba,
    /// Kinematic distance of the pen from the canvas center
    pub radius: f64,
    /// Displayed pen position
    pub point: Point,
    /// Position at the previous sub-step, if any
    pub previous: Option<Point>,
    pub canvas_width: f64,
    pub center_x: f64,
    /// Visibility gate from the style engine; a hidden step is silent
    pub visible: bool,
}

/// Result of mapping one sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicNote {
    pub note: Key,
    pub octave: i32,
    pub role: VoiceRole,
    /// Unclamped frequency of the note
    pub frequency: f64,
    pub ramp: MelodyRamp,
}

impl HarmonicNote {
    pub fn readout(&self) -> NoteReadout {
        NoteReadout {
            note: self.note,
            octave: self.octave,
            freq: self.frequency.round().max(0.0) as u32,
        }
    }
}

/// Hue of an RGB color in `[0, 1)`. Grays have hue 0.
pub fn hue(color: &Rgba) -> f64 {
    let r = color.r as f64 / 255.0;
    let g = color.g as f64 / 255.0;
    let b = color.b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return 0.0;
    }
    let d = max - min;
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    h / 6.0
}

/// Chromatic pitch class for a hue.
pub fn hue_pitch_class(h: f64) -> i32 {
    ((h * 12.0).floor() as i32).rem_euclid(12)
}

/// `base(note) * 2^(octave - 4 + transpose / 12)`.
pub fn note_frequency(note: Key, octave: i32, transpose: f64) -> f64 {
    note.base_frequency() * 2f64.powf(octave as f64 - 4.0 + transpose / 12.0)
}

/// Gain envelope favoring octave 4.
pub fn spectral_gain(octave: i32) -> f64 {
    let d = (octave - 4) as f64;
    (-(d * d) / 2.5).exp()
}

fn speed_volume(point: Point, previous: Option<Point>) -> f64 {
    match previous {
        Some(prev) => (point.dist(prev) / 50.0).min(MAX_SPEED_VOLUME),
        None => RESTING_VOLUME,
    }
}

/// Map one traced sub-step to a note and its melody ramp.
///
/// Advances the arpeggiator when `synth.arp_speed > 0`.
pub fn map_step(
    voice: &mut VoiceState,
    input: &HarmonicInput,
    synth: &SynthParams,
    ramp_ms: f64,
) -> HarmonicNote {
    let raw = hue_pitch_class(hue(&input.color));
    let quantized = voice.key.quantize(raw);
    let mut note = Key::from_semitone(quantized);

    let closeness = (1.0 - input.radius / MAX_NOTE_DISTANCE).clamp(0.0, 1.0);
    let role = if closeness > SOLO_THRESHOLD {
        VoiceRole::Solo
    } else {
        VoiceRole::Harmony
    };
    // Exact center would give 5; the register stops at 4.
    let mut octave = (3 + (closeness * 2.0).floor() as i32).min(4);

    if synth.arp_speed > 0 {
        let degree = voice.arp.step(synth.arp_speed);
        note = voice.key.degree_pitch(degree);
    }

    if role == VoiceRole::Harmony {
        let slot = if input.canvas_width > 0.0 {
            ((input.point.x / input.canvas_width) * 3.0).floor().clamp(0.0, 2.0) as usize
        } else {
            0
        };
        note = Key::from_semitone(quantized + HARMONY_INTERVALS[slot]);
        octave = (octave - 1).max(3);
    }

    let frequency = note_frequency(note, octave, synth.transpose);

    let pan = if input.center_x > 0.0 {
        ((input.point.x - input.center_x) / input.center_x).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let gain = if input.visible {
        let volume = speed_volume(input.point, input.previous);
        let shaped = volume
            * input.color.a
            * (0.2 + spectral_gain(octave) * 0.8)
            * role.gain_multiplier();
        shaped.max(0.0)
    } else {
        0.0
    };

    HarmonicNote {
        note,
        octave,
        role,
        frequency,
        ramp: MelodyRamp {
            frequency,
            pan,
            gain,
            ramp_ms,
        },
    }
}
