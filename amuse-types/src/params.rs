//! Parameter snapshot consumed by the engine once per tick.
//!
//! Field names on the wire follow the original front-end's camelCase keys
//! so exported snapshots load unchanged. Unknown keys are ignored.

use serde::{Deserialize, Serialize};

use crate::music::MusicalKey;

/// Pen color/alpha function selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PenStyle {
    Rainbow,
    BlackWhite,
    Kaleidoscope,
    Blue,
    Golden,
    Fragmented,
    Holographic,
    Silk,
    SilkInverse,
}

impl PenStyle {
    pub const ALL: [PenStyle; 9] = [
        PenStyle::Rainbow,
        PenStyle::BlackWhite,
        PenStyle::Kaleidoscope,
        PenStyle::Blue,
        PenStyle::Golden,
        PenStyle::Fragmented,
        PenStyle::Holographic,
        PenStyle::Silk,
        PenStyle::SilkInverse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PenStyle::Rainbow => "Rainbow",
            PenStyle::BlackWhite => "Black & White",
            PenStyle::Kaleidoscope => "Kaleidoscope",
            PenStyle::Blue => "Blue",
            PenStyle::Golden => "Golden",
            PenStyle::Fragmented => "Fragmented",
            PenStyle::Holographic => "Holographic",
            PenStyle::Silk => "Silk",
            PenStyle::SilkInverse => "Silk Inverse",
        }
    }
}

impl Default for PenStyle {
    fn default() -> Self {
        PenStyle::Rainbow
    }
}

impl TryFrom<u8> for PenStyle {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PenStyle::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("unknown pen style {}", value))
    }
}

impl From<PenStyle> for u8 {
    fn from(style: PenStyle) -> u8 {
        style as u8
    }
}

/// Brightness multiplier. Modes 4 and 5 are the dimming divisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BrightnessMode {
    X1,
    X2,
    X3,
    Div10,
    Div5,
}

impl BrightnessMode {
    /// Numeric mode as used in the style formulas (1..=5).
    pub fn value(&self) -> u8 {
        match self {
            BrightnessMode::X1 => 1,
            BrightnessMode::X2 => 2,
            BrightnessMode::X3 => 3,
            BrightnessMode::Div10 => 4,
            BrightnessMode::Div5 => 5,
        }
    }
}

impl Default for BrightnessMode {
    fn default() -> Self {
        BrightnessMode::X1
    }
}

impl TryFrom<u8> for BrightnessMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BrightnessMode::X1),
            2 => Ok(BrightnessMode::X2),
            3 => Ok(BrightnessMode::X3),
            4 => Ok(BrightnessMode::Div10),
            5 => Ok(BrightnessMode::Div5),
            _ => Err(format!("unknown brightness mode {}", value)),
        }
    }
}

impl From<BrightnessMode> for u8 {
    fn from(mode: BrightnessMode) -> u8 {
        mode.value()
    }
}

/// Rotational fold count, restricted to {1, 2, 4, 6, 8, 12}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Symmetry(u8);

impl Symmetry {
    pub const ALLOWED: [u8; 6] = [1, 2, 4, 6, 8, 12];

    pub fn new(folds: u8) -> Option<Self> {
        Self::ALLOWED.contains(&folds).then_some(Self(folds))
    }

    pub fn folds(self) -> u8 {
        self.0
    }

    /// Rotation applied to the `k`-th copy.
    pub fn angle(self, k: u8) -> f64 {
        k as f64 * std::f64::consts::TAU / self.0 as f64
    }
}

impl Default for Symmetry {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<u8> for Symmetry {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Symmetry::new(value).ok_or_else(|| format!("symmetry must be one of {:?}, got {}", Symmetry::ALLOWED, value))
    }
}

impl From<Symmetry> for u8 {
    fn from(s: Symmetry) -> u8 {
        s.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Sine
    }
}

/// Synthesis parameters for the melody voice, effects and chord pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthParams {
    #[serde(rename = "synthWaveform")]
    pub waveform: Waveform,
    /// Semitones, -12..=12
    #[serde(rename = "synthTranspose")]
    pub transpose: f64,
    /// Chord interval spread, 0.5..=2.0
    #[serde(rename = "synthComplexity")]
    pub complexity: f64,
    /// Saturation amount, 0..=100
    #[serde(rename = "synthDrive")]
    pub drive: f64,
    #[serde(rename = "synthCutoff")]
    pub cutoff: f64,
    #[serde(rename = "synthResonance")]
    pub resonance: f64,
    #[serde(rename = "synthLFOFreq")]
    pub lfo_rate: f64,
    #[serde(rename = "synthLFOAmount")]
    pub lfo_depth: f64,
    /// 0 = off, up to 20
    #[serde(rename = "synthArpSpeed")]
    pub arp_speed: u32,
    #[serde(rename = "synthArpRange")]
    pub arp_range: u32,
    /// Delay time in seconds
    #[serde(rename = "synthDelay")]
    pub delay: f64,
    #[serde(rename = "synthFeedback")]
    pub feedback: f64,
    #[serde(rename = "synthReverb")]
    pub reverb: f64,
    #[serde(rename = "synthMelodyVol")]
    pub melody_volume: f64,
    #[serde(rename = "synthChordVol")]
    pub chord_volume: f64,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            transpose: 0.0,
            complexity: 1.0,
            drive: 0.0,
            cutoff: 800.0,
            resonance: 1.0,
            lfo_rate: 2.0,
            lfo_depth: 0.0,
            arp_speed: 0,
            arp_range: 1,
            delay: 0.3,
            feedback: 0.4,
            reverb: 0.5,
            melody_volume: 0.3,
            chord_volume: 0.5,
        }
    }
}

/// Immutable per-tick parameter snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Sub-steps per tick
    pub acceleration: u32,
    #[serde(rename = "rotorRPM")]
    pub rotor_rpm: f64,
    pub lrpm: f64,
    pub rrpm: f64,
    /// Fixed phase offset of the left hand, degrees
    pub larma: f64,
    pub larm1: f64,
    pub larm2: f64,
    pub rarm1: f64,
    pub rarm2: f64,
    pub rarmext: f64,
    pub handdist: f64,
    pub baseoffsx: f64,
    pub baseoffsy: f64,
    #[serde(rename = "penStyle")]
    pub pen_style: PenStyle,
    #[serde(rename = "brightnessMode")]
    pub brightness: BrightnessMode,
    #[serde(rename = "lineWidth")]
    pub line_width: f64,
    pub symmetry: Symmetry,
    #[serde(rename = "autoEvolve")]
    pub auto_evolve: bool,
    #[serde(rename = "autoStop")]
    pub auto_stop: bool,
    #[serde(rename = "mouseInteraction")]
    pub mouse_interaction: bool,
    #[serde(rename = "particlesEnabled")]
    pub particles_enabled: bool,
    #[serde(rename = "showArms")]
    pub show_arms: bool,
    #[serde(rename = "soundEnabled")]
    pub sound_enabled: bool,
    /// Tonality the melody and chords are quantized to
    #[serde(rename = "musicalKey")]
    pub key: MusicalKey,
    #[serde(flatten)]
    pub synth: SynthParams,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            acceleration: 73,
            rotor_rpm: 4.0,
            lrpm: 2.0,
            rrpm: -3.0,
            larma: 0.0,
            larm1: 105.0,
            larm2: 316.0,
            rarm1: 95.0,
            rarm2: 371.0,
            rarmext: 53.0,
            handdist: 351.0,
            baseoffsx: 0.0,
            baseoffsy: -385.0,
            pen_style: PenStyle::Rainbow,
            brightness: BrightnessMode::X1,
            line_width: 1.0,
            symmetry: Symmetry::default(),
            auto_evolve: false,
            auto_stop: true,
            mouse_interaction: false,
            particles_enabled: false,
            show_arms: false,
            sound_enabled: false,
            key: MusicalKey::default(),
            synth: SynthParams::default(),
        }
    }
}
