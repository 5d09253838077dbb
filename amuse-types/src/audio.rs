use serde::{Deserialize, Serialize};

use crate::music::Key;
use crate::params::Waveform;

/// Ramp length for every melody parameter change.
pub const DEFAULT_RAMP_MS: f64 = 10.0;

/// Role of a traced point in the melody, chosen by distance from center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceRole {
    Solo,
    Harmony,
}

impl VoiceRole {
    pub fn gain_multiplier(&self) -> f64 {
        match self {
            VoiceRole::Solo => 1.0,
            VoiceRole::Harmony => 0.4,
        }
    }
}

/// Target melody-voice values for one sub-step, to be reached over `ramp_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MelodyRamp {
    pub frequency: f64,
    pub pan: f64,
    pub gain: f64,
    pub ramp_ms: f64,
}

/// Displayed note for the last melody step of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteReadout {
    pub note: Key,
    pub octave: i32,
    pub freq: u32,
}

/// One oscillator of a chord voicing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordLayer {
    pub freq: f64,
    pub gain: f64,
    pub detune_cents: f64,
    pub waveform: Waveform,
    pub pan: f64,
}

/// Multi-layer chord with a shared attack/sustain/release envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordVoicing {
    pub layers: Vec<ChordLayer>,
    pub attack_secs: f64,
    pub sustain_secs: f64,
    pub release_secs: f64,
}

impl ChordVoicing {
    pub fn total_secs(&self) -> f64 {
        self.attack_secs + self.sustain_secs + self.release_secs
    }
}

/// Discrete request to sound a chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordRequest {
    pub note: Key,
    pub octave: i32,
    pub voicing: ChordVoicing,
}
