//! # amuse-types
//!
//! Shared type definitions for the amuse linkage engine.
//! This crate holds the plain data exchanged between the simulation core,
//! the audio layer, and the binary: parameter snapshots, musical keys,
//! colors, segments, and audio instructions.

pub mod audio;
pub mod geometry;
pub mod music;
pub mod params;
pub mod rng;

pub use audio::{ChordLayer, ChordRequest, ChordVoicing, MelodyRamp, NoteReadout, VoiceRole, DEFAULT_RAMP_MS};
pub use geometry::{DrawnSegment, LinkagePose, Particle, Point, Rgba, Segment};
pub use music::{Key, MusicalKey, Scale};
pub use params::{BrightnessMode, Configuration, PenStyle, Symmetry, SynthParams, Waveform};

/// Identifier for a node in the audio graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(i32);

impl NodeId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }
    pub fn get(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
