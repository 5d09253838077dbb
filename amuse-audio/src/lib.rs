pub mod chord;
pub mod engine;
pub mod harmonic;
pub mod osc_client;
pub mod voice_state;

pub use chord::{build_voicing, poll_ambient_chord};
pub use engine::backend::{AudioBackend, BackendError, BackendResult, NullBackend, OscBackend};
pub use engine::{AudioGraph, NodeKind};
pub use harmonic::{map_step, HarmonicInput, HarmonicNote};
pub use voice_state::{ArpState, VoiceState};
