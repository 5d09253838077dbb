pub mod backend;
pub(crate) mod node_registry;

use amuse_types::{ChordRequest, MelodyRamp, NodeId, SynthParams, Waveform};

use backend::{AudioBackend, BackendResult, RampCurve};
use node_registry::NodeRegistry;

// Fixed node ids for the persistent graph. Chord layers are allocated from
// CHORD_LAYER_BASE upwards.
pub const NODE_DESTINATION: i32 = 0;
pub const NODE_MELODY_OSC: i32 = 1;
pub const NODE_MELODY_GAIN: i32 = 2;
pub const NODE_PANNER: i32 = 3;
pub const NODE_DELAY: i32 = 4;
pub const NODE_FEEDBACK: i32 = 5;
pub const NODE_FILTER: i32 = 6;
pub const NODE_DRIVE: i32 = 7;
pub const NODE_MASTER_VOL: i32 = 8;
pub const NODE_REVERB: i32 = 9;
pub const NODE_REVERB_GAIN: i32 = 10;
pub const NODE_LFO: i32 = 11;
pub const NODE_LFO_GAIN: i32 = 12;
pub const NODE_CHORD_BUS: i32 = 13;
pub const CHORD_LAYER_BASE: i32 = 1000;

/// Output level of the master stage.
pub const MASTER_VOLUME: f32 = 0.8;
/// Glide used when live synth settings change.
pub const SYNC_GLIDE_SECS: f64 = 0.1;
/// Faster glide for the master filter.
pub const FILTER_GLIDE_SECS: f64 = 0.05;
/// Fade applied when the melody is silenced on stop.
pub const SILENCE_FADE_SECS: f64 = 0.1;
/// Lowest frequency an exponential ramp may target.
pub const MIN_RAMP_FREQ: f64 = 20.0;
/// Samples in the drive transfer curve.
pub const DRIVE_CURVE_LEN: usize = 44_100;

/// Disconnect order used by teardown. Gain stages go first so nothing can
/// keep sounding through a half-dismantled graph.
const TEARDOWN_ORDER: [i32; 13] = [
    NODE_MELODY_GAIN,
    NODE_FEEDBACK,
    NODE_DELAY,
    NODE_REVERB,
    NODE_REVERB_GAIN,
    NODE_FILTER,
    NODE_DRIVE,
    NODE_PANNER,
    NODE_LFO,
    NODE_LFO_GAIN,
    NODE_CHORD_BUS,
    NODE_MASTER_VOL,
    NODE_MELODY_OSC,
];

/// Kind of processing node the sink should instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Oscillator,
    Gain,
    Panner,
    Delay,
    LowPass,
    WaveShaper,
    Reverb,
    /// Self-contained oscillator + gain + panner for one chord layer
    ChordLayer,
}

impl NodeKind {
    /// Definition name understood by the synthesis server.
    pub fn def_name(&self) -> &'static str {
        match self {
            NodeKind::Oscillator => "amuse_osc",
            NodeKind::Gain => "amuse_gain",
            NodeKind::Panner => "amuse_pan",
            NodeKind::Delay => "amuse_delay",
            NodeKind::LowPass => "amuse_lpf",
            NodeKind::WaveShaper => "amuse_shaper",
            NodeKind::Reverb => "amuse_reverb",
            NodeKind::ChordLayer => "amuse_chord_layer",
        }
    }
}

fn node(id: i32) -> NodeId {
    NodeId::new(id)
}

fn params(pairs: &[(&str, f64)]) -> Vec<(String, f32)> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v as f32)).collect()
}

/// Wave-shaper transfer curve for drive amount `k`.
pub fn drive_curve(k: f64) -> Vec<f32> {
    let deg = std::f64::consts::PI / 180.0;
    let n = DRIVE_CURVE_LEN as f64;
    (0..DRIVE_CURVE_LEN)
        .map(|i| {
            let x = (i as f64 * 2.0) / n - 1.0;
            ((3.0 + k) * x * 20.0 * deg / (std::f64::consts::PI + k * x.abs())) as f32
        })
        .collect()
}

/// The melody/effects/chord node graph with an explicit acquire/release
/// lifecycle.
///
/// Every public method is infallible: backend errors are logged under the
/// `audio::graph` target and the graph falls back to "not built", so the
/// frame loop never sees an audio failure.
pub struct AudioGraph {
    backend: Box<dyn AudioBackend>,
    registry: NodeRegistry,
    built: bool,
    /// Melody ramp that could not be delivered even after a rebuild.
    pending: Option<MelodyRamp>,
    next_layer_id: i32,
    /// Last values pushed by `sync_synth`, to skip redundant updates.
    applied_waveform: Option<Waveform>,
    applied_drive: Option<f64>,
    recoveries: u32,
}

impl AudioGraph {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self {
            backend,
            registry: NodeRegistry::new(),
            built: false,
            pending: None,
            next_layer_id: CHORD_LAYER_BASE,
            applied_waveform: None,
            applied_drive: None,
            recoveries: 0,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Built and the sink's render clock is running.
    pub fn is_live(&self) -> bool {
        self.built && self.backend.is_running()
    }

    /// Number of times a not-running output path forced a rebuild.
    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn live_node_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Acquire the output context and construct the full node graph.
    /// No-op when already built.
    pub fn build(&mut self, synth: &SynthParams) {
        if self.built {
            return;
        }
        match self.try_build(synth) {
            Ok(()) => {
                self.built = true;
                log::info!(
                    target: "audio::graph",
                    "audio graph built ({} nodes)",
                    self.registry.live_count()
                );
            }
            Err(e) => {
                log::error!(target: "audio::graph", "audio graph build failed: {}", e);
                self.registry.invalidate_all();
                let _ = self.backend.close();
            }
        }
    }

    fn try_build(&mut self, synth: &SynthParams) -> BackendResult {
        let b = &self.backend;
        b.open()?;

        let nodes: [(i32, NodeKind, Vec<(String, f32)>); 13] = [
            (NODE_MELODY_OSC, NodeKind::Oscillator, params(&[("frequency", 440.0)])),
            (NODE_MELODY_GAIN, NodeKind::Gain, params(&[("gain", synth.melody_volume)])),
            (NODE_PANNER, NodeKind::Panner, params(&[("pan", 0.0)])),
            (NODE_DELAY, NodeKind::Delay, params(&[("delay_time", synth.delay)])),
            (NODE_FEEDBACK, NodeKind::Gain, params(&[("gain", synth.feedback)])),
            (
                NODE_FILTER,
                NodeKind::LowPass,
                params(&[("frequency", synth.cutoff), ("q", synth.resonance)]),
            ),
            (NODE_DRIVE, NodeKind::WaveShaper, Vec::new()),
            (NODE_MASTER_VOL, NodeKind::Gain, params(&[("gain", MASTER_VOLUME as f64)])),
            (NODE_REVERB, NodeKind::Reverb, params(&[("length", 3.0), ("decay", 1.5)])),
            (NODE_REVERB_GAIN, NodeKind::Gain, params(&[("gain", synth.reverb)])),
            (NODE_LFO, NodeKind::Oscillator, params(&[("frequency", synth.lfo_rate)])),
            (NODE_LFO_GAIN, NodeKind::Gain, params(&[("gain", synth.lfo_depth)])),
            (NODE_CHORD_BUS, NodeKind::Gain, params(&[("gain", synth.chord_volume)])),
        ];
        for (id, kind, initial) in &nodes {
            b.create_node(node(*id), *kind, initial)?;
            self.registry.register(node(*id));
        }

        b.set_waveform(node(NODE_MELODY_OSC), synth.waveform)?;
        b.set_waveform(node(NODE_LFO), Waveform::Sine)?;
        b.set_curve(node(NODE_DRIVE), &drive_curve(synth.drive))?;

        // Master chain: filter -> drive -> volume -> out
        b.connect(node(NODE_FILTER), node(NODE_DRIVE))?;
        b.connect(node(NODE_DRIVE), node(NODE_MASTER_VOL))?;
        b.connect(node(NODE_MASTER_VOL), node(NODE_DESTINATION))?;

        // Melody: osc -> gain -> panner -> out, with the panner feeding the delay loop
        b.connect(node(NODE_MELODY_OSC), node(NODE_MELODY_GAIN))?;
        b.connect(node(NODE_MELODY_GAIN), node(NODE_PANNER))?;
        b.connect(node(NODE_PANNER), node(NODE_DESTINATION))?;
        b.connect(node(NODE_PANNER), node(NODE_DELAY))?;
        b.connect(node(NODE_DELAY), node(NODE_FEEDBACK))?;
        b.connect(node(NODE_FEEDBACK), node(NODE_DELAY))?;
        b.connect(node(NODE_DELAY), node(NODE_DESTINATION))?;

        // Tremolo
        b.connect(node(NODE_LFO), node(NODE_LFO_GAIN))?;
        b.connect_param(node(NODE_LFO_GAIN), node(NODE_MELODY_GAIN), "gain")?;

        // Sends from the master filter
        b.connect(node(NODE_FILTER), node(NODE_REVERB))?;
        b.connect(node(NODE_REVERB), node(NODE_REVERB_GAIN))?;
        b.connect(node(NODE_REVERB_GAIN), node(NODE_DESTINATION))?;
        b.connect(node(NODE_FILTER), node(NODE_DELAY))?;

        b.connect(node(NODE_CHORD_BUS), node(NODE_FILTER))?;

        let now = b.current_time();
        b.start_node(node(NODE_LFO), now)?;
        b.start_node(node(NODE_MELODY_OSC), now)?;

        self.applied_waveform = Some(synth.waveform);
        self.applied_drive = Some(synth.drive);
        Ok(())
    }

    /// Release the graph: silence the melody and the feedback loop, disconnect
    /// every node, stop the sources, then close the context. Each step is
    /// attempted even if an earlier one failed.
    pub fn teardown(&mut self) {
        if !self.built {
            return;
        }
        let b = &self.backend;
        let now = b.current_time();
        let gain = node(NODE_MELODY_GAIN);
        let steps: Vec<(&str, BackendResult)> = vec![
            ("cancel melody gain", b.cancel_scheduled(gain, "gain", now)),
            ("silence melody gain", b.set_param(gain, "gain", 0.0, now)),
            (
                "silence feedback",
                b.set_param(node(NODE_FEEDBACK), "gain", 0.0, now),
            ),
        ];
        let mut failures = steps
            .into_iter()
            .filter_map(|(what, r)| r.err().map(|e| (what, e)))
            .collect::<Vec<_>>();

        for id in TEARDOWN_ORDER {
            if let Err(e) = b.disconnect(node(id)) {
                failures.push(("disconnect", e));
            }
        }
        for id in self.registry.transient_ids() {
            if let Err(e) = b.disconnect(id) {
                failures.push(("disconnect chord layer", e));
            }
        }
        for id in [NODE_MELODY_OSC, NODE_LFO] {
            if let Err(e) = b.stop_node(node(id), now) {
                failures.push(("stop", e));
            }
        }
        if let Err(e) = b.close() {
            failures.push(("close", e));
        }

        for (what, e) in &failures {
            log::warn!(target: "audio::graph", "teardown: {} failed: {}", what, e);
        }
        self.registry.invalidate_all();
        self.built = false;
        self.pending = None;
        self.applied_waveform = None;
        self.applied_drive = None;
        log::info!(target: "audio::graph", "audio graph torn down");
    }

    /// Tear down and reconstruct so no scheduled ramp or feedback survives.
    pub fn rebuild(&mut self, synth: &SynthParams) {
        self.teardown();
        self.build(synth);
    }

    /// Schedule one melody step.
    ///
    /// If the output path is found not running, or stops while the ramp is
    /// being sent, the graph is rebuilt and the ramp is sent again on the
    /// fresh graph. A ramp is only kept pending when that rebuild fails too;
    /// the next call supersedes it.
    pub fn apply_melody(&mut self, ramp: &MelodyRamp, synth: &SynthParams) {
        if self.pending.take().is_some() {
            log::debug!(target: "audio", "dropping superseded melody ramp");
        }
        if self.is_live() {
            match self.send_melody(ramp) {
                Ok(()) => return,
                Err(e) if self.is_live() => {
                    log::warn!(target: "audio", "melody ramp failed: {}", e);
                    self.pending = Some(*ramp);
                    return;
                }
                Err(e) => log::warn!(target: "audio", "melody ramp failed, output lost: {}", e),
            }
        }

        log::warn!(target: "audio", "audio path not running; reinitializing");
        self.recoveries += 1;
        self.rebuild(synth);
        if !self.is_live() {
            self.pending = Some(*ramp);
            return;
        }
        if let Err(e) = self.send_melody(ramp) {
            log::warn!(target: "audio", "melody ramp failed after rebuild: {}", e);
            self.pending = Some(*ramp);
        }
    }

    fn send_melody(&self, ramp: &MelodyRamp) -> BackendResult {
        let b = &self.backend;
        let now = b.current_time();
        let end = now + ramp.ramp_ms / 1000.0;

        let osc = node(NODE_MELODY_OSC);
        b.cancel_scheduled(osc, "frequency", now)?;
        b.ramp_param(
            osc,
            "frequency",
            ramp.frequency.max(MIN_RAMP_FREQ) as f32,
            RampCurve::Exponential,
            now,
            end,
        )?;

        let pan = node(NODE_PANNER);
        b.cancel_scheduled(pan, "pan", now)?;
        b.ramp_param(
            pan,
            "pan",
            ramp.pan.clamp(-1.0, 1.0) as f32,
            RampCurve::Linear,
            now,
            end,
        )?;

        let gain = node(NODE_MELODY_GAIN);
        b.cancel_scheduled(gain, "gain", now)?;
        b.ramp_param(
            gain,
            "gain",
            ramp.gain.max(0.0) as f32,
            RampCurve::Linear,
            now,
            end,
        )
    }

    /// Fade the melody voice out. Used when a run stops or sound is disabled.
    pub fn silence_melody(&mut self) {
        self.pending = None;
        if !self.is_live() {
            return;
        }
        let b = &self.backend;
        let now = b.current_time();
        let gain = node(NODE_MELODY_GAIN);
        let result = b
            .cancel_scheduled(gain, "gain", now)
            .and_then(|_| b.ramp_param(gain, "gain", 0.0, RampCurve::Linear, now, now + SILENCE_FADE_SECS));
        if let Err(e) = result {
            log::warn!(target: "audio", "silencing melody failed: {}", e);
        }
    }

    /// Glide the effect and volume settings to the snapshot's values.
    pub fn sync_synth(&mut self, synth: &SynthParams) {
        if !self.is_live() {
            return;
        }
        if let Err(e) = self.try_sync(synth) {
            log::warn!(target: "audio::graph", "synth sync failed: {}", e);
        }
    }

    fn try_sync(&mut self, synth: &SynthParams) -> BackendResult {
        let b = &self.backend;
        let now = b.current_time();
        let glides: [(i32, &str, f64, f64); 9] = [
            (NODE_DELAY, "delay_time", synth.delay, SYNC_GLIDE_SECS),
            (NODE_FEEDBACK, "gain", synth.feedback, SYNC_GLIDE_SECS),
            (NODE_REVERB_GAIN, "gain", synth.reverb, SYNC_GLIDE_SECS),
            (NODE_LFO, "frequency", synth.lfo_rate, SYNC_GLIDE_SECS),
            (NODE_LFO_GAIN, "gain", synth.lfo_depth, SYNC_GLIDE_SECS),
            (NODE_MELODY_GAIN, "gain", synth.melody_volume, SYNC_GLIDE_SECS),
            (NODE_CHORD_BUS, "gain", synth.chord_volume, SYNC_GLIDE_SECS),
            (NODE_FILTER, "frequency", synth.cutoff, FILTER_GLIDE_SECS),
            (NODE_FILTER, "q", synth.resonance, FILTER_GLIDE_SECS),
        ];
        for (id, param, value, glide) in glides {
            b.ramp_param(node(id), param, value as f32, RampCurve::Linear, now, now + glide)?;
        }

        if self.applied_waveform != Some(synth.waveform) {
            b.set_waveform(node(NODE_MELODY_OSC), synth.waveform)?;
            self.applied_waveform = Some(synth.waveform);
        }
        if self.applied_drive != Some(synth.drive) {
            b.set_curve(node(NODE_DRIVE), &drive_curve(synth.drive))?;
            self.applied_drive = Some(synth.drive);
        }
        Ok(())
    }

    /// Sound a chord through the chord bus. Returns `false` when the graph is
    /// not live and nothing was scheduled.
    pub fn play_chord(&mut self, request: &ChordRequest) -> bool {
        if !self.is_live() {
            return false;
        }
        let now = self.backend.current_time();
        let expired = self.registry.expire(now);
        if expired > 0 {
            log::trace!(target: "audio::graph", "released {} chord layers", expired);
        }
        match self.try_play_chord(request, now) {
            Ok(()) => {
                log::debug!(
                    target: "audio",
                    "chord {}{} ({} layers)",
                    request.note.name(),
                    request.octave,
                    request.voicing.layers.len()
                );
                true
            }
            Err(e) => {
                log::warn!(target: "audio", "chord failed: {}", e);
                false
            }
        }
    }

    fn try_play_chord(&mut self, request: &ChordRequest, now: f64) -> BackendResult {
        let v = &request.voicing;
        let peak_at = now + v.attack_secs;
        let release_at = peak_at + v.sustain_secs;
        let end = now + v.total_secs();

        for layer in &v.layers {
            let id = node(self.next_layer_id);
            self.next_layer_id = self.next_layer_id.wrapping_add(1).max(CHORD_LAYER_BASE);

            let b = &self.backend;
            b.create_node(
                id,
                NodeKind::ChordLayer,
                &params(&[
                    ("frequency", layer.freq),
                    ("detune", layer.detune_cents),
                    ("pan", layer.pan),
                    ("gain", 0.0),
                ]),
            )?;
            b.set_waveform(id, layer.waveform)?;
            b.ramp_param(id, "gain", layer.gain as f32, RampCurve::Linear, now, peak_at)?;
            b.set_param(id, "gain", layer.gain as f32, release_at)?;
            b.ramp_param(id, "gain", 0.001, RampCurve::Exponential, release_at, end)?;
            b.connect(id, node(NODE_CHORD_BUS))?;
            b.start_node(id, now)?;
            b.stop_node(id, end)?;
            self.registry.register_transient(id, end);
        }
        Ok(())
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}
