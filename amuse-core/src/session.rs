//! Run lifecycle around the engine state.
//!
//! A [`Session`] plays the parameter store (it owns the current
//! [`Configuration`] and hands a snapshot to every tick), owns the engine
//! state, and forwards audio instructions to an optional [`AudioGraph`].

use std::io::{self, Write};

use amuse_audio::{build_voicing, poll_ambient_chord, AudioGraph};
use amuse_types::{ChordRequest, Configuration, Key, Point};

use crate::config::Config;
use crate::driver::{tick, Canvas, EngineLimits, EngineState, TickInput, TickOutput};
use crate::randomize::{randomize, RandomKind};

pub struct Session {
    config: Configuration,
    state: EngineState,
    canvas: Canvas,
    audio: Option<AudioGraph>,
    rng: u64,
}

impl Session {
    pub fn new(canvas: Canvas, limits: EngineLimits) -> Self {
        Self {
            config: Configuration::default(),
            state: EngineState::new(limits),
            canvas,
            audio: None,
            rng: 0xA11E_5EED,
        }
    }

    /// Session sized and limited by the application config, starting in
    /// its configured key.
    pub fn from_config(app: &Config) -> Self {
        let mut session = Self::new(app.canvas(), app.limits());
        session.config.key = app.musical_key();
        session.state.voice.key = session.config.key.clone();
        session
    }

    pub fn with_audio(mut self, graph: AudioGraph) -> Self {
        self.audio = Some(graph);
        self
    }

    /// Seed every random stream (randomizer, particles, chord timer).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seed;
        self.state.seed(seed.rotate_left(17));
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Replace the parameter snapshot. Takes effect from the next tick,
    /// except the key, which chords pick up at once.
    pub fn set_config(&mut self, config: Configuration) {
        let sound_was_on = self.config.sound_enabled;
        self.config = config;
        self.state.voice.key = self.config.key.clone();
        if let Some(graph) = self.audio.as_mut() {
            if !self.config.sound_enabled {
                if sound_was_on {
                    graph.silence_melody();
                }
            } else {
                if self.state.running {
                    graph.build(&self.config.synth);
                }
                graph.sync_synth(&self.config.synth);
            }
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn audio(&self) -> Option<&AudioGraph> {
        self.audio.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn cycle_progress(&self) -> Option<f64> {
        self.state.cycle_progress()
    }

    /// Restart progress tracking from the current pen position and run.
    pub fn start_new_run(&mut self) {
        if self.config.sound_enabled {
            if let Some(graph) = self.audio.as_mut() {
                graph.build(&self.config.synth);
                graph.sync_synth(&self.config.synth);
            }
        }
        self.state.begin_run(&self.config);
        log::info!(
            target: "session",
            "run started, cycle target {}",
            self.state
                .cycle_target
                .map_or_else(|| "unbounded".to_string(), |t| format!("{:.2} rad", t))
        );
    }

    /// Pause a running session, or resume a paused one. A run that already
    /// covered its cycle starts over instead of resuming. Returns the new
    /// running flag.
    pub fn toggle(&mut self) -> bool {
        if self.state.running {
            self.stop();
        } else if self.state.is_finished(&self.config) {
            self.start_new_run();
        } else {
            self.state.running = true;
            log::info!(target: "session", "run resumed at frame {}", self.state.frame);
        }
        self.state.running
    }

    pub fn stop(&mut self) {
        if self.state.running {
            log::info!(target: "session", "run stopped at frame {}", self.state.frame);
        }
        self.state.running = false;
        self.silence();
    }

    /// Wipe the drawing and stop.
    pub fn clear(&mut self) {
        self.state.clear();
        self.silence();
        log::debug!(target: "session", "canvas cleared");
    }

    /// Everything back to defaults, including the parameters and the audio
    /// graph.
    pub fn reset(&mut self) {
        self.state.reset();
        self.config = Configuration::default();
        if let Some(graph) = self.audio.as_mut() {
            if graph.is_built() {
                graph.rebuild(&self.config.synth);
            }
        }
        log::info!(target: "session", "session reset");
    }

    pub fn redraw(&mut self) {
        self.clear();
        self.start_new_run();
    }

    /// Clear and replace the parameters with a random configuration.
    pub fn randomize(&mut self, kind: RandomKind) {
        self.clear();
        let next = randomize(&self.config, kind, &mut self.rng);
        log::debug!(
            target: "session",
            "randomized ({:?}): rpm {:.3}/{:.3}/{:.3}",
            kind,
            next.rotor_rpm,
            next.lrpm,
            next.rrpm
        );
        self.set_config(next);
    }

    /// Advance one tick and deliver its melody to the audio graph.
    pub fn tick(&mut self, pointer: Option<Point>, timestamp: f64) -> TickOutput {
        let input = TickInput {
            timestamp,
            pointer,
            canvas: self.canvas,
        };
        let out = tick(&mut self.state, &self.config, &input);

        if let Some(graph) = self.audio.as_mut() {
            if self.config.sound_enabled {
                // every ramp cancels the one before it, so only the last
                // of the tick is audible
                if let Some(ramp) = out.ramps.last() {
                    graph.apply_melody(ramp, &self.config.synth);
                }
            }
            if out.run_complete || out.frame_limit_reached {
                graph.silence_melody();
            }
        }
        out
    }

    /// Fire the ambient chord timer. Returns the chord if one was sounded.
    pub fn poll_chords(&mut self, now: f64) -> Option<ChordRequest> {
        if !self.config.sound_enabled || !self.state.running {
            return None;
        }
        let graph = self.audio.as_mut().filter(|g| g.is_live())?;
        let request = poll_ambient_chord(&mut self.state.voice, now, &self.config.synth)?;
        graph.play_chord(&request);
        Some(request)
    }

    /// Sound a chord on demand. `false` when sound is off or the graph is
    /// not live.
    pub fn play_note(&mut self, note: Key, octave: i32) -> bool {
        if !self.config.sound_enabled {
            return false;
        }
        let Some(graph) = self.audio.as_mut() else {
            return false;
        };
        let request = ChordRequest {
            note,
            octave,
            voicing: build_voicing(note, octave, &self.config.synth),
        };
        graph.play_chord(&request)
    }

    /// Write the stored segments as SVG at canvas size.
    pub fn export_svg<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.state.segments.write_svg(
            out,
            self.canvas.width.round() as u32,
            self.canvas.height.round() as u32,
        )
    }

    fn silence(&mut self) {
        if let Some(graph) = self.audio.as_mut() {
            graph.silence_melody();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amuse_audio::engine::backend::{SharedTestBackend, TestBackend, TestOp};
    use amuse_types::{MusicalKey, Scale};
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(Canvas::default(), EngineLimits::default())
    }

    fn sounding() -> (Session, Arc<TestBackend>) {
        let backend = Arc::new(TestBackend::new());
        let graph = AudioGraph::new(Box::new(SharedTestBackend(backend.clone())));
        let mut s = session().with_audio(graph);
        s.set_config(Configuration {
            sound_enabled: true,
            acceleration: 5,
            ..Configuration::default()
        });
        (s, backend)
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let mut s = session();
        s.start_new_run();
        s.tick(None, 0.0);
        assert!(!s.toggle());
        let frame = s.state().frame;
        s.tick(None, 0.0);
        assert_eq!(s.state().frame, frame);
        assert!(s.toggle());
        // resumed, not restarted
        assert!(s.state().progress > 0.0);
    }

    #[test]
    fn toggle_restarts_a_finished_run() {
        let mut s = session();
        s.start_new_run();
        s.stop();
        s.state.progress = s.state.cycle_target.unwrap();
        assert!(s.toggle());
        assert_eq!(s.state().progress, 0.0);
    }

    #[test]
    fn clear_stops_and_forgets() {
        let mut s = session();
        s.start_new_run();
        s.tick(None, 0.0);
        s.tick(None, 0.0);
        assert!(!s.state().segments.is_empty());
        s.clear();
        assert!(!s.is_running());
        assert!(s.state().segments.is_empty());
        assert_eq!(s.state().cursor, None);
        assert_eq!(s.state().frame, 0);
    }

    #[test]
    fn reset_restores_default_parameters() {
        let mut s = session();
        s.set_config(Configuration {
            lrpm: 9.0,
            ..Configuration::default()
        });
        s.state.evolution = 3.0;
        s.reset();
        assert_eq!(s.config(), &Configuration::default());
        assert_eq!(s.state().evolution, 0.0);
    }

    #[test]
    fn reset_rebuilds_a_built_graph() {
        use amuse_audio::engine::{NODE_FEEDBACK, NODE_MELODY_GAIN};

        let (mut s, backend) = sounding();
        s.start_new_run();
        s.tick(None, 0.0);
        backend.clear();
        s.reset();

        let ops = backend.operations();
        assert!(matches!(&ops[0], TestOp::Cancel { node_id, .. } if node_id.get() == NODE_MELODY_GAIN));
        assert!(matches!(&ops[1], TestOp::SetParam { node_id, value, .. }
            if node_id.get() == NODE_MELODY_GAIN && *value == 0.0));
        assert!(matches!(&ops[2], TestOp::SetParam { node_id, value, .. }
            if node_id.get() == NODE_FEEDBACK && *value == 0.0));

        let close = ops.iter().position(|op| *op == TestOp::Close).unwrap();
        let open = ops.iter().position(|op| *op == TestOp::Open).unwrap();
        let last_disconnect = ops.iter().rposition(|op| matches!(op, TestOp::Disconnect(_))).unwrap();
        assert!(last_disconnect < close);
        assert!(close < open);
        let rebuilt = &ops[open..];
        assert_eq!(rebuilt.iter().filter(|op| matches!(op, TestOp::CreateNode { .. })).count(), 13);
        // nothing from the old run is scheduled on the new graph
        assert!(!rebuilt.iter().any(|op| matches!(op, TestOp::Ramp { .. })));

        let graph = s.audio().unwrap();
        assert!(graph.is_live());
        assert!(!graph.has_pending());
        assert!(!s.is_running());
    }

    #[test]
    fn reset_leaves_an_unbuilt_graph_alone() {
        let (mut s, backend) = sounding();
        s.reset();
        assert!(backend.operations().is_empty());
        assert!(!s.audio().unwrap().is_built());
    }

    #[test]
    fn snapshot_key_drives_the_voice() {
        let mut s = session();
        let key = MusicalKey::new(Key::D, Scale::Pentatonic);
        s.set_config(Configuration {
            key: key.clone(),
            ..Configuration::default()
        });
        assert_eq!(s.state().voice.key, key);

        s.reset();
        assert_eq!(s.config().key, MusicalKey::default());
        assert_eq!(s.state().voice.key, MusicalKey::default());
    }

    #[test]
    fn app_config_key_lands_in_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[music]\nkey = \"G\"\nscale = \"Minor\"\n").unwrap();
        let app = Config::load_from(&path).unwrap();

        let s = Session::from_config(&app);
        assert_eq!(s.config().key, MusicalKey::new(Key::G, Scale::Minor));
        assert_eq!(s.state().voice.key, s.config().key);
    }

    #[test]
    fn redraw_runs_from_scratch() {
        let mut s = session();
        s.start_new_run();
        s.tick(None, 0.0);
        s.redraw();
        assert!(s.is_running());
        assert_eq!(s.state().frame, 0);
        assert!(s.state().segments.is_empty());
    }

    #[test]
    fn randomize_clears_without_starting() {
        let mut s = session().with_seed(11);
        s.start_new_run();
        s.tick(None, 0.0);
        s.randomize(RandomKind::Symmetric);
        assert!(!s.is_running());
        assert_eq!(s.config().symmetry.folds(), 6);
        assert_ne!(s.config().lrpm, 2.0);
    }

    #[test]
    fn start_builds_graph_and_tick_ramps_melody() {
        let (mut s, backend) = sounding();
        s.start_new_run();
        assert!(s.audio().map_or(false, |g| g.is_live()));
        backend.clear();
        let out = s.tick(None, 0.0);
        assert_eq!(out.ramps.len(), 5);
        let ramps = backend.count(|op| matches!(op, TestOp::Ramp { .. }));
        assert_eq!(ramps, 3);
    }

    #[test]
    fn stop_fades_the_melody() {
        let (mut s, backend) = sounding();
        s.start_new_run();
        s.tick(None, 0.0);
        backend.clear();
        s.stop();
        let fade = backend.find(|op| matches!(op, TestOp::Ramp { target, .. } if *target == 0.0));
        assert!(fade.is_some());
    }

    #[test]
    fn chords_need_sound_and_a_run() {
        let (mut s, _backend) = sounding();
        assert!(s.poll_chords(0.0).is_none());
        s.start_new_run();
        assert!(s.poll_chords(0.0).is_some());
        assert!(s.poll_chords(1.0).is_none());
        assert!(s.poll_chords(9.0).is_some());
    }

    #[test]
    fn play_note_requires_live_graph() {
        let (mut s, _backend) = sounding();
        assert!(!s.play_note(Key::A, 4));
        s.start_new_run();
        assert!(s.play_note(Key::A, 4));
        let mut silent = session();
        assert!(!silent.play_note(Key::A, 4));
    }

    #[test]
    fn svg_export_uses_canvas_size() {
        let mut s = Session::new(Canvas::new(640.0, 480.0), EngineLimits::default());
        s.start_new_run();
        s.tick(None, 0.0);
        let mut buf = Vec::new();
        s.export_svg(&mut buf).unwrap();
        let svg = String::from_utf8(buf).unwrap();
        assert!(svg.contains(r#"width="640" height="480""#));
        assert_eq!(svg.matches("<line ").count(), s.state().segments.len());
    }
}
