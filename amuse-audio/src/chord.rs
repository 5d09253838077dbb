use amuse_types::rng;
use amuse_types::{ChordLayer, ChordRequest, ChordVoicing, Key, SynthParams, Waveform};

use crate::harmonic::note_frequency;
use crate::voice_state::VoiceState;

pub const CHORD_ATTACK_SECS: f64 = 0.5;
pub const CHORD_SUSTAIN_SECS: f64 = 1.0;
pub const CHORD_RELEASE_SECS: f64 = 1.5;

/// Ambient chords are spaced by a random interval in this range.
pub const CHORD_INTERVAL_MIN_SECS: f64 = 6.0;
pub const CHORD_INTERVAL_MAX_SECS: f64 = 8.0;

const SUB_GAIN: f64 = 0.08;
const TONE_GAIN: f64 = 0.15;
const TONE_DETUNE_CENTS: f64 = 5.0;
const SHIMMER_GAIN: f64 = 0.02;
const SHIMMER_DETUNE_CENTS: f64 = 10.0;
const SHIMMER_PAN: f64 = 0.2;

/// Semitone intervals of the chord quality assigned to each root.
pub fn chord_intervals(note: Key) -> &'static [f64] {
    const MAJOR: &[f64] = &[0.0, 4.0, 7.0];
    const MINOR: &[f64] = &[0.0, 3.0, 7.0];
    const SUS2: &[f64] = &[0.0, 2.0, 7.0];
    const SUS4: &[f64] = &[0.0, 5.0, 7.0];
    const MAJ7: &[f64] = &[0.0, 4.0, 7.0, 11.0];
    const MIN7: &[f64] = &[0.0, 3.0, 7.0, 10.0];
    const DOM7: &[f64] = &[0.0, 4.0, 7.0, 10.0];
    const ADD9: &[f64] = &[0.0, 4.0, 7.0, 14.0];
    const MIN9: &[f64] = &[0.0, 3.0, 7.0, 10.0, 14.0];

    match note {
        Key::C => MAJ7,
        Key::Cs => DOM7,
        Key::D => SUS2,
        Key::Ds => MIN7,
        Key::E => MIN9,
        Key::F => MAJOR,
        Key::Fs => SUS4,
        Key::G => ADD9,
        Key::Gs => MIN7,
        Key::A => MIN7,
        Key::As => DOM7,
        Key::B => MINOR,
    }
}

/// Voice a chord on `note`: a sub-octave layer, two detuned layers per chord
/// tone panned apart, and a quiet shimmer an octave above the root.
///
/// The root never sits above octave 3. `complexity` stretches the intervals.
pub fn build_voicing(note: Key, octave: i32, synth: &SynthParams) -> ChordVoicing {
    let root = note_frequency(note, octave.min(3), synth.transpose);
    let tones: Vec<f64> = chord_intervals(note)
        .iter()
        .map(|semis| root * 2f64.powf(semis * synth.complexity / 12.0))
        .collect();
    let n = tones.len() as f64;

    let mut layers = Vec::with_capacity(tones.len() * 2 + 2);
    layers.push(ChordLayer {
        freq: root * 0.5,
        gain: SUB_GAIN,
        detune_cents: 0.0,
        waveform: Waveform::Triangle,
        pan: 0.0,
    });

    for (i, &freq) in tones.iter().enumerate() {
        let side = if i % 2 == 0 { -0.5 } else { 0.5 };
        let pan = side * (i as f64 / n);
        let gain = TONE_GAIN / n;
        for (detune, p) in [(TONE_DETUNE_CENTS, pan), (-TONE_DETUNE_CENTS, -pan)] {
            layers.push(ChordLayer {
                freq,
                gain,
                detune_cents: detune,
                waveform: Waveform::Sine,
                pan: p,
            });
        }
        if i == 0 {
            layers.push(ChordLayer {
                freq: freq * 2.0,
                gain: SHIMMER_GAIN,
                detune_cents: SHIMMER_DETUNE_CENTS,
                waveform: Waveform::Sine,
                pan: SHIMMER_PAN,
            });
        }
    }

    ChordVoicing {
        layers,
        attack_secs: CHORD_ATTACK_SECS,
        sustain_secs: CHORD_SUSTAIN_SECS,
        release_secs: CHORD_RELEASE_SECS,
    }
}

/// Wall-clock chord timer. Call as often as convenient with the current
/// timer time in seconds; returns a request when a chord is due.
///
/// The first poll fires immediately. Each fire picks a random degree of the
/// current key, octave 3 or 4, and draws the next interval.
pub fn poll_ambient_chord(voice: &mut VoiceState, now: f64, synth: &SynthParams) -> Option<ChordRequest> {
    if let Some(last) = voice.last_chord_at {
        if now - last < voice.next_chord_interval {
            return None;
        }
    }

    let degree = rng::index(&mut voice.rng, voice.key.degrees.len().max(1));
    let note = voice.key.degree_pitch(degree);
    let octave = 3 + rng::index(&mut voice.rng, 2) as i32;

    voice.last_chord_at = Some(now);
    voice.next_chord_interval = rng::range(
        &mut voice.rng,
        CHORD_INTERVAL_MIN_SECS,
        CHORD_INTERVAL_MAX_SECS,
    );
    log::debug!(
        target: "audio",
        "ambient chord {}{}, next in {:.2}s",
        note.name(),
        octave,
        voice.next_chord_interval
    );

    Some(ChordRequest {
        note,
        octave,
        voicing: build_voicing(note, octave, synth),
    })
}
