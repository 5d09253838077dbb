use serde::{Deserialize, Serialize};

/// Musical key (pitch class)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl Key {
    pub const ALL: [Key; 12] = [
        Key::C,
        Key::Cs,
        Key::D,
        Key::Ds,
        Key::E,
        Key::F,
        Key::Fs,
        Key::G,
        Key::Gs,
        Key::A,
        Key::As,
        Key::B,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Key::C => "C",
            Key::Cs => "C#",
            Key::D => "D",
            Key::Ds => "D#",
            Key::E => "E",
            Key::F => "F",
            Key::Fs => "F#",
            Key::G => "G",
            Key::Gs => "G#",
            Key::A => "A",
            Key::As => "A#",
            Key::B => "B",
        }
    }

    /// Chromatic index, C = 0.
    pub fn semitone(&self) -> i32 {
        match self {
            Key::C => 0,
            Key::Cs => 1,
            Key::D => 2,
            Key::Ds => 3,
            Key::E => 4,
            Key::F => 5,
            Key::Fs => 6,
            Key::G => 7,
            Key::Gs => 8,
            Key::A => 9,
            Key::As => 10,
            Key::B => 11,
        }
    }

    /// Pitch class for any integer, wrapping into 0..12.
    pub fn from_semitone(semitone: i32) -> Key {
        Key::ALL[semitone.rem_euclid(12) as usize]
    }

    /// Frequency of this pitch class in the fourth octave (C4 = 261.63 Hz).
    pub fn base_frequency(&self) -> f64 {
        match self {
            Key::C => 261.63,
            Key::Cs => 277.18,
            Key::D => 293.66,
            Key::Ds => 311.13,
            Key::E => 329.63,
            Key::F => 349.23,
            Key::Fs => 369.99,
            Key::G => 392.00,
            Key::Gs => 415.30,
            Key::A => 440.00,
            Key::As => 466.16,
            Key::B => 493.88,
        }
    }
}

impl Default for Key {
    fn default() -> Self {
        Key::C
    }
}

/// Scale definition as intervals from root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Major,
    Minor,
    Pentatonic,
    Blues,
    Chromatic,
}

impl Scale {
    pub const ALL: [Scale; 5] = [
        Scale::Major,
        Scale::Minor,
        Scale::Pentatonic,
        Scale::Blues,
        Scale::Chromatic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scale::Major => "Major",
            Scale::Minor => "Minor",
            Scale::Pentatonic => "Pentatonic",
            Scale::Blues => "Blues",
            Scale::Chromatic => "Chromatic",
        }
    }

    /// Semitone intervals from root for this scale
    pub fn intervals(&self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }
}

/// The active tonality: a root plus an ordered set of scale degrees.
///
/// Degree order matters: quantization breaks ties by taking the first
/// degree in iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicalKey {
    pub root: Key,
    pub degrees: Vec<i32>,
}

impl MusicalKey {
    pub fn new(root: Key, scale: Scale) -> Self {
        Self {
            root,
            degrees: scale.intervals().to_vec(),
        }
    }

    /// Snap a raw pitch class (0..12) to the nearest degree of this key.
    ///
    /// Distance is plain semitone difference from the root, not circular,
    /// and an exact tie keeps the earlier degree.
    pub fn quantize(&self, pitch_class: i32) -> i32 {
        let root = self.root.semitone();
        let from_root = (pitch_class - root).rem_euclid(12);
        let mut best = match self.degrees.first() {
            Some(&d) => d,
            None => return pitch_class.rem_euclid(12),
        };
        for &degree in &self.degrees[1..] {
            if (degree - from_root).abs() < (best - from_root).abs() {
                best = degree;
            }
        }
        (root + best).rem_euclid(12)
    }

    /// Pitch class of the given scale degree index, wrapping around the set.
    pub fn degree_pitch(&self, index: usize) -> Key {
        if self.degrees.is_empty() {
            return self.root;
        }
        let degree = self.degrees[index % self.degrees.len()];
        Key::from_semitone(self.root.semitone() + degree)
    }
}

impl Default for MusicalKey {
    fn default() -> Self {
        Self::new(Key::C, Scale::Major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_all_has_12() {
        assert_eq!(Key::ALL.len(), 12);
    }

    #[test]
    fn key_names_unique() {
        let names: HashSet<&str> = Key::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn key_semitones_0_to_11() {
        let semitones: Vec<i32> = Key::ALL.iter().map(|k| k.semitone()).collect();
        assert_eq!(semitones, (0..12).collect::<Vec<i32>>());
    }

    #[test]
    fn from_semitone_wraps() {
        assert_eq!(Key::from_semitone(12), Key::C);
        assert_eq!(Key::from_semitone(-1), Key::B);
        assert_eq!(Key::from_semitone(16), Key::E);
    }

    #[test]
    fn base_frequency_spans_one_octave() {
        assert_eq!(Key::C.base_frequency(), 261.63);
        assert_eq!(Key::A.base_frequency(), 440.0);
        for pair in Key::ALL.windows(2) {
            assert!(pair[0].base_frequency() < pair[1].base_frequency());
        }
    }

    #[test]
    fn quantize_c_sharp_in_c_major_takes_first_tie() {
        let key = MusicalKey::new(Key::C, Scale::Major);
        // C# is one semitone from both C and D; C comes first
        assert_eq!(key.quantize(1), 0);
    }

    #[test]
    fn quantize_keeps_scale_members() {
        let key = MusicalKey::new(Key::C, Scale::Major);
        for &d in Scale::Major.intervals() {
            assert_eq!(key.quantize(d), d);
        }
    }

    #[test]
    fn quantize_is_relative_to_root() {
        let key = MusicalKey::new(Key::D, Scale::Major);
        // D# → one above D (degree 0) and one below E (degree 2): tie → D
        assert_eq!(key.quantize(3), 2);
        // G# is 6 above D; degrees 5 (G) and 7 (A) tie → G
        assert_eq!(key.quantize(8), 7);
    }

    #[test]
    fn quantize_chromatic_is_identity() {
        let key = MusicalKey::new(Key::F, Scale::Chromatic);
        for pc in 0..12 {
            assert_eq!(key.quantize(pc), pc);
        }
    }

    #[test]
    fn degree_pitch_wraps() {
        let key = MusicalKey::new(Key::C, Scale::Pentatonic);
        assert_eq!(key.degree_pitch(0), Key::C);
        assert_eq!(key.degree_pitch(1), Key::Ds);
        assert_eq!(key.degree_pitch(5), Key::C);
    }
}
