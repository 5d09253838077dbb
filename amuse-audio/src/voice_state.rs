use amuse_types::MusicalKey;

/// Scale-degree walk played by the arpeggiator.
pub const ARP_PATTERN: [usize; 8] = [0, 2, 4, 2, 4, 6, 4, 2];

/// Arpeggiator play state, advanced once per sub-step while enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpState {
    /// Position in `ARP_PATTERN`
    pub index: usize,
    /// Sub-steps since the last advance
    pub tick: u32,
}

impl ArpState {
    /// Count one sub-step at `speed` (1..=20) and return the current scale
    /// degree. The pattern advances once the counter reaches `21 - speed`.
    pub fn step(&mut self, speed: u32) -> usize {
        self.tick += 1;
        if self.tick >= 21u32.saturating_sub(speed) {
            self.tick = 0;
            self.index = (self.index + 1) % ARP_PATTERN.len();
        }
        ARP_PATTERN[self.index]
    }
}

/// Harmonic state owned by the engine across ticks.
#[derive(Debug, Clone)]
pub struct VoiceState {
    /// Copy of the snapshot's key, refreshed whenever the snapshot changes
    pub key: MusicalKey,
    pub arp: ArpState,
    /// Timer-clock seconds of the last ambient chord, `None` before the first
    pub last_chord_at: Option<f64>,
    /// Seconds until the next ambient chord is due
    pub next_chord_interval: f64,
    /// LCG state for the chord timer
    pub rng: u64,
}

impl VoiceState {
    pub fn new(seed: u64) -> Self {
        Self {
            key: MusicalKey::default(),
            arp: ArpState::default(),
            last_chord_at: None,
            next_chord_interval: 0.0,
            rng: seed,
        }
    }

    /// Back to C major with a fresh arpeggiator and chord timer. The RNG
    /// stream continues.
    pub fn reset(&mut self) {
        self.key = MusicalKey::default();
        self.arp = ArpState::default();
        self.last_chord_at = None;
        self.next_chord_interval = 0.0;
    }
}

impl Default for VoiceState {
    fn default() -> Self {
        Self::new(0x5EED_A11E)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amuse_types::Scale;

    #[test]
    fn arp_advances_every_21_minus_speed_steps() {
        let mut arp = ArpState::default();
        // speed 18: advance on every third step
        assert_eq!(arp.step(18), 0);
        assert_eq!(arp.step(18), 0);
        assert_eq!(arp.step(18), 2);
        assert_eq!(arp.tick, 0);
        assert_eq!(arp.index, 1);
    }

    #[test]
    fn arp_wraps_around_the_pattern() {
        let mut arp = ArpState::default();
        let walked: Vec<usize> = (0..8).map(|_| arp.step(20)).collect();
        assert_eq!(walked, vec![2, 4, 2, 4, 6, 4, 2, 0]);
    }

    #[test]
    fn reset_restores_c_major() {
        let mut v = VoiceState::new(1);
        v.key = MusicalKey::new(amuse_types::Key::Fs, Scale::Blues);
        v.arp.index = 5;
        v.last_chord_at = Some(12.0);
        v.reset();
        assert_eq!(v.key, MusicalKey::default());
        assert_eq!(v.arp, ArpState::default());
        assert!(v.last_chord_at.is_none());
    }
}
