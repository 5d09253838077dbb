use amuse_types::Point;

/// Frames that must pass after arming before closure is tested.
pub const SETTLE_FRAMES: u64 = 300;
/// Squared distance under which the pen counts as back at its start.
pub const CLOSURE_TOLERANCE_SQ: f64 = 16.0;

/// Detects the trace returning to where the run began.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosureProbe {
    anchor: Option<(Point, u64)>,
}

impl ClosureProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor(&self) -> Option<(Point, u64)> {
        self.anchor
    }

    pub fn clear(&mut self) {
        self.anchor = None;
    }

    /// Feed one pen position seen during `frame`. The first call after a
    /// clear records the anchor. Returns `true` once, when the pen is back
    /// within tolerance after the settling period; the probe is then cleared.
    pub fn observe(&mut self, pen: Point, frame: u64) -> bool {
        let (start, start_frame) = match self.anchor {
            None => {
                self.anchor = Some((pen, frame));
                return false;
            }
            Some(a) => a,
        };
        if frame <= start_frame + SETTLE_FRAMES {
            return false;
        }
        if pen.dist_sq(start) < CLOSURE_TOLERANCE_SQ {
            self.anchor = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_arms() {
        let mut probe = ClosureProbe::new();
        assert!(!probe.observe(Point::new(3.0, 4.0), 7));
        assert_eq!(probe.anchor(), Some((Point::new(3.0, 4.0), 7)));
    }

    #[test]
    fn settling_period_suppresses_early_closure() {
        let mut probe = ClosureProbe::new();
        let start = Point::new(10.0, 10.0);
        probe.observe(start, 0);
        for frame in 1..=300 {
            assert!(!probe.observe(start, frame), "fired early at {}", frame);
        }
        assert!(probe.observe(start, 301));
        assert!(!probe.is_armed());
    }

    #[test]
    fn tolerance_is_strict() {
        let mut probe = ClosureProbe::new();
        probe.observe(Point::new(0.0, 0.0), 0);
        assert!(!probe.observe(Point::new(4.0, 0.0), 400));
        assert!(probe.observe(Point::new(3.9, 0.0), 401));
    }
}
