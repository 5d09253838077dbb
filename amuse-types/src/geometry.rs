use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dist_sq(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn dist(&self, other: Point) -> f64 {
        self.dist_sq(other).sqrt()
    }

    /// Rotate about `center` by `angle` radians.
    #[inline]
    pub fn rotate_about(&self, center: Point, angle: f64) -> Point {
        let (s, c) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point {
            x: center.x + dx * c - dy * s,
            y: center.y + dx * s + dy * c,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Stroke color: 8-bit channels plus a unit-interval alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// CSS `rgba(r,g,b,a)` string.
    pub fn css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }

    /// Same color with a replaced alpha.
    pub fn with_alpha(&self, a: f64) -> Self {
        Self { a, ..*self }
    }
}

/// One drawn stroke as delivered to the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawnSegment {
    pub from: Point,
    pub to: Point,
    pub color: Rgba,
    pub width: f64,
    /// Which rotational copy this is (0 = the traced original)
    pub symmetry_index: u8,
}

/// Stored representative segment for vector export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub color: Rgba,
    pub width: f64,
    /// Fold count in effect when the segment was drawn
    pub symmetry: u8,
}

/// Spark emitted alongside a stroke; simulation is left to the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position relative to the canvas center, before the copy's rotation
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub max_age: f64,
    pub color: Rgba,
    /// Rotation of the symmetry copy that spawned it
    pub angle: f64,
}

/// Joint positions of one solved linkage step, for inspection overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkagePose {
    pub left_hand: Point,
    pub right_hand: Point,
    pub left_joint: Point,
    pub right_joint: Point,
    pub extended: Point,
    pub pen: Point,
    /// Polar angle of the pen about the center, after the rotor
    pub angle: f64,
    /// Distance of the extended tip from the center
    pub radius: f64,
}
