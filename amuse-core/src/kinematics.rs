//! Forward kinematics of the two-hand linkage.
//!
//! Two hands sit `handdist` apart around the base offset. Each turns a first
//! arm; the free ends (joints) are bridged by two second arms that meet at a
//! shared elbow. The right second arm, extended by `rarmext`, carries the pen,
//! and the whole figure is then turned about the canvas center by the rotor.

use std::f64::consts::PI;

use amuse_types::{Configuration, LinkagePose, Point};

/// Degrees to radians.
pub const AM: f64 = PI / 180.0;
/// Floor on the joint-to-joint distance.
pub const MIN_JOINT_DISTANCE: f64 = 0.1;
/// Floor on the second-arm lengths.
pub const MIN_ARM_LENGTH: f64 = 1.0;
/// Floor on the elbow angle before it is used in the law of sines.
pub const MIN_ELBOW_ANGLE: f64 = 0.001;
/// Pointer attraction reaches zero at this distance.
pub const ATTRACTION_RADIUS: f64 = 300.0;
/// Pull at zero distance, as a fraction of the offset to the pointer.
pub const ATTRACTION_STRENGTH: f64 = 0.5;

/// The three rotation accumulators, in degrees. They grow without bound.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rotation {
    pub rotor: f64,
    pub left: f64,
    pub right: f64,
}

/// Arm geometry for one solve. Usually the configuration's values, possibly
/// perturbed for this sub-step only by auto-evolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linkage {
    pub larma: f64,
    pub larm1: f64,
    pub larm2: f64,
    pub rarm1: f64,
    pub rarm2: f64,
    pub rarmext: f64,
    pub handdist: f64,
    pub baseoffsx: f64,
    pub baseoffsy: f64,
}

impl Linkage {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            larma: config.larma,
            larm1: config.larm1,
            larm2: config.larm2,
            rarm1: config.rarm1,
            rarm2: config.rarm2,
            rarmext: config.rarmext,
            handdist: config.handdist,
            baseoffsx: config.baseoffsx,
            baseoffsy: config.baseoffsy,
        }
    }

    /// Geometry drifted by the evolution offset `ev`.
    pub fn evolved(&self, ev: f64) -> Self {
        Self {
            larm2: self.larm2 + (ev * 3.0).sin() * 50.0,
            rarm2: self.rarm2 + (ev * 2.0).cos() * 50.0,
            handdist: self.handdist + (ev * 1.5).sin() * 30.0,
            ..*self
        }
    }
}

/// Which of the two linkage solutions the right second arm follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElbowBranch {
    /// Left second arm is strictly longer
    LeftLonger,
    /// Right second arm is at least as long
    RightLonger,
}

impl ElbowBranch {
    pub fn select(l2: f64, r2: f64) -> Self {
        if l2 > r2 {
            ElbowBranch::LeftLonger
        } else {
            ElbowBranch::RightLonger
        }
    }
}

/// `v` clamped into the domain of `asin`/`acos`.
#[inline]
pub fn unit_clamp(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-1.0, 1.0)
    }
}

/// Solve one step. The returned pose's `pen` is the true kinematic point,
/// before any pointer distortion.
pub fn solve(linkage: &Linkage, rotation: &Rotation, center: Point) -> LinkagePose {
    let hands = Point::new(center.x + linkage.baseoffsx, center.y + linkage.baseoffsy);
    let left_hand = Point::new(hands.x - linkage.handdist / 2.0, hands.y);
    let right_hand = Point::new(hands.x + linkage.handdist / 2.0, hands.y);

    let la = (rotation.left + linkage.larma) * AM;
    let left_joint = Point::new(
        left_hand.x + la.cos() * linkage.larm1,
        left_hand.y + la.sin() * linkage.larm1,
    );
    let ra = rotation.right * AM;
    let right_joint = Point::new(
        right_hand.x + ra.cos() * linkage.rarm1,
        right_hand.y + ra.sin() * linkage.rarm1,
    );

    let dx = right_joint.x - left_joint.x;
    let dy = right_joint.y - left_joint.y;
    let d = (dx * dx + dy * dy).sqrt().max(MIN_JOINT_DISTANCE);

    let r2 = linkage.rarm2.max(MIN_ARM_LENGTH);
    let l2 = linkage.larm2.max(MIN_ARM_LENGTH);

    // Law of cosines for the elbow, then law of sines for the base angles.
    let gamma = unit_clamp((r2 * r2 + l2 * l2 - d * d) / (2.0 * r2 * l2)).acos();
    let sin_gamma = gamma.max(MIN_ELBOW_ANGLE).sin();
    let alpha = unit_clamp(r2 * sin_gamma / d).asin();
    let beta = unit_clamp(l2 * sin_gamma / d).asin();
    let delta = unit_clamp(dy / d).asin();

    let heading = match ElbowBranch::select(l2, r2) {
        ElbowBranch::LeftLonger => PI - ((PI - alpha - gamma) - delta),
        ElbowBranch::RightLonger => PI - (beta - delta),
    };

    let reach = r2 + linkage.rarmext;
    let extended = Point::new(
        right_joint.x + heading.cos() * reach,
        right_joint.y + heading.sin() * reach,
    );

    // Polar form about the center, then the rotor turn.
    let nx = extended.x - center.x;
    let ny = extended.y - center.y;
    let radius = (nx * nx + ny * ny).sqrt();
    let mut angle = if radius == 0.0 {
        0.0
    } else {
        unit_clamp(ny / radius).asin()
    };
    if nx < 0.0 {
        angle = PI - angle;
    }
    angle += rotation.rotor * AM;

    let pen = Point::new(center.x + angle.cos() * radius, center.y + angle.sin() * radius);

    LinkagePose {
        left_hand,
        right_hand,
        left_joint,
        right_joint,
        extended,
        pen,
        angle,
        radius,
    }
}

/// Pull `point` toward `pointer`, linearly weaker with distance and zero at
/// `ATTRACTION_RADIUS`. Display-only.
pub fn attract(point: Point, pointer: Point) -> Point {
    let mdx = pointer.x - point.x;
    let mdy = pointer.y - point.y;
    let dist = (mdx * mdx + mdy * mdy).sqrt();
    if dist >= ATTRACTION_RADIUS {
        return point;
    }
    let force = (1.0 - dist / ATTRACTION_RADIUS) * ATTRACTION_STRENGTH;
    Point::new(point.x + mdx * force, point.y + mdy * force)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Point = Point { x: 1200.0, y: 900.0 };

    fn default_linkage() -> Linkage {
        Linkage::from_config(&Configuration::default())
    }

    #[test]
    fn default_geometry_at_rest_is_finite() {
        let pose = solve(&default_linkage(), &Rotation::default(), CENTER);
        assert!(pose.pen.is_finite());
        assert!(pose.radius > 0.0);
        // without rotor turn the pen is the extended tip
        assert!((pose.pen.x - pose.extended.x).abs() < 1e-9);
        assert!((pose.pen.y - pose.extended.y).abs() < 1e-9);
    }

    #[test]
    fn hands_straddle_the_base_offset() {
        let pose = solve(&default_linkage(), &Rotation::default(), CENTER);
        assert_eq!(pose.left_hand, Point::new(1200.0 - 175.5, 900.0 - 385.0));
        assert_eq!(pose.right_hand, Point::new(1200.0 + 175.5, 900.0 - 385.0));
        assert!((pose.left_joint.dist(pose.left_hand) - 105.0).abs() < 1e-9);
        assert!((pose.right_joint.dist(pose.right_hand) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn rotor_turns_the_pen_about_the_center() {
        let rest = solve(&default_linkage(), &Rotation::default(), CENTER);
        let turned = solve(
            &default_linkage(),
            &Rotation { rotor: 90.0, ..Rotation::default() },
            CENTER,
        );
        assert!((turned.radius - rest.radius).abs() < 1e-9);
        let expected = rest.pen.rotate_about(CENTER, 90.0 * AM);
        assert!(turned.pen.dist(expected) < 1e-6);
    }

    #[test]
    fn branch_follows_the_longer_second_arm() {
        assert_eq!(ElbowBranch::select(316.0, 371.0), ElbowBranch::RightLonger);
        assert_eq!(ElbowBranch::select(400.0, 371.0), ElbowBranch::LeftLonger);
        assert_eq!(ElbowBranch::select(300.0, 300.0), ElbowBranch::RightLonger);
    }

    #[test]
    fn coincident_joints_stay_finite() {
        let linkage = Linkage {
            larma: 0.0,
            larm1: 50.0,
            larm2: 200.0,
            rarm1: 50.0,
            rarm2: 200.0,
            rarmext: 10.0,
            handdist: 0.0,
            baseoffsx: 0.0,
            baseoffsy: 0.0,
        };
        let pose = solve(&linkage, &Rotation::default(), CENTER);
        assert!(pose.pen.is_finite());
    }

    #[test]
    fn unreachable_and_degenerate_arms_stay_finite() {
        let mut linkage = default_linkage();
        for &(l2, r2, hd) in &[(0.0, 0.0, 351.0), (1.0, 1.0, 5000.0), (-50.0, 400.0, 10.0), (1e6, 1.0, 0.0)] {
            linkage.larm2 = l2;
            linkage.rarm2 = r2;
            linkage.handdist = hd;
            for k in 0..36 {
                let rot = Rotation {
                    rotor: k as f64 * 1e7,
                    left: k as f64 * 10.0,
                    right: -(k as f64) * 17.0,
                };
                let pose = solve(&linkage, &rot, CENTER);
                assert!(pose.pen.is_finite(), "l2={} r2={} hd={} k={}", l2, r2, hd, k);
            }
        }
    }

    #[test]
    fn unit_clamp_absorbs_nan_and_overflow() {
        assert_eq!(unit_clamp(f64::NAN), 0.0);
        assert_eq!(unit_clamp(1.5), 1.0);
        assert_eq!(unit_clamp(-7.0), -1.0);
    }

    #[test]
    fn evolution_only_touches_three_fields() {
        let base = default_linkage();
        let ev = base.evolved(0.5);
        assert_eq!(ev.larm1, base.larm1);
        assert_eq!(ev.rarmext, base.rarmext);
        assert!((ev.larm2 - (316.0 + (1.5f64).sin() * 50.0)).abs() < 1e-12);
        assert!((ev.rarm2 - (371.0 + (1.0f64).cos() * 50.0)).abs() < 1e-12);
        assert!((ev.handdist - (351.0 + (0.75f64).sin() * 30.0)).abs() < 1e-12);
    }

    #[test]
    fn attraction_fades_with_distance() {
        let p = Point::new(0.0, 0.0);
        assert_eq!(attract(p, Point::new(300.0, 0.0)), p);
        assert_eq!(attract(p, Point::new(0.0, 0.0)), p);
        let pulled = attract(p, Point::new(150.0, 0.0));
        // force = (1 - 0.5) * 0.5
        assert!((pulled.x - 37.5).abs() < 1e-12);
        assert_eq!(pulled.y, 0.0);
    }
}
