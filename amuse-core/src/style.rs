//! Pen styles: color, alpha and width as pure functions of the hand
//! accumulators.

use std::f64::consts::PI;

use amuse_types::{BrightnessMode, PenStyle, Rgba};

use crate::kinematics::{Rotation, AM};

/// Width used by the silk styles before the multiplier.
pub const SILK_WIDTH: f64 = 0.4;
/// Fragmented strokes show while the noise product stays above this.
pub const FRAGMENT_THRESHOLD: f64 = -0.2;

/// Everything the style decides for one sub-step. `visible` gates both the
/// drawn segment and the melody gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleSample {
    pub color: Rgba,
    pub width: f64,
    pub visible: bool,
}

#[inline]
fn channel(v: f64) -> u8 {
    v.floor().clamp(0.0, 255.0) as u8
}

/// Three sines a third of a turn apart, centered on 127.
fn spectrum(phase: f64) -> [f64; 3] {
    [
        (phase + PI * 0.666).sin() * 127.0 + 127.0,
        (phase + PI * 0.333).sin() * 127.0 + 127.0,
        phase.sin() * 127.0 + 127.0,
    ]
}

/// Cyan/magenta/white cycle shared by the holographic and silk styles.
fn holo(shift: f64) -> [f64; 3] {
    [
        (AM * shift).sin() * 100.0 + 155.0,
        (AM * shift + PI * 0.5).sin() * 100.0 + 155.0,
        ((AM * shift + PI).sin() * 100.0 + 200.0).min(255.0),
    ]
}

fn base_color(style: PenStyle, rot: &Rotation) -> Rgba {
    let (l, r) = (rot.left, rot.right);
    match style {
        PenStyle::Rainbow => {
            let a = spectrum(AM * l);
            let b = spectrum(AM * r);
            Rgba::new(
                channel((a[0] + b[0]) / 2.0),
                channel((a[1] + b[1]) / 2.0),
                channel((a[2] + b[2]) / 2.0),
                1.0,
            )
        }
        PenStyle::BlackWhite => {
            Rgba::new(255, 255, 255, 0.3 + (AM * l * 2.0).sin().abs() * 0.7)
        }
        PenStyle::Kaleidoscope => {
            let kh = ((l + r).abs() % 360.0) / 360.0;
            Rgba::new(
                channel((kh * PI * 2.0).sin() * 127.0 + 127.0),
                channel(((kh + 0.33) * PI * 2.0).sin() * 127.0 + 127.0),
                channel(((kh + 0.66) * PI * 2.0).sin() * 127.0 + 127.0),
                0.8,
            )
        }
        PenStyle::Blue => {
            let red = (AM * l).sin() * 50.0 + 50.0;
            Rgba::new(
                channel(red * 0.2),
                channel((AM * r).sin() * 100.0 + 155.0),
                255,
                0.7,
            )
        }
        PenStyle::Golden => {
            let mix = (AM * (l + r)).sin() * 0.5 + 0.5;
            Rgba::new(255, channel(180.0 + mix * 75.0), channel(mix * 50.0), 0.8)
        }
        PenStyle::Fragmented => {
            let c = spectrum(AM * l);
            Rgba::new(channel(c[0]), channel(c[1]), channel(c[2]), 1.0)
        }
        PenStyle::Holographic => {
            let c = holo((l + r) * 0.5);
            Rgba::new(
                channel(c[0]),
                channel(c[1]),
                channel(c[2]),
                0.4 + (AM * l).sin().abs() * 0.6,
            )
        }
        PenStyle::Silk => {
            let c = holo((l + r) * 0.5);
            Rgba::new(channel(c[0]), channel(c[1]), channel(c[2]), 0.25)
        }
        PenStyle::SilkInverse => {
            let c = holo((l + r) * 0.5);
            // blue inverts the uncapped value
            let blue = (AM * (l + r) * 0.5 + PI).sin() * 100.0 + 200.0;
            Rgba::new(
                channel(255.0 - c[0] + 200.0),
                channel(255.0 - c[1] + 100.0),
                channel(255.0 - blue + 50.0),
                0.25,
            )
        }
    }
}

/// Stroke width before the multiplier. `travel` is twice the distance the pen
/// moved this sub-step (0 with no previous point); only Rainbow uses it.
fn base_width(style: PenStyle, brightness: BrightnessMode, travel: f64) -> f64 {
    match style {
        PenStyle::Rainbow => {
            let b = match brightness.value() {
                v @ 1..=3 => v as f64,
                _ => 1.0,
            };
            let dd = (travel / b).sqrt() * 1.8;
            let dd = if dd == 0.0 || dd.is_nan() { 1.0 } else { dd };
            (15.0 / dd).clamp(1.0, 5.0) / 2.0
        }
        PenStyle::Silk | PenStyle::SilkInverse => SILK_WIDTH,
        _ => 1.0,
    }
}

/// Fragmented style's high-frequency visibility gate.
pub fn fragment_visible(rot: &Rotation) -> bool {
    (rot.left * 10.0).sin() * (rot.right * 10.0).sin() > FRAGMENT_THRESHOLD
}

/// Evaluate the pen for one sub-step.
pub fn evaluate(
    rot: &Rotation,
    travel: f64,
    style: PenStyle,
    brightness: BrightnessMode,
    line_width: f64,
) -> StyleSample {
    let mut color = base_color(style, rot);
    let width = base_width(style, brightness, travel) * line_width;
    let visible = style != PenStyle::Fragmented || fragment_visible(rot);

    let mode = brightness.value();
    if mode > 3 {
        color.a /= 5.0 * (mode as f64 - 2.0);
    }
    color.a = color.a.clamp(0.0, 1.0);

    StyleSample {
        color,
        width,
        visible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rot(l: f64, r: f64) -> Rotation {
        Rotation {
            rotor: 0.0,
            left: l,
            right: r,
        }
    }

    #[test]
    fn rainbow_is_deterministic() {
        let a = evaluate(&rot(123.4, -987.6), 3.0, PenStyle::Rainbow, BrightnessMode::X1, 1.0);
        let b = evaluate(&rot(123.4, -987.6), 3.0, PenStyle::Rainbow, BrightnessMode::X1, 1.0);
        assert_eq!(a.color.r, b.color.r);
        assert_eq!(a.color.g, b.color.g);
        assert_eq!(a.color.b, b.color.b);
        assert_eq!(a.color.a.to_bits(), b.color.a.to_bits());
        assert_eq!(a.width.to_bits(), b.width.to_bits());
    }

    #[test]
    fn rainbow_at_rest() {
        let s = evaluate(&rot(0.0, 0.0), 0.0, PenStyle::Rainbow, BrightnessMode::X1, 1.0);
        // sin(0.666 pi) * 127 + 127
        assert_eq!(s.color.r, ((PI * 0.666).sin() * 127.0 + 127.0).floor() as u8);
        assert_eq!(s.color.b, 127);
        assert_eq!(s.color.a, 1.0);
        // no travel: dd treated as 1, width capped at 5 then halved
        assert_eq!(s.width, 2.5);
    }

    #[test]
    fn rainbow_width_narrows_with_speed() {
        let slow = evaluate(&rot(0.0, 0.0), 2.0, PenStyle::Rainbow, BrightnessMode::X1, 1.0);
        let fast = evaluate(&rot(0.0, 0.0), 200.0, PenStyle::Rainbow, BrightnessMode::X1, 1.0);
        assert!(fast.width < slow.width);
        assert_eq!(fast.width, 0.5);
        let doubled = evaluate(&rot(0.0, 0.0), 200.0, PenStyle::Rainbow, BrightnessMode::X1, 2.0);
        assert_eq!(doubled.width, 1.0);
    }

    #[test]
    fn silk_styles_are_thin() {
        for style in [PenStyle::Silk, PenStyle::SilkInverse] {
            let s = evaluate(&rot(10.0, 20.0), 50.0, style, BrightnessMode::X1, 1.0);
            assert_eq!(s.width, SILK_WIDTH);
            assert_eq!(s.color.a, 0.25);
        }
    }

    #[test]
    fn dimming_modes_divide_alpha() {
        let div10 = evaluate(&rot(0.0, 0.0), 0.0, PenStyle::Golden, BrightnessMode::Div10, 1.0);
        assert!((div10.color.a - 0.8 / 10.0).abs() < 1e-12);
        let div5 = evaluate(&rot(0.0, 0.0), 0.0, PenStyle::Golden, BrightnessMode::Div5, 1.0);
        assert!((div5.color.a - 0.8 / 15.0).abs() < 1e-12);
        let x3 = evaluate(&rot(0.0, 0.0), 0.0, PenStyle::Golden, BrightnessMode::X3, 1.0);
        assert_eq!(x3.color.a, 0.8);
    }

    #[test]
    fn only_fragmented_is_gated() {
        let mut hidden = 0;
        let mut total = 0;
        for i in 0..2000 {
            let r = rot(i as f64 * 0.37, i as f64 * -0.53);
            let s = evaluate(&r, 0.0, PenStyle::Fragmented, BrightnessMode::X1, 1.0);
            assert_eq!(s.visible, fragment_visible(&r));
            if !s.visible {
                hidden += 1;
            }
            total += 1;
            assert!(evaluate(&r, 0.0, PenStyle::Blue, BrightnessMode::X1, 1.0).visible);
        }
        assert!(hidden > 0 && hidden < total);
    }

    #[test]
    fn every_style_yields_unit_alpha() {
        for style in PenStyle::ALL {
            for mode in [BrightnessMode::X1, BrightnessMode::Div10, BrightnessMode::Div5] {
                let s = evaluate(&rot(1e9, -3e8), 10.0, style, mode, 1.0);
                assert!((0.0..=1.0).contains(&s.color.a), "{:?}", style);
                assert!(s.width > 0.0);
            }
        }
    }
}
