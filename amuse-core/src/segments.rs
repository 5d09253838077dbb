use std::collections::VecDeque;
use std::io::{self, Write};

use amuse_types::Segment;

/// Default capacity of the export buffer.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 50_000;

/// Bounded, oldest-first store of the representative segment of each drawn
/// sub-step. Overflow keeps only the newest half.
#[derive(Debug, Clone)]
pub struct SegmentBuffer {
    segments: VecDeque<Segment>,
    capacity: usize,
}

impl SegmentBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            segments: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Append a segment. Returns the number of segments dropped by a trim.
    pub fn push(&mut self, segment: Segment) -> usize {
        self.segments.push_back(segment);
        if self.segments.len() <= self.capacity {
            return 0;
        }
        let keep = self.capacity / 2;
        let dropped = self.segments.len() - keep;
        self.segments.drain(..dropped);
        log::debug!(
            target: "engine",
            "segment buffer trimmed: dropped {}, kept {}",
            dropped,
            keep
        );
        dropped
    }

    /// Write the buffer as an SVG document sized to the canvas.
    pub fn write_svg<W: Write>(&self, out: &mut W, width: u32, height: u32) -> io::Result<()> {
        write!(
            out,
            r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"#,
            w = width,
            h = height
        )?;
        for s in &self.segments {
            write!(
                out,
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-opacity="{}" stroke-width="{:.2}"/>"#,
                s.x1,
                s.y1,
                s.x2,
                s.y2,
                s.color.css(),
                s.color.a,
                s.width
            )?;
        }
        write!(out, "</svg>")
    }

    pub fn to_svg_string(&self, width: u32, height: u32) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_svg(&mut buf, width, height);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Default for SegmentBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_CAPACITY)
    }
}
