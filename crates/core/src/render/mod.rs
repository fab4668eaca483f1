//! Abstract 2D drawing surface consumed by every effect.
//!
//! The trait mirrors an immediate-mode canvas: drawing calls are resolved
//! against the current transform and global alpha, which `save`/`restore`
//! push and pop.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{Color, Result};

/// Axis-aligned rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a `width x height` surface.
    pub fn full(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Square of side `size` centred on `center`.
    pub fn centered(center: Vec2, size: f32) -> Self {
        Self::new(center.x - size / 2.0, center.y - size / 2.0, size, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Fill or stroke source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Paint {
    Solid(Color),
    Linear {
        start: Vec2,
        end: Vec2,
        stops: Vec<ColorStop>,
    },
    Radial {
        center: Vec2,
        inner_radius: f32,
        outer_radius: f32,
        stops: Vec<ColorStop>,
    },
}

impl Paint {
    pub fn linear(start: Vec2, end: Vec2) -> Self {
        Paint::Linear {
            start,
            end,
            stops: Vec::new(),
        }
    }

    pub fn radial(center: Vec2, inner_radius: f32, outer_radius: f32) -> Self {
        Paint::Radial {
            center,
            inner_radius,
            outer_radius,
            stops: Vec::new(),
        }
    }

    /// Appends a color stop; a no-op for solid paints.
    pub fn stop(mut self, offset: f32, color: Color) -> Self {
        if let Paint::Linear { stops, .. } | Paint::Radial { stops, .. } = &mut self {
            stops.push(ColorStop {
                offset: offset.clamp(0.0, 1.0),
                color,
            });
        }
        self
    }
}

impl From<Color> for Paint {
    fn from(value: Color) -> Self {
        Paint::Solid(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f32,
}

impl Stroke {
    pub fn new(paint: impl Into<Paint>, width: f32) -> Self {
        Self {
            paint: paint.into(),
            width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { ctrl: Vec2, to: Vec2 },
    CubicTo { ctrl1: Vec2, ctrl2: Vec2, to: Vec2 },
    Close,
}

/// Sequence of path segments built fluently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Straight segment from `from` to `to`.
    pub fn line(from: Vec2, to: Vec2) -> Self {
        let mut path = Self::new();
        path.move_to(from).line_to(to);
        path
    }

    /// Open polyline through `points`.
    pub fn polyline(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut path = Self::new();
        for (index, point) in points.into_iter().enumerate() {
            if index == 0 {
                path.move_to(point);
            } else {
                path.line_to(point);
            }
        }
        path
    }

    pub fn move_to(&mut self, to: Vec2) -> &mut Self {
        self.segments.push(PathSegment::MoveTo(to));
        self
    }

    pub fn line_to(&mut self, to: Vec2) -> &mut Self {
        self.segments.push(PathSegment::LineTo(to));
        self
    }

    pub fn quad_to(&mut self, ctrl: Vec2, to: Vec2) -> &mut Self {
        self.segments.push(PathSegment::QuadTo { ctrl, to });
        self
    }

    pub fn cubic_to(&mut self, ctrl1: Vec2, ctrl2: Vec2, to: Vec2) -> &mut Self {
        self.segments.push(PathSegment::CubicTo { ctrl1, ctrl2, to });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.segments.push(PathSegment::Close);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End points of every segment, in order.
    pub fn points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => Some(*p),
            PathSegment::QuadTo { to, .. } | PathSegment::CubicTo { to, .. } => Some(*to),
            PathSegment::Close => None,
        })
    }
}

/// Row-major RGBA8 raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let index = (y * self.width + x) * 4;
            self.data[index..index + 4].copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y * self.width + x) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.data[index..index + 4]);
        Some(rgba)
    }

    /// Alpha channel at `(x, y)`; outside the buffer reads as transparent.
    pub fn alpha(&self, x: usize, y: usize) -> u8 {
        self.pixel(x, y).map(|p| p[3]).unwrap_or(0)
    }
}

/// Immediate-mode 2D drawing surface provided by the host.
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    fn clear_rect(&mut self, rect: Rect);
    fn fill_rect(&mut self, rect: Rect, paint: &Paint);
    fn stroke_rect(&mut self, rect: Rect, stroke: &Stroke);
    fn fill_circle(&mut self, center: Vec2, radius: f32, paint: &Paint);
    /// Arc from `start` to `end` radians, clockwise in screen space.
    fn stroke_arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32, stroke: &Stroke);
    fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, rotation: f32, paint: &Paint);
    fn fill_path(&mut self, path: &Path, paint: &Paint);
    fn stroke_path(&mut self, path: &Path, stroke: &Stroke);
    /// Draws `text` with its baseline-left corner at `position`.
    fn fill_text(&mut self, text: &str, position: Vec2, size: f32, paint: &Paint);
    /// Copies a raster onto the surface, ignoring transform and alpha.
    fn put_pixels(&mut self, pixels: &PixelBuffer, origin: Vec2);
    /// Renders `text` centred into an offscreen `width x height` buffer and
    /// reads it back. Used for glyph-mask sampling.
    fn rasterize_text(
        &mut self,
        text: &str,
        size: f32,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer>;

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, offset: Vec2);
    fn rotate(&mut self, radians: f32);
    fn scale(&mut self, factor: Vec2);
    fn set_global_alpha(&mut self, alpha: f32);
}
