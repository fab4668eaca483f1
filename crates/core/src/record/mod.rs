use glam::Vec2;
use serde::Serialize;

use crate::{Paint, Path, PixelBuffer, Rect, Result, Stroke, Surface, VisualizerError};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    ClearRect {
        rect: Rect,
    },
    FillRect {
        rect: Rect,
        paint: Paint,
    },
    StrokeRect {
        rect: Rect,
        stroke: Stroke,
    },
    FillCircle {
        center: Vec2,
        radius: f32,
        paint: Paint,
    },
    StrokeArc {
        center: Vec2,
        radius: f32,
        start: f32,
        end: f32,
        stroke: Stroke,
    },
    FillEllipse {
        center: Vec2,
        radii: Vec2,
        rotation: f32,
        paint: Paint,
    },
    FillPath {
        path: Path,
        paint: Paint,
    },
    StrokePath {
        path: Path,
        stroke: Stroke,
    },
    FillText {
        text: String,
        position: Vec2,
        size: f32,
        paint: Paint,
    },
    PutPixels {
        origin: Vec2,
        width: usize,
        height: usize,
    },
    Save,
    Restore,
    Translate {
        offset: Vec2,
    },
    Rotate {
        radians: f32,
    },
    Scale {
        factor: Vec2,
    },
    GlobalAlpha {
        alpha: f32,
    },
}

impl DrawCommand {
    /// Whether the command puts pixels on the surface.
    pub fn is_draw(&self) -> bool {
        !matches!(
            self,
            DrawCommand::Save
                | DrawCommand::Restore
                | DrawCommand::Translate { .. }
                | DrawCommand::Rotate { .. }
                | DrawCommand::Scale { .. }
                | DrawCommand::GlobalAlpha { .. }
        )
    }
}

/// Headless surface that records every call into a display list.
///
/// Text rasterisation approximates each visible character as a solid cell
/// so glyph-mask sampling works without font data.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSurface {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
    #[serde(skip)]
    alpha_stack: Vec<f32>,
    #[serde(skip)]
    global_alpha: f32,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            alpha_stack: Vec::new(),
            global_alpha: 1.0,
        }
    }

    /// Changes the reported dimensions, as a host does on window resize.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drops the recorded commands, keeping dimensions.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.alpha_stack.clear();
        self.global_alpha = 1.0;
    }

    /// Number of commands that put pixels on the surface.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Alpha currently applied to drawing calls.
    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.push(DrawCommand::ClearRect { rect });
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        self.push(DrawCommand::FillRect {
            rect,
            paint: paint.clone(),
        });
    }

    fn stroke_rect(&mut self, rect: Rect, stroke: &Stroke) {
        self.push(DrawCommand::StrokeRect {
            rect,
            stroke: stroke.clone(),
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, paint: &Paint) {
        self.push(DrawCommand::FillCircle {
            center,
            radius,
            paint: paint.clone(),
        });
    }

    fn stroke_arc(&mut self, center: Vec2, radius: f32, start: f32, end: f32, stroke: &Stroke) {
        self.push(DrawCommand::StrokeArc {
            center,
            radius,
            start,
            end,
            stroke: stroke.clone(),
        });
    }

    fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, rotation: f32, paint: &Paint) {
        self.push(DrawCommand::FillEllipse {
            center,
            radii,
            rotation,
            paint: paint.clone(),
        });
    }

    fn fill_path(&mut self, path: &Path, paint: &Paint) {
        self.push(DrawCommand::FillPath {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn stroke_path(&mut self, path: &Path, stroke: &Stroke) {
        self.push(DrawCommand::StrokePath {
            path: path.clone(),
            stroke: stroke.clone(),
        });
    }

    fn fill_text(&mut self, text: &str, position: Vec2, size: f32, paint: &Paint) {
        self.push(DrawCommand::FillText {
            text: text.to_string(),
            position,
            size,
            paint: paint.clone(),
        });
    }

    fn put_pixels(&mut self, pixels: &PixelBuffer, origin: Vec2) {
        self.push(DrawCommand::PutPixels {
            origin,
            width: pixels.width(),
            height: pixels.height(),
        });
    }

    fn rasterize_text(
        &mut self,
        text: &str,
        size: f32,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer> {
        if !(size.is_finite() && size > 0.0) {
            return Err(VisualizerError::config("text size must be positive"));
        }

        let mut buffer = PixelBuffer::new(width, height);
        let advance = |c: char| if c.is_ascii() { size * 0.6 } else { size };
        let gap = size * 0.1;
        let total: f32 = text.chars().map(|c| advance(c) + gap).sum::<f32>() - gap;
        let glyph_height = size * 0.7;
        let top = (height as f32 - glyph_height) / 2.0;
        let mut left = (width as f32 - total) / 2.0;

        for c in text.chars() {
            let cell = advance(c);
            if !c.is_whitespace() {
                let x0 = left.max(0.0) as usize;
                let x1 = (left + cell).clamp(0.0, width as f32) as usize;
                let y0 = top.max(0.0) as usize;
                let y1 = (top + glyph_height).clamp(0.0, height as f32) as usize;
                for y in y0..y1 {
                    for x in x0..x1 {
                        buffer.set_pixel(x, y, [255, 255, 255, 255]);
                    }
                }
            }
            left += cell + gap;
        }

        Ok(buffer)
    }

    fn save(&mut self) {
        self.alpha_stack.push(self.global_alpha);
        self.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(alpha) = self.alpha_stack.pop() {
            self.global_alpha = alpha;
        }
        self.push(DrawCommand::Restore);
    }

    fn translate(&mut self, offset: Vec2) {
        self.push(DrawCommand::Translate { offset });
    }

    fn rotate(&mut self, radians: f32) {
        self.push(DrawCommand::Rotate { radians });
    }

    fn scale(&mut self, factor: Vec2) {
        self.push(DrawCommand::Scale { factor });
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
        self.push(DrawCommand::GlobalAlpha {
            alpha: self.global_alpha,
        });
    }
}
