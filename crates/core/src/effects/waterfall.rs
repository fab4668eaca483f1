use std::collections::VecDeque;

use super::{Effect, TickContext};
use crate::{AudioFrame, Paint, Rect, Surface};

pub const WATERFALL_BINS: usize = 64;
/// Pixel height of one history row.
const ROW_SPEED: f32 = 2.0;

/// Scrolling spectrogram backed by a bounded history of spectrum rows.
///
/// The history holds exactly `floor(height / 2)` rows; the newest row is at
/// the front and drawn at the top.
#[derive(Debug, Clone)]
pub struct Waterfall {
    rows: VecDeque<[f32; WATERFALL_BINS]>,
    capacity: usize,
}

impl Waterfall {
    pub fn new(height: f32) -> Self {
        let capacity = Self::capacity_for(height);
        Self {
            rows: std::iter::repeat([0.0; WATERFALL_BINS]).take(capacity).collect(),
            capacity,
        }
    }

    fn capacity_for(height: f32) -> usize {
        (height / ROW_SPEED).floor().max(0.0) as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// History rows, newest first.
    pub fn rows(&self) -> impl Iterator<Item = &[f32; WATERFALL_BINS]> {
        self.rows.iter()
    }

    /// Adapts the capacity to a new surface height, dropping the oldest
    /// rows or padding with silence.
    pub fn resize(&mut self, height: f32) {
        let capacity = Self::capacity_for(height);
        if capacity == self.capacity {
            return;
        }
        self.capacity = capacity;
        self.rows.truncate(capacity);
        while self.rows.len() < capacity {
            self.rows.push_back([0.0; WATERFALL_BINS]);
        }
    }

    fn sample_row(frame: &AudioFrame) -> [f32; WATERFALL_BINS] {
        let step = frame.spectrum.len() / WATERFALL_BINS;
        let mut row = [0.0; WATERFALL_BINS];
        for (i, slot) in row.iter_mut().enumerate() {
            *slot = frame.level(i * step);
        }
        row
    }
}

impl Effect for Waterfall {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        self.resize(ctx.height);
        self.rows.push_front(Self::sample_row(frame));
        self.rows.truncate(self.capacity);
    }

    fn render(&mut self, surface: &mut dyn Surface, _frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let gradient = ctx.gradient();
        let bin_width = ctx.width / WATERFALL_BINS as f32;
        surface.set_global_alpha(0.8);
        for (row_index, row) in self.rows.iter().enumerate() {
            let y = row_index as f32 * ROW_SPEED;
            for (bin, value) in row.iter().enumerate() {
                surface.fill_rect(
                    Rect::new(bin as f32 * bin_width, y, bin_width, ROW_SPEED),
                    &Paint::Solid(gradient.color_at(*value)),
                );
            }
        }
        surface.set_global_alpha(1.0);
    }
}
