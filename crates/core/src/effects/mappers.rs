use std::f32::consts::TAU;

use glam::Vec2;

use super::{bin_index, Effect, TickContext};
use crate::{AudioFrame, Paint, Path, Rect, Stroke, Surface};

const BAR_WIDTH: f32 = 5.0;
const BAR_SPACING: f32 = 2.0;
const MIN_BAR_HEIGHT: f32 = 5.0;
/// Share of the spectrum shown by the bars; the top quarter is mostly inaudible.
const MAX_FREQ_FRACTION: f32 = 0.75;

/// Vertical bars over a squared frequency axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectrumBars;

impl SpectrumBars {
    /// Number of bars and the highest bin they may sample.
    pub fn layout(width: f32, bins: usize) -> (usize, f32) {
        let max_freq = bins as f32 * MAX_FREQ_FRACTION;
        let by_width = (width / (BAR_WIDTH + BAR_SPACING)).floor().max(0.0);
        (by_width.min(max_freq.floor()) as usize, max_freq)
    }
}

impl Effect for SpectrumBars {
    fn update(&mut self, _frame: &AudioFrame, _ctx: &TickContext<'_>) {}

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let gradient = ctx.gradient();
        let (total_bars, max_freq) = Self::layout(ctx.width, frame.spectrum.len());
        for i in 0..total_bars {
            let position = i as f32 / total_bars as f32;
            let index = (position * position * max_freq).floor() as usize;
            let value = frame.level(index);

            let bar_height = (value * ctx.height).max(MIN_BAR_HEIGHT);
            let x = i as f32 * (BAR_WIDTH + BAR_SPACING);
            surface.fill_rect(
                Rect::new(x, ctx.height - bar_height, BAR_WIDTH, bar_height),
                &Paint::Solid(gradient.color_at(value)),
            );
        }
    }
}

/// Oscilloscope trace, one sample per horizontal pixel.
#[derive(Debug, Clone, Copy)]
pub struct WaveformLine {
    /// Close the trace back to the centre line and fill it.
    pub filled: bool,
    pub line_width: f32,
}

impl Default for WaveformLine {
    fn default() -> Self {
        Self {
            filled: true,
            line_width: 2.0,
        }
    }
}

impl Effect for WaveformLine {
    fn update(&mut self, _frame: &AudioFrame, _ctx: &TickContext<'_>) {}

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let columns = ctx.width.floor().max(0.0) as usize;
        if columns == 0 {
            return;
        }
        let center_y = ctx.height / 2.0;
        let step = frame.waveform.len().div_ceil(columns).max(1);
        let trace = (0..columns).map(|i| {
            let value = frame.sample(i * step);
            Vec2::new(i as f32, center_y + value * center_y * 0.8)
        });

        let color = ctx.style.gradient_start;
        if self.filled {
            let mut path = Path::new();
            path.move_to(Vec2::new(0.0, center_y));
            for point in trace {
                path.line_to(point);
            }
            path.line_to(Vec2::new(ctx.width, center_y)).close();
            surface.fill_path(&path, &Paint::Solid(color));
        } else {
            surface.stroke_path(&Path::polyline(trace), &Stroke::new(color, self.line_width));
        }
    }
}

const RING_TICKS: usize = 180;

/// Ring of radial ticks that slowly spins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircularSpectrum;

impl CircularSpectrum {
    pub fn base_radius(width: f32, height: f32) -> f32 {
        width.min(height) / 3.0
    }
}

impl Effect for CircularSpectrum {
    fn update(&mut self, _frame: &AudioFrame, _ctx: &TickContext<'_>) {}

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let center = ctx.center();
        let radius = Self::base_radius(ctx.width, ctx.height);
        let rotation = (ctx.time_ms * 0.0005) as f32;
        let gradient = ctx.gradient();

        for i in 0..RING_TICKS {
            let value = frame.level(bin_index(i, RING_TICKS, frame.spectrum.len()));
            let angle = i as f32 / RING_TICKS as f32 * TAU + rotation;
            let direction = Vec2::from_angle(angle);

            let inner = center + direction * radius;
            let outer = center + direction * (radius + value * radius);
            surface.stroke_path(
                &Path::line(inner, outer),
                &Stroke::new(gradient.color_at(value), 2.0),
            );
        }
    }
}

const KALEIDOSCOPE_SAMPLES: usize = 32;

/// One radial pattern repeated around the centre.
#[derive(Debug, Clone, Copy)]
pub struct Kaleidoscope {
    pub segments: usize,
}

impl Default for Kaleidoscope {
    fn default() -> Self {
        Self { segments: 8 }
    }
}

impl Kaleidoscope {
    fn draw_pattern(&self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let radius = ctx.width.min(ctx.height) / 2.0 * 0.8;
        let step = frame.spectrum.len() / KALEIDOSCOPE_SAMPLES;
        let gradient = ctx.gradient();

        for i in 0..KALEIDOSCOPE_SAMPLES {
            let value = frame.level(i * step);
            let angle = i as f32 / KALEIDOSCOPE_SAMPLES as f32 * TAU / self.segments as f32;
            let tip = Vec2::from_angle(angle) * radius * value;
            let color = gradient.color_at(value);

            surface.fill_circle(tip, 5.0 + value * 15.0, &Paint::Solid(color));
            surface.set_global_alpha(0.5);
            surface.stroke_path(&Path::line(Vec2::ZERO, tip), &Stroke::new(color, 2.0));
            surface.set_global_alpha(1.0);
        }
    }
}

impl Effect for Kaleidoscope {
    fn update(&mut self, _frame: &AudioFrame, _ctx: &TickContext<'_>) {}

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));
        if self.segments == 0 {
            return;
        }

        surface.save();
        surface.translate(ctx.center());
        surface.rotate((ctx.time_ms * 0.0002) as f32);
        for segment in 0..self.segments {
            surface.save();
            surface.rotate(segment as f32 / self.segments as f32 * TAU);
            self.draw_pattern(surface, frame, ctx);
            surface.restore();
        }
        surface.restore();
    }
}

const BLOB_POINTS: usize = 32;

/// Closed blob whose outline couples spectrum and waveform.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganicForm;

impl OrganicForm {
    /// Outline of the blob; the last point repeats the first angle.
    pub fn outline(frame: &AudioFrame, center: Vec2, base_radius: f32) -> Vec<Vec2> {
        let bins = frame.spectrum.len().max(1);
        let samples = frame.waveform.len().max(1);
        let step = frame.spectrum.len() / BLOB_POINTS;
        let complexity = 0.7 + frame.volume * 0.3;

        (0..=BLOB_POINTS)
            .map(|i| {
                let angle = i as f32 / BLOB_POINTS as f32 * TAU;
                let frequency = frame.level((i * step) % bins);
                let wave = (frame.sample(i * samples / BLOB_POINTS % samples) + 1.0) / 2.0;
                let variation = frequency * wave * complexity;
                center + Vec2::from_angle(angle) * base_radius * (0.7 + variation * 0.5)
            })
            .collect()
    }
}

impl Effect for OrganicForm {
    fn update(&mut self, _frame: &AudioFrame, _ctx: &TickContext<'_>) {}

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let center = ctx.center();
        let base_radius = ctx.width.min(ctx.height) / 2.0 * 0.6;
        let mut path = Path::polyline(Self::outline(frame, center, base_radius));
        path.close();

        let style = ctx.style;
        let fill = Paint::radial(center, 0.0, base_radius)
            .stop(0.0, style.gradient_start)
            .stop(1.0, style.gradient_end);
        surface.fill_path(&path, &fill);
        surface.stroke_path(
            &path,
            &Stroke::new(ctx.gradient().color_at(frame.average_energy()), 2.0),
        );
    }
}
