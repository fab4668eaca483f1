use std::collections::VecDeque;

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Gradient, Paint, Path, Rect, Stroke, Surface};

const TRAIL_LENGTH: usize = 10;
const SPAWN_Y: f32 = -50.0;
/// Distance below the bottom edge after which a meteor is dropped.
const BOTTOM_MARGIN: f32 = 100.0;
const FADE: Color = Color::rgba(0, 0, 0, 0.05);

#[derive(Debug, Clone, PartialEq)]
pub struct Meteor {
    pub position: Vec2,
    pub length: f32,
    pub speed: f32,
    pub color: Color,
    pub width: f32,
    /// Most recent positions, oldest first.
    pub trail: VecDeque<Vec2>,
}

/// Bass-triggered streaks over a waveform star field.
#[derive(Debug)]
pub struct MeteorShower {
    meteors: Vec<Meteor>,
    last_spawn_ms: Option<f64>,
    rng: StdRng,
}

impl MeteorShower {
    pub fn new(rng: StdRng) -> Self {
        Self {
            meteors: Vec::new(),
            last_spawn_ms: None,
            rng,
        }
    }

    pub fn meteors(&self) -> &[Meteor] {
        &self.meteors
    }

    fn spawn(&mut self, gradient: &Gradient, width: f32) -> Meteor {
        let rng = &mut self.rng;
        Meteor {
            position: Vec2::new(rng.random::<f32>() * width, SPAWN_Y),
            length: 20.0 + rng.random::<f32>() * 80.0,
            speed: 3.0 + rng.random::<f32>() * 7.0,
            color: gradient.color_at(rng.random::<f32>()),
            width: 1.0 + rng.random::<f32>() * 3.0,
            trail: VecDeque::with_capacity(TRAIL_LENGTH + 1),
        }
    }

    fn draw_meteor(&mut self, surface: &mut dyn Surface, meteor: &Meteor) {
        let head = meteor.position;
        let tail = Vec2::new(head.x - meteor.speed * 0.5, head.y - meteor.length);
        let body = Paint::linear(head, Vec2::new(head.x, head.y - meteor.length))
            .stop(0.0, meteor.color)
            .stop(1.0, Color::TRANSPARENT);
        surface.stroke_path(&Path::line(head, tail), &Stroke::new(body, meteor.width));

        let fill = Paint::Solid(meteor.color);
        let count = meteor.trail.len() as f32;
        for (i, point) in meteor.trail.iter().enumerate() {
            let size = i as f32 / count * meteor.width * 0.8;
            surface.fill_circle(*point, size, &fill);
        }

        if self.rng.random::<f32>() < 0.3 {
            let spark = Vec2::new(
                head.x + (self.rng.random::<f32>() - 0.5) * 5.0,
                head.y - self.rng.random::<f32>() * meteor.length * 0.8,
            );
            surface.fill_circle(spark, self.rng.random::<f32>() * 1.5, &fill);
        }
    }

    fn draw_stars(surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let bins = frame.spectrum.len();
        for i in (0..bins).step_by(5) {
            let intensity = frame.level(i);
            if intensity <= 0.2 {
                continue;
            }
            let star = Vec2::new(
                i as f32 / bins as f32 * ctx.width,
                ctx.height * 0.5 + frame.sample(i) * ctx.height * 0.3,
            );
            let size = intensity * 2.0;
            surface.fill_circle(star, size, &Paint::Solid(Color::WHITE.with_alpha(intensity * 0.7)));

            if intensity > 0.7 {
                let glow = Paint::radial(star, 0.0, size * 3.0)
                    .stop(0.0, Color::WHITE.with_alpha(intensity * 0.5))
                    .stop(1.0, Color::TRANSPARENT);
                surface.fill_circle(star, size * 3.0, &glow);
            }
        }
    }

    fn draw_auroras(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>, energy: f32) {
        const SEGMENTS: usize = 20;
        let count = (3.0 + energy * 4.0).floor() as usize;
        let gradient = ctx.gradient();
        let samples = frame.waveform.len();

        for i in 0..count {
            let base_y = ctx.height * (0.7 + self.rng.random::<f32>() * 0.2);
            let reach = ctx.height * 0.2 * energy;
            let points: Vec<Vec2> = (0..=SEGMENTS)
                .map(|j| {
                    let t = j as f32 / SEGMENTS as f32;
                    let wave = frame.sample((t * samples as f32) as usize);
                    Vec2::new(t * ctx.width, base_y - wave.abs() * reach)
                })
                .collect();

            let mut path = Path::new();
            path.move_to(points[0]);
            for pair in points.windows(2) {
                path.quad_to(pair[0], (pair[0] + pair[1]) / 2.0);
            }

            let paint = Paint::linear(Vec2::new(0.0, base_y - reach), Vec2::new(0.0, base_y))
                .stop(0.0, Color::TRANSPARENT)
                .stop(0.5, gradient.color_at(i as f32 / count as f32))
                .stop(1.0, Color::TRANSPARENT);
            surface.set_global_alpha(0.7);
            surface.stroke_path(&path, &Stroke::new(paint, 2.0 + energy * 5.0));
            surface.set_global_alpha(1.0);
        }
    }
}

impl Effect for MeteorShower {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let density = ctx.style.density * (1.0 + frame.volume);
        let energy = frame.average_energy();
        let bass = frame.bass_energy();

        if bass > 0.0 {
            let interval = 300.0 / (bass * 2.0 * density) as f64;
            let due = self
                .last_spawn_ms
                .map_or(true, |last| ctx.time_ms - last > interval);
            if due && self.rng.random::<f32>() < bass * density {
                let meteor = self.spawn(&ctx.gradient(), ctx.width);
                self.meteors.push(meteor);
                self.last_spawn_ms = Some(ctx.time_ms);
            }
        }

        for meteor in &mut self.meteors {
            meteor.position.y += meteor.speed * (1.0 + energy * 2.0);
            meteor.position.x += meteor.speed * 0.5;
            meteor.trail.push_back(meteor.position);
            if meteor.trail.len() > TRAIL_LENGTH {
                meteor.trail.pop_front();
            }
        }
        self.meteors
            .retain(|meteor| meteor.position.y < ctx.height + BOTTOM_MARGIN);
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.fill_rect(Rect::full(ctx.width, ctx.height), &Paint::Solid(FADE));

        let meteors = std::mem::take(&mut self.meteors);
        for meteor in &meteors {
            self.draw_meteor(surface, meteor);
        }
        self.meteors = meteors;

        Self::draw_stars(surface, frame, ctx);

        let energy = frame.average_energy();
        if energy > 0.5 {
            self.draw_auroras(surface, frame, ctx, energy);
        }
    }
}
