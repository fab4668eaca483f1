use std::f32::consts::{FRAC_PI_4, PI};

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Paint, Path, Rect, Stroke, Surface};

const BLINK_AFTER_TICKS: u32 = 120;
const TONGUE: Color = Color::rgb(0xff, 0x99, 0x99);
const BLUSH: Color = Color::rgba(255, 150, 150, 0.3);
const NOTE: Color = Color::rgb(0x9c, 0x27, 0xb0);
const PUPIL_X_BIN: usize = 15;
const PUPIL_Y_BIN: usize = 20;
const BROW_BIN: usize = 30;

/// Blink phase of the cartoon eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EyeState {
    #[default]
    Open,
    Half,
    Closed,
}

impl EyeState {
    fn next(self) -> Self {
        match self {
            EyeState::Open => EyeState::Half,
            EyeState::Half => EyeState::Closed,
            EyeState::Closed => EyeState::Open,
        }
    }
}

/// Cartoon face whose mouth follows the bass.
#[derive(Debug)]
pub struct LipSync {
    mouth_radius: f32,
    eyes: EyeState,
    blink_counter: u32,
    rng: StdRng,
}

impl LipSync {
    pub fn new(rng: StdRng) -> Self {
        Self {
            mouth_radius: 0.0,
            eyes: EyeState::Open,
            blink_counter: 0,
            rng,
        }
    }

    pub fn mouth_radius(&self) -> f32 {
        self.mouth_radius
    }

    pub fn eyes(&self) -> EyeState {
        self.eyes
    }

    fn face_size(ctx: &TickContext<'_>) -> f32 {
        ctx.width.min(ctx.height) * 0.6
    }

    fn draw_mouth(&self, surface: &mut dyn Surface, frame: &AudioFrame, mouth: Vec2, lips: Color) {
        let r = self.mouth_radius;
        surface.fill_ellipse(mouth, Vec2::new(r * 1.5, r), 0.0, &Paint::Solid(lips));
        surface.fill_ellipse(mouth, Vec2::new(r * 1.2, r * 0.7), 0.0, &Paint::Solid(Color::BLACK));

        let samples: Vec<f32> = frame.waveform.iter().step_by(10).map(|v| v.abs()).collect();
        if samples.is_empty() {
            return;
        }
        let tongue = samples.iter().sum::<f32>() / samples.len() as f32 * r * 0.8;
        if tongue > 0.01 {
            let center = mouth + Vec2::new(0.0, r * 0.2);
            let radii = Vec2::new(r * 0.8, tongue);
            let outline = (0..=16).map(|i| {
                let angle = i as f32 / 16.0 * PI;
                center + Vec2::new(angle.cos() * radii.x, angle.sin() * radii.y)
            });
            let mut path = Path::polyline(outline);
            path.close();
            surface.fill_path(&path, &Paint::Solid(TONGUE));
        }
    }

    fn draw_eyes(&self, surface: &mut dyn Surface, frame: &AudioFrame, eyes: [Vec2; 2], size: f32) {
        let white = Paint::Solid(Color::WHITE);
        let black = Paint::Solid(Color::BLACK);
        for eye in eyes {
            surface.fill_circle(eye, size, &white);
        }

        let gaze = Vec2::new(
            frame.level(PUPIL_X_BIN) - 0.5,
            frame.level(PUPIL_Y_BIN) - 0.5,
        ) * size
            * 0.5;
        for eye in eyes {
            match self.eyes {
                EyeState::Open => {
                    let pupil = eye + gaze;
                    surface.fill_circle(pupil, size * 0.4, &black);
                    surface.fill_circle(
                        pupil + Vec2::new(size * 0.1, -size * 0.1),
                        size * 0.1,
                        &white,
                    );
                }
                EyeState::Half => {
                    surface.fill_ellipse(eye, Vec2::new(size * 0.4, size * 0.1), 0.0, &black);
                }
                EyeState::Closed => {
                    let lid = Path::line(
                        eye - Vec2::new(size * 0.5, 0.0),
                        eye + Vec2::new(size * 0.5, 0.0),
                    );
                    surface.stroke_path(&lid, &Stroke::new(Color::BLACK, 2.0));
                }
            }
        }
    }
}

impl Effect for LipSync {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let face = Self::face_size(ctx);
        let bass = frame.bass_energy();
        self.mouth_radius = self.mouth_radius * 0.7 + bass * 0.3 * face * 0.3;

        self.blink_counter += 1;
        let excited = frame.average_energy() > 0.7 && self.rng.random::<f32>() > 0.7;
        if self.blink_counter > BLINK_AFTER_TICKS || excited {
            self.eyes = self.eyes.next();
            if self.eyes == EyeState::Open {
                self.blink_counter = 0;
            }
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let center = ctx.center();
        let face = Self::face_size(ctx);
        let energy = frame.average_energy();

        surface.fill_circle(center, face / 2.0, &Paint::Solid(ctx.style.gradient_start));
        self.draw_mouth(
            surface,
            frame,
            center + Vec2::new(0.0, face * 0.15),
            ctx.style.gradient_end,
        );

        let eye_y = center.y - face * 0.1;
        let eye_size = face * 0.1;
        let eyes = [
            Vec2::new(center.x - face * 0.15, eye_y),
            Vec2::new(center.x + face * 0.15, eye_y),
        ];
        self.draw_eyes(surface, frame, eyes, eye_size);

        let raise = (frame.level(BROW_BIN) - 0.5).max(0.0) * face * 0.1;
        let brow = Stroke::new(Color::BLACK, 3.0);
        for (eye, side) in eyes.into_iter().zip([-1.0, 1.0]) {
            let outer = eye + Vec2::new(side * eye_size * 1.2, -eye_size * 1.2 - raise);
            let inner = eye + Vec2::new(-side * eye_size * 0.8, -eye_size - raise * 0.5);
            surface.stroke_path(&Path::line(outer, inner), &brow);
        }

        if energy > 0.6 {
            for side in [-1.0, 1.0] {
                let cheek = center + Vec2::new(side * face * 0.25, face * 0.05);
                surface.fill_circle(cheek, face * 0.12, &Paint::Solid(BLUSH));
            }
        }

        if energy > 0.65 && self.rng.random::<f32>() > 0.7 {
            let note = face * 0.15;
            let head = Vec2::new(
                center.x + face * 0.6 * (self.rng.random::<f32>() * 2.0 - 1.0),
                center.y - face * 0.7,
            );
            surface.fill_ellipse(head, Vec2::new(note * 0.6, note * 0.4), FRAC_PI_4, &Paint::Solid(NOTE));
            let stem = head + Vec2::new(note * 0.5, 0.0);
            surface.stroke_path(
                &Path::line(stem, stem - Vec2::new(0.0, note * 1.2)),
                &Stroke::new(NOTE, 3.0),
            );
        }
    }
}
