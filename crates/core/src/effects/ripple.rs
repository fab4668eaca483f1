use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Paint, Rect, Stroke, Surface};

const GLYPHS: [char; 2] = ['0', '1'];
const BASE_GLYPHS: f32 = 100.0;
const RIPPLE_THRESHOLD: f32 = 0.6;
const EDGE_BAND: f32 = 20.0;
const MAX_GLYPH_SPEED: f32 = 5.0;
const BURST_LIFE_MIN: f32 = 60.0;
const BURST_LIFE_MAX: f32 = 120.0;
const BACKDROP: Color = Color::rgba(0, 0, 0, 0.2);
const CODE_GREEN: Color = Color::rgb(0, 255, 70);

/// An expanding ring spawned on a bass hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Ripple {
    pub center: Vec2,
    pub radius: f32,
    pub max_radius: f32,
    pub speed: f32,
    pub thickness: f32,
    pub opacity: f32,
    pub color: Color,
}

/// A drifting code character.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub symbol: char,
    pub color: Color,
    /// Remaining ticks for burst glyphs; resident glyphs live forever.
    pub life: Option<f32>,
}

#[derive(Debug)]
pub struct DigitalRipple {
    ripples: Vec<Ripple>,
    glyphs: Vec<Glyph>,
    last_ripple_ms: Option<f64>,
    rng: StdRng,
}

impl DigitalRipple {
    pub fn new(rng: StdRng) -> Self {
        Self {
            ripples: Vec::new(),
            glyphs: Vec::new(),
            last_ripple_ms: None,
            rng,
        }
    }

    pub fn ripples(&self) -> &[Ripple] {
        &self.ripples
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Glyphs that never expire.
    pub fn resident_count(&self) -> usize {
        self.glyphs.iter().filter(|g| g.life.is_none()).count()
    }

    fn symbol(&mut self) -> char {
        GLYPHS[self.rng.random_range(0..GLYPHS.len())]
    }

    fn resident(&mut self, ctx: &TickContext<'_>) -> Glyph {
        let position = Vec2::new(
            self.rng.random::<f32>() * ctx.width,
            self.rng.random::<f32>() * ctx.height,
        );
        let velocity = Vec2::new(
            self.rng.random::<f32>() - 0.5,
            self.rng.random::<f32>() - 0.5,
        );
        Glyph {
            position,
            velocity,
            size: 10.0 + self.rng.random::<f32>() * 10.0,
            symbol: self.symbol(),
            color: ctx.gradient().color_at(self.rng.random::<f32>()),
            life: None,
        }
    }

    fn spawn_ripple(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>, bass: f32) {
        let wave_index = self.rng.random_range(0..frame.waveform.len().max(1));
        let center = Vec2::new(
            ctx.width / 2.0 + frame.sample(wave_index) * ctx.width * 0.4,
            ctx.height / 2.0 + (self.rng.random::<f32>() - 0.5) * ctx.height * 0.4,
        );
        let color = ctx.gradient().color_at(self.rng.random::<f32>());
        self.ripples.push(Ripple {
            center,
            radius: 0.0,
            max_radius: 100.0 + self.rng.random::<f32>() * 150.0 * bass,
            speed: 1.0 + self.rng.random::<f32>() * 2.0 * bass,
            thickness: 2.0 + self.rng.random::<f32>() * 3.0 * bass,
            opacity: 0.8,
            color,
        });

        let burst = (5.0 + 15.0 * bass).floor() as usize;
        for _ in 0..burst {
            let angle = self.rng.random::<f32>() * TAU;
            let speed = 2.0 + self.rng.random::<f32>() * 5.0;
            let glyph = Glyph {
                position: center,
                velocity: Vec2::from_angle(angle) * speed,
                size: 10.0 + self.rng.random::<f32>() * 10.0,
                symbol: self.symbol(),
                color,
                life: Some(self.rng.random_range(BURST_LIFE_MIN..BURST_LIFE_MAX)),
            };
            self.glyphs.push(glyph);
        }
    }

    fn step_glyphs(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let mut glyphs = std::mem::take(&mut self.glyphs);
        for glyph in &mut glyphs {
            glyph.position += glyph.velocity;
            if glyph.position.x < 0.0 {
                glyph.position.x = ctx.width;
            } else if glyph.position.x > ctx.width {
                glyph.position.x = 0.0;
            }
            if glyph.position.y < 0.0 {
                glyph.position.y = ctx.height;
            } else if glyph.position.y > ctx.height {
                glyph.position.y = 0.0;
            }

            for ripple in &self.ripples {
                let offset = glyph.position - ripple.center;
                let edge = (offset.length() - ripple.radius).abs();
                if edge < EDGE_BAND {
                    glyph.size *= 1.05;
                    glyph.velocity += offset.normalize_or_zero() * 0.2 * (1.0 - edge / EDGE_BAND);
                    if self.rng.random::<f32>() < 0.1 {
                        glyph.symbol = GLYPHS[self.rng.random_range(0..GLYPHS.len())];
                    }
                }
            }
            glyph.velocity = glyph.velocity.clamp_length_max(MAX_GLYPH_SPEED);

            let rest = 10.0 + self.rng.random::<f32>() * 10.0;
            glyph.size = glyph.size * 0.99 + rest * 0.01;

            if frame.level_at(glyph.position.x / ctx.width.max(1.0)) > 0.7
                && self.rng.random::<f32>() < 0.2
            {
                glyph.symbol = self.symbol();
            }
            if let Some(life) = glyph.life.as_mut() {
                *life -= 1.0;
            }
        }
        glyphs.retain(|glyph| glyph.life.map_or(true, |life| life > 0.0));
        self.glyphs = glyphs;
    }

    fn draw_code_rain(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>, energy: f32) {
        const COLUMNS: usize = 24;
        let column_width = ctx.width / COLUMNS as f32;
        for column in 0..COLUMNS {
            let level = frame.level_at(column as f32 / COLUMNS as f32);
            if level < 0.5 {
                continue;
            }
            let drops = (level * 6.0).ceil() as usize;
            let head = self.rng.random::<f32>() * ctx.height;
            for i in 0..drops {
                let symbol = self.symbol();
                let alpha = energy * (1.0 - i as f32 / drops as f32);
                surface.fill_text(
                    symbol.encode_utf8(&mut [0; 4]),
                    Vec2::new(column as f32 * column_width, head - i as f32 * 14.0),
                    12.0,
                    &Paint::Solid(CODE_GREEN.with_alpha(alpha)),
                );
            }
        }
    }
}

impl Effect for DigitalRipple {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let density = ctx.style.density * (1.0 + frame.volume);
        let bass = frame.bass_energy();

        let wanted = (BASE_GLYPHS * density).floor() as usize;
        while self.resident_count() < wanted {
            let glyph = self.resident(ctx);
            self.glyphs.push(glyph);
        }

        if bass > RIPPLE_THRESHOLD {
            let interval = 300.0 / (density * bass) as f64;
            let due = self
                .last_ripple_ms
                .map_or(true, |last| ctx.time_ms - last > interval);
            if due {
                self.spawn_ripple(frame, ctx, bass);
                self.last_ripple_ms = Some(ctx.time_ms);
            }
        }

        for ripple in &mut self.ripples {
            ripple.radius += ripple.speed;
            ripple.opacity -= 0.01;
        }
        self.ripples
            .retain(|ripple| ripple.radius < ripple.max_radius && ripple.opacity > 0.05);

        self.step_glyphs(frame, ctx);
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.fill_rect(Rect::full(ctx.width, ctx.height), &Paint::Solid(BACKDROP));
        let energy = frame.average_energy();
        let bins = frame.spectrum.len().max(1);

        let segments = (12.0 + 12.0 * energy).floor() as usize;
        let arc = TAU / segments as f32;
        for ripple in &self.ripples {
            for segment in 0..segments {
                let level = frame.level(segment * bins / segments);
                let stroke = Stroke::new(ripple.color.with_alpha(ripple.opacity), ripple.thickness);
                let start = segment as f32 * arc;
                surface.stroke_arc(
                    ripple.center,
                    ripple.radius * (1.0 + 0.3 * level),
                    start,
                    start + arc * 0.8,
                    &stroke,
                );
            }
        }

        for glyph in &self.glyphs {
            let alpha = glyph.life.map_or(1.0, |life| (life / BURST_LIFE_MIN).min(1.0));
            surface.fill_text(
                glyph.symbol.encode_utf8(&mut [0; 4]),
                glyph.position,
                glyph.size,
                &Paint::Solid(glyph.color.with_alpha(alpha)),
            );
        }

        let flashes = (10.0 * energy).floor() as usize;
        for _ in 0..flashes {
            if self.rng.random::<f32>() < 0.3 {
                let spot = Vec2::new(
                    self.rng.random::<f32>() * ctx.width,
                    self.rng.random::<f32>() * ctx.height,
                );
                let size = 2.0 + self.rng.random::<f32>() * 6.0;
                surface.fill_rect(
                    Rect::centered(spot, size),
                    &Paint::Solid(Color::WHITE.with_alpha(0.5 * energy)),
                );
            }
        }

        if energy > 0.7 {
            self.draw_code_rain(surface, frame, ctx, energy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::test_support::{frame_with_spectrum, seeded},
        StyleConfig,
    };

    #[test]
    fn residents_are_topped_up_to_density() {
        let style = StyleConfig {
            density: 0.5,
            ..StyleConfig::default()
        };
        let ctx = TickContext::new(300.0, 200.0, &style);
        let mut effect = DigitalRipple::new(seeded());
        effect.update(&frame_with_spectrum(256, 0), &ctx);
        assert_eq!(effect.resident_count(), 50);
        assert!(effect.ripples().is_empty());
    }

    #[test]
    fn bass_hit_spawns_ripple_and_burst() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(300.0, 200.0, &style);
        let mut effect = DigitalRipple::new(seeded());
        effect.update(&frame_with_spectrum(256, 255), &ctx);

        assert_eq!(effect.ripples().len(), 1);
        let bursts = effect.glyphs().iter().filter(|g| g.life.is_some()).count();
        assert_eq!(bursts, 20);
    }

    #[test]
    fn ripples_and_bursts_expire() {
        let style = StyleConfig::default();
        let mut ctx = TickContext::new(300.0, 200.0, &style);
        let mut effect = DigitalRipple::new(seeded());
        effect.update(&frame_with_spectrum(256, 255), &ctx);

        let silent = frame_with_spectrum(256, 0);
        for tick in 1..=200 {
            ctx.time_ms = tick as f64 * 16.0;
            effect.update(&silent, &ctx);
        }
        assert!(effect.ripples().is_empty());
        assert!(effect.glyphs().iter().all(|g| g.life.is_none()));
        assert!(effect
            .glyphs()
            .iter()
            .all(|g| g.velocity.length() <= MAX_GLYPH_SPEED + 1e-4));
    }

    #[test]
    fn glyphs_are_binary_digits() {
        let style = StyleConfig::default();
        let mut ctx = TickContext::new(300.0, 200.0, &style);
        let mut effect = DigitalRipple::new(seeded());
        let loud = frame_with_spectrum(256, 255);
        for tick in 0..120 {
            ctx.time_ms = tick as f64 * 16.0;
            effect.update(&loud, &ctx);
        }
        assert!(!effect.glyphs().is_empty());
        assert!(effect.glyphs().iter().all(|g| matches!(g.symbol, '0' | '1')));
    }

    #[test]
    fn glyphs_on_a_ripple_edge_are_pushed_outward() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(300.0, 200.0, &style);
        let mut effect = DigitalRipple::new(seeded());
        effect.ripples.push(Ripple {
            center: Vec2::new(100.0, 100.0),
            radius: 50.0,
            max_radius: 200.0,
            speed: 1.0,
            thickness: 2.0,
            opacity: 0.8,
            color: Color::WHITE,
        });
        for x in [160.0, 250.0] {
            effect.glyphs.push(Glyph {
                position: Vec2::new(x, 100.0),
                velocity: Vec2::ZERO,
                size: 12.0,
                symbol: '0',
                color: Color::WHITE,
                life: None,
            });
        }

        effect.step_glyphs(&frame_with_spectrum(256, 0), &ctx);

        let near = &effect.glyphs()[0];
        assert!((near.velocity.x - 0.1).abs() < 1e-5);
        assert!(near.velocity.y.abs() < 1e-5);
        assert_eq!(effect.glyphs()[1].velocity, Vec2::ZERO);
    }
}
