use std::f32::consts::{FRAC_PI_4, TAU};

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Paint, Path, PixelBuffer, Rect, Stroke, Surface};

const GROUND_LINE: f32 = 0.85;
const SKY_TOP: [f32; 3] = [135.0, 206.0, 235.0];
const SKY_BOTTOM: [f32; 3] = [176.0, 224.0, 230.0];
const SOIL: [u8; 4] = [121, 85, 72, 255];
const GRASS: Color = Color::rgb(0x7c, 0xb3, 0x42);
const STEM: Color = Color::rgb(0x4c, 0xaf, 0x50);
const LEAF: Color = Color::rgb(0x4c, 0xaf, 0x50);
const VEIN: Color = Color::rgba(0, 100, 0, 0.5);
const POLLEN: Color = Color::rgb(0xff, 0xc1, 0x07);
const SWAY_BIN: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Flower {
    /// Where the stem meets the ground.
    pub base: Vec2,
    pub stem_length: f32,
    pub stem_width: f32,
    pub size: f32,
    pub rotation: f32,
    pub petals: usize,
    pub color: Color,
    /// Bloom progress; only ever increases, up to `max_growth`.
    pub growth: f32,
    pub max_growth: f32,
    pub bloom_speed: f32,
    pub sway: f32,
    pub sway_speed: f32,
}

impl Flower {
    /// Screen position of the flower head for the current sway.
    pub fn head(&self) -> Vec2 {
        Vec2::new(
            self.base.x + self.sway.sin() * self.stem_length * 0.2,
            self.base.y - self.stem_length,
        )
    }

    fn depth(&self) -> f32 {
        self.base.y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub position: Vec2,
    pub size: f32,
    pub angle: f32,
}

/// Flowers sprout on bass hits and bloom over time. The population is
/// capped by density and never pruned.
#[derive(Debug)]
pub struct Garden {
    flowers: Vec<Flower>,
    leaves: Vec<Leaf>,
    backdrop: Option<PixelBuffer>,
    last_flower_ms: Option<f64>,
    rng: StdRng,
}

impl Garden {
    pub fn new(rng: StdRng) -> Self {
        Self {
            flowers: Vec::new(),
            leaves: Vec::new(),
            backdrop: None,
            last_flower_ms: None,
            rng,
        }
    }

    pub fn flowers(&self) -> &[Flower] {
        &self.flowers
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn flower_count(&self) -> usize {
        self.flowers.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Room for another flower at the volume-scaled density.
    fn has_room(&self, density: f32) -> bool {
        (self.flowers.len() as f32) < 20.0 * density
    }

    fn plant(&mut self, ctx: &TickContext<'_>) {
        let rng = &mut self.rng;
        let ground = ctx.height * GROUND_LINE;
        let base = Vec2::new(
            ctx.width * 0.1 + rng.random::<f32>() * ctx.width * 0.8,
            ground + rng.random::<f32>() * (ctx.height - ground) * 0.8,
        );
        let stem_length = 50.0 + rng.random::<f32>() * 150.0;
        let flower = Flower {
            base,
            stem_length,
            stem_width: 1.0 + rng.random::<f32>() * 3.0,
            size: 10.0 + rng.random::<f32>() * 40.0,
            rotation: rng.random::<f32>() * TAU,
            petals: rng.random_range(5..12),
            color: ctx.gradient().color_at(rng.random::<f32>()),
            growth: 0.0,
            max_growth: 0.8 + rng.random::<f32>() * 0.2,
            bloom_speed: 0.001 + rng.random::<f32>() * 0.003,
            sway: 0.0,
            sway_speed: 0.01 + rng.random::<f32>() * 0.03,
        };

        let leaves = rng.random_range(1..=3);
        for _ in 0..leaves {
            let side = if rng.random::<f32>() < 0.5 { -1.0 } else { 1.0 };
            self.leaves.push(Leaf {
                position: Vec2::new(base.x, base.y - rng.random::<f32>() * stem_length * 0.7),
                size: 10.0 + rng.random::<f32>() * 15.0,
                angle: side * (FRAC_PI_4 + rng.random::<f32>() * FRAC_PI_4),
            });
        }

        self.flowers.push(flower);
        // Farther flowers (higher base) first so nearer ones overlap them.
        self.flowers.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
    }

    fn backdrop(&mut self, width: usize, height: usize) -> &PixelBuffer {
        let stale = self
            .backdrop
            .as_ref()
            .map_or(false, |b| b.width() != width || b.height() != height);
        if stale {
            self.backdrop = None;
        }
        self.backdrop.get_or_insert_with(|| paint_backdrop(width, height))
    }

    fn draw_flower(surface: &mut dyn Surface, flower: &Flower, seconds: f32) {
        let head = flower.head();
        let mut stem = Path::new();
        stem.move_to(flower.base)
            .cubic_to(
                Vec2::new(
                    flower.base.x + (flower.sway * 0.5).sin() * flower.stem_length * 0.1,
                    flower.base.y - flower.stem_length * 0.5,
                ),
                Vec2::new(head.x, head.y + flower.stem_length * 0.3),
                head,
            );
        surface.stroke_path(&stem, &Stroke::new(STEM, flower.stem_width));

        if flower.growth <= 0.1 {
            return;
        }
        surface.save();
        surface.translate(head);
        surface.rotate(flower.rotation + flower.sway * 0.2);
        surface.scale(Vec2::splat(flower.growth));

        surface.fill_circle(Vec2::ZERO, flower.size * 0.2, &Paint::Solid(POLLEN));
        let petal_paint = Paint::Solid(flower.color);
        for i in 0..flower.petals {
            let angle = i as f32 / flower.petals as f32 * TAU;
            let petal = flower.size * (0.8 + (seconds * 5.0 + i as f32).sin() * 0.05);
            surface.fill_ellipse(
                Vec2::from_angle(angle) * flower.size * 0.5,
                Vec2::new(petal * 0.25, petal * 0.5),
                angle,
                &petal_paint,
            );
        }
        surface.restore();
    }

    fn draw_leaf(surface: &mut dyn Surface, leaf: &Leaf, seconds: f32) {
        let s = leaf.size;
        surface.save();
        surface.translate(leaf.position);
        surface.rotate(leaf.angle + (seconds * 2.0).sin() * 0.1);

        let mut blade = Path::new();
        blade
            .move_to(Vec2::ZERO)
            .cubic_to(Vec2::new(s * 0.5, -s * 0.5), Vec2::new(s, -s * 0.2), Vec2::new(s * 1.5, 0.0))
            .cubic_to(Vec2::new(s, s * 0.2), Vec2::new(s * 0.5, s * 0.5), Vec2::ZERO);
        surface.fill_path(&blade, &Paint::Solid(LEAF));

        let vein = Stroke::new(VEIN, 0.5);
        surface.stroke_path(&Path::line(Vec2::ZERO, Vec2::new(s, 0.0)), &vein);
        for i in 1..=3 {
            let y = s * 0.25 * i as f32 / 3.0;
            for side in [y, -y] {
                let mut rib = Path::new();
                rib.move_to(Vec2::ZERO)
                    .quad_to(Vec2::new(s * 0.5, side), Vec2::new(s * 0.7, side * 0.8));
                surface.stroke_path(&rib, &vein);
            }
        }
        surface.restore();
    }

    fn draw_butterflies(surface: &mut dyn Surface, ctx: &TickContext<'_>, energy: f32, seconds: f32) {
        let ground = ctx.height * GROUND_LINE;
        let count = (energy * 5.0).floor() as usize;
        let gradient = ctx.gradient();
        for i in 0..count {
            let t = seconds + i as f32 * 10.0;
            let body = Vec2::new(
                ((t * 0.2).sin() * 0.5 + 0.5) * ctx.width,
                ground * 0.5 + (t * 0.3).sin() * ground * 0.3,
            );
            let wing = 5.0 + t.sin() * 5.0;
            let flap = (t * 10.0).sin() * 0.5;

            surface.fill_ellipse(body, Vec2::new(5.0, 2.0), 0.0, &Paint::Solid(Color::BLACK));
            let paint = Paint::Solid(gradient.color_at(i as f32 / count as f32));
            for rotation in [-FRAC_PI_4 - flap, FRAC_PI_4 + flap] {
                surface.save();
                surface.translate(body);
                surface.rotate(rotation);
                surface.fill_ellipse(Vec2::new(0.0, -wing), Vec2::new(wing, wing * 2.0), 0.0, &paint);
                surface.restore();
            }
        }
    }

    fn draw_sun(surface: &mut dyn Surface, ctx: &TickContext<'_>, energy: f32, seconds: f32) {
        let sun = Vec2::new(ctx.width * 0.8, ctx.height * 0.15);
        let radius = 40.0 * energy;
        let glow = Paint::radial(sun, 0.0, radius)
            .stop(0.0, Color::rgba(255, 255, 0, 0.8))
            .stop(0.5, Color::rgba(255, 165, 0, 0.6))
            .stop(1.0, Color::rgba(255, 69, 0, 0.0));
        surface.fill_circle(sun, radius, &glow);

        let beams = (5.0 + energy * 5.0).floor() as usize;
        let length = ctx.width * 0.5 * (0.5 + energy * 0.5);
        surface.set_global_alpha(0.3);
        for i in 0..beams {
            let angle = i as f32 / beams as f32 * TAU + seconds * 0.5;
            let end = sun + Vec2::from_angle(angle) * length;
            let paint = Paint::linear(sun, end)
                .stop(0.0, Color::rgba(255, 255, 0, 0.3))
                .stop(1.0, Color::rgba(255, 255, 0, 0.0));
            surface.stroke_path(&Path::line(sun, end), &Stroke::new(paint, 3.0 + energy * 10.0));
        }
        surface.set_global_alpha(1.0);
    }
}

fn paint_backdrop(width: usize, height: usize) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(width, height);
    let ground = height as f32 * GROUND_LINE;
    for y in 0..height {
        let rgba = if y as f32 > ground {
            SOIL
        } else {
            let t = y as f32 / ground.max(1.0);
            let mix = |c: usize| (SKY_TOP[c] * (1.0 - t) + SKY_BOTTOM[c] * t).floor() as u8;
            [mix(0), mix(1), mix(2), 255]
        };
        for x in 0..width {
            buffer.set_pixel(x, y, rgba);
        }
    }
    buffer
}

impl Effect for Garden {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let density = ctx.style.density * (1.0 + 0.5 * frame.volume);
        let bass = frame.bass_energy();
        let seconds = (ctx.time_ms * 0.001) as f32;

        let interval = 2000.0 / density as f64;
        let due = self
            .last_flower_ms
            .map_or(true, |last| ctx.time_ms - last > interval);
        if due
            && self.has_room(density)
            && self.rng.random::<f32>() < bass * density * 0.3
        {
            self.plant(ctx);
            self.last_flower_ms = Some(ctx.time_ms);
        }

        let treble = frame.level(SWAY_BIN);
        for flower in &mut self.flowers {
            flower.growth = flower
                .max_growth
                .min(flower.growth + flower.bloom_speed * (1.0 + bass * 3.0));
            flower.sway += flower.sway_speed * seconds.sin() * (1.0 + treble);
            flower.sway *= 0.95;
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let backdrop = self.backdrop(ctx.width.max(0.0) as usize, ctx.height.max(0.0) as usize);
        surface.put_pixels(backdrop, Vec2::ZERO);

        let energy = frame.average_energy();
        let seconds = (ctx.time_ms * 0.001) as f32;
        let ground = ctx.height * GROUND_LINE;
        let gradient = ctx.gradient();

        let grass = Paint::Solid(GRASS);
        let mut x = 0.0;
        while x < ctx.width {
            let blade = 5.0 + (x * 0.1).sin() * 3.0 + self.rng.random::<f32>() * 5.0;
            surface.fill_rect(Rect::new(x, ground - blade, 2.0, blade), &grass);
            x += 4.0;
        }

        let blossoms = (30.0 * ctx.style.density).floor() as usize;
        for _ in 0..blossoms {
            let spot = Vec2::new(
                self.rng.random::<f32>() * ctx.width,
                ground - self.rng.random::<f32>() * 10.0,
            );
            let size = 1.0 + self.rng.random::<f32>() * 2.0;
            let color = gradient.color_at(self.rng.random::<f32>());
            surface.fill_circle(spot, size, &Paint::Solid(color));
        }

        for flower in &self.flowers {
            Self::draw_flower(surface, flower, seconds);
        }
        for leaf in &self.leaves {
            Self::draw_leaf(surface, leaf, seconds);
        }

        if energy > 0.4 {
            Self::draw_butterflies(surface, ctx, energy, seconds);
        }
        if energy > 0.6 {
            Self::draw_sun(surface, ctx, energy, seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::test_support::{frame_with_spectrum, seeded},
        DrawCommand, RecordingSurface, StyleConfig,
    };

    fn grow(garden: &mut Garden, style: &StyleConfig, value: u8, ticks: usize) {
        let frame = frame_with_spectrum(256, value);
        let mut ctx = TickContext::new(400.0, 300.0, style);
        for tick in 0..ticks {
            ctx.time_ms = tick as f64 * 500.0;
            garden.update(&frame, &ctx);
        }
    }

    #[test]
    fn silence_plants_nothing() {
        let style = StyleConfig::default();
        let mut garden = Garden::new(seeded());
        grow(&mut garden, &style, 0, 200);
        assert_eq!(garden.flower_count(), 0);
        assert_eq!(garden.leaf_count(), 0);
    }

    #[test]
    fn population_is_capped_and_never_pruned() {
        let style = StyleConfig {
            density: 0.5,
            ..StyleConfig::default()
        };
        let mut garden = Garden::new(seeded());
        grow(&mut garden, &style, 255, 2000);

        assert_eq!(garden.flower_count(), 10);
        assert!(garden.leaf_count() >= 10 && garden.leaf_count() <= 30);
        for flower in garden.flowers() {
            assert!(flower.growth <= flower.max_growth);
            assert!((flower.growth - flower.max_growth).abs() < 1e-6);
        }
    }

    #[test]
    fn loud_passages_raise_the_cap() {
        let style = StyleConfig {
            density: 0.5,
            ..StyleConfig::default()
        };
        let mut frame = frame_with_spectrum(256, 255);
        frame.volume = 1.0;
        let mut ctx = TickContext::new(400.0, 300.0, &style);
        let mut garden = Garden::new(seeded());
        for tick in 0..2000 {
            ctx.time_ms = tick as f64 * 500.0;
            garden.update(&frame, &ctx);
        }
        assert_eq!(garden.flower_count(), 15);
    }

    #[test]
    fn flowers_are_ordered_back_to_front() {
        let style = StyleConfig::default();
        let mut garden = Garden::new(seeded());
        grow(&mut garden, &style, 255, 400);

        assert!(garden.flower_count() > 1);
        for pair in garden.flowers().windows(2) {
            assert!(pair[0].base.y <= pair[1].base.y);
        }
    }

    #[test]
    fn backdrop_is_cached_until_resize() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(40.0, 20.0, &style);
        let frame = frame_with_spectrum(256, 0);
        let mut garden = Garden::new(seeded());
        let mut surface = RecordingSurface::new(40.0, 20.0);

        garden.render(&mut surface, &frame, &ctx);
        let sky = garden.backdrop.as_ref().unwrap().pixel(0, 0);
        assert_eq!(sky, Some([135, 206, 235, 255]));
        assert_eq!(garden.backdrop.as_ref().unwrap().pixel(0, 19), Some(SOIL));
        assert!(matches!(
            surface.commands()[0],
            DrawCommand::PutPixels { width: 40, height: 20, .. }
        ));

        garden.render(&mut surface, &frame, &TickContext::new(80.0, 20.0, &style));
        assert_eq!(garden.backdrop.as_ref().unwrap().width(), 80);
    }
}
