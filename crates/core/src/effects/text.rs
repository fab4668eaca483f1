use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{bin_index, Effect, TickContext};
use crate::{AudioFrame, Color, Paint, Path, Rect, Result, Stroke, Surface, VisualizerError};

/// Radius inside which attraction turns into a gentle repulsion.
pub const EASE_DISTANCE: f32 = 8.0;
const DAMPING: f32 = 0.92;
const PARTICLE_SIZE: f32 = 2.0;
const ALPHA_THRESHOLD: u8 = 128;
const LINK_DISTANCE: f32 = 25.0;
const FADE: Color = Color::rgba(0, 0, 0, 0.05);

#[derive(Debug, Clone, PartialEq)]
pub struct TextParticle {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Sample point of the glyph mask this particle settles on.
    pub target: Vec2,
    pub color: Color,
    pub size: f32,
    /// Per-particle factor in `[0, 1)` that varies the ease stiffness.
    pub random: f32,
    pub alpha: f32,
    pub brightness: f32,
}

/// Particles that assemble into the configured text.
///
/// The glyph mask is rasterised once at construction; the engine rebuilds
/// the state when the text, its size or the surface dimensions change.
#[derive(Debug)]
pub struct TextParticles {
    text: String,
    text_size: f32,
    width: f32,
    height: f32,
    particles: Vec<TextParticle>,
    rng: StdRng,
}

impl TextParticles {
    pub fn new(ctx: &TickContext<'_>, surface: &mut dyn Surface, mut rng: StdRng) -> Result<Self> {
        let text = ctx.style.text.trim();
        if text.is_empty() {
            return Err(VisualizerError::config("particle text must not be empty"));
        }
        let size = ctx.style.text_size;
        let mask = surface.rasterize_text(
            text,
            size,
            ctx.width.max(0.0) as usize,
            ctx.height.max(0.0) as usize,
        )?;

        let stride = 4usize.saturating_add((size / 30.0).floor() as usize);
        let gradient = ctx.gradient();
        let center = ctx.center();
        let reach = center.length();

        let mut particles = Vec::new();
        for y in (0..mask.height()).step_by(stride) {
            for x in (0..mask.width()).step_by(stride) {
                if mask.alpha(x, y) <= ALPHA_THRESHOLD {
                    continue;
                }
                let origin = center
                    + Vec2::from_angle(rng.random::<f32>() * TAU)
                        * (reach + rng.random::<f32>() * 50.0);
                particles.push(TextParticle {
                    position: origin,
                    velocity: Vec2::ZERO,
                    target: Vec2::new(x as f32, y as f32),
                    color: gradient.color_at(rng.random::<f32>()),
                    size: 1.0 + rng.random::<f32>() * 3.0,
                    random: rng.random::<f32>(),
                    alpha: 0.0,
                    brightness: 0.0,
                });
            }
        }
        tracing::debug!(text, particles = particles.len(), "sampled glyph mask");

        Ok(Self {
            text: text.to_string(),
            text_size: size,
            width: ctx.width,
            height: ctx.height,
            particles,
            rng,
        })
    }

    pub(super) fn is_stale(&self, ctx: &TickContext<'_>) -> bool {
        self.text != ctx.style.text.trim()
            || self.text_size != ctx.style.text_size
            || self.width != ctx.width
            || self.height != ctx.height
    }

    pub fn particles(&self) -> &[TextParticle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Distance of every particle to its unperturbed target.
    pub fn distances(&self) -> impl Iterator<Item = f32> + '_ {
        self.particles
            .iter()
            .map(|particle| particle.position.distance(particle.target))
    }
}

impl Effect for TextParticles {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let energy = frame.average_energy();
        let bass = frame.bass_energy();
        let high = frame.high_energy();
        let seconds = (ctx.time_ms * 0.001) as f32;
        let sway = Vec2::new(seconds.sin() * ctx.width * 0.1, seconds.cos() * ctx.height * 0.1);
        let count = self.particles.len();
        let bins = frame.spectrum.len();

        for (i, particle) in self.particles.iter_mut().enumerate() {
            let level = frame.level(bin_index(i, count, bins));
            let target = particle.target + sway * level * 2.0;

            let offset = target - particle.position;
            let distance = offset.length();
            let force = if distance < EASE_DISTANCE {
                (distance - EASE_DISTANCE) * (particle.random * 0.1 + 0.12)
            } else {
                distance - EASE_DISTANCE
            };
            particle.velocity += Vec2::from_angle(offset.y.atan2(offset.x)) * force;

            if let Some(pointer) = ctx.pointer {
                let radius = 50.0 * (1.0 + bass);
                let away = particle.position - pointer - sway * bass * 10.0;
                let gap = away.length();
                if gap < radius {
                    let push = (radius - gap) / radius;
                    particle.velocity +=
                        Vec2::from_angle(away.y.atan2(away.x)) * push * (1.0 + bass * 10.0);
                }
            }

            let jitter = 0.1 + high * 0.2;
            particle.velocity += Vec2::new(
                (self.rng.random::<f32>() - 0.5) * jitter,
                (self.rng.random::<f32>() - 0.5) * jitter,
            );
            particle.velocity *= DAMPING;
            particle.position += particle.velocity;

            particle.alpha = (1.0 - distance / 200.0).clamp(0.0, 1.0);
            particle.brightness = 0.8 + level * 0.5;

            if energy > 0.7 && self.rng.random::<f32>() < 0.2 {
                particle.size = PARTICLE_SIZE * (1.0 + self.rng.random::<f32>() * 2.0);
                particle.brightness = 1.5;
            } else {
                particle.size = particle.size * 0.95 + PARTICLE_SIZE * 0.05;
            }
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.fill_rect(Rect::full(ctx.width, ctx.height), &Paint::Solid(FADE));
        let energy = frame.average_energy();

        for (i, particle) in self.particles.iter().enumerate() {
            surface.set_global_alpha(particle.alpha);
            let paint = Paint::Solid(particle.color);
            if energy > 0.6 && self.rng.random::<f32>() < 0.3 {
                let side = particle.size * 1.2 * particle.brightness;
                surface.fill_rect(Rect::centered(particle.position, side), &paint);
            } else {
                surface.fill_circle(particle.position, particle.size * particle.brightness, &paint);
            }

            if energy > 0.8 {
                for other in &self.particles[i + 1..] {
                    let gap = particle.position.distance(other.position);
                    if gap < LINK_DISTANCE {
                        surface.set_global_alpha(
                            (1.0 - gap / LINK_DISTANCE) * 0.2 * particle.alpha * other.alpha,
                        );
                        surface.stroke_path(
                            &Path::line(particle.position, other.position),
                            &Stroke::new(particle.color, 0.5),
                        );
                    }
                }
            }
        }
        surface.set_global_alpha(1.0);

        if energy > 0.5 {
            surface.fill_rect(
                Rect::full(ctx.width, ctx.height),
                &Paint::Solid(Color::BLACK.with_alpha(0.05 * energy)),
            );
        }

        if energy > 0.7 {
            let gradient = ctx.gradient();
            for _ in 0..10 {
                if self.rng.random::<f32>() < 0.2 {
                    let spot = Vec2::new(
                        self.rng.random::<f32>() * ctx.width,
                        self.rng.random::<f32>() * ctx.height,
                    );
                    let size = 1.0 + self.rng.random::<f32>() * 3.0;
                    let color = gradient.color_at(self.rng.random::<f32>());
                    surface.fill_circle(spot, size, &Paint::Solid(color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::test_support::{frame_with_spectrum, seeded},
        RecordingSurface, StyleConfig,
    };

    fn style(text: &str) -> StyleConfig {
        StyleConfig {
            text: text.to_string(),
            text_size: 60.0,
            ..StyleConfig::default()
        }
    }

    #[test]
    fn empty_text_is_rejected() {
        let style = style("   ");
        let ctx = TickContext::new(200.0, 100.0, &style);
        let mut surface = RecordingSurface::new(200.0, 100.0);
        assert!(TextParticles::new(&ctx, &mut surface, seeded()).is_err());
    }

    #[test]
    fn particles_start_off_screen_with_targets_on_the_mask() {
        let style = style("HI");
        let ctx = TickContext::new(300.0, 150.0, &style);
        let mut surface = RecordingSurface::new(300.0, 150.0);
        let text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();

        assert!(text.particle_count() > 0);
        let mask = surface.rasterize_text("HI", 60.0, 300, 150).unwrap();
        for particle in text.particles() {
            let target = particle.target;
            assert!(mask.alpha(target.x as usize, target.y as usize) > ALPHA_THRESHOLD);
            let p = particle.position;
            assert!(p.x < 0.0 || p.x > 300.0 || p.y < 0.0 || p.y > 150.0);
        }
    }

    #[test]
    fn staleness_tracks_text_and_size() {
        let style_a = style("AB");
        let ctx = TickContext::new(200.0, 100.0, &style_a);
        let mut surface = RecordingSurface::new(200.0, 100.0);
        let text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();
        assert!(!text.is_stale(&ctx));

        let style_b = style("CD");
        assert!(text.is_stale(&TickContext::new(200.0, 100.0, &style_b)));
        assert!(text.is_stale(&TickContext::new(201.0, 100.0, &style_a)));
    }

    #[test]
    fn particles_reach_the_ease_distance_in_silence() {
        let style = style("OK");
        let mut ctx = TickContext::new(320.0, 240.0, &style);
        let mut surface = RecordingSurface::new(320.0, 240.0);
        let mut text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();
        let silent = frame_with_spectrum(256, 0);

        let mut closest: Vec<f32> = text.distances().collect();
        for tick in 0..600 {
            ctx.time_ms = tick as f64 * 16.0;
            text.update(&silent, &ctx);
            for (best, distance) in closest.iter_mut().zip(text.distances()) {
                *best = best.min(distance);
            }
        }
        assert!(closest.iter().all(|d| *d < EASE_DISTANCE));
    }

    #[test]
    fn settled_particles_stay_on_the_ease_ring() {
        let style = style("OK");
        let mut ctx = TickContext::new(320.0, 240.0, &style);
        let mut surface = RecordingSurface::new(320.0, 240.0);
        let mut text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();
        let silent = frame_with_spectrum(256, 0);
        let count = text.particle_count() as f32;

        let mut means = Vec::new();
        for tick in 0..600 {
            ctx.time_ms = tick as f64 * 16.0;
            text.update(&silent, &ctx);
            if tick >= 400 {
                assert!(text.distances().all(|d| d < EASE_DISTANCE + 2.0));
                means.push(text.distances().sum::<f32>() / count);
            }
        }

        assert!(means.iter().all(|mean| *mean < EASE_DISTANCE + 0.5));
        let early = means[..100].iter().sum::<f32>() / 100.0;
        let late = means[100..].iter().sum::<f32>() / 100.0;
        assert!(late <= early + 0.05);
    }

    #[test]
    fn huge_text_size_samples_a_single_point() {
        let style = StyleConfig {
            text: "BIG".to_string(),
            text_size: 1e21,
            ..StyleConfig::default()
        };
        let ctx = TickContext::new(64.0, 48.0, &style);
        let mut surface = RecordingSurface::new(64.0, 48.0);
        let text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();
        assert!(text.particle_count() <= 1);
    }

    #[test]
    fn pointer_repels_nearby_particles() {
        let style = style("O");
        let mut ctx = TickContext::new(200.0, 200.0, &style);
        let mut surface = RecordingSurface::new(200.0, 200.0);
        let mut text = TextParticles::new(&ctx, &mut surface, seeded()).unwrap();
        let silent = frame_with_spectrum(256, 0);

        let target = text.particles()[0].target;
        text.particles[0].position = target + Vec2::new(EASE_DISTANCE, 0.0);
        ctx.pointer = Some(target + Vec2::new(EASE_DISTANCE - 4.0, 0.0));
        text.update(&silent, &ctx);

        assert!(text.particles()[0].velocity.x > 0.5);
    }
}
