use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{Effect, TickContext};
use crate::{AudioFrame, Color, Gradient, Paint, Rect, Surface};

const BASE_COUNT: f32 = 100.0;
const MIN_SIZE: f32 = 2.0;
const MAX_SIZE: f32 = 8.0;
const MAX_SPEED: f32 = 2.0;
const BASE_LIFE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub size: f32,
    pub color: Color,
    pub speed: f32,
    pub angle: f32,
    /// Remaining ticks; the particle is reborn when this reaches zero.
    pub life: f32,
    pub opacity: f32,
}

/// Fixed population of drifting particles that are reborn instead of dying.
#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(ctx: &TickContext<'_>, mut rng: StdRng) -> Self {
        let gradient = ctx.gradient();
        let particles = (0..Self::count_for(ctx.style.density))
            .map(|_| Self::spawn(&mut rng, &gradient, ctx.width, ctx.height))
            .collect();
        Self { particles, rng }
    }

    /// Population for a style density.
    pub fn count_for(density: f32) -> usize {
        (BASE_COUNT * density).round().max(1.0) as usize
    }

    pub(super) fn is_stale(&self, ctx: &TickContext<'_>) -> bool {
        self.particles.len() != Self::count_for(ctx.style.density)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    fn spawn(rng: &mut StdRng, gradient: &Gradient, width: f32, height: f32) -> Particle {
        Particle {
            position: Vec2::new(rng.random::<f32>() * width, rng.random::<f32>() * height),
            size: MIN_SIZE + rng.random::<f32>() * (MAX_SIZE - MIN_SIZE),
            color: gradient.color_at(rng.random::<f32>()),
            speed: rng.random::<f32>() * MAX_SPEED,
            angle: rng.random::<f32>() * TAU,
            life: BASE_LIFE + rng.random::<f32>() * BASE_LIFE,
            opacity: 0.7 + rng.random::<f32>() * 0.3,
        }
    }
}

/// Wraps a coordinate that left `[0, limit]` to the opposite edge.
fn wrap(value: f32, limit: f32) -> f32 {
    if value < 0.0 {
        limit
    } else if value > limit {
        0.0
    } else {
        value
    }
}

impl Effect for ParticleField {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let boost = 1.0 + frame.volume * 3.0;
        for particle in &mut self.particles {
            let moved = particle.position + Vec2::from_angle(particle.angle) * particle.speed * boost;
            particle.position = Vec2::new(wrap(moved.x, ctx.width), wrap(moved.y, ctx.height));
            particle.life -= 1.0;

            if particle.life <= 0.0 {
                // Rebirth keeps size, color and speed.
                particle.position = Vec2::new(
                    self.rng.random::<f32>() * ctx.width,
                    self.rng.random::<f32>() * ctx.height,
                );
                particle.angle = self.rng.random::<f32>() * TAU;
                particle.life = BASE_LIFE + self.rng.random::<f32>() * BASE_LIFE;
                particle.opacity = 0.7 + self.rng.random::<f32>() * 0.3;
            }
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.clear_rect(Rect::full(ctx.width, ctx.height));

        let grow = 1.0 + frame.volume * 2.0;
        for particle in &self.particles {
            let alpha = (particle.opacity * particle.life / 200.0).clamp(0.0, 1.0);
            surface.set_global_alpha(alpha);
            surface.fill_circle(
                particle.position,
                particle.size * grow,
                &Paint::Solid(particle.color),
            );
        }
        surface.set_global_alpha(1.0);
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
    fn population_follows_density() {
        assert_eq!(ParticleField::count_for(1.0), 100);
        assert_eq!(ParticleField::count_for(0.25), 25);
        assert_eq!(ParticleField::count_for(0.001), 1);
    }

    #[test]
    fn expired_particles_are_reborn_inside_bounds() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(200.0, 100.0, &style);
        let mut field = ParticleField::new(&ctx, seeded());
        let frame = frame_with_spectrum(256, 0);

        for particle in &mut field.particles {
            particle.life = 1.0;
        }
        field.update(&frame, &ctx);

        for particle in field.particles() {
            assert!(particle.life >= BASE_LIFE && particle.life <= 2.0 * BASE_LIFE);
            assert!((0.0..=200.0).contains(&particle.position.x));
            assert!((0.0..=100.0).contains(&particle.position.y));
        }
    }

    #[test]
    fn population_is_stable_over_time() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(320.0, 240.0, &style);
        let mut field = ParticleField::new(&ctx, seeded());
        let frame = frame_with_spectrum(256, 90);
        let mut surface = crate::RecordingSurface::new(320.0, 240.0);

        for _ in 0..500 {
            field.update(&frame, &ctx);
            field.render(&mut surface, &frame, &ctx);
        }
        assert_eq!(field.len(), 100);
        assert!(field.particles().iter().all(|p| p.life > 0.0 && p.size > 0.0));
    }

    #[test]
    fn density_change_marks_state_stale() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(100.0, 100.0, &style);
        let field = ParticleField::new(&ctx, seeded());

        let denser = StyleConfig {
            density: 2.0,
            ..StyleConfig::default()
        };
        assert!(field.is_stale(&TickContext::new(100.0, 100.0, &denser)));
        assert!(!field.is_stale(&ctx));
    }
}
