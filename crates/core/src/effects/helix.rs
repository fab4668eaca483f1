use std::f32::consts::{PI, TAU};

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

use super::{bin_index, Effect, TickContext};
use crate::{AudioFrame, Color, Gradient, Paint, Path, Rect, Stroke, Surface};

const BASE_PAIRS: f32 = 35.0;
const PAIR_SPACING: f32 = 30.0;
const NODE_SIZE: f32 = 8.0;
const ROTATION_SPEED: f32 = 0.005;
const PITCH: f32 = 100.0;
const PERSPECTIVE: f32 = 500.0;
const CAMERA_Z: f32 = 150.0;
/// Tick length the rotation speed is tuned for.
const NOMINAL_DELTA_MS: f32 = 1000.0 / 60.0;
const PAIR_START: Color = Color::rgb(0x4c, 0xaf, 0x50);
const PAIR_END: Color = Color::rgb(0x8b, 0xc3, 0x4a);
const BACKBONE: Color = Color::rgba(255, 255, 255, 0.2);

/// One node of the double helix. Even indices form the first strand, odd
/// indices the second; nodes `2k` and `2k + 1` are a base pair sharing `z`.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixNode {
    pub z: f32,
    pub color: Color,
    pub base_color: Color,
    pub pair_color: Color,
    /// Position in model space, centred on the helix axis.
    pub offset: Vec2,
    /// Projected surface position.
    pub screen: Vec2,
    /// Projected radius.
    pub size: f32,
}

/// A rotating double helix under a simple perspective projection.
#[derive(Debug)]
pub struct Helix {
    nodes: Vec<HelixNode>,
    rotation: f32,
    rng: StdRng,
}

impl Helix {
    pub fn new(ctx: &TickContext<'_>, rng: StdRng) -> Self {
        let pairs = Self::pairs_for(ctx.style.density);
        let strand = ctx.gradient();
        let rungs = Gradient::new(PAIR_START, PAIR_END);

        let mut nodes = Vec::with_capacity(pairs * 2);
        for pair in 0..pairs {
            let t = pair as f32 / pairs as f32;
            let base_color = strand.color_at(t);
            let pair_color = rungs.color_at(t);
            for color in [base_color, pair_color] {
                nodes.push(HelixNode {
                    z: pair as f32 * PAIR_SPACING,
                    color,
                    base_color,
                    pair_color,
                    offset: Vec2::ZERO,
                    screen: Vec2::ZERO,
                    size: NODE_SIZE,
                });
            }
        }
        Self {
            nodes,
            rotation: 0.0,
            rng,
        }
    }

    fn pairs_for(density: f32) -> usize {
        (BASE_PAIRS * density).round().max(1.0) as usize
    }

    pub(super) fn is_stale(&self, ctx: &TickContext<'_>) -> bool {
        self.nodes.len() != Self::pairs_for(ctx.style.density) * 2
    }

    pub fn nodes(&self) -> &[HelixNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Node indices from farthest to nearest.
    pub fn draw_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by(|a, b| self.nodes[*b].z.total_cmp(&self.nodes[*a].z));
        order
    }

    fn depth_level(&self, frame: &AudioFrame, z: f32) -> f32 {
        let span = (self.nodes.len() / 2) as f32 * PAIR_SPACING;
        let index = (z / span * frame.spectrum.len() as f32) as usize;
        frame.level(index)
    }
}

impl Effect for Helix {
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        let energy = frame.average_energy();
        let bass = frame.bass_energy();
        let wave_energy = frame.waveform_energy();
        let seconds = (ctx.time_ms * 0.001) as f32;

        self.rotation += ROTATION_SPEED * (ctx.delta_ms / NOMINAL_DELTA_MS) * (1.0 + energy);
        let radius = 50.0 + energy * 30.0;
        let center = ctx.center();
        let count = self.nodes.len();
        let bins = frame.spectrum.len();

        for (i, node) in self.nodes.iter_mut().enumerate() {
            let angle = node.z / PITCH * TAU + self.rotation;
            let spiral = radius * (1.0 + (angle * 3.0 + seconds).sin() * 0.1 * bass);
            let phase = if i % 2 == 0 { 0.0 } else { PI };
            let level = frame.level(bin_index(i, count, bins));

            node.offset = Vec2::from_angle(angle + phase) * (spiral + level * 20.0);

            let wave = (seconds + i as f32 * 0.1).sin() * wave_energy * 30.0;
            let scale = PERSPECTIVE / (PERSPECTIVE + node.z - CAMERA_Z + wave);
            node.screen = center + node.offset * scale;
            node.size = NODE_SIZE * scale * (1.0 + level * 0.5);
        }
    }

    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        surface.fill_rect(Rect::full(ctx.width, ctx.height), &Paint::Solid(Color::BLACK));
        let energy = frame.average_energy();

        let backbone = Stroke::new(BACKBONE, 2.0);
        for first in [0, 1] {
            let strand = Path::polyline(self.nodes.iter().skip(first).step_by(2).map(|n| n.screen));
            surface.stroke_path(&strand, &backbone);
        }

        for pair in self.nodes.chunks_exact(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let pair_level = self.depth_level(frame, a.z);
            let paint = Paint::linear(a.screen, b.screen)
                .stop(0.0, a.base_color)
                .stop(1.0, b.pair_color);
            let rung = Path::line(a.screen, b.screen);
            surface.stroke_path(&rung, &Stroke::new(paint, 1.0 + pair_level * 2.0));
            if pair_level > 0.7 {
                surface.stroke_path(&rung, &Stroke::new(Color::WHITE.with_alpha(0.5), 1.0));
            }
        }

        for index in self.draw_order() {
            let node = &self.nodes[index];
            let level = self.depth_level(frame, node.z);
            let paint = Paint::Solid(node.color);
            if level > 0.8 {
                let pixel = 2.0 + level * 3.0;
                for px in -2..=2 {
                    for py in -2..=2 {
                        if self.rng.random::<f32>() < level * 0.8 {
                            let corner = node.screen + Vec2::new(px as f32, py as f32) * pixel;
                            surface.fill_rect(Rect::new(corner.x, corner.y, pixel, pixel), &paint);
                        }
                    }
                }
            } else {
                surface.fill_circle(node.screen, node.size, &paint);
                surface.fill_circle(
                    node.screen - Vec2::splat(node.size * 0.3),
                    node.size * 0.2,
                    &Paint::Solid(Color::WHITE.with_alpha(0.7)),
                );
            }
        }

        if energy > 0.6 {
            surface.fill_rect(
                Rect::full(ctx.width, ctx.height),
                &Paint::Solid(Color::WHITE.with_alpha(energy * 0.1)),
            );
            let center = ctx.center();
            for _ in 0..5 {
                let beam = center
                    + Vec2::new(
                        (self.rng.random::<f32>() - 0.5) * ctx.width * 0.8,
                        (self.rng.random::<f32>() - 0.5) * ctx.height * 0.8,
                    );
                let reach = 100.0 * energy;
                let glow = Paint::radial(beam, 0.0, reach)
                    .stop(0.0, Color::WHITE.with_alpha(energy * 0.3))
                    .stop(1.0, Color::WHITE.with_alpha(0.0));
                surface.fill_circle(beam, reach, &glow);
            }
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
    fn node_count_follows_density() {
        let style = StyleConfig::default();
        let helix = Helix::new(&TickContext::new(400.0, 400.0, &style), seeded());
        assert_eq!(helix.node_count(), 70);

        let sparse = StyleConfig {
            density: 0.5,
            ..StyleConfig::default()
        };
        let ctx = TickContext::new(400.0, 400.0, &sparse);
        assert!(helix.is_stale(&ctx));
        assert_eq!(Helix::new(&ctx, seeded()).node_count(), 36);
    }

    #[test]
    fn rotation_scales_with_tick_length() {
        let style = StyleConfig::default();
        let mut ctx = TickContext::new(400.0, 400.0, &style);
        let silent = frame_with_spectrum(256, 0);

        let mut nominal = Helix::new(&ctx, seeded());
        nominal.update(&silent, &ctx);
        nominal.update(&silent, &ctx);

        let mut slow = Helix::new(&ctx, seeded());
        ctx.delta_ms = 2000.0 / 60.0;
        slow.update(&silent, &ctx);

        assert!((nominal.rotation() - slow.rotation()).abs() < 1e-6);
        assert!((nominal.rotation() - 2.0 * ROTATION_SPEED).abs() < 1e-6);
    }

    #[test]
    fn pairs_sit_on_opposite_sides_of_the_axis() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(400.0, 400.0, &style);
        let mut helix = Helix::new(&ctx, seeded());
        helix.update(&frame_with_spectrum(256, 0), &ctx);

        for pair in helix.nodes().chunks_exact(2) {
            assert!((pair[0].offset + pair[1].offset).length() < 1e-3);
            assert!((pair[0].offset.length() - 50.0).abs() < 1e-3);
        }
    }

    #[test]
    fn nearer_nodes_are_drawn_last_and_larger() {
        let style = StyleConfig::default();
        let ctx = TickContext::new(400.0, 400.0, &style);
        let mut helix = Helix::new(&ctx, seeded());
        helix.update(&frame_with_spectrum(256, 0), &ctx);

        let order = helix.draw_order();
        let nodes = helix.nodes();
        for pair in order.windows(2) {
            assert!(nodes[pair[0]].z >= nodes[pair[1]].z);
        }
        let farthest = &nodes[order[0]];
        let nearest = &nodes[*order.last().unwrap()];
        assert!(nearest.size > farthest.size);
    }
}
