//! Visualisation effects.
//!
//! Every variant implements [`Effect`]: `update` advances whatever state
//! must persist between frames and `render` turns it into draw calls.
//! [`EffectState`] is the tagged union the engine stores per variant.

use std::{fmt, str::FromStr};

use glam::Vec2;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{AudioFrame, Gradient, GridSize, Result, StyleConfig, Surface, VisualizerError};

mod blocks;
mod garden;
mod helix;
mod lip_sync;
mod mappers;
mod meteors;
mod particles;
mod ripple;
mod text;
mod waterfall;

pub use blocks::{BlockStack, Piece, SHAPES};
pub use garden::{Flower, Garden, Leaf};
pub use helix::{Helix, HelixNode};
pub use lip_sync::{EyeState, LipSync};
pub use mappers::{CircularSpectrum, Kaleidoscope, OrganicForm, SpectrumBars, WaveformLine};
pub use meteors::{Meteor, MeteorShower};
pub use particles::{Particle, ParticleField};
pub use ripple::{DigitalRipple, Glyph, Ripple};
pub use text::{TextParticle, TextParticles, EASE_DISTANCE};
pub use waterfall::{Waterfall, WATERFALL_BINS};

/// Selectable visualisation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectVariant {
    #[default]
    SpectrumBars,
    Waveform,
    Circular,
    Particles,
    Kaleidoscope,
    AudioWaterfall,
    OrganicForm,
    #[serde(alias = "tetris")]
    FallingBlocks,
    LipSync,
    MusicMeteor,
    SoundGarden,
    DnaHelix,
    DigitalRipple,
    ParticleText,
}

impl EffectVariant {
    pub const ALL: [EffectVariant; 14] = [
        EffectVariant::SpectrumBars,
        EffectVariant::Waveform,
        EffectVariant::Circular,
        EffectVariant::Particles,
        EffectVariant::Kaleidoscope,
        EffectVariant::AudioWaterfall,
        EffectVariant::OrganicForm,
        EffectVariant::FallingBlocks,
        EffectVariant::LipSync,
        EffectVariant::MusicMeteor,
        EffectVariant::SoundGarden,
        EffectVariant::DnaHelix,
        EffectVariant::DigitalRipple,
        EffectVariant::ParticleText,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectVariant::SpectrumBars => "spectrum-bars",
            EffectVariant::Waveform => "waveform",
            EffectVariant::Circular => "circular",
            EffectVariant::Particles => "particles",
            EffectVariant::Kaleidoscope => "kaleidoscope",
            EffectVariant::AudioWaterfall => "audio-waterfall",
            EffectVariant::OrganicForm => "organic-form",
            EffectVariant::FallingBlocks => "falling-blocks",
            EffectVariant::LipSync => "lip-sync",
            EffectVariant::MusicMeteor => "music-meteor",
            EffectVariant::SoundGarden => "sound-garden",
            EffectVariant::DnaHelix => "dna-helix",
            EffectVariant::DigitalRipple => "digital-ripple",
            EffectVariant::ParticleText => "particle-text",
        }
    }

    /// Position in [`EffectVariant::ALL`].
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }
}

impl fmt::Display for EffectVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectVariant {
    type Err = VisualizerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        if wanted == "tetris" {
            return Ok(EffectVariant::FallingBlocks);
        }
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == wanted)
            .ok_or_else(|| VisualizerError::config(format!("unknown effect variant `{s}`")))
    }
}

/// Everything an effect may read during one tick besides the audio frame.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub width: f32,
    pub height: f32,
    /// Milliseconds since the engine's first tick.
    pub time_ms: f64,
    /// Milliseconds since the previous tick.
    pub delta_ms: f32,
    pub style: &'a StyleConfig,
    pub grid: GridSize,
    pub pointer: Option<Vec2>,
}

impl<'a> TickContext<'a> {
    /// Context at time zero with a nominal 60 Hz delta.
    pub fn new(width: f32, height: f32, style: &'a StyleConfig) -> Self {
        Self {
            width,
            height,
            time_ms: 0.0,
            delta_ms: 1000.0 / 60.0,
            style,
            grid: GridSize::default(),
            pointer: None,
        }
    }

    pub fn gradient(&self) -> Gradient {
        self.style.gradient()
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Per-variant simulation and drawing.
pub trait Effect {
    /// Advances the persistent state by one tick.
    fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>);

    /// Draws the current state.
    fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>);
}

/// State owned by one effect variant.
#[derive(Debug)]
pub enum EffectState {
    SpectrumBars(SpectrumBars),
    Waveform(WaveformLine),
    Circular(CircularSpectrum),
    Particles(ParticleField),
    Kaleidoscope(Kaleidoscope),
    AudioWaterfall(Waterfall),
    OrganicForm(OrganicForm),
    FallingBlocks(BlockStack),
    LipSync(LipSync),
    MusicMeteor(MeteorShower),
    SoundGarden(Garden),
    DnaHelix(Helix),
    DigitalRipple(DigitalRipple),
    ParticleText(TextParticles),
}

impl EffectState {
    /// Builds fresh state for `variant`. Only the text effect touches the
    /// surface, to rasterise its glyph mask once.
    pub fn create(
        variant: EffectVariant,
        ctx: &TickContext<'_>,
        surface: &mut dyn Surface,
        rng: StdRng,
    ) -> Result<Self> {
        let state = match variant {
            EffectVariant::SpectrumBars => EffectState::SpectrumBars(SpectrumBars),
            EffectVariant::Waveform => EffectState::Waveform(WaveformLine::default()),
            EffectVariant::Circular => EffectState::Circular(CircularSpectrum),
            EffectVariant::Particles => {
                EffectState::Particles(ParticleField::new(ctx, rng))
            }
            EffectVariant::Kaleidoscope => EffectState::Kaleidoscope(Kaleidoscope::default()),
            EffectVariant::AudioWaterfall => {
                EffectState::AudioWaterfall(Waterfall::new(ctx.height))
            }
            EffectVariant::OrganicForm => EffectState::OrganicForm(OrganicForm),
            EffectVariant::FallingBlocks => {
                EffectState::FallingBlocks(BlockStack::new(ctx.grid, rng)?)
            }
            EffectVariant::LipSync => EffectState::LipSync(LipSync::new(rng)),
            EffectVariant::MusicMeteor => EffectState::MusicMeteor(MeteorShower::new(rng)),
            EffectVariant::SoundGarden => EffectState::SoundGarden(Garden::new(rng)),
            EffectVariant::DnaHelix => EffectState::DnaHelix(Helix::new(ctx, rng)),
            EffectVariant::DigitalRipple => EffectState::DigitalRipple(DigitalRipple::new(rng)),
            EffectVariant::ParticleText => {
                EffectState::ParticleText(TextParticles::new(ctx, surface, rng)?)
            }
        };
        Ok(state)
    }

    pub fn variant(&self) -> EffectVariant {
        match self {
            EffectState::SpectrumBars(_) => EffectVariant::SpectrumBars,
            EffectState::Waveform(_) => EffectVariant::Waveform,
            EffectState::Circular(_) => EffectVariant::Circular,
            EffectState::Particles(_) => EffectVariant::Particles,
            EffectState::Kaleidoscope(_) => EffectVariant::Kaleidoscope,
            EffectState::AudioWaterfall(_) => EffectVariant::AudioWaterfall,
            EffectState::OrganicForm(_) => EffectVariant::OrganicForm,
            EffectState::FallingBlocks(_) => EffectVariant::FallingBlocks,
            EffectState::LipSync(_) => EffectVariant::LipSync,
            EffectState::MusicMeteor(_) => EffectVariant::MusicMeteor,
            EffectState::SoundGarden(_) => EffectVariant::SoundGarden,
            EffectState::DnaHelix(_) => EffectVariant::DnaHelix,
            EffectState::DigitalRipple(_) => EffectVariant::DigitalRipple,
            EffectState::ParticleText(_) => EffectVariant::ParticleText,
        }
    }

    /// Whether the structural configuration the state was built from no
    /// longer matches `ctx`.
    pub fn is_stale(&self, ctx: &TickContext<'_>) -> bool {
        match self {
            EffectState::Particles(field) => field.is_stale(ctx),
            EffectState::FallingBlocks(stack) => stack.is_stale(ctx),
            EffectState::DnaHelix(helix) => helix.is_stale(ctx),
            EffectState::ParticleText(text) => text.is_stale(ctx),
            _ => false,
        }
    }

    pub fn as_effect_mut(&mut self) -> &mut dyn Effect {
        match self {
            EffectState::SpectrumBars(effect) => effect,
            EffectState::Waveform(effect) => effect,
            EffectState::Circular(effect) => effect,
            EffectState::Particles(effect) => effect,
            EffectState::Kaleidoscope(effect) => effect,
            EffectState::AudioWaterfall(effect) => effect,
            EffectState::OrganicForm(effect) => effect,
            EffectState::FallingBlocks(effect) => effect,
            EffectState::LipSync(effect) => effect,
            EffectState::MusicMeteor(effect) => effect,
            EffectState::SoundGarden(effect) => effect,
            EffectState::DnaHelix(effect) => effect,
            EffectState::DigitalRipple(effect) => effect,
            EffectState::ParticleText(effect) => effect,
        }
    }

    pub fn update(&mut self, frame: &AudioFrame, ctx: &TickContext<'_>) {
        self.as_effect_mut().update(frame, ctx);
    }

    pub fn render(&mut self, surface: &mut dyn Surface, frame: &AudioFrame, ctx: &TickContext<'_>) {
        self.as_effect_mut().render(surface, frame, ctx);
    }
}

/// RNG for one variant: reproducible when a seed is configured.
pub fn effect_rng(seed: Option<u64>, variant: EffectVariant) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ variant.index() as u64),
        None => StdRng::from_os_rng(),
    }
}

/// Spectrum index at fraction `position / count` of `len` bins.
fn bin_index(position: usize, count: usize, len: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (position as f32 / count as f32 * len as f32).floor() as usize
}
