use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Color, EffectVariant, Gradient, Result, VisualizerError};

/// Largest accepted particle-text font size in pixels.
pub const MAX_TEXT_SIZE: f32 = 2048.0;

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub style: StyleConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.style.validate()?;
        self.engine.validate()
    }
}

/// Configuration of the spectral analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per analysis window. Must be a power of two.
    pub fft_size: usize,
    /// Time constant of the exponential spectrum smoothing, in `[0, 1]`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(VisualizerError::config(format!(
                "fft_size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(VisualizerError::config("smoothing must lie in [0, 1]"));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(VisualizerError::config(
                "min_decibels must be lower than max_decibels",
            ));
        }
        Ok(())
    }
}

/// Caller-facing style: the active variant plus the knobs shared by effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub variant: EffectVariant,
    pub gradient_start: Color,
    pub gradient_end: Color,
    pub density: f32,
    pub text: String,
    pub text_size: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            variant: EffectVariant::SpectrumBars,
            gradient_start: Color::rgb(0x9c, 0x27, 0xb0),
            gradient_end: Color::rgb(0x3f, 0x51, 0xb5),
            density: 1.0,
            text: "SOUND".to_string(),
            text_size: 80.0,
        }
    }
}

impl StyleConfig {
    pub fn gradient(&self) -> Gradient {
        Gradient::new(self.gradient_start, self.gradient_end)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(VisualizerError::config("density must be a positive number"));
        }
        if self.text.trim().is_empty() {
            return Err(VisualizerError::config("particle text must not be empty"));
        }
        if !(self.text_size.is_finite() && self.text_size > 0.0) {
            return Err(VisualizerError::config("text_size must be a positive number"));
        }
        if self.text_size > MAX_TEXT_SIZE {
            return Err(VisualizerError::config(format!(
                "text_size must not exceed {MAX_TEXT_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Block grid dimensions for the falling-block automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub cols: usize,
    pub rows: usize,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { cols: 12, rows: 20 }
    }
}

/// Engine-level behaviour that is not part of the visual style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long an inactive variant keeps its state. `None` keeps it forever.
    pub retention_ms: Option<u64>,
    /// Seed for every effect RNG. `None` draws from the OS.
    pub seed: Option<u64>,
    pub grid: GridSize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.grid.cols == 0 || self.grid.rows == 0 {
            return Err(VisualizerError::config(format!(
                "grid must be at least 1x1, got {}x{}",
                self.grid.cols, self.grid.rows
            )));
        }
        Ok(())
    }
}
