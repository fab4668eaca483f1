//! Core library of the audio-reactive visualisation engine.
//!
//! Data flows one way per tick: the [`AudioFeatureStream`] publishes an
//! [`AudioFrame`], the [`Engine`] hands it to the active effect, and the
//! effect updates its private state before drawing onto a [`Surface`].
//! Each module owns one subsystem (feature extraction, transport, drawing
//! primitives, effect simulations, orchestration).

pub mod analysis;
pub mod audio;
pub mod color;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod record;
pub mod render;
pub mod timeline;

pub use analysis::{AudioFrame, SpectralAnalyzer};
pub use audio::{AudioDecoder, AudioFeatureStream, AudioSource, DecodedAudio, TransportState, WavDecoder};
pub use color::{Color, Gradient};
pub use config::{AppConfig, AudioConfig, EngineConfig, GridSize, StyleConfig};
pub use effects::{Effect, EffectState, EffectVariant, TickContext};
pub use engine::{Engine, EnginePhase, TickOutcome};
pub use error::{Result, VisualizerError};
pub use record::{DrawCommand, RecordingSurface};
pub use render::{ColorStop, Paint, Path, PathSegment, PixelBuffer, Rect, Stroke, Surface};
pub use timeline::{FrameClock, FrameTime, PlaybackClock};
