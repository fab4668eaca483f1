//! Per-tick orchestration.
//!
//! The [`Engine`] owns the feature stream, one [`EffectState`] per variant
//! that has been shown, and the frame clock. Each tick pulls a frame,
//! hands it to the active variant and draws onto the caller's surface.
//! Faults in a single tick are logged and reported as
//! [`TickOutcome::Skipped`]; the next tick proceeds normally.

use std::{collections::HashMap, time::Duration};

use glam::Vec2;

use crate::{
    effects::effect_rng, AppConfig, AudioFeatureStream, AudioFrame, EffectState, EffectVariant,
    FrameClock, FrameTime, Result, StyleConfig, Surface, TickContext, TransportState,
};

/// Coarse lifecycle of the engine as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// No analysed audio yet.
    Idle,
    /// Audio is loaded and analysed but the transport is stopped.
    Ready,
    /// Playing, paused or finished: frames are rendered.
    Active,
}

/// What happened during one call to [`Engine::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing was drawn because the engine is not active yet.
    Waiting(EnginePhase),
    /// The active variant updated and rendered.
    Rendered(EffectVariant),
    /// The tick was dropped after a recoverable fault.
    Skipped(String),
}

#[derive(Debug)]
struct Slot {
    state: EffectState,
    last_active_ms: f64,
}

#[derive(Debug)]
pub struct Engine {
    config: AppConfig,
    stream: AudioFeatureStream,
    states: HashMap<EffectVariant, Slot>,
    clock: FrameClock,
    pointer: Option<Vec2>,
    phase: EnginePhase,
}

impl Engine {
    /// Validates `config` and builds an engine backed by the WAV decoder.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let stream = AudioFeatureStream::new(&config.audio)?;
        Ok(Self::with_stream(config, stream))
    }

    /// Uses a stream the caller prepared, e.g. with a custom decoder.
    pub fn with_stream(config: AppConfig, stream: AudioFeatureStream) -> Self {
        Self {
            config,
            stream,
            states: HashMap::new(),
            clock: FrameClock::new(),
            pointer: None,
            phase: EnginePhase::Idle,
        }
    }

    pub fn stream(&self) -> &AudioFeatureStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut AudioFeatureStream {
        &mut self.stream
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn style(&self) -> &StyleConfig {
        &self.config.style
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn active_variant(&self) -> EffectVariant {
        self.config.style.variant
    }

    /// Switches the active variant. State of the previous variant is kept
    /// until the retention window evicts it.
    pub fn select(&mut self, variant: EffectVariant) {
        if self.config.style.variant != variant {
            tracing::info!(from = %self.config.style.variant, to = %variant, "switching effect");
            self.config.style.variant = variant;
        }
    }

    /// Replaces the style. Variants whose structure depends on it rebuild
    /// on their next tick.
    pub fn set_style(&mut self, style: StyleConfig) -> Result<()> {
        style.validate()?;
        self.select(style.variant);
        self.config.style = style;
        Ok(())
    }

    /// Pointer position in surface coordinates, for effects that react to it.
    pub fn set_pointer(&mut self, pointer: Option<Vec2>) {
        self.pointer = pointer;
    }

    /// Drops the state of `variant`. Returns whether any state existed.
    pub fn reset(&mut self, variant: EffectVariant) -> bool {
        let existed = self.states.remove(&variant).is_some();
        if existed {
            tracing::debug!(%variant, "effect state reset");
        }
        existed
    }

    pub fn effect_state(&self, variant: EffectVariant) -> Option<&EffectState> {
        self.states.get(&variant).map(|slot| &slot.state)
    }

    /// Variants that currently hold state.
    pub fn retained_variants(&self) -> Vec<EffectVariant> {
        let mut variants: Vec<_> = self.states.keys().copied().collect();
        variants.sort_by_key(|variant| variant.index());
        variants
    }

    /// Advances the stream by the time since the previous tick and renders
    /// the active variant with the resulting frame.
    pub fn tick(&mut self, surface: &mut dyn Surface, timestamp_ms: f64) -> TickOutcome {
        let time = self.clock.tick(timestamp_ms);
        let phase = self.observe_phase();
        if phase != EnginePhase::Active {
            return TickOutcome::Waiting(phase);
        }

        let delta = Duration::try_from_secs_f64((time.delta_ms as f64 / 1000.0).max(0.0))
            .unwrap_or_default();
        let frame = match self.stream.tick(delta) {
            Ok(Some(frame)) => frame,
            Ok(None) => self.stream.frame(),
            Err(err) => {
                tracing::warn!(error = %err, "audio analysis failed, skipping tick");
                return TickOutcome::Skipped(err.to_string());
            }
        };
        self.observe_phase();
        self.render_frame(surface, &frame, time)
    }

    /// Renders a frame supplied by the host instead of the internal stream.
    pub fn tick_with_frame(
        &mut self,
        surface: &mut dyn Surface,
        frame: &AudioFrame,
        timestamp_ms: f64,
    ) -> TickOutcome {
        let time = self.clock.tick(timestamp_ms);
        if !frame.ready {
            return TickOutcome::Waiting(EnginePhase::Idle);
        }
        if let Err(err) = frame.validate() {
            tracing::warn!(error = %err, "dropping malformed frame");
            return TickOutcome::Skipped(err.to_string());
        }
        self.set_phase(EnginePhase::Active);
        self.render_frame(surface, frame, time)
    }

    fn observe_phase(&mut self) -> EnginePhase {
        let phase = if !self.stream.is_ready() {
            EnginePhase::Idle
        } else {
            match self.stream.transport() {
                TransportState::Stopped => EnginePhase::Ready,
                TransportState::Playing | TransportState::Paused | TransportState::Ended => {
                    EnginePhase::Active
                }
            }
        };
        self.set_phase(phase);
        phase
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        if phase != self.phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "engine phase changed");
            self.phase = phase;
        }
    }

    fn evict_stale(&mut self, now_ms: f64) {
        let Some(retention) = self.config.engine.retention_ms else {
            return;
        };
        let active = self.config.style.variant;
        self.states.retain(|variant, slot| {
            let keep = *variant == active || now_ms - slot.last_active_ms <= retention as f64;
            if !keep {
                tracing::debug!(%variant, "evicting idle effect state");
            }
            keep
        });
    }

    fn render_frame(
        &mut self,
        surface: &mut dyn Surface,
        frame: &AudioFrame,
        time: FrameTime,
    ) -> TickOutcome {
        self.evict_stale(time.elapsed_ms);

        let variant = self.config.style.variant;
        let ctx = TickContext {
            width: surface.width(),
            height: surface.height(),
            time_ms: time.elapsed_ms,
            delta_ms: time.delta_ms,
            style: &self.config.style,
            grid: self.config.engine.grid,
            pointer: self.pointer,
        };

        let rebuild = self
            .states
            .get(&variant)
            .map_or(true, |slot| slot.state.is_stale(&ctx));
        if rebuild {
            let rng = effect_rng(self.config.engine.seed, variant);
            match EffectState::create(variant, &ctx, surface, rng) {
                Ok(state) => {
                    tracing::debug!(%variant, "effect state created");
                    self.states.insert(
                        variant,
                        Slot {
                            state,
                            last_active_ms: time.elapsed_ms,
                        },
                    );
                }
                Err(err) => {
                    tracing::warn!(%variant, error = %err, "could not build effect state");
                    return TickOutcome::Skipped(err.to_string());
                }
            }
        }

        let Some(slot) = self.states.get_mut(&variant) else {
            return TickOutcome::Skipped(format!("no state for {variant}"));
        };
        slot.state.update(frame, &ctx);
        slot.state.render(surface, frame, &ctx);
        slot.last_active_ms = time.elapsed_ms;
        TickOutcome::Rendered(variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioConfig, AudioSource, EngineConfig, RecordingSurface};

    fn config(variant: EffectVariant) -> AppConfig {
        AppConfig {
            audio: AudioConfig {
                fft_size: 256,
                ..AudioConfig::default()
            },
            style: StyleConfig {
                variant,
                ..StyleConfig::default()
            },
            engine: EngineConfig {
                seed: Some(11),
                ..EngineConfig::default()
            },
        }
    }

    fn tone(seconds: f32) -> AudioSource {
        let sample_rate = 8_000;
        let len = (seconds * sample_rate as f32) as usize;
        AudioSource::Samples {
            samples: (0..len).map(|i| (i as f32 * 0.05).sin() * 0.8).collect(),
            sample_rate,
        }
    }

    fn loud_frame() -> AudioFrame {
        AudioFrame::from_parts(vec![0.0; 256], vec![200; 128]).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = config(EffectVariant::Particles);
        config.engine.grid.cols = 0;
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn waits_until_audio_is_loaded_and_playing() {
        let mut engine = Engine::new(config(EffectVariant::SpectrumBars)).unwrap();
        let mut surface = RecordingSurface::new(200.0, 100.0);

        assert_eq!(
            engine.tick(&mut surface, 0.0),
            TickOutcome::Waiting(EnginePhase::Idle)
        );

        engine.stream_mut().load(tone(1.0)).unwrap();
        assert_eq!(
            engine.tick(&mut surface, 16.0),
            TickOutcome::Waiting(EnginePhase::Ready)
        );
        assert_eq!(surface.draw_count(), 0);

        engine.stream_mut().play().unwrap();
        assert_eq!(
            engine.tick(&mut surface, 32.0),
            TickOutcome::Rendered(EffectVariant::SpectrumBars)
        );
        assert_eq!(engine.phase(), EnginePhase::Active);
        assert!(surface.draw_count() > 0);
    }

    #[test]
    fn pause_keeps_rendering_and_stop_returns_to_ready() {
        let mut engine = Engine::new(config(EffectVariant::Waveform)).unwrap();
        let mut surface = RecordingSurface::new(200.0, 100.0);
        engine.stream_mut().load(tone(1.0)).unwrap();
        engine.stream_mut().play().unwrap();
        engine.tick(&mut surface, 0.0);

        engine.stream_mut().pause().unwrap();
        assert_eq!(
            engine.tick(&mut surface, 16.0),
            TickOutcome::Rendered(EffectVariant::Waveform)
        );
        assert_eq!(engine.phase(), EnginePhase::Active);

        engine.stream_mut().stop().unwrap();
        assert_eq!(
            engine.tick(&mut surface, 32.0),
            TickOutcome::Waiting(EnginePhase::Ready)
        );
    }

    #[test]
    fn malformed_frames_are_skipped_without_losing_state() {
        let mut engine = Engine::new(config(EffectVariant::Particles)).unwrap();
        let mut surface = RecordingSurface::new(200.0, 100.0);

        assert!(matches!(
            engine.tick_with_frame(&mut surface, &loud_frame(), 0.0),
            TickOutcome::Rendered(_)
        ));

        let mut broken = loud_frame();
        broken.spectrum.pop();
        assert!(matches!(
            engine.tick_with_frame(&mut surface, &broken, 16.0),
            TickOutcome::Skipped(_)
        ));
        assert!(engine.effect_state(EffectVariant::Particles).is_some());

        assert!(matches!(
            engine.tick_with_frame(&mut surface, &loud_frame(), 32.0),
            TickOutcome::Rendered(_)
        ));
    }

    #[test]
    fn state_survives_switching_without_retention() {
        let mut engine = Engine::new(config(EffectVariant::FallingBlocks)).unwrap();
        let mut surface = RecordingSurface::new(200.0, 100.0);
        let frame = loud_frame();

        engine.tick_with_frame(&mut surface, &frame, 0.0);
        engine.select(EffectVariant::Circular);
        engine.tick_with_frame(&mut surface, &frame, 100_000.0);

        assert_eq!(
            engine.retained_variants(),
            [EffectVariant::Circular, EffectVariant::FallingBlocks]
        );
    }

    #[test]
    fn retention_window_evicts_idle_variants() {
        let mut config = config(EffectVariant::FallingBlocks);
        config.engine.retention_ms = Some(1_000);
        let mut engine = Engine::new(config).unwrap();
        let mut surface = RecordingSurface::new(200.0, 100.0);
        let frame = loud_frame();

        engine.tick_with_frame(&mut surface, &frame, 0.0);
        engine.select(EffectVariant::Circular);
        engine.tick_with_frame(&mut surface, &frame, 500.0);
        assert!(engine.effect_state(EffectVariant::FallingBlocks).is_some());

        engine.tick_with_frame(&mut surface, &frame, 1_500.0);
        assert!(engine.effect_state(EffectVariant::FallingBlocks).is_none());
        assert!(engine.effect_state(EffectVariant::Circular).is_some());
    }

    #[test]
    fn style_changes_rebuild_structural_state() {
        let mut engine = Engine::new(config(EffectVariant::DnaHelix)).unwrap();
        let mut surface = RecordingSurface::new(200.0, 200.0);
        let frame = loud_frame();
        engine.tick_with_frame(&mut surface, &frame, 0.0);

        let node_count = |engine: &Engine| match engine.effect_state(EffectVariant::DnaHelix) {
            Some(EffectState::DnaHelix(helix)) => helix.node_count(),
            other => panic!("unexpected state {other:?}"),
        };
        assert_eq!(node_count(&engine), 70);

        let denser = StyleConfig {
            density: 2.0,
            ..engine.style().clone()
        };
        engine.set_style(denser).unwrap();
        engine.tick_with_frame(&mut surface, &frame, 16.0);
        assert_eq!(node_count(&engine), 140);

        let invalid = StyleConfig {
            text: String::new(),
            ..engine.style().clone()
        };
        assert!(engine.set_style(invalid).is_err());
    }

    #[test]
    fn reset_drops_state() {
        let mut engine = Engine::new(config(EffectVariant::SoundGarden)).unwrap();
        let mut surface = RecordingSurface::new(100.0, 100.0);
        engine.tick_with_frame(&mut surface, &loud_frame(), 0.0);

        assert!(engine.reset(EffectVariant::SoundGarden));
        assert!(!engine.reset(EffectVariant::SoundGarden));
        assert!(engine.effect_state(EffectVariant::SoundGarden).is_none());
    }
}
