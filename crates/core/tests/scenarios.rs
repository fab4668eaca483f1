use std::path::PathBuf;

use audio_reactive_core::{
    effects::{CircularSpectrum, EASE_DISTANCE},
    AppConfig, AudioConfig, AudioFrame, AudioSource, DrawCommand, EffectState, EffectVariant,
    Engine, EngineConfig, EnginePhase, RecordingSurface, StyleConfig, TickOutcome,
};

fn config(variant: EffectVariant) -> AppConfig {
    AppConfig {
        audio: AudioConfig {
            fft_size: 512,
            ..AudioConfig::default()
        },
        style: StyleConfig {
            variant,
            ..StyleConfig::default()
        },
        engine: EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        },
    }
}

fn frame(value: u8) -> AudioFrame {
    AudioFrame::from_parts(vec![0.0; 512], vec![value; 256]).unwrap()
}

fn silent_wav(name: &str, seconds: u32) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{name}-{}.wav", std::process::id()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for _ in 0..spec.sample_rate * seconds {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn particle_population_is_stable_while_playing_silence() {
    let path = silent_wav("particles-silence", 2);
    let mut engine = Engine::new(config(EffectVariant::Particles)).unwrap();
    let mut surface = RecordingSurface::new(640.0, 360.0);

    engine.stream_mut().load(AudioSource::File(path.clone())).unwrap();
    engine.stream_mut().play().unwrap();

    for tick in 0..120 {
        let outcome = engine.tick(&mut surface, tick as f64 * 1000.0 / 60.0);
        assert_eq!(outcome, TickOutcome::Rendered(EffectVariant::Particles));
    }

    match engine.effect_state(EffectVariant::Particles) {
        Some(EffectState::Particles(field)) => assert_eq!(field.len(), 100),
        other => panic!("unexpected state {other:?}"),
    }
    let _ = std::fs::remove_file(path);
}

#[test]
fn playback_runs_to_the_end_and_stays_active() {
    let path = silent_wav("playback-end", 1);
    let mut engine = Engine::new(config(EffectVariant::SpectrumBars)).unwrap();
    let mut surface = RecordingSurface::new(320.0, 200.0);

    engine.stream_mut().load(AudioSource::File(path.clone())).unwrap();
    assert_eq!(
        engine.tick(&mut surface, 0.0),
        TickOutcome::Waiting(EnginePhase::Ready)
    );
    engine.stream_mut().play().unwrap();
    for tick in 1..=90 {
        engine.tick(&mut surface, tick as f64 * 1000.0 / 60.0);
    }
    assert_eq!(engine.phase(), EnginePhase::Active);
    assert!(!engine.stream().is_playing());
    let _ = std::fs::remove_file(path);
}

#[test]
fn strong_bass_drops_a_block_on_the_first_tick() {
    let mut engine = Engine::new(config(EffectVariant::FallingBlocks)).unwrap();
    let mut surface = RecordingSurface::new(240.0, 400.0);

    engine.tick_with_frame(&mut surface, &frame(255), 0.0);
    match engine.effect_state(EffectVariant::FallingBlocks) {
        Some(EffectState::FallingBlocks(stack)) => assert!(!stack.active_pieces().is_empty()),
        other => panic!("unexpected state {other:?}"),
    }
}

#[test]
fn silent_ring_sits_on_the_base_radius() {
    let mut engine = Engine::new(config(EffectVariant::Circular)).unwrap();
    let mut surface = RecordingSurface::new(400.0, 400.0);
    engine.tick_with_frame(&mut surface, &frame(0), 0.0);

    let center = glam::Vec2::splat(200.0);
    let radius = CircularSpectrum::base_radius(400.0, 400.0);
    let mut ticks = 0;
    for command in surface.commands() {
        if let DrawCommand::StrokePath { path, .. } = command {
            for point in path.points() {
                assert!((point.distance(center) - radius).abs() < 1e-3);
            }
            ticks += 1;
        }
    }
    assert_eq!(ticks, 180);
}

#[test]
fn waterfall_history_is_bounded_by_height() {
    let mut engine = Engine::new(config(EffectVariant::AudioWaterfall)).unwrap();
    let mut surface = RecordingSurface::new(256.0, 101.0);
    for tick in 0..200 {
        engine.tick_with_frame(&mut surface, &frame((tick % 255) as u8), tick as f64 * 16.0);
    }
    match engine.effect_state(EffectVariant::AudioWaterfall) {
        Some(EffectState::AudioWaterfall(waterfall)) => assert_eq!(waterfall.len(), 50),
        other => panic!("unexpected state {other:?}"),
    }
}

#[test]
fn text_particles_reach_their_targets() {
    let mut config = config(EffectVariant::ParticleText);
    config.style.text = "HEY".to_string();
    config.style.text_size = 60.0;
    let mut engine = Engine::new(config).unwrap();
    let mut surface = RecordingSurface::new(320.0, 240.0);
    let silent = frame(0);

    let mut closest: Option<Vec<f32>> = None;
    for tick in 0..600 {
        engine.tick_with_frame(&mut surface, &silent, tick as f64 * 16.0);
        let Some(EffectState::ParticleText(text)) = engine.effect_state(EffectVariant::ParticleText)
        else {
            panic!("text state missing");
        };
        let distances: Vec<f32> = text.distances().collect();
        closest = Some(match closest {
            None => distances,
            Some(best) => best.iter().zip(&distances).map(|(a, b)| a.min(*b)).collect(),
        });
    }

    let closest = closest.unwrap();
    assert!(!closest.is_empty());
    assert!(closest.iter().all(|d| *d < EASE_DISTANCE));
}

#[test]
fn a_malformed_frame_skips_one_tick_only() {
    let mut engine = Engine::new(config(EffectVariant::DigitalRipple)).unwrap();
    let mut surface = RecordingSurface::new(320.0, 240.0);

    let mut broken = frame(100);
    broken.waveform[3] = f32::NAN;
    assert!(matches!(
        engine.tick_with_frame(&mut surface, &broken, 0.0),
        TickOutcome::Skipped(_)
    ));
    assert_eq!(
        engine.tick_with_frame(&mut surface, &frame(100), 16.0),
        TickOutcome::Rendered(EffectVariant::DigitalRipple)
    );
}

#[test]
fn unknown_containers_are_rejected() {
    let mut engine = Engine::new(config(EffectVariant::Waveform)).unwrap();
    let err = engine
        .stream_mut()
        .load(AudioSource::File(PathBuf::from("song.m4p")))
        .unwrap_err();
    assert!(err.to_string().contains("unsupported audio format"));
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[test]
fn every_variant_renders_through_the_engine() {
    let mut engine = Engine::new(config(EffectVariant::SpectrumBars)).unwrap();
    let mut surface = RecordingSurface::new(320.0, 240.0);
    for (i, variant) in EffectVariant::ALL.into_iter().enumerate() {
        engine.select(variant);
        surface.clear();
        let outcome = engine.tick_with_frame(&mut surface, &frame(220), i as f64 * 16.0);
        assert_eq!(outcome, TickOutcome::Rendered(variant));
        assert!(surface.draw_count() > 0, "{variant} drew nothing");
    }
    assert_eq!(engine.retained_variants().len(), EffectVariant::ALL.len());
}
