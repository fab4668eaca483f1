use std::{fs::File, io::BufWriter, path::PathBuf, time::Duration};

use audio_reactive_core::{
    AppConfig, AudioFeatureStream, AudioSource, EffectVariant, Engine, RecordingSurface,
    TickOutcome,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> audio_reactive_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            config,
            variant,
            frames,
            fps,
            width,
            height,
            output,
        } => {
            let options = RenderOptions {
                frames,
                fps,
                width,
                height,
            };
            run_render(&input, config.as_ref(), variant, options, &output)
        }
        Commands::Analyze {
            input,
            config,
            fps,
            output,
        } => run_analyze(&input, config.as_ref(), fps, &output),
        Commands::Variants => {
            for variant in EffectVariant::ALL {
                println!("{variant}");
            }
            Ok(())
        }
    }
}

struct RenderOptions {
    frames: usize,
    fps: f64,
    width: f32,
    height: f32,
}

fn load_config(path: Option<&PathBuf>) -> audio_reactive_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_render(
    input: &PathBuf,
    config: Option<&PathBuf>,
    variant: Option<EffectVariant>,
    options: RenderOptions,
    output: &PathBuf,
) -> audio_reactive_core::Result<()> {
    let mut config = load_config(config)?;
    if let Some(variant) = variant {
        config.style.variant = variant;
    }
    tracing::info!(?input, variant = %config.style.variant, frames = options.frames, "rendering");

    let mut engine = Engine::new(config)?;
    engine.stream_mut().load(AudioSource::File(input.clone()))?;
    engine.stream_mut().play()?;

    let mut surface = RecordingSurface::new(options.width, options.height);
    let frame_ms = 1000.0 / options.fps.max(1.0);
    let mut summary = Vec::with_capacity(options.frames);
    for index in 0..options.frames {
        surface.clear();
        let outcome = engine.tick(&mut surface, index as f64 * frame_ms);
        let status = match &outcome {
            TickOutcome::Rendered(_) => "rendered".to_string(),
            TickOutcome::Waiting(phase) => format!("waiting ({phase:?})"),
            TickOutcome::Skipped(reason) => format!("skipped: {reason}"),
        };
        summary.push(json!({
            "index": index,
            "status": status,
            "draw_calls": surface.draw_count(),
        }));
    }

    let report = json!({
        "variant": engine.active_variant().name(),
        "width": options.width,
        "height": options.height,
        "frames": summary,
        "last_frame": surface.commands(),
    });
    serde_json::to_writer_pretty(BufWriter::new(File::create(output)?), &report)?;
    tracing::info!(?output, "render report written");
    Ok(())
}

fn run_analyze(
    input: &PathBuf,
    config: Option<&PathBuf>,
    fps: f64,
    output: &PathBuf,
) -> audio_reactive_core::Result<()> {
    let config = load_config(config)?;
    tracing::info!(?input, ?output, "running offline analysis");

    let mut stream = AudioFeatureStream::new(&config.audio)?;
    stream.load(AudioSource::File(input.clone()))?;
    stream.play()?;

    let step = Duration::from_secs_f64(1.0 / fps.max(1.0));
    let mut frames = Vec::new();
    while let Some(frame) = stream.tick(step)? {
        frames.push(json!({
            "position_ms": stream.position().as_secs_f64() * 1000.0,
            "volume": frame.volume,
            "bass": frame.bass_energy(),
            "energy": frame.average_energy(),
            "high": frame.high_energy(),
        }));
    }
    tracing::info!(frames = frames.len(), "analysis finished");

    serde_json::to_writer_pretty(BufWriter::new(File::create(output)?), &frames)?;
    Ok(())
}

fn parse_variant(raw: &str) -> Result<EffectVariant, String> {
    raw.parse().map_err(|err: audio_reactive_core::VisualizerError| err.to_string())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless audio-reactive effect renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a WAV file through one effect and record the draw calls.
    Render {
        /// WAV file that drives the effect.
        input: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Effect to render; overrides the configured style.
        #[arg(short, long, value_parser = parse_variant)]
        variant: Option<EffectVariant>,
        #[arg(long, default_value_t = 120)]
        frames: usize,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, default_value_t = 800.0)]
        width: f32,
        #[arg(long, default_value_t = 600.0)]
        height: f32,
        /// Where the JSON render report is written.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Analyse a WAV file and persist per-tick signal features.
    Analyze {
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        /// Output path for the feature dump.
        output: PathBuf,
    },
    /// List the available effects.
    Variants,
}
