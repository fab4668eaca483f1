use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    AudioConfig, AudioFrame, PlaybackClock, Result, SpectralAnalyzer, VisualizerError,
};

/// Containers that wrap protected content; rejected before any decode attempt.
const PROTECTED_EXTENSIONS: &[&str] = &["m4p", "aa", "aax"];

/// A playable audio resource.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Local file handled by the decoder.
    File(PathBuf),
    /// Remote resource; only decoders that can stream accept it.
    Url(String),
    /// PCM that has already been decoded by the host (mono, `[-1, 1]`).
    Samples { samples: Vec<f32>, sample_rate: u32 },
}

impl AudioSource {
    /// Lower-cased container extension, if the source has one.
    pub fn extension(&self) -> Option<String> {
        let raw = match self {
            AudioSource::File(path) => path.extension()?.to_str()?.to_string(),
            AudioSource::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let name = path.rsplit('/').next().unwrap_or(path);
                Path::new(name).extension()?.to_str()?.to_string()
            }
            AudioSource::Samples { .. } => return None,
        };
        Some(raw.to_ascii_lowercase())
    }

    fn describe(&self) -> String {
        match self {
            AudioSource::File(path) => path.display().to_string(),
            AudioSource::Url(url) => url.clone(),
            AudioSource::Samples { samples, .. } => format!("{} in-memory samples", samples.len()),
        }
    }
}

/// Decoded mono PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Platform decoder collaborator.
pub trait AudioDecoder {
    /// Lower-cased extensions this decoder can open.
    fn extensions(&self) -> &[&str];

    fn decode(&self, source: &AudioSource) -> Result<DecodedAudio>;

    fn supports(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }
}

/// RIFF/WAVE decoder backed by `hound`. Multi-channel input is averaged to
/// mono.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn extensions(&self) -> &[&str] {
        &["wav", "wave"]
    }

    fn decode(&self, source: &AudioSource) -> Result<DecodedAudio> {
        let path = match source {
            AudioSource::File(path) => path,
            AudioSource::Url(url) => {
                return Err(VisualizerError::Decode(format!(
                    "`{url}` is remote; streaming requires a host decoder"
                )))
            }
            AudioSource::Samples {
                samples,
                sample_rate,
            } => {
                return Ok(DecodedAudio {
                    samples: samples.clone(),
                    sample_rate: *sample_rate,
                })
            }
        };

        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Playback state of the loaded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
    /// The playhead reached the end of the clip.
    Ended,
}

/// Owns the decoded clip, the transport and the spectral analyzer, and
/// publishes one [`AudioFrame`] per tick while playing.
pub struct AudioFeatureStream {
    decoder: Box<dyn AudioDecoder>,
    analyzer: SpectralAnalyzer,
    clip: Option<DecodedAudio>,
    clock: PlaybackClock,
    transport: TransportState,
    volume: f32,
    window: Vec<f32>,
    frame: Arc<AudioFrame>,
}

impl AudioFeatureStream {
    /// Creates a stream that decodes WAV files.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        Self::with_decoder(config, Box::new(WavDecoder))
    }

    pub fn with_decoder(config: &AudioConfig, decoder: Box<dyn AudioDecoder>) -> Result<Self> {
        let analyzer = SpectralAnalyzer::new(config)?;
        let fft_size = analyzer.fft_size();
        Ok(Self {
            decoder,
            analyzer,
            clip: None,
            clock: PlaybackClock::default(),
            transport: TransportState::Stopped,
            volume: 1.0,
            window: vec![0.0; fft_size],
            frame: Arc::new(AudioFrame::silent(fft_size)),
        })
    }

    /// Loads a new clip, replacing any previous one.
    ///
    /// Unknown or protected containers fail with
    /// [`VisualizerError::UnsupportedFormat`] before the decoder runs. A
    /// successful load primes one analysis cycle so the stream is ready.
    pub fn load(&mut self, source: AudioSource) -> Result<()> {
        if let Some(extension) = source.extension() {
            if PROTECTED_EXTENSIONS.contains(&extension.as_str()) {
                return Err(VisualizerError::UnsupportedFormat(format!(
                    "`{}` is a protected `.{extension}` container",
                    source.describe()
                )));
            }
            if !self.decoder.supports(&extension) {
                return Err(VisualizerError::UnsupportedFormat(format!(
                    "`{}`: `.{extension}` is not decodable (supported: {})",
                    source.describe(),
                    self.decoder.extensions().join(", ")
                )));
            }
        } else if !matches!(source, AudioSource::Samples { .. }) {
            return Err(VisualizerError::UnsupportedFormat(format!(
                "`{}` has no recognisable container extension",
                source.describe()
            )));
        }

        let clip = self.decoder.decode(&source)?;
        if clip.sample_rate == 0 {
            return Err(VisualizerError::Decode("sample rate must be non-zero".into()));
        }

        tracing::debug!(
            source = %source.describe(),
            sample_rate = clip.sample_rate,
            seconds = clip.duration().as_secs_f64(),
            "audio clip loaded"
        );

        self.clock = PlaybackClock::new(clip.duration());
        self.clip = Some(clip);
        self.transport = TransportState::Stopped;
        self.analyzer.reset();
        self.analyze_at_playhead()?;
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        self.control("play", |stream| {
            if stream.transport == TransportState::Ended {
                stream.clock.reset();
            }
            stream.transport = TransportState::Playing;
        })
    }

    pub fn pause(&mut self) -> Result<()> {
        self.control("pause", |stream| {
            if stream.transport == TransportState::Playing {
                stream.transport = TransportState::Paused;
            }
        })
    }

    pub fn stop(&mut self) -> Result<()> {
        self.control("stop", |stream| {
            stream.transport = TransportState::Stopped;
            stream.clock.reset();
        })
    }

    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.control("seek", |stream| {
            stream.clock.seek(seconds);
            if stream.transport == TransportState::Ended && !stream.clock.is_finished() {
                stream.transport = TransportState::Paused;
            }
        })
    }

    /// Sets the output gain, clamped to `[0, 1]`. Usable before a clip loads.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_ready(&self) -> bool {
        self.frame.ready
    }

    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn position(&self) -> Duration {
        self.clock.position()
    }

    pub fn duration(&self) -> Duration {
        self.clock.duration()
    }

    pub fn fft_size(&self) -> usize {
        self.analyzer.fft_size()
    }

    /// The most recently published frame.
    pub fn frame(&self) -> Arc<AudioFrame> {
        self.frame.clone()
    }

    /// Runs one analysis tick. Returns the new frame while playing, `None`
    /// otherwise (the previous frame stays published).
    pub fn tick(&mut self, delta: Duration) -> Result<Option<Arc<AudioFrame>>> {
        if self.transport != TransportState::Playing {
            return Ok(None);
        }

        let finished = self.clock.advance(delta);
        self.analyze_at_playhead()?;
        if finished {
            tracing::debug!("playback reached the end of the clip");
            self.transport = TransportState::Ended;
        }
        Ok(Some(self.frame.clone()))
    }

    fn control(&mut self, action: &'static str, apply: impl FnOnce(&mut Self)) -> Result<()> {
        match self.require_ready(action) {
            Ok(()) => {
                apply(self);
                Ok(())
            }
            Err(VisualizerError::NotReady(what)) => {
                tracing::debug!(action = what, "ignoring transport call before audio is ready");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn require_ready(&self, action: &'static str) -> Result<()> {
        if self.clip.is_some() && self.is_ready() {
            Ok(())
        } else {
            Err(VisualizerError::NotReady(action))
        }
    }

    /// Fills the analysis window with the samples that end at the playhead,
    /// zero padded before the start of the clip.
    fn analyze_at_playhead(&mut self) -> Result<()> {
        let Some(clip) = self.clip.as_ref() else {
            return Ok(());
        };

        let size = self.window.len();
        let end = (self.clock.position().as_secs_f64() * clip.sample_rate as f64) as usize;
        let end = end.min(clip.samples.len());
        let start = end.saturating_sub(size);
        let available = &clip.samples[start..end];
        let padding = size - available.len();

        self.window[..padding].iter_mut().for_each(|v| *v = 0.0);
        for (slot, sample) in self.window[padding..].iter_mut().zip(available) {
            *slot = sample * self.volume;
        }

        self.frame = Arc::new(self.analyzer.analyze(&self.window)?);
        Ok(())
    }
}

impl fmt::Debug for AudioFeatureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFeatureStream")
            .field("analyzer", &self.analyzer)
            .field("loaded", &self.clip.is_some())
            .field("transport", &self.transport)
            .field("position", &self.clock.position())
            .field("volume", &self.volume)
            .finish()
    }
}
