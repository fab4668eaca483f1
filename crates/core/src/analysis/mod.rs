use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{AudioConfig, Result, VisualizerError};

const BASS_BINS: usize = 10;
const HIGH_BINS: usize = 20;

/// One tick's bundle of signal features.
///
/// `spectrum.len() == waveform.len() / 2` and
/// `amplitude_bins.len() == waveform.len()` for every frame the crate
/// publishes. Silence yields an all-zero waveform and spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Time-domain samples in `[-1, 1]`.
    pub waveform: Vec<f32>,
    /// Byte-scaled magnitudes, low to high frequency.
    pub spectrum: Vec<u8>,
    /// Byte-quantised mirror of `waveform` (128 is the centre line).
    pub amplitude_bins: Vec<u8>,
    /// Root-mean-square of `waveform`.
    pub volume: f32,
    /// False until the first full analysis cycle completed.
    pub ready: bool,
}

impl AudioFrame {
    /// All-zero frame for a window of `fft_size` samples.
    pub fn silent(fft_size: usize) -> Self {
        Self {
            waveform: vec![0.0; fft_size],
            spectrum: vec![0; fft_size / 2],
            amplitude_bins: vec![128; fft_size],
            volume: 0.0,
            ready: false,
        }
    }

    /// Builds a frame from a waveform and spectrum supplied by a host,
    /// deriving `amplitude_bins` and `volume`.
    pub fn from_parts(waveform: Vec<f32>, spectrum: Vec<u8>) -> Result<Self> {
        let waveform: Vec<f32> = waveform.into_iter().map(sanitize).collect();
        let frame = Self {
            amplitude_bins: waveform.iter().map(|v| amplitude_byte(*v)).collect(),
            volume: compute_rms(&waveform),
            waveform,
            spectrum,
            ready: true,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Checks the buffer length and range invariants.
    pub fn validate(&self) -> Result<()> {
        let n = self.waveform.len();
        if n < 2 || !n.is_power_of_two() {
            return Err(VisualizerError::malformed(format!(
                "waveform length {n} is not a power of two"
            )));
        }
        if self.spectrum.len() != n / 2 {
            return Err(VisualizerError::malformed(format!(
                "spectrum has {} bins, expected {}",
                self.spectrum.len(),
                n / 2
            )));
        }
        if self.amplitude_bins.len() != n {
            return Err(VisualizerError::malformed(format!(
                "amplitude bins have {} entries, expected {n}",
                self.amplitude_bins.len()
            )));
        }
        if self
            .waveform
            .iter()
            .any(|v| !v.is_finite() || !(-1.0..=1.0).contains(v))
        {
            return Err(VisualizerError::malformed("waveform sample outside [-1, 1]"));
        }
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            return Err(VisualizerError::malformed("volume must be finite and >= 0"));
        }
        Ok(())
    }

    /// Spectrum bin `index` normalised to `[0, 1]`; out of range reads as 0.
    pub fn level(&self, index: usize) -> f32 {
        self.spectrum
            .get(index)
            .map(|v| *v as f32 / 255.0)
            .unwrap_or(0.0)
    }

    /// Spectrum sampled at a fraction `[0, 1)` of the bin range.
    pub fn level_at(&self, fraction: f32) -> f32 {
        if self.spectrum.is_empty() {
            return 0.0;
        }
        let index = (fraction.clamp(0.0, 1.0) * self.spectrum.len() as f32) as usize;
        self.level(index.min(self.spectrum.len() - 1))
    }

    /// Waveform sample at `index`; out of range reads as 0.
    pub fn sample(&self, index: usize) -> f32 {
        self.waveform.get(index).copied().unwrap_or(0.0)
    }

    /// Mean normalised magnitude of the lowest ten bins.
    pub fn bass_energy(&self) -> f32 {
        mean_level(self.spectrum.iter().take(BASS_BINS), BASS_BINS)
    }

    /// Mean normalised magnitude of the whole spectrum.
    pub fn average_energy(&self) -> f32 {
        mean_level(self.spectrum.iter(), self.spectrum.len())
    }

    /// Mean normalised magnitude of the highest twenty bins.
    pub fn high_energy(&self) -> f32 {
        let skip = self.spectrum.len().saturating_sub(HIGH_BINS);
        mean_level(self.spectrum.iter().skip(skip), HIGH_BINS)
    }

    /// Mean absolute waveform amplitude.
    pub fn waveform_energy(&self) -> f32 {
        if self.waveform.is_empty() {
            return 0.0;
        }
        self.waveform.iter().map(|v| v.abs()).sum::<f32>() / self.waveform.len() as f32
    }
}

fn mean_level<'a>(values: impl Iterator<Item = &'a u8>, divisor: usize) -> f32 {
    if divisor == 0 {
        return 0.0;
    }
    values.map(|v| *v as f32 / 255.0).sum::<f32>() / divisor as f32
}

/// Spectral analyzer with the conventions of a browser `AnalyserNode`:
/// Blackman window, smoothed magnitudes mapped from a decibel window onto
/// bytes.
pub struct SpectralAnalyzer {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl SpectralAnalyzer {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;

        let size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let fft = FftResources {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            fft_size: size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window: (0..size).map(|i| blackman_value(i, size)).collect(),
            smoothed: vec![0.0; size / 2],
            fft,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins in every produced spectrum.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyses exactly `fft_size` samples and returns a ready frame.
    pub fn analyze(&mut self, samples: &[f32]) -> Result<AudioFrame> {
        if samples.len() != self.fft_size {
            return Err(VisualizerError::malformed(format!(
                "analysis window has {} samples, expected {}",
                samples.len(),
                self.fft_size
            )));
        }

        let waveform: Vec<f32> = samples
            .iter()
            .map(|v| sanitize(*v).clamp(-1.0, 1.0))
            .collect();

        for ((slot, sample), weight) in self
            .fft
            .input
            .iter_mut()
            .zip(&waveform)
            .zip(&self.window)
        {
            *slot = sample * weight;
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        let min_decibels = self.min_decibels;
        let range = self.max_decibels - min_decibels;
        let spectrum = self
            .smoothed
            .iter_mut()
            .zip(&self.fft.spectrum)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                *smoothed = sanitize(tau * *smoothed + (1.0 - tau) * magnitude);
                if *smoothed <= 0.0 {
                    return 0;
                }
                let db = 20.0 * smoothed.log10();
                let scaled = 255.0 / range * (db - min_decibels);
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect();

        Ok(AudioFrame {
            amplitude_bins: waveform.iter().map(|v| amplitude_byte(*v)).collect(),
            volume: compute_rms(&waveform),
            waveform,
            spectrum,
            ready: true,
        })
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn amplitude_byte(sample: f32) -> u8 {
    (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8
}

pub(crate) fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn blackman_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_analyzer(fft_size: usize) -> SpectralAnalyzer {
        SpectralAnalyzer::new(&AudioConfig {
            fft_size,
            ..Default::default()
        })
        .unwrap()
    }

    fn sine(len: usize, cycles: f32, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn silence_produces_zeroed_frame() {
        let mut analyzer = build_analyzer(1024);
        let frame = analyzer.analyze(&vec![0.0; 1024]).unwrap();

        assert_eq!(frame.volume, 0.0);
        assert_eq!(frame.spectrum.len(), 512);
        assert!(frame.spectrum.iter().all(|v| *v == 0));
        assert!(frame.amplitude_bins.iter().all(|v| *v == 128));
        assert!(frame.ready);
        frame.validate().unwrap();
    }

    #[test]
    fn tone_peaks_in_matching_bin() {
        let mut analyzer = build_analyzer(1024);
        let frame = analyzer.analyze(&sine(1024, 32.0, 0.8)).unwrap();

        let peak = frame
            .spectrum
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        assert!((31..=33).contains(&peak), "peak at bin {peak}");
        assert!(frame.spectrum[peak] > 0);
        assert!((frame.volume - 0.8 / 2f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn clamps_and_sanitises_input() {
        let mut analyzer = build_analyzer(64);
        let mut samples = vec![3.0; 64];
        samples[0] = f32::NAN;
        samples[1] = f32::NEG_INFINITY;

        let frame = analyzer.analyze(&samples).unwrap();
        frame.validate().unwrap();
        assert_eq!(frame.waveform[0], 0.0);
        assert_eq!(frame.waveform[2], 1.0);
        assert_eq!(frame.amplitude_bins[2], 255);
        assert!(frame.volume.is_finite());
    }

    #[test]
    fn smoothing_carries_energy_into_silence() {
        let mut analyzer = build_analyzer(256);
        analyzer.analyze(&sine(256, 8.0, 1.0)).unwrap();
        let frame = analyzer.analyze(&vec![0.0; 256]).unwrap();
        assert!(frame.spectrum[8] > 0);

        analyzer.reset();
        let frame = analyzer.analyze(&vec![0.0; 256]).unwrap();
        assert!(frame.spectrum.iter().all(|v| *v == 0));
    }

    #[test]
    fn rejects_wrong_window_length() {
        let mut analyzer = build_analyzer(256);
        assert!(matches!(
            analyzer.analyze(&[0.0; 100]),
            Err(VisualizerError::MalformedFrame(_))
        ));
    }

    #[test]
    fn band_energies_read_expected_regions() {
        let mut spectrum = vec![0u8; 512];
        spectrum[..10].iter_mut().for_each(|v| *v = 255);
        let frame = AudioFrame::from_parts(vec![0.0; 1024], spectrum).unwrap();

        assert!((frame.bass_energy() - 1.0).abs() < 1e-6);
        assert!((frame.average_energy() - 10.0 / 512.0).abs() < 1e-6);
        assert_eq!(frame.high_energy(), 0.0);
        assert_eq!(frame.level(10_000), 0.0);
    }

    #[test]
    fn from_parts_rejects_mismatched_lengths() {
        let err = AudioFrame::from_parts(vec![0.0; 1024], vec![0; 100]).unwrap_err();
        assert!(matches!(err, VisualizerError::MalformedFrame(_)));
    }
}
