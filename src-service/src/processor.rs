//! Windowed FFT over the sample ring buffer.
//!
//! This module contains the TransformPipeline, which turns the most recent
//! analysis window of each declared channel into power and phase arrays.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use spectrascope_common::{
    ChannelSpectrum, DisplayMetadata, TransformResult, MAX_FFT_SIZE, MIN_FFT_SIZE,
};
use tracing::{debug, trace};

use crate::mask::ChannelMask;
use crate::registry::ChannelRegistry;
use crate::ring_buffer::{SampleRingBuffer, WindowSource};

/// Round a requested FFT size to the nearest supported power of two.
///
/// Uses `round(log2(clamp(requested, 4, 2048)))`, so 300 becomes 256.
pub fn round_fft_size(requested: usize) -> usize {
    let clamped = requested.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE) as f64;
    1 << (clamped.log2().round() as u32)
}

/// Window function applied to each analysis window before the FFT.
pub trait SpectrumWindow: Send + Sync {
    /// Coefficients for a window of `len` samples.
    fn coefficients(&self, len: usize) -> Vec<f32>;
}

/// Hann (raised cosine) window.
#[derive(Debug, Default, Clone, Copy)]
pub struct HannWindow;

impl SpectrumWindow for HannWindow {
    fn coefficients(&self, len: usize) -> Vec<f32> {
        if len < 2 {
            return vec![1.0; len];
        }
        (0..len)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos()))
            .collect()
    }
}

/// Buffers reused by every transform.
struct FftWorkspace {
    fft_size: usize,
    /// FFT planner/executor
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed window coefficients
    window: Vec<f32>,
    /// Raw samples extracted from the ring buffer
    samples: Vec<i64>,
    /// In-place FFT buffer
    spectrum: Vec<Complex<f32>>,
    /// Scratch space required by the FFT
    scratch: Vec<Complex<f32>>,
}

impl FftWorkspace {
    fn new(fft_size: usize, window: &dyn SpectrumWindow) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            window: window.coefficients(fft_size),
            samples: vec![0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    /// Transform the window at `start` and write power/phase into `out`.
    fn transform(
        &mut self,
        buffer: &SampleRingBuffer,
        start: usize,
        source: WindowSource,
        out: &mut ChannelSpectrum,
    ) {
        buffer.extract_window_into(start, source, &mut self.samples);

        for ((bin, &sample), &weight) in self
            .spectrum
            .iter_mut()
            .zip(self.samples.iter())
            .zip(self.window.iter())
        {
            *bin = Complex::new(sample as f32 * weight, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let scale = 2.0 / self.fft_size as f32;
        let shift = u32::from(out.magnitude_shift);
        for ((c, power), phase) in self.spectrum[..self.fft_size / 2]
            .iter()
            .zip(out.power.iter_mut())
            .zip(out.phase.iter_mut())
        {
            let magnitude = (c.norm() * scale).round() as u64;
            *power = (magnitude >> shift).min(u64::from(u32::MAX)) as u32;
            *phase = c.im.atan2(c.re);
        }
    }
}

/// Computes per-channel spectra from the ring buffer on each fired cycle.
///
/// The FFT size is fixed at construction and every result array is sized
/// once; cycles overwrite them in place.
pub struct TransformPipeline {
    fft_size: usize,
    first_bin: usize,
    last_bin: usize,
    /// Magnitude shift used for the combined spectrum
    combined_shift: u8,
    workspace: FftWorkspace,
    result: TransformResult,
}

impl TransformPipeline {
    /// Create a pipeline with a Hann window.
    pub fn new(
        requested_size: usize,
        first_bin: usize,
        last_bin: Option<usize>,
        combined_shift: u8,
    ) -> Self {
        Self::with_window(requested_size, first_bin, last_bin, combined_shift, &HannWindow)
    }

    /// Create a pipeline with a custom window function.
    pub fn with_window(
        requested_size: usize,
        first_bin: usize,
        last_bin: Option<usize>,
        combined_shift: u8,
        window: &dyn SpectrumWindow,
    ) -> Self {
        let fft_size = round_fft_size(requested_size);
        if fft_size != requested_size {
            debug!(
                "[Pipeline] FFT size {} rounded to {}",
                requested_size, fft_size
            );
        }

        let bins = fft_size / 2;
        let last_bin = last_bin.unwrap_or(bins - 1).min(bins - 1);
        let first_bin = first_bin.min(last_bin);

        Self {
            fft_size,
            first_bin,
            last_bin,
            combined_shift,
            workspace: FftWorkspace::new(fft_size, window),
            result: TransformResult {
                cycle: 0,
                fft_size,
                first_bin,
                last_bin,
                combined: true,
                channels: Vec::new(),
            },
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn first_bin(&self) -> usize {
        self.first_bin
    }

    pub fn last_bin(&self) -> usize {
        self.last_bin
    }

    /// Number of bins in each result array
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Latest snapshot, once a cycle has run.
    pub fn result(&self) -> Option<&TransformResult> {
        (self.result.cycle > 0).then_some(&self.result)
    }

    /// Run one analysis cycle.
    ///
    /// Each declared channel is transformed from the `fft_size` most recent
    /// slots; disabled channels get zeroed arrays. With no declared channels a
    /// single spectrum of the channel-summed window is produced. Returns
    /// `None` without touching the previous result when fewer than `fft_size`
    /// slots have ever been admitted.
    pub fn run_cycle(
        &mut self,
        buffer: &SampleRingBuffer,
        registry: &ChannelRegistry,
        mask: ChannelMask,
    ) -> Option<&TransformResult> {
        if buffer.admitted() < self.fft_size as u64 {
            trace!(
                "[Pipeline] Skipping cycle: {} of {} samples admitted",
                buffer.admitted(),
                self.fft_size
            );
            return None;
        }

        let start = buffer.latest_window_start(self.fft_size);
        self.sync_channels(registry);

        if registry.is_empty() {
            let out = &mut self.result.channels[0];
            out.enabled = true;
            self.workspace
                .transform(buffer, start, WindowSource::Combined(mask), out);
        } else {
            for (channel, out) in self.result.channels.iter_mut().enumerate() {
                out.enabled = mask.is_enabled(channel);
                if out.enabled {
                    self.workspace
                        .transform(buffer, start, WindowSource::Channel(channel), out);
                } else {
                    out.zero();
                }
            }
        }

        self.result.combined = registry.is_empty();
        self.result.cycle += 1;
        Some(&self.result)
    }

    /// Match the result channels to the registry, allocating arrays only for
    /// newly declared slots.
    fn sync_channels(&mut self, registry: &ChannelRegistry) {
        let bins = self.bins();
        let channels = &mut self.result.channels;

        if registry.is_empty() {
            channels.truncate(1);
            if channels.is_empty() {
                channels.push(ChannelSpectrum::zeroed(bins, "", self.combined_shift));
            }
            let combined = &mut channels[0];
            combined.label.clear();
            combined.magnitude_shift = self.combined_shift;
            combined.display = DisplayMetadata::default();
            return;
        }

        channels.truncate(registry.len());
        for (channel, entry) in registry.iter().enumerate() {
            match channels.get_mut(channel) {
                Some(out) => {
                    if out.label != entry.label {
                        out.label.clone_from(&entry.label);
                    }
                    out.magnitude_shift = entry.magnitude_shift;
                    out.display = entry.display;
                }
                None => {
                    let mut out =
                        ChannelSpectrum::zeroed(bins, entry.label.clone(), entry.magnitude_shift);
                    out.display = entry.display;
                    channels.push(out);
                }
            }
        }
    }

    /// Forget the published result; array storage is kept.
    pub fn reset(&mut self) {
        self.result.cycle = 0;
        self.result.combined = true;
        for channel in &mut self.result.channels {
            channel.enabled = false;
            channel.zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectrascope_common::ChannelDefinition;

    fn sine(bin: usize, fft_size: usize, amplitude: f32, i: usize) -> i32 {
        let phase = 2.0 * std::f32::consts::PI * bin as f32 * i as f32 / fft_size as f32;
        (amplitude * phase.sin()).round() as i32
    }

    fn peak_bin(power: &[u32]) -> usize {
        power
            .iter()
            .enumerate()
            .max_by_key(|&(_, &p)| p)
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn fft_size_rounds_to_nearest_power_of_two() {
        assert_eq!(round_fft_size(300), 256);
        assert_eq!(round_fft_size(400), 512);
        assert_eq!(round_fft_size(512), 512);
        assert_eq!(round_fft_size(0), 4);
        assert_eq!(round_fft_size(5), 4);
        assert_eq!(round_fft_size(1_000_000), 2048);
    }

    #[test]
    fn hann_window_is_zero_at_edges() {
        let window = HannWindow.coefficients(8);
        assert_eq!(window.len(), 8);
        assert!(window[0].abs() < 1e-6);
        assert!(window[7].abs() < 1e-6);
        assert!(window[3] > 0.9);
    }

    #[test]
    fn bin_range_is_clamped() {
        let pipeline = TransformPipeline::new(64, 40, Some(100), 0);
        assert_eq!(pipeline.last_bin(), 31);
        assert_eq!(pipeline.first_bin(), 31);

        let pipeline = TransformPipeline::new(64, 2, None, 0);
        assert_eq!((pipeline.first_bin(), pipeline.last_bin()), (2, 31));
    }

    #[test]
    fn incomplete_window_does_not_run() {
        let mut pipeline = TransformPipeline::new(64, 0, None, 0);
        let mut buffer = SampleRingBuffer::new(256);
        let mask = ChannelMask::default();
        for i in 0..63 {
            buffer.write(mask, 0, i).unwrap();
        }

        assert!(pipeline
            .run_cycle(&buffer, &ChannelRegistry::new(), mask)
            .is_none());
        assert!(pipeline.result().is_none());
    }

    #[test]
    fn combined_spectrum_peaks_at_signal_bin() {
        let fft_size = 64;
        let mut pipeline = TransformPipeline::new(fft_size, 0, None, 0);
        let mut buffer = SampleRingBuffer::new(256);
        let mask = ChannelMask::default();
        for i in 0..100 {
            buffer.write(mask, 0, sine(5, fft_size, 1000.0, i)).unwrap();
        }

        let result = pipeline
            .run_cycle(&buffer, &ChannelRegistry::new(), mask)
            .unwrap();
        assert!(result.combined);
        assert_eq!(result.channels.len(), 1);
        assert_eq!(result.channels[0].power.len(), 32);
        assert_eq!(peak_bin(&result.channels[0].power), 5);
        // Hann halves the amplitude of a bin-centred tone
        let peak = result.channels[0].power[5];
        assert!((450..=550).contains(&peak), "peak was {}", peak);
    }

    #[test]
    fn display_metadata_follows_registry() {
        let mut registry = ChannelRegistry::new();
        let mut def = ChannelDefinition::new("left", 0);
        def.display.tall = 120;
        def.display.color = 0x00ff_00ff;
        registry.define(&def);

        let mut buffer = SampleRingBuffer::new(64);
        let mask = ChannelMask::default();
        for i in 0..16 {
            buffer.write(mask, 0, i).unwrap();
        }

        let mut pipeline = TransformPipeline::new(16, 0, None, 0);
        let result = pipeline.run_cycle(&buffer, &registry, mask).unwrap();
        assert_eq!(result.channels[0].display.tall, 120);
        assert_eq!(result.channels[0].display.color, 0x00ff_00ff);

        // Combined mode has no definition to copy from
        let result = pipeline
            .run_cycle(&buffer, &ChannelRegistry::new(), mask)
            .unwrap();
        assert_eq!(result.channels[0].display, Default::default());
    }

    #[test]
    fn magnitude_shift_scales_power() {
        let fft_size = 64;
        let mut registry = ChannelRegistry::new();
        registry.define(&ChannelDefinition::new("raw", 0));
        registry.define(&ChannelDefinition::new("shifted", 3));
        let mask = ChannelMask::from_bits(0b11);

        let mut buffer = SampleRingBuffer::new(256);
        for i in 0..fft_size {
            let v = sine(4, fft_size, 8000.0, i);
            buffer.write(mask, 0, v).unwrap();
            buffer.write(mask, 1, v).unwrap();
        }

        let mut pipeline = TransformPipeline::new(fft_size, 0, None, 0);
        let result = pipeline.run_cycle(&buffer, &registry, mask).unwrap();
        let raw = result.channels[0].power[4];
        let shifted = result.channels[1].power[4];
        assert_eq!(shifted, raw >> 3);
        assert_eq!(result.channels[1].magnitude_shift, 3);
    }

    #[test]
    fn disabled_channel_is_zero_filled() {
        let fft_size = 32;
        let mut registry = ChannelRegistry::new();
        for label in ["a", "b", "c"] {
            registry.define(&ChannelDefinition::new(label, 0));
        }
        let write_mask = ChannelMask::from_bits(0b111);
        let mut buffer = SampleRingBuffer::new(128);
        for i in 0..fft_size {
            for channel in 0..3 {
                buffer
                    .write(write_mask, channel, sine(channel + 2, fft_size, 500.0, i))
                    .unwrap();
            }
        }

        let mut pipeline = TransformPipeline::new(fft_size, 0, None, 0);
        let result = pipeline
            .run_cycle(&buffer, &registry, ChannelMask::from_bits(0b101))
            .unwrap();

        assert_eq!(result.channels.len(), 3);
        assert!(!result.channels[1].enabled);
        assert!(result.channels[1].is_zero());
        assert!(!result.channels[0].is_zero());
        assert!(!result.channels[2].is_zero());
        assert_eq!(peak_bin(&result.channels[2].power), 4);
    }

    #[test]
    fn reset_forgets_result() {
        let mut pipeline = TransformPipeline::new(16, 0, None, 0);
        let mut buffer = SampleRingBuffer::new(64);
        let mask = ChannelMask::default();
        for i in 0..16 {
            buffer.write(mask, 0, i * 10).unwrap();
        }
        assert!(pipeline
            .run_cycle(&buffer, &ChannelRegistry::new(), mask)
            .is_some());

        pipeline.reset();
        assert!(pipeline.result().is_none());
    }
}
