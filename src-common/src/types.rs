//! Shared types for SpectraScope acquisition and analysis.

use serde::{Deserialize, Serialize};

/// Number of channel slots carried by the sample stream.
pub const MAX_CHANNELS: usize = 8;

/// Smallest supported FFT size.
pub const MIN_FFT_SIZE: usize = 4;

/// Largest supported FFT size.
pub const MAX_FFT_SIZE: usize = 2048;

/// Largest magnitude shift a channel may request.
pub const MAX_MAGNITUDE_SHIFT: u8 = 11;

/// Display-only metadata carried with a channel definition.
///
/// The acquisition core never interprets these values; they travel with the
/// channel so the renderer can lay the trace out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    /// Full-scale value of the trace
    #[serde(default)]
    pub high: i64,
    /// Trace height in pixels
    #[serde(default)]
    pub tall: i64,
    /// Baseline offset in pixels
    #[serde(default)]
    pub base: i64,
    /// Grid flags
    #[serde(default)]
    pub grid: i64,
    /// Trace color (opaque to the core)
    #[serde(default)]
    pub color: u32,
}

/// A channel declared by a configuration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    /// Channel label as quoted in the declaration
    pub label: String,
    /// Post-FFT right shift applied to power values (0..=11)
    #[serde(default)]
    pub magnitude: u8,
    #[serde(flatten)]
    pub display: DisplayMetadata,
}

impl ChannelDefinition {
    /// Create a definition with default display metadata.
    pub fn new(label: impl Into<String>, magnitude: u8) -> Self {
        Self {
            label: label.into(),
            magnitude,
            display: DisplayMetadata::default(),
        }
    }
}

/// Configuration applied when the acquisition core is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Requested FFT size (rounded to a supported power of two)
    pub fft_size: usize,
    /// First bin the consumer will read
    pub first_bin: usize,
    /// Last bin the consumer will read (defaults to the last bin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_bin: Option<usize>,
    /// Channel cycles between analysis cycles; 0 selects automatic pacing
    pub update_interval: usize,
    /// Refresh rate automatic pacing aims for (updates per second)
    pub target_update_hz: f64,
    /// Magnitude shift used when no channels are registered
    pub magnitude_shift: u8,
    /// Channels declared up front
    pub channels: Vec<ChannelDefinition>,
    /// Log one overflow warning per this many dropped samples
    pub drop_log_interval: u64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            first_bin: 0,
            last_bin: None,
            update_interval: 0,
            target_update_hz: 30.0,
            magnitude_shift: 0,
            channels: Vec::new(),
            drop_log_interval: 1000,
        }
    }
}

impl SpectrumConfig {
    /// Whether the update interval is paced automatically from the detected rate.
    pub fn is_auto_interval(&self) -> bool {
        self.update_interval == 0
    }
}

/// Packed-data layouts understood by the sample adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackedMode {
    #[serde(rename = "longs_1bit")]
    Longs1Bit,
    #[serde(rename = "longs_2bit")]
    Longs2Bit,
    #[serde(rename = "longs_4bit")]
    Longs4Bit,
    #[serde(rename = "longs_8bit")]
    Longs8Bit,
    #[serde(rename = "longs_16bit")]
    Longs16Bit,
    #[serde(rename = "words_1bit")]
    Words1Bit,
    #[serde(rename = "words_2bit")]
    Words2Bit,
    #[serde(rename = "words_4bit")]
    Words4Bit,
    #[serde(rename = "words_8bit")]
    Words8Bit,
    #[serde(rename = "bytes_1bit")]
    Bytes1Bit,
    #[serde(rename = "bytes_2bit")]
    Bytes2Bit,
    #[serde(rename = "bytes_4bit")]
    Bytes4Bit,
}

impl PackedMode {
    /// Width of each sub-sample in bits.
    pub fn bits_per_sample(self) -> u8 {
        match self {
            PackedMode::Longs1Bit | PackedMode::Words1Bit | PackedMode::Bytes1Bit => 1,
            PackedMode::Longs2Bit | PackedMode::Words2Bit | PackedMode::Bytes2Bit => 2,
            PackedMode::Longs4Bit | PackedMode::Words4Bit | PackedMode::Bytes4Bit => 4,
            PackedMode::Longs8Bit | PackedMode::Words8Bit => 8,
            PackedMode::Longs16Bit => 16,
        }
    }

    /// Width of the packed container in bits.
    pub fn value_size(self) -> u8 {
        match self {
            PackedMode::Longs1Bit
            | PackedMode::Longs2Bit
            | PackedMode::Longs4Bit
            | PackedMode::Longs8Bit
            | PackedMode::Longs16Bit => 32,
            PackedMode::Words1Bit
            | PackedMode::Words2Bit
            | PackedMode::Words4Bit
            | PackedMode::Words8Bit => 16,
            PackedMode::Bytes1Bit | PackedMode::Bytes2Bit | PackedMode::Bytes4Bit => 8,
        }
    }
}

/// Full description of how one packed integer splits into samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PackedFormatRepr", into = "PackedFormatRepr")]
pub struct PackedFormat {
    pub mode: PackedMode,
    pub bits_per_sample: u8,
    pub value_size: u8,
    /// Sign-extend each sub-sample
    pub signed: bool,
    /// Reverse the bit order inside each sub-sample
    pub alternate: bool,
}

impl PackedFormat {
    pub fn new(mode: PackedMode, signed: bool, alternate: bool) -> Self {
        Self {
            mode,
            bits_per_sample: mode.bits_per_sample(),
            value_size: mode.value_size(),
            signed,
            alternate,
        }
    }

    /// Number of sub-samples carried by one packed value.
    pub fn samples_per_value(&self) -> usize {
        (self.value_size / self.bits_per_sample.max(1)) as usize
    }
}

#[derive(Serialize, Deserialize)]
struct PackedFormatRepr {
    mode: PackedMode,
    #[serde(default)]
    signed: bool,
    #[serde(default)]
    alternate: bool,
}

impl From<PackedFormatRepr> for PackedFormat {
    fn from(repr: PackedFormatRepr) -> Self {
        PackedFormat::new(repr.mode, repr.signed, repr.alternate)
    }
}

impl From<PackedFormat> for PackedFormatRepr {
    fn from(format: PackedFormat) -> Self {
        Self {
            mode: format.mode,
            signed: format.signed,
            alternate: format.alternate,
        }
    }
}

/// Power and phase for one channel of a transform cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpectrum {
    /// Channel label (empty for the combined spectrum)
    pub label: String,
    /// Right shift applied to the power values
    pub magnitude_shift: u8,
    /// Whether the channel was enabled when the cycle ran
    pub enabled: bool,
    /// Layout hints from the channel definition
    #[serde(default)]
    pub display: DisplayMetadata,
    /// Power per bin (`fft_size / 2` entries)
    pub power: Vec<u32>,
    /// Phase per bin in radians (`fft_size / 2` entries)
    pub phase: Vec<f32>,
}

impl ChannelSpectrum {
    /// Create a zeroed spectrum with `bins` entries.
    pub fn zeroed(bins: usize, label: impl Into<String>, magnitude_shift: u8) -> Self {
        Self {
            label: label.into(),
            magnitude_shift,
            enabled: false,
            display: DisplayMetadata::default(),
            power: vec![0; bins],
            phase: vec![0.0; bins],
        }
    }

    /// Zero the power and phase arrays in place.
    pub fn zero(&mut self) {
        self.power.fill(0);
        self.phase.fill(0.0);
    }

    /// True when every power and phase value is zero.
    pub fn is_zero(&self) -> bool {
        self.power.iter().all(|&p| p == 0) && self.phase.iter().all(|&p| p == 0.0)
    }
}

/// Snapshot produced by one fired analysis cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    /// Sequence number of the cycle that produced this snapshot
    pub cycle: u64,
    pub fft_size: usize,
    /// First bin the consumer should display
    pub first_bin: usize,
    /// Last bin the consumer should display (inclusive)
    pub last_bin: usize,
    /// True when computed from the channel-summed window
    pub combined: bool,
    /// One entry per declared channel, or a single combined entry
    pub channels: Vec<ChannelSpectrum>,
}

impl TransformResult {
    /// Number of bins in each power/phase array.
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Power values in the display range for `channel`.
    pub fn visible_power(&self, channel: usize) -> Option<&[u32]> {
        self.channels
            .get(channel)
            .and_then(|c| c.power.get(self.first_bin..=self.last_bin))
    }

    /// Phase values in the display range for `channel`.
    pub fn visible_phase(&self, channel: usize) -> Option<&[f32]> {
        self.channels
            .get(channel)
            .and_then(|c| c.phase.get(self.first_bin..=self.last_bin))
    }
}

/// Diagnostics exposed by the acquisition core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionStatus {
    /// Samples rejected because the ring buffer was full
    pub dropped_samples: u64,
    /// Estimated incoming samples per second, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_rate: Option<f64>,
    /// Channel cycles between analysis cycles
    pub effective_interval: usize,
    /// Active channel bits
    pub channel_mask: u8,
    /// Number of registered channels
    pub channel_count: usize,
    /// Analysis cycles completed since the last clear
    pub cycles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_format_derives_widths_from_mode() {
        let format = PackedFormat::new(PackedMode::Words4Bit, true, false);
        assert_eq!(format.bits_per_sample, 4);
        assert_eq!(format.value_size, 16);
        assert_eq!(format.samples_per_value(), 4);
    }

    #[test]
    fn packed_format_deserializes_without_widths() {
        let format: PackedFormat =
            serde_json::from_str(r#"{"mode":"bytes_2bit","signed":true}"#).unwrap();
        assert_eq!(format, PackedFormat::new(PackedMode::Bytes2Bit, true, false));
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: SpectrumConfig = serde_json::from_str(r#"{"fft_size":256}"#).unwrap();
        assert_eq!(config.fft_size, 256);
        assert!(config.is_auto_interval());
        assert_eq!(config.drop_log_interval, 1000);
        assert!(config.channels.is_empty());
    }

    #[test]
    fn channel_definition_flattens_display_metadata() {
        let def: ChannelDefinition = serde_json::from_str(
            r#"{"label":"left","magnitude":3,"high":1000,"tall":120,"base":0,"grid":15,"color":255}"#,
        )
        .unwrap();
        assert_eq!(def.magnitude, 3);
        assert_eq!(def.display.tall, 120);
        assert_eq!(def.display.color, 255);
    }

    #[test]
    fn visible_power_honours_bin_range() {
        let mut spectrum = ChannelSpectrum::zeroed(8, "a", 0);
        spectrum.power = (0..8).collect();
        let result = TransformResult {
            cycle: 1,
            fft_size: 16,
            first_bin: 2,
            last_bin: 5,
            combined: false,
            channels: vec![spectrum],
        };
        assert_eq!(result.visible_power(0), Some(&[2, 3, 4, 5][..]));
        assert!(result.visible_power(1).is_none());
    }
}
