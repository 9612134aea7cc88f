//! Sample acquisition and triggered spectrum analysis.
//!
//! `SpectrumAcquisition` owns the ring buffer, channel mask, registry, rate
//! detector, trigger and transform pipeline. Every ingestion call runs
//! synchronously to completion, including any analysis cycle it fires, so
//! the instance must only ever be driven from one task at a time.

use std::sync::Arc;
use std::time::Instant;

use spectrascope_common::ipc::{Request, Response};
use spectrascope_common::{
    AcquisitionStatus, ChannelDefinition, PackedFormat, SpectrumConfig, TransformResult,
    MAX_CHANNELS, MAX_MAGNITUDE_SHIFT,
};
use tracing::{debug, info, trace, warn};

use crate::error::IngestError;
use crate::mask::ChannelMask;
use crate::packed;
use crate::processor::{round_fft_size, TransformPipeline};
use crate::rate::RateDetector;
use crate::registry::ChannelRegistry;
use crate::ring_buffer::{SampleRingBuffer, SlotWrite, MAX_INTERVAL_FACTOR};
use crate::throttle::LogThrottle;
use crate::trigger::TriggerController;

/// Receives a snapshot after every analysis cycle that produced one.
pub trait SpectrumCallback: Send + Sync {
    fn on_spectrum(&self, result: TransformResult);
}

/// The acquisition-and-analysis core.
pub struct SpectrumAcquisition {
    /// Interleaved sample storage
    buffer: SampleRingBuffer,
    /// Channels currently accepting samples
    mask: ChannelMask,
    /// Declared channels
    registry: ChannelRegistry,
    /// Arrival rate estimator
    rate: RateDetector,
    /// Channel-cycle counter that fires analysis cycles
    trigger: TriggerController,
    /// FFT over the ring buffer
    pipeline: TransformPipeline,
    /// Whether the interval follows the detected rate
    auto_interval: bool,
    /// Refresh rate automatic pacing aims for
    target_update_hz: f64,
    /// Channel the next round-robin sample lands in
    next_channel: usize,
    /// Analysis cycles that produced a snapshot since the last clear
    cycles: u64,
    /// Samples addressed to a channel index past the last slot
    invalid_channels: u64,
    /// Rate limit for overflow and invalid-channel warnings
    log_throttle: LogThrottle,
    /// Callback for spectrum snapshots
    callback: Option<Arc<dyn SpectrumCallback>>,
}

impl SpectrumAcquisition {
    /// Create a core from `config`, declaring any channels it lists.
    pub fn new(config: &SpectrumConfig) -> Self {
        let capacity = SampleRingBuffer::capacity_for(round_fft_size(config.fft_size));
        Self::with_capacity(config, capacity)
    }

    /// Like [`SpectrumAcquisition::new`] but with an explicit ring buffer
    /// size in slots, rounded up to a power of two.
    ///
    /// Buffers smaller than the FFT size plus the update interval can fill
    /// up and drop samples.
    pub fn with_capacity(config: &SpectrumConfig, capacity: usize) -> Self {
        let pipeline = TransformPipeline::new(
            config.fft_size,
            config.first_bin,
            config.last_bin,
            config.magnitude_shift.min(MAX_MAGNITUDE_SHIFT),
        );
        let fft_size = pipeline.fft_size();
        let buffer = SampleRingBuffer::new(capacity);

        let auto_interval = config.is_auto_interval();
        let interval = if auto_interval {
            fft_size
        } else {
            config.update_interval.clamp(1, fft_size * MAX_INTERVAL_FACTOR)
        };
        if !auto_interval && interval != config.update_interval {
            warn!(
                "[Acquisition] Update interval {} clamped to {}",
                config.update_interval, interval
            );
        }

        info!(
            "[Acquisition] fft_size={}, bins={}..={}, buffer={} slots, interval={}{}",
            fft_size,
            pipeline.first_bin(),
            pipeline.last_bin(),
            buffer.capacity(),
            interval,
            if auto_interval { " (auto)" } else { "" }
        );

        let mut acquisition = Self {
            buffer,
            mask: ChannelMask::default(),
            registry: ChannelRegistry::new(),
            rate: RateDetector::new(),
            trigger: TriggerController::new(interval),
            pipeline,
            auto_interval,
            target_update_hz: config.target_update_hz,
            next_channel: 0,
            cycles: 0,
            invalid_channels: 0,
            log_throttle: LogThrottle::new(config.drop_log_interval),
            callback: None,
        };

        for def in &config.channels {
            acquisition.define_channel(def);
        }

        acquisition
    }

    /// Set the callback for spectrum snapshots
    pub fn set_callback(&mut self, callback: Arc<dyn SpectrumCallback>) {
        self.callback = Some(callback);
    }

    /// Declare the next channel slot and enable it.
    pub fn define_channel(&mut self, def: &ChannelDefinition) -> Option<usize> {
        let channel = self.registry.define(def)?;
        self.mask.enable(channel);
        self.next_channel = self.mask.first_enabled();
        debug!(
            "[Acquisition] Channel {} '{}' declared (mask={:#010b})",
            channel,
            def.label,
            self.mask.bits()
        );
        Some(channel)
    }

    /// Clear everything and declare `defs` from scratch.
    pub fn redeclare_channels(&mut self, defs: &[ChannelDefinition]) -> usize {
        self.clear();
        let declared = self.registry.redeclare(defs);
        for channel in 0..declared {
            self.mask.enable(channel);
        }
        self.next_channel = self.mask.first_enabled();
        info!(
            "[Acquisition] {} channels declared (mask={:#010b})",
            declared,
            self.mask.bits()
        );
        declared
    }

    /// Replace the active channel bits.
    pub fn set_channel_mask(&mut self, bits: u8) {
        self.mask = ChannelMask::from_bits(bits);
        self.next_channel = self.mask.first_enabled();
        if self.mask.is_empty() {
            warn!("[Acquisition] No channels enabled; samples fall back to channel 0");
        } else {
            info!(
                "[Acquisition] Channel mask set to {:#010b} ({} channels)",
                bits,
                self.mask.count()
            );
        }
    }

    /// Ingest one sample into the current round-robin channel.
    pub fn push_sample(&mut self, value: i32) -> Result<(), IngestError> {
        self.push_sample_at(value, Instant::now())
    }

    pub fn push_sample_at(&mut self, value: i32, at: Instant) -> Result<(), IngestError> {
        let channel = self.next_channel;
        self.next_channel = self.mask.next_after(channel);
        self.admit(channel, value, at)
    }

    /// Ingest one sample into an explicit channel.
    pub fn push_sample_on(&mut self, channel: usize, value: i32) -> Result<(), IngestError> {
        self.push_sample_on_at(channel, value, Instant::now())
    }

    pub fn push_sample_on_at(
        &mut self,
        channel: usize,
        value: i32,
        at: Instant,
    ) -> Result<(), IngestError> {
        if channel >= MAX_CHANNELS {
            self.invalid_channels += 1;
            if self.log_throttle.should_log(self.invalid_channels) {
                warn!(
                    "[Acquisition] Ignoring sample for channel {} ({} so far)",
                    channel, self.invalid_channels
                );
            }
            return Err(IngestError::InvalidChannel(channel));
        }

        if !self.mask.is_enabled(channel) && !(self.mask.is_empty() && channel == 0) {
            debug!("[Acquisition] Channel {} disabled, sample ignored", channel);
            return Ok(());
        }

        self.next_channel = self.mask.next_after(channel);
        self.admit(channel, value, at)
    }

    /// Unpack `raw` and ingest each sub-sample in order, round-robin.
    ///
    /// Every sub-sample is offered even after one is rejected; the first
    /// rejection is returned.
    pub fn push_packed(&mut self, raw: u32, format: PackedFormat) -> Result<(), IngestError> {
        self.push_packed_at(raw, format, Instant::now())
    }

    pub fn push_packed_at(
        &mut self,
        raw: u32,
        format: PackedFormat,
        at: Instant,
    ) -> Result<(), IngestError> {
        trace!(
            "[Acquisition] Packed {:#x} carries {} samples",
            raw,
            format.samples_per_value()
        );
        let mut first_error = None;
        for value in packed::unpack(raw, format) {
            if let Err(e) = self.push_sample_at(value, at) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn admit(&mut self, channel: usize, value: i32, at: Instant) -> Result<(), IngestError> {
        self.rate.on_sample_arrival(at);
        if self.auto_interval {
            if let Some(interval) = self.rate.compute_effective_interval(
                self.pipeline.fft_size(),
                self.target_update_hz,
                self.mask.count(),
            ) {
                self.trigger.set_interval(interval);
            }
        }

        match self.buffer.write(self.mask, channel, value) {
            Ok(SlotWrite::Pending) => Ok(()),
            Ok(SlotWrite::Completed) => {
                if self.trigger.on_channel_cycle_complete() {
                    self.fire_cycle();
                }
                Ok(())
            }
            Err(IngestError::Overflow) => {
                let dropped = self.buffer.dropped();
                if self.log_throttle.should_log(dropped) {
                    warn!(
                        "[Acquisition] Sample buffer full, {} samples dropped",
                        dropped
                    );
                }
                Err(IngestError::Overflow)
            }
            Err(e) => Err(e),
        }
    }

    fn fire_cycle(&mut self) {
        let fft_size = self.pipeline.fft_size();
        let Some(result) = self
            .pipeline
            .run_cycle(&self.buffer, &self.registry, self.mask)
        else {
            trace!("[Acquisition] Cycle skipped, analysis window not yet full");
            return;
        };

        self.cycles += 1;
        if let Some(ref callback) = self.callback {
            callback.on_spectrum(result.clone());
        }
        self.buffer.release_before(fft_size);
    }

    /// Trigger an analysis cycle now, regardless of the interval count.
    pub fn force_cycle(&mut self) {
        self.trigger.reset();
        self.fire_cycle();
    }

    /// Zero the buffer, forget declared channels and the published result.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.trigger.reset();
        self.registry.clear();
        self.pipeline.reset();
        self.mask = ChannelMask::default();
        self.next_channel = self.mask.first_enabled();
        self.cycles = 0;
        info!("[Acquisition] Cleared");
    }

    /// Handle one request, returning the reply if the request expects one.
    pub fn handle_request(&mut self, request: Request) -> Option<Response> {
        if let Err(e) = request.validate() {
            return Some(Response::error(e));
        }

        match request {
            // Data requests never reply; failures are counted and logged
            Request::Sample { value, channel } => {
                let _ = match channel {
                    Some(channel) => self.push_sample_on(channel, value),
                    None => self.push_sample(value),
                };
                None
            }
            Request::Packed { value, format } => {
                let _ = self.push_packed(value, format);
                None
            }

            Request::DefineChannel { channel } => match self.define_channel(&channel) {
                Some(_) => Some(Response::ok()),
                None => Some(Response::error(format!(
                    "all {} channel slots are declared",
                    MAX_CHANNELS
                ))),
            },
            Request::DeclareChannels { channels } => {
                self.redeclare_channels(&channels);
                Some(Response::ok())
            }
            Request::EnableChannels { mask } => {
                self.set_channel_mask(mask);
                Some(Response::ok())
            }
            Request::Clear => {
                self.clear();
                Some(Response::ok())
            }
            Request::GetStatus => Some(Response::Status(self.status())),
            Request::Ping => Some(Response::Pong),
            Request::Shutdown => Some(Response::ok()),
        }
    }

    /// Latest snapshot, if a cycle has produced one since the last clear.
    pub fn result(&self) -> Option<&TransformResult> {
        self.pipeline.result()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.buffer.dropped()
    }

    pub fn detected_rate(&self) -> Option<f64> {
        self.rate.current_rate()
    }

    pub fn effective_interval(&self) -> usize {
        self.trigger.interval()
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.mask
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn buffer(&self) -> &SampleRingBuffer {
        &self.buffer
    }

    pub fn fft_size(&self) -> usize {
        self.pipeline.fft_size()
    }

    pub fn status(&self) -> AcquisitionStatus {
        AcquisitionStatus {
            dropped_samples: self.buffer.dropped(),
            detected_rate: self.rate.current_rate(),
            effective_interval: self.trigger.interval(),
            channel_mask: self.mask.bits(),
            channel_count: self.registry.len(),
            cycles: self.cycles,
        }
    }
}
