//! SpectraScope acquisition service.
//!
//! Ingests interleaved multi-channel samples, keeps them in a power-of-two
//! ring buffer, and runs windowed FFTs at a fixed or rate-adaptive cadence.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod ingest_loop;
pub mod mask;
pub mod packed;
pub mod processor;
pub mod rate;
pub mod registry;
pub mod ring_buffer;
pub mod throttle;
pub mod trigger;

pub use acquisition::{SpectrumAcquisition, SpectrumCallback};
pub use error::{ConfigError, IngestError};
pub use ingest_loop::{run_ingest_loop, run_writer, ChannelBroadcaster};
pub use mask::ChannelMask;
pub use processor::{HannWindow, SpectrumWindow, TransformPipeline};
