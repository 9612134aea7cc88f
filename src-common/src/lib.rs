//! SpectraScope shared types and wire protocol.
//!
//! This crate is used by the acquisition service and by any client that
//! renders its output. It holds the configuration model, the packed-data
//! descriptor, the transform result snapshot and the NDJSON envelope.

pub mod ipc;
pub mod types;

pub use types::*;
