//! Inbound request types.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelDefinition, PackedFormat, MAX_CHANNELS};

/// A message delivered to the acquisition service, one per protocol line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    // === Sample Data ===
    /// One raw sample, routed round-robin unless a channel is given
    Sample {
        value: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<usize>,
    },
    /// One packed integer carrying several sub-samples
    Packed { value: u32, format: PackedFormat },

    // === Channel Configuration ===
    /// Declare the next channel slot
    DefineChannel { channel: ChannelDefinition },
    /// Replace every declared channel at once
    DeclareChannels { channels: Vec<ChannelDefinition> },
    /// Replace the active channel bits
    EnableChannels { mask: u8 },

    // === Control ===
    /// Zero the sample buffer and forget declared channels
    Clear,
    /// Report counters and the detected rate
    GetStatus,
    /// Ping for health check
    Ping,
    /// Request service shutdown
    Shutdown,
}

impl Request {
    /// Validate all parameters in this request.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::DefineChannel { channel } => validate_label(channel),
            Request::DeclareChannels { channels } => {
                if channels.len() > MAX_CHANNELS {
                    return Err(format!(
                        "at most {} channels can be declared, got {}",
                        MAX_CHANNELS,
                        channels.len()
                    ));
                }
                channels.iter().try_for_each(validate_label)
            }
            // Channel indices and magnitudes are normalized by the core
            _ => Ok(()),
        }
    }

    /// True for requests that carry sample data.
    pub fn is_data(&self) -> bool {
        matches!(self, Request::Sample { .. } | Request::Packed { .. })
    }
}

fn validate_label(channel: &ChannelDefinition) -> Result<(), String> {
    if channel.label.is_empty() {
        return Err("channel label cannot be empty".to_string());
    }
    Ok(())
}
