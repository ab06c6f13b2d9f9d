//! Error types for sortline-cns

use crate::channel::ChannelId;
use sortline_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CnsError {
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Communication fault on channel {channel}: {reason}")]
    Comm { channel: ChannelId, reason: String },

    #[error("Controller rejected write to channel {channel} with exception code {code:#04x}")]
    Exception { channel: ChannelId, code: u8 },

    #[error("Channel {channel} written while not connected")]
    NotConnected { channel: ChannelId },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CnsError {
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            CnsError::Comm { channel, .. }
            | CnsError::Exception { channel, .. }
            | CnsError::NotConnected { channel } => Some(*channel),
            _ => None,
        }
    }
}

impl From<CnsError> for CoreError {
    fn from(err: CnsError) -> Self {
        match err {
            CnsError::Connect { address, reason } => CoreError::PeripheralUnavailable {
                peripheral: format!("actuator {}", address),
                reason,
            },
            CnsError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::ActuationFault {
                channel: other.channel().map(|c| c.0).unwrap_or_default(),
                reason: other.to_string(),
            },
        }
    }
}
