use thiserror::Error;

/// Run-wide error taxonomy.
///
/// Only `PeripheralUnavailable` and `Configuration` abort a run. The other
/// variants are contained at the call site that produced them and surfaced
/// through logs and the run summary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Peripheral unavailable: {peripheral}: {reason}")]
    PeripheralUnavailable { peripheral: String, reason: String },

    #[error("Stream ended: {0}")]
    StreamEnded(String),

    #[error("Actuation fault on channel {channel}: {reason}")]
    ActuationFault { channel: u16, reason: String },

    #[error("Persistence fault: {0}")]
    PersistenceFault(String),

    #[error("Delivery fault: {0}")]
    DeliveryFault(String),

    #[error("Unknown class id: {0}")]
    UnknownClass(usize),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the run instead of being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::PeripheralUnavailable { .. } | Error::Configuration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
