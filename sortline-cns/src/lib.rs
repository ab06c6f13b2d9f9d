//! sortline-cns: physical outputs of the sorting line
//!
//! Provides:
//! - The actuator port abstraction and its blocking pulse cycle
//! - A fixed, total class to coil mapping
//! - A Modbus TCP coil client
//! - The dispatcher that turns qualifying detections into pulses

pub mod error;
pub mod config;
pub mod channel;
pub mod port;
pub mod transport;
pub mod dispatcher;

pub use error::CnsError;
pub use config::PlcConfig;
pub use channel::{ActuationEvent, ChannelId, ChannelMap};
pub use port::ActuatorPort;
pub use transport::ModbusTcpPort;
pub use dispatcher::{ActuationDispatcher, DispatchStats, PulseOutcome};
