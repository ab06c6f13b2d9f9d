//! sortline-core: shared vocabulary for the sortline control loop
//!
//! Provides:
//! - The closed object class set and per-frame detection types
//! - Second-resolution timestamps and the clock seam
//! - Per-second count records
//! - The run-wide error taxonomy

pub mod error;
pub mod types;
pub mod time;
pub mod record;

pub use error::{Error, Result};
pub use types::{BoundingBox, Detection, ObjectClass};
pub use time::{Clock, ManualClock, SecondStamp, SystemClock};
pub use record::{ClassCounts, LogRecord};
