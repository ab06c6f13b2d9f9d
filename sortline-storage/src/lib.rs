//! sortline-storage: per-second aggregation and the detection count log
//!
//! Provides:
//! - The live one-second bucket and its sealing rules
//! - A timestamp-keyed, deduplicated record log with stale tracking
//! - Overwrite-only persistence sinks (CSV, JSON)

pub mod error;
pub mod config;
pub mod aggregator;
pub mod timeseries;
pub mod sink;

pub use error::StorageError;
pub use config::{LogConfig, LogFormat};
pub use aggregator::{DetectionAggregator, SecondBucket};
pub use timeseries::TimeSeriesLog;
pub use sink::{build_sink, CsvFileSink, JsonFileSink, PersistenceSink};
