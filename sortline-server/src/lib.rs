//! sortline-server: wires peripherals, storage and reporting into one run

pub mod config;
pub mod report;
pub mod control_loop;
pub mod startup;

pub use config::{SortlineConfig, DEFAULT_CONFIG_FILE};
pub use report::{build_report_sink, LogReportSink, ReportConfig, ReportError, ReportSink, ReportTransport, WebhookReportSink};
pub use control_loop::{ControlLoop, DeliveryStatus, EndReason, LoopState, RunSummary, StopHandle};
pub use startup::{build_control_loop, build_detector, build_frame_source, SortlineLoop};
