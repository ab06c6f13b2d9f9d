//! Assemble a control loop from configuration

use crate::config::SortlineConfig;
use crate::control_loop::ControlLoop;
use crate::report::build_report_sink;
use sortline_cns::{ActuationDispatcher, ActuatorPort, ModbusTcpPort};
use sortline_core::{Clock, Error, Result, SystemClock};
use sortline_eye::{ConfidenceFilter, Detector, FrameSource, ImageDirSource, VisionConfig};
use sortline_storage::build_sink;
use std::sync::Arc;
use tracing::info;

/// Loop type produced from configuration
pub type SortlineLoop = ControlLoop<Box<dyn FrameSource>, Box<dyn Detector>, Box<dyn ActuatorPort>>;

/// Replay directory when configured, camera otherwise
pub fn build_frame_source(config: &VisionConfig) -> Result<Box<dyn FrameSource>> {
    if let Some(dir) = &config.replay_dir {
        info!("Replaying frames from {}", dir.display());
        return Ok(Box::new(ImageDirSource::new(dir)));
    }
    camera_source(config)
}

#[cfg(feature = "camera")]
fn camera_source(config: &VisionConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(sortline_eye::camera::CameraSource::new(Arc::new(config.clone()))))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_config: &VisionConfig) -> Result<Box<dyn FrameSource>> {
    Err(Error::Configuration(
        "No replay_dir set and sortline was built without the `camera` feature".to_string(),
    ))
}

#[cfg(feature = "onnx")]
pub fn build_detector(config: &VisionConfig) -> Result<Box<dyn Detector>> {
    let detector = sortline_eye::models::YoloDetector::new(&config.model_path, config)?;
    Ok(Box::new(detector))
}

#[cfg(not(feature = "onnx"))]
pub fn build_detector(_config: &VisionConfig) -> Result<Box<dyn Detector>> {
    Err(Error::Configuration(
        "sortline was built without the `onnx` feature; no detector is available".to_string(),
    ))
}

/// Validate `config` and build every collaborator of a run
pub fn build_control_loop(config: &SortlineConfig) -> Result<SortlineLoop> {
    config.validate()?;

    let source = build_frame_source(&config.vision)?;
    let detector = build_detector(&config.vision)?;
    let filter = ConfidenceFilter::new(config.vision.confidence_threshold)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let port: Box<dyn ActuatorPort> = Box::new(ModbusTcpPort::new(config.plc.clone()));
    let dispatcher = ActuationDispatcher::new(
        port,
        config.plc.coils.clone(),
        config.plc.pulse_duration(),
        clock.clone(),
    );

    let sink = build_sink(&config.log);
    let mut control = ControlLoop::new(source, detector, filter, dispatcher, sink, clock);

    if let Some(report) = build_report_sink(&config.report)? {
        control = control.with_report(report, config.report.recipient.clone());
    }
    Ok(control)
}
