//! Detection to actuation control loop
//!
//! One run walks `Idle -> Connecting -> Running -> Draining -> Closed`.
//! Every iteration reads a frame, infers, filters, counts the qualifying
//! detections into the live second and pulses one coil per detection. The
//! pulse blocks the loop, which is the only backpressure the line has.

use crate::report::ReportSink;
use parking_lot::RwLock;
use sortline_cns::{ActuationDispatcher, ActuatorPort, PulseOutcome};
use sortline_core::{Clock, Error, LogRecord, Result};
use sortline_eye::{ConfidenceFilter, Detector, FrameSource, VisionError};
use sortline_storage::{DetectionAggregator, PersistenceSink, TimeSeriesLog};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connecting,
    Running,
    Draining,
    Closed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Connecting => "connecting",
            LoopState::Running => "running",
            LoopState::Draining => "draining",
            LoopState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the run left `Running`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    StopRequested,
    StreamEnded(String),
}

/// Outcome of handing the log to the report sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No report sink configured
    Skipped,
    Delivered,
    Failed(String),
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub end_reason: EndReason,
    pub frames_processed: u64,
    pub detector_faults: u64,
    pub qualifying_detections: u64,
    pub pulses_issued: u64,
    pub actuation_faults: u64,
    pub persistence_faults: u64,
    /// Final ordered log snapshot
    pub records: Vec<LogRecord>,
    pub delivery: DeliveryStatus,
}

/// Requests a stop between frame iterations. Never interrupts a pulse.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop_requested: Arc<RwLock<bool>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        *self.stop_requested.write() = true;
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop_requested.read()
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_processed: u64,
    detector_faults: u64,
    qualifying_detections: u64,
    persistence_faults: u64,
}

pub struct ControlLoop<S, D, P>
where
    S: FrameSource,
    D: Detector,
    P: ActuatorPort,
{
    run_id: Uuid,
    source: S,
    detector: D,
    filter: ConfidenceFilter,
    dispatcher: ActuationDispatcher<P>,
    aggregator: DetectionAggregator,
    log: TimeSeriesLog,
    sink: Box<dyn PersistenceSink>,
    report: Option<(Box<dyn ReportSink>, String)>,
    clock: Arc<dyn Clock>,
    stop: StopHandle,
    state: LoopState,
    counters: Counters,
}

impl<S, D, P> ControlLoop<S, D, P>
where
    S: FrameSource,
    D: Detector,
    P: ActuatorPort,
{
    pub fn new(
        source: S,
        detector: D,
        filter: ConfidenceFilter,
        dispatcher: ActuationDispatcher<P>,
        sink: Box<dyn PersistenceSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source,
            detector,
            filter,
            dispatcher,
            aggregator: DetectionAggregator::new(),
            log: TimeSeriesLog::new(),
            sink,
            report: None,
            clock,
            stop: StopHandle::new(),
            state: LoopState::Idle,
            counters: Counters::default(),
        }
    }

    /// Deliver the log to `recipient` through `sink` once the run closes
    pub fn with_report(mut self, sink: Box<dyn ReportSink>, recipient: impl Into<String>) -> Self {
        self.report = Some((sink, recipient.into()));
        self
    }

    /// Share a stop handle created elsewhere
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn log(&self) -> &TimeSeriesLog {
        &self.log
    }

    pub fn dispatcher(&self) -> &ActuationDispatcher<P> {
        &self.dispatcher
    }

    /// Drive one complete run.
    ///
    /// Errors only when a peripheral cannot be acquired, in which case the
    /// loop closes without running. Every other fault is contained and
    /// counted in the summary.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.state != LoopState::Idle {
            return Err(Error::Configuration(format!(
                "Run {} already started (state {})",
                self.run_id, self.state
            )));
        }

        info!("Starting run {}", self.run_id);
        self.transition(LoopState::Connecting);
        self.acquire()?;
        self.transition(LoopState::Running);

        // Start from an empty artifact, like a freshly cleared sheet
        if let Err(e) = self.log.persist(self.sink.as_ref()) {
            self.counters.persistence_faults += 1;
            warn!("Initial write of {} failed: {}", self.sink.location().display(), e);
        }

        let end_reason = self.run_frames();

        self.transition(LoopState::Draining);
        let delivery = self.drain();
        self.transition(LoopState::Closed);

        let stats = self.dispatcher.stats();
        let summary = RunSummary {
            run_id: self.run_id,
            end_reason,
            frames_processed: self.counters.frames_processed,
            detector_faults: self.counters.detector_faults,
            qualifying_detections: self.counters.qualifying_detections,
            pulses_issued: stats.pulses_issued,
            actuation_faults: stats.faults,
            persistence_faults: self.counters.persistence_faults,
            records: self.log.snapshot(),
            delivery,
        };

        info!(
            "Run {} closed: {} frames, {} qualifying detections, {} pulses, {} actuation faults, {} records",
            summary.run_id,
            summary.frames_processed,
            summary.qualifying_detections,
            summary.pulses_issued,
            summary.actuation_faults,
            summary.records.len()
        );
        Ok(summary)
    }

    fn transition(&mut self, next: LoopState) {
        info!("Control loop {} -> {}", self.state, next);
        self.state = next;
    }

    fn acquire(&mut self) -> Result<()> {
        if let Err(e) = self.source.open() {
            error!("Failed to open {}: {}", self.source.describe(), e);
            self.transition(LoopState::Closed);
            return Err(into_unavailable(e, self.source.describe()));
        }

        if let Err(e) = self.dispatcher.connect() {
            error!("Failed to connect {}: {}", self.dispatcher.port().describe(), e);
            self.source.close();
            self.transition(LoopState::Closed);
            return Err(e.into());
        }

        info!(
            "Peripherals ready: {} and {}",
            self.source.describe(),
            self.dispatcher.port().describe()
        );
        Ok(())
    }

    fn run_frames(&mut self) -> EndReason {
        loop {
            if self.stop.is_stop_requested() {
                info!("Stop requested");
                return EndReason::StopRequested;
            }

            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(VisionError::EndOfStream(reason)) => {
                    info!("Stream ended: {}", reason);
                    return EndReason::StreamEnded(reason);
                }
                Err(e) => {
                    warn!("Frame read failed, ending stream: {}", e);
                    return EndReason::StreamEnded(e.to_string());
                }
            };
            self.counters.frames_processed += 1;

            // One instant per frame: all of its detections share a second
            let now = self.clock.now();
            if let Some(record) = self.aggregator.tick(now) {
                self.commit(record);
            }

            let detections = match self.detector.infer(&frame) {
                Ok(detections) => detections,
                Err(e) => {
                    self.counters.detector_faults += 1;
                    warn!("Skipping frame {}: {}", frame.index, e);
                    continue;
                }
            };

            let qualifying = self.filter.qualifying(detections);
            debug!("Frame {}: {} qualifying detections", frame.index, qualifying.len());
            if qualifying.is_empty() {
                continue;
            }

            for detection in &qualifying {
                self.counters.qualifying_detections += 1;
                if let Some(record) = self.aggregator.observe(detection, now) {
                    self.commit(record);
                }
            }

            for outcome in self.dispatcher.dispatch_frame(&qualifying) {
                if let PulseOutcome::Faulted { event, .. } = outcome {
                    debug!("Pulse on coil {} requested at {} did not complete", event.channel, event.requested_at);
                }
            }
        }
    }

    /// Append a sealed bucket and write the full log through.
    fn commit(&mut self, record: LogRecord) {
        let timestamp = record.timestamp;
        if let Err(e) = self.log.append(record) {
            error!("Dropping record for {}: {}", timestamp, e);
            return;
        }
        self.persist();
    }

    fn persist(&mut self) {
        if let Err(e) = self.log.persist_if_stale(self.sink.as_ref()) {
            self.counters.persistence_faults += 1;
            warn!("Persisting count log failed, will retry on next flush: {}", e);
        }
    }

    fn drain(&mut self) -> DeliveryStatus {
        if let Some(record) = self.aggregator.flush_if_pending() {
            self.commit(record);
        } else {
            // A previous failure may still need writing
            self.persist();
        }

        self.source.close();
        self.dispatcher.close();
        self.log.close();

        match &self.report {
            None => DeliveryStatus::Skipped,
            Some((report, recipient)) => match report.deliver(self.sink.location(), recipient) {
                Ok(()) => DeliveryStatus::Delivered,
                Err(e) => {
                    let fault: Error = e.into();
                    warn!("{}", fault);
                    DeliveryStatus::Failed(fault.to_string())
                }
            },
        }
    }
}

/// Acquisition failures are fatal whatever the source reported.
fn into_unavailable(err: VisionError, peripheral: String) -> Error {
    match Error::from(err) {
        Error::PeripheralUnavailable { peripheral, reason } => {
            Error::PeripheralUnavailable { peripheral, reason }
        }
        Error::Configuration(msg) => Error::Configuration(msg),
        other => Error::PeripheralUnavailable {
            peripheral,
            reason: other.to_string(),
        },
    }
}
