// Shared fakes for the cross-crate scenarios
#![allow(dead_code)]

use image::RgbImage;
use parking_lot::Mutex;
use sortline_cns::{ActuationDispatcher, ActuatorPort, ChannelId, ChannelMap, CnsError};
use sortline_core::{BoundingBox, Detection, LogRecord, ManualClock, ObjectClass};
use sortline_eye::{ConfidenceFilter, Detector, Frame, FrameSource, VisionError};
use sortline_server::{ControlLoop, StopHandle};
use sortline_storage::{PersistenceSink, StorageError};
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DIET: ObjectClass = ObjectClass::DietCoke;
pub const ORIGINAL: ObjectClass = ObjectClass::OriginalCoke;

pub fn det(class: ObjectClass, confidence: f32) -> Detection {
    Detection::new(class, confidence, BoundingBox::new(10.0, 10.0, 50.0, 90.0))
}

/// One scripted frame: the clock reading when it is captured and what the
/// detector sees in it. `None` makes the detector fail on that frame.
#[derive(Debug, Clone)]
pub struct ScriptedFrame {
    pub at_millis: i64,
    pub detections: Option<Vec<Detection>>,
}

impl ScriptedFrame {
    pub fn at(at_millis: i64, detections: Vec<Detection>) -> Self {
        Self { at_millis, detections: Some(detections) }
    }

    pub fn failing(at_millis: i64) -> Self {
        Self { at_millis, detections: None }
    }
}

/// Frame source that moves the clock to each frame's capture time
pub struct ScriptedSource {
    clock: ManualClock,
    frames: VecDeque<i64>,
    stop_after: Option<(usize, StopHandle)>,
    served: usize,
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> Result<(), VisionError> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, VisionError> {
        let millis = self
            .frames
            .pop_front()
            .ok_or_else(|| VisionError::EndOfStream("script exhausted".to_string()))?;
        self.clock.set_unix_millis(millis);
        self.served += 1;
        if let Some((after, stop)) = &self.stop_after {
            if self.served == *after {
                stop.request_stop();
            }
        }
        Ok(Frame::new(self.served as u64 - 1, RgbImage::new(4, 4)))
    }

    fn close(&mut self) {}
}

/// Detector answering from the script, frame by frame
pub struct ScriptedDetector {
    answers: VecDeque<Option<Vec<Detection>>>,
}

impl Detector for ScriptedDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        match self.answers.pop_front().flatten() {
            Some(detections) => Ok(detections),
            None => Err(VisionError::Inference(format!("frame {} rejected", frame.index))),
        }
    }
}

/// Detector keyed by frame index, for real frame sources
pub struct IndexedDetector {
    pub by_index: Vec<Vec<Detection>>,
}

impl Detector for IndexedDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        Ok(self.by_index.get(frame.index as usize).cloned().unwrap_or_default())
    }
}

/// In-memory actuator; fails the ON write of the listed pulse numbers (0-based)
pub struct RecordingPort {
    pub writes: Arc<Mutex<Vec<(ChannelId, bool)>>>,
    fail_pulses: HashSet<usize>,
    pulses_started: usize,
    stop_on_pulse: Option<(usize, StopHandle)>,
}

impl RecordingPort {
    pub fn new(fail_pulses: &[usize]) -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            fail_pulses: fail_pulses.iter().copied().collect(),
            pulses_started: 0,
            stop_on_pulse: None,
        }
    }

    /// Request a stop while the ON write of pulse `pulse` is in flight
    pub fn stop_on_pulse(mut self, pulse: usize, stop: StopHandle) -> Self {
        self.stop_on_pulse = Some((pulse, stop));
        self
    }
}

impl ActuatorPort for RecordingPort {
    fn connect(&mut self) -> Result<(), CnsError> {
        Ok(())
    }

    fn write_coil(&mut self, channel: ChannelId, active: bool) -> Result<(), CnsError> {
        if active {
            let pulse = self.pulses_started;
            self.pulses_started += 1;
            if let Some((at, stop)) = &self.stop_on_pulse {
                if *at == pulse {
                    stop.request_stop();
                }
            }
            if self.fail_pulses.contains(&pulse) {
                return Err(CnsError::Comm { channel, reason: "simulated link drop".to_string() });
            }
        }
        self.writes.lock().push((channel, active));
        Ok(())
    }

    fn close(&mut self) {}
}

/// Keeps every persisted set; fails the first `failures` writes
pub struct MemorySink {
    pub persisted: Arc<Mutex<Vec<Vec<LogRecord>>>>,
    failures: Mutex<u32>,
    location: PathBuf,
}

impl MemorySink {
    pub fn new(failures: u32) -> Self {
        Self {
            persisted: Arc::new(Mutex::new(Vec::new())),
            failures: Mutex::new(failures),
            location: PathBuf::from("memory.csv"),
        }
    }
}

impl PersistenceSink for MemorySink {
    fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError> {
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err(StorageError::Write {
                path: self.location.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.persisted.lock().push(records.to_vec());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.location
    }
}

pub type ScriptedLoop = ControlLoop<ScriptedSource, ScriptedDetector, RecordingPort>;

pub struct Scenario {
    pub control: ScriptedLoop,
    pub writes: Arc<Mutex<Vec<(ChannelId, bool)>>>,
    pub persisted: Arc<Mutex<Vec<Vec<LogRecord>>>>,
}

pub struct ScenarioBuilder {
    frames: Vec<ScriptedFrame>,
    fail_pulses: Vec<usize>,
    sink_failures: u32,
    stop_after: Option<usize>,
    stop_on_pulse: Option<usize>,
    threshold: f32,
}

impl ScenarioBuilder {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self {
            frames,
            fail_pulses: Vec::new(),
            sink_failures: 0,
            stop_after: None,
            stop_on_pulse: None,
            threshold: 0.3,
        }
    }

    pub fn fail_pulses(mut self, pulses: &[usize]) -> Self {
        self.fail_pulses = pulses.to_vec();
        self
    }

    pub fn sink_failures(mut self, failures: u32) -> Self {
        self.sink_failures = failures;
        self
    }

    /// Request a stop once this many frames have been served
    pub fn stop_after(mut self, frames: usize) -> Self {
        self.stop_after = Some(frames);
        self
    }

    /// Request a stop from inside the ON write of this pulse (0-based)
    pub fn stop_on_pulse(mut self, pulse: usize) -> Self {
        self.stop_on_pulse = Some(pulse);
        self
    }

    pub fn build(self) -> Scenario {
        let clock = ManualClock::at_unix(0);
        let stop = StopHandle::new();
        let mut port = RecordingPort::new(&self.fail_pulses);
        if let Some(pulse) = self.stop_on_pulse {
            port = port.stop_on_pulse(pulse, stop.clone());
        }
        let writes = port.writes.clone();
        let sink = MemorySink::new(self.sink_failures);
        let persisted = sink.persisted.clone();

        let dispatcher = ActuationDispatcher::new(port, ChannelMap::default(), Duration::ZERO, Arc::new(clock.clone()));
        let source = ScriptedSource {
            clock: clock.clone(),
            frames: self.frames.iter().map(|f| f.at_millis).collect(),
            stop_after: self.stop_after.map(|n| (n, stop.clone())),
            served: 0,
        };
        let detector = ScriptedDetector {
            answers: self.frames.into_iter().map(|f| f.detections).collect(),
        };

        let control = ControlLoop::new(
            source,
            detector,
            ConfidenceFilter::new(self.threshold).unwrap(),
            dispatcher,
            Box::new(sink),
            Arc::new(clock),
        )
        .with_stop_handle(stop);

        Scenario { control, writes, persisted }
    }
}

/// Write `count` small PNG frames into `dir`
pub fn write_frames(dir: &Path, count: usize) {
    for i in 0..count {
        RgbImage::new(16, 12).save(dir.join(format!("frame_{:03}.png", i))).unwrap();
    }
}

/// Modbus TCP slave echoing Write Single Coil requests.
///
/// Serves one connection and hangs up after `max_requests`.
pub struct FakePlc {
    pub port: u16,
    pub writes: mpsc::Receiver<(u16, bool)>,
}

impl FakePlc {
    pub fn spawn(max_requests: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            for _ in 0..max_requests {
                let mut request = [0u8; 12];
                if socket.read_exact(&mut request).is_err() {
                    return;
                }
                let address = u16::from_be_bytes([request[8], request[9]]);
                let _ = tx.send((address, request[10] == 0xFF));
                if socket.write_all(&request).is_err() {
                    return;
                }
            }
        });

        Self { port, writes: rx }
    }

    pub fn received(&self) -> Vec<(u16, bool)> {
        self.writes.try_iter().collect()
    }
}
