//! Detection to actuation dispatch

use crate::channel::{ActuationEvent, ChannelMap};
use crate::error::CnsError;
use crate::port::ActuatorPort;
use sortline_core::{Clock, Detection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a single dispatched pulse
#[derive(Debug)]
pub enum PulseOutcome {
    Completed(ActuationEvent),
    Faulted { event: ActuationEvent, error: CnsError },
}

impl PulseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PulseOutcome::Completed(_))
    }

    pub fn event(&self) -> &ActuationEvent {
        match self {
            PulseOutcome::Completed(event) | PulseOutcome::Faulted { event, .. } => event,
        }
    }
}

/// Cumulative counters over the dispatcher's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub pulses_issued: u64,
    pub faults: u64,
}

/// Owns the actuator port for the lifetime of a run and turns every
/// qualifying detection into exactly one pulse on its class coil.
pub struct ActuationDispatcher<P: ActuatorPort> {
    port: P,
    channels: ChannelMap,
    hold: Duration,
    clock: Arc<dyn Clock>,
    stats: DispatchStats,
}

impl<P: ActuatorPort> ActuationDispatcher<P> {
    pub fn new(port: P, channels: ChannelMap, hold: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            port,
            channels,
            hold,
            clock,
            stats: DispatchStats::default(),
        }
    }

    pub fn connect(&mut self) -> Result<(), CnsError> {
        self.port.connect()
    }

    pub fn close(&mut self) {
        self.port.close();
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Pulse the coil for `detection.class`. Blocks for the hold duration.
    ///
    /// A fault is logged and returned in the outcome, never propagated.
    pub fn dispatch(&mut self, detection: &Detection) -> PulseOutcome {
        let event = ActuationEvent {
            channel: self.channels.channel(detection.class),
            requested_at: self.clock.now(),
        };
        debug!("Pulsing coil {} for {}", event.channel, detection.class);

        match self.port.pulse(event.channel, self.hold) {
            Ok(()) => {
                self.stats.pulses_issued += 1;
                PulseOutcome::Completed(event)
            }
            Err(error) => {
                self.stats.faults += 1;
                warn!("Actuation fault on coil {} ({}): {}", event.channel, detection.class, error);
                PulseOutcome::Faulted { event, error }
            }
        }
    }

    /// One pulse per detection, in detector order. No debounce.
    pub fn dispatch_frame(&mut self, detections: &[Detection]) -> Vec<PulseOutcome> {
        detections.iter().map(|d| self.dispatch(d)).collect()
    }
}
