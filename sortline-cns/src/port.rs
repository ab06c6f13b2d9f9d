//! Actuator port abstraction

use crate::channel::ChannelId;
use crate::error::CnsError;
use std::time::Duration;
use tracing::warn;

/// A field-bus client that can drive output channels.
#[cfg_attr(test, mockall::automock)]
pub trait ActuatorPort: Send {
    /// Acquire the controller. Failure is fatal to the run.
    fn connect(&mut self) -> Result<(), CnsError>;

    fn write_coil(&mut self, channel: ChannelId, active: bool) -> Result<(), CnsError>;

    /// Release the controller. Must be safe to call more than once.
    fn close(&mut self);

    fn describe(&self) -> String {
        "actuator".to_string()
    }

    /// Active, hold, inactive. Blocks the caller for `hold`.
    ///
    /// Nothing is released if activation failed. A failed release is retried
    /// once so a coil is not silently left latched.
    fn pulse(&mut self, channel: ChannelId, hold: Duration) -> Result<(), CnsError> {
        self.write_coil(channel, true)?;
        if !hold.is_zero() {
            std::thread::sleep(hold);
        }
        if let Err(first) = self.write_coil(channel, false) {
            warn!("Release of coil {} failed, retrying: {}", channel, first);
            self.write_coil(channel, false)?;
        }
        Ok(())
    }
}

impl<P: ActuatorPort + ?Sized> ActuatorPort for Box<P> {
    fn connect(&mut self) -> Result<(), CnsError> {
        (**self).connect()
    }

    fn write_coil(&mut self, channel: ChannelId, active: bool) -> Result<(), CnsError> {
        (**self).write_coil(channel, active)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn pulse(&mut self, channel: ChannelId, hold: Duration) -> Result<(), CnsError> {
        (**self).pulse(channel, hold)
    }
}
