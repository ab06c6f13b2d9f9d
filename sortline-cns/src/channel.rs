//! Output channels and the class to channel mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sortline_core::ObjectClass;
use std::fmt;

/// Coil address on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u16);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One output channel per class. Total by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMap {
    pub diet_coke: ChannelId,
    pub original_coke: ChannelId,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            diet_coke: ChannelId(1280),
            original_coke: ChannelId(1281),
        }
    }
}

impl ChannelMap {
    pub fn channel(&self, class: ObjectClass) -> ChannelId {
        match class {
            ObjectClass::DietCoke => self.diet_coke,
            ObjectClass::OriginalCoke => self.original_coke,
        }
    }

    /// Two classes sharing a coil would be indistinguishable downstream.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<(ChannelId, ObjectClass)> = Vec::new();
        for class in ObjectClass::ALL {
            let channel = self.channel(class);
            if let Some((_, other)) = seen.iter().find(|(c, _)| *c == channel) {
                return Err(format!(
                    "{} and {} are both mapped to coil {}",
                    other, class, channel
                ));
            }
            seen.push((channel, class));
        }
        Ok(())
    }
}

/// Command to pulse one channel. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationEvent {
    pub channel: ChannelId,
    pub requested_at: DateTime<Utc>,
}
