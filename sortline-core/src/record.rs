//! Per-second count records

use crate::time::SecondStamp;
use crate::types::ObjectClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count of qualifying detections per class. Absent classes count zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts(BTreeMap<ObjectClass, u32>);

impl ClassCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, class: ObjectClass) {
        let count = self.0.entry(class).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn get(&self, class: ObjectClass) -> u32 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&c| c as u64).sum()
    }

    /// True when no class has a non-zero count.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|&c| c == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectClass, u32)> + '_ {
        self.0.iter().map(|(class, count)| (*class, *count))
    }
}

impl FromIterator<(ObjectClass, u32)> for ClassCounts {
    fn from_iter<I: IntoIterator<Item = (ObjectClass, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One durable row: the sealed counts of one wall-clock second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: SecondStamp,
    pub counts: ClassCounts,
}

impl LogRecord {
    pub fn new(timestamp: SecondStamp, counts: ClassCounts) -> Self {
        Self { timestamp, counts }
    }
}
