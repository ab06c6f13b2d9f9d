//! One-second detection buckets

use chrono::{DateTime, Utc};
use sortline_core::{ClassCounts, Detection, LogRecord, ObjectClass, SecondStamp};
use tracing::{debug, warn};

/// The live aggregation unit for one wall-clock second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondBucket {
    pub timestamp: SecondStamp,
    pub counts: ClassCounts,
}

impl SecondBucket {
    fn open(timestamp: SecondStamp) -> Self {
        Self { timestamp, counts: ClassCounts::new() }
    }

    /// A bucket with no qualifying detections never becomes a record.
    fn seal(self) -> Option<LogRecord> {
        if self.counts.is_empty() {
            None
        } else {
            Some(LogRecord::new(self.timestamp, self.counts))
        }
    }
}

/// Single owner of the live bucket.
///
/// Buckets are opened lazily by the first detection of a second, so a second
/// without detections leaves no trace. Once a second is sealed no later
/// bucket may reuse it or anything before it.
#[derive(Debug, Default)]
pub struct DetectionAggregator {
    live: Option<SecondBucket>,
    last_sealed: Option<SecondStamp>,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `detection` into the bucket for `now`'s second.
    ///
    /// Returns the previous bucket's record when `now` has moved into a later
    /// second. A second earlier than the live bucket, or not after the last
    /// sealed one, is moved forward so sealed timestamps stay strictly
    /// increasing and no sealed record is ever replaced.
    pub fn observe(&mut self, detection: &Detection, now: DateTime<Utc>) -> Option<LogRecord> {
        self.observe_class(detection.class, now)
    }

    pub fn observe_class(&mut self, class: ObjectClass, now: DateTime<Utc>) -> Option<LogRecord> {
        let observed = SecondStamp::of(now);
        let second = match self.floor() {
            Some(floor) if observed < floor => {
                warn!("Clock went back from {} to {}; counting into {}", floor, observed, floor);
                floor
            }
            _ => observed,
        };
        let sealed = self.seal_before(second);

        self.live
            .get_or_insert_with(|| SecondBucket::open(second))
            .counts
            .increment(class);
        sealed
    }

    /// Earliest second a detection may still be counted into
    fn floor(&self) -> Option<SecondStamp> {
        match (&self.live, self.last_sealed) {
            (Some(bucket), _) => Some(bucket.timestamp),
            (None, Some(last)) => Some(SecondStamp::from_unix(last.unix() + 1).unwrap_or(last)),
            (None, None) => None,
        }
    }

    /// Seal the live bucket if `now` is past its second.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<LogRecord> {
        self.seal_before(SecondStamp::of(now))
    }

    /// Seal whatever is pending, regardless of the clock. Used while draining.
    pub fn flush_if_pending(&mut self) -> Option<LogRecord> {
        self.take_live()
    }

    pub fn live(&self) -> Option<&SecondBucket> {
        self.live.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.live.as_ref().map_or(false, |b| !b.counts.is_empty())
    }

    fn seal_before(&mut self, second: SecondStamp) -> Option<LogRecord> {
        match &self.live {
            Some(bucket) if bucket.timestamp < second => {
                let record = self.take_live();
                if let Some(record) = &record {
                    debug!("Sealed bucket {} ({} detections)", record.timestamp, record.counts.total());
                }
                record
            }
            _ => None,
        }
    }

    fn take_live(&mut self) -> Option<LogRecord> {
        let bucket = self.live.take()?;
        self.last_sealed = Some(bucket.timestamp);
        bucket.seal()
    }
}
