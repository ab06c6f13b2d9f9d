//! Deduplicated per-second record log

use crate::error::StorageError;
use crate::sink::PersistenceSink;
use sortline_core::{LogRecord, SecondStamp};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Timestamp-keyed record set.
///
/// At most one record exists per second; appending an existing timestamp
/// replaces it. The durable copy is marked stale on every change and only
/// marked fresh by a successful persist, so a failed write is retried on the
/// next persist with the full set.
#[derive(Debug, Default)]
pub struct TimeSeriesLog {
    records: BTreeMap<SecondStamp, LogRecord>,
    stale: bool,
    closed: bool,
}

impl TimeSeriesLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the replaced record, if any.
    pub fn append(&mut self, record: LogRecord) -> Result<Option<LogRecord>, StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let replaced = self.records.insert(record.timestamp, record);
        if let Some(old) = &replaced {
            debug!("Replaced record for {}", old.timestamp);
        }
        self.stale = true;
        Ok(replaced)
    }

    /// Ordered copy of every record
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, timestamp: SecondStamp) -> Option<&LogRecord> {
        self.records.get(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the durable copy lags the in-memory set
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Write the full set through `sink`, overwriting the target.
    ///
    /// A failed write leaves the log stale even when nothing was appended.
    pub fn persist(&mut self, sink: &dyn PersistenceSink) -> Result<(), StorageError> {
        let records = self.snapshot();
        self.stale = true;
        sink.write_records(&records)?;
        self.stale = false;
        debug!("Persisted {} records to {}", records.len(), sink.location().display());
        Ok(())
    }

    /// Persist only if something changed since the last good write.
    pub fn persist_if_stale(&mut self, sink: &dyn PersistenceSink) -> Result<bool, StorageError> {
        if !self.stale {
            return Ok(false);
        }
        self.persist(sink)?;
        Ok(true)
    }

    /// Refuse further appends. Reads and persists remain available.
    pub fn close(&mut self) {
        if !self.closed {
            info!("Count log closed with {} records", self.records.len());
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sortline_core::{ClassCounts, ObjectClass};
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn record(secs: i64, diet: u32) -> LogRecord {
        let counts: ClassCounts = [(ObjectClass::DietCoke, diet)].into_iter().collect();
        LogRecord::new(SecondStamp::from_unix(secs).unwrap(), counts)
    }

    /// Fails the first `failures` writes, remembers every good set
    struct FailingSink {
        failures: AtomicU32,
        written: Mutex<Vec<Vec<LogRecord>>>,
    }

    impl FailingSink {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl PersistenceSink for FailingSink {
        fn write_records(&self, records: &[LogRecord]) -> Result<(), StorageError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::Write {
                    path: "counts.csv".into(),
                    source: std::io::Error::from(std::io::ErrorKind::Other),
                });
            }
            self.written.lock().unwrap().push(records.to_vec());
            Ok(())
        }

        fn location(&self) -> &Path {
            Path::new("counts.csv")
        }
    }

    #[test]
    fn test_append_replaces_same_timestamp() {
        let mut log = TimeSeriesLog::new();
        assert!(log.append(record(10, 1)).unwrap().is_none());
        let replaced = log.append(record(10, 4)).unwrap().unwrap();
        assert_eq!(replaced.counts.get(ObjectClass::DietCoke), 1);

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(SecondStamp::from_unix(10).unwrap()).unwrap().counts.get(ObjectClass::DietCoke), 4);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let mut log = TimeSeriesLog::new();
        log.append(record(12, 1)).unwrap();
        log.append(record(10, 2)).unwrap();
        log.append(record(11, 3)).unwrap();

        let stamps: Vec<i64> = log.snapshot().iter().map(|r| r.timestamp.unix()).collect();
        assert_eq!(stamps, vec![10, 11, 12]);
    }

    #[test]
    fn test_failed_persist_is_retried() {
        let sink = FailingSink::new(1);
        let mut log = TimeSeriesLog::new();
        log.append(record(10, 1)).unwrap();

        assert!(log.persist_if_stale(&sink).is_err());
        assert!(log.is_stale());

        log.append(record(11, 1)).unwrap();
        assert!(log.persist_if_stale(&sink).unwrap());
        assert!(!log.is_stale());
        assert!(!log.persist_if_stale(&sink).unwrap());

        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].len(), 2);
    }

    #[test]
    fn test_failed_write_of_empty_log_is_retried() {
        let sink = FailingSink::new(1);
        let mut log = TimeSeriesLog::new();
        assert!(!log.is_stale());

        assert!(log.persist(&sink).is_err());
        assert!(log.is_stale());

        assert!(log.persist_if_stale(&sink).unwrap());
        let written = sink.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].is_empty());
    }

    #[test]
    fn test_closed_log_rejects_appends() {
        let sink = FailingSink::new(0);
        let mut log = TimeSeriesLog::new();
        log.append(record(10, 1)).unwrap();
        log.close();

        assert!(matches!(log.append(record(11, 1)), Err(StorageError::Closed)));
        assert_eq!(log.len(), 1);
        assert!(log.persist(&sink).is_ok());
        assert!(log.is_closed());
    }
}
